use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub manager_ids: Vec<Uuid>,
    pub member_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    pub fn is_managed_by(&self, user_id: Uuid) -> bool {
        self.manager_ids.contains(&user_id)
    }

    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id)
    }

    pub fn managers_count(&self) -> usize {
        self.manager_ids.len()
    }

    pub fn members_count(&self) -> usize {
        self.member_ids.len()
    }
}

/// Which side of a department a plan edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipKind {
    Managers,
    Members,
}

impl MembershipKind {
    pub fn label(&self) -> &'static str {
        match self {
            MembershipKind::Managers => "managers",
            MembershipKind::Members => "members",
        }
    }
}

/// Difference between a department's current and desired user set.
///
/// Built once from the submitted form and applied in a single transaction, so
/// a department never ends up half-edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipPlan {
    pub department_id: Uuid,
    pub kind: MembershipKind,
    pub to_add: Vec<Uuid>,
    pub to_remove: Vec<Uuid>,
}

impl MembershipPlan {
    pub fn diff(
        department_id: Uuid,
        kind: MembershipKind,
        current: &[Uuid],
        desired: &[Uuid],
    ) -> Self {
        let current: BTreeSet<Uuid> = current.iter().copied().collect();
        let desired: BTreeSet<Uuid> = desired.iter().copied().collect();

        Self {
            department_id,
            kind,
            to_add: desired.difference(&current).copied().collect(),
            to_remove: current.difference(&desired).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
}
