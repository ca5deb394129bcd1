//! Role-based access rules.
//!
//! Every permission decision in the portal goes through [`authorize`] so the
//! whole policy can be read, and tested, in one place.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    domain::{Announcement, Department, Role, User},
    error::AppError,
};

/// The signed-in user plus the departments they manage.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub managed_department_ids: HashSet<Uuid>,
}

impl Actor {
    pub fn new(user: &User, managed_department_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            managed_department_ids: managed_department_ids.into_iter().collect(),
        }
    }

    pub fn is_gm(&self) -> bool {
        self.role == Role::GeneralManager
    }

    pub fn manages(&self, department_id: Uuid) -> bool {
        self.managed_department_ids.contains(&department_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Edit,
    Publish,
    Archive,
    ViewReadStats,
    ManageManagers,
    ManageMembers,
    Book,
}

#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Announcement(&'a Announcement),
    /// An announcement that does not exist yet.
    NewAnnouncement,
    Department(&'a Department),
    DepartmentDirectory,
    Room,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AppError::Forbidden(reason.to_string())),
        }
    }
}

fn allow_if(condition: bool, reason: &'static str) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny(reason)
    }
}

pub fn authorize(actor: &Actor, action: Action, resource: Resource<'_>) -> Decision {
    use Action::*;
    use Role::*;

    if actor.role == GeneralManager {
        return Decision::Allow;
    }

    match (resource, action) {
        (Resource::NewAnnouncement, Create) => Decision::Allow,
        (Resource::Announcement(a), Edit) | (Resource::Announcement(a), ViewReadStats) => allow_if(
            a.author_id == Some(actor.user_id),
            "Only the author can change this announcement.",
        ),
        (Resource::Announcement(_), Publish) => allow_if(
            actor.role == Manager,
            "Employees cannot publish announcements.",
        ),
        (Resource::Announcement(a), Archive) => {
            let own = a.author_id == Some(actor.user_id);
            let manages_targets = actor.role == Manager
                && !a.department_ids.is_empty()
                && a.department_ids.iter().all(|id| actor.manages(*id));
            allow_if(own || manages_targets, "You cannot archive this announcement.")
        }

        (Resource::DepartmentDirectory, View) => allow_if(
            actor.role == Manager,
            "Only managers can view departments.",
        ),
        (Resource::Department(d), View) | (Resource::Department(d), ManageMembers) => allow_if(
            actor.role == Manager && actor.manages(d.id),
            "You do not manage this department.",
        ),

        (Resource::Room, Book) => Decision::Allow,

        _ => Decision::Deny("You do not have permission to do that."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnnouncementStatus;
    use chrono::Utc;

    fn actor(role: Role, managed: &[Uuid]) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role,
            managed_department_ids: managed.iter().copied().collect(),
        }
    }

    fn announcement(author_id: Option<Uuid>, department_ids: Vec<Uuid>) -> Announcement {
        let now = Utc::now();
        Announcement {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            slug: "t".to_string(),
            content: "c".to_string(),
            status: AnnouncementStatus::Draft,
            pinned: false,
            publish_at: None,
            expire_at: None,
            department_ids,
            author_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn department(id: Uuid) -> Department {
        let now = Utc::now();
        Department {
            id,
            name: "Ops".to_string(),
            manager_ids: vec![],
            member_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_gm_allowed_everything() {
        let gm = actor(Role::GeneralManager, &[]);
        let dept = department(Uuid::new_v4());
        for action in [Action::Create, Action::Edit, Action::ManageManagers, Action::ManageMembers] {
            assert!(authorize(&gm, action, Resource::Department(&dept)).is_allowed());
        }
        assert!(authorize(&gm, Action::Create, Resource::Room).is_allowed());
    }

    #[test]
    fn test_employee_cannot_publish_or_view_departments() {
        let employee = actor(Role::Employee, &[]);
        let own = announcement(Some(employee.user_id), vec![]);

        assert!(!authorize(&employee, Action::Publish, Resource::Announcement(&own)).is_allowed());
        assert!(authorize(&employee, Action::Edit, Resource::Announcement(&own)).is_allowed());
        assert!(!authorize(&employee, Action::View, Resource::DepartmentDirectory).is_allowed());
        assert!(authorize(&employee, Action::Book, Resource::Room).is_allowed());
    }

    #[test]
    fn test_manager_department_rights() {
        let managed = Uuid::new_v4();
        let manager = actor(Role::Manager, &[managed]);

        assert!(authorize(&manager, Action::ManageMembers, Resource::Department(&department(managed))).is_allowed());
        assert!(!authorize(&manager, Action::ManageMembers, Resource::Department(&department(Uuid::new_v4()))).is_allowed());
        assert!(!authorize(&manager, Action::ManageManagers, Resource::Department(&department(managed))).is_allowed());
        assert!(!authorize(&manager, Action::Create, Resource::DepartmentDirectory).is_allowed());
    }

    #[test]
    fn test_manager_archive_targets() {
        let managed = Uuid::new_v4();
        let manager = actor(Role::Manager, &[managed]);

        let in_scope = announcement(Some(Uuid::new_v4()), vec![managed]);
        let out_of_scope = announcement(Some(Uuid::new_v4()), vec![managed, Uuid::new_v4()]);
        let global = announcement(Some(Uuid::new_v4()), vec![]);

        assert!(authorize(&manager, Action::Archive, Resource::Announcement(&in_scope)).is_allowed());
        assert!(!authorize(&manager, Action::Archive, Resource::Announcement(&out_of_scope)).is_allowed());
        assert!(!authorize(&manager, Action::Archive, Resource::Announcement(&global)).is_allowed());
    }

    #[test]
    fn test_deny_maps_to_forbidden() {
        let employee = actor(Role::Employee, &[]);
        let err = authorize(&employee, Action::Create, Resource::Room)
            .into_result()
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
