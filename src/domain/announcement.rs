use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use super::Role;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub status: AnnouncementStatus,
    pub pinned: bool,
    pub publish_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
    /// Target departments. Empty means everyone.
    pub department_ids: Vec<Uuid>,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum AnnouncementStatus {
    Draft,
    Published,
    Archived,
}

impl AnnouncementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementStatus::Draft => "Draft",
            AnnouncementStatus::Published => "Published",
            AnnouncementStatus::Archived => "Archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Draft" => Some(AnnouncementStatus::Draft),
            "Published" => Some(AnnouncementStatus::Published),
            "Archived" => Some(AnnouncementStatus::Archived),
            _ => None,
        }
    }
}

/// The author as seen by the publish rules.
#[derive(Debug, Clone)]
pub struct PublishingAuthor {
    pub user_id: Uuid,
    pub role: Role,
    pub managed_department_ids: HashSet<Uuid>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("Author is required to publish an announcement.")]
    MissingAuthor,
    #[error("Employees cannot publish announcements.")]
    EmployeeCannotPublish,
    #[error("Managers must select one or more of their managed departments to publish.")]
    ManagerMustTarget,
    #[error("Managers can only publish to their managed departments.")]
    UnmanagedDepartment,
    #[error("Archived announcements cannot be published.")]
    Archived,
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// What a viewer can see: the departments they belong to in any capacity.
#[derive(Debug, Clone, Default)]
pub struct VisibilityScope {
    pub department_ids: HashSet<Uuid>,
    /// General managers see every live announcement regardless of targeting.
    pub sees_all: bool,
}

impl Announcement {
    pub fn is_published(&self) -> bool {
        self.status == AnnouncementStatus::Published
    }

    pub fn is_global(&self) -> bool {
        self.department_ids.is_empty()
    }

    /// Published and inside the optional publish/expire window.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if !self.is_published() {
            return false;
        }
        if matches!(self.publish_at, Some(publish_at) if publish_at > now) {
            return false;
        }
        if matches!(self.expire_at, Some(expire_at) if expire_at <= now) {
            return false;
        }
        true
    }

    pub fn targets_any(&self, department_ids: &HashSet<Uuid>) -> bool {
        self.department_ids.iter().any(|id| department_ids.contains(id))
    }

    pub fn is_visible_to(&self, scope: &VisibilityScope, now: DateTime<Utc>) -> bool {
        self.is_live(now) && (scope.sees_all || self.is_global() || self.targets_any(&scope.department_ids))
    }

    /// Draft → Published. Sets `publish_at` to `when` if it was unset.
    pub fn publish(
        &mut self,
        author: Option<&PublishingAuthor>,
        when: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        self.check_publish_rules(author)?;

        self.status = AnnouncementStatus::Published;
        if self.publish_at.is_none() {
            self.publish_at = Some(when);
        }
        Ok(())
    }

    /// Whether `author` may have this announcement published as it stands.
    /// Published announcements must keep passing this after every edit.
    pub fn check_publish_rules(&self, author: Option<&PublishingAuthor>) -> Result<(), PublishError> {
        let author = author.ok_or(PublishError::MissingAuthor)?;

        if self.status == AnnouncementStatus::Archived {
            return Err(PublishError::Archived);
        }

        match author.role {
            Role::Employee => return Err(PublishError::EmployeeCannotPublish),
            Role::Manager => {
                if self.department_ids.is_empty() {
                    return Err(PublishError::ManagerMustTarget);
                }
                if !self
                    .department_ids
                    .iter()
                    .all(|id| author.managed_department_ids.contains(id))
                {
                    return Err(PublishError::UnmanagedDepartment);
                }
            }
            Role::GeneralManager => {}
        }

        Ok(())
    }

    pub fn archive(&mut self) {
        self.status = AnnouncementStatus::Archived;
    }
}

/// Editable fields of an announcement.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementDraft {
    pub title: String,
    pub content: String,
    pub pinned: bool,
    pub publish_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
    pub department_ids: Vec<Uuid>,
}

impl AnnouncementDraft {
    pub fn validate_schedule(&self) -> Result<(), AppError> {
        if let (Some(publish_at), Some(expire_at)) = (self.publish_at, self.expire_at) {
            if publish_at >= expire_at {
                return Err(AppError::Validation(
                    "Expire time must be after publish time.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementRead {
    pub announcement_id: Uuid,
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// Lower-case ASCII slug: letters, digits, `_` and single hyphens. Accented
/// letters are folded to their base letter; anything else non-ASCII is dropped.
pub fn slugify(title: &str) -> String {
    let ascii: String = title.nfkd().filter(char::is_ascii).collect();

    ascii
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

pub const FALLBACK_SLUG: &str = "announcement";

/// First of `base`, `base-2`, `base-3`, … that `is_taken` rejects.
pub fn unique_slug(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let base = if base.is_empty() { FALLBACK_SLUG } else { base };
    if !is_taken(base) {
        return base.to_string();
    }
    let mut i = 2;
    loop {
        let candidate = format!("{}-{}", base, i);
        if !is_taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn announcement(department_ids: Vec<Uuid>) -> Announcement {
        let now = Utc::now();
        Announcement {
            id: Uuid::new_v4(),
            title: "Team Update".to_string(),
            slug: "team-update".to_string(),
            content: "Body".to_string(),
            status: AnnouncementStatus::Draft,
            pinned: false,
            publish_at: None,
            expire_at: None,
            department_ids,
            author_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn author(role: Role, managed: &[Uuid]) -> PublishingAuthor {
        PublishingAuthor {
            user_id: Uuid::new_v4(),
            role,
            managed_department_ids: managed.iter().copied().collect(),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Team Update"), "team-update");
        assert_eq!(slugify("  Q3   Results -- Final  "), "q3-results-final");
        assert_eq!(slugify("Don't panic!"), "dont-panic");
        assert_eq!(slugify("snake_case title"), "snake_case-title");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_folds_accents_and_trims_underscores() {
        assert_eq!(slugify("Café Opening"), "cafe-opening");
        assert_eq!(slugify("Über Ärger"), "uber-arger");
        assert_eq!(slugify("_internal_ notes_"), "internal_-notes");
        assert_eq!(slugify("__"), "");
        assert_eq!(slugify("日本"), "");
    }

    #[test]
    fn test_unique_slug_suffixes() {
        let taken = ["team-update", "team-update-2"];
        assert_eq!(unique_slug("team-update", |s| taken.contains(&s)), "team-update-3");
        assert_eq!(unique_slug("fresh", |s| taken.contains(&s)), "fresh");
        assert_eq!(unique_slug("", |_| false), FALLBACK_SLUG);
    }

    #[test]
    fn test_publish_requires_author() {
        let mut a = announcement(vec![]);
        assert_eq!(a.publish(None, Utc::now()), Err(PublishError::MissingAuthor));
        assert_eq!(a.status, AnnouncementStatus::Draft);
    }

    #[test]
    fn test_employee_cannot_publish() {
        let dept = Uuid::new_v4();
        let mut a = announcement(vec![dept]);
        let result = a.publish(Some(&author(Role::Employee, &[dept])), Utc::now());
        assert_eq!(result, Err(PublishError::EmployeeCannotPublish));
        assert!(a.publish_at.is_none());
    }

    #[test]
    fn test_manager_publish_rules() {
        let managed = Uuid::new_v4();
        let other = Uuid::new_v4();
        let manager = author(Role::Manager, &[managed]);

        let mut global = announcement(vec![]);
        assert_eq!(global.publish(Some(&manager), Utc::now()), Err(PublishError::ManagerMustTarget));

        let mut mixed = announcement(vec![managed, other]);
        assert_eq!(mixed.publish(Some(&manager), Utc::now()), Err(PublishError::UnmanagedDepartment));

        let when = Utc::now();
        let mut ok = announcement(vec![managed]);
        assert!(ok.publish(Some(&manager), when).is_ok());
        assert_eq!(ok.status, AnnouncementStatus::Published);
        assert_eq!(ok.publish_at, Some(when));
    }

    #[test]
    fn test_check_publish_rules_leaves_state_alone() {
        let managed = Uuid::new_v4();
        let manager = author(Role::Manager, &[managed]);

        let mut published = announcement(vec![managed]);
        published.publish(Some(&manager), Utc::now()).unwrap();
        assert!(published.check_publish_rules(Some(&manager)).is_ok());

        published.department_ids.clear();
        assert_eq!(published.check_publish_rules(Some(&manager)), Err(PublishError::ManagerMustTarget));
        assert_eq!(published.status, AnnouncementStatus::Published);
    }

    #[test]
    fn test_gm_publish_keeps_existing_publish_at() {
        let scheduled = Utc::now() + Duration::days(2);
        let mut a = announcement(vec![]);
        a.publish_at = Some(scheduled);
        a.publish(Some(&author(Role::GeneralManager, &[])), Utc::now()).unwrap();
        assert_eq!(a.publish_at, Some(scheduled));
        assert!(!a.is_live(Utc::now()));
    }

    #[test]
    fn test_archived_is_terminal() {
        let mut a = announcement(vec![]);
        a.archive();
        let result = a.publish(Some(&author(Role::GeneralManager, &[])), Utc::now());
        assert_eq!(result, Err(PublishError::Archived));
        assert_eq!(a.status, AnnouncementStatus::Archived);
    }

    #[test]
    fn test_is_live_window() {
        let now = Utc::now();
        let mut a = announcement(vec![]);
        assert!(!a.is_live(now));

        a.status = AnnouncementStatus::Published;
        assert!(a.is_live(now));

        a.publish_at = Some(now + Duration::hours(1));
        assert!(!a.is_live(now));

        a.publish_at = Some(now);
        a.expire_at = Some(now);
        assert!(!a.is_live(now));

        a.expire_at = Some(now + Duration::seconds(1));
        assert!(a.is_live(now));
    }

    #[test]
    fn test_visibility_by_department() {
        let now = Utc::now();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();

        let mut targeted = announcement(vec![x]);
        targeted.status = AnnouncementStatus::Published;
        let mut global = announcement(vec![]);
        global.status = AnnouncementStatus::Published;

        let in_x = VisibilityScope { department_ids: [x].into_iter().collect(), sees_all: false };
        let in_y = VisibilityScope { department_ids: [y].into_iter().collect(), sees_all: false };
        let nobody = VisibilityScope::default();
        let gm = VisibilityScope { department_ids: HashSet::new(), sees_all: true };

        assert!(targeted.is_visible_to(&in_x, now));
        assert!(!targeted.is_visible_to(&in_y, now));
        assert!(!targeted.is_visible_to(&nobody, now));
        assert!(targeted.is_visible_to(&gm, now));

        for scope in [&in_x, &in_y, &nobody, &gm] {
            assert!(global.is_visible_to(scope, now));
        }
    }

    #[test]
    fn test_schedule_validation() {
        let now = Utc::now();
        let draft = AnnouncementDraft {
            publish_at: Some(now),
            expire_at: Some(now),
            ..Default::default()
        };
        assert!(draft.validate_schedule().is_err());

        let draft = AnnouncementDraft {
            publish_at: Some(now),
            expire_at: Some(now + Duration::minutes(1)),
            ..Default::default()
        };
        assert!(draft.validate_schedule().is_ok());
    }
}
