use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    auth::{authorize, Action, Actor, Resource},
    domain::*,
    error::{AppError, Result},
    repository::{AnnouncementRepository, DepartmentRepository, UserRepository},
};

/// Result of a bulk action: slugs that went through and slugs skipped with the reason.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

impl BulkOutcome {
    pub fn summary(&self, verb: &str) -> String {
        if self.skipped.is_empty() {
            format!("{} {} announcement(s).", verb, self.succeeded.len())
        } else {
            format!(
                "{} {} announcement(s), skipped {}.",
                verb,
                self.succeeded.len(),
                self.skipped.len()
            )
        }
    }
}

pub struct AnnouncementService {
    repo: Arc<dyn AnnouncementRepository>,
    department_repo: Arc<dyn DepartmentRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl AnnouncementService {
    pub fn new(
        repo: Arc<dyn AnnouncementRepository>,
        department_repo: Arc<dyn DepartmentRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self { repo, department_repo, user_repo }
    }

    /// Stores a new draft authored by `actor` under a fresh slug.
    pub async fn create(&self, actor: &Actor, draft: AnnouncementDraft) -> Result<Announcement> {
        authorize(actor, Action::Create, Resource::NewAnnouncement).into_result()?;
        let draft = Self::validate(actor, draft)?;

        let now = Utc::now();
        let announcement = Announcement {
            id: Uuid::new_v4(),
            title: draft.title,
            slug: String::new(),
            content: draft.content,
            status: AnnouncementStatus::Draft,
            pinned: draft.pinned,
            publish_at: draft.publish_at,
            expire_at: draft.expire_at,
            department_ids: draft.department_ids,
            author_id: Some(actor.user_id),
            created_at: now,
            updated_at: now,
        };

        let mut base = slugify(&announcement.title);
        if base.is_empty() {
            base = FALLBACK_SLUG.to_string();
        }
        let created = self.repo.create(announcement, &base).await?;

        tracing::info!("Announcement {} drafted by {}", created.slug, actor.user_id);
        Ok(created)
    }

    /// Edits content, schedule and targets. Slug and status stay as they are;
    /// a published announcement must still satisfy its author's publish rules.
    pub async fn update(&self, actor: &Actor, slug: &str, draft: AnnouncementDraft) -> Result<Announcement> {
        let mut announcement = self.get(slug).await?;
        authorize(actor, Action::Edit, Resource::Announcement(&announcement)).into_result()?;
        let draft = Self::validate(actor, draft)?;

        announcement.title = draft.title;
        announcement.content = draft.content;
        announcement.pinned = draft.pinned;
        announcement.publish_at = draft.publish_at;
        announcement.expire_at = draft.expire_at;
        announcement.department_ids = draft.department_ids;

        if announcement.is_published() {
            let author = self.publishing_author(announcement.author_id).await?;
            if let Err(e) = announcement.check_publish_rules(author.as_ref()) {
                tracing::warn!("Edit of published {} rejected: {}", announcement.slug, e);
                return Err(e.into());
            }
        }

        let updated = self.repo.update(announcement).await?;
        tracing::info!("Announcement {} updated by {}", updated.slug, actor.user_id);
        Ok(updated)
    }

    /// The actor must be allowed to publish; the target rules are checked
    /// against the announcement's author.
    pub async fn publish(&self, actor: &Actor, slug: &str, when: DateTime<Utc>) -> Result<Announcement> {
        let announcement = self.get(slug).await?;
        self.publish_loaded(actor, announcement, when).await
    }

    pub async fn archive(&self, actor: &Actor, slug: &str) -> Result<Announcement> {
        let announcement = self.get(slug).await?;
        self.archive_loaded(actor, announcement).await
    }

    /// Publishes each slug in turn. Announcements without an author get the
    /// actor as author first; failures are skipped.
    pub async fn bulk_publish(&self, actor: &Actor, slugs: &[String], when: DateTime<Utc>) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for slug in slugs {
            let result = match self.get(slug).await {
                Ok(mut announcement) => {
                    if announcement.author_id.is_none() {
                        announcement.author_id = Some(actor.user_id);
                    }
                    self.publish_loaded(actor, announcement, when).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => outcome.succeeded.push(slug.clone()),
                Err(e) => {
                    tracing::debug!("Bulk publish skipped {}: {}", slug, e);
                    outcome.skipped.push((slug.clone(), e.user_message()));
                }
            }
        }

        tracing::info!(
            "Bulk publish by {}: {} published, {} skipped",
            actor.user_id,
            outcome.succeeded.len(),
            outcome.skipped.len()
        );
        outcome
    }

    pub async fn bulk_archive(&self, actor: &Actor, slugs: &[String]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for slug in slugs {
            let result = match self.get(slug).await {
                Ok(announcement) => self.archive_loaded(actor, announcement).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => outcome.succeeded.push(slug.clone()),
                Err(e) => {
                    tracing::debug!("Bulk archive skipped {}: {}", slug, e);
                    outcome.skipped.push((slug.clone(), e.user_message()));
                }
            }
        }

        tracing::info!(
            "Bulk archive by {}: {} archived, {} skipped",
            actor.user_id,
            outcome.succeeded.len(),
            outcome.skipped.len()
        );
        outcome
    }

    /// Live announcements the viewer may see, pinned first.
    pub async fn visible_for(&self, actor: &Actor) -> Result<Vec<Announcement>> {
        self.repo
            .list_visible(actor.user_id, actor.is_gm(), Utc::now())
            .await
    }

    /// Announcements the actor can manage: everything for a GM, otherwise their own.
    pub async fn manageable_by(&self, actor: &Actor) -> Result<Vec<Announcement>> {
        if actor.is_gm() {
            self.repo.list().await
        } else {
            self.repo.list_by_author(actor.user_id).await
        }
    }

    pub async fn scope_for(&self, actor: &Actor) -> Result<VisibilityScope> {
        let department_ids = self.department_repo.affiliated_ids(actor.user_id).await?;
        Ok(VisibilityScope {
            department_ids: department_ids.into_iter().collect(),
            sees_all: actor.is_gm(),
        })
    }

    /// Loads an announcement for reading. Viewers who may not see it and
    /// cannot edit it get `NotFound`.
    pub async fn find_for_viewer(&self, actor: &Actor, slug: &str) -> Result<Announcement> {
        let announcement = self.get(slug).await?;

        let scope = self.scope_for(actor).await?;
        if announcement.is_visible_to(&scope, Utc::now())
            || authorize(actor, Action::Edit, Resource::Announcement(&announcement)).is_allowed()
        {
            Ok(announcement)
        } else {
            Err(AppError::NotFound("Announcement not found".to_string()))
        }
    }

    /// Records that the actor read the announcement. Repeated calls keep the
    /// first read time.
    pub async fn mark_read(&self, actor: &Actor, slug: &str) -> Result<AnnouncementRead> {
        let announcement = self.find_for_viewer(actor, slug).await?;
        let read = self.repo.mark_read(announcement.id, actor.user_id).await?;
        tracing::debug!("User {} read {}", actor.user_id, announcement.slug);
        Ok(read)
    }

    pub async fn is_read_by(&self, announcement_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.repo.is_read_by(announcement_id, user_id).await
    }

    pub async fn read_count(&self, actor: &Actor, announcement: &Announcement) -> Result<i64> {
        authorize(actor, Action::ViewReadStats, Resource::Announcement(announcement)).into_result()?;
        self.repo.read_count(announcement.id).await
    }

    pub async fn read_ids_for(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        self.repo.read_ids_for_user(user_id).await
    }

    pub async fn get(&self, slug: &str) -> Result<Announcement> {
        self.repo
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    async fn publish_loaded(
        &self,
        actor: &Actor,
        mut announcement: Announcement,
        when: DateTime<Utc>,
    ) -> Result<Announcement> {
        authorize(actor, Action::Publish, Resource::Announcement(&announcement)).into_result()?;

        let author = self.publishing_author(announcement.author_id).await?;
        if let Err(e) = announcement.publish(author.as_ref(), when) {
            tracing::warn!("Publish of {} rejected: {}", announcement.slug, e);
            return Err(e.into());
        }

        let published = self.repo.update(announcement).await?;
        tracing::info!("Announcement {} published by {}", published.slug, actor.user_id);
        Ok(published)
    }

    async fn archive_loaded(&self, actor: &Actor, mut announcement: Announcement) -> Result<Announcement> {
        authorize(actor, Action::Archive, Resource::Announcement(&announcement)).into_result()?;

        announcement.archive();
        let archived = self.repo.update(announcement).await?;
        tracing::info!("Announcement {} archived by {}", archived.slug, actor.user_id);
        Ok(archived)
    }

    async fn publishing_author(&self, author_id: Option<Uuid>) -> Result<Option<PublishingAuthor>> {
        let Some(author_id) = author_id else {
            return Ok(None);
        };
        let Some(author) = self.user_repo.find_by_id(author_id).await? else {
            return Ok(None);
        };

        let managed = self.department_repo.managed_ids(author.id).await?;
        Ok(Some(PublishingAuthor {
            user_id: author.id,
            role: author.role,
            managed_department_ids: managed.into_iter().collect(),
        }))
    }

    fn validate(actor: &Actor, mut draft: AnnouncementDraft) -> Result<AnnouncementDraft> {
        draft.title = draft.title.trim().to_string();
        if draft.title.is_empty() {
            return Err(AppError::Validation("Title is required.".to_string()));
        }
        if draft.title.chars().count() > 200 {
            return Err(AppError::Validation("Title must be at most 200 characters.".to_string()));
        }
        if draft.content.trim().is_empty() {
            return Err(AppError::Validation("Content is required.".to_string()));
        }
        draft.validate_schedule()?;

        if actor.role == Role::Manager
            && !draft.department_ids.iter().all(|id| actor.manages(*id))
        {
            return Err(AppError::Validation(
                "You can only target departments you manage.".to_string(),
            ));
        }

        draft.department_ids.sort();
        draft.department_ids.dedup();
        Ok(draft)
    }
}
