use std::collections::HashMap;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::Form;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{
        middleware::auth::{CurrentUser, SessionInfo},
        state::AppState,
    },
    auth::{authorize, Action, Actor, Resource},
    domain::{Announcement, AnnouncementDraft, AnnouncementStatus, Department, Role},
    error::{AppError, Result},
    web::templates::{format_input, format_local, HtmlTemplate, UserInfo},
};
use super::{csrf_token, redirect_with_notice, NoticeQuery, SelectOption};

/// An announcement as shown in reader-facing lists.
pub struct AnnouncementRow {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub pinned: bool,
    pub published: String,
    pub is_read: bool,
    pub is_global: bool,
}

impl AnnouncementRow {
    pub fn new(announcement: &Announcement, is_read: bool, offset: &FixedOffset) -> Self {
        Self {
            slug: announcement.slug.clone(),
            title: announcement.title.clone(),
            excerpt: excerpt(&announcement.content, 160),
            pinned: announcement.pinned,
            published: announcement
                .publish_at
                .map(|d| format_local(d, offset))
                .unwrap_or_default(),
            is_read,
            is_global: announcement.is_global(),
        }
    }
}

/// An announcement as shown to whoever manages it.
pub struct ManageRow {
    pub slug: String,
    pub title: String,
    pub status: String,
    pub pinned: bool,
    pub publish_at: String,
    pub expire_at: String,
    pub audience: String,
    pub can_edit: bool,
    pub can_publish: bool,
    pub can_archive: bool,
}

impl ManageRow {
    fn new(
        actor: &Actor,
        announcement: &Announcement,
        names: &HashMap<Uuid, String>,
        offset: &FixedOffset,
    ) -> Self {
        let allowed = |action| authorize(actor, action, Resource::Announcement(announcement)).is_allowed();
        Self {
            slug: announcement.slug.clone(),
            title: announcement.title.clone(),
            status: announcement.status.as_str().to_string(),
            pinned: announcement.pinned,
            publish_at: announcement
                .publish_at
                .map(|d| format_local(d, offset))
                .unwrap_or_default(),
            expire_at: announcement
                .expire_at
                .map(|d| format_local(d, offset))
                .unwrap_or_default(),
            audience: audience(announcement, names),
            can_edit: allowed(Action::Edit),
            can_publish: announcement.status == AnnouncementStatus::Draft && allowed(Action::Publish),
            can_archive: announcement.status != AnnouncementStatus::Archived && allowed(Action::Archive),
        }
    }
}

fn excerpt(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

fn audience(announcement: &Announcement, names: &HashMap<Uuid, String>) -> String {
    if announcement.is_global() {
        return "Everyone".to_string();
    }
    let mut labels: Vec<&str> = announcement
        .department_ids
        .iter()
        .filter_map(|id| names.get(id).map(String::as_str))
        .collect();
    labels.sort_unstable();
    labels.join(", ")
}

async fn department_names(state: &AppState) -> Result<HashMap<Uuid, String>> {
    Ok(state
        .service_context
        .department_service
        .list_all()
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "announcements/list.html")]
pub struct AnnouncementsTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub announcements: Vec<AnnouncementRow>,
    pub managed: Vec<ManageRow>,
    pub can_bulk: bool,
    pub notice: Option<String>,
}

pub async fn announcements_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Query(query): Query<NoticeQuery>,
) -> Result<Response> {
    let ctx = &state.service_context;
    let offset = *state.service_context.booking_service.offset();
    let actor = &current_user.actor;

    let visible = ctx.announcement_service.visible_for(actor).await?;
    let read_ids = ctx.announcement_service.read_ids_for(actor.user_id).await?;
    let names = department_names(&state).await?;

    let managed = ctx
        .announcement_service
        .manageable_by(actor)
        .await?
        .iter()
        .map(|a| ManageRow::new(actor, a, &names, &offset))
        .collect();

    Ok(HtmlTemplate(AnnouncementsTemplate {
        user: UserInfo::from(&current_user),
        csrf_token: csrf_token(&state, &session_info).await?,
        announcements: visible
            .iter()
            .map(|a| AnnouncementRow::new(a, read_ids.contains(&a.id), &offset))
            .collect(),
        managed,
        can_bulk: actor.role != Role::Employee,
        notice: query.notice,
    })
    .into_response())
}

// ---------------------------------------------------------------------------
// Create / edit
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "announcements/form.html")]
pub struct AnnouncementFormTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub heading: String,
    pub action: String,
    pub slug: Option<String>,
    pub title: String,
    pub content: String,
    pub pinned: bool,
    pub publish_at: String,
    pub expire_at: String,
    pub departments: Vec<SelectOption>,
    pub target_hint: String,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AnnouncementForm {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters."))]
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1, message = "Content is required."))]
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pinned: Option<String>,
    #[serde(default)]
    pub publish_at: String,
    #[serde(default)]
    pub expire_at: String,
    #[serde(default)]
    pub departments: Vec<String>,
}

fn parse_local(value: &str, offset: &FixedOffset) -> Result<Option<DateTime<Utc>>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| AppError::Validation("Enter a valid date and time.".to_string()))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .ok_or_else(|| AppError::Validation("Enter a valid date and time.".to_string()))
}

impl AnnouncementForm {
    fn from_announcement(announcement: &Announcement, offset: &FixedOffset) -> Self {
        Self {
            title: announcement.title.clone(),
            content: announcement.content.clone(),
            pinned: announcement.pinned.then(|| "on".to_string()),
            publish_at: format_input(announcement.publish_at, offset),
            expire_at: format_input(announcement.expire_at, offset),
            departments: announcement
                .department_ids
                .iter()
                .map(Uuid::to_string)
                .collect(),
        }
    }

    fn to_draft(&self, offset: &FixedOffset) -> Result<AnnouncementDraft> {
        self.validate()?;

        let department_ids = self
            .departments
            .iter()
            .filter(|id| !id.trim().is_empty())
            .map(|id| {
                Uuid::parse_str(id.trim())
                    .map_err(|_| AppError::Validation("Unknown department selected.".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(AnnouncementDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            pinned: self.pinned.is_some(),
            publish_at: parse_local(&self.publish_at, offset)?,
            expire_at: parse_local(&self.expire_at, offset)?,
            department_ids,
        })
    }
}

/// Managers may only target the departments they manage.
async fn target_choices(state: &AppState, actor: &Actor) -> Result<Vec<Department>> {
    let departments = state.service_context.department_service.list_all().await?;
    if actor.role == Role::Manager {
        Ok(departments.into_iter().filter(|d| actor.manages(d.id)).collect())
    } else {
        Ok(departments)
    }
}

fn target_hint(actor: &Actor) -> String {
    match actor.role {
        Role::Manager => "Select at least one of your departments before publishing.",
        _ => "Leave empty to address everyone.",
    }
    .to_string()
}

async fn render_form(
    state: &AppState,
    current_user: &CurrentUser,
    session_info: &SessionInfo,
    slug: Option<String>,
    form: AnnouncementForm,
    error: Option<String>,
) -> Result<Response> {
    let choices = target_choices(state, &current_user.actor).await?;
    let departments = choices
        .iter()
        .map(|d| {
            let value = d.id.to_string();
            SelectOption {
                selected: form.departments.contains(&value),
                value,
                label: d.name.clone(),
            }
        })
        .collect();

    let (heading, action) = match &slug {
        Some(slug) => ("Edit announcement".to_string(), format!("/announcements/edit/{}/", slug)),
        None => ("New announcement".to_string(), "/announcements/new/".to_string()),
    };

    Ok(HtmlTemplate(AnnouncementFormTemplate {
        user: UserInfo::from(current_user),
        csrf_token: csrf_token(state, session_info).await?,
        heading,
        action,
        slug,
        title: form.title,
        content: form.content,
        pinned: form.pinned.is_some(),
        publish_at: form.publish_at,
        expire_at: form.expire_at,
        departments,
        target_hint: target_hint(&current_user.actor),
        error,
    })
    .into_response())
}

pub async fn new_announcement_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
) -> Result<Response> {
    authorize(&current_user.actor, Action::Create, Resource::NewAnnouncement).into_result()?;
    render_form(&state, &current_user, &session_info, None, AnnouncementForm::default(), None).await
}

pub async fn create_announcement(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Form(form): Form<AnnouncementForm>,
) -> Result<Response> {
    let offset = *state.service_context.booking_service.offset();

    let result = match form.to_draft(&offset) {
        Ok(draft) => {
            state
                .service_context
                .announcement_service
                .create(&current_user.actor, draft)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(announcement) => Ok(redirect_with_notice(
            &format!("/announcements/{}/", announcement.slug),
            "Draft saved.",
        )
        .into_response()),
        Err(e) if e.is_form_error() => {
            let message = e.user_message();
            render_form(&state, &current_user, &session_info, None, form, Some(message)).await
        }
        Err(e) => Err(e),
    }
}

pub async fn edit_announcement_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let announcement = state.service_context.announcement_service.get(&slug).await?;
    authorize(&current_user.actor, Action::Edit, Resource::Announcement(&announcement)).into_result()?;

    let form = AnnouncementForm::from_announcement(&announcement, state.service_context.booking_service.offset());
    render_form(&state, &current_user, &session_info, Some(slug), form, None).await
}

pub async fn update_announcement(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(slug): Path<String>,
    Form(form): Form<AnnouncementForm>,
) -> Result<Response> {
    let offset = *state.service_context.booking_service.offset();

    let result = match form.to_draft(&offset) {
        Ok(draft) => {
            state
                .service_context
                .announcement_service
                .update(&current_user.actor, &slug, draft)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(announcement) => Ok(redirect_with_notice(
            &format!("/announcements/{}/", announcement.slug),
            "Announcement updated.",
        )
        .into_response()),
        Err(e) if e.is_form_error() => {
            let message = e.user_message();
            render_form(&state, &current_user, &session_info, Some(slug), form, Some(message)).await
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Detail and actions
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "announcements/detail.html")]
pub struct AnnouncementDetailTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub item: ManageRow,
    pub content: String,
    pub author: String,
    pub is_live: bool,
    pub is_read: bool,
    pub read_count: Option<i64>,
    pub notice: Option<String>,
}

pub async fn announcement_detail_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(slug): Path<String>,
    Query(query): Query<NoticeQuery>,
) -> Result<Response> {
    let ctx = &state.service_context;
    let offset = *state.service_context.booking_service.offset();
    let actor = &current_user.actor;

    let announcement = ctx.announcement_service.find_for_viewer(actor, &slug).await?;
    let names = department_names(&state).await?;

    let author = match announcement.author_id {
        Some(id) => ctx
            .user_service
            .find_by_id(id)
            .await?
            .map(|u| u.display_name().to_string())
            .unwrap_or_default(),
        None => String::new(),
    };

    let read_count = if authorize(actor, Action::ViewReadStats, Resource::Announcement(&announcement)).is_allowed() {
        Some(ctx.announcement_service.read_count(actor, &announcement).await?)
    } else {
        None
    };

    let is_read = ctx
        .announcement_service
        .is_read_by(announcement.id, actor.user_id)
        .await?;

    Ok(HtmlTemplate(AnnouncementDetailTemplate {
        user: UserInfo::from(&current_user),
        csrf_token: csrf_token(&state, &session_info).await?,
        item: ManageRow::new(actor, &announcement, &names, &offset),
        content: announcement.content.clone(),
        author,
        is_live: announcement.is_live(Utc::now()),
        is_read,
        read_count,
        notice: query.notice,
    })
    .into_response())
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response> {
    state
        .service_context
        .announcement_service
        .mark_read(&current_user.actor, &slug)
        .await?;

    Ok(redirect_with_notice(&format!("/announcements/{}/", slug), "Marked as read.").into_response())
}

pub async fn publish_announcement(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let result = state
        .service_context
        .announcement_service
        .publish(&current_user.actor, &slug, Utc::now())
        .await;

    let notice = match result {
        Ok(_) => "Announcement published.".to_string(),
        Err(e) if e.is_form_error() => e.user_message(),
        Err(e) => return Err(e),
    };

    Ok(redirect_with_notice(&format!("/announcements/{}/", slug), &notice).into_response())
}

pub async fn archive_announcement(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response> {
    state
        .service_context
        .announcement_service
        .archive(&current_user.actor, &slug)
        .await?;

    Ok(redirect_with_notice(&format!("/announcements/{}/", slug), "Announcement archived.").into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkForm {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub slugs: Vec<String>,
}

pub async fn bulk_action(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Form(form): Form<BulkForm>,
) -> Result<Response> {
    let service = &state.service_context.announcement_service;
    let actor = &current_user.actor;

    if form.slugs.is_empty() {
        return Ok(redirect_with_notice("/announcements/", "Select at least one announcement.").into_response());
    }

    let notice = match form.action.as_str() {
        "publish" => service
            .bulk_publish(actor, &form.slugs, Utc::now())
            .await
            .summary("Published"),
        "archive" => service.bulk_archive(actor, &form.slugs).await.summary("Archived"),
        other => return Err(AppError::BadRequest(format!("Unknown bulk action: {}", other))),
    };

    Ok(redirect_with_notice("/announcements/", &notice).into_response())
}
