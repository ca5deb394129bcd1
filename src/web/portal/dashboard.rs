use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension,
};

use crate::{
    api::{
        middleware::auth::{CurrentUser, SessionInfo},
        state::AppState,
    },
    domain::Role,
    error::Result,
    web::templates::{HtmlTemplate, UserInfo},
};
use super::{announcements::AnnouncementRow, bookings::BookingRow, csrf_token};

const DASHBOARD_ITEMS: usize = 5;

#[derive(Template)]
#[template(path = "dashboard/index.html")]
pub struct DashboardTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub announcements: Vec<AnnouncementRow>,
    pub unread_count: usize,
    pub bookings: Vec<BookingRow>,
    pub departments: Vec<DepartmentSummary>,
}

pub struct DepartmentSummary {
    pub id: String,
    pub name: String,
    pub members_count: usize,
    pub managers_count: usize,
}

pub async fn dashboard_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
) -> Result<Response> {
    let ctx = &state.service_context;
    let offset = *state.service_context.booking_service.offset();
    let actor = &current_user.actor;

    let visible = ctx.announcement_service.visible_for(actor).await?;
    let read_ids = ctx.announcement_service.read_ids_for(actor.user_id).await?;
    let unread_count = visible.iter().filter(|a| !read_ids.contains(&a.id)).count();

    let announcements = visible
        .iter()
        .take(DASHBOARD_ITEMS)
        .map(|a| AnnouncementRow::new(a, read_ids.contains(&a.id), &offset))
        .collect();

    let bookings = ctx
        .booking_service
        .bookings_for_user(actor.user_id)
        .await?
        .iter()
        .take(DASHBOARD_ITEMS)
        .map(|b| BookingRow::new(b, &offset))
        .collect();

    let departments = if actor.role == Role::Employee {
        Vec::new()
    } else {
        ctx.department_service
            .list_for(actor)
            .await?
            .into_iter()
            .map(|d| DepartmentSummary {
                id: d.id.to_string(),
                members_count: d.members_count(),
                managers_count: d.managers_count(),
                name: d.name,
            })
            .collect()
    };

    tracing::debug!(
        "Dashboard for {}: {} unread of {} live",
        current_user.user.username,
        unread_count,
        visible.len()
    );

    Ok(HtmlTemplate(DashboardTemplate {
        user: UserInfo::from(&current_user),
        csrf_token: csrf_token(&state, &session_info).await?,
        announcements,
        unread_count,
        bookings,
        departments,
    })
    .into_response())
}
