mod announcements;
mod bookings;
mod dashboard;
mod departments;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
    middleware,
};
use crate::{
    api::{middleware::auth::SessionInfo, state::AppState},
    error::Result,
    web::templates::auth as auth_pages,
};

pub fn create_portal_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard/", get(dashboard::dashboard_page))

        // Account
        .route("/auth/logout/", post(auth_pages::logout_handler))
        .route(
            "/auth/password-change/",
            get(auth_pages::password_change_page).post(auth_pages::password_change_handler),
        )

        // Bookings
        .route("/bookings/", get(|| async { Redirect::to("/bookings/rooms/") }))
        .route("/bookings/rooms/", get(bookings::rooms_page))
        .route(
            "/bookings/rooms/new/:room_id/",
            get(bookings::new_booking_page).post(bookings::create_booking),
        )
        .route(
            "/bookings/rooms/add/",
            get(bookings::add_room_page).post(bookings::create_room),
        )
        .route("/bookings/mine/", get(bookings::my_bookings_page))

        // Announcements
        .route("/announcements/", get(announcements::announcements_page))
        .route(
            "/announcements/new/",
            get(announcements::new_announcement_page).post(announcements::create_announcement),
        )
        .route(
            "/announcements/edit/:slug/",
            get(announcements::edit_announcement_page).post(announcements::update_announcement),
        )
        .route("/announcements/bulk/", post(announcements::bulk_action))
        .route("/announcements/:slug/", get(announcements::announcement_detail_page))
        .route("/announcements/:slug/read/", post(announcements::mark_read))
        .route("/announcements/:slug/publish/", post(announcements::publish_announcement))
        .route("/announcements/:slug/archive/", post(announcements::archive_announcement))

        // Departments
        .route("/departments/", get(departments::departments_page))
        .route(
            "/departments/create/",
            get(departments::create_department_page).post(departments::create_department),
        )
        .route(
            "/departments/:id/edit/",
            get(departments::edit_department_page).post(departments::rename_department),
        )
        .route(
            "/departments/:id/managers/",
            get(departments::managers_page).post(departments::update_managers),
        )
        .route(
            "/departments/:id/members/",
            get(departments::members_page).post(departments::update_members),
        )

        // CSRF protection for state-changing requests (runs after auth)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::api::middleware::auth::require_csrf,
        ))
        // Require authentication for all portal routes (runs first)
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::api::middleware::auth::require_auth_redirect,
        ))
}

/// Issues the CSRF token embedded in every form on the page.
pub(crate) async fn csrf_token(state: &AppState, session_info: &SessionInfo) -> Result<String> {
    state
        .service_context
        .csrf_service
        .generate_token(&session_info.session_id)
        .await
}

/// Redirects to `path` with a one-line notice for the next page to show.
pub(crate) fn redirect_with_notice(path: &str, notice: &str) -> Redirect {
    match serde_urlencoded::to_string([("notice", notice)]) {
        Ok(query) => Redirect::to(&format!("{}?{}", path, query)),
        Err(_) => Redirect::to(path),
    }
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

/// One `<option>` or checkbox in a form.
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}
