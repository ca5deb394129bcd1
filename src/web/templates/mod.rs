pub mod auth;

use askama::Template;
use axum::{
    response::{Html, IntoResponse, Response},
    http::StatusCode,
};
use chrono::{DateTime, FixedOffset, Utc};

use crate::{api::middleware::auth::CurrentUser, domain::Role};

/// The signed-in user as the page layout sees them.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role_label: String,
    pub is_gm: bool,
    pub is_manager: bool,
}

impl UserInfo {
    pub fn can_view_departments(&self) -> bool {
        self.is_gm || self.is_manager
    }
}

impl From<&CurrentUser> for UserInfo {
    fn from(current: &CurrentUser) -> Self {
        let user = &current.user;
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            display_name: user.display_name().to_string(),
            role_label: user.role.label().to_string(),
            is_gm: user.role == Role::GeneralManager,
            is_manager: user.role == Role::Manager,
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub message: String,
}

/// `2026-03-02 14:30` in the office's wall-clock time.
pub fn format_local(dt: DateTime<Utc>, offset: &FixedOffset) -> String {
    dt.with_timezone(offset).format("%Y-%m-%d %H:%M").to_string()
}

/// Value for an `<input type="datetime-local">`.
pub fn format_input(dt: Option<DateTime<Utc>>, offset: &FixedOffset) -> String {
    dt.map(|dt| dt.with_timezone(offset).format("%Y-%m-%dT%H:%M").to_string())
        .unwrap_or_default()
}

// Make askama templates work with axum
pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                tracing::error!("Failed to render template: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to render template: {}", err),
                ).into_response()
            }
        }
    }
}
