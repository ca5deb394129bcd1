pub mod templates;
pub mod portal;

use axum::{
    Router,
    routing::get,
};
use crate::api::state::AppState;

pub fn create_web_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Auth pages
        .route("/auth/login/", get(templates::auth::login_page).post(templates::auth::login_handler))

        // Everything else requires a session
        .merge(portal::create_portal_routes(state))
}
