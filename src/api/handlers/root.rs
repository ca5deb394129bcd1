use axum::{http::StatusCode, response::{IntoResponse, Redirect}};

pub async fn root() -> impl IntoResponse {
    Redirect::to("/dashboard/")
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
