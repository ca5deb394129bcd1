use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    api::{
        middleware::auth::{CurrentUser, SessionInfo},
        state::AppState,
    },
    auth::AuthService,
    web::templates::{HtmlTemplate, UserInfo},
};

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub username: String,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Template)]
#[template(path = "auth/password_change.html")]
pub struct PasswordChangeTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub error: Option<String>,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

// GET /auth/login/
pub async fn login_page() -> impl IntoResponse {
    HtmlTemplate(LoginTemplate {
        username: String::new(),
        error: None,
    })
}

// POST /auth/login/
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(credentials): Form<LoginRequest>,
) -> Response {
    let ctx = &state.service_context;

    let user = match AuthService::authenticate(
        ctx.user_repo.as_ref(),
        &credentials.username,
        &credentials.password,
    )
    .await
    {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let Some(user) = user else {
        tracing::info!("Failed login for {}", credentials.username.trim());
        return HtmlTemplate(LoginTemplate {
            username: credentials.username,
            error: Some("Invalid username or password.".to_string()),
        })
        .into_response();
    };

    let (_session, token) = match ctx.auth_service.create_session(user.id).await {
        Ok(created) => created,
        Err(e) => return e.into_response(),
    };

    tracing::info!("User {} logged in", user.username);

    let cookie = ctx
        .auth_service
        .create_session_cookie(&token, state.settings.server.secure_cookies);

    (jar.add(cookie), Redirect::to("/dashboard/")).into_response()
}

// POST /auth/logout/
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(session_info): Extension<SessionInfo>,
    jar: CookieJar,
) -> Response {
    let ctx = &state.service_context;

    if let Err(e) = ctx.csrf_service.delete_token(&session_info.session_id).await {
        tracing::warn!("Failed to drop CSRF token on logout: {}", e);
    }
    if let Err(e) = ctx.auth_service.invalidate_session(&session_info.token).await {
        return e.into_response();
    }

    (
        jar.add(AuthService::create_logout_cookie()),
        Redirect::to("/auth/login/"),
    )
        .into_response()
}

// GET /auth/password-change/
pub async fn password_change_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
) -> Response {
    render_password_change(&state, &current_user, &session_info, None, false).await
}

// POST /auth/password-change/
pub async fn password_change_handler(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Form(form): Form<PasswordChangeRequest>,
) -> Response {
    let ctx = &state.service_context;

    let result = ctx
        .user_service
        .change_password(
            current_user.user.id,
            &form.current_password,
            &form.new_password,
            &form.confirm_password,
        )
        .await;

    match result {
        Ok(()) => {
            // Other devices have to log in again with the new password.
            if let Err(e) = ctx
                .auth_service
                .invalidate_other_sessions(current_user.user.id, &session_info.token)
                .await
            {
                tracing::warn!("Failed to drop other sessions: {}", e);
            }
            render_password_change(&state, &current_user, &session_info, None, true).await
        }
        Err(e) if e.is_form_error() => {
            render_password_change(&state, &current_user, &session_info, Some(e.user_message()), false).await
        }
        Err(e) => e.into_response(),
    }
}

async fn render_password_change(
    state: &AppState,
    current_user: &CurrentUser,
    session_info: &SessionInfo,
    error: Option<String>,
    success: bool,
) -> Response {
    let csrf_token = match state
        .service_context
        .csrf_service
        .generate_token(&session_info.session_id)
        .await
    {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    HtmlTemplate(PasswordChangeTemplate {
        user: UserInfo::from(current_user),
        csrf_token,
        error,
        success,
    })
    .into_response()
}
