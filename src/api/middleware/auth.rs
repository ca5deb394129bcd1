use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::{csrf::{CSRF_FIELD, CSRF_HEADER}, Actor, SESSION_COOKIE},
    domain::User,
    error::AppError,
};

/// Largest form body the CSRF check will buffer.
const MAX_FORM_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
    pub actor: Actor,
}

#[derive(Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub token: String,
}

/// Resolves the session cookie into a `CurrentUser`. Anonymous or expired
/// sessions are sent to the login page.
pub async fn require_auth_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session_cookie) = jar.get(SESSION_COOKIE) else {
        return Redirect::to("/auth/login/").into_response();
    };
    let token = session_cookie.value().to_string();

    let ctx = &state.service_context;

    let session = match ctx.auth_service.validate_session(&token).await {
        Ok(Some(session)) => session,
        Ok(None) => return Redirect::to("/auth/login/").into_response(),
        Err(e) => return e.into_response(),
    };

    let user = match ctx.user_service.find_by_id(session.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Redirect::to("/auth/login/").into_response(),
        Err(e) => return e.into_response(),
    };

    let actor = match ctx.user_service.actor_for(&user).await {
        Ok(actor) => actor,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(CurrentUser { user, actor });
    request.extensions_mut().insert(SessionInfo {
        session_id: session.id,
        token,
    });

    next.run(request).await
}

/// Checks the CSRF token on state-changing requests. The token is read from
/// the `X-CSRF-Token` header or the `csrf_token` form field.
pub async fn require_csrf(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(request).await);
    }

    let session_id = request
        .extensions()
        .get::<SessionInfo>()
        .map(|s| s.session_id.clone())
        .ok_or(AppError::Unauthorized)?;

    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(format!("Unreadable request body: {}", e)))?;

    let token = match header_token {
        Some(token) => Some(token),
        None => serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
            .ok()
            .and_then(|fields| {
                fields
                    .into_iter()
                    .find(|(k, _)| k == CSRF_FIELD)
                    .map(|(_, v)| v)
            }),
    };

    let valid = match token {
        Some(token) => state
            .service_context
            .csrf_service
            .validate_token(&session_id, &token)
            .await?,
        None => false,
    };

    if !valid {
        tracing::warn!("CSRF check failed for {} {}", parts.method, parts.uri);
        return Err(AppError::Forbidden(
            "Your form has expired. Go back, reload the page and try again.".to_string(),
        ));
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}
