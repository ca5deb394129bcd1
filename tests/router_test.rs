mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use intranet::{api::create_app, config::Settings, domain::Role};
use tower::ServiceExt;

async fn app() -> anyhow::Result<Router> {
    let ctx = common::setup().await?;
    common::create_user(&ctx, "alice", Role::Employee).await?;
    Ok(create_app(Arc::new(ctx), Arc::new(Settings::default())))
}

async fn body_text(response: axum::response::Response) -> anyhow::Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn location(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// Logs in and returns the `Cookie` header value for the session.
async fn login(app: &Router) -> anyhow::Result<String> {
    let response = app
        .clone()
        .oneshot(
            Request::post("/auth/login/")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("username=alice&password={}", common::PASSWORD)))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard/"));

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| anyhow::anyhow!("login did not set a cookie"))?;

    Ok(set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string())
}

fn csrf_from(html: &str) -> Option<String> {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}

#[tokio::test]
async fn test_health_and_root() -> anyhow::Result<()> {
    let app = app().await?;

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await?, "OK");

    let response = app.oneshot(Request::get("/").body(Body::empty())?).await?;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), Some("/dashboard/"));
    Ok(())
}

#[tokio::test]
async fn test_anonymous_requests_go_to_login() -> anyhow::Result<()> {
    let app = app().await?;

    for path in ["/dashboard/", "/announcements/", "/bookings/rooms/", "/departments/"] {
        let response = app
            .clone()
            .oneshot(Request::get(path).body(Body::empty())?)
            .await?;
        assert!(response.status().is_redirection(), "{} should redirect", path);
        assert_eq!(location(&response), Some("/auth/login/"));
    }

    let response = app
        .oneshot(Request::get("/auth/login/").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_bad_login_rerenders_form() -> anyhow::Result<()> {
    let app = app().await?;

    let response = app
        .oneshot(
            Request::post("/auth/login/")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=alice&password=wrong"))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await?.contains("Invalid username or password."));
    Ok(())
}

#[tokio::test]
async fn test_posts_require_csrf_token() -> anyhow::Result<()> {
    let app = app().await?;
    let cookie = login(&app).await?;

    let dashboard = app
        .clone()
        .oneshot(
            Request::get("/dashboard/")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(dashboard.status(), StatusCode::OK);

    let form = "title=Team+Update&content=Hello";

    let forged = app
        .clone()
        .oneshot(
            Request::post("/announcements/new/")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))?,
        )
        .await?;
    assert_eq!(forged.status(), StatusCode::FORBIDDEN);

    let page = app
        .clone()
        .oneshot(
            Request::get("/announcements/new/")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(page.status(), StatusCode::OK);
    let token = csrf_from(&body_text(page).await?)
        .ok_or_else(|| anyhow::anyhow!("form has no CSRF token"))?;

    let created = app
        .clone()
        .oneshot(
            Request::post("/announcements/new/")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("csrf_token={}&{}", token, form)))?,
        )
        .await?;
    assert_eq!(created.status(), StatusCode::SEE_OTHER);
    assert!(location(&created).unwrap_or_default().starts_with("/announcements/team-update/"));

    // Employees cannot open the department directory.
    let departments = app
        .oneshot(
            Request::get("/departments/")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(departments.status(), StatusCode::FORBIDDEN);
    Ok(())
}
