mod common;

use intranet::{auth::AuthService, domain::Role, error::AppError};

#[tokio::test]
async fn test_login_by_username_or_email() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let alice = common::create_user(&ctx, "alice", Role::Employee).await?;
    let users = ctx.user_repo.as_ref();

    let by_name = AuthService::authenticate(users, "alice", common::PASSWORD).await?;
    assert_eq!(by_name.map(|u| u.id), Some(alice.id));

    let by_email = AuthService::authenticate(users, "alice@example.com", common::PASSWORD).await?;
    assert_eq!(by_email.map(|u| u.id), Some(alice.id));

    assert!(AuthService::authenticate(users, "alice", "wrong-password").await?.is_none());
    assert!(AuthService::authenticate(users, "nobody", common::PASSWORD).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_users_rejected() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    common::create_user(&ctx, "alice", Role::Employee).await?;

    let again = common::create_user(&ctx, "alice", Role::Manager).await;
    let err = again.unwrap_err().downcast::<AppError>()?;
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn test_session_lifecycle() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let alice = common::create_user(&ctx, "alice", Role::Employee).await?;
    let auth = &ctx.auth_service;

    let (session, token) = auth.create_session(alice.id).await?;
    let (_, other_token) = auth.create_session(alice.id).await?;

    let found = auth.validate_session(&token).await?.expect("session should be valid");
    assert_eq!(found.id, session.id);
    assert_eq!(found.user_id, alice.id);
    assert!(auth.validate_session("not-a-token").await?.is_none());

    // A password change keeps only the current session.
    assert_eq!(auth.invalidate_other_sessions(alice.id, &token).await?, 1);
    assert!(auth.validate_session(&other_token).await?.is_none());
    assert!(auth.validate_session(&token).await?.is_some());

    auth.invalidate_session(&token).await?;
    assert!(auth.validate_session(&token).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_csrf_token_is_replaced() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let alice = common::create_user(&ctx, "alice", Role::Employee).await?;
    let (session, _) = ctx.auth_service.create_session(alice.id).await?;
    let csrf = &ctx.csrf_service;

    let first = csrf.generate_token(&session.id).await?;
    assert!(csrf.validate_token(&session.id, &first).await?);

    let second = csrf.generate_token(&session.id).await?;
    assert!(csrf.validate_token(&session.id, &second).await?);
    assert!(!csrf.validate_token(&session.id, &first).await?);
    assert!(!csrf.validate_token("other-session", &second).await?);

    csrf.delete_token(&session.id).await?;
    assert!(!csrf.validate_token(&session.id, &second).await?);
    Ok(())
}

#[tokio::test]
async fn test_change_password() -> anyhow::Result<()> {
    let ctx = common::setup().await?;
    let alice = common::create_user(&ctx, "alice", Role::Employee).await?;
    let users = &ctx.user_service;

    let wrong = users.change_password(alice.id, "nope", "new-password", "new-password").await;
    assert!(matches!(wrong, Err(AppError::Validation(_))));

    let mismatch = users.change_password(alice.id, common::PASSWORD, "new-password", "other").await;
    assert!(matches!(mismatch, Err(AppError::Validation(_))));

    let short = users.change_password(alice.id, common::PASSWORD, "short", "short").await;
    assert!(matches!(short, Err(AppError::Validation(_))));

    users.change_password(alice.id, common::PASSWORD, "new-password", "new-password").await?;

    let repo = ctx.user_repo.as_ref();
    assert!(AuthService::authenticate(repo, "alice", "new-password").await?.is_some());
    assert!(AuthService::authenticate(repo, "alice", common::PASSWORD).await?.is_none());
    Ok(())
}
