#![allow(dead_code)]

use intranet::{
    auth::Actor,
    config::Settings,
    domain::{CreateUserRequest, Department, CreateDepartmentRequest, Role, User},
    service::ServiceContext,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;

pub const PASSWORD: &str = "password123";

/// Fresh in-memory database with migrations applied. A single connection keeps
/// every query on the same in-memory database.
pub async fn setup() -> anyhow::Result<ServiceContext> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(ServiceContext::new(pool, &Settings::default())?)
}

/// A database file shared by several pool connections, so spawned tasks
/// really run their statements at the same time.
pub struct SharedDb {
    pub ctx: Arc<ServiceContext>,
    _dir: TempDir,
}

pub async fn setup_shared(connections: u32) -> anyhow::Result<SharedDb> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("intranet.db").display());

    let pool = SqlitePoolOptions::new()
        .max_connections(connections)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(SharedDb {
        ctx: Arc::new(ServiceContext::new(pool, &Settings::default())?),
        _dir: dir,
    })
}

pub async fn create_user(ctx: &ServiceContext, username: &str, role: Role) -> anyhow::Result<User> {
    Ok(ctx
        .user_service
        .create_user(CreateUserRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            full_name: String::new(),
            password: PASSWORD.to_string(),
            role,
        })
        .await?)
}

/// The actor as the middleware would build it right now.
pub async fn actor(ctx: &ServiceContext, user: &User) -> anyhow::Result<Actor> {
    Ok(ctx.user_service.actor_for(user).await?)
}

pub async fn gm(ctx: &ServiceContext) -> anyhow::Result<(User, Actor)> {
    let user = create_user(ctx, "gm", Role::GeneralManager).await?;
    let actor = actor(ctx, &user).await?;
    Ok((user, actor))
}

pub async fn department(ctx: &ServiceContext, gm: &Actor, name: &str) -> anyhow::Result<Department> {
    Ok(ctx
        .department_service
        .create(gm, CreateDepartmentRequest { name: name.to_string() })
        .await?)
}
