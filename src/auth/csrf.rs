use sqlx::SqlitePool;

use super::{generate_token, session::hash_token};
use crate::error::Result;

pub const CSRF_FIELD: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// One token per session, stored hashed.
pub struct CsrfService {
    pool: SqlitePool,
}

impl CsrfService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issues a fresh token for the session, replacing any previous one.
    pub async fn generate_token(&self, session_id: &str) -> Result<String> {
        let token = generate_token();

        sqlx::query(
            r#"
            INSERT INTO csrf_tokens (session_id, token_hash, created_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(session_id) DO UPDATE SET
                token_hash = excluded.token_hash,
                created_at = CURRENT_TIMESTAMP
            "#
        )
        .bind(session_id)
        .bind(hash_token(&token))
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    pub async fn validate_token(&self, session_id: &str, token: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM csrf_tokens WHERE session_id = ? AND token_hash = ?"
        )
        .bind(session_id)
        .bind(hash_token(token))
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn delete_token(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM csrf_tokens WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
