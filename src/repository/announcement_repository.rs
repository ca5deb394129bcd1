use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::{
    domain::{unique_slug, Announcement, AnnouncementRead, AnnouncementStatus},
    error::{AppError, Result},
    repository::{is_unique_violation, parse_uuid, parse_uuid_list, to_utc, AnnouncementRepository},
};

// Database row struct that matches SQLite schema
#[derive(FromRow)]
struct AnnouncementRow {
    id: String,
    title: String,
    slug: String,
    content: String,
    status: String,
    pinned: bool,
    publish_at: Option<NaiveDateTime>,
    expire_at: Option<NaiveDateTime>,
    department_ids: Option<String>,
    author_id: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const ANNOUNCEMENT_SELECT: &str = r#"
    SELECT a.id, a.title, a.slug, a.content, a.status, a.pinned, a.publish_at, a.expire_at,
        a.author_id, a.created_at, a.updated_at,
        (SELECT GROUP_CONCAT(department_id) FROM announcement_departments WHERE announcement_id = a.id) AS department_ids
    FROM announcements a
"#;

const ORDER_FOR_LIST: &str = "ORDER BY a.pinned DESC, a.publish_at DESC, a.created_at DESC";

const SLUG_ATTEMPTS: usize = 20;

pub struct SqliteAnnouncementRepository {
    pool: SqlitePool,
}

impl SqliteAnnouncementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_announcement(row: AnnouncementRow) -> Result<Announcement> {
        let status = AnnouncementStatus::parse(&row.status)
            .ok_or_else(|| AppError::Database(format!("Invalid announcement status: {}", row.status)))?;

        Ok(Announcement {
            id: parse_uuid(&row.id)?,
            title: row.title,
            slug: row.slug,
            content: row.content,
            status,
            pinned: row.pinned,
            publish_at: row.publish_at.map(to_utc),
            expire_at: row.expire_at.map(to_utc),
            department_ids: parse_uuid_list(row.department_ids.as_deref())?,
            author_id: row.author_id.as_deref().map(parse_uuid).transpose()?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn replace_targets(
        tx: &mut Transaction<'_, Sqlite>,
        announcement_id: Uuid,
        department_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("DELETE FROM announcement_departments WHERE announcement_id = ?")
            .bind(announcement_id.to_string())
            .execute(&mut **tx)
            .await?;

        let unique: HashSet<&Uuid> = department_ids.iter().collect();
        for department_id in unique {
            sqlx::query("INSERT INTO announcement_departments (announcement_id, department_id) VALUES (?, ?)")
                .bind(announcement_id.to_string())
                .bind(department_id.to_string())
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }

    /// Slugs already in use for `base_slug` and its numbered variants, across every status.
    async fn taken_slugs(&self, base_slug: &str) -> Result<HashSet<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT slug FROM announcements WHERE slug = ?1 OR slug LIKE ?1 || '-%'",
        )
        .bind(base_slug)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect())
    }

    async fn fetch_where(&self, clause: &str, value: String) -> Result<Option<Announcement>> {
        let sql = format!("{} WHERE {} = ?", ANNOUNCEMENT_SELECT, clause);
        let row = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_announcement).transpose()
    }
}

#[async_trait]
impl AnnouncementRepository for SqliteAnnouncementRepository {
    async fn create(&self, announcement: Announcement, base_slug: &str) -> Result<Announcement> {
        for _ in 0..SLUG_ATTEMPTS {
            let taken = self.taken_slugs(base_slug).await?;
            let slug = unique_slug(base_slug, |candidate| taken.contains(candidate));

            // The insert is the transaction's first statement, so SQLite takes
            // the write lock up front and concurrent creates queue on it.
            let mut tx = self.pool.begin().await?;
            let inserted = sqlx::query(
                r#"
                INSERT INTO announcements (
                    id, title, slug, content, status, pinned, publish_at, expire_at,
                    author_id, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(announcement.id.to_string())
            .bind(&announcement.title)
            .bind(&slug)
            .bind(&announcement.content)
            .bind(announcement.status.as_str())
            .bind(announcement.pinned)
            .bind(announcement.publish_at.map(|d| d.naive_utc()))
            .bind(announcement.expire_at.map(|d| d.naive_utc()))
            .bind(announcement.author_id.map(|id| id.to_string()))
            .bind(announcement.created_at.naive_utc())
            .bind(announcement.updated_at.naive_utc())
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                // Another create took this slug in the meantime; pick the next one.
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }

            Self::replace_targets(&mut tx, announcement.id, &announcement.department_ids).await?;
            tx.commit().await?;

            return self
                .find_by_id(announcement.id)
                .await?
                .ok_or_else(|| AppError::Database("Failed to retrieve created announcement".to_string()));
        }

        Err(AppError::Conflict(
            "Could not reserve a slug for this announcement. Please try again.".to_string(),
        ))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>> {
        self.fetch_where("a.id", id.to_string()).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Announcement>> {
        self.fetch_where("a.slug", slug.to_string()).await
    }

    async fn list(&self) -> Result<Vec<Announcement>> {
        let sql = format!("{} {}", ANNOUNCEMENT_SELECT, ORDER_FOR_LIST);
        let rows = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_announcement).collect()
    }

    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<Announcement>> {
        let sql = format!("{} WHERE a.author_id = ? {}", ANNOUNCEMENT_SELECT, ORDER_FOR_LIST);
        let rows = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .bind(author_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_announcement).collect()
    }

    async fn list_visible(&self, user_id: Uuid, sees_all: bool, now: DateTime<Utc>) -> Result<Vec<Announcement>> {
        let sql = format!(
            r#"{}
            WHERE a.status = 'Published'
              AND (a.publish_at IS NULL OR a.publish_at <= ?1)
              AND (a.expire_at IS NULL OR a.expire_at > ?1)
              AND (
                ?2 = 1
                OR NOT EXISTS (SELECT 1 FROM announcement_departments ad WHERE ad.announcement_id = a.id)
                OR EXISTS (
                    SELECT 1 FROM announcement_departments ad
                    WHERE ad.announcement_id = a.id
                      AND ad.department_id IN (
                        SELECT department_id FROM department_members WHERE user_id = ?3
                        UNION
                        SELECT department_id FROM department_managers WHERE user_id = ?3
                        UNION
                        SELECT department_id FROM users WHERE id = ?3 AND department_id IS NOT NULL
                      )
                )
              )
            {}"#,
            ANNOUNCEMENT_SELECT, ORDER_FOR_LIST
        );

        let rows = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .bind(now.naive_utc())
            .bind(sees_all)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_announcement).collect()
    }

    async fn update(&self, announcement: Announcement) -> Result<Announcement> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE announcements
            SET title = ?, content = ?, status = ?, pinned = ?, publish_at = ?,
                expire_at = ?, author_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&announcement.title)
        .bind(&announcement.content)
        .bind(announcement.status.as_str())
        .bind(announcement.pinned)
        .bind(announcement.publish_at.map(|d| d.naive_utc()))
        .bind(announcement.expire_at.map(|d| d.naive_utc()))
        .bind(announcement.author_id.map(|id| id.to_string()))
        .bind(Utc::now().naive_utc())
        .bind(announcement.id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Announcement not found".to_string()));
        }

        Self::replace_targets(&mut tx, announcement.id, &announcement.department_ids).await?;

        tx.commit().await?;

        self.find_by_id(announcement.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    async fn mark_read(&self, announcement_id: Uuid, user_id: Uuid) -> Result<AnnouncementRead> {
        sqlx::query(
            r#"
            INSERT INTO announcement_reads (announcement_id, user_id, read_at)
            VALUES (?, ?, ?)
            ON CONFLICT(announcement_id, user_id) DO NOTHING
            "#,
        )
        .bind(announcement_id.to_string())
        .bind(user_id.to_string())
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        let read_at = sqlx::query_scalar::<_, NaiveDateTime>(
            "SELECT read_at FROM announcement_reads WHERE announcement_id = ? AND user_id = ?",
        )
        .bind(announcement_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(AnnouncementRead {
            announcement_id,
            user_id,
            read_at: to_utc(read_at),
        })
    }

    async fn is_read_by(&self, announcement_id: Uuid, user_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM announcement_reads WHERE announcement_id = ? AND user_id = ?",
        )
        .bind(announcement_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists > 0)
    }

    async fn read_count(&self, announcement_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM announcement_reads WHERE announcement_id = ?",
        )
        .bind(announcement_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn read_ids_for_user(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT announcement_id FROM announcement_reads WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        ids.iter().map(|id| parse_uuid(id)).collect()
    }
}
