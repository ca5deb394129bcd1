use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, NewBooking, TimeWindow},
    error::{AppError, Result},
    repository::{parse_uuid, to_utc, BookingRepository},
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    room_id: String,
    user_id: String,
    title: String,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
    created_at: NaiveDateTime,
}

pub const OVERLAP_MESSAGE: &str = "This time range overlaps an existing booking.";

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: parse_uuid(&row.id)?,
            room_id: parse_uuid(&row.room_id)?,
            user_id: parse_uuid(&row.user_id)?,
            title: row.title,
            start_at: to_utc(row.start_at),
            end_at: to_utc(row.end_at),
            created_at: to_utc(row.created_at),
        })
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create_unless_overlapping(&self, booking: NewBooking) -> Result<Booking> {
        let start = booking.window.start().naive_utc();
        let end = booking.window.end().naive_utc();
        let id = booking.id.to_string();
        let room_id = booking.room_id.to_string();

        let mut tx = self.pool.begin().await?;

        // Half-open overlap: existing.start < new.end AND existing.end > new.start
        let result = sqlx::query(
            r#"
            INSERT INTO bookings (id, room_id, user_id, title, start_at, end_at, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
            WHERE NOT EXISTS (
                SELECT 1 FROM bookings
                WHERE room_id = ?2
                  AND start_at < ?6
                  AND end_at > ?5
                  AND id != ?1
            )
            "#,
        )
        .bind(&id)
        .bind(&room_id)
        .bind(booking.user_id.to_string())
        .bind(booking.title.trim())
        .bind(start)
        .bind(end)
        .bind(Utc::now().naive_utc())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::Conflict(OVERLAP_MESSAGE.to_string()));
        }

        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, room_id, user_id, title, start_at, end_at, created_at FROM bookings WHERE id = ?",
        )
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Self::row_to_booking(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, room_id, user_id, title, start_at, end_at, created_at FROM bookings WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn find_conflicts(
        &self,
        room_id: Uuid,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, room_id, user_id, title, start_at, end_at, created_at
            FROM bookings
            WHERE room_id = ?
              AND start_at < ?
              AND end_at > ?
              AND (? IS NULL OR id != ?)
            ORDER BY start_at ASC
            "#,
        )
        .bind(room_id.to_string())
        .bind(window.end().naive_utc())
        .bind(window.start().naive_utc())
        .bind(exclude.map(|id| id.to_string()))
        .bind(exclude.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn busy_room_ids(&self, window: &TimeWindow) -> Result<HashSet<Uuid>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT room_id FROM bookings WHERE start_at < ? AND end_at > ?",
        )
        .bind(window.end().naive_utc())
        .bind(window.start().naive_utc())
        .fetch_all(&self.pool)
        .await?;

        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    async fn list_upcoming_for_user(&self, user_id: Uuid, from: DateTime<Utc>, limit: i64) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, room_id, user_id, title, start_at, end_at, created_at
            FROM bookings
            WHERE user_id = ? AND end_at > ?
            ORDER BY start_at ASC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(from.naive_utc())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_upcoming_for_room(&self, room_id: Uuid, from: DateTime<Utc>, limit: i64) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT id, room_id, user_id, title, start_at, end_at, created_at
            FROM bookings
            WHERE room_id = ? AND end_at > ?
            ORDER BY start_at ASC
            LIMIT ?
            "#,
        )
        .bind(room_id.to_string())
        .bind(from.naive_utc())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }
}
