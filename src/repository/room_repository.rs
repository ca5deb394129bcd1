use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateRoomRequest, Room, RoomCategory, RoomSize},
    error::{AppError, Result},
    repository::{is_unique_violation, parse_uuid, to_utc, RoomRepository},
};

#[derive(FromRow)]
struct RoomRow {
    id: String,
    name: String,
    size: String,
    category: String,
    capacity: i64,
    location: String,
    created_at: NaiveDateTime,
}

pub struct SqliteRoomRepository {
    pool: SqlitePool,
}

impl SqliteRoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_room(row: RoomRow) -> Result<Room> {
        Ok(Room {
            id: parse_uuid(&row.id)?,
            name: row.name,
            size: RoomSize::parse(&row.size)
                .ok_or_else(|| AppError::Database(format!("Invalid room size: {}", row.size)))?,
            category: RoomCategory::parse(&row.category)
                .ok_or_else(|| AppError::Database(format!("Invalid room category: {}", row.category)))?,
            capacity: row.capacity,
            location: row.location,
            created_at: to_utc(row.created_at),
        })
    }
}

#[async_trait]
impl RoomRepository for SqliteRoomRepository {
    async fn create(&self, room: CreateRoomRequest) -> Result<Room> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO rooms (id, name, size, category, capacity, location, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(room.name.trim())
        .bind(room.size.as_str())
        .bind(room.category.as_str())
        .bind(room.capacity)
        .bind(room.location.trim())
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("A room with this name already exists.".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created room".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, size, category, capacity, location, created_at FROM rooms WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_room).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, size, category, capacity, location, created_at FROM rooms WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_room).transpose()
    }

    async fn list(&self, size: Option<RoomSize>, category: Option<RoomCategory>) -> Result<Vec<Room>> {
        let rows = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, name, size, category, capacity, location, created_at
            FROM rooms
            WHERE (?1 IS NULL OR size = ?1)
              AND (?2 IS NULL OR category = ?2)
            ORDER BY name ASC
            "#,
        )
        .bind(size.map(|s| s.as_str()))
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_room).collect()
    }
}
