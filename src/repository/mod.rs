use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::{AppError, Result};

pub mod user_repository;
pub mod department_repository;
pub mod room_repository;
pub mod booking_repository;
pub mod announcement_repository;

pub use user_repository::SqliteUserRepository;
pub use department_repository::SqliteDepartmentRepository;
pub use room_repository::SqliteRoomRepository;
pub use booking_repository::SqliteBookingRepository;
pub use announcement_repository::SqliteAnnouncementRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest, password_hash: String) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self) -> Result<Vec<User>>;
    async fn list_by_roles(&self, roles: &[Role]) -> Result<Vec<User>>;
    async fn get_password_hash(&self, id: Uuid) -> Result<Option<String>>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()>;
}

#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    async fn create(&self, name: &str) -> Result<Department>;
    async fn rename(&self, id: Uuid, name: &str) -> Result<Department>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Department>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Department>>;
    async fn list(&self) -> Result<Vec<Department>>;
    async fn list_managed_by(&self, user_id: Uuid) -> Result<Vec<Department>>;
    async fn managed_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>>;
    /// Departments the user is a member of, manages, or has as primary department.
    async fn affiliated_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>>;
    /// Applies both sides of the plan in one transaction.
    async fn apply_plan(&self, plan: &MembershipPlan) -> Result<Department>;
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, room: CreateRoomRequest) -> Result<Room>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Room>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Room>>;
    async fn list(&self, size: Option<RoomSize>, category: Option<RoomCategory>) -> Result<Vec<Room>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Inserts the booking unless another booking for the same room overlaps
    /// it. Fails with `AppError::Conflict` on overlap.
    async fn create_unless_overlapping(&self, booking: NewBooking) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn find_conflicts(
        &self,
        room_id: Uuid,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>>;
    async fn busy_room_ids(&self, window: &TimeWindow) -> Result<HashSet<Uuid>>;
    async fn list_upcoming_for_user(&self, user_id: Uuid, from: DateTime<Utc>, limit: i64) -> Result<Vec<Booking>>;
    async fn list_upcoming_for_room(&self, room_id: Uuid, from: DateTime<Utc>, limit: i64) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    /// Stores a new announcement, picking the first free slug derived from `base_slug`.
    async fn create(&self, announcement: Announcement, base_slug: &str) -> Result<Announcement>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Announcement>>;
    async fn list(&self) -> Result<Vec<Announcement>>;
    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<Announcement>>;
    /// Live announcements visible to the user; `sees_all` skips department targeting.
    async fn list_visible(&self, user_id: Uuid, sees_all: bool, now: DateTime<Utc>) -> Result<Vec<Announcement>>;
    async fn update(&self, announcement: Announcement) -> Result<Announcement>;
    async fn mark_read(&self, announcement_id: Uuid, user_id: Uuid) -> Result<AnnouncementRead>;
    async fn is_read_by(&self, announcement_id: Uuid, user_id: Uuid) -> Result<bool>;
    async fn read_count(&self, announcement_id: Uuid) -> Result<i64>;
    async fn read_ids_for_user(&self, user_id: Uuid) -> Result<HashSet<Uuid>>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn parse_uuid_list(s: Option<&str>) -> Result<Vec<Uuid>> {
    match s {
        Some(s) if !s.is_empty() => s.split(',').map(parse_uuid).collect(),
        _ => Ok(Vec::new()),
    }
}

pub(crate) fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
