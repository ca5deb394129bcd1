pub mod user_service;
pub mod department_service;
pub mod room_service;
pub mod booking_service;
pub mod announcement_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::{AuthService, CsrfService};
use crate::config::Settings;
use config::ConfigError;

pub use user_service::UserService;
pub use department_service::DepartmentService;
pub use room_service::RoomService;
pub use booking_service::{BookingRequest, BookingService, BookingSummary};
pub use announcement_service::{AnnouncementService, BulkOutcome};

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub department_repo: Arc<dyn DepartmentRepository>,
    pub room_repo: Arc<dyn RoomRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub announcement_repo: Arc<dyn AnnouncementRepository>,
    pub auth_service: Arc<AuthService>,
    pub csrf_service: Arc<CsrfService>,
    pub user_service: Arc<UserService>,
    pub department_service: Arc<DepartmentService>,
    pub room_service: Arc<RoomService>,
    pub booking_service: Arc<BookingService>,
    pub announcement_service: Arc<AnnouncementService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    /// Fails when the configured office offset is out of range.
    pub fn new(db_pool: SqlitePool, settings: &Settings) -> Result<Self, ConfigError> {
        // Repositories
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let department_repo: Arc<dyn DepartmentRepository> =
            Arc::new(SqliteDepartmentRepository::new(db_pool.clone()));
        let room_repo: Arc<dyn RoomRepository> = Arc::new(SqliteRoomRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let announcement_repo: Arc<dyn AnnouncementRepository> =
            Arc::new(SqliteAnnouncementRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            settings.auth.session_duration_hours,
        ));
        let csrf_service = Arc::new(CsrfService::new(db_pool.clone()));

        // Services
        let user_service = Arc::new(UserService::new(user_repo.clone(), department_repo.clone()));
        let department_service = Arc::new(DepartmentService::new(
            department_repo.clone(),
            user_repo.clone(),
        ));
        let room_service = Arc::new(RoomService::new(room_repo.clone()));
        let booking_service = Arc::new(BookingService::new(
            booking_repo.clone(),
            room_repo.clone(),
            settings.booking.offset()?,
        ));
        let announcement_service = Arc::new(AnnouncementService::new(
            announcement_repo.clone(),
            department_repo.clone(),
            user_repo.clone(),
        ));

        Ok(Self {
            user_repo,
            department_repo,
            room_repo,
            booking_repo,
            announcement_repo,
            auth_service,
            csrf_service,
            user_service,
            department_service,
            room_service,
            booking_service,
            announcement_service,
            db_pool,
        })
    }
}
