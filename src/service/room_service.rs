use std::sync::Arc;
use uuid::Uuid;
use crate::{
    auth::{authorize, Action, Actor, Resource},
    domain::*,
    error::{AppError, Result},
    repository::RoomRepository,
};

pub struct RoomService {
    repo: Arc<dyn RoomRepository>,
}

impl RoomService {
    pub fn new(repo: Arc<dyn RoomRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_room(&self, actor: &Actor, request: CreateRoomRequest) -> Result<Room> {
        authorize(actor, Action::Create, Resource::Room).into_result()?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Room name is required.".to_string()));
        }
        if request.capacity < 1 {
            return Err(AppError::Validation("Capacity must be at least 1.".to_string()));
        }
        if self.repo.find_by_name(name).await?.is_some() {
            return Err(AppError::Conflict("A room with this name already exists.".to_string()));
        }

        let room = self.repo.create(request).await?;
        tracing::info!("Room {} created by {}", room.name, actor.user_id);
        Ok(room)
    }

    pub async fn get(&self, id: Uuid) -> Result<Room> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Room>> {
        self.repo.list(None, None).await
    }
}
