use std::collections::HashMap;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::{
    auth::{authorize, Action, Actor, Resource},
    domain::*,
    error::{AppError, Result},
    repository::{BookingRepository, RoomRepository},
};

const UPCOMING_LIMIT: i64 = 50;

/// A booking as entered on the booking form, in office-local time.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub title: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A booking joined with the name of its room for listing.
#[derive(Debug, Clone)]
pub struct BookingSummary {
    pub booking: Booking,
    pub room_name: String,
}

pub struct BookingService {
    repo: Arc<dyn BookingRepository>,
    room_repo: Arc<dyn RoomRepository>,
    offset: FixedOffset,
}

impl BookingService {
    pub fn new(
        repo: Arc<dyn BookingRepository>,
        room_repo: Arc<dyn RoomRepository>,
        offset: FixedOffset,
    ) -> Self {
        Self { repo, room_repo, offset }
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    pub async fn create_booking(
        &self,
        actor: &Actor,
        room_id: Uuid,
        request: BookingRequest,
    ) -> Result<Booking> {
        authorize(actor, Action::Book, Resource::Room).into_result()?;

        let room = self
            .room_repo
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        let window = TimeWindow::on_date(
            request.date,
            request.start_time,
            request.end_time,
            &self.offset,
        )?;

        let new_booking = NewBooking {
            id: Uuid::new_v4(),
            room_id: room.id,
            user_id: actor.user_id,
            title: request.title,
            window,
        };

        match self.repo.create_unless_overlapping(new_booking).await {
            Ok(booking) => {
                tracing::info!(
                    "Booked {} from {} to {} for user {}",
                    room.name,
                    booking.start_at,
                    booking.end_at,
                    actor.user_id
                );
                Ok(booking)
            }
            Err(e @ AppError::Conflict(_)) => {
                tracing::warn!(
                    "Rejected overlapping booking for {} ({} - {})",
                    room.name,
                    window.start(),
                    window.end()
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Rooms matching the size and category filters with no booking in the
    /// search window. Without a window every matching room is returned.
    pub async fn search_rooms(&self, search: &RoomSearch) -> Result<Vec<Room>> {
        let rooms = self.room_repo.list(search.size, search.category).await?;

        let Some(window) = search.window else {
            return Ok(rooms);
        };

        let busy = self.repo.busy_room_ids(&window).await?;
        Ok(rooms.into_iter().filter(|r| !busy.contains(&r.id)).collect())
    }

    pub async fn find_conflicts(&self, room_id: Uuid, window: &TimeWindow) -> Result<Vec<Booking>> {
        self.repo.find_conflicts(room_id, window, None).await
    }

    pub async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingSummary>> {
        let bookings = self
            .repo
            .list_upcoming_for_user(user_id, Utc::now(), UPCOMING_LIMIT)
            .await?;

        let room_names: HashMap<Uuid, String> = self
            .room_repo
            .list(None, None)
            .await?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();

        Ok(bookings
            .into_iter()
            .map(|booking| BookingSummary {
                room_name: room_names
                    .get(&booking.room_id)
                    .cloned()
                    .unwrap_or_default(),
                booking,
            })
            .collect())
    }

    pub async fn upcoming_for_room(&self, room_id: Uuid) -> Result<Vec<Booking>> {
        self.repo
            .list_upcoming_for_room(room_id, Utc::now(), UPCOMING_LIMIT)
            .await
    }
}
