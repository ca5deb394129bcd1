use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Form,
};
use chrono::{FixedOffset, NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{
        middleware::auth::{CurrentUser, SessionInfo},
        state::AppState,
    },
    auth::{authorize, Action, Resource},
    domain::{CreateRoomRequest, Room, RoomCategory, RoomSearch, RoomSize},
    error::{AppError, Result},
    service::{BookingRequest, BookingSummary},
    web::templates::{HtmlTemplate, UserInfo},
};
use super::{csrf_token, redirect_with_notice, NoticeQuery, SelectOption};

/// A booking line in listings, in office-local time.
pub struct BookingRow {
    pub room_name: String,
    pub title: String,
    pub date: String,
    pub start: String,
    pub end: String,
}

impl BookingRow {
    pub fn new(summary: &BookingSummary, offset: &FixedOffset) -> Self {
        let start = summary.booking.start_at.with_timezone(offset);
        let end = summary.booking.end_at.with_timezone(offset);
        Self {
            room_name: summary.room_name.clone(),
            title: summary.booking.title.clone(),
            date: start.format("%a %d %b %Y").to_string(),
            start: start.format("%H:%M").to_string(),
            end: end.format("%H:%M").to_string(),
        }
    }
}

pub struct RoomRow {
    pub id: String,
    pub name: String,
    pub size: String,
    pub category: String,
    pub capacity: i64,
    pub location: String,
}

impl From<&Room> for RoomRow {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.to_string(),
            name: room.name.clone(),
            size: room.size.label().to_string(),
            category: room.category.label().to_string(),
            capacity: room.capacity,
            location: room.location.clone(),
        }
    }
}

fn size_options(selected: &str) -> Vec<SelectOption> {
    RoomSize::ALL
        .iter()
        .map(|s| SelectOption {
            value: s.as_str().to_string(),
            label: s.label().to_string(),
            selected: s.as_str() == selected,
        })
        .collect()
}

fn category_options(selected: &str) -> Vec<SelectOption> {
    RoomCategory::ALL
        .iter()
        .map(|c| SelectOption {
            value: c.as_str().to_string(),
            label: c.label().to_string(),
            selected: c.as_str() == selected,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Room search
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "bookings/rooms.html")]
pub struct RoomsTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub rooms: Vec<RoomRow>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub all_day: bool,
    pub sizes: Vec<SelectOption>,
    pub categories: Vec<SelectOption>,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub filtered_by_time: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomSearchQuery {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub all_day: Option<String>,
    pub size: Option<String>,
    pub room_category: Option<String>,
    pub notice: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Enter a valid date.".to_string()))
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::Validation("Enter a valid time.".to_string()))
}

impl RoomSearchQuery {
    fn is_checked(&self) -> bool {
        matches!(non_empty(&self.all_day), Some("on" | "true" | "1"))
    }

    fn to_search(&self, offset: &FixedOffset) -> Result<RoomSearch> {
        let date = non_empty(&self.date).map(parse_date).transpose()?;
        let start_time = non_empty(&self.start_time).map(parse_time).transpose()?;
        let end_time = non_empty(&self.end_time).map(parse_time).transpose()?;
        let size = non_empty(&self.size).and_then(RoomSize::parse);
        let category = non_empty(&self.room_category).and_then(RoomCategory::parse);

        RoomSearch::from_parts(date, start_time, end_time, self.is_checked(), size, category, offset)
    }
}

pub async fn rooms_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Query(query): Query<RoomSearchQuery>,
) -> Result<Response> {
    let ctx = &state.service_context;
    let offset = *state.service_context.booking_service.offset();

    let (rooms, error, filtered_by_time) = match query.to_search(&offset) {
        Ok(search) => {
            let rooms = ctx.booking_service.search_rooms(&search).await?;
            (rooms, None, search.window.is_some())
        }
        Err(e) if e.is_form_error() => (Vec::new(), Some(e.user_message()), false),
        Err(e) => return Err(e),
    };

    Ok(HtmlTemplate(RoomsTemplate {
        user: UserInfo::from(&current_user),
        csrf_token: csrf_token(&state, &session_info).await?,
        rooms: rooms.iter().map(RoomRow::from).collect(),
        date: query.date.clone().unwrap_or_default(),
        start_time: query.start_time.clone().unwrap_or_default(),
        end_time: query.end_time.clone().unwrap_or_default(),
        all_day: query.is_checked(),
        sizes: size_options(non_empty(&query.size).unwrap_or_default()),
        categories: category_options(non_empty(&query.room_category).unwrap_or_default()),
        error,
        notice: query.notice.clone(),
        filtered_by_time,
    })
    .into_response())
}

// ---------------------------------------------------------------------------
// Booking form
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "bookings/new.html")]
pub struct NewBookingTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub room: RoomRow,
    pub upcoming: Vec<BookingRow>,
    pub title: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct BookingForm {
    #[validate(length(max = 140, message = "Title must be at most 140 characters."))]
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl BookingForm {
    fn to_request(&self) -> Result<BookingRequest> {
        self.validate()?;
        let required = |v: &str, what: &str| -> Result<()> {
            if v.trim().is_empty() {
                Err(AppError::Validation(format!("Provide a {}.", what)))
            } else {
                Ok(())
            }
        };
        required(&self.date, "date")?;
        required(&self.start_time, "start time")?;
        required(&self.end_time, "end time")?;

        Ok(BookingRequest {
            title: self.title.trim().to_string(),
            date: parse_date(self.date.trim())?,
            start_time: parse_time(self.start_time.trim())?,
            end_time: parse_time(self.end_time.trim())?,
        })
    }
}

async fn render_booking_form(
    state: &AppState,
    current_user: &CurrentUser,
    session_info: &SessionInfo,
    room_id: Uuid,
    form: BookingForm,
    error: Option<String>,
) -> Result<Response> {
    let ctx = &state.service_context;
    let offset = *state.service_context.booking_service.offset();

    let room = ctx.room_service.get(room_id).await?;
    let upcoming = ctx
        .booking_service
        .upcoming_for_room(room_id)
        .await?
        .into_iter()
        .map(|booking| {
            BookingRow::new(
                &BookingSummary {
                    booking,
                    room_name: room.name.clone(),
                },
                &offset,
            )
        })
        .collect();

    Ok(HtmlTemplate(NewBookingTemplate {
        user: UserInfo::from(current_user),
        csrf_token: csrf_token(state, session_info).await?,
        room: RoomRow::from(&room),
        upcoming,
        title: form.title,
        date: form.date,
        start_time: form.start_time,
        end_time: form.end_time,
        error,
    })
    .into_response())
}

pub async fn new_booking_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(room_id): Path<Uuid>,
) -> Result<Response> {
    render_booking_form(&state, &current_user, &session_info, room_id, BookingForm::default(), None).await
}

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Path(room_id): Path<Uuid>,
    Form(form): Form<BookingForm>,
) -> Result<Response> {
    let result = match form.to_request() {
        Ok(request) => {
            state
                .service_context
                .booking_service
                .create_booking(&current_user.actor, room_id, request)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(redirect_with_notice("/bookings/mine/", "Room booked.").into_response()),
        Err(e) if e.is_form_error() => {
            let message = e.user_message();
            render_booking_form(&state, &current_user, &session_info, room_id, form, Some(message)).await
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Add room (GM)
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "bookings/add_room.html")]
pub struct AddRoomTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub name: String,
    pub capacity: String,
    pub location: String,
    pub sizes: Vec<SelectOption>,
    pub categories: Vec<SelectOption>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RoomForm {
    #[validate(length(min = 1, max = 100, message = "Room name must be 1 to 100 characters."))]
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub capacity: String,
    #[validate(length(max = 200, message = "Location must be at most 200 characters."))]
    #[serde(default)]
    pub location: String,
}

impl RoomForm {
    fn to_request(&self) -> Result<CreateRoomRequest> {
        self.validate()?;
        let size = RoomSize::parse(&self.size)
            .ok_or_else(|| AppError::Validation("Choose a room size.".to_string()))?;
        let category = RoomCategory::parse(&self.category)
            .ok_or_else(|| AppError::Validation("Choose a room category.".to_string()))?;
        let capacity = self
            .capacity
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::Validation("Capacity must be a whole number.".to_string()))?;

        Ok(CreateRoomRequest {
            name: self.name.trim().to_string(),
            size,
            category,
            capacity,
            location: self.location.trim().to_string(),
        })
    }
}

async fn render_room_form(
    state: &AppState,
    current_user: &CurrentUser,
    session_info: &SessionInfo,
    form: RoomForm,
    error: Option<String>,
) -> Result<Response> {
    Ok(HtmlTemplate(AddRoomTemplate {
        user: UserInfo::from(current_user),
        csrf_token: csrf_token(state, session_info).await?,
        sizes: size_options(&form.size),
        categories: category_options(&form.category),
        name: form.name,
        capacity: form.capacity,
        location: form.location,
        error,
    })
    .into_response())
}

pub async fn add_room_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
) -> Result<Response> {
    authorize(&current_user.actor, Action::Create, Resource::Room).into_result()?;

    let form = RoomForm {
        capacity: "4".to_string(),
        ..Default::default()
    };
    render_room_form(&state, &current_user, &session_info, form, None).await
}

pub async fn create_room(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Form(form): Form<RoomForm>,
) -> Result<Response> {
    let result = match form.to_request() {
        Ok(request) => {
            state
                .service_context
                .room_service
                .create_room(&current_user.actor, request)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(room) => Ok(redirect_with_notice(
            "/bookings/rooms/",
            &format!("Room {} added.", room.name),
        )
        .into_response()),
        Err(e) if e.is_form_error() => {
            let message = e.user_message();
            render_room_form(&state, &current_user, &session_info, form, Some(message)).await
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// My bookings
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "bookings/mine.html")]
pub struct MyBookingsTemplate {
    pub user: UserInfo,
    pub csrf_token: String,
    pub bookings: Vec<BookingRow>,
    pub notice: Option<String>,
}

pub async fn my_bookings_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(session_info): Extension<SessionInfo>,
    Query(query): Query<NoticeQuery>,
) -> Result<Response> {
    let offset = *state.service_context.booking_service.offset();
    let bookings = state
        .service_context
        .booking_service
        .bookings_for_user(current_user.actor.user_id)
        .await?
        .iter()
        .map(|b| BookingRow::new(b, &offset))
        .collect();

    Ok(HtmlTemplate(MyBookingsTemplate {
        user: UserInfo::from(&current_user),
        csrf_token: csrf_token(&state, &session_info).await?,
        bookings,
        notice: query.notice,
    })
    .into_response())
}
