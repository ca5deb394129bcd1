use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub size: RoomSize,
    pub category: RoomCategory,
    pub capacity: i64,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum RoomSize {
    Small,
    Medium,
    Large,
}

impl RoomSize {
    pub const ALL: [RoomSize; 3] = [RoomSize::Small, RoomSize::Medium, RoomSize::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomSize::Small => "Small",
            RoomSize::Medium => "Medium",
            RoomSize::Large => "Large",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoomSize::Small => "Small (1-4)",
            RoomSize::Medium => "Medium (4-8)",
            RoomSize::Large => "Large (8+)",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum RoomCategory {
    Meeting,
    Conference,
    Huddle,
    Training,
    Board,
    Other,
}

impl RoomCategory {
    pub const ALL: [RoomCategory; 6] = [
        RoomCategory::Meeting,
        RoomCategory::Conference,
        RoomCategory::Huddle,
        RoomCategory::Training,
        RoomCategory::Board,
        RoomCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomCategory::Meeting => "Meeting",
            RoomCategory::Conference => "Conference",
            RoomCategory::Huddle => "Huddle",
            RoomCategory::Training => "Training",
            RoomCategory::Board => "Board",
            RoomCategory::Other => "Other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoomCategory::Meeting => "Meeting room",
            RoomCategory::Conference => "Conference room",
            RoomCategory::Huddle => "Huddle room",
            RoomCategory::Training => "Training room",
            RoomCategory::Board => "Board room",
            RoomCategory::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub size: RoomSize,
    pub category: RoomCategory,
    pub capacity: i64,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_at,
            end: self.end_at,
        }
    }
}

/// A booking about to be written.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub window: TimeWindow,
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(AppError::Validation(
                "End time must be after start time.".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Builds a window from a local date and two local wall-clock times.
    pub fn on_date(
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        offset: &FixedOffset,
    ) -> Result<Self> {
        Self::new(local_to_utc(date, start, offset)?, local_to_utc(date, end, offset)?)
    }

    /// 00:00:00 to 23:59:59 of `date`.
    pub fn all_day(date: NaiveDate, offset: &FixedOffset) -> Result<Self> {
        let start = NaiveTime::from_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::Internal("invalid start of day".to_string()))?;
        let end = NaiveTime::from_hms_opt(23, 59, 59)
            .ok_or_else(|| AppError::Internal("invalid end of day".to_string()))?;
        Self::on_date(date, start, end, offset)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Back-to-back windows (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: &FixedOffset) -> Result<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Validation("Invalid date or time.".to_string()))
}

/// Parsed room search criteria.
#[derive(Debug, Clone, Default)]
pub struct RoomSearch {
    pub window: Option<TimeWindow>,
    pub size: Option<RoomSize>,
    pub category: Option<RoomCategory>,
}

impl RoomSearch {
    /// Applies the search form rules:
    /// date + all day searches the whole day, date + both times searches that
    /// window, a lone start or end time is an error, and a bare date applies
    /// no availability filter.
    pub fn from_parts(
        date: Option<NaiveDate>,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
        all_day: bool,
        size: Option<RoomSize>,
        category: Option<RoomCategory>,
        offset: &FixedOffset,
    ) -> Result<Self> {
        let mut search = RoomSearch {
            window: None,
            size,
            category,
        };

        if let (Some(d), true) = (date, all_day) {
            search.window = Some(TimeWindow::all_day(d, offset)?);
            return Ok(search);
        }

        match (start_time, end_time) {
            (Some(_), None) => {
                return Err(AppError::Validation("Provide an end time.".to_string()))
            }
            (None, Some(_)) => {
                return Err(AppError::Validation("Provide a start time.".to_string()))
            }
            (Some(s), Some(e)) => {
                if let Some(d) = date {
                    search.window = Some(TimeWindow::on_date(d, s, e, offset)?);
                }
            }
            (None, None) => {}
        }

        Ok(search)
    }
}
