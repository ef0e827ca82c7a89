// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// TIME INTERVALS
// ==============================================================================

/// Half-open interval [start, end). Two intervals that merely touch at a
/// boundary do not overlap, which is what makes back-to-back bookings legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SchedulingError> {
        if end <= start {
            return Err(SchedulingError::Validation(
                "Interval end must be after its start".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn from_start_and_duration(
        start: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Self, SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "Duration must be a positive number of minutes".to_string(),
            ));
        }
        Ok(Self {
            start,
            end: start + Duration::minutes(duration_minutes as i64),
        })
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub professional_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub appointment_type: Option<String>,
    pub notes: Option<String>,
    pub medical_record_id: Option<Uuid>,
    pub created_via: CreatedVia,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_date + Duration::minutes(self.duration_minutes as i64)
    }

    pub fn interval(&self) -> TimeInterval {
        TimeInterval {
            start: self.scheduled_date,
            end: self.scheduled_end(),
        }
    }

    /// Whether this appointment still holds its slot on the calendar.
    pub fn occupies_calendar(&self) -> bool {
        self.status.occupies_calendar()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Canceled,
    Completed,
}

impl AppointmentStatus {
    /// Statuses counted by the no-overlap invariant.
    pub fn occupies_calendar(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Canceled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Confirmed => write!(f, "CONFIRMED"),
            AppointmentStatus::Canceled => write!(f, "CANCELED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreatedVia {
    Dashboard,
    Public,
}

impl fmt::Display for CreatedVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatedVia::Dashboard => write!(f, "DASHBOARD"),
            CreatedVia::Public => write!(f, "PUBLIC"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub professional_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub professional_id: Option<Uuid>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<String>,
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    /// Whether the update moves the appointment on the calendar and therefore
    /// needs a fresh conflict check.
    pub fn changes_schedule(&self, current: &Appointment) -> bool {
        let date_changed = self
            .scheduled_date
            .is_some_and(|date| date != current.scheduled_date);
        let duration_changed = self
            .duration_minutes
            .is_some_and(|minutes| minutes != current.duration_minutes);
        let professional_changed = self
            .professional_id
            .is_some_and(|id| id != current.professional_id);

        date_changed || duration_changed || professional_changed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub medical_record_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub professional_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// Bounds within which slots may be generated for one day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: chrono::NaiveTime,
    pub end: chrono::NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub professional_id: Uuid,
    pub booked_slots: Vec<TimeInterval>,
    pub available_slots: Vec<TimeInterval>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Requested time conflicts with an existing appointment")]
    Conflict {
        conflicting: Option<Box<Appointment>>,
    },

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Database error: {0}")]
    Database(String),
}
