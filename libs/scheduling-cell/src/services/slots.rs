// libs/scheduling-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_config::ScheduleSettings;

use crate::models::{DayAvailability, SchedulingError, TimeInterval, WorkingHours};
use crate::store::AppointmentStore;

/// Free slots for one day: candidate starts step from the opening time by
/// `granularity_minutes`; a candidate survives unless it has already started
/// or it overlaps something in the booked set. Pure function of its inputs,
/// output ascending.
pub fn generate_slots(
    date: NaiveDate,
    working_hours: WorkingHours,
    granularity_minutes: i32,
    booked: &[TimeInterval],
    now: DateTime<Utc>,
) -> Vec<TimeInterval> {
    if granularity_minutes <= 0 || working_hours.end <= working_hours.start {
        return Vec::new();
    }

    let granularity = Duration::minutes(granularity_minutes as i64);
    let day_end = date.and_time(working_hours.end).and_utc();

    let mut slots = Vec::new();
    let mut cursor = date.and_time(working_hours.start).and_utc();

    while cursor + granularity <= day_end {
        let candidate = TimeInterval {
            start: cursor,
            end: cursor + granularity,
        };
        cursor += granularity;

        // Past slots are never offered.
        if candidate.start < now {
            continue;
        }
        if booked.iter().any(|taken| taken.overlaps(&candidate)) {
            continue;
        }

        slots.push(candidate);
    }

    slots
}

pub struct SlotGenerationService {
    store: Arc<dyn AppointmentStore>,
    schedule: ScheduleSettings,
}

impl SlotGenerationService {
    pub fn new(store: Arc<dyn AppointmentStore>, schedule: ScheduleSettings) -> Self {
        Self { store, schedule }
    }

    /// Booked and free slots for a professional on one day. Configured break
    /// windows are seeded into the booked set before the scan, so breaks and
    /// real bookings go through the same overlap rule.
    pub async fn day_availability(
        &self,
        organization_id: Uuid,
        professional_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DayAvailability, SchedulingError> {
        debug!(
            "Generating slots for professional {} on {}",
            professional_id, date
        );

        let Some((day_start, day_end)) = self.schedule.day_bounds(date.weekday()) else {
            return Ok(DayAvailability {
                date,
                professional_id,
                booked_slots: Vec::new(),
                available_slots: Vec::new(),
            });
        };

        let day_range = TimeInterval {
            start: date.and_time(day_start).and_utc(),
            end: date.and_time(day_end).and_utc(),
        };

        let appointments = self
            .store
            .active_in_range(organization_id, professional_id, day_range, None)
            .await?;

        let booked_slots: Vec<TimeInterval> = appointments
            .iter()
            .map(|appointment| appointment.interval())
            .collect();

        let mut blocked = booked_slots.clone();
        if let Some((break_start, break_end)) = self.schedule.break_window() {
            blocked.push(TimeInterval {
                start: date.and_time(break_start).and_utc(),
                end: date.and_time(break_end).and_utc(),
            });
        }

        let available_slots = generate_slots(
            date,
            WorkingHours {
                start: day_start,
                end: day_end,
            },
            self.schedule.slot_minutes,
            &blocked,
            now,
        );

        debug!(
            "Professional {} has {} free slots on {}",
            professional_id,
            available_slots.len(),
            date
        );

        Ok(DayAvailability {
            date,
            professional_id,
            booked_slots,
            available_slots,
        })
    }
}
