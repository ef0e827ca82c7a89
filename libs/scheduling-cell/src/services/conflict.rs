// libs/scheduling-cell/src/services/conflict.rs
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, SchedulingError, TimeInterval};
use crate::store::AppointmentStore;

/// Advisory overlap check run before a write. The store re-validates at
/// commit time; this pass exists to reject doomed requests early and to name
/// the conflicting appointment in the response.
pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Returns the first SCHEDULED/CONFIRMED appointment whose interval
    /// overlaps the candidate, or None when the slot is free. Boundary
    /// touches are not conflicts.
    pub async fn check_conflict(
        &self,
        organization_id: Uuid,
        professional_id: Uuid,
        candidate: TimeInterval,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError> {
        debug!(
            "Checking conflicts for professional {} from {} to {}",
            professional_id, candidate.start, candidate.end
        );

        let existing = self
            .store
            .active_in_range(
                organization_id,
                professional_id,
                candidate,
                exclude_appointment_id,
            )
            .await?;

        for appointment in existing {
            if appointment.interval().overlaps(&candidate) {
                warn!(
                    "Conflict detected for professional {}: appointment {} occupies {} to {}",
                    professional_id,
                    appointment.id,
                    appointment.scheduled_date,
                    appointment.scheduled_end()
                );
                return Ok(Some(appointment));
            }
        }

        Ok(None)
    }

    /// Fails with `SchedulingError::Conflict` unless the candidate slot is free.
    pub async fn ensure_free(
        &self,
        organization_id: Uuid,
        professional_id: Uuid,
        candidate: TimeInterval,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), SchedulingError> {
        match self
            .check_conflict(
                organization_id,
                professional_id,
                candidate,
                exclude_appointment_id,
            )
            .await?
        {
            Some(conflicting) => Err(SchedulingError::Conflict {
                conflicting: Some(Box::new(conflicting)),
            }),
            None => Ok(()),
        }
    }
}
