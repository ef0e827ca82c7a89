// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, BookAppointmentRequest, CreatedVia,
    SchedulingError, TimeInterval, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notify::{CompletionNotifier, LoggingCompletionNotifier};
use crate::store::AppointmentStore;

/// Consultation length applied when a booking request does not name one.
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    notifier: Arc<dyn CompletionNotifier>,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self::with_notifier(store, Arc::new(LoggingCompletionNotifier))
    }

    pub fn with_notifier(
        store: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        let conflict_service = ConflictDetectionService::new(Arc::clone(&store));
        let lifecycle_service = AppointmentLifecycleService::new();

        Self {
            store,
            conflict_service,
            lifecycle_service,
            notifier,
        }
    }

    /// Book a new appointment. The advisory conflict check runs first so a
    /// taken slot is reported with the appointment holding it; the store then
    /// re-validates the invariant when the row is committed.
    pub async fn book_appointment(
        &self,
        organization_id: Uuid,
        request: BookAppointmentRequest,
        created_via: CreatedVia,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking appointment for patient {} with professional {}",
            request.patient_id, request.professional_id
        );

        let duration_minutes = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        let candidate =
            TimeInterval::from_start_and_duration(request.scheduled_date, duration_minutes)?;

        self.conflict_service
            .ensure_free(organization_id, request.professional_id, candidate, None)
            .await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            organization_id,
            professional_id: request.professional_id,
            patient_id: request.patient_id,
            scheduled_date: request.scheduled_date,
            duration_minutes,
            status: AppointmentStatus::Scheduled,
            appointment_type: request.appointment_type,
            notes: request.notes,
            medical_record_id: None,
            created_via,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert(appointment).await?;

        info!(
            "Appointment {} booked for {} ({} min)",
            created.id, created.scheduled_date, created.duration_minutes
        );
        Ok(created)
    }

    pub async fn get_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        self.store
            .get(organization_id, appointment_id)
            .await?
            .ok_or(SchedulingError::NotFound)
    }

    pub async fn search_appointments(
        &self,
        organization_id: Uuid,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Searching appointments with filters: {:?}", query);
        Ok(self.store.search(organization_id, &query).await?)
    }

    /// Update schedule fields, type, or notes. Moving the appointment on the
    /// calendar re-runs the conflict check with its own id excluded, so an
    /// appointment can always be rescheduled into a slot it already holds.
    pub async fn update_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Updating appointment: {}", appointment_id);

        let current = self.get_appointment(organization_id, appointment_id).await?;

        let new_professional_id = request.professional_id.unwrap_or(current.professional_id);
        let new_start = request.scheduled_date.unwrap_or(current.scheduled_date);
        let new_duration = request.duration_minutes.unwrap_or(current.duration_minutes);

        let candidate = TimeInterval::from_start_and_duration(new_start, new_duration)?;

        if request.changes_schedule(&current) {
            self.conflict_service
                .ensure_free(
                    organization_id,
                    new_professional_id,
                    candidate,
                    Some(appointment_id),
                )
                .await?;
        }

        let mut updated = current;
        updated.professional_id = new_professional_id;
        updated.scheduled_date = new_start;
        updated.duration_minutes = new_duration;
        if let Some(appointment_type) = request.appointment_type {
            updated.appointment_type = Some(appointment_type);
        }
        if let Some(notes) = request.notes {
            updated.notes = Some(notes);
        }
        updated.updated_at = Utc::now();

        let updated = self.store.update(updated).await?;

        info!("Appointment {} updated", updated.id);
        Ok(updated)
    }

    pub async fn confirm_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Confirming appointment: {}", appointment_id);

        let current = self.get_appointment(organization_id, appointment_id).await?;
        self.lifecycle_service
            .validate_transition(current.status, AppointmentStatus::Confirmed)?;

        let mut updated = current;
        updated.status = AppointmentStatus::Confirmed;
        updated.updated_at = Utc::now();

        Ok(self.store.update(updated).await?)
    }

    /// Cancel the appointment and release its slot. The reason, when given,
    /// is appended to the notes; that annotation is the only mutation the
    /// engine ever performs on its own.
    pub async fn cancel_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let current = self.get_appointment(organization_id, appointment_id).await?;
        self.lifecycle_service
            .validate_transition(current.status, AppointmentStatus::Canceled)?;

        let mut updated = current;
        if let Some(reason) = reason.filter(|reason| !reason.trim().is_empty()) {
            let annotation = format!("Cancellation reason: {}", reason);
            updated.notes = Some(match updated.notes.take() {
                Some(existing) => format!("{}\n{}", existing, annotation),
                None => annotation,
            });
        }
        updated.status = AppointmentStatus::Canceled;
        updated.updated_at = Utc::now();

        let canceled = self.store.update(updated).await?;

        info!("Appointment {} cancelled", canceled.id);
        Ok(canceled)
    }

    /// Complete the appointment, optionally linking the medical record that
    /// triggered the completion, and announce it on the completion port.
    pub async fn complete_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        medical_record_id: Option<Uuid>,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Completing appointment: {}", appointment_id);

        let current = self.get_appointment(organization_id, appointment_id).await?;
        self.lifecycle_service
            .validate_transition(current.status, AppointmentStatus::Completed)?;

        let mut updated = current;
        updated.status = AppointmentStatus::Completed;
        if medical_record_id.is_some() {
            updated.medical_record_id = medical_record_id;
        }
        updated.updated_at = Utc::now();

        let completed = self.store.update(updated).await?;

        self.notifier.appointment_completed(&completed).await;

        info!("Appointment {} completed", completed.id);
        Ok(completed)
    }

    /// Generic transition entry point used by callers that carry the target
    /// status as data.
    pub async fn transition_status(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        target: AppointmentStatus,
        reason: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        match target {
            AppointmentStatus::Confirmed => {
                self.confirm_appointment(organization_id, appointment_id).await
            }
            AppointmentStatus::Canceled => {
                self.cancel_appointment(organization_id, appointment_id, reason)
                    .await
            }
            AppointmentStatus::Completed => {
                self.complete_appointment(organization_id, appointment_id, None)
                    .await
            }
            AppointmentStatus::Scheduled => {
                let current = self.get_appointment(organization_id, appointment_id).await?;
                Err(SchedulingError::InvalidTransition {
                    from: current.status,
                    to: AppointmentStatus::Scheduled,
                })
            }
        }
    }
}
