// libs/scheduling-cell/src/services/notify.rs
use async_trait::async_trait;
use tracing::info;

use crate::models::Appointment;

/// Outbound port announcing completed appointments so downstream workflows
/// (medical-record follow-ups, reporting) can react. The engine only emits;
/// delivery belongs to the host.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn appointment_completed(&self, appointment: &Appointment);
}

/// Default notifier: records the completion in the log stream.
pub struct LoggingCompletionNotifier;

#[async_trait]
impl CompletionNotifier for LoggingCompletionNotifier {
    async fn appointment_completed(&self, appointment: &Appointment) {
        info!(
            "Appointment {} completed for patient {} (medical record: {:?})",
            appointment.id, appointment.patient_id, appointment.medical_record_id
        );
    }
}
