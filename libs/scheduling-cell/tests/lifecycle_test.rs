// libs/scheduling-cell/tests/lifecycle_test.rs
//
// Status state machine: legal paths, terminal states, and the transition
// endpoints' side effects (cancellation notes, medical record links,
// completion notifications).

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use scheduling_cell::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, CreatedVia, SchedulingError,
};
use scheduling_cell::services::booking::AppointmentBookingService;
use scheduling_cell::services::lifecycle::AppointmentLifecycleService;
use scheduling_cell::services::notify::CompletionNotifier;
use scheduling_cell::store::MemoryAppointmentStore;

// ==============================================================================
// PURE STATE MACHINE
// ==============================================================================

#[test]
fn scheduled_can_confirm_cancel_or_complete() {
    let lifecycle = AppointmentLifecycleService::new();

    for target in [
        AppointmentStatus::Confirmed,
        AppointmentStatus::Canceled,
        AppointmentStatus::Completed,
    ] {
        assert!(lifecycle
            .validate_transition(AppointmentStatus::Scheduled, target)
            .is_ok());
    }
}

#[test]
fn confirmed_accepts_reconfirmation() {
    let lifecycle = AppointmentLifecycleService::new();

    assert!(lifecycle
        .validate_transition(AppointmentStatus::Confirmed, AppointmentStatus::Confirmed)
        .is_ok());
}

#[test]
fn terminal_states_admit_no_transition() {
    let lifecycle = AppointmentLifecycleService::new();

    for from in [AppointmentStatus::Canceled, AppointmentStatus::Completed] {
        for to in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Canceled,
            AppointmentStatus::Completed,
        ] {
            let err = lifecycle.validate_transition(from, to).unwrap_err();
            assert_matches!(err, SchedulingError::InvalidTransition { .. });
        }
        assert!(lifecycle.valid_transitions(from).is_empty());
    }
}

#[test]
fn nothing_returns_to_scheduled() {
    let lifecycle = AppointmentLifecycleService::new();

    for from in [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Canceled,
        AppointmentStatus::Completed,
    ] {
        assert!(lifecycle
            .validate_transition(from, AppointmentStatus::Scheduled)
            .is_err());
    }
}

// ==============================================================================
// TRANSITIONS THROUGH THE BOOKING SERVICE
// ==============================================================================

struct CountingNotifier {
    completions: AtomicUsize,
}

#[async_trait]
impl CompletionNotifier for CountingNotifier {
    async fn appointment_completed(&self, _appointment: &Appointment) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

struct TestSetup {
    service: AppointmentBookingService,
    notifier: Arc<CountingNotifier>,
    organization_id: Uuid,
}

impl TestSetup {
    fn new() -> Self {
        let store = Arc::new(MemoryAppointmentStore::new());
        let notifier = Arc::new(CountingNotifier {
            completions: AtomicUsize::new(0),
        });
        Self {
            service: AppointmentBookingService::with_notifier(
                store,
                Arc::clone(&notifier) as Arc<dyn CompletionNotifier>,
            ),
            notifier,
            organization_id: Uuid::new_v4(),
        }
    }

    async fn booked_appointment(&self) -> Appointment {
        self.service
            .book_appointment(
                self.organization_id,
                BookAppointmentRequest {
                    professional_id: Uuid::new_v4(),
                    patient_id: Uuid::new_v4(),
                    scheduled_date: Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap(),
                    duration_minutes: Some(30),
                    appointment_type: None,
                    notes: None,
                },
                CreatedVia::Dashboard,
            )
            .await
            .expect("test booking should succeed")
    }
}

#[tokio::test]
async fn full_happy_path_runs_scheduled_confirmed_completed() {
    let setup = TestSetup::new();
    let appointment = setup.booked_appointment().await;

    let confirmed = setup
        .service
        .confirm_appointment(setup.organization_id, appointment.id)
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let record_id = Uuid::new_v4();
    let completed = setup
        .service
        .complete_appointment(setup.organization_id, appointment.id, Some(record_id))
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert_eq!(completed.medical_record_id, Some(record_id));
    assert_eq!(setup.notifier.completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn canceled_appointment_rejects_every_follow_up() {
    let setup = TestSetup::new();
    let appointment = setup.booked_appointment().await;

    setup
        .service
        .cancel_appointment(setup.organization_id, appointment.id, None)
        .await
        .unwrap();

    let err = setup
        .service
        .confirm_appointment(setup.organization_id, appointment.id)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        SchedulingError::InvalidTransition {
            from: AppointmentStatus::Canceled,
            ..
        }
    );

    // Cancelling twice is explicitly an error, not an idempotent no-op.
    let err = setup
        .service
        .cancel_appointment(setup.organization_id, appointment.id, None)
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::InvalidTransition { .. });

    let err = setup
        .service
        .complete_appointment(setup.organization_id, appointment.id, None)
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::InvalidTransition { .. });
}

#[tokio::test]
async fn completed_appointment_cannot_be_completed_again() {
    let setup = TestSetup::new();
    let appointment = setup.booked_appointment().await;

    setup
        .service
        .complete_appointment(setup.organization_id, appointment.id, None)
        .await
        .unwrap();

    let err = setup
        .service
        .complete_appointment(setup.organization_id, appointment.id, None)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        SchedulingError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Completed,
        }
    );
    // The notifier fired exactly once.
    assert_eq!(setup.notifier.completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancellation_reason_is_appended_to_existing_notes() {
    let setup = TestSetup::new();

    let appointment = setup
        .service
        .book_appointment(
            setup.organization_id,
            BookAppointmentRequest {
                professional_id: Uuid::new_v4(),
                patient_id: Uuid::new_v4(),
                scheduled_date: Utc.with_ymd_and_hms(2030, 1, 7, 11, 0, 0).unwrap(),
                duration_minutes: Some(30),
                appointment_type: None,
                notes: Some("first visit".to_string()),
            },
            CreatedVia::Dashboard,
        )
        .await
        .unwrap();

    let canceled = setup
        .service
        .cancel_appointment(
            setup.organization_id,
            appointment.id,
            Some("double booked elsewhere".to_string()),
        )
        .await
        .unwrap();

    let notes = canceled.notes.unwrap();
    assert!(notes.starts_with("first visit"));
    assert!(notes.contains("Cancellation reason: double booked elsewhere"));
}

#[tokio::test]
async fn transition_status_dispatches_by_target() {
    let setup = TestSetup::new();
    let appointment = setup.booked_appointment().await;

    let confirmed = setup
        .service
        .transition_status(
            setup.organization_id,
            appointment.id,
            AppointmentStatus::Confirmed,
            None,
        )
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let err = setup
        .service
        .transition_status(
            setup.organization_id,
            appointment.id,
            AppointmentStatus::Scheduled,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        SchedulingError::InvalidTransition {
            to: AppointmentStatus::Scheduled,
            ..
        }
    );

    let canceled = setup
        .service
        .transition_status(
            setup.organization_id,
            appointment.id,
            AppointmentStatus::Canceled,
            Some("clinic closure".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(canceled.status, AppointmentStatus::Canceled);
    assert!(canceled.notes.unwrap().contains("clinic closure"));
}
