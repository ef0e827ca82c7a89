// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentSearchQuery, BookAppointmentRequest, CancelAppointmentRequest,
    CompleteAppointmentRequest, CreatedVia, SchedulingError, UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::slots::SlotGenerationService;
use crate::store::PostgrestAppointmentStore;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct PublicAvailabilityQuery {
    pub organization_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct PublicBookingRequest {
    pub organization_id: Uuid,
    pub professional_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<String>,
    pub notes: Option<String>,
}

// ==============================================================================
// SERVICE WIRING
// ==============================================================================

fn booking_service(config: &AppConfig, auth_token: &str) -> AppointmentBookingService {
    let store = Arc::new(PostgrestAppointmentStore::new(config, auth_token));
    AppointmentBookingService::new(store)
}

fn slot_service(config: &AppConfig, auth_token: &str) -> SlotGenerationService {
    let store = Arc::new(PostgrestAppointmentStore::new(config, auth_token));
    SlotGenerationService::new(store, config.schedule.clone())
}

fn map_scheduling_error(err: SchedulingError) -> AppError {
    match err {
        SchedulingError::Validation(message) => AppError::ValidationError(message),
        SchedulingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::Conflict { conflicting } => AppError::Conflict {
            message: "Time slot unavailable. An appointment already exists in this period"
                .to_string(),
            details: conflicting.and_then(|appointment| serde_json::to_value(*appointment).ok()),
        },
        SchedulingError::InvalidTransition { from, to } => AppError::UnprocessableEntity(format!(
            "Appointment cannot move from {} to {}",
            from, to
        )),
        SchedulingError::Database(message) => AppError::Database(message),
    }
}

// ==============================================================================
// DASHBOARD APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = booking_service(&state, auth.token());

    let appointments = service
        .search_appointments(user.organization_id, query)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "data": appointments })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let service = booking_service(&state, auth.token());

    let appointment = service
        .get_appointment(user.organization_id, appointment_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let service = booking_service(&state, auth.token());

    let appointment = service
        .book_appointment(user.organization_id, request, CreatedVia::Dashboard)
        .await
        .map_err(map_scheduling_error)?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let service = booking_service(&state, auth.token());

    let appointment = service
        .update_appointment(user.organization_id, appointment_id, request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let service = booking_service(&state, auth.token());

    let appointment = service
        .cancel_appointment(user.organization_id, appointment_id, request.reason)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let service = booking_service(&state, auth.token());

    let appointment = service
        .confirm_appointment(user.organization_id, appointment_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let service = booking_service(&state, auth.token());

    let appointment = service
        .complete_appointment(
            user.organization_id,
            appointment_id,
            request.medical_record_id,
        )
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let service = slot_service(&state, auth.token());

    let availability = service
        .day_availability(user.organization_id, professional_id, query.date, Utc::now())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(availability)))
}

// ==============================================================================
// PUBLIC SELF-SERVICE BOOKING HANDLERS
// ==============================================================================

/// Free slots for the public booking page. Unauthenticated; reads go through
/// the anon role, so row-level policies stay in force.
#[axum::debug_handler]
pub async fn public_availability(
    State(state): State<Arc<AppConfig>>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<PublicAvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let service = slot_service(&state, &state.supabase_anon_key);

    let availability = service
        .day_availability(
            query.organization_id,
            professional_id,
            query.date,
            Utc::now(),
        )
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn public_book_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<PublicBookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let service = booking_service(&state, &state.supabase_anon_key);

    let booking = BookAppointmentRequest {
        professional_id: request.professional_id,
        patient_id: request.patient_id,
        scheduled_date: request.scheduled_date,
        duration_minutes: request.duration_minutes,
        appointment_type: request.appointment_type,
        notes: request.notes,
    };

    let appointment = service
        .book_appointment(request.organization_id, booking, CreatedVia::Public)
        .await
        .map_err(map_scheduling_error)?;

    Ok((StatusCode::CREATED, Json(appointment)))
}
