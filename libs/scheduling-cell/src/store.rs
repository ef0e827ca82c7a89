// libs/scheduling-cell/src/store.rs
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Duration;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{ApiStatusError, SupabaseClient};

use crate::models::{Appointment, AppointmentSearchQuery, SchedulingError, TimeInterval};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("appointment overlaps an existing booking")]
    Conflict(Option<Box<Appointment>>),

    #[error("appointment not found")]
    NotFound,

    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(conflicting) => SchedulingError::Conflict { conflicting },
            StoreError::NotFound => SchedulingError::NotFound,
            StoreError::Backend(message) => SchedulingError::Database(message),
        }
    }
}

/// Persistence port for the scheduling engine. Implementations own the final
/// word on the no-overlap invariant: `insert` and `update` must re-validate it
/// atomically and answer with `StoreError::Conflict` when it would break. The
/// in-engine conflict check that runs before a write is advisory, so two
/// concurrent bookings can both pass it; the store is the arbiter.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, organization_id: Uuid, id: Uuid)
        -> Result<Option<Appointment>, StoreError>;

    async fn search(
        &self,
        organization_id: Uuid,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Calendar-occupying appointments (SCHEDULED/CONFIRMED) for a
    /// professional whose interval intersects `range`, ascending by start.
    async fn active_in_range(
        &self,
        organization_id: Uuid,
        professional_id: Uuid,
        range: TimeInterval,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError>;
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Mutex-guarded store that re-checks the overlap invariant under its lock on
/// every write. Reference arbiter for the integration suites and local runs.
#[derive(Default)]
pub struct MemoryAppointmentStore {
    rows: Mutex<HashMap<Uuid, Appointment>>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_overlap(
        rows: &HashMap<Uuid, Appointment>,
        candidate: &Appointment,
    ) -> Option<Appointment> {
        if !candidate.occupies_calendar() {
            return None;
        }

        let candidate_interval = candidate.interval();
        rows.values()
            .filter(|row| {
                row.id != candidate.id
                    && row.organization_id == candidate.organization_id
                    && row.professional_id == candidate.professional_id
                    && row.occupies_calendar()
            })
            .find(|row| row.interval().overlaps(&candidate_interval))
            .cloned()
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn get(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Appointment>, StoreError> {
        let rows = self.rows.lock().expect("store lock poisoned");
        Ok(rows
            .get(&id)
            .filter(|row| row.organization_id == organization_id)
            .cloned())
    }

    async fn search(
        &self,
        organization_id: Uuid,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.lock().expect("store lock poisoned");

        let mut matches: Vec<Appointment> = rows
            .values()
            .filter(|row| row.organization_id == organization_id)
            .filter(|row| {
                query
                    .professional_id
                    .map_or(true, |id| row.professional_id == id)
            })
            .filter(|row| query.patient_id.map_or(true, |id| row.patient_id == id))
            .filter(|row| query.status.map_or(true, |status| row.status == status))
            .filter(|row| query.start_date.map_or(true, |date| row.scheduled_date >= date))
            .filter(|row| query.end_date.map_or(true, |date| row.scheduled_date <= date))
            .cloned()
            .collect();

        matches.sort_by_key(|row| row.scheduled_date);

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let mut matches: Vec<Appointment> = matches.into_iter().skip(offset).collect();
        if let Some(limit) = query.limit {
            matches.truncate(limit.max(0) as usize);
        }

        Ok(matches)
    }

    async fn active_in_range(
        &self,
        organization_id: Uuid,
        professional_id: Uuid,
        range: TimeInterval,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.lock().expect("store lock poisoned");

        let mut matches: Vec<Appointment> = rows
            .values()
            .filter(|row| {
                row.organization_id == organization_id
                    && row.professional_id == professional_id
                    && row.occupies_calendar()
                    && exclude_appointment_id.map_or(true, |id| row.id != id)
                    && row.interval().overlaps(&range)
            })
            .cloned()
            .collect();

        matches.sort_by_key(|row| row.scheduled_date);
        Ok(matches)
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.lock().expect("store lock poisoned");

        if let Some(conflicting) = Self::find_overlap(&rows, &appointment) {
            return Err(StoreError::Conflict(Some(Box::new(conflicting))));
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.lock().expect("store lock poisoned");

        let exists = rows
            .get(&appointment.id)
            .is_some_and(|row| row.organization_id == appointment.organization_id);
        if !exists {
            return Err(StoreError::NotFound);
        }

        if let Some(conflicting) = Self::find_overlap(&rows, &appointment) {
            return Err(StoreError::Conflict(Some(Box::new(conflicting))));
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }
}

// ==============================================================================
// POSTGREST-BACKED STORE
// ==============================================================================

/// Store adapter speaking PostgREST. Commit-time conflicts surface as HTTP 409
/// from the appointments range-exclusion constraint and map to
/// `StoreError::Conflict`; the conflicting row is not available on that path.
pub struct PostgrestAppointmentStore {
    client: SupabaseClient,
    auth_token: String,
}

impl PostgrestAppointmentStore {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self {
            client: SupabaseClient::new(config),
            auth_token: auth_token.to_string(),
        }
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        headers
    }

    fn map_error(err: anyhow::Error) -> StoreError {
        if let Some(api) = err.downcast_ref::<ApiStatusError>() {
            if api.is_conflict() {
                return StoreError::Conflict(None);
            }
        }
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
impl AppointmentStore for PostgrestAppointmentStore {
    async fn get(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&organization_id=eq.{}",
            id, organization_id
        );

        let rows: Vec<Appointment> = self
            .client
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(Self::map_error)?;

        Ok(rows.into_iter().next())
    }

    async fn search(
        &self,
        organization_id: Uuid,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut query_parts = vec![format!("organization_id=eq.{}", organization_id)];

        if let Some(professional_id) = query.professional_id {
            query_parts.push(format!("professional_id=eq.{}", professional_id));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(start_date) = query.start_date {
            let encoded = urlencoding::encode(&start_date.to_rfc3339()).into_owned();
            query_parts.push(format!("scheduled_date=gte.{}", encoded));
        }
        if let Some(end_date) = query.end_date {
            let encoded = urlencoding::encode(&end_date.to_rfc3339()).into_owned();
            query_parts.push(format!("scheduled_date=lte.{}", encoded));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=scheduled_date.asc",
            query_parts.join("&")
        );
        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        self.client
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(Self::map_error)
    }

    async fn active_in_range(
        &self,
        organization_id: Uuid,
        professional_id: Uuid,
        range: TimeInterval,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        // The end column is derived from start + duration, so fetch a window
        // widened by one day and filter precisely in memory.
        let window_start = range.start - Duration::days(1);
        let start_encoded = urlencoding::encode(&window_start.to_rfc3339()).into_owned();
        let end_encoded = urlencoding::encode(&range.end.to_rfc3339()).into_owned();

        let mut path = format!(
            "/rest/v1/appointments?organization_id=eq.{}&professional_id=eq.{}&status=in.(SCHEDULED,CONFIRMED)&scheduled_date=gte.{}&scheduled_date=lt.{}&order=scheduled_date.asc",
            organization_id, professional_id, start_encoded, end_encoded
        );
        if let Some(exclude_id) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", exclude_id));
        }

        debug!("Fetching active appointments: {}", path);

        let rows: Vec<Appointment> = self
            .client
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(Self::map_error)?;

        Ok(rows
            .into_iter()
            .filter(|row| row.interval().overlaps(&range))
            .collect())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<Appointment> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(&self.auth_token),
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(Self::map_error)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Failed to create appointment".to_string()))
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&organization_id=eq.{}",
            appointment.id, appointment.organization_id
        );
        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<Appointment> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(Self::map_error)?;

        rows.into_iter().next().ok_or(StoreError::NotFound)
    }
}
