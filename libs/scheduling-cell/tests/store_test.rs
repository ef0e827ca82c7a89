// libs/scheduling-cell/tests/store_test.rs
//
// PostgREST store adapter against a mock server: query construction,
// client-side interval filtering, and mapping of commit-time 409s to the
// typed conflict.

use assert_matches::assert_matches;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, CreatedVia, TimeInterval,
};
use scheduling_cell::store::{AppointmentStore, PostgrestAppointmentStore, StoreError};
use shared_utils::test_utils::TestConfig;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, hour, minute, 0).unwrap()
}

fn appointment_row(
    id: Uuid,
    organization_id: Uuid,
    professional_id: Uuid,
    start: DateTime<Utc>,
    duration_minutes: i32,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "organization_id": organization_id,
        "professional_id": professional_id,
        "patient_id": Uuid::new_v4(),
        "scheduled_date": start.to_rfc3339(),
        "duration_minutes": duration_minutes,
        "status": status,
        "appointment_type": "consultation",
        "notes": null,
        "medical_record_id": null,
        "created_via": "DASHBOARD",
        "created_at": at(8, 0).to_rfc3339(),
        "updated_at": at(8, 0).to_rfc3339()
    })
}

async fn store_for(mock_server: &MockServer) -> PostgrestAppointmentStore {
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    PostgrestAppointmentStore::new(&config, "test-token")
}

#[tokio::test]
async fn active_in_range_keeps_only_truly_overlapping_rows() {
    let mock_server = MockServer::start().await;
    let organization_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();

    let overlapping = Uuid::new_v4();
    let touching = Uuid::new_v4();

    // The fetch window is wider than the candidate range, so the adapter must
    // drop rows that merely touch the boundary.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("organization_id", format!("eq.{}", organization_id)))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .and(query_param("status", "in.(SCHEDULED,CONFIRMED)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(touching, organization_id, professional_id, at(9, 30), 30, "SCHEDULED"),
            appointment_row(overlapping, organization_id, professional_id, at(10, 15), 30, "CONFIRMED"),
        ])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server).await;
    let range = TimeInterval {
        start: at(10, 0),
        end: at(10, 30),
    };

    let rows = store
        .active_in_range(organization_id, professional_id, range, None)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, overlapping);
}

#[tokio::test]
async fn active_in_range_passes_the_exclusion_filter() {
    let mock_server = MockServer::start().await;
    let organization_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let excluded = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("neq.{}", excluded)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server).await;
    let range = TimeInterval {
        start: at(10, 0),
        end: at(10, 30),
    };

    let rows = store
        .active_in_range(organization_id, professional_id, range, Some(excluded))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn get_returns_none_for_missing_rows() {
    let mock_server = MockServer::start().await;
    let organization_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("organization_id", format!("eq.{}", organization_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server).await;

    let row = store.get(organization_id, appointment_id).await.unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn search_forwards_filters_and_parses_rows() {
    let mock_server = MockServer::start().await;
    let organization_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let row_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("organization_id", format!("eq.{}", organization_id)))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .and(query_param("status", "eq.SCHEDULED"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(row_id, organization_id, professional_id, at(9, 0), 30, "SCHEDULED"),
        ])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server).await;

    let rows = store
        .search(
            organization_id,
            &AppointmentSearchQuery {
                professional_id: Some(professional_id),
                status: Some(AppointmentStatus::Scheduled),
                limit: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, row_id);
    assert_eq!(rows[0].status, AppointmentStatus::Scheduled);
    assert_eq!(rows[0].created_via, CreatedVia::Dashboard);
}

fn sample_appointment(organization_id: Uuid) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        organization_id,
        professional_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        scheduled_date: at(10, 0),
        duration_minutes: 30,
        status: AppointmentStatus::Scheduled,
        appointment_type: None,
        notes: None,
        medical_record_id: None,
        created_via: CreatedVia::Dashboard,
        created_at: at(8, 0),
        updated_at: at(8, 0),
    }
}

#[tokio::test]
async fn insert_round_trips_the_created_row() {
    let mock_server = MockServer::start().await;
    let organization_id = Uuid::new_v4();
    let appointment = sample_appointment(organization_id);

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([serde_json::to_value(&appointment).unwrap()])),
        )
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server).await;

    let created = store.insert(appointment.clone()).await.unwrap();
    assert_eq!(created.id, appointment.id);
}

#[tokio::test]
async fn commit_time_conflict_maps_to_the_typed_conflict() {
    let mock_server = MockServer::start().await;

    // The range-exclusion constraint answers 409 when two writers race past
    // the advisory check.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint"
        })))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server).await;

    let err = store
        .insert(sample_appointment(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Conflict(None));
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server).await;

    let err = store
        .update(sample_appointment(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::NotFound);
}

#[tokio::test]
async fn backend_failures_are_surfaced_as_backend_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database on fire"))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server).await;

    let err = store
        .search(Uuid::new_v4(), &AppointmentSearchQuery::default())
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Backend(_));
}
