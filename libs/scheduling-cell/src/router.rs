// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All dashboard appointment operations require authentication
    let protected_routes = Router::new()
        .route(
            "/",
            get(handlers::list_appointments).post(handlers::book_appointment),
        )
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).put(handlers::update_appointment),
        )
        .route("/{appointment_id}/cancel", put(handlers::cancel_appointment))
        .route("/{appointment_id}/confirm", put(handlers::confirm_appointment))
        .route(
            "/{appointment_id}/complete",
            put(handlers::complete_appointment),
        )
        .route(
            "/availability/{professional_id}",
            get(handlers::get_availability),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

/// Self-service booking surface: slot listing and appointment creation
/// without a session.
pub fn public_booking_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/availability/{professional_id}",
            get(handlers::public_availability),
        )
        .route("/appointments", post(handlers::public_book_appointment))
        .with_state(state)
}
