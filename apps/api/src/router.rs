use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::router::{appointment_routes, public_booking_routes};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "LuminaCare scheduling API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/public", public_booking_routes(state))
}
