use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, AppointmentContext};

pub fn create_router(state: Arc<AppointmentContext>) -> Router {
    Router::new()
        .route("/", get(|| async { "Scheduling API is running!" }))
        .nest("/appointments", appointment_routes(state))
}
