// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentContext};

pub fn appointment_routes(state: Arc<AppointmentContext>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", get(handlers::list_my_appointments).post(handlers::create_appointment))
        .route(
            "/available",
            get(handlers::list_available_appointments).post(handlers::generate_availability),
        )
        .route("/all", get(handlers::list_all_appointments))
        .route("/maintenance/sweep", post(handlers::sweep_expired))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .patch(handlers::patch_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/reserve", post(handlers::reserve_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
