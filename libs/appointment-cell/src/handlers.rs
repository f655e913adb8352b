// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Actor, Capability};
use shared_models::error::AppError;

use crate::engine::AppointmentEngine;
use crate::models::{
    AppointmentError, AppointmentPatch, AppointmentState, CreateAppointmentRequest,
    ReserveAppointmentRequest,
};
use crate::services::scheduler::{MaintenanceScheduler, TaskOutcome};

/// Shared state behind the appointment routes.
pub struct AppointmentContext {
    pub config: Arc<AppConfig>,
    pub engine: Arc<AppointmentEngine>,
    pub scheduler: Arc<MaintenanceScheduler>,
}

fn require(actor: &Actor, capability: Capability) -> Result<(), AppError> {
    if actor.can(capability) {
        Ok(())
    } else {
        Err(AppointmentError::AccessDenied.into())
    }
}

// ==============================================================================
// READ HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.engine.list_for_patient(actor.id).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_available_appointments(
    State(state): State<Arc<AppointmentContext>>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.engine.list_available().await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_all_appointments(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Capability::ViewAllAppointments)?;
    let appointments = state.engine.list_all().await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

/// Owners and staff see any appointment; anyone may look at a free slot.
#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.engine.get(appointment_id).await?;

    let visible = actor.can(Capability::ViewAllAppointments)
        || appointment.patient_id == Some(actor.id)
        || appointment.state == AppointmentState::Available;
    if !visible {
        return Err(AppointmentError::AccessDenied.into());
    }

    Ok(Json(json!({ "appointment": appointment })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let for_self = request.patient_id == actor.id && actor.can(Capability::BookAppointments);
    if !for_self && !actor.can(Capability::ManageAppointments) {
        return Err(AppointmentError::AccessDenied.into());
    }

    let appointment = state.engine.create(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment
        })),
    ))
}

#[axum::debug_handler]
pub async fn reserve_appointment(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<ReserveAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Capability::BookAppointments)?;
    let motive = body.and_then(|Json(request)| request.motive);

    state.engine.reserve(appointment_id, actor.id, motive).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment reserved"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.engine.cancel(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn patch_appointment(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
    Json(patch): Json<AppointmentPatch>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Capability::ManageAppointments)?;
    let appointment = state.engine.patch(appointment_id, patch).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !actor.can(Capability::ManageAppointments) {
        let appointment = state.engine.find(appointment_id).await?;
        if !appointment.is_owned_by(actor.id) {
            return Err(AppointmentError::AccessDenied.into());
        }
    }

    state.engine.delete(appointment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// MAINTENANCE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn generate_availability(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require(&actor, Capability::ManageAppointments)?;
    debug!("Slot generation requested by {}", actor.id);

    match state.scheduler.generation().run_once().await {
        TaskOutcome::Ran(report) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "report": report
            })),
        )),
        TaskOutcome::Skipped => Err(AppError::Conflict("Slot generation is already running".to_string())),
        TaskOutcome::Failed(e) => Err(e.into()),
    }
}

#[axum::debug_handler]
pub async fn sweep_expired(
    State(state): State<Arc<AppointmentContext>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    require(&actor, Capability::ManageAppointments)?;

    match state.scheduler.sweep().run_once().await {
        TaskOutcome::Ran(report) => Ok(Json(json!({
            "success": true,
            "report": report
        }))),
        TaskOutcome::Skipped => Err(AppError::Conflict("Expiry sweep is already running".to_string())),
        TaskOutcome::Failed(e) => Err(e.into()),
    }
}
