// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_config::SchedulingSettings;
use shared_database::{DirectoryError, SupabaseError};
use shared_models::error::AppError;

pub const MAX_MOTIVE_LENGTH: usize = 255;
/// Longest rolling calendar the slot generator will fill.
pub const MAX_HORIZON_DAYS: u32 = 366;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentState {
    Available,
    Confirmed,
    Completed,
    Expired,
}

impl AppointmentState {
    /// Occupying states hold the (practitioner, time) slot.
    pub fn is_occupying(&self) -> bool {
        matches!(self, AppointmentState::Available | AppointmentState::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_occupying()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentState::Available => "available",
            AppointmentState::Confirmed => "confirmed",
            AppointmentState::Completed => "completed",
            AppointmentState::Expired => "expired",
        }
    }
}

impl fmt::Display for AppointmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub state: AppointmentState,
    pub motive: Option<String>,
    #[serde(default)]
    pub version: i64,
}

impl Appointment {
    /// A free slot, as produced by the slot generator.
    pub fn available(practitioner_id: Uuid, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            practitioner_id,
            patient_id: None,
            scheduled_at,
            state: AppointmentState::Available,
            motive: None,
            version: 0,
        }
    }

    /// A booking made directly by staff for a known patient.
    pub fn confirmed(
        patient_id: Uuid,
        practitioner_id: Uuid,
        scheduled_at: DateTime<Utc>,
        motive: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            practitioner_id,
            patient_id: Some(patient_id),
            scheduled_at,
            state: AppointmentState::Confirmed,
            motive,
            version: 0,
        }
    }

    pub fn occupies(&self, practitioner_id: Uuid, scheduled_at: DateTime<Utc>) -> bool {
        self.state.is_occupying()
            && self.practitioner_id == practitioner_id
            && self.scheduled_at == scheduled_at
    }

    pub fn is_owned_by(&self, patient_id: Uuid) -> bool {
        self.patient_id == Some(patient_id)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub motive: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReserveAppointmentRequest {
    pub motive: Option<String>,
}

/// Partial update of an appointment. The state is never part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppointmentPatch {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub practitioner_id: Option<Uuid>,
    pub motive: Option<String>,
}

impl AppointmentPatch {
    pub fn moves_slot(&self) -> bool {
        self.scheduled_at.is_some() || self.practitioner_id.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.moves_slot() && self.motive.is_none()
    }
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub practitioner_id: Uuid,
    pub practitioner_name: Option<String>,
    pub specialty: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub state: AppointmentState,
    pub motive: Option<String>,
    pub version: i64,
}

impl AppointmentResponse {
    pub fn bare(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            patient_name: None,
            practitioner_id: appointment.practitioner_id,
            practitioner_name: None,
            specialty: None,
            scheduled_at: appointment.scheduled_at,
            state: appointment.state,
            motive: appointment.motive.clone(),
            version: appointment.version,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub practitioners: usize,
    pub created: usize,
    pub skipped_existing: usize,
    pub skipped_past: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub completed: usize,
    pub expired: usize,
    pub stale: usize,
}

impl SweepReport {
    pub fn transitioned(&self) -> usize {
        self.completed + self.expired
    }
}

// ==============================================================================
// SLOT GRID
// ==============================================================================

/// Shape of the rolling availability calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    pub horizon_days: u32,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub slot_minutes: u32,
    pub include_today: bool,
    pub utc_offset_minutes: i32,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            day_start_hour: 8,
            day_end_hour: 15,
            slot_minutes: 30,
            include_today: false,
            utc_offset_minutes: 0,
        }
    }
}

impl SlotGrid {
    pub fn validated(self) -> Result<Self, AppointmentError> {
        if self.horizon_days == 0 {
            return Err(AppointmentError::Validation("horizon must cover at least one day".to_string()));
        }
        if self.horizon_days > MAX_HORIZON_DAYS {
            return Err(AppointmentError::Validation(format!(
                "horizon of {} days exceeds the maximum of {}",
                self.horizon_days, MAX_HORIZON_DAYS
            )));
        }
        if self.day_start_hour >= self.day_end_hour || self.day_end_hour > 24 {
            return Err(AppointmentError::Validation(format!(
                "invalid working hours {}..{}",
                self.day_start_hour, self.day_end_hour
            )));
        }
        if self.slot_minutes == 0 || (24 * 60) % self.slot_minutes != 0 {
            return Err(AppointmentError::Validation(format!(
                "slot length of {} minutes does not divide a day",
                self.slot_minutes
            )));
        }
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return Err(AppointmentError::Validation(format!(
                "utc offset of {} minutes is out of range",
                self.utc_offset_minutes
            )));
        }
        Ok(self)
    }

    pub fn slots_per_day(&self) -> u32 {
        (self.day_end_hour - self.day_start_hour) * 60 / self.slot_minutes
    }
}

impl TryFrom<&SchedulingSettings> for SlotGrid {
    type Error = AppointmentError;

    fn try_from(settings: &SchedulingSettings) -> Result<Self, Self::Error> {
        SlotGrid {
            horizon_days: settings.horizon_days,
            day_start_hour: settings.day_start_hour,
            day_end_hour: settings.day_end_hour,
            slot_minutes: settings.slot_minutes,
            include_today: settings.include_today,
            utc_offset_minutes: settings.utc_offset_minutes,
        }
        .validated()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    AccessDenied,
    Validation,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Practitioner not found")]
    PractitionerNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Another appointment already occupies this slot")]
    SlotOccupied,

    #[error("Appointment is not available")]
    NotAvailable,

    #[error("Appointment was modified concurrently, try again")]
    ConcurrentModification,

    #[error("Only confirmed appointments can be cancelled")]
    NotCancellable,

    #[error("Appointment time {0} is in the past")]
    PastDate(DateTime<Utc>),

    #[error("Appointment is {0} and can no longer be moved")]
    TerminalState(AppointmentState),

    #[error("Not allowed to act on this appointment")]
    AccessDenied,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::AppointmentNotFound
            | AppointmentError::PractitionerNotFound
            | AppointmentError::PatientNotFound => ErrorKind::NotFound,
            AppointmentError::SlotOccupied
            | AppointmentError::NotAvailable
            | AppointmentError::ConcurrentModification => ErrorKind::Conflict,
            AppointmentError::NotCancellable
            | AppointmentError::PastDate(_)
            | AppointmentError::TerminalState(_) => ErrorKind::InvalidState,
            AppointmentError::AccessDenied => ErrorKind::AccessDenied,
            AppointmentError::Validation(_) => ErrorKind::Validation,
            AppointmentError::Repository(_) | AppointmentError::Directory(_) => ErrorKind::Internal,
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        let message = error.to_string();
        match error.kind() {
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::InvalidState => AppError::BadRequest(message),
            ErrorKind::AccessDenied => AppError::Forbidden(message),
            ErrorKind::Validation => AppError::ValidationError(message),
            ErrorKind::Internal => AppError::Internal(message),
        }
    }
}

/// Store-level failures reported by an `AppointmentRepository`.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("slot is already held by an active appointment")]
    SlotTaken,

    #[error("appointment {0} was modified by another writer")]
    VersionConflict(Uuid),

    #[error("appointment {0} does not exist")]
    NotFound(Uuid),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<SupabaseError> for RepositoryError {
    fn from(error: SupabaseError) -> Self {
        match error {
            SupabaseError::Conflict(_) => RepositoryError::SlotTaken,
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}

pub fn validate_motive(motive: Option<&str>) -> Result<(), AppointmentError> {
    match motive {
        Some(text) if text.chars().count() > MAX_MOTIVE_LENGTH => Err(AppointmentError::Validation(
            format!("motive must be at most {} characters", MAX_MOTIVE_LENGTH),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::StatusCode;

    #[test]
    fn states_serialize_in_snake_case() {
        assert_eq!(serde_json::to_string(&AppointmentState::Confirmed).unwrap(), "\"confirmed\"");
        let parsed: AppointmentState = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(parsed, AppointmentState::Expired);
    }

    #[test]
    fn only_available_and_confirmed_occupy() {
        assert!(AppointmentState::Available.is_occupying());
        assert!(AppointmentState::Confirmed.is_occupying());
        assert!(AppointmentState::Completed.is_terminal());
        assert!(AppointmentState::Expired.is_terminal());
    }

    #[test]
    fn motive_length_is_bounded_in_characters() {
        assert!(validate_motive(None).is_ok());
        assert!(validate_motive(Some(&"ñ".repeat(MAX_MOTIVE_LENGTH))).is_ok());
        assert_matches!(
            validate_motive(Some(&"a".repeat(MAX_MOTIVE_LENGTH + 1))),
            Err(AppointmentError::Validation(_))
        );
    }

    #[test]
    fn grid_validation_rejects_bad_shapes() {
        assert!(SlotGrid::default().validated().is_ok());
        assert_eq!(SlotGrid::default().slots_per_day(), 14);

        let inverted = SlotGrid { day_start_hour: 15, day_end_hour: 8, ..SlotGrid::default() };
        assert_matches!(inverted.validated(), Err(AppointmentError::Validation(_)));

        let odd_step = SlotGrid { slot_minutes: 7, ..SlotGrid::default() };
        assert_matches!(odd_step.validated(), Err(AppointmentError::Validation(_)));

        let no_horizon = SlotGrid { horizon_days: 0, ..SlotGrid::default() };
        assert_matches!(no_horizon.validated(), Err(AppointmentError::Validation(_)));

        let year = SlotGrid { horizon_days: MAX_HORIZON_DAYS, ..SlotGrid::default() };
        assert!(year.validated().is_ok());

        let oversized = SlotGrid { horizon_days: 400_000_000, ..SlotGrid::default() };
        assert_matches!(oversized.validated(), Err(AppointmentError::Validation(_)));

        let far_offset = SlotGrid { utc_offset_minutes: 15 * 60, ..SlotGrid::default() };
        assert_matches!(far_offset.validated(), Err(AppointmentError::Validation(_)));
    }

    #[test]
    fn oversized_configured_horizon_is_rejected_at_startup() {
        let settings = SchedulingSettings {
            horizon_days: 400_000_000,
            ..SchedulingSettings::default()
        };
        assert_matches!(SlotGrid::try_from(&settings), Err(AppointmentError::Validation(_)));
        assert!(SlotGrid::try_from(&SchedulingSettings::default()).is_ok());
    }

    #[test]
    fn error_kinds_map_to_http_categories() {
        let cases = [
            (AppointmentError::AppointmentNotFound, StatusCode::NOT_FOUND),
            (AppointmentError::NotAvailable, StatusCode::CONFLICT),
            (AppointmentError::SlotOccupied, StatusCode::CONFLICT),
            (AppointmentError::NotCancellable, StatusCode::BAD_REQUEST),
            (AppointmentError::PastDate(Utc::now()), StatusCode::BAD_REQUEST),
            (AppointmentError::AccessDenied, StatusCode::FORBIDDEN),
            (AppointmentError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                AppointmentError::Repository(RepositoryError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(AppError::from(error).status_code(), status);
        }
    }

    #[test]
    fn supabase_conflict_means_slot_taken() {
        assert_matches!(
            RepositoryError::from(SupabaseError::Conflict("duplicate key".into())),
            RepositoryError::SlotTaken
        );
    }
}
