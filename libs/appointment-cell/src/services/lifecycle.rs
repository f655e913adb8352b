// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentState};

/// The appointment state machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Get all valid next states for a given current state
    pub fn get_valid_transitions(&self, current: AppointmentState) -> Vec<AppointmentState> {
        match current {
            AppointmentState::Available => vec![AppointmentState::Confirmed, AppointmentState::Expired],
            AppointmentState::Confirmed => vec![AppointmentState::Available, AppointmentState::Completed],
            // Terminal states - no transitions allowed
            AppointmentState::Completed | AppointmentState::Expired => vec![],
        }
    }

    pub fn validate_transition(
        &self,
        current: AppointmentState,
        next: AppointmentState,
    ) -> Result<(), AppointmentError> {
        if self.get_valid_transitions(current).contains(&next) {
            debug!("State transition validated: {} -> {}", current, next);
            return Ok(());
        }

        warn!("Invalid state transition attempted: {} -> {}", current, next);
        Err(match (current, next) {
            (AppointmentState::Available, AppointmentState::Available) => AppointmentError::NotCancellable,
            (_, AppointmentState::Confirmed) => AppointmentError::NotAvailable,
            (_, AppointmentState::Available) => AppointmentError::NotCancellable,
            (state, _) => AppointmentError::TerminalState(state),
        })
    }

    /// Where an appointment goes once its time has passed, if anywhere.
    pub fn expiry_target(&self, current: AppointmentState) -> Option<AppointmentState> {
        match current {
            AppointmentState::Confirmed => Some(AppointmentState::Completed),
            AppointmentState::Available => Some(AppointmentState::Expired),
            AppointmentState::Completed | AppointmentState::Expired => None,
        }
    }
}
