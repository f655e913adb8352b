// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::repository::AppointmentRepository;

pub struct ConflictDetectionService {
    repository: Arc<dyn AppointmentRepository>,
}

impl ConflictDetectionService {
    pub fn new(repository: Arc<dyn AppointmentRepository>) -> Self {
        Self { repository }
    }

    /// Occupying appointments at exactly this slot, other than `exclude_appointment_id`.
    pub async fn occupants(
        &self,
        practitioner_id: Uuid,
        scheduled_at: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Checking conflicts for practitioner {} at {}", practitioner_id, scheduled_at);

        let occupants = self
            .repository
            .find_by_practitioner_and_time(practitioner_id, scheduled_at)
            .await?
            .into_iter()
            .filter(|a| Some(a.id) != exclude_appointment_id)
            .filter(|a| a.occupies(practitioner_id, scheduled_at))
            .collect::<Vec<_>>();

        if !occupants.is_empty() {
            warn!(
                "Conflict detected for practitioner {} at {} - {} occupying appointments",
                practitioner_id,
                scheduled_at,
                occupants.len()
            );
        }

        Ok(occupants)
    }

    pub async fn has_conflict(
        &self,
        practitioner_id: Uuid,
        scheduled_at: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        Ok(!self
            .occupants(practitioner_id, scheduled_at, exclude_appointment_id)
            .await?
            .is_empty())
    }
}
