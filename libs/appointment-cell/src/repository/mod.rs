// libs/appointment-cell/src/repository/mod.rs
pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentState, RepositoryError};

pub use memory::InMemoryAppointmentRepository;
pub use supabase::SupabaseAppointmentRepository;

/// Whether writing `candidate` would put two occupying appointments on the same slot.
pub fn slot_conflict(candidate: &Appointment, existing: &Appointment) -> bool {
    candidate.state.is_occupying()
        && existing.id != candidate.id
        && existing.occupies(candidate.practitioner_id, candidate.scheduled_at)
}

/// Result of a batch of version-conditional writes.
#[derive(Debug, Default)]
pub struct BatchUpdate {
    pub updated: Vec<Appointment>,
    /// Ids whose stored version no longer matched.
    pub stale: Vec<Uuid>,
}

/// Persistence for appointments.
///
/// `insert` and `update` are atomic check-and-write operations: both refuse to
/// place an occupying appointment on a slot another occupying appointment
/// holds (`SlotTaken`), and `update` only applies when the stored `version`
/// equals the caller's (`VersionConflict`). A successful `update` returns the
/// stored record with its version incremented.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError>;

    /// Every appointment at this exact slot, in any state.
    async fn find_by_practitioner_and_time(
        &self,
        practitioner_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, RepositoryError>;

    async fn exists_by_practitioner_and_time(
        &self,
        practitioner_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        Ok(!self
            .find_by_practitioner_and_time(practitioner_id, scheduled_at)
            .await?
            .is_empty())
    }

    /// Ordered by time.
    async fn find_by_patient_id(&self, patient_id: Uuid) -> Result<Vec<Appointment>, RepositoryError>;

    /// Ordered by time, then practitioner.
    async fn find_by_state_and_time_after(
        &self,
        state: AppointmentState,
        after: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, RepositoryError>;

    async fn find_by_time_before_and_state_in(
        &self,
        before: DateTime<Utc>,
        states: &[AppointmentState],
    ) -> Result<Vec<Appointment>, RepositoryError>;

    /// Ordered by time, then practitioner.
    async fn find_all(&self) -> Result<Vec<Appointment>, RepositoryError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;

    async fn update(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;

    async fn update_all(&self, appointments: Vec<Appointment>) -> Result<BatchUpdate, RepositoryError> {
        let mut batch = BatchUpdate::default();
        for appointment in appointments {
            let id = appointment.id;
            match self.update(appointment).await {
                Ok(saved) => batch.updated.push(saved),
                Err(RepositoryError::VersionConflict(_)) | Err(RepositoryError::NotFound(_)) => {
                    batch.stale.push(id)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(batch)
    }

    async fn delete(&self, appointment: &Appointment) -> Result<(), RepositoryError> {
        if self.delete_by_id(appointment.id).await? {
            Ok(())
        } else {
            Err(RepositoryError::NotFound(appointment.id))
        }
    }

    /// Returns whether a record was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError>;

    async fn exists_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.find_by_id(id).await?.is_some())
    }
}
