// libs/appointment-cell/src/repository/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentState, RepositoryError};
use crate::repository::{slot_conflict, AppointmentRepository, BatchUpdate};

/// Process-local store. Every write takes the map's write lock, so the slot
/// check, the version check and the write happen as one step.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }

    fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
        appointments.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then(a.practitioner_id.cmp(&b.practitioner_id))
        });
        appointments
    }

    fn apply_update(
        store: &mut HashMap<Uuid, Appointment>,
        mut appointment: Appointment,
    ) -> Result<Appointment, RepositoryError> {
        let stored_version = store
            .get(&appointment.id)
            .map(|stored| stored.version)
            .ok_or(RepositoryError::NotFound(appointment.id))?;

        if stored_version != appointment.version {
            return Err(RepositoryError::VersionConflict(appointment.id));
        }
        if store.values().any(|existing| slot_conflict(&appointment, existing)) {
            return Err(RepositoryError::SlotTaken);
        }

        appointment.version += 1;
        store.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_by_practitioner_and_time(
        &self,
        practitioner_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.practitioner_id == practitioner_id && a.scheduled_at == scheduled_at)
            .cloned()
            .collect())
    }

    async fn find_by_patient_id(&self, patient_id: Uuid) -> Result<Vec<Appointment>, RepositoryError> {
        let matching = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.is_owned_by(patient_id))
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }

    async fn find_by_state_and_time_after(
        &self,
        state: AppointmentState,
        after: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let matching = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.state == state && a.scheduled_at > after)
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }

    async fn find_by_time_before_and_state_in(
        &self,
        before: DateTime<Utc>,
        states: &[AppointmentState],
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let matching = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.scheduled_at < before && states.contains(&a.state))
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }

    async fn find_all(&self) -> Result<Vec<Appointment>, RepositoryError> {
        let all = self.appointments.read().await.values().cloned().collect();
        Ok(Self::sorted(all))
    }

    async fn insert(&self, mut appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let mut store = self.appointments.write().await;

        if store.contains_key(&appointment.id)
            || store.values().any(|existing| slot_conflict(&appointment, existing))
        {
            debug!(
                "Slot {} for practitioner {} already taken",
                appointment.scheduled_at, appointment.practitioner_id
            );
            return Err(RepositoryError::SlotTaken);
        }

        appointment.version = 0;
        store.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let mut store = self.appointments.write().await;
        Self::apply_update(&mut store, appointment)
    }

    async fn update_all(&self, appointments: Vec<Appointment>) -> Result<BatchUpdate, RepositoryError> {
        let mut store = self.appointments.write().await;
        let mut batch = BatchUpdate::default();

        for appointment in appointments {
            let id = appointment.id;
            match Self::apply_update(&mut store, appointment) {
                Ok(saved) => batch.updated.push(saved),
                Err(RepositoryError::VersionConflict(_)) | Err(RepositoryError::NotFound(_)) => {
                    batch.stale.push(id)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(batch)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.appointments.write().await.remove(&id).is_some())
    }

    async fn exists_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.appointments.read().await.contains_key(&id))
    }
}
