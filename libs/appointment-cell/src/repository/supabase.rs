// libs/appointment-cell/src/repository/supabase.rs
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{Appointment, AppointmentState, RepositoryError};
use crate::repository::AppointmentRepository;

const TABLE: &str = "/rest/v1/appointments";
const ORDER: &str = "order=scheduled_at.asc,practitioner_id.asc";

/// Appointments stored in a PostgREST table.
///
/// Slot exclusivity relies on a partial unique index on
/// `(practitioner_id, scheduled_at) WHERE state IN ('available','confirmed')`;
/// a violation comes back as HTTP 409 and is reported as `SlotTaken`.
/// The index ships in `migrations/0001_scheduling_schema.sql`.
pub struct SupabaseAppointmentRepository {
    supabase: SupabaseClient,
    service_key: String,
}

impl SupabaseAppointmentRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        urlencoding::encode(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true)).into_owned()
    }

    fn decode(rows: Vec<Value>) -> Result<Vec<Appointment>, RepositoryError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    warn!("Failed to parse appointment row: {}", e);
                    RepositoryError::Backend(format!("malformed appointment row: {}", e))
                })
            })
            .collect()
    }

    async fn select(&self, query: &str) -> Result<Vec<Appointment>, RepositoryError> {
        let path = format!("{}?{}", TABLE, query);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Self::decode(rows)
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError> {
        debug!("Fetching appointment: {}", id);
        Ok(self.select(&format!("id=eq.{}", id)).await?.into_iter().next())
    }

    async fn find_by_practitioner_and_time(
        &self,
        practitioner_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        self.select(&format!(
            "practitioner_id=eq.{}&scheduled_at=eq.{}",
            practitioner_id,
            Self::timestamp(scheduled_at)
        ))
        .await
    }

    async fn find_by_patient_id(&self, patient_id: Uuid) -> Result<Vec<Appointment>, RepositoryError> {
        self.select(&format!("patient_id=eq.{}&{}", patient_id, ORDER)).await
    }

    async fn find_by_state_and_time_after(
        &self,
        state: AppointmentState,
        after: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        self.select(&format!(
            "state=eq.{}&scheduled_at=gt.{}&{}",
            state,
            Self::timestamp(after),
            ORDER
        ))
        .await
    }

    async fn find_by_time_before_and_state_in(
        &self,
        before: DateTime<Utc>,
        states: &[AppointmentState],
    ) -> Result<Vec<Appointment>, RepositoryError> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let states = states.iter().map(AppointmentState::as_str).collect::<Vec<_>>().join(",");
        self.select(&format!(
            "scheduled_at=lt.{}&state=in.({})&{}",
            Self::timestamp(before),
            states,
            ORDER
        ))
        .await
    }

    async fn find_all(&self) -> Result<Vec<Appointment>, RepositoryError> {
        self.select(ORDER).await
    }

    async fn insert(&self, mut appointment: Appointment) -> Result<Appointment, RepositoryError> {
        appointment.version = 0;
        let body = serde_json::to_value(&appointment)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            TABLE,
            Some(&self.service_key),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::decode(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Backend("insert returned no row".to_string()))
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let path = format!("{}?id=eq.{}&version=eq.{}", TABLE, appointment.id, appointment.version);
        let body = json!({
            "practitioner_id": appointment.practitioner_id,
            "patient_id": appointment.patient_id,
            "scheduled_at": appointment.scheduled_at,
            "state": appointment.state,
            "motive": appointment.motive,
            "version": appointment.version + 1,
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(&self.service_key),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        match Self::decode(rows)?.into_iter().next() {
            Some(saved) => Ok(saved),
            None if self.exists_by_id(appointment.id).await? => {
                debug!("Version {} of appointment {} is stale", appointment.version, appointment.id);
                Err(RepositoryError::VersionConflict(appointment.id))
            }
            None => Err(RepositoryError::NotFound(appointment.id)),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(&self.service_key),
            None,
            Some(SupabaseClient::return_representation()),
        ).await?;

        Ok(!rows.is_empty())
    }

    async fn exists_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let path = format!("{}?id=eq.{}&select=id", TABLE, id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../../migrations/0001_scheduling_schema.sql");

    #[test]
    fn schema_keeps_occupied_slots_exclusive() {
        let normalized = SCHEMA.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(normalized.contains(
            "create unique index if not exists appointments_occupied_slot_idx \
             on appointments (practitioner_id, scheduled_at) \
             where state in ('available', 'confirmed');"
        ));
    }

    #[test]
    fn schema_has_every_column_the_adapter_writes() {
        for column in ["practitioner_id", "patient_id", "scheduled_at", "state", "motive", "version"] {
            assert!(SCHEMA.contains(column), "missing column {}", column);
        }
    }
}
