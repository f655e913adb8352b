use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DirectoryError, SupabaseClient};

use crate::models::Patient;

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DirectoryError>;
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<Uuid, Patient>>,
}

impl InMemoryPatientDirectory {
    pub fn new(patients: impl IntoIterator<Item = Patient>) -> Self {
        Self {
            patients: RwLock::new(patients.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub async fn upsert(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DirectoryError> {
        Ok(self.patients.read().await.get(&id).cloned())
    }
}

/// Reads the `patients` table through PostgREST.
pub struct SupabasePatientDirectory {
    supabase: SupabaseClient,
    service_key: String,
}

impl SupabasePatientDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DirectoryError> {
        debug!("Fetching patient: {}", id);

        let path = format!("/rest/v1/patients?id=eq.{}&select=id,name,role", id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row).map(Some).map_err(|e| {
                warn!("Failed to parse patient row: {}", e);
                DirectoryError::Malformed(e.to_string())
            }),
            None => Ok(None),
        }
    }
}
