use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DirectoryError, SupabaseClient};

use crate::models::Practitioner;
use crate::services::directory::PractitionerDirectory;

const COLUMNS: &str = "id,name,specialty";

/// Reads the `practitioners` table through PostgREST.
pub struct SupabasePractitionerDirectory {
    supabase: SupabaseClient,
    service_key: String,
}

impl SupabasePractitionerDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }

    fn decode(rows: Vec<Value>) -> Result<Vec<Practitioner>, DirectoryError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    warn!("Failed to parse practitioner row: {}", e);
                    DirectoryError::Malformed(e.to_string())
                })
            })
            .collect()
    }
}

#[async_trait]
impl PractitionerDirectory for SupabasePractitionerDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Practitioner>, DirectoryError> {
        debug!("Fetching practitioner: {}", id);

        let path = format!("/rest/v1/practitioners?id=eq.{}&select={}", id, COLUMNS);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Ok(Self::decode(rows)?.into_iter().next())
    }

    async fn exists_by_id(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let path = format!("/rest/v1/practitioners?id=eq.{}&select=id", id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Ok(!rows.is_empty())
    }

    async fn list_all(&self) -> Result<Vec<Practitioner>, DirectoryError> {
        let path = format!("/rest/v1/practitioners?select={}&order=id.asc", COLUMNS);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        let practitioners = Self::decode(rows)?;
        debug!("Loaded {} practitioners", practitioners.len());
        Ok(practitioners)
    }
}
