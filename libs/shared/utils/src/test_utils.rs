use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingSettings, StorageBackend};
use shared_models::auth::{Actor, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_backend: StorageBackend,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            storage_backend: StorageBackend::Memory,
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock PostgREST server.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            storage_backend: StorageBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: self.storage_backend,
            directory_seed_path: None,
            server_port: 0,
            scheduling: SchedulingSettings::default(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    /// Overrides the token subject, for exercising non-UUID identities.
    pub subject: Option<String>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "patient")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: role.to_string(),
            subject: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn subject(&self) -> String {
        self.subject.clone().unwrap_or_else(|| self.id.to_string())
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.subject(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn to_actor(&self) -> Actor {
        let user = self.to_user();
        Actor::try_from(&user).unwrap_or_else(|_| Actor::new(self.id, []))
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.subject(),
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn bearer(user: &TestUser, secret: &str) -> String {
        format!("Bearer {}", Self::create_test_token(user, secret, None))
    }
}

/// PostgREST row shapes for the tables the scheduling cells read and write.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn practitioner_row(id: Uuid, name: &str, specialty: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "specialty": specialty
        })
    }

    pub fn patient_row(id: Uuid, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "role": "patient"
        })
    }

    pub fn appointment_row(
        id: Uuid,
        practitioner_id: Uuid,
        patient_id: Option<Uuid>,
        scheduled_at: &str,
        state: &str,
        version: i64,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "practitioner_id": practitioner_id,
            "patient_id": patient_id,
            "scheduled_at": scheduled_at,
            "state": state,
            "motive": null,
            "version": version
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert_eq!(app_config.storage_backend, StorageBackend::Memory);
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.id, user.id.to_string());
        assert_eq!(user.to_actor().id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let token = JwtTestUtils::create_test_token(&TestUser::default(), "test-secret", Some(1));
        assert_eq!(token.split('.').count(), 3);
    }
}
