use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// What an authenticated caller is allowed to do beyond acting on its own records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Claim available slots for oneself.
    BookAppointments,
    /// Release any confirmed appointment, not only one's own.
    CancelAnyAppointment,
    /// Create, reschedule, delete appointments and trigger maintenance.
    ManageAppointments,
    /// Read every appointment in the system.
    ViewAllAppointments,
}

impl Capability {
    /// Capabilities granted by an identity-provider role name.
    pub fn for_role(role: &str) -> BTreeSet<Capability> {
        match role.trim().to_ascii_lowercase().as_str() {
            "patient" | "paciente" => [Capability::BookAppointments].into_iter().collect(),
            "doctor" | "practitioner" | "medico" => [
                Capability::CancelAnyAppointment,
                Capability::ManageAppointments,
                Capability::ViewAllAppointments,
            ]
            .into_iter()
            .collect(),
            "admin" => [
                Capability::CancelAnyAppointment,
                Capability::ManageAppointments,
                Capability::ViewAllAppointments,
            ]
            .into_iter()
            .collect(),
            _ => BTreeSet::new(),
        }
    }
}

/// The caller of an engine operation: an identity plus explicit capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub capabilities: BTreeSet<Capability>,
}

impl Actor {
    pub fn new(id: Uuid, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            id,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(id, [Capability::BookAppointments])
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl TryFrom<&User> for Actor {
    type Error = String;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| format!("Subject {} is not a valid user id", user.id))?;
        let capabilities = user
            .role
            .as_deref()
            .map(Capability::for_role)
            .unwrap_or_default();

        Ok(Self { id, capabilities })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: Option<&str>) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn patient_role_can_only_book() {
        let actor = Actor::try_from(&user_with_role(Some("patient"))).unwrap();
        assert!(actor.can(Capability::BookAppointments));
        assert!(!actor.can(Capability::CancelAnyAppointment));
        assert!(!actor.can(Capability::ManageAppointments));
    }

    #[test]
    fn staff_roles_get_elevated_capabilities() {
        for role in ["doctor", "admin", "ADMIN"] {
            let actor = Actor::try_from(&user_with_role(Some(role))).unwrap();
            assert!(actor.can(Capability::CancelAnyAppointment), "role {}", role);
            assert!(actor.can(Capability::ViewAllAppointments), "role {}", role);
            assert!(!actor.can(Capability::BookAppointments), "role {}", role);
        }
    }

    #[test]
    fn missing_or_unknown_role_has_no_capabilities() {
        assert!(Actor::try_from(&user_with_role(None)).unwrap().capabilities.is_empty());
        assert!(Actor::try_from(&user_with_role(Some("nurse"))).unwrap().capabilities.is_empty());
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let mut user = user_with_role(Some("patient"));
        user.id = "not-a-uuid".to_string();
        assert!(Actor::try_from(&user).is_err());
    }
}
