use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A clinician whose calendar is filled with bookable slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
}

impl Practitioner {
    pub fn new(name: impl Into<String>, specialty: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            specialty: specialty.into(),
        }
    }
}
