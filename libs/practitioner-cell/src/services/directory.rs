use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::DirectoryError;

use crate::models::Practitioner;

/// Read access to the practitioners known to the clinic.
#[async_trait]
pub trait PractitionerDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Practitioner>, DirectoryError>;

    async fn exists_by_id(&self, id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    /// Every practitioner, ordered by id.
    async fn list_all(&self) -> Result<Vec<Practitioner>, DirectoryError>;
}

#[derive(Default)]
pub struct InMemoryPractitionerDirectory {
    practitioners: RwLock<BTreeMap<Uuid, Practitioner>>,
}

impl InMemoryPractitionerDirectory {
    pub fn new(practitioners: impl IntoIterator<Item = Practitioner>) -> Self {
        Self {
            practitioners: RwLock::new(practitioners.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub async fn upsert(&self, practitioner: Practitioner) {
        debug!("Registering practitioner {}", practitioner.id);
        self.practitioners.write().await.insert(practitioner.id, practitioner);
    }

    pub async fn remove(&self, id: Uuid) -> Option<Practitioner> {
        self.practitioners.write().await.remove(&id)
    }
}

#[async_trait]
impl PractitionerDirectory for InMemoryPractitionerDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Practitioner>, DirectoryError> {
        Ok(self.practitioners.read().await.get(&id).cloned())
    }

    async fn exists_by_id(&self, id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.practitioners.read().await.contains_key(&id))
    }

    async fn list_all(&self) -> Result<Vec<Practitioner>, DirectoryError> {
        Ok(self.practitioners.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_in_id_order_and_tracks_removals() {
        let a = Practitioner::new("Ana Ruiz", "Cardiology");
        let b = Practitioner::new("Luis Gil", "Dermatology");
        let directory = InMemoryPractitionerDirectory::new([a.clone(), b.clone()]);

        let listed = directory.list_all().await.unwrap();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), expected);

        assert!(directory.exists_by_id(a.id).await.unwrap());
        directory.remove(a.id).await;
        assert!(!directory.exists_by_id(a.id).await.unwrap());
        assert_eq!(directory.find_by_id(b.id).await.unwrap(), Some(b));
    }
}
