use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use patient_cell::Patient;
use practitioner_cell::Practitioner;

/// Directory contents for the in-memory backend, read from `DIRECTORY_SEED_PATH`.
#[derive(Debug, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub practitioners: Vec<Practitioner>,
    #[serde(default)]
    pub patients: Vec<Patient>,
}

impl DirectorySeed {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading directory seed {}", path.display()))?;
        let seed: DirectorySeed = serde_json::from_str(&raw)
            .with_context(|| format!("parsing directory seed {}", path.display()))?;

        info!(
            "Loaded {} practitioners and {} patients from {}",
            seed.practitioners.len(),
            seed.patients.len(),
            path.display()
        );
        Ok(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    #[test]
    fn loads_both_directories() {
        let practitioner = Uuid::new_v4();
        let patient = Uuid::new_v4();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "practitioners": [{{ "id": "{}", "name": "Ana Ruiz", "specialty": "Cardiology" }}],
                "patients": [{{ "id": "{}", "name": "Marta Soler" }}]
            }}"#,
            practitioner, patient
        )
        .unwrap();

        let seed = DirectorySeed::load(file.path()).unwrap();
        assert_eq!(seed.practitioners[0].id, practitioner);
        assert_eq!(seed.patients[0].id, patient);
        assert_eq!(seed.patients[0].role, "patient");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();

        let seed = DirectorySeed::load(file.path()).unwrap();
        assert!(seed.practitioners.is_empty());
        assert!(seed.patients.is_empty());
    }

    #[test]
    fn malformed_seed_names_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[not json").unwrap();

        let err = DirectorySeed::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing directory seed"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(DirectorySeed::load("/nonexistent/seed.json").is_err());
    }
}
