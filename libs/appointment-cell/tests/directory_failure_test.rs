use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use mockall::mock;
use mockall::predicate::eq;
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentEngine, AppointmentError, AppointmentRepository, CreateAppointmentRequest,
    ErrorKind, InMemoryAppointmentRepository, SlotGrid,
};
use patient_cell::{Patient, PatientDirectory};
use practitioner_cell::{Practitioner, PractitionerDirectory};
use shared_database::DirectoryError;
use shared_utils::clock::ManualClock;

mock! {
    pub Practitioners {}

    #[async_trait]
    impl PractitionerDirectory for Practitioners {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Practitioner>, DirectoryError>;
        async fn exists_by_id(&self, id: Uuid) -> Result<bool, DirectoryError>;
        async fn list_all(&self) -> Result<Vec<Practitioner>, DirectoryError>;
    }
}

mock! {
    pub Patients {}

    #[async_trait]
    impl PatientDirectory for Patients {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, DirectoryError>;
    }
}

fn engine(
    practitioners: MockPractitioners,
    patients: MockPatients,
) -> (AppointmentEngine, Arc<InMemoryAppointmentRepository>) {
    let repository = Arc::new(InMemoryAppointmentRepository::new());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2030, 9, 2, 9, 0, 0).unwrap());
    let engine = AppointmentEngine::new(
        repository.clone(),
        Arc::new(practitioners),
        Arc::new(patients),
        Arc::new(clock),
        SlotGrid::default(),
    )
    .unwrap();
    (engine, repository)
}

#[tokio::test]
async fn generation_fails_cleanly_when_directory_is_down() {
    let mut practitioners = MockPractitioners::new();
    practitioners
        .expect_list_all()
        .times(1)
        .returning(|| Err(DirectoryError::Malformed("boom".into())));

    let (engine, repository) = engine(practitioners, MockPatients::new());

    let err = engine.generate_availability().await.unwrap_err();
    assert_matches!(err, AppointmentError::Directory(_));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(repository.is_empty().await);
}

#[tokio::test]
async fn reads_survive_directory_failures() {
    let mut practitioners = MockPractitioners::new();
    practitioners
        .expect_find_by_id()
        .returning(|_| Err(DirectoryError::Malformed("timeout".into())));
    let mut patients = MockPatients::new();
    patients
        .expect_find_by_id()
        .returning(|_| Err(DirectoryError::Malformed("timeout".into())));

    let (engine, repository) = engine(practitioners, patients);
    let at = Utc.with_ymd_and_hms(2030, 9, 3, 9, 0, 0).unwrap();
    let stored = repository
        .insert(Appointment::confirmed(Uuid::new_v4(), Uuid::new_v4(), at, None))
        .await
        .unwrap();

    let view = engine.get(stored.id).await.unwrap();
    assert_eq!(view.id, stored.id);
    assert!(view.practitioner_name.is_none());
    assert!(view.patient_name.is_none());
}

#[tokio::test]
async fn list_resolves_each_practitioner_once() {
    let practitioner = Practitioner::new("Ana Ruiz", "Cardiology");
    let mut practitioners = MockPractitioners::new();
    let found = practitioner.clone();
    practitioners
        .expect_find_by_id()
        .with(eq(practitioner.id))
        .times(1)
        .returning(move |_| Ok(Some(found.clone())));

    let (engine, repository) = engine(practitioners, MockPatients::new());
    let base = Utc.with_ymd_and_hms(2030, 9, 3, 8, 0, 0).unwrap();
    for step in 0..4 {
        repository
            .insert(Appointment::available(practitioner.id, base + Duration::minutes(30 * step)))
            .await
            .unwrap();
    }

    let available = engine.list_available().await.unwrap();
    assert_eq!(available.len(), 4);
    assert!(available.iter().all(|a| a.practitioner_name.as_deref() == Some("Ana Ruiz")));
}

#[tokio::test]
async fn create_checks_patient_before_practitioner() {
    let mut patients = MockPatients::new();
    patients.expect_find_by_id().times(1).returning(|_| Ok(None));
    let mut practitioners = MockPractitioners::new();
    practitioners.expect_exists_by_id().never();

    let (engine, _) = engine(practitioners, patients);
    let request = CreateAppointmentRequest {
        patient_id: Uuid::new_v4(),
        practitioner_id: Uuid::new_v4(),
        scheduled_at: Utc.with_ymd_and_hms(2030, 9, 4, 9, 0, 0).unwrap(),
        motive: None,
    };

    assert_matches!(engine.create(request).await, Err(AppointmentError::PatientNotFound));
}
