#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentEngine, AppointmentRepository, InMemoryAppointmentRepository, SlotGrid,
};
use patient_cell::{InMemoryPatientDirectory, Patient};
use practitioner_cell::{InMemoryPractitionerDirectory, Practitioner};
use shared_utils::clock::ManualClock;

/// Monday 2030-04-01, mid-morning UTC.
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 4, 1, 10, 15, 0).unwrap()
}

pub struct Harness {
    pub engine: Arc<AppointmentEngine>,
    pub repository: Arc<InMemoryAppointmentRepository>,
    pub practitioners: Arc<InMemoryPractitionerDirectory>,
    pub patients: Arc<InMemoryPatientDirectory>,
    pub clock: ManualClock,
    pub practitioner: Practitioner,
    pub patient: Patient,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_grid(SlotGrid::default())
    }

    pub fn with_grid(grid: SlotGrid) -> Self {
        let practitioner = Practitioner::new("Ana Ruiz", "Cardiology");
        let patient = Patient::new("Marta Soler");

        let repository = Arc::new(InMemoryAppointmentRepository::new());
        let practitioners = Arc::new(InMemoryPractitionerDirectory::new([practitioner.clone()]));
        let patients = Arc::new(InMemoryPatientDirectory::new([patient.clone()]));
        let clock = ManualClock::new(start_instant());

        let engine = AppointmentEngine::new(
            repository.clone(),
            practitioners.clone(),
            patients.clone(),
            Arc::new(clock.clone()),
            grid,
        )
        .expect("valid grid");

        Self {
            engine: Arc::new(engine),
            repository,
            practitioners,
            patients,
            clock,
            practitioner,
            patient,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use shared_utils::clock::Clock;
        self.clock.now()
    }

    /// An AVAILABLE slot `hours` from now for the harness practitioner.
    pub async fn open_slot(&self, hours: i64) -> Appointment {
        self.repository
            .insert(Appointment::available(self.practitioner.id, self.now() + Duration::hours(hours)))
            .await
            .expect("slot inserted")
    }

    pub async fn stored(&self, id: Uuid) -> Appointment {
        self.repository
            .find_by_id(id)
            .await
            .expect("repository read")
            .expect("appointment exists")
    }
}
