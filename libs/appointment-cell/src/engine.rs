// libs/appointment-cell/src/engine.rs
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use patient_cell::PatientDirectory;
use practitioner_cell::{Practitioner, PractitionerDirectory};
use shared_models::auth::Actor;
use shared_utils::clock::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentPatch, AppointmentResponse, AppointmentState,
    CreateAppointmentRequest, GenerationReport, SlotGrid, SweepReport,
};
use crate::repository::AppointmentRepository;
use crate::services::booking::AppointmentBookingService;
use crate::services::conflict::ConflictDetectionService;
use crate::services::slots::SlotGenerationService;
use crate::services::sweeper::ExpirySweepService;

/// Entry point for every appointment operation.
pub struct AppointmentEngine {
    repository: Arc<dyn AppointmentRepository>,
    practitioners: Arc<dyn PractitionerDirectory>,
    patients: Arc<dyn PatientDirectory>,
    clock: Arc<dyn Clock>,
    booking: AppointmentBookingService,
    slots: SlotGenerationService,
    sweeper: ExpirySweepService,
}

impl AppointmentEngine {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        practitioners: Arc<dyn PractitionerDirectory>,
        patients: Arc<dyn PatientDirectory>,
        clock: Arc<dyn Clock>,
        grid: SlotGrid,
    ) -> Result<Self, AppointmentError> {
        let grid = grid.validated()?;
        let conflicts = Arc::new(ConflictDetectionService::new(repository.clone()));

        Ok(Self {
            booking: AppointmentBookingService::new(
                repository.clone(),
                practitioners.clone(),
                patients.clone(),
                clock.clone(),
                conflicts,
            ),
            slots: SlotGenerationService::new(
                repository.clone(),
                practitioners.clone(),
                clock.clone(),
                grid,
            ),
            sweeper: ExpirySweepService::new(repository.clone(), clock.clone()),
            repository,
            practitioners,
            patients,
            clock,
        })
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    /// Future AVAILABLE slots, by time then practitioner.
    pub async fn list_available(&self) -> Result<Vec<AppointmentResponse>, AppointmentError> {
        let appointments = self
            .repository
            .find_by_state_and_time_after(AppointmentState::Available, self.clock.now())
            .await?;
        debug!("Found {} available appointments", appointments.len());
        self.represent_all(appointments).await
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<AppointmentResponse>, AppointmentError> {
        let appointments = self.repository.find_by_patient_id(patient_id).await?;
        self.represent_all(appointments).await
    }

    pub async fn list_all(&self) -> Result<Vec<AppointmentResponse>, AppointmentError> {
        let appointments = self.repository.find_all().await?;
        self.represent_all(appointments).await
    }

    pub async fn find(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.repository
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::AppointmentNotFound)
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<AppointmentResponse, AppointmentError> {
        let appointment = self.find(appointment_id).await?;
        self.represent(&appointment).await
    }

    // ==========================================================================
    // COMMANDS
    // ==========================================================================

    pub async fn reserve(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        motive: Option<String>,
    ) -> Result<(), AppointmentError> {
        self.booking.reserve(appointment_id, patient_id, motive).await.map(|_| ())
    }

    pub async fn cancel(&self, appointment_id: Uuid, actor: &Actor) -> Result<(), AppointmentError> {
        self.booking.cancel(appointment_id, actor).await.map(|_| ())
    }

    pub async fn create(&self, request: CreateAppointmentRequest) -> Result<AppointmentResponse, AppointmentError> {
        let created = self.booking.create(request).await?;
        self.represent(&created).await
    }

    pub async fn patch(
        &self,
        appointment_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<AppointmentResponse, AppointmentError> {
        let updated = self.booking.patch(appointment_id, patch).await?;
        self.represent(&updated).await
    }

    /// Unconditional removal, whatever the state.
    #[instrument(skip(self))]
    pub async fn delete(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        if !self.repository.delete_by_id(appointment_id).await? {
            return Err(AppointmentError::AppointmentNotFound);
        }
        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    pub async fn generate_availability(&self) -> Result<GenerationReport, AppointmentError> {
        self.slots.generate_availability().await
    }

    pub async fn sweep_expired(&self) -> Result<SweepReport, AppointmentError> {
        self.sweeper.sweep_expired().await
    }

    // ==========================================================================
    // REPRESENTATION
    // ==========================================================================

    async fn practitioner(&self, id: Uuid) -> Option<Practitioner> {
        match self.practitioners.find_by_id(id).await {
            Ok(Some(practitioner)) => Some(practitioner),
            Ok(None) => {
                warn!("Practitioner {} referenced by an appointment is unknown", id);
                None
            }
            Err(e) => {
                warn!("Could not resolve practitioner {}: {}", id, e);
                None
            }
        }
    }

    async fn patient_name(&self, id: Uuid) -> Option<String> {
        match self.patients.find_by_id(id).await {
            Ok(Some(patient)) => Some(patient.name),
            Ok(None) => {
                warn!("Patient {} referenced by an appointment is unknown", id);
                None
            }
            Err(e) => {
                warn!("Could not resolve patient {}: {}", id, e);
                None
            }
        }
    }

    fn fill(
        response: &mut AppointmentResponse,
        practitioner: Option<&Practitioner>,
        patient_name: Option<String>,
    ) {
        if let Some(practitioner) = practitioner {
            response.practitioner_name = Some(practitioner.name.clone());
            response.specialty = Some(practitioner.specialty.clone());
        }
        response.patient_name = patient_name;
    }

    pub async fn represent(&self, appointment: &Appointment) -> Result<AppointmentResponse, AppointmentError> {
        let mut response = AppointmentResponse::bare(appointment);
        let practitioner = self.practitioner(appointment.practitioner_id).await;
        let patient_name = match appointment.patient_id {
            Some(id) => self.patient_name(id).await,
            None => None,
        };
        Self::fill(&mut response, practitioner.as_ref(), patient_name);
        Ok(response)
    }

    async fn represent_all(
        &self,
        appointments: Vec<Appointment>,
    ) -> Result<Vec<AppointmentResponse>, AppointmentError> {
        let mut practitioners: HashMap<Uuid, Option<Practitioner>> = HashMap::new();
        let mut patients: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut responses = Vec::with_capacity(appointments.len());

        for appointment in &appointments {
            if !practitioners.contains_key(&appointment.practitioner_id) {
                let resolved = self.practitioner(appointment.practitioner_id).await;
                practitioners.insert(appointment.practitioner_id, resolved);
            }
            let patient_name = match appointment.patient_id {
                Some(id) => {
                    if !patients.contains_key(&id) {
                        let resolved = self.patient_name(id).await;
                        patients.insert(id, resolved);
                    }
                    patients.get(&id).cloned().flatten()
                }
                None => None,
            };

            let mut response = AppointmentResponse::bare(appointment);
            let practitioner = practitioners.get(&appointment.practitioner_id).and_then(Option::as_ref);
            Self::fill(&mut response, practitioner, patient_name);
            responses.push(response);
        }

        Ok(responses)
    }
}
