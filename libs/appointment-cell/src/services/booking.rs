// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use patient_cell::PatientDirectory;
use practitioner_cell::PractitionerDirectory;
use shared_models::auth::{Actor, Capability};
use shared_utils::clock::Clock;

use crate::models::{
    validate_motive, Appointment, AppointmentError, AppointmentPatch, AppointmentState,
    CreateAppointmentRequest, RepositoryError,
};
use crate::repository::AppointmentRepository;
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Outcome of one optimistic attempt.
enum Attempt {
    Done(Appointment),
    Retry,
}

/// Reservation, cancellation, direct scheduling and rescheduling.
///
/// Every write is conditional on the version that was read; a lost race is
/// retried from a fresh read so the decision is always made on current state.
pub struct AppointmentBookingService {
    repository: Arc<dyn AppointmentRepository>,
    practitioners: Arc<dyn PractitionerDirectory>,
    patients: Arc<dyn PatientDirectory>,
    clock: Arc<dyn Clock>,
    conflicts: Arc<ConflictDetectionService>,
    lifecycle: AppointmentLifecycleService,
    max_retry_attempts: u32,
}

impl AppointmentBookingService {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        practitioners: Arc<dyn PractitionerDirectory>,
        patients: Arc<dyn PatientDirectory>,
        clock: Arc<dyn Clock>,
        conflicts: Arc<ConflictDetectionService>,
    ) -> Self {
        Self {
            repository,
            practitioners,
            patients,
            clock,
            conflicts,
            lifecycle: AppointmentLifecycleService::new(),
            max_retry_attempts: 3,
        }
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.repository
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::AppointmentNotFound)
    }

    async fn try_update(&self, appointment: Appointment) -> Result<Attempt, AppointmentError> {
        match self.repository.update(appointment).await {
            Ok(saved) => Ok(Attempt::Done(saved)),
            Err(RepositoryError::VersionConflict(id)) => {
                warn!("Appointment {} changed underneath us, re-reading", id);
                Ok(Attempt::Retry)
            }
            Err(RepositoryError::NotFound(_)) => Err(AppointmentError::AppointmentNotFound),
            Err(RepositoryError::SlotTaken) => Err(AppointmentError::SlotOccupied),
            Err(e) => Err(e.into()),
        }
    }

    /// Claim an AVAILABLE slot for a patient.
    #[instrument(skip(self, motive))]
    pub async fn reserve(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        motive: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        validate_motive(motive.as_deref())?;

        for attempt in 1..=self.max_retry_attempts {
            debug!("Reservation attempt {} for appointment {}", attempt, appointment_id);

            let mut appointment = self.load(appointment_id).await?;
            if appointment.state != AppointmentState::Available {
                warn!("Appointment {} is {} and cannot be reserved", appointment_id, appointment.state);
                return Err(AppointmentError::NotAvailable);
            }
            let now = self.clock.now();
            if appointment.scheduled_at < now {
                return Err(AppointmentError::PastDate(appointment.scheduled_at));
            }
            self.lifecycle
                .validate_transition(appointment.state, AppointmentState::Confirmed)?;

            appointment.patient_id = Some(patient_id);
            appointment.motive = motive.clone();
            appointment.state = AppointmentState::Confirmed;

            if let Attempt::Done(saved) = self.try_update(appointment).await? {
                info!("Appointment {} reserved by patient {}", appointment_id, patient_id);
                return Ok(saved);
            }
        }

        warn!("Gave up reserving appointment {} after {} attempts", appointment_id, self.max_retry_attempts);
        Err(AppointmentError::NotAvailable)
    }

    /// Release a CONFIRMED appointment back to AVAILABLE.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn cancel(&self, appointment_id: Uuid, actor: &Actor) -> Result<Appointment, AppointmentError> {
        for attempt in 1..=self.max_retry_attempts {
            debug!("Cancellation attempt {} for appointment {}", attempt, appointment_id);

            let mut appointment = self.load(appointment_id).await?;
            if appointment.state != AppointmentState::Confirmed {
                return Err(AppointmentError::NotCancellable);
            }
            if !appointment.is_owned_by(actor.id) && !actor.can(Capability::CancelAnyAppointment) {
                warn!("Actor {} may not cancel appointment {}", actor.id, appointment_id);
                return Err(AppointmentError::AccessDenied);
            }
            self.lifecycle
                .validate_transition(appointment.state, AppointmentState::Available)?;

            appointment.patient_id = None;
            appointment.motive = None;
            appointment.state = AppointmentState::Available;

            if let Attempt::Done(saved) = self.try_update(appointment).await? {
                info!("Appointment {} cancelled by {}", appointment_id, actor.id);
                return Ok(saved);
            }
        }

        Err(AppointmentError::ConcurrentModification)
    }

    /// Book a patient directly into a slot, without a generated AVAILABLE record.
    #[instrument(skip(self, request), fields(patient = %request.patient_id, practitioner = %request.practitioner_id))]
    pub async fn create(&self, request: CreateAppointmentRequest) -> Result<Appointment, AppointmentError> {
        validate_motive(request.motive.as_deref())?;

        if self.patients.find_by_id(request.patient_id).await?.is_none() {
            return Err(AppointmentError::PatientNotFound);
        }
        if !self.practitioners.exists_by_id(request.practitioner_id).await? {
            return Err(AppointmentError::PractitionerNotFound);
        }
        if request.scheduled_at < self.clock.now() {
            return Err(AppointmentError::PastDate(request.scheduled_at));
        }
        if self
            .conflicts
            .has_conflict(request.practitioner_id, request.scheduled_at, None)
            .await?
        {
            return Err(AppointmentError::SlotOccupied);
        }

        let appointment = Appointment::confirmed(
            request.patient_id,
            request.practitioner_id,
            request.scheduled_at,
            request.motive,
        );

        match self.repository.insert(appointment).await {
            Ok(saved) => {
                info!("Appointment {} created for patient {}", saved.id, request.patient_id);
                Ok(saved)
            }
            Err(RepositoryError::SlotTaken) => Err(AppointmentError::SlotOccupied),
            Err(e) => Err(e.into()),
        }
    }

    /// Move an appointment and/or change its motive. The state is left untouched.
    #[instrument(skip(self, patch))]
    pub async fn patch(
        &self,
        appointment_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, AppointmentError> {
        validate_motive(patch.motive.as_deref())?;

        for attempt in 1..=self.max_retry_attempts {
            debug!("Patch attempt {} for appointment {}", attempt, appointment_id);

            let mut appointment = self.load(appointment_id).await?;
            if patch.is_empty() {
                return Ok(appointment);
            }

            if patch.moves_slot() {
                if appointment.state.is_terminal() {
                    return Err(AppointmentError::TerminalState(appointment.state));
                }

                let practitioner_id = patch.practitioner_id.unwrap_or(appointment.practitioner_id);
                let scheduled_at = patch.scheduled_at.unwrap_or(appointment.scheduled_at);

                if practitioner_id != appointment.practitioner_id
                    && !self.practitioners.exists_by_id(practitioner_id).await?
                {
                    return Err(AppointmentError::PractitionerNotFound);
                }
                if scheduled_at < self.clock.now() {
                    return Err(AppointmentError::PastDate(scheduled_at));
                }
                if self
                    .conflicts
                    .has_conflict(practitioner_id, scheduled_at, Some(appointment.id))
                    .await?
                {
                    return Err(AppointmentError::SlotOccupied);
                }

                appointment.practitioner_id = practitioner_id;
                appointment.scheduled_at = scheduled_at;
            }

            if let Some(motive) = &patch.motive {
                appointment.motive = Some(motive.clone());
            }

            if let Attempt::Done(saved) = self.try_update(appointment).await? {
                info!("Appointment {} updated", appointment_id);
                return Ok(saved);
            }
        }

        Err(AppointmentError::ConcurrentModification)
    }
}
