// libs/appointment-cell/src/services/sweeper.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use shared_utils::clock::Clock;

use crate::models::{AppointmentError, AppointmentState, SweepReport};
use crate::repository::AppointmentRepository;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Retires appointments whose time has passed.
pub struct ExpirySweepService {
    repository: Arc<dyn AppointmentRepository>,
    clock: Arc<dyn Clock>,
    lifecycle: AppointmentLifecycleService,
}

impl ExpirySweepService {
    pub fn new(repository: Arc<dyn AppointmentRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// CONFIRMED becomes COMPLETED and AVAILABLE becomes EXPIRED once the slot
    /// time is strictly before now. Records that changed since selection are
    /// left for the next run.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<SweepReport, AppointmentError> {
        let now = self.clock.now();
        let elapsed = self
            .repository
            .find_by_time_before_and_state_in(now, &[AppointmentState::Confirmed, AppointmentState::Available])
            .await?;

        if elapsed.is_empty() {
            debug!("No elapsed appointments before {}", now);
            return Ok(SweepReport::default());
        }

        let retiring = elapsed
            .into_iter()
            .filter_map(|mut appointment| {
                let target = self.lifecycle.expiry_target(appointment.state)?;
                appointment.state = target;
                Some(appointment)
            })
            .collect::<Vec<_>>();

        let batch = self.repository.update_all(retiring).await?;

        let mut report = SweepReport {
            stale: batch.stale.len(),
            ..SweepReport::default()
        };
        for appointment in &batch.updated {
            match appointment.state {
                AppointmentState::Completed => report.completed += 1,
                AppointmentState::Expired => report.expired += 1,
                _ => {}
            }
        }

        if report.stale > 0 {
            warn!("{} appointments changed during the sweep and were skipped", report.stale);
        }
        info!(
            "Expiry sweep finished: {} completed, {} expired, {} stale",
            report.completed, report.expired, report.stale
        );
        Ok(report)
    }
}
