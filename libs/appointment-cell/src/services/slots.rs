// libs/appointment-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, Days, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};
use tracing::{debug, info, instrument, warn};

use practitioner_cell::PractitionerDirectory;
use shared_utils::clock::Clock;

use crate::models::{
    Appointment, AppointmentError, GenerationReport, RepositoryError, SlotGrid, MAX_HORIZON_DAYS,
};
use crate::repository::AppointmentRepository;

impl SlotGrid {
    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Every slot start in the horizon that begins after `now`'s local day
    /// (or on it, when `include_today` is set), in chronological order.
    /// Past entries are not filtered here. The horizon is clamped to
    /// `MAX_HORIZON_DAYS` even on an unvalidated grid.
    pub fn slots_from(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let offset = self.offset();
        let today = now.with_timezone(&offset).date_naive();
        let first_day = if self.include_today { 0 } else { 1 };
        let horizon = self.horizon_days.min(MAX_HORIZON_DAYS);
        let mut slots = Vec::with_capacity(horizon.saturating_mul(self.slots_per_day()) as usize);

        for day in first_day..first_day + u64::from(horizon) {
            let Some(date) = today.checked_add_days(Days::new(day)) else {
                continue;
            };
            let midnight = date.and_time(NaiveTime::MIN);

            let mut minute = self.day_start_hour * 60;
            while minute < self.day_end_hour * 60 {
                let local = midnight + Duration::minutes(i64::from(minute));
                if let Some(start) = offset.from_local_datetime(&local).single() {
                    slots.push(start.with_timezone(&Utc));
                }
                minute += self.slot_minutes;
            }
        }

        slots
    }
}

/// Fills every practitioner's calendar with AVAILABLE slots over the horizon.
pub struct SlotGenerationService {
    repository: Arc<dyn AppointmentRepository>,
    practitioners: Arc<dyn PractitionerDirectory>,
    clock: Arc<dyn Clock>,
    grid: SlotGrid,
}

impl SlotGenerationService {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        practitioners: Arc<dyn PractitionerDirectory>,
        clock: Arc<dyn Clock>,
        grid: SlotGrid,
    ) -> Self {
        Self {
            repository,
            practitioners,
            clock,
            grid,
        }
    }

    /// Never overwrites an existing record, so repeated runs converge.
    #[instrument(skip(self))]
    pub async fn generate_availability(&self) -> Result<GenerationReport, AppointmentError> {
        let now = self.clock.now();
        let practitioners = self.practitioners.list_all().await?;
        let slots = self.grid.slots_from(now);

        let mut report = GenerationReport {
            practitioners: practitioners.len(),
            ..GenerationReport::default()
        };

        for practitioner in &practitioners {
            debug!("Generating {} candidate slots for practitioner {}", slots.len(), practitioner.id);

            for &scheduled_at in &slots {
                if scheduled_at <= now {
                    report.skipped_past += 1;
                    continue;
                }
                if self
                    .repository
                    .exists_by_practitioner_and_time(practitioner.id, scheduled_at)
                    .await?
                {
                    report.skipped_existing += 1;
                    continue;
                }

                match self
                    .repository
                    .insert(Appointment::available(practitioner.id, scheduled_at))
                    .await
                {
                    Ok(_) => report.created += 1,
                    Err(RepositoryError::SlotTaken) => {
                        warn!(
                            "Slot {} for practitioner {} was filled concurrently",
                            scheduled_at, practitioner.id
                        );
                        report.skipped_existing += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        info!(
            "Slot generation finished: {} created, {} already present, {} in the past across {} practitioners",
            report.created, report.skipped_existing, report.skipped_past, report.practitioners
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 4, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn default_grid_starts_tomorrow_with_fourteen_slots_a_day() {
        let slots = SlotGrid::default().slots_from(noon(1));

        assert_eq!(slots.len(), 98);
        assert_eq!(slots[0], Utc.with_ymd_and_hms(2030, 4, 2, 8, 0, 0).unwrap());
        assert_eq!(slots[13], Utc.with_ymd_and_hms(2030, 4, 2, 14, 30, 0).unwrap());
        assert_eq!(slots[97], Utc.with_ymd_and_hms(2030, 4, 8, 14, 30, 0).unwrap());
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn include_today_shifts_the_window() {
        let grid = SlotGrid { include_today: true, horizon_days: 1, ..SlotGrid::default() };
        let slots = grid.slots_from(noon(1));
        assert_eq!(slots.len(), 14);
        assert_eq!(slots[0], Utc.with_ymd_and_hms(2030, 4, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn oversized_horizon_is_clamped_instead_of_overflowing() {
        let grid = SlotGrid { horizon_days: 400_000_000, ..SlotGrid::default() };
        let slots = grid.slots_from(noon(1));
        assert_eq!(slots.len(), (MAX_HORIZON_DAYS * grid.slots_per_day()) as usize);
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn clinic_offset_applies_to_working_hours() {
        let grid = SlotGrid { utc_offset_minutes: 120, horizon_days: 1, ..SlotGrid::default() };
        let slots = grid.slots_from(noon(1));
        assert_eq!(slots[0].hour(), 6);
        assert_eq!(slots[0].day(), 2);
    }
}
