pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod scheduler;
pub mod slots;
pub mod sweeper;

pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use scheduler::{MaintenanceScheduler, PeriodicTask, TaskOutcome};
pub use slots::SlotGenerationService;
pub use sweeper::ExpirySweepService;
