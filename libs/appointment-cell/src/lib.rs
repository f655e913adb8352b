pub mod engine;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use engine::AppointmentEngine;
pub use handlers::AppointmentContext;
pub use models::*;
pub use repository::{AppointmentRepository, InMemoryAppointmentRepository, SupabaseAppointmentRepository};
pub use router::appointment_routes;
