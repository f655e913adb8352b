use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;
mod seed;

use appointment_cell::services::MaintenanceScheduler;
use appointment_cell::{
    AppointmentContext, AppointmentEngine, AppointmentRepository, InMemoryAppointmentRepository,
    SlotGrid, SupabaseAppointmentRepository,
};
use patient_cell::{InMemoryPatientDirectory, PatientDirectory, SupabasePatientDirectory};
use practitioner_cell::{InMemoryPractitionerDirectory, PractitionerDirectory, SupabasePractitionerDirectory};
use shared_config::{AppConfig, StorageBackend};
use shared_utils::clock::SystemClock;

use seed::DirectorySeed;

type Adapters = (
    Arc<dyn AppointmentRepository>,
    Arc<dyn PractitionerDirectory>,
    Arc<dyn PatientDirectory>,
);

fn build_adapters(config: &AppConfig) -> anyhow::Result<Adapters> {
    match config.storage_backend {
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            Ok((
                Arc::new(SupabaseAppointmentRepository::new(config)),
                Arc::new(SupabasePractitionerDirectory::new(config)),
                Arc::new(SupabasePatientDirectory::new(config)),
            ))
        }
        StorageBackend::Memory => {
            let seed = match &config.directory_seed_path {
                Some(path) => DirectorySeed::load(path)?,
                None => {
                    warn!("DIRECTORY_SEED_PATH not set, directories start empty");
                    DirectorySeed::default()
                }
            };
            info!("Using in-memory storage");
            Ok((
                Arc::new(InMemoryAppointmentRepository::new()),
                Arc::new(InMemoryPractitionerDirectory::new(seed.practitioners)),
                Arc::new(InMemoryPatientDirectory::new(seed.patients)),
            ))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());
    let grid = SlotGrid::try_from(&config.scheduling).context("invalid slot grid configuration")?;

    let (repository, practitioners, patients) = build_adapters(&config)?;
    let engine = Arc::new(
        AppointmentEngine::new(repository, practitioners, patients, Arc::new(SystemClock), grid)
            .context("building appointment engine")?,
    );

    let scheduler = Arc::new(MaintenanceScheduler::new(engine.clone(), &config.scheduling));
    let tasks = scheduler.start();

    let state = Arc::new(AppointmentContext {
        config: config.clone(),
        engine,
        scheduler: scheduler.clone(),
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    scheduler.shutdown();
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Maintenance task ended abnormally: {}", e);
        }
    }

    Ok(())
}
