//! Orchestrator server binary
//!
//! Standalone server for the book-generation Job Orchestrator: serves the
//! job HTTP API and drives the Worker Loop in the background against the
//! same database.

use std::sync::Arc;

use orchestrator::api::routes::create_router;
use orchestrator::config::Settings;
use orchestrator::controller::JobController;
use orchestrator::db::DatabaseConnection;
use orchestrator::executor::providers::{
    InMemoryObjectStore, MockImageGenerator, MockTextGenerator, MockTtsSynthesizer,
    MockVisionInspector, ProviderBundle,
};
use orchestrator::worker::WorkerLoop;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let settings = Settings::from_env();
    tracing::info!(database_url = %settings.database_url, bind_addr = %settings.bind_addr, "loaded settings");

    let db = DatabaseConnection::new(&settings.database_url).await?;
    tracing::info!("running database migrations");
    db.run_migrations().await?;
    db.health_check().await?;

    // No real provider client ships in this crate yet; text/image/vision/
    // tts/object-storage are the seam (`executor::providers`) a deployment
    // wires real vendors into.
    let providers = ProviderBundle {
        text: Box::new(MockTextGenerator::default()),
        image: Box::new(MockImageGenerator),
        vision: Box::new(MockVisionInspector::new(0)),
        tts: Box::new(MockTtsSynthesizer),
        objects: Box::new(InMemoryObjectStore::default()),
    };

    let controller = Arc::new(JobController::new(db.pool().clone(), providers, settings.clone()));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = WorkerLoop::new(controller.clone(), std::time::Duration::from_secs(2));
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    let app = create_router(db, controller);

    let addr: std::net::SocketAddr = settings.bind_addr.parse()?;
    tracing::info!("starting orchestrator server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;

    tracing::info!("orchestrator server shut down gracefully");
    Ok(())
}

/// Signal for graceful shutdown (Ctrl-C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received CTRL-C, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
