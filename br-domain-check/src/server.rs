//! HTTP server initialization and runtime setup.

use crate::routes::app_router;
use crate::state::AppState;
use br_domain_check_lib::{Exporter, Settings, VerificationService};
use std::error::Error;
use std::net::SocketAddr;
use tracing::info;

/// Run the HTTP service until Ctrl-C.
///
/// Starts the retention sweeper, binds `settings.server.listen` and serves
/// the API with graceful shutdown.
pub async fn run(settings: Settings) -> Result<(), Box<dyn Error>> {
    let mut exporter = Exporter::new().with_format(settings.server.export_format);
    if let Some(dir) = &settings.server.output_dir {
        info!(dir = %dir.display(), "exports are also written to disk");
        exporter = exporter.with_output_dir(dir);
    }

    let service = VerificationService::from_config(&settings.verifier, exporter)?;
    let sweeper = service.spawn_eviction(settings.server.retention, settings.server.sweep_interval);
    info!(
        retention = ?settings.server.retention,
        every = ?settings.server.sweep_interval,
        "job retention sweeper started"
    );

    let state = AppState::new(service, settings.server.progress_interval);
    let app = app_router(state);

    let addr: SocketAddr = settings
        .server
        .listen
        .parse()
        .map_err(|e| format!("Invalid listen address '{}': {}", settings.server.listen, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        batch_size = settings.verifier.batch_size,
        method = %settings.verifier.method,
        "Listening on http://{addr}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
