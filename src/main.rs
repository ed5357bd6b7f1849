use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use social_realtime::config::Settings;
use social_realtime::hub::RealtimeHub;
use social_realtime::server::{create_app, AppState};
use social_realtime::tasks::HeartbeatTask;
use social_realtime::telemetry::init_tracing;
use social_realtime::triggers::RedisSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    init_tracing(&settings.log);
    tracing::info!("Configuration loaded");

    // The one hub instance for this process
    let hub = Arc::new(RealtimeHub::new(&settings.presence));
    let state = AppState::with_hub(settings.clone(), hub.clone());
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start Redis subscriber in background
    let redis_subscriber = RedisSubscriber::new(
        settings.redis.clone(),
        hub.router().clone(),
        shutdown_tx.clone(),
    );
    let redis_handle = tokio::spawn(async move {
        redis_subscriber.start().await;
    });

    // Start heartbeat task in background
    let heartbeat_task = HeartbeatTask::new(
        settings.websocket.clone(),
        hub.connections().clone(),
        shutdown_tx.subscribe(),
    );
    let heartbeat_handle = tokio::spawn(heartbeat_task.run());

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(redis_handle, heartbeat_handle);

    hub.shutdown();

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop background tasks
    let _ = shutdown_tx.send(());
}
