//! Courier API server binary entrypoint.
//!
//! Runs the HTTP intake API and the notification worker in one process; they
//! share the in-memory store and the queue connection.

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use courier_common::config::AppConfig;
use courier_notifier::{
    Dispatcher, NotificationService, NotificationStore, NotificationWorker, QueueClient,
    SenderRegistry,
};

use courier_api::routes::create_router;
use courier_api::server::bind_available;
use courier_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Courier API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to the queue; without it there is nothing to serve
    let queue = match QueueClient::connect(&config).await {
        Ok(queue) => queue,
        Err(e) => {
            tracing::error!(error = %e, "Queue unavailable, not starting");
            return Err(e.into());
        }
    };
    tracing::info!(backend = ?config.queue_backend, "Queue connection established");

    let store = NotificationStore::new();

    // Start the consumption loop
    let dispatcher = Dispatcher::from_config(
        store.clone(),
        queue.clone(),
        SenderRegistry::with_defaults(),
        &config,
    );
    let worker = NotificationWorker::new(queue.clone(), dispatcher, config.worker_concurrency);
    let mut worker_task = tokio::spawn(worker.run());

    // Bind the first free port from API_PORT upwards
    let listener = match bind_available(
        &config.api_host,
        config.api_port,
        config.api_port_search_limit,
    )
    .await
    {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(
                error = %e,
                port = config.api_port,
                limit = config.api_port_search_limit,
                "No free port for the API server"
            );
            return Err(e.into());
        }
    };
    let local_addr = listener.local_addr()?;

    // Build router
    let state = AppState::new(NotificationService::new(store, queue), config);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(port = local_addr.port(), "API server listening on {}", local_addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server exited with error");
                return Err(e.into());
            }
        }
        result = &mut worker_task => {
            match result {
                Ok(Ok(())) => tracing::warn!("Notification worker stopped"),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Notification worker exited with error");
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Notification worker panicked");
                    return Err(e.into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Courier API server stopped.");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("courier_api=debug,courier_notifier=debug,tower_http=debug")
    });

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
