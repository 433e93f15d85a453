use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autopilot_api::config::ServerConfig;
use autopilot_api::router::build_app_router;
use autopilot_api::state::AppState;
use autopilot_events::{EventBus, EventLogger};
use autopilot_pipeline::completion::HttpCompletionClient;
use autopilot_pipeline::config::RankSourceConfig;
use autopilot_pipeline::monitor::RevertMonitor;
use autopilot_pipeline::postgres::PgStore;
use autopilot_pipeline::ranks::HttpRankFetcher;
use autopilot_pipeline::store::RankFetcher;
use autopilot_pipeline::sweeper::StaleRunSweeper;
use autopilot_pipeline::{CompletionConfig, EngineConfig, Orchestrator};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "autopilot_api=debug,autopilot_pipeline=debug,autopilot_events=info,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine = EngineConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        run_max_duration_secs = engine.run_max_duration_secs,
        completion_timeout_secs = engine.completion_timeout_secs,
        "Loaded engine configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = autopilot_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    autopilot_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    autopilot_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let completion = HttpCompletionClient::new(CompletionConfig::from_env(), engine.completion_timeout())
        .expect("Failed to build completion client");

    let rank_source = RankSourceConfig::from_env();
    let ranks: Option<Arc<dyn RankFetcher>> = match rank_source.endpoint {
        Some(endpoint) => {
            let fetcher = HttpRankFetcher::new(endpoint, rank_source.api_key, engine.rank_fetch_timeout())
                .expect("Failed to build rank fetch client");
            Some(Arc::new(fetcher) as Arc<dyn RankFetcher>)
        }
        None => {
            tracing::info!("RANK_FETCH_ENDPOINT not set, ranking module will be skipped");
            None
        }
    };

    let stores = PgStore::collaborators(pool.clone(), Arc::new(completion), ranks);
    let event_bus = Arc::new(EventBus::default());
    let orchestrator = Arc::new(Orchestrator::new(stores.clone(), event_bus.clone(), engine.clone()));

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let logger_handle = tokio::spawn(EventLogger::run(event_bus.subscribe(), cancel.clone()));

    let monitor = RevertMonitor::new(stores.clone(), orchestrator.queue().clone(), engine.clone());
    let monitor_handle = tokio::spawn(monitor.run(cancel.clone()));

    let sweeper = StaleRunSweeper::new(stores.runs.clone(), engine);
    let sweeper_handle = tokio::spawn(sweeper.run(cancel.clone()));

    // --- App ---
    let state = AppState {
        pool: Some(pool),
        config: Arc::new(config.clone()),
        orchestrator,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .expect("Invalid HOST:PORT combination");
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped, stopping background tasks");
    cancel.cancel();

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    for (name, handle) in [
        ("revert_monitor", monitor_handle),
        ("stale_run_sweeper", sweeper_handle),
        ("event_logger", logger_handle),
    ] {
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!(task = name, "Background task did not stop in time");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
