use std::env;
use std::time::Duration;

use engine::bus::NatsBus;
use engine::state::AppState;
use engine::{db, presence};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let nats_url = env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_owned());
    let liveness_secs: u64 = env::var("PRESENCE_LIVENESS_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(90);
    let instance_id = env::var("INSTANCE_ID").unwrap_or_else(|_| Uuid::new_v4().to_string());

    info!("connecting to database...");
    let pool = db::create_pool(&database_url).await;
    db::run_migrations(&pool).await;
    info!("migrations applied");

    info!(url = %nats_url, "connecting to event bus...");
    let bus = NatsBus::connect(&nats_url)
        .await
        .expect("failed to connect to NATS");

    let state = AppState::new(pool.clone(), bus.clone(), instance_id.clone());
    state
        .presence
        .register_instance()
        .await
        .expect("failed to register instance");

    let sweep_pool = pool.clone();
    let sweep_bus = bus.clone();
    tokio::spawn(async move {
        presence::run_stale_sweep(sweep_pool, sweep_bus, Duration::from_secs(liveness_secs)).await;
    });

    let heartbeat_presence = state.presence.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(liveness_secs / 3));
        loop {
            interval.tick().await;
            if let Err(e) = heartbeat_presence.heartbeat().await {
                tracing::error!(error = %e, "failed to record instance heartbeat");
            }
        }
    });

    let router = engine::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "engine listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("engine shut down gracefully");
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
