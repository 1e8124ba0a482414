use std::time::Duration;

use pinboard::{routes, services, state};

/// How often the registry is swept for rooms nobody ever attached to.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// How long a created-but-unclaimed room may linger before eviction.
const UNCLAIMED_ROOM_TTL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let state = state::AppState::new();

    let sweeper_state = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            services::room::evict_stale_rooms(&sweeper_state, UNCLAIMED_ROOM_TTL).await;
        }
    });

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "pinboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
