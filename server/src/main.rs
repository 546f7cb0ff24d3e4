mod config;
mod frame;
mod room;
mod routes;
mod services;
mod state;

use config::{RoomConfig, ServerConfig};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let server = ServerConfig::from_env();
    let state = state::AppState::new(RoomConfig::from_env());
    state.registry.ensure_public().await;

    let app = routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server.port)).await?;

    tracing::info!(port = server.port, "room server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    state.registry.shutdown().await;
    Ok(())
}
