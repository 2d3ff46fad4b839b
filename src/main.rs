mod config;
mod db;
mod event;
mod rooms;
mod routes;
mod services;
mod state;
mod urls;

use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();
    let port = config.port;

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .expect("data dir create failed");
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("upload dir create failed");

    let pool = db::init_pool(&config.db_file, config.db_max_connections)
        .await
        .expect("database init failed");

    let state = state::AppState::new(pool, config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "boardroom listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server failed");
}
