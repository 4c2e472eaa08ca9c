use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod db;
mod state;

use picgrid_backend::config;
use picgrid_backend::storage::{self, RetryPolicy};
use state::AppState;

/// Request bodies are capped above the 1MB file limit to leave room for the
/// multipart framing / 请求体上限略高于1MB文件限制，给multipart封装留余量
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging / 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration failures abort startup / 配置错误直接中止启动
    let server_config = config::ServerConfig::from_env()?;
    let storage_config = config::StorageConfig::from_env()?;

    let pool = db::init_pool(&config::database_url()).await?;
    db::run_migrations(&pool).await?;

    // Kick off the one-shot storage bootstrap and fail fast on a fatal
    // outcome / 触发一次性存储初始化，致命错误立即退出
    let storage = storage::init_storage(storage_config, RetryPolicy::default());
    if let Err(e) = storage.ready().await {
        anyhow::bail!("storage bootstrap failed: {}", e);
    }

    let app_state = Arc::new(AppState {
        db: pool,
        storage,
    });

    let app = Router::new()
        .route("/api/health", get(api::server::health_check))
        .route(
            "/api/items",
            get(api::items::list_items).post(api::items::create_item),
        )
        .route(
            "/api/items/:id",
            put(api::items::update_item).delete(api::items::delete_item),
        )
        .route("/api/items/:id/image", post(api::upload::upload_item_image))
        .route("/api/items/:id/image-url", get(api::upload::item_image_url))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let bind_addr = server_config.bind_address();
    tracing::info!("Server listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
