use std::sync::Arc;

use sqlx::SqlitePool;

use picgrid_backend::storage::Storage;

/// Shared application state / 共享应用状态
pub struct AppState {
    pub db: SqlitePool,
    pub storage: Arc<Storage>,
}
