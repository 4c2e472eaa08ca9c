//! Database setup / 数据库初始化

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Create the connection pool / 创建连接池
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the sqlite data directory exists / 确保数据目录存在
    if database_url.starts_with("sqlite:data/") {
        std::fs::create_dir_all("data")?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations / 运行数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            image_key TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed");
    Ok(())
}
