//! Item row CRUD / 数据行增删改查

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use picgrid_backend::models::{Item, ItemPayload};

use super::ApiResponse;
use crate::state::AppState;

/// GET /api/items - list all rows / 列出所有数据行
pub async fn list_items(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<Item>>> {
    let items: Result<Vec<Item>, _> =
        sqlx::query_as("SELECT * FROM items ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await;

    match items {
        Ok(items) => Json(ApiResponse::success(items)),
        Err(e) => {
            tracing::error!("Failed to list items: {}", e);
            Json(ApiResponse::internal_error("failed to list items"))
        }
    }
}

/// POST /api/items - create a row / 创建数据行
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ItemPayload>,
) -> Json<ApiResponse<Item>> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Json(ApiResponse::error("name must not be empty"));
    }

    let now = Utc::now().to_rfc3339();
    let item = Item {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: payload.description,
        image_key: None,
        created_at: now.clone(),
        updated_at: now,
    };

    let result = sqlx::query(
        "INSERT INTO items (id, name, description, image_key, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id)
    .bind(&item.name)
    .bind(&item.description)
    .bind(&item.image_key)
    .bind(&item.created_at)
    .bind(&item.updated_at)
    .execute(&state.db)
    .await;

    match result {
        Ok(_) => Json(ApiResponse::success(item)),
        Err(e) => {
            tracing::error!("Failed to create item: {}", e);
            Json(ApiResponse::internal_error("failed to create item"))
        }
    }
}

/// PUT /api/items/:id - update a row / 更新数据行
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ItemPayload>,
) -> Json<ApiResponse<Item>> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Json(ApiResponse::error("name must not be empty"));
    }

    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE items SET name = ?, description = ?, updated_at = ? WHERE id = ?",
    )
    .bind(name)
    .bind(&payload.description)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => Json(ApiResponse::not_found("item not found")),
        Ok(_) => {
            let item: Result<Item, _> = sqlx::query_as("SELECT * FROM items WHERE id = ?")
                .bind(&id)
                .fetch_one(&state.db)
                .await;
            match item {
                Ok(item) => Json(ApiResponse::success(item)),
                Err(e) => {
                    tracing::error!("Failed to reload item {}: {}", id, e);
                    Json(ApiResponse::internal_error("failed to reload item"))
                }
            }
        }
        Err(e) => {
            tracing::error!("Failed to update item {}: {}", id, e);
            Json(ApiResponse::internal_error("failed to update item"))
        }
    }
}

/// DELETE /api/items/:id - delete a row / 删除数据行
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ApiResponse<()>> {
    let result = sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => Json(ApiResponse::not_found("item not found")),
        Ok(_) => Json(ApiResponse::success(())),
        Err(e) => {
            tracing::error!("Failed to delete item {}: {}", id, e);
            Json(ApiResponse::internal_error("failed to delete item"))
        }
    }
}
