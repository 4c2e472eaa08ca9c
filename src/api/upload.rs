//! Image upload and retrieval endpoints / 图片上传与获取接口
//!
//! Thin HTTP shims over the storage layer: extract the multipart fields,
//! run the validation pipeline, hand off to `storage`.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use picgrid_backend::storage::{build_object_key, DEFAULT_PRESIGN_SECS};
use picgrid_backend::validation::{validate_upload_input, MemoryFile};

use crate::state::AppState;

/// POST /api/items/:id/image - attach an image to a row / 为数据行上传图片
pub async fn upload_item_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Json<Value> {
    let exists: Option<(String,)> = match sqlx::query_as("SELECT id FROM items WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await
    {
        Ok(row) => row,
        Err(e) => {
            tracing::error!("Failed to look up item {}: {}", id, e);
            return Json(json!({"code": 500, "message": "database error"}));
        }
    };
    if exists.is_none() {
        return Json(json!({"code": 404, "message": "item not found"}));
    }

    // Collect multipart fields / 收集multipart字段
    let mut path_field: Option<String> = None;
    let mut file_field: Option<(String, String, Bytes)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name().map(str::to_string).as_deref() {
                Some("path") => match field.text().await {
                    Ok(text) => path_field = Some(text),
                    Err(e) => {
                        return Json(json!({"code": 400, "message": format!("bad path field: {}", e)}));
                    }
                },
                Some("file") => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let mime = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    match field.bytes().await {
                        Ok(data) => file_field = Some((filename, mime, data)),
                        Err(e) => {
                            return Json(json!({"code": 400, "message": format!("bad file field: {}", e)}));
                        }
                    }
                }
                _ => {}
            },
            Ok(None) => break,
            Err(e) => {
                return Json(json!({"code": 400, "message": format!("bad multipart body: {}", e)}));
            }
        }
    }

    let Some((filename, mime, data)) = file_field else {
        return Json(json!({"code": 400, "message": "missing file field"}));
    };

    // Validation pipeline gates every write / 校验管线把守所有写入
    let payload = MemoryFile::new(mime.clone(), data);
    let validated =
        match validate_upload_input(&filename, path_field.as_deref(), &payload).await {
            Ok(v) => v,
            Err(e) => return Json(json!({"code": 400, "message": e.to_string()})),
        };

    if let Err(e) = state
        .storage
        .upload_object(
            &validated.filename,
            validated.path.as_deref(),
            validated.data.clone(),
            &mime,
        )
        .await
    {
        tracing::error!("Image upload for item {} failed: {}", id, e);
        return Json(json!({"code": 500, "message": "upload failed"}));
    }

    // Persist the storage-form key on the row / 将存储形式的键写回数据行
    let key = build_object_key(&validated.filename, validated.path.as_deref(), false);
    let now = Utc::now().to_rfc3339();
    if let Err(e) = sqlx::query("UPDATE items SET image_key = ?, updated_at = ? WHERE id = ?")
        .bind(&key)
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await
    {
        tracing::error!("Failed to save image key for item {}: {}", id, e);
        return Json(json!({"code": 500, "message": "failed to save image key"}));
    }

    Json(json!({"code": 200, "message": "success", "data": {"image_key": key}}))
}

#[derive(Debug, Deserialize)]
pub struct ImageUrlQuery {
    #[serde(default)]
    pub public: bool,
    pub expires: Option<u64>,
}

/// GET /api/items/:id/image-url - public or presigned URL / 获取图片URL
pub async fn item_image_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ImageUrlQuery>,
) -> Json<Value> {
    let row: Option<(Option<String>,)> =
        match sqlx::query_as("SELECT image_key FROM items WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await
        {
            Ok(row) => row,
            Err(e) => {
                tracing::error!("Failed to look up item {}: {}", id, e);
                return Json(json!({"code": 500, "message": "database error"}));
            }
        };

    let key = match row {
        None => return Json(json!({"code": 404, "message": "item not found"})),
        Some((None,)) => return Json(json!({"code": 404, "message": "item has no image"})),
        Some((Some(key),)) => key,
    };

    // The row stores the composed storage key, already percent-encoded
    // once; it goes to the store verbatim / 行里存的键已编码过，原样使用
    let expires = query.expires.unwrap_or(DEFAULT_PRESIGN_SECS);
    match state
        .storage
        .object_url_for_key(&key, query.public, expires)
        .await
    {
        Ok(url) => Json(json!({"code": 200, "message": "success", "data": {"url": url}})),
        Err(e) => {
            tracing::error!("Failed to build image url for item {}: {}", id, e);
            Json(json!({"code": 500, "message": "failed to build url"}))
        }
    }
}
