//! Data models / 数据模型

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One editable row with an attached image / 带图片的可编辑数据行
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Storage-form object key of the attached image / 图片的存储形式对象键
    pub image_key: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Create/update request body / 创建与更新请求体
#[derive(Debug, Deserialize)]
pub struct ItemPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
