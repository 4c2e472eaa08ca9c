//! Storage error taxonomy / 存储错误分类

use std::sync::Arc;

use thiserror::Error;

/// Opaque error from the underlying store / 底层存储返回的错误
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Fatal bootstrap failure / 初始化致命错误
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Bucket existence check exhausted its retries / 桶检查重试耗尽
    #[error("bucket {bucket} unreachable after {attempts} attempts: {source}")]
    Connectivity {
        bucket: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },
    /// Policy read failed for a reason other than "no policy" / 策略读取失败
    #[error("failed to read policy of bucket {bucket}: {source}")]
    PolicyRead {
        bucket: String,
        #[source]
        source: StoreError,
    },
    /// Policy write failed, never retried / 策略写入失败，不重试
    #[error("failed to write policy of bucket {bucket}: {source}")]
    PolicyWrite {
        bucket: String,
        #[source]
        source: StoreError,
    },
}

/// Upload failure after validation passed / 校验通过后的上传失败
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("storage has not been initialized")]
    NotInitialized,
    #[error("storage bootstrap failed: {0}")]
    NotReady(Arc<BootstrapError>),
    #[error("bucket check failed for {bucket}: {source}")]
    Bucket {
        bucket: String,
        #[source]
        source: StoreError,
    },
    #[error("bucket {0} does not exist")]
    BucketMissing(String),
    #[error("failed to store object {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// URL generation failure / 获取URL失败
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("storage has not been initialized")]
    NotInitialized,
    #[error("storage bootstrap failed: {0}")]
    NotReady(Arc<BootstrapError>),
    #[error("bucket check failed for {bucket}: {source}")]
    Bucket {
        bucket: String,
        #[source]
        source: StoreError,
    },
    #[error("bucket {0} does not exist")]
    BucketMissing(String),
    #[error("failed to presign object {key}: {source}")]
    Presign {
        key: String,
        #[source]
        source: StoreError,
    },
}
