//! Object storage integration / 对象存储集成
//!
//! Owns the single long-lived connection to the S3-compatible store.
//! Bootstrap (bucket existence + policy reconciliation) runs at most once
//! per process; its outcome, success or the terminal error, is memoized and
//! every later caller observes that same outcome. All operations after a
//! successful bootstrap are stateless and run concurrently without locking.

mod bootstrap;
mod error;
mod key;
mod policy;
mod retry;

pub use bootstrap::{reconcile, LivePolicy, ObjectStore, S3ObjectStore};
pub use error::{BootstrapError, RetrievalError, StoreError, UploadError};
pub use key::build_object_key;
pub use policy::{canonical_json, desired_bucket_policy, policies_equal};
pub use retry::RetryPolicy;

use std::sync::Arc;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use bytes::Bytes;
use once_cell::sync::OnceCell;

use crate::config::StorageConfig;

/// Presigned URLs are capped at S3's seven-day maximum / 预签名URL上限7天
pub const MAX_PRESIGN_SECS: u64 = 7 * 24 * 3600;

/// Default presign lifetime / 默认预签名有效期
pub const DEFAULT_PRESIGN_SECS: u64 = 60;

/// Global storage handle / 全局存储句柄
static STORAGE: OnceCell<Arc<Storage>> = OnceCell::new();

/// Process-wide storage client / 进程级存储客户端
pub struct Storage {
    store: Arc<dyn ObjectStore>,
    config: StorageConfig,
    retry: RetryPolicy,
    /// One-shot bootstrap outcome / 一次性初始化结果
    ready: tokio::sync::OnceCell<Result<(), Arc<BootstrapError>>>,
}

impl Storage {
    /// Connect to the store described by the config / 按配置连接存储
    /// Building the client is purely local; nothing talks to the network
    /// until the first `ready()` call.
    pub fn connect(config: StorageConfig, retry: RetryPolicy) -> Self {
        let credentials =
            Credentials::new(&config.access_key, &config.secret_key, None, None, "static");
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            // MinIO requires path-style addressing / MinIO需要路径风格寻址
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);

        Self::with_store(Arc::new(S3ObjectStore::new(client)), config, retry)
    }

    /// Construct over an arbitrary store implementation / 基于任意存储实现构造
    pub fn with_store(store: Arc<dyn ObjectStore>, config: StorageConfig, retry: RetryPolicy) -> Self {
        Self {
            store,
            config,
            retry,
            ready: tokio::sync::OnceCell::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Await the memoized bootstrap / 等待记忆化的初始化
    /// The first caller runs bucket/policy reconciliation; concurrent and
    /// later callers share that single execution and its outcome. A failed
    /// bootstrap stays failed — it is never re-run.
    pub async fn ready(&self) -> Result<(), Arc<BootstrapError>> {
        self.ready
            .get_or_init(|| async {
                let outcome = reconcile(self.store.as_ref(), &self.config.bucket, self.retry)
                    .await
                    .map_err(Arc::new);
                if outcome.is_ok() {
                    tracing::info!(bucket = %self.config.bucket, "object storage ready");
                }
                outcome
            })
            .await
            .clone()
    }

    /// Store a validated object / 存储已通过校验的对象
    /// No retry at this layer; the caller decides whether to retry.
    pub async fn upload_object(
        &self,
        filename: &str,
        path: Option<&str>,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), UploadError> {
        self.ready().await.map_err(UploadError::NotReady)?;
        let bucket = &self.config.bucket;

        // Defensive re-check / 防御性复查
        let exists = self
            .store
            .bucket_exists(bucket)
            .await
            .map_err(|source| UploadError::Bucket {
                bucket: bucket.clone(),
                source,
            })?;
        if !exists {
            tracing::error!(bucket = %bucket, "upload rejected, bucket missing");
            return Err(UploadError::BucketMissing(bucket.clone()));
        }

        let key = build_object_key(filename, path, false);
        if let Err(source) = self.store.put_object(bucket, &key, data, content_type).await {
            tracing::error!(bucket = %bucket, key = %key, error = %source, "object upload failed");
            return Err(UploadError::Store { key, source });
        }

        tracing::debug!(bucket = %bucket, key = %key, "object uploaded");
        Ok(())
    }

    /// Produce a public or time-limited URL for an object / 获取对象URL
    pub async fn get_object_url(
        &self,
        filename: &str,
        path: Option<&str>,
        is_public: bool,
        expires_secs: u64,
    ) -> Result<String, RetrievalError> {
        // Public URLs carry the percent-encoded filename; presigning uses
        // the storage-form key / 公开URL用编码文件名，预签名用存储形式的键
        let key = build_object_key(filename, path, is_public);
        self.object_url_for_key(&key, is_public, expires_secs).await
    }

    /// URL for an already-composed storage key / 基于已组合存储键获取URL
    /// The key is used verbatim: it was percent-encoded once when it was
    /// built at upload time and must never be encoded again.
    pub async fn object_url_for_key(
        &self,
        key: &str,
        is_public: bool,
        expires_secs: u64,
    ) -> Result<String, RetrievalError> {
        self.ready().await.map_err(RetrievalError::NotReady)?;
        let bucket = &self.config.bucket;

        let exists = self
            .store
            .bucket_exists(bucket)
            .await
            .map_err(|source| RetrievalError::Bucket {
                bucket: bucket.clone(),
                source,
            })?;
        if !exists {
            tracing::error!(bucket = %bucket, "url request rejected, bucket missing");
            return Err(RetrievalError::BucketMissing(bucket.clone()));
        }

        if is_public {
            return Ok(public_object_url(&self.config.endpoint_url(), bucket, key));
        }

        let expires = expires_secs.clamp(1, MAX_PRESIGN_SECS);
        match self.store.presign_get(bucket, key, expires).await {
            Ok(url) => Ok(url),
            Err(source) => {
                tracing::error!(bucket = %bucket, key = %key, error = %source, "presign failed");
                Err(RetrievalError::Presign {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }
}

/// Deterministic public URL for an object / 对象的确定性公开URL
pub fn public_object_url(endpoint_url: &str, bucket: &str, url_key: &str) -> String {
    format!("{}/{}/{}", endpoint_url.trim_end_matches('/'), bucket, url_key)
}

/// Install the global storage handle / 安装全局存储句柄
/// Repeated calls return the handle installed first.
pub fn init_storage(config: StorageConfig, retry: RetryPolicy) -> Arc<Storage> {
    STORAGE
        .get_or_init(|| Arc::new(Storage::connect(config, retry)))
        .clone()
}

/// Global storage handle, if installed / 获取全局存储句柄
pub fn get_storage() -> Option<Arc<Storage>> {
    STORAGE.get().cloned()
}

/// Module-level upload entry point / 模块级上传入口
pub async fn upload_object(
    filename: &str,
    path: Option<&str>,
    data: Bytes,
    content_type: &str,
) -> Result<(), UploadError> {
    let storage = get_storage().ok_or(UploadError::NotInitialized)?;
    storage.upload_object(filename, path, data, content_type).await
}

/// Module-level URL entry point / 模块级URL入口
pub async fn get_object_url(
    filename: &str,
    path: Option<&str>,
    is_public: bool,
    expires_secs: u64,
) -> Result<String, RetrievalError> {
    let storage = get_storage().ok_or(RetrievalError::NotInitialized)?;
    storage.get_object_url(filename, path, is_public, expires_secs).await
}
