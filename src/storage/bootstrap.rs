//! Bucket bootstrap and policy reconciliation / 桶初始化与策略调和
//!
//! Ensures the target bucket exists (with retries) and that its live access
//! policy matches the desired document. The policy is only ever applied to a
//! bucket that already exists, and it is rewritten only when semantically
//! different from the desired one.

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use bytes::Bytes;
use serde_json::Value;

use super::error::{BootstrapError, StoreError};
use super::policy::{desired_bucket_policy, policies_equal};
use super::retry::RetryPolicy;

/// Live policy as reported by the store / 存储端报告的当前策略
/// "No policy" is a regular state, not an error / “无策略”是正常状态而非错误
#[derive(Debug, Clone)]
pub enum LivePolicy {
    Present(String),
    Absent,
}

/// Remote object store operations / 远端对象存储操作
/// Seam between the reconciler/upload logic and the SDK; tests provide
/// in-memory implementations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;
    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError>;
    async fn read_policy(&self, bucket: &str) -> Result<LivePolicy, StoreError>;
    async fn write_policy(&self, bucket: &str, policy: &Value) -> Result<(), StoreError>;
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_secs: u64,
    ) -> Result<String, StoreError>;
}

/// Ensure the bucket exists and carries the desired policy / 确保桶存在且策略一致
pub async fn reconcile(
    store: &dyn ObjectStore,
    bucket: &str,
    retry: RetryPolicy,
) -> Result<(), BootstrapError> {
    ensure_bucket(store, bucket, retry).await?;

    let desired = desired_bucket_policy(bucket);
    let live = store
        .read_policy(bucket)
        .await
        .map_err(|source| BootstrapError::PolicyRead {
            bucket: bucket.to_string(),
            source,
        })?;

    let needs_write = match &live {
        LivePolicy::Absent => true,
        LivePolicy::Present(raw) => !policies_equal(raw, &desired),
    };

    if needs_write {
        store
            .write_policy(bucket, &desired)
            .await
            .map_err(|source| {
                tracing::error!(bucket, error = %source, "bucket policy write failed");
                BootstrapError::PolicyWrite {
                    bucket: bucket.to_string(),
                    source,
                }
            })?;
        tracing::info!(bucket, "bucket policy applied");
    } else {
        tracing::debug!(bucket, "bucket policy already up to date");
    }

    Ok(())
}

/// Check-or-create the bucket with linear backoff / 带线性退避的桶检查与创建
async fn ensure_bucket(
    store: &dyn ObjectStore,
    bucket: &str,
    retry: RetryPolicy,
) -> Result<(), BootstrapError> {
    let mut last_error: Option<StoreError> = None;

    for attempt in 1..=retry.max_attempts {
        match store.bucket_exists(bucket).await {
            Ok(true) => return Ok(()),
            Ok(false) => match store.create_bucket(bucket).await {
                Ok(()) => {
                    tracing::info!(bucket, "bucket created");
                    return Ok(());
                }
                Err(err) => last_error = Some(err),
            },
            Err(err) => last_error = Some(err),
        }

        if attempt < retry.max_attempts {
            let delay = retry.delay_for(attempt);
            tracing::warn!(
                bucket,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "bucket check failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(BootstrapError::Connectivity {
        bucket: bucket.to_string(),
        attempts: retry.max_attempts,
        source: last_error.unwrap_or_else(|| StoreError::new("bucket check failed")),
    })
}

/// Production store backed by the S3 SDK / 基于S3 SDK的生产实现
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => {
                Ok(false)
            }
            Err(err) => Err(StoreError::new(err.to_string())),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| StoreError::new(err.to_string()))?;
        Ok(())
    }

    async fn read_policy(&self, bucket: &str) -> Result<LivePolicy, StoreError> {
        match self.client.get_bucket_policy().bucket(bucket).send().await {
            Ok(output) => Ok(output
                .policy
                .map(LivePolicy::Present)
                .unwrap_or(LivePolicy::Absent)),
            // MinIO and S3 report an unset policy as an error code, which is
            // an absent state, not a failure / 未设置策略的错误码按缺失处理
            Err(err) if err.code() == Some("NoSuchBucketPolicy") => Ok(LivePolicy::Absent),
            Err(err) => Err(StoreError::new(err.to_string())),
        }
    }

    async fn write_policy(&self, bucket: &str, policy: &Value) -> Result<(), StoreError> {
        let document =
            serde_json::to_string(policy).map_err(|err| StoreError::new(err.to_string()))?;
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(document)
            .send()
            .await
            .map_err(|err| StoreError::new(err.to_string()))?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(data))
            .send()
            .await
            .map_err(|err| StoreError::new(err.to_string()))?;
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_secs: u64,
    ) -> Result<String, StoreError> {
        let config = aws_sdk_s3::presigning::PresigningConfig::expires_in(
            std::time::Duration::from_secs(expires_secs),
        )
        .map_err(|err| StoreError::new(err.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| StoreError::new(err.to_string()))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::storage::policy::canonical_json;

    /// Scripted store: pops one existence result per call / 脚本化的桶检查结果
    #[derive(Default)]
    struct ScriptedStore {
        exists_script: Mutex<VecDeque<Result<bool, StoreError>>>,
        policy: Mutex<Option<String>>,
        fail_policy_read: bool,
        fail_policy_write: bool,
        exists_calls: AtomicU32,
        create_calls: AtomicU32,
        write_calls: AtomicU32,
    }

    impl ScriptedStore {
        fn with_exists(script: Vec<Result<bool, StoreError>>) -> Self {
            Self {
                exists_script: Mutex::new(script.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        async fn bucket_exists(&self, _bucket: &str) -> Result<bool, StoreError> {
            self.exists_calls.fetch_add(1, Ordering::SeqCst);
            self.exists_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(true))
        }

        async fn create_bucket(&self, _bucket: &str) -> Result<(), StoreError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn read_policy(&self, _bucket: &str) -> Result<LivePolicy, StoreError> {
            if self.fail_policy_read {
                return Err(StoreError::new("connection reset"));
            }
            Ok(self
                .policy
                .lock()
                .unwrap()
                .clone()
                .map(LivePolicy::Present)
                .unwrap_or(LivePolicy::Absent))
        }

        async fn write_policy(&self, _bucket: &str, policy: &Value) -> Result<(), StoreError> {
            if self.fail_policy_write {
                return Err(StoreError::new("access denied"));
            }
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            *self.policy.lock().unwrap() = Some(policy.to_string());
            Ok(())
        }

        async fn put_object(
            &self,
            _bucket: &str,
            _key: &str,
            _data: Bytes,
            _content_type: &str,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn presign_get(
            &self,
            _bucket: &str,
            _key: &str,
            _expires_secs: u64,
        ) -> Result<String, StoreError> {
            Ok("http://example/presigned".to_string())
        }
    }

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let store = ScriptedStore::with_exists(vec![
            Err(StoreError::new("timeout")),
            Err(StoreError::new("timeout")),
            Ok(true),
        ]);

        reconcile(&store, "pics", fast_retry(3)).await.unwrap();
        assert_eq!(store.exists_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fails_after_exhausting_attempts() {
        let store = ScriptedStore::with_exists(vec![
            Err(StoreError::new("timeout")),
            Err(StoreError::new("timeout")),
            Err(StoreError::new("timeout")),
        ]);

        let err = reconcile(&store, "pics", fast_retry(3)).await.unwrap_err();
        assert_eq!(store.exists_calls.load(Ordering::SeqCst), 3);
        match err {
            BootstrapError::Connectivity { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_creates_missing_bucket() {
        let store = ScriptedStore::with_exists(vec![Ok(false)]);

        reconcile(&store, "pics", fast_retry(3)).await.unwrap();
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);
        // Absent policy gets written / 缺失的策略被写入
        assert_eq!(store.write_calls.load(Ordering::SeqCst), 1);

        let written = store.policy.lock().unwrap().clone().unwrap();
        let written: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(
            canonical_json(&written),
            canonical_json(&desired_bucket_policy("pics"))
        );
    }

    #[tokio::test]
    async fn test_matching_policy_is_not_rewritten() {
        let store = ScriptedStore::with_exists(vec![Ok(true)]);
        // Same document, pretty-printed: structurally equal / 同一文档的美化形式
        *store.policy.lock().unwrap() = Some(
            serde_json::to_string_pretty(&desired_bucket_policy("pics")).unwrap(),
        );

        reconcile(&store, "pics", fast_retry(3)).await.unwrap();
        assert_eq!(store.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_different_policy_is_replaced() {
        let store = ScriptedStore::with_exists(vec![Ok(true)]);
        *store.policy.lock().unwrap() =
            Some(desired_bucket_policy("other-bucket").to_string());

        reconcile(&store, "pics", fast_retry(3)).await.unwrap();
        assert_eq!(store.write_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_policy_write_failure_is_fatal() {
        let store = ScriptedStore {
            exists_script: Mutex::new(vec![Ok(true)].into()),
            fail_policy_write: true,
            ..Default::default()
        };

        let err = reconcile(&store, "pics", fast_retry(3)).await.unwrap_err();
        assert!(matches!(err, BootstrapError::PolicyWrite { .. }));
    }

    #[tokio::test]
    async fn test_policy_read_failure_is_surfaced() {
        let store = ScriptedStore {
            exists_script: Mutex::new(vec![Ok(true)].into()),
            fail_policy_read: true,
            ..Default::default()
        };

        let err = reconcile(&store, "pics", fast_retry(3)).await.unwrap_err();
        assert!(matches!(err, BootstrapError::PolicyRead { .. }));
    }
}
