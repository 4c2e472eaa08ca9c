//! Bucket policy document and canonical comparison / 桶策略文档与规范化比较

use serde_json::{json, Value};

/// Desired bucket policy / 期望的桶策略
/// Anonymous read on objects plus location read on the bucket itself.
/// Built once from the bucket name, never mutated at runtime.
pub fn desired_bucket_policy(bucket: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "AllowPublicReadGetObject",
                "Effect": "Allow",
                "Principal": { "AWS": ["*"] },
                "Action": ["s3:GetObject"],
                "Resource": [format!("arn:aws:s3:::{}/*", bucket)]
            },
            {
                "Sid": "AllowPublicGetBucketLocation",
                "Effect": "Allow",
                "Principal": { "AWS": ["*"] },
                "Action": ["s3:GetBucketLocation"],
                "Resource": [format!("arn:aws:s3:::{}", bucket)]
            }
        ]
    })
}

/// Canonical serialization / 规范化序列化
/// Object keys sorted lexicographically, arrays keep their order, no
/// whitespace. Two structurally equal documents canonicalize identically.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body = entries
                .iter()
                .map(|(k, v)| format!("{}:{}", Value::String((*k).clone()), canonical_json(v)))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", body)
        }
        Value::Array(items) => {
            let body = items.iter().map(canonical_json).collect::<Vec<_>>().join(",");
            format!("[{}]", body)
        }
        other => other.to_string(),
    }
}

/// Structural equality of a live policy against the desired one
/// 当前策略与期望策略的结构化相等比较
/// Falls back to trimmed-string comparison when the live document does not
/// parse as JSON.
pub fn policies_equal(live: &str, desired: &Value) -> bool {
    match serde_json::from_str::<Value>(live) {
        Ok(live_doc) => canonical_json(&live_doc) == canonical_json(desired),
        Err(_) => live.trim() == desired.to_string().trim(),
    }
}
