//! Environment configuration / 环境变量配置
//!
//! All connection parameters come from the process environment. The MinIO
//! variables are hard requirements: a missing or malformed value aborts
//! startup instead of being caught and retried.

use thiserror::Error;

/// Configuration error, fatal at startup / 配置错误，启动时致命
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Read a required environment variable / 读取必需的环境变量
/// An empty value counts as missing / 空值视为缺失
pub fn get_required_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name.to_string())),
    }
}

/// Parse a boolean token / 解析布尔值
/// Only the exact tokens "true" / "1" / "yes" are truthy, matched
/// case-insensitively but never trimmed; everything else, malformed input
/// included, is false. Never an error.
pub fn parse_bool(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Parse a TCP port / 解析端口号
pub fn parse_port(name: &str, raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => Ok(port as u16),
        _ => Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("{:?} is not a valid port", raw),
        }),
    }
}

/// Object storage connection settings / 对象存储连接配置
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// MinIO host / MinIO主机地址
    pub endpoint: String,
    /// MinIO port / MinIO端口
    pub port: u16,
    pub access_key: String,
    pub secret_key: String,
    /// Connect over TLS / 是否使用TLS
    pub use_ssl: bool,
    /// Target bucket / 目标存储桶
    pub bucket: String,
}

impl StorageConfig {
    /// Load from MINIO_* environment variables / 从MINIO_*环境变量加载
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = get_required_env("MINIO_ENDPOINT")?;
        let port = parse_port("MINIO_PORT", &get_required_env("MINIO_PORT")?)?;
        let access_key = get_required_env("MINIO_ACCESS_KEY")?;
        let secret_key = get_required_env("MINIO_SECRET_KEY")?;
        let use_ssl = parse_bool(&std::env::var("MINIO_USE_SSL").unwrap_or_default());
        let bucket = get_required_env("MINIO_BUCKET")?;

        Ok(Self {
            endpoint,
            port,
            access_key,
            secret_key,
            use_ssl,
            bucket,
        })
    }

    /// Full endpoint URL / 完整的端点URL
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.endpoint, self.port)
    }
}

/// HTTP server settings / HTTP服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8180,
        }
    }
}

impl ServerConfig {
    /// Load from HOST/PORT with defaults / 从HOST/PORT加载，带默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let host = std::env::var("HOST").unwrap_or(defaults.host);
        let port = match std::env::var("PORT") {
            Ok(raw) => parse_port("PORT", &raw)?,
            Err(_) => defaults.port,
        };
        Ok(Self { host, port })
    }

    /// Server bind address / 服务器绑定地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database URL, defaulting to a local sqlite file / 数据库URL，默认本地sqlite
pub fn database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/picgrid.db?mode=rwc".to_string())
}
