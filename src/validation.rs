//! Upload validation pipeline / 上传校验管线
//!
//! The single gate in front of the object store. Every externally supplied
//! filename, path and file body passes through here before an object key is
//! built or a byte is written:
//! 1. Filename sanitization / 文件名清洗
//! 2. Path traversal prevention / 路径穿越防护
//! 3. Declared size and MIME checks / 大小与MIME校验
//! 4. Magic-byte sniffing of the payload / 文件头魔数校验

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Maximum accepted payload size / 最大允许的文件大小
pub const MAX_FILE_SIZE: usize = 1024 * 1024; // 1MB

/// Allowed declared content types / 允许的声明类型
/// "image/jpg" is not a real MIME type but some browsers still send it
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg"];

/// Maximum filename length after sanitization / 清洗后文件名最大长度
pub const MAX_FILENAME_LEN: usize = 100;

/// Validation failure, always a normal error result / 校验失败，普通错误结果
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("filename is empty after sanitization")]
    EmptyFilename,
    #[error("path must not be empty")]
    EmptyPath,
    #[error("path must not start with '/'")]
    AbsolutePath,
    #[error("path must not contain backslashes")]
    BackslashInPath,
    #[error("path must not contain '..'")]
    PathTraversal,
    #[error("file size {0} exceeds the {MAX_FILE_SIZE} byte limit")]
    TooLarge(usize),
    #[error("content type {0:?} is not allowed")]
    DisallowedMime(String),
    #[error("failed to read file content: {0}")]
    Unreadable(String),
    #[error("content does not carry a JPEG signature")]
    BadSignature,
}

/// Sanitize an untrusted filename / 清洗不可信的文件名
/// Lowercase, spaces and anything outside [a-zA-Z0-9_.-] become '_',
/// leading dots are stripped, result truncated to 100 characters.
/// Deterministic and idempotent / 确定且幂等
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
            out.push(ch);
        } else {
            // spaces fall through here too / 空格同样替换为下划线
            out.push('_');
        }
    }
    out.trim_start_matches('.').chars().take(MAX_FILENAME_LEN).collect()
}

/// Validate a filename / 校验文件名
/// An input that sanitizes to nothing is rejected, not silently accepted.
pub fn validate_filename(raw: &str) -> Result<String, ValidationError> {
    let sanitized = sanitize_filename(raw);
    if sanitized.is_empty() {
        return Err(ValidationError::EmptyFilename);
    }
    Ok(sanitized)
}

/// Validate an object path / 校验对象路径
/// Rejects absolute paths, backslashes and traversal; normalizes to a
/// trailing '/' so downstream joining is unambiguous.
pub fn validate_path(raw: &str) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if raw.starts_with('/') {
        return Err(ValidationError::AbsolutePath);
    }
    if raw.contains('\\') {
        return Err(ValidationError::BackslashInPath);
    }
    if raw.contains("..") {
        return Err(ValidationError::PathTraversal);
    }
    if raw.ends_with('/') {
        Ok(raw.to_string())
    } else {
        Ok(format!("{}/", raw))
    }
}

/// A value that can be asked for its declared size, declared MIME type and
/// its bytes / 可读取声明大小、声明类型与内容的文件载体
#[async_trait]
pub trait FilePayload: Send + Sync {
    fn declared_size(&self) -> usize;
    fn declared_mime(&self) -> &str;
    async fn read_bytes(&self) -> Result<Bytes, ValidationError>;
}

/// In-memory file payload / 内存文件载体
#[derive(Debug, Clone)]
pub struct MemoryFile {
    mime: String,
    data: Bytes,
}

impl MemoryFile {
    pub fn new(mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime: mime.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl FilePayload for MemoryFile {
    fn declared_size(&self) -> usize {
        self.data.len()
    }

    fn declared_mime(&self) -> &str {
        &self.mime
    }

    async fn read_bytes(&self) -> Result<Bytes, ValidationError> {
        Ok(self.data.clone())
    }
}

/// Disk-backed file payload / 磁盘文件载体
/// The bytes are only read once the declared checks have passed.
#[derive(Debug, Clone)]
pub struct DiskFile {
    path: std::path::PathBuf,
    mime: String,
    declared_size: usize,
}

impl DiskFile {
    pub fn new(path: impl Into<std::path::PathBuf>, mime: impl Into<String>, declared_size: usize) -> Self {
        Self {
            path: path.into(),
            mime: mime.into(),
            declared_size,
        }
    }
}

#[async_trait]
impl FilePayload for DiskFile {
    fn declared_size(&self) -> usize {
        self.declared_size
    }

    fn declared_mime(&self) -> &str {
        &self.mime
    }

    async fn read_bytes(&self) -> Result<Bytes, ValidationError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ValidationError::Unreadable(e.to_string()))?;
        Ok(Bytes::from(data))
    }
}

/// JPEG magic-byte check / JPEG魔数校验
/// SOI marker FF D8 at the start, EOI marker FF D9 at the end.
/// Buffers shorter than 4 bytes are rejected outright.
pub fn sniff_jpeg(buf: &[u8]) -> bool {
    if buf.len() < 4 {
        return false;
    }
    buf[0] == 0xFF && buf[1] == 0xD8 && buf[buf.len() - 2] == 0xFF && buf[buf.len() - 1] == 0xD9
}

/// Validate a file payload / 校验文件内容
/// Declared checks first, then the full buffer is read and sniffed.
pub async fn validate_file(file: &dyn FilePayload) -> Result<Bytes, ValidationError> {
    let size = file.declared_size();
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge(size));
    }

    let mime = file.declared_mime();
    if !ALLOWED_MIME_TYPES.contains(&mime) {
        return Err(ValidationError::DisallowedMime(mime.to_string()));
    }

    let data = file.read_bytes().await?;
    if !sniff_jpeg(&data) {
        return Err(ValidationError::BadSignature);
    }

    Ok(data)
}

/// A fully validated upload request / 通过校验的上传请求
/// Exists only for the duration of one upload call / 仅在单次上传期间存在
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub filename: String,
    pub path: Option<String>,
    pub data: Bytes,
}

/// Composite upload validation / 组合上传校验
/// Filename and file are mandatory; an invalid path degrades to "no path"
/// because path is optional at the call site.
pub async fn validate_upload_input(
    filename: &str,
    path: Option<&str>,
    file: &dyn FilePayload,
) -> Result<ValidatedUpload, ValidationError> {
    let filename = validate_filename(filename)?;
    let path = path.and_then(|p| validate_path(p).ok());
    let data = validate_file(file).await?;

    Ok(ValidatedUpload {
        filename,
        path,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[0] = 0xFF;
        data[1] = 0xD8;
        data[len - 2] = 0xFF;
        data[len - 1] = 0xD9;
        data
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My Photo!!.JPG"), "my_photo__.jpg");
        assert_eq!(sanitize_filename("cat.jpg"), "cat.jpg");
        assert_eq!(sanitize_filename("..hidden.jpg"), "hidden.jpg");
        assert_eq!(sanitize_filename("a b/c.jpg"), "a_b_c.jpg");
        assert_eq!(sanitize_filename("ünïcode.jpg"), "_n_code.jpg");

        // Truncation to 100 characters / 截断到100字符
        let long = "a".repeat(150);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn test_sanitize_idempotent() {
        for input in ["My Photo!!.JPG", "...a b.png", "x", "", "日本語.jpg"] {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn test_validate_filename_rejects_empty() {
        assert_eq!(validate_filename(""), Err(ValidationError::EmptyFilename));
        assert_eq!(validate_filename("..."), Err(ValidationError::EmptyFilename));
        assert!(validate_filename("ok.jpg").is_ok());
    }

    #[test]
    fn test_validate_path() {
        assert_eq!(validate_path("images").unwrap(), "images/");
        assert_eq!(validate_path("images/").unwrap(), "images/");
        assert_eq!(validate_path("a/b").unwrap(), "a/b/");
        assert_eq!(validate_path(""), Err(ValidationError::EmptyPath));
        assert_eq!(validate_path("/etc"), Err(ValidationError::AbsolutePath));
        assert_eq!(validate_path("a\\b"), Err(ValidationError::BackslashInPath));
        assert_eq!(validate_path("a/../b"), Err(ValidationError::PathTraversal));
    }

    #[test]
    fn test_sniff_jpeg() {
        assert!(sniff_jpeg(&[0xFF, 0xD8, 0x00, 0x00, 0xFF, 0xD9]));
        assert!(!sniff_jpeg(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]));
        // Shorter than 4 bytes fails regardless of content / 不足4字节直接拒绝
        assert!(!sniff_jpeg(&[0xFF, 0xD8, 0xD9]));
        assert!(!sniff_jpeg(&[]));
        // Valid markers at only one end are not enough / 仅一端有标记不通过
        assert!(!sniff_jpeg(&[0xFF, 0xD8, 0x00, 0x00]));
        assert!(!sniff_jpeg(&[0x00, 0x00, 0xFF, 0xD9]));
    }

    #[tokio::test]
    async fn test_validate_file() {
        let good = MemoryFile::new("image/jpeg", jpeg_bytes(64));
        assert!(validate_file(&good).await.is_ok());

        let oversized = MemoryFile::new("image/jpeg", jpeg_bytes(MAX_FILE_SIZE + 1));
        assert_eq!(
            validate_file(&oversized).await,
            Err(ValidationError::TooLarge(MAX_FILE_SIZE + 1))
        );

        let wrong_mime = MemoryFile::new("image/png", jpeg_bytes(64));
        assert_eq!(
            validate_file(&wrong_mime).await,
            Err(ValidationError::DisallowedMime("image/png".to_string()))
        );

        let bad_content = MemoryFile::new("image/jpeg", vec![0u8; 64]);
        assert_eq!(
            validate_file(&bad_content).await,
            Err(ValidationError::BadSignature)
        );
    }

    #[tokio::test]
    async fn test_disk_file() {
        let path = std::env::temp_dir().join("picgrid_validation_test.jpg");
        tokio::fs::write(&path, jpeg_bytes(32)).await.unwrap();

        let file = DiskFile::new(&path, "image/jpeg", 32);
        assert!(validate_file(&file).await.is_ok());
        tokio::fs::remove_file(&path).await.unwrap();

        // Missing file surfaces as an unreadable-stream failure
        // 文件不存在时报为读取失败
        let gone = DiskFile::new(&path, "image/jpeg", 32);
        assert!(matches!(
            validate_file(&gone).await,
            Err(ValidationError::Unreadable(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_upload_input() {
        let file = MemoryFile::new("image/jpeg", jpeg_bytes(128));

        let validated = validate_upload_input("Cat Pic.jpg", Some("images"), &file)
            .await
            .unwrap();
        assert_eq!(validated.filename, "cat_pic.jpg");
        assert_eq!(validated.path.as_deref(), Some("images/"));
        assert_eq!(validated.data.len(), 128);

        // Invalid path degrades to none instead of failing / 非法路径按无路径处理
        let validated = validate_upload_input("a.jpg", Some("/etc"), &file)
            .await
            .unwrap();
        assert_eq!(validated.path, None);

        // Filename failure is mandatory / 文件名错误是硬性失败
        assert_eq!(
            validate_upload_input("...", Some("images"), &file)
                .await
                .unwrap_err(),
            ValidationError::EmptyFilename
        );
    }
}
