//! Object key builder / 对象键构造
//!
//! Composes keys from already-validated parts; no re-validation happens
//! here. Storage keys keep the raw sanitized filename so object identity in
//! the store matches what was uploaded, URL keys percent-encode it so
//! generated links stay browser-safe.

/// Build an object key from a sanitized filename and an optional validated
/// path / 由清洗后的文件名与可选路径构造对象键
pub fn build_object_key(filename: &str, path: Option<&str>, encode_filename_for_url: bool) -> String {
    let name = if encode_filename_for_url {
        urlencoding::encode(filename).into_owned()
    } else {
        filename.to_string()
    };

    let prefix = path
        .map(|p| {
            // Encode each segment on its own; dropping empty segments
            // prevents "//" in the key / 逐段编码，丢弃空段避免"//"
            p.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}
