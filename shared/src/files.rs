//! File helpers shared by the upload and listing paths: size labels, the MIME
//! allow-list, filename sanitizing and magic-byte sniffing.

/// Content type used when nothing better is known
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Filename used when the client sends none or only unsafe characters
pub const FALLBACK_FILENAME: &str = "upload.bin";

const MAX_FILENAME_LEN: usize = 255;

const ALLOWED_MIME_PREFIXES: &[&str] = &["image/", "video/", "audio/", "text/"];

const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/zip",
    "application/x-zip-compressed",
    "application/x-rar-compressed",
];

/// Human readable size, base 1024: `0 Bytes`, `1.5 KB`, `2 MB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{:.2}", value);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rendered, UNITS[unit])
}

/// Strip parameters and case from a content type: `Text/Plain; charset=utf-8` -> `text/plain`
pub fn normalize_mime_type(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether an upload of this content type is accepted
///
/// `application/octet-stream` is only accepted when `allow_unknown` is set.
pub fn is_allowed_mime_type(mime: &str, allow_unknown: bool) -> bool {
    let mime = normalize_mime_type(mime);

    if mime == DEFAULT_MIME_TYPE {
        return allow_unknown;
    }

    ALLOWED_MIME_PREFIXES.iter().any(|p| mime.starts_with(p))
        || ALLOWED_MIME_TYPES.contains(&mime.as_str())
}

/// Reduce a client supplied name to a safe single path segment
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '<' | '>' | '|' | ':' | '*' | '?'))
        .take(MAX_FILENAME_LEN)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();

    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Guess a content type from leading magic bytes
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    if data.len() < 4 {
        return DEFAULT_MIME_TYPE;
    }

    match &data[0..4] {
        [0x89, 0x50, 0x4E, 0x47] => "image/png",
        [0xFF, 0xD8, 0xFF, _] => "image/jpeg",
        [0x47, 0x49, 0x46, 0x38] => "image/gif",
        [0x25, 0x50, 0x44, 0x46] => "application/pdf",
        [0x50, 0x4B, 0x03, 0x04] => "application/zip",
        [0x52, 0x61, 0x72, 0x21] => "application/x-rar-compressed",
        _ => DEFAULT_MIME_TYPE,
    }
}
