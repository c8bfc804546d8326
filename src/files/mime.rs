use std::path::Path;

/// Fallback for unknown extensions
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

static MIME_TYPES: &[(&str, &str)] = &[
    // Documents
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("txt", "text/plain"),
    ("rtf", "application/rtf"),
    // Images
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    // Video
    ("mp4", "video/mp4"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("mkv", "video/x-matroska"),
    // Audio
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    // Archives
    ("zip", "application/zip"),
    ("rar", "application/vnd.rar"),
    ("7z", "application/x-7z-compressed"),
    // Code
    ("js", "text/javascript"),
    ("py", "text/x-python"),
    ("java", "text/x-java-source"),
    ("c", "text/x-c"),
    ("cpp", "text/x-c++src"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("json", "application/json"),
    ("xml", "application/xml"),
];

/// Guess the MIME type of a file from its extension.
#[must_use]
pub fn mime_type_for(file_name: &str) -> &'static str {
    let Some(ext) = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
    else {
        return DEFAULT_MIME_TYPE;
    };

    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map_or(DEFAULT_MIME_TYPE, |(_, mime)| mime)
}

/// Format a byte count for listings (`0 Bytes`, `1.5 KB`, `2 MB`).
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}
