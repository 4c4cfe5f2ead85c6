use std::path::Path;

const DEFAULT_MIME: &str = "image/jpeg";

/// MIME type sent with an upload, derived from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => DEFAULT_MIME,
    }
}

/// Dot files are editor/OS artifacts and never uploaded.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(true)
}

/// Whether the extension of `path` is one of `formats` (case-insensitive, no leading dot).
pub fn has_supported_extension(path: &Path, formats: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    formats
        .iter()
        .any(|format| format.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

pub fn push_unique_url(list: &mut Vec<String>, candidate: String) {
    let candidate = candidate.trim().trim_end_matches('/').to_string();
    if candidate.is_empty() {
        return;
    }
    if !list.iter().any(|existing| existing == &candidate) {
        list.push(candidate);
    }
}
