//! MIME type utilities
//!
//! Content-Type inspection for captured responses and content type guessing
//! for uploaded form files.

use mime::Mime;

/// Fallback content type for files of unknown type
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Whether a Content-Type declares a JSON body (`application/json`, `*/*+json`)
///
/// # Examples
/// ```
/// use openrequest::mime::is_json_content_type;
/// assert!(is_json_content_type("application/json; charset=utf-8"));
/// assert!(!is_json_content_type("text/html"));
/// ```
pub fn is_json_content_type(header: &str) -> bool {
    match header.parse::<Mime>() {
        Ok(m) => m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON),
        Err(_) => header.to_ascii_lowercase().contains("json"),
    }
}

/// Get content type for a filename using mime_guess
pub fn get_content_type(filename: &str) -> Option<String> {
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.to_string())
}
