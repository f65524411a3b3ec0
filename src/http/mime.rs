//! MIME type detection based on file extensions.

use std::path::Path;

/// Content type for anything the table does not recognise.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Ordered suffix rules. Matching is exact and case-sensitive; the first hit
/// wins. New rules go at the end.
pub const MIME_TYPES: &[(&str, &str)] = &[
    (".js", "application/javascript"),
    (".html", "text/html"),
    (".css", "text/css"),
    (".jpg", "image/jpeg"),
];

/// Returns the content type for `path`.
///
/// # Example
///
/// ```
/// # use beacon::http::mime::mime_type_for;
/// assert_eq!(mime_type_for("site/index.html"), "text/html");
/// assert_eq!(mime_type_for("photo.JPG"), "application/octet-stream");
/// ```
pub fn mime_type_for(path: impl AsRef<Path>) -> &'static str {
    let path = path.as_ref().as_os_str().as_encoded_bytes();

    MIME_TYPES
        .iter()
        .find(|(suffix, _)| path.ends_with(suffix.as_bytes()))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}
