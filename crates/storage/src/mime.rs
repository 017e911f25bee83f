//! Content-type inference from object keys.

/// Infer a MIME type from a key's extension.
///
/// Unknown or missing extensions fall back to
/// `application/octet-stream`.
#[must_use]
pub fn content_type_for_key(key: &str) -> &'static str {
    let extension = key
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("json") => "application/json",
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("shots/0.png", "image/png")]
    #[case("a/b/photo.JPG", "image/jpeg")]
    #[case("photo.jpeg", "image/jpeg")]
    #[case("report.json", "application/json")]
    #[case("report.html", "text/html")]
    #[case("style.css", "text/css")]
    #[case("app.js", "application/javascript")]
    #[case("doc.pdf", "application/pdf")]
    #[case("rows.csv", "text/csv")]
    #[case("notes.txt", "text/plain")]
    fn known_extensions(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(content_type_for_key(key), expected);
    }

    #[rstest]
    #[case("binary.dat")]
    #[case("no-extension")]
    #[case("dir.with.dots/file")]
    fn unknown_extensions_fall_back(#[case] key: &str) {
        assert_eq!(content_type_for_key(key), "application/octet-stream");
    }
}
