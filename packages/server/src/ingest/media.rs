/// `Accept` header for the first request; hosts vary their response by it.
pub const ACCEPT_PAGE_OR_IMAGE: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";

/// `Accept` header for fetching an image extracted from a page.
pub const ACCEPT_IMAGE: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

/// Allow-listed image types and their canonical file extensions.
const EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

const FALLBACK_EXTENSION: &str = "jpg";

/// How the pipeline treats a response, judged by its declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Image,
    Html,
    Other,
}

/// Lowercased media type without parameters, e.g. `"Image/PNG; q=1"` -> `"image/png"`.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn classify(content_type: Option<&str>) -> ContentKind {
    let Some(content_type) = content_type else {
        return ContentKind::Other;
    };
    let essence = essence(content_type);
    if essence.starts_with("image/") {
        ContentKind::Image
    } else if essence == "text/html" || essence == "application/xhtml+xml" {
        ContentKind::Html
    } else {
        ContentKind::Other
    }
}

/// Extension for a validated image type. Unknown image subtypes fall back to `jpg`.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = essence(content_type);
    EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .unwrap_or(FALLBACK_EXTENSION)
}
