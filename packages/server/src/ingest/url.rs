use reqwest::Url;

/// Resolve an image reference found in a page against the page's URL.
///
/// - `//host/img.png` takes the `https` scheme.
/// - `/img.png` is joined to the page origin.
/// - Any other reference without a scheme is treated as a path under the
///   page origin, not under the page's directory.
pub fn normalize_candidate(candidate: &str, page_url: &Url) -> Option<Url> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let absolute = if let Some(rest) = candidate.strip_prefix("//") {
        format!("https://{rest}")
    } else if candidate.starts_with('/') {
        format!("{}{candidate}", origin(page_url)?)
    } else if has_scheme(candidate) {
        candidate.to_string()
    } else {
        format!("{}/{candidate}", origin(page_url)?)
    };

    Url::parse(&absolute).ok()
}

fn origin(url: &Url) -> Option<String> {
    let origin = url.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}

fn has_scheme(candidate: &str) -> bool {
    match candidate.split_once(':') {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
