//! Locating the real image behind an HTML landing page.
//!
//! Each [`ExtractionStrategy`] is a pure function of the page markup and the
//! page URL. [`extract_image_url`] tries them in [`ExtractionStrategy::ORDERED`]
//! order and returns the first hit.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use super::url::normalize_candidate;

// Quoted attribute values may contain `>`.
static META_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid regex")
});
static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid regex")
});
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid regex")
});

/// `id` attributes screenshot services put on the main image.
const SCREENSHOT_IDS: &[&str] = &["screenshot-image"];
/// `class` tokens screenshot services put on the main image.
const SCREENSHOT_CLASSES: &[&str] = &["screenshot"];
/// Markers identifying screenshot hosts in an `<img>` tag or its `src`.
const SCREENSHOT_HOST_MARKERS: &[&str] = &["prntscr.com", "lightshot"];
/// Substrings of `src` values that point at UI chrome rather than content.
const DECORATION_MARKERS: &[&str] = &["icon", "logo", "button"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// `<meta property="og:image" content="...">`
    OgImage,
    /// `<meta name="twitter:image" content="...">`
    TwitterImage,
    /// An `<img>` marked up the way known screenshot hosts do it.
    KnownHost,
    /// The first `<img src>`, unless it is inline data or page decoration.
    FirstPlausibleImage,
}

impl ExtractionStrategy {
    pub const ORDERED: [Self; 4] = [
        Self::OgImage,
        Self::TwitterImage,
        Self::KnownHost,
        Self::FirstPlausibleImage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::OgImage => "og:image",
            Self::TwitterImage => "twitter:image",
            Self::KnownHost => "known-host",
            Self::FirstPlausibleImage => "first-plausible-img",
        }
    }

    pub fn apply(self, html: &str, page_url: &Url) -> Option<Url> {
        let candidate = match self {
            Self::OgImage => meta_content(html, "og:image"),
            Self::TwitterImage => meta_content(html, "twitter:image"),
            Self::KnownHost => known_host_image(html),
            Self::FirstPlausibleImage => first_plausible_image(html),
        }?;
        normalize_candidate(&candidate, page_url)
    }
}

/// Run every strategy in priority order and return the first image URL found.
pub fn extract_image_url(html: &str, page_url: &Url) -> Option<(ExtractionStrategy, Url)> {
    ExtractionStrategy::ORDERED
        .into_iter()
        .find_map(|strategy| strategy.apply(html, page_url).map(|url| (strategy, url)))
}

fn attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or(caps.get(3)).or(caps.get(4))?.as_str();
            Some((name, decode_entities(value)))
        })
        .collect()
}

fn meta_content(html: &str, key: &str) -> Option<String> {
    META_TAG.find_iter(html).find_map(|tag| {
        let attrs = attributes(tag.as_str());
        let names_key = ["property", "name"]
            .iter()
            .any(|attr| attrs.get(*attr).is_some_and(|v| v.eq_ignore_ascii_case(key)));
        if !names_key {
            return None;
        }
        attrs
            .get("content")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// `(full tag, src)` for every `<img>` that has a non-empty `src`.
fn images(html: &str) -> impl Iterator<Item = (&str, String)> {
    IMG_TAG.find_iter(html).filter_map(|tag| {
        let src = attributes(tag.as_str()).remove("src")?.trim().to_string();
        (!src.is_empty()).then_some((tag.as_str(), src))
    })
}

fn known_host_image(html: &str) -> Option<String> {
    images(html).find_map(|(tag, src)| {
        let attrs = attributes(tag);
        let by_id = attrs
            .get("id")
            .is_some_and(|id| SCREENSHOT_IDS.contains(&id.as_str()));
        let by_class = attrs.get("class").is_some_and(|class| {
            class
                .split_ascii_whitespace()
                .any(|token| SCREENSHOT_CLASSES.contains(&token))
        });
        let tag_lower = tag.to_ascii_lowercase();
        let by_host = SCREENSHOT_HOST_MARKERS
            .iter()
            .any(|marker| tag_lower.contains(marker) || src.contains(marker));

        (by_id || by_class || by_host).then_some(src)
    })
}

/// Only the first image is considered; a page whose first image is chrome
/// has no plausible fallback.
fn first_plausible_image(html: &str) -> Option<String> {
    let (_, src) = images(html).next()?;
    let lower = src.to_ascii_lowercase();
    if lower.starts_with("data:") || DECORATION_MARKERS.iter().any(|m| lower.contains(m)) {
        return None;
    }
    Some(src)
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x2F;", "/")
        .replace("&#47;", "/")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#38;", "&")
        .replace("&amp;", "&")
}
