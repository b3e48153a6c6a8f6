// Logo location and download for fetched candidate pages.
//
// Location is a pure, ordered heuristic chain over the page HTML. Download
// walks that list until one URL returns a usable image. A page without a
// logo is a normal outcome and leaves the candidate untouched.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::fetch::get_with_timeout;
use crate::transport::HttpTransport;
use crate::types::Candidate;

/// Which heuristic produced a logo URL, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogoSource {
    /// Company-logo markup used by business-profile sites.
    ProfileMarkup,
    /// Image inside the header, navbar or an element classed as logo/brand.
    HeaderImage,
    /// Image whose alt text names the company or says "logo".
    AltText,
    OpenGraph,
    Favicon,
    DefaultFavicon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoCandidate {
    pub url: String,
    pub source: LogoSource,
}

const PROFILE_MARKUP_SELECTORS: &[&str] = &[
    r#"img[data-delayed-url*="company-logo"]"#,
    ".org-top-card-primary-content__logo-container img",
    "img.org-top-card-primary-content__logo",
    r#"img[class*="entity-image"]"#,
];

const HEADER_SELECTORS: &[&str] = &[
    "header img",
    "nav img",
    ".navbar-brand img",
    r#"[class*="logo"] img"#,
    r#"img[class*="logo"]"#,
    r#"img[id*="logo"]"#,
    r#"[class*="brand"] img"#,
];

/// Tokens that say nothing about which company a name refers to.
const NAME_STOPWORDS: &[&str] = &[
    "inc", "llc", "ltd", "pvt", "private", "limited", "corp", "corporation", "company", "gmbh",
    "plc", "the", "and",
];

/// Image attributes that may carry the real source; lazy-loaders park it in data-*.
const SRC_ATTRS: &[&str] = &["data-delayed-url", "data-src", "src"];

/// Ordered, deduplicated logo URLs found in `html`, resolved against `page_url`.
pub fn locate_logos(html: &str, page_url: &str, company_name: &str) -> Vec<LogoCandidate> {
    let base = match Url::parse(page_url) {
        Ok(u) => u,
        Err(_) => return Vec::new(),
    };
    let document = Html::parse_document(html);
    let tokens = name_tokens(company_name);

    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |raw: &str, source: LogoSource| {
        if let Some(url) = resolve_image_url(&base, raw) {
            if seen.insert(url.clone()) {
                debug!(url = %url, ?source, "Located logo candidate");
                found.push(LogoCandidate { url, source });
            }
        }
    };

    for css in PROFILE_MARKUP_SELECTORS {
        for img in select_all(&document, css) {
            if let Some(src) = image_src(&img) {
                push(src, LogoSource::ProfileMarkup);
            }
        }
    }

    for css in HEADER_SELECTORS {
        for img in select_all(&document, css) {
            if let Some(src) = image_src(&img) {
                push(src, LogoSource::HeaderImage);
            }
        }
    }

    for img in select_all(&document, "img[alt]") {
        let alt = img.value().attr("alt").unwrap_or_default().to_lowercase();
        let names_company = tokens.iter().any(|t| alt.contains(t.as_str()));
        if alt.contains("logo") || names_company {
            if let Some(src) = image_src(&img) {
                push(src, LogoSource::AltText);
            }
        }
    }

    for meta in select_all(&document, r#"meta[property="og:image"], meta[name="og:image"]"#) {
        if let Some(content) = meta.value().attr("content") {
            push(content, LogoSource::OpenGraph);
        }
    }

    // apple-touch-icon first: it is usually the largest raster icon on the page
    let icons: Vec<(bool, &str)> = select_all(&document, "link[rel][href]")
        .filter_map(|link| {
            let rel = link.value().attr("rel")?.to_lowercase();
            let href = link.value().attr("href")?;
            let tokens: Vec<&str> = rel.split_whitespace().collect();
            if tokens.contains(&"apple-touch-icon") {
                Some((true, href))
            } else if tokens.contains(&"icon") {
                Some((false, href))
            } else {
                None
            }
        })
        .collect();
    for apple_first in [true, false] {
        for &(apple, href) in &icons {
            if apple == apple_first {
                push(href, LogoSource::Favicon);
            }
        }
    }

    push("/favicon.ico", LogoSource::DefaultFavicon);

    found
}

/// Locate and download the logo of a fetched candidate. Tries at most
/// `max_attempts` located URLs and keeps the first that returns image bytes.
pub async fn extract_logo(
    transport: &dyn HttpTransport,
    candidate: &mut Candidate,
    company_name: &str,
    max_attempts: usize,
    timeout: Duration,
) {
    let html = match candidate.content() {
        Ok(html) => html,
        Err(_) => return,
    };
    let located = locate_logos(html, &candidate.url, company_name);

    for logo in located.into_iter().take(max_attempts) {
        match get_with_timeout(transport, &logo.url, timeout).await {
            Ok(resp) if resp.is_success() && !resp.body.is_empty() && resp.looks_like_image() => {
                info!(
                    page = %candidate.url,
                    logo = %logo.url,
                    source = ?logo.source,
                    bytes = resp.body.len(),
                    "Logo downloaded"
                );
                candidate.logo_url = Some(logo.url);
                candidate.logo_image = Some(Arc::from(resp.body));
                return;
            }
            Ok(resp) => {
                debug!(logo = %logo.url, status = resp.status, "Logo URL did not return an image");
            }
            Err(e) => {
                debug!(logo = %logo.url, error = %e, "Logo download failed");
            }
        }
    }

    debug!(page = %candidate.url, "No logo found");
}

fn select_all<'a>(document: &'a Html, css: &str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let selector = Selector::parse(css).ok();
    let matches: Vec<ElementRef<'a>> = match &selector {
        Some(s) => document.select(s).collect(),
        None => Vec::new(),
    };
    matches.into_iter()
}

fn image_src<'a>(img: &ElementRef<'a>) -> Option<&'a str> {
    SRC_ATTRS
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Absolute http(s) URL for an image reference, skipping inline data and SVG
/// (vector logos cannot be rasterized for comparison).
fn resolve_image_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") || raw.starts_with("blob:") {
        return None;
    }
    let resolved = base.join(raw).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    if resolved.path().to_lowercase().ends_with(".svg") {
        return None;
    }
    Some(resolved.to_string())
}

/// Lowercase name tokens of three or more characters, minus legal suffixes.
fn name_tokens(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3 && !NAME_STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}
