//! Markup extractors for rendered catalog pages
//!
//! Both extractors are pure: they never fail and return an empty set when
//! nothing matches. URLs are returned byte-for-byte as found (product links
//! are prefixed with the site origin), with no normalization, so set
//! membership is plain string equality.

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Path prefix of product detail pages
const PRODUCT_PATH_PREFIX: &str = "/product/";

/// Product hrefs with this many `/`-separated segments or fewer are category
/// or listing stubs, not product pages
const MIN_PRODUCT_PATH_SEGMENTS: usize = 4;

/// Extracts product page URLs from a rendered search-result page
///
/// # Link Extraction Rules
///
/// - `<a href="...">` elements nested inside a `<div>`
/// - `href` starts with `/product/`
/// - `href` splits into more than four `/`-separated segments
///   (`/product/dkp-123/lamp-name/` qualifies, `/product/dkp-123/` does not)
/// - the result is `base_url` + `href`
///
/// # Example
///
/// ```
/// use catalog_harvest::crawler::extract_product_links;
///
/// let html = r#"<div><a href="/product/dkp-1/desk-lamp/">Lamp</a></div>"#;
/// let links = extract_product_links(html, "https://shop.example.com");
/// assert!(links.contains("https://shop.example.com/product/dkp-1/desk-lamp/"));
/// ```
pub fn extract_product_links(html: &str, base_url: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    let origin = base_url.trim_end_matches('/');

    let Ok(selector) = Selector::parse("div a[href]") else {
        return BTreeSet::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| is_product_path(href))
        .map(|href| format!("{}{}", origin, href))
        .collect()
}

fn is_product_path(href: &str) -> bool {
    href.starts_with(PRODUCT_PATH_PREFIX) && href.split('/').count() > MIN_PRODUCT_PATH_SEGMENTS
}

/// Extracts image URLs from the `<picture>` elements of a rendered product page
///
/// For every `<picture>`, the first `<source>` whose `type` equals `mime_type`
/// and whose `srcset` starts with an absolute http(s) URL contributes that URL.
/// Only the first candidate of a multi-candidate `srcset` is kept.
///
/// # Example
///
/// ```
/// use catalog_harvest::crawler::extract_image_sources;
///
/// let html = r#"<picture>
///     <source type="image/webp" srcset="https://cdn.example.com/a.webp">
///     <source type="image/jpeg" srcset="https://cdn.example.com/a.jpg">
/// </picture>"#;
/// let images = extract_image_sources(html, "image/jpeg");
/// assert_eq!(images.len(), 1);
/// assert!(images.contains("https://cdn.example.com/a.jpg"));
/// ```
pub fn extract_image_sources(html: &str, mime_type: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);

    let (Ok(picture_selector), Ok(source_selector)) = (
        Selector::parse("picture"),
        Selector::parse("source[type][srcset]"),
    ) else {
        return BTreeSet::new();
    };

    document
        .select(&picture_selector)
        .filter_map(|picture| first_matching_source(picture, &source_selector, mime_type))
        .collect()
}

fn first_matching_source(
    picture: ElementRef<'_>,
    source_selector: &Selector,
    mime_type: &str,
) -> Option<String> {
    picture.select(source_selector).find_map(|source| {
        let element = source.value();
        if element.attr("type")? != mime_type {
            return None;
        }
        first_srcset_candidate(element.attr("srcset")?)
    })
}

/// Returns the URL of the first `srcset` candidate if it is absolute http(s)
///
/// Commas inside the URL are kept (image CDNs put resize parameters there);
/// only a comma directly terminating the first token is treated as a
/// candidate separator.
fn first_srcset_candidate(srcset: &str) -> Option<String> {
    let token = srcset.split_whitespace().next()?;
    let candidate = token.strip_suffix(',').unwrap_or(token);

    match Url::parse(candidate) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            Some(candidate.to_string())
        }
        _ => None,
    }
}
