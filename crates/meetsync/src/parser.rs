use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};

use crate::types::PageMeta;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse URL: {0}")]
    UrlParse(String),
    #[error("Not a meetup.com group URL: {0}")]
    UnsupportedSeriesUrl(String),
}

static RE_SERIES_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.meetup\.com/([^/?]+)/?").expect("invalid regex: series url")
});

static RE_EVENT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.meetup\.com/[^/]+/events/(mbj[a-z]+|[0-9]+)/$")
        .expect("invalid regex: event url")
});

static SEL_HEAD_META: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("head > meta").expect("invalid selector: head meta"));

static SEL_HEAD_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("head > link").expect("invalid selector: head link"));

static SEL_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: anchor"));

/// Reads og:title, description, canonical link and image link from the page
/// head. Later tags win over earlier ones.
pub fn parse_page_meta(html: &str) -> PageMeta {
    let document = Html::parse_document(html);
    let mut meta = PageMeta::default();

    for element in document.select(&SEL_HEAD_META) {
        let el = element.value();
        let Some(content) = el.attr("content") else {
            continue;
        };
        if el.attr("property") == Some("og:title") {
            meta.og_title = Some(content.to_string());
        } else if el.attr("name") == Some("description") {
            meta.meta_description = Some(content.to_string());
        }
    }

    for element in document.select(&SEL_HEAD_LINK) {
        let el = element.value();
        let Some(href) = el.attr("href") else {
            continue;
        };
        match el.attr("rel") {
            Some("canonical") => meta.canonical_url = Some(href.to_string()),
            Some("image_src") => meta.image = Some(href.to_string()),
            _ => {}
        }
    }

    meta
}

/// Extracts the group slug from a series URL such as
/// `https://www.meetup.com/asociace-ux/`.
pub fn series_group(url: &str) -> Result<String, ParseError> {
    RE_SERIES_URL
        .captures(url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ParseError::UnsupportedSeriesUrl(url.to_string()))
}

pub fn is_event_url(url: &str) -> bool {
    RE_EVENT_URL.is_match(url)
}

/// Collects event detail URLs of `group` linked from a page, resolved against
/// `page_url`, without duplicates and in order of first appearance.
pub fn discover_event_urls(
    html: &str,
    page_url: &str,
    group: &str,
) -> Result<Vec<String>, ParseError> {
    let base = Url::parse(page_url).map_err(|e| ParseError::UrlParse(format!("{page_url}: {e}")))?;
    let marker = format!("/{group}/events/");
    let document = Html::parse_document(html);

    let mut urls: Vec<String> = Vec::new();
    for element in document.select(&SEL_ANCHOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let resolved = match base.join(href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                log::debug!("Skipping unresolvable link {:?}: {}", href, e);
                continue;
            }
        };
        if resolved.contains(&marker) && is_event_url(&resolved) && !urls.contains(&resolved) {
            urls.push(resolved);
        }
    }

    Ok(urls)
}
