//! Search results page parser.
//!
//! finn.no does not put stable class names on the result grid, so the listings
//! container and most per-listing fields are found by position. Each field goes
//! through a short chain of strategies (positional path first, looser heuristic
//! second) and simply stays empty when nothing matches.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{DEFAULT_BASE_URL, child_elements, element_text, non_empty_text, parent_element, selector, text_fragments};
use crate::models::CarRecord;
use crate::normalize::RawListing;

static MAIN_SEL: Lazy<Selector> = Lazy::new(|| selector(r#"main[class*="page-container"]"#));
static CONTAINER_SEL: Lazy<Selector> =
    Lazy::new(|| selector("div:nth-of-type(1) > div:nth-of-type(2) > section > div:nth-of-type(3)"));
static ARTICLE_SEL: Lazy<Selector> = Lazy::new(|| selector("article"));

static INFO_SEL: Lazy<Selector> = Lazy::new(|| selector("div:nth-of-type(3)"));
static IMAGE_SEL: Lazy<Selector> = Lazy::new(|| selector("div:nth-of-type(2) > div > img"));
static ANY_IMAGE_SEL: Lazy<Selector> = Lazy::new(|| selector("img"));
static NAME_SEL: Lazy<Selector> = Lazy::new(|| selector("h2"));
static ANY_HEADING_SEL: Lazy<Selector> = Lazy::new(|| selector("h2, h3"));
static LINK_SEL: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static CAPTION_SEL: Lazy<Selector> = Lazy::new(|| selector("span.text-caption"));
static ANY_CAPTION_SEL: Lazy<Selector> = Lazy::new(|| selector(r#"[class*="caption"]"#));
static DETAILS_SEL: Lazy<Selector> = Lazy::new(|| selector("span:nth-of-type(2)"));
static ANY_SPAN_SEL: Lazy<Selector> = Lazy::new(|| selector("span"));
static PRICE_SEL: Lazy<Selector> = Lazy::new(|| selector("div:nth-of-type(1)"));
static ANY_PRICE_SEL: Lazy<Selector> = Lazy::new(|| selector(r#"[class*="price"]"#));

/// Parses one search results page, resolving relative links against finn.no.
pub fn parse_listings(markup: &str, reference_year: i32) -> Vec<CarRecord> {
    parse_listings_with_base(markup, reference_year, DEFAULT_BASE_URL)
}

/// Parses one search results page.
///
/// Ids are assigned 1.. in page order and only identify records within this call.
/// A page without a recognisable listings container yields no records.
pub fn parse_listings_with_base(markup: &str, reference_year: i32, base_url: &str) -> Vec<CarRecord> {
    let document = Html::parse_document(markup);

    let Some(container) = find_container(&document) else {
        debug!("Listings container not found, page has no parseable results");
        return Vec::new();
    };

    let mut cars = Vec::new();
    let mut skipped = 0usize;
    for candidate in child_elements(container) {
        let Some(article) = find_article(candidate) else {
            continue;
        };
        let raw = extract_raw_listing(article, base_url);
        match raw.into_record(cars.len() as u32 + 1, reference_year) {
            Some(car) => cars.push(car),
            None => skipped += 1,
        }
    }

    debug!(count = cars.len(), skipped, "Parsed listings page");
    cars
}

fn find_container(document: &Html) -> Option<ElementRef<'_>> {
    let main = document.select(&MAIN_SEL).next()?;
    main.select(&CONTAINER_SEL).next().or_else(|| {
        // Layout moved: every result is wrapped once, so the grid is the grandparent
        // of any listing article.
        debug!("Positional container path failed, falling back to article ancestry");
        let article = main.select(&ARTICLE_SEL).next()?;
        parent_element(article).and_then(parent_element)
    })
}

fn find_article(candidate: ElementRef<'_>) -> Option<ElementRef<'_>> {
    child_elements(candidate)
        .find(|c| c.value().name() == "article")
        .or_else(|| candidate.select(&ARTICLE_SEL).next())
}

fn extract_raw_listing(article: ElementRef, base_url: &str) -> RawListing {
    let info = article.select(&INFO_SEL).next();
    let scope = info.unwrap_or(article);

    let heading = scope
        .select(&NAME_SEL)
        .next()
        .or_else(|| article.select(&ANY_HEADING_SEL).next());

    let link = heading
        .and_then(|h| h.select(&LINK_SEL).next())
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_link(href, base_url));

    let additional_info = scope
        .select(&CAPTION_SEL)
        .next()
        .or_else(|| scope.select(&ANY_CAPTION_SEL).next())
        .and_then(non_empty_text);

    let details = match info.and_then(|i| i.select(&DETAILS_SEL).next()) {
        Some(details) => text_fragments(details),
        None => scope.select(&ANY_SPAN_SEL).flat_map(text_fragments).collect(),
    };

    let price_text = info
        .and_then(|i| i.select(&PRICE_SEL).next())
        .or_else(|| scope.select(&ANY_PRICE_SEL).next())
        .map(element_text);

    RawListing {
        name: heading.and_then(non_empty_text),
        link,
        image_url: image_url(article),
        additional_info,
        details,
        price_text,
    }
}

fn image_url(article: ElementRef) -> Option<String> {
    let img = article
        .select(&IMAGE_SEL)
        .next()
        .or_else(|| article.select(&ANY_IMAGE_SEL).next())?;
    let attr = |name| img.value().attr(name).filter(|v: &&str| !v.is_empty());
    attr("src").or_else(|| attr("data-src")).map(str::to_string)
}

/// Site-relative paths get the base origin, anything else is kept verbatim.
/// Protocol-relative hrefs ("//host/x") are treated as paths on the base origin too.
pub fn resolve_link(href: &str, base_url: &str) -> String {
    if !href.starts_with('/') {
        return href.to_string();
    }
    if href.starts_with("//") {
        return format!("{}{}", base_url.trim_end_matches('/'), href);
    }
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base_url.trim_end_matches('/'), href),
    }
}
