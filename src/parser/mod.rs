// HTML parsing for finn.no search result pages and single listing pages.

use scraper::{ElementRef, Selector};

pub mod detail;
pub mod listing;

pub use detail::parse_car_detail;
pub use listing::{parse_listings, parse_listings_with_base};

/// Origin used to absolutize site-relative listing links.
pub const DEFAULT_BASE_URL: &str = "https://www.finn.no";

// Only called with literal selectors from the Lazy statics below each parser
fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector '{css}': {e:?}"))
}

/// All text below `element`, whitespace collapsed to single spaces.
fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty_text(element: ElementRef) -> Option<String> {
    Some(element_text(element)).filter(|t| !t.is_empty())
}

/// The trimmed, non-empty text nodes below `element`, in document order.
fn text_fragments(element: ElementRef) -> Vec<String> {
    element
        .text()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect()
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element.children().filter_map(ElementRef::wrap)
}

fn parent_element(element: ElementRef) -> Option<ElementRef> {
    element.parent().and_then(ElementRef::wrap)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
