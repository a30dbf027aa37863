//! Single listing ("detail") page parser.
//!
//! The page is split into `<section>`s whose headings are in Norwegian or English.
//! Description, specifications and equipment are each pulled from the matching
//! section; when no section yields specifications or equipment, a keyword scan over
//! the whole page text is used instead.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::{char_len, element_text, non_empty_text, selector};
use crate::models::CarDetail;

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| selector("h1"));
static MAIN_SEL: Lazy<Selector> = Lazy::new(|| selector("main"));
static SECTION_SEL: Lazy<Selector> = Lazy::new(|| selector("section"));
static SECTION_HEADING_SEL: Lazy<Selector> = Lazy::new(|| selector("h2, h3, h4"));
static PARAGRAPH_SEL: Lazy<Selector> = Lazy::new(|| selector("p"));
static DIV_SEL: Lazy<Selector> = Lazy::new(|| selector("div"));
static NESTED_SEL: Lazy<Selector> = Lazy::new(|| selector("div, span, p"));
static DL_SEL: Lazy<Selector> = Lazy::new(|| selector("dl"));
static DT_SEL: Lazy<Selector> = Lazy::new(|| selector("dt"));
static DD_SEL: Lazy<Selector> = Lazy::new(|| selector("dd"));
static TABLE_ROW_SEL: Lazy<Selector> = Lazy::new(|| selector("table tr"));
static CELL_SEL: Lazy<Selector> = Lazy::new(|| selector("td, th"));
static LIST_ITEM_SEL: Lazy<Selector> = Lazy::new(|| selector("ul li, ol li"));

const DESCRIPTION_HEADER: &str = "beskrivelse";

const SPEC_KEYWORDS: [&str; 12] = [
    "motor", "drivstoff", "girkasse", "hjuldrift", "årsmodell", "kilometer",
    "effekt", "sylindre", "co2", "forbruk", "toppfart", "acceleration",
];

const EQUIPMENT_KEYWORDS: [&str; 27] = [
    "klimaanlegg", "aircondition", "cruisecontrol", "navigasjon", "gps",
    "bluetooth", "dab", "radio", "cd", "mp3", "usb", "aux",
    "elektriske", "oppvarming", "kjøling", "automatisk", "manuell",
    "sportsseter", "skinnseter", "elektrisk", "parkeringssensor",
    "ryggekamera", "xenon", "led", "tåkelys", "metallic", "felger",
];

static SPEC_PATTERNS: Lazy<Vec<(String, Regex)>> = Lazy::new(|| {
    SPEC_KEYWORDS
        .iter()
        .map(|kw| {
            let re = Regex::new(&format!(r"(?i){}[:\s]*([^\n\r,]+)", regex::escape(kw)))
                .expect("valid specification keyword regex");
            (capitalize(kw), re)
        })
        .collect()
});

static EQUIPMENT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    EQUIPMENT_KEYWORDS
        .iter()
        .map(|kw| {
            let re = Regex::new(&format!(r"([^.\n]*{}[^.\n]*)", regex::escape(kw)))
                .expect("valid equipment keyword regex");
            (*kw, re)
        })
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Description,
    Specifications,
    Equipment,
}

impl SectionKind {
    fn classify(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if text.contains("beskrivelse") || text.contains("description") {
            Some(Self::Description)
        } else if text.contains("spesifikasjoner") || text.contains("specifications") {
            Some(Self::Specifications)
        } else if text.contains("utstyr") || text.contains("equipment") {
            Some(Self::Equipment)
        } else {
            None
        }
    }

    /// Heading text decides first; sections without a telling heading are judged by
    /// their whole text.
    fn of(section: ElementRef) -> Option<Self> {
        section
            .select(&SECTION_HEADING_SEL)
            .next()
            .and_then(|h| Self::classify(&element_text(h)))
            .or_else(|| Self::classify(&element_text(section)))
    }
}

pub fn parse_car_detail(markup: &str, url: &str) -> CarDetail {
    let document = Html::parse_document(markup);

    let mut detail = CarDetail {
        url: url.to_string(),
        title: document.select(&TITLE_SEL).next().and_then(non_empty_text),
        ..Default::default()
    };

    if let Some(main) = document.select(&MAIN_SEL).next() {
        for section in main.select(&SECTION_SEL) {
            match SectionKind::of(section) {
                Some(SectionKind::Description) => {
                    if let Some(description) = description_from_section(section) {
                        detail.description = Some(description);
                    }
                }
                Some(SectionKind::Specifications) => {
                    detail.specifications.extend(specifications_from_section(section));
                }
                Some(SectionKind::Equipment) => {
                    detail.equipment.extend(equipment_from_section(section));
                }
                None => {}
            }
        }
    } else {
        debug!(url, "Detail page has no <main>, only keyword fallbacks apply");
    }

    if detail.specifications.is_empty() || detail.equipment.is_empty() {
        let page_text: String = document.root_element().text().collect();
        if detail.specifications.is_empty() {
            detail.specifications = specifications_from_text(&page_text);
        }
        if detail.equipment.is_empty() {
            detail.equipment = equipment_from_text(&page_text);
        }
    }

    debug!(
        url,
        specs = detail.specifications.len(),
        equipment = detail.equipment.len(),
        has_description = detail.description.is_some(),
        "Parsed detail page"
    );
    detail
}

fn is_description_header(text: &str) -> bool {
    text.eq_ignore_ascii_case(DESCRIPTION_HEADER)
}

fn description_from_section(section: ElementRef) -> Option<String> {
    let paragraphs: Vec<String> = section
        .select(&PARAGRAPH_SEL)
        .map(element_text)
        .filter(|t| !t.is_empty() && !is_description_header(t))
        .collect();

    let description = if !paragraphs.is_empty() {
        Some(paragraphs.join(" "))
    } else {
        // Plain-text div with at most a couple of inline children
        section
            .select(&DIV_SEL)
            .find(|div| {
                let text = element_text(*div);
                char_len(&text) > 20 && !is_description_header(&text) && div.select(&NESTED_SEL).count() <= 2
            })
            .map(element_text)
            .or_else(|| {
                let all_text = element_text(section);
                let headed = all_text
                    .get(..DESCRIPTION_HEADER.len())
                    .is_some_and(is_description_header);
                if headed {
                    Some(all_text[DESCRIPTION_HEADER.len()..].trim().to_string())
                } else if char_len(&all_text) > 20 {
                    Some(all_text)
                } else {
                    None
                }
            })
    };

    description.filter(|d| char_len(d) > 10)
}

fn specifications_from_section(section: ElementRef) -> BTreeMap<String, String> {
    let mut specs = BTreeMap::new();
    let mut insert = |key: String, value: String| {
        if !key.is_empty() && !value.is_empty() {
            specs.insert(key, value);
        }
    };

    for dl in section.select(&DL_SEL) {
        let keys = dl.select(&DT_SEL).map(element_text);
        let values = dl.select(&DD_SEL).map(element_text);
        for (key, value) in keys.zip(values) {
            insert(key, value);
        }
    }

    for row in section.select(&TABLE_ROW_SEL) {
        let mut cells = row.select(&CELL_SEL).map(element_text);
        if let (Some(key), Some(value)) = (cells.next(), cells.next()) {
            insert(key, value);
        }
    }

    // Label/value rendered as sibling divs. Wrapper divs are left out so that the
    // pairs line up.
    let leaf_divs: Vec<String> = section
        .select(&DIV_SEL)
        .filter(|div| div.select(&DIV_SEL).next().is_none())
        .map(element_text)
        .collect();
    for pair in leaf_divs.chunks_exact(2) {
        let (key, value) = (&pair[0], &pair[1]);
        if char_len(key) < 50 && char_len(value) < 200 && !key.contains(':') {
            insert(key.clone(), value.clone());
        }
    }

    specs
}

fn equipment_from_section(section: ElementRef) -> BTreeSet<String> {
    let mut equipment: BTreeSet<String> = section
        .select(&LIST_ITEM_SEL)
        .map(element_text)
        .filter(|t| !t.is_empty() && char_len(t) < 100)
        .collect();

    equipment.extend(
        section
            .select(&DIV_SEL)
            .map(element_text)
            .filter(|t| looks_like_equipment_item(t)),
    );
    equipment
}

fn looks_like_equipment_item(text: &str) -> bool {
    !text.is_empty()
        && text.split_whitespace().count() <= 5
        && char_len(text) < 50
        && !text.chars().take(10).any(|c| c.is_ascii_digit())
}

fn specifications_from_text(page_text: &str) -> BTreeMap<String, String> {
    SPEC_PATTERNS
        .iter()
        .filter_map(|(label, re)| {
            let value = re.captures(page_text)?.get(1)?.as_str().trim().to_string();
            Some((label.clone(), value))
        })
        .collect()
}

fn equipment_from_text(page_text: &str) -> BTreeSet<String> {
    let lowered = page_text.to_lowercase();
    EQUIPMENT_PATTERNS
        .iter()
        .filter(|(keyword, _)| lowered.contains(*keyword))
        .flat_map(|(_, re)| re.find_iter(&lowered))
        .map(|m| m.as_str().trim())
        .filter(|item| (11..50).contains(&char_len(item)))
        .map(capitalize)
        .collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
