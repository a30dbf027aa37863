// Turns the raw strings pulled out of a listing into typed record fields.
// Everything here is pure so it can be tested without any markup.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{CarRecord, Price};

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19[0-9]{2}|20[0-9]{2})\b").expect("valid year regex"));
static MILEAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9][0-9\s.,]*\s*km)\b").expect("valid mileage regex"));
static DIGIT_GROUPS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,3}( [0-9]{3})*$").expect("valid digit group regex"));
static NEXT_GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{3}\b").expect("valid digit group regex"));

/// Raw listing fields as found in the markup, before any interpretation.
#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub name: Option<String>,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub additional_info: Option<String>,
    /// Text fragments of the secondary detail line ("2021 ∙ 45 000 km ∙ ...").
    pub details: Vec<String>,
    pub price_text: Option<String>,
}

impl RawListing {
    /// Builds the record, or `None` when no name was found.
    pub fn into_record(self, id: u32, reference_year: i32) -> Option<CarRecord> {
        let name = self.name.filter(|n| !n.is_empty())?;

        let details = merge_split_numbers(&self.details);
        let year = first_match(&details, parse_year);
        let mileage = first_match(&details, parse_mileage);
        let age = year.map(|y| compute_age(y, reference_year));
        let km_per_year = match (mileage, age) {
            (Some(m), Some(a)) => Some(km_per_year(m, a)),
            _ => None,
        };
        let price = self.price_text.as_deref().and_then(parse_price);

        Some(CarRecord {
            id,
            name,
            link: self.link,
            image_url: self.image_url,
            additional_info: self.additional_info,
            year,
            mileage,
            price,
            age,
            km_per_year,
        })
    }
}

// Re-attaches digit groups that inline markup split into separate text nodes, so
// "<b>12</b> 500 km" reads as "12 500 km". Only a fragment made of digit groups joins
// the next one, and only when that one starts with a three digit group.
fn merge_split_numbers(fragments: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let continues_number = NEXT_GROUP_RE.is_match(fragment)
            && merged.last().is_some_and(|previous| DIGIT_GROUPS_RE.is_match(previous));
        match merged.last_mut() {
            Some(previous) if continues_number => {
                previous.push(' ');
                previous.push_str(fragment);
            }
            _ => merged.push(fragment.clone()),
        }
    }
    merged
}

// Tries each fragment on its own first, then the fragments joined together in case a
// value was split across several text nodes.
fn first_match<T>(fragments: &[String], parse: fn(&str) -> Option<T>) -> Option<T> {
    fragments
        .iter()
        .find_map(|f| parse(f))
        .or_else(|| parse(&fragments.join(" ")))
}

pub fn parse_year(text: &str) -> Option<i32> {
    YEAR_RE.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Reads "45 000 km" style values, any separators inside the number are dropped.
pub fn parse_mileage(text: &str) -> Option<u64> {
    let raw = MILEAGE_RE.captures(text)?.get(1)?.as_str();
    digits_only(raw)?.parse().ok()
}

/// Price text is either the sold label or a formatted amount like "249 900 kr".
pub fn parse_price(text: &str) -> Option<Price> {
    if text.to_lowercase().contains("solgt") {
        return Some(Price::Sold);
    }
    digits_only(text)?.parse::<u64>().ok().filter(|amount| *amount > 0).map(Price::Amount)
}

pub fn compute_age(year: i32, reference_year: i32) -> u32 {
    // Next year's models can show up before new year
    u32::try_from(reference_year - year).unwrap_or(0)
}

/// A car that is not yet a year old reports its full mileage.
pub fn km_per_year(mileage: u64, age: u32) -> f64 {
    if age == 0 {
        mileage as f64
    } else {
        mileage as f64 / age as f64
    }
}

fn digits_only(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}
