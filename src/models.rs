// Data structures shared by the parsers, the analysis functions and the API.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Label finn.no prints instead of a price once a car is sold.
pub const SOLD_LABEL: &str = "Solgt";

/// Asking price of a listing.
///
/// A missing or unparseable price is modelled as `Option::<Price>::None` on the
/// record, so the sold-sentinel stays distinct from "no price".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Price {
    Amount(u64),
    Sold,
}

impl Price {
    pub fn amount(&self) -> Option<u64> {
        match self {
            Price::Amount(value) => Some(*value),
            Price::Sold => None,
        }
    }

    pub fn is_sold(&self) -> bool {
        matches!(self, Price::Sold)
    }

    /// Lenient conversion used for records coming back in from API callers.
    /// A zero amount is not a price and decodes as absent.
    fn from_json(value: &serde_json::Value) -> Option<Price> {
        let price = match value {
            serde_json::Value::Number(n) => n.as_u64().map(Price::Amount).or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| Price::Amount(f.round() as u64))
            }),
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case(SOLD_LABEL) || trimmed.eq_ignore_ascii_case("sold") {
                    Some(Price::Sold)
                } else {
                    trimmed.parse::<u64>().ok().map(Price::Amount)
                }
            }
            _ => None,
        };
        price.filter(|p| *p != Price::Amount(0))
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Price::Amount(value) => serializer.serialize_u64(*value),
            Price::Sold => serializer.serialize_str(SOLD_LABEL),
        }
    }
}

// Unknown shapes (e.g. "ring for pris") decode as an absent price instead of failing
// the whole record.
fn deserialize_price<'de, D>(deserializer: D) -> Result<Option<Price>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Price::from_json))
}

// Represents a single listing found on a search results page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarRecord {
    #[serde(default)]
    pub id: u32, // Only meaningful within one parse/fetch call
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub mileage: Option<u64>, // Kilometres
    #[serde(default, deserialize_with = "deserialize_price")]
    pub price: Option<Price>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub km_per_year: Option<f64>,
}

impl CarRecord {
    /// Numeric asking price, `None` for sold or unpriced listings.
    pub fn price_amount(&self) -> Option<u64> {
        self.price.and_then(|p| p.amount())
    }

    pub fn is_sold(&self) -> bool {
        self.price.is_some_and(|p| p.is_sold())
    }

    /// Price divided by mileage, only defined for a numeric price and mileage > 0.
    pub fn price_per_km(&self) -> Option<f64> {
        let price = self.price_amount()?;
        let mileage = self.mileage.filter(|m| *m > 0)?;
        Some(price as f64 / mileage as f64)
    }
}

// Represents detailed information extracted from a single listing page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarDetail {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub specifications: BTreeMap<String, String>,
    pub equipment: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Basic,
    Detailed,
    /// Accepted for compatibility, currently reports the same fields as `Basic`.
    Investment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Mileage summary with the same keys as a pandas `describe()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MileageDistribution {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>, // Sample standard deviation, undefined for a single value
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub q50: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailedStats {
    pub mileage_distribution: Option<MileageDistribution>,
    pub year_distribution: BTreeMap<i32, usize>,
    pub price_per_km: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSummary {
    pub total_cars: usize,
    pub available_cars: usize,
    pub sold_cars: usize,
    pub avg_price: Option<f64>,
    pub median_price: Option<f64>,
    pub price_range: PriceRange,
    pub avg_mileage: Option<f64>,
    pub avg_age: Option<f64>,
    #[serde(flatten)]
    pub detailed: Option<DetailedStats>, // Only filled in detailed mode
}

// Filter thresholds for the deal ranking, all inclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DealCriteria {
    pub max_price: Option<u64>,
    pub max_mileage: Option<u64>,
    pub min_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCar {
    #[serde(flatten)]
    pub car: CarRecord,
    pub value_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealResult {
    pub best_deals: Vec<ScoredCar>,
    pub total_matches: usize,
    pub criteria_applied: DealCriteria,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearProjection {
    pub year: u32, // Years ahead of today
    pub future_age: u32,
    pub predicted_value: i64,
    pub value_loss: i64,
    pub depreciation_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepreciationProjection {
    pub car_info: CarRecord,
    pub current_price: u64,
    pub predictions: Vec<YearProjection>,
    pub model_used: String,
}
