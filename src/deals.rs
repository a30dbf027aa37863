// Filtering and value ranking of listings.

use crate::models::{CarRecord, DealCriteria, DealResult, ScoredCar};

/// Number of listings returned by `find_best_deals`.
pub const MAX_DEALS: usize = 5;

const NO_MATCHES_MESSAGE: &str = "No cars match the criteria";

impl DealCriteria {
    /// Inclusive bounds; a car missing a filtered field does not match that filter.
    pub fn matches(&self, car: &CarRecord) -> bool {
        let within = |bound: Option<u64>, value: Option<u64>| bound.is_none_or(|b| value.is_some_and(|v| v <= b));
        within(self.max_price, car.price_amount())
            && within(self.max_mileage, car.mileage)
            && self.min_year.is_none_or(|min| car.year.is_some_and(|y| y >= min))
    }
}

/// Heuristic 0–9 value score: usage, age and price per km each add 1–3 points when
/// the underlying field is known.
pub fn value_score(car: &CarRecord) -> u8 {
    let usage = car.km_per_year.map(|km| tier(km, 15_000.0, 20_000.0));
    let age = car.age.map(|a| tier(f64::from(a), 3.0, 5.0));
    let price_efficiency = car.price_per_km().map(|ppk| tier(ppk, 2.0, 3.0));

    [usage, age, price_efficiency].into_iter().flatten().sum()
}

fn tier(value: f64, best_below: f64, good_below: f64) -> u8 {
    if value < best_below {
        3
    } else if value < good_below {
        2
    } else {
        1
    }
}

/// Keeps unsold listings that pass `criteria` and returns the highest scoring ones.
/// Equal scores keep their input order.
pub fn find_best_deals(cars: &[CarRecord], criteria: DealCriteria) -> DealResult {
    let mut matches: Vec<ScoredCar> = cars
        .iter()
        .filter(|car| !car.is_sold() && criteria.matches(car))
        .map(|car| ScoredCar {
            value_score: value_score(car),
            car: car.clone(),
        })
        .collect();

    let total_matches = matches.len();
    tracing::debug!(total = cars.len(), total_matches, ?criteria, "Filtered deals");

    // sort_by is stable
    matches.sort_by(|a, b| b.value_score.cmp(&a.value_score));
    matches.truncate(MAX_DEALS);

    DealResult {
        best_deals: matches,
        total_matches,
        criteria_applied: criteria,
        message: (total_matches == 0).then(|| NO_MATCHES_MESSAGE.to_string()),
    }
}
