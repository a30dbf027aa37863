// Market statistics over a set of parsed listings.

use std::collections::BTreeMap;

use crate::models::{AnalysisMode, CarRecord, DetailedStats, MarketSummary, MileageDistribution, PriceRange};

/// Summarises a record set.
///
/// Every record that is not marked sold counts as available, including records
/// whose price is missing. Price statistics only use available records with a
/// numeric price; mileage and age averages use every record that has the field.
/// `Investment` mode currently reports the same fields as `Basic`.
pub fn analyze_market(cars: &[CarRecord], mode: AnalysisMode) -> MarketSummary {
    let available: Vec<&CarRecord> = cars.iter().filter(|c| !c.is_sold()).collect();
    let prices: Vec<f64> = available
        .iter()
        .filter_map(|c| c.price_amount())
        .map(|p| p as f64)
        .collect();
    let mileages: Vec<f64> = cars.iter().filter_map(|c| c.mileage).map(|m| m as f64).collect();
    let ages: Vec<f64> = cars.iter().filter_map(|c| c.age).map(f64::from).collect();

    let detailed = (mode == AnalysisMode::Detailed).then(|| DetailedStats {
        mileage_distribution: describe(&mileages),
        year_distribution: year_histogram(cars),
        price_per_km: mean(&available.iter().filter_map(|c| c.price_per_km()).collect::<Vec<_>>()),
    });

    MarketSummary {
        total_cars: cars.len(),
        available_cars: available.len(),
        sold_cars: cars.len() - available.len(),
        avg_price: mean(&prices),
        median_price: median(&prices),
        price_range: PriceRange {
            min: prices.iter().copied().reduce(f64::min),
            max: prices.iter().copied().reduce(f64::max),
        },
        avg_mileage: mean(&mileages),
        avg_age: mean(&ages),
        detailed,
    }
}

fn year_histogram(cars: &[CarRecord]) -> BTreeMap<i32, usize> {
    let mut histogram = BTreeMap::new();
    for year in cars.iter().filter_map(|c| c.year) {
        *histogram.entry(year).or_insert(0) += 1;
    }
    histogram
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn median(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| quantile(&sorted(values), 0.5))
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn describe(values: &[f64]) -> Option<MileageDistribution> {
    let mean = mean(values)?;
    let sorted = sorted(values);
    Some(MileageDistribution {
        count: values.len(),
        mean,
        std: sample_std(values, mean),
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        q50: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}
