// Exponential depreciation projection for a single listing.

use crate::{
    error::AnalysisError,
    models::{CarRecord, DepreciationProjection, YearProjection},
};

/// Share of value lost each year.
pub const ANNUAL_DEPRECIATION_RATE: f64 = 0.15;

/// Longest projection horizon accepted, in years.
pub const MAX_YEARS_AHEAD: u32 = 50;

const MODEL_DESCRIPTION: &str = "Exponential depreciation at 15% annually";

/// Projects the value of `car` for each of the next `years_ahead` years.
///
/// Fails with `InvalidInput` when the listing has no numeric price (missing or sold),
/// when `years_ahead` exceeds `MAX_YEARS_AHEAD`, or when the projected age does not
/// fit a `u32`. A missing age is treated as a new car.
pub fn project_depreciation(car: &CarRecord, years_ahead: u32) -> Result<DepreciationProjection, AnalysisError> {
    let current_price = car.price_amount().ok_or_else(|| {
        AnalysisError::InvalidInput("Invalid price data for depreciation calculation".to_string())
    })?;
    if years_ahead > MAX_YEARS_AHEAD {
        return Err(AnalysisError::InvalidInput(format!(
            "years_ahead must be at most {MAX_YEARS_AHEAD}, got {years_ahead}"
        )));
    }
    let current_age = car.age.unwrap_or(0);
    // Every future_age below is at most this
    current_age
        .checked_add(years_ahead)
        .ok_or_else(|| AnalysisError::InvalidInput(format!("Car age {current_age} is out of range")))?;
    let price = current_price as f64;

    let predictions = (1..=years_ahead)
        .map(|year| {
            let factor = (1.0 - ANNUAL_DEPRECIATION_RATE).powi(year as i32);
            let predicted = price * factor;
            YearProjection {
                year,
                future_age: current_age + year,
                predicted_value: predicted.round() as i64,
                value_loss: (price - predicted).round() as i64,
                depreciation_rate_percent: ((1.0 - factor) * 1000.0).round() / 10.0,
            }
        })
        .collect();

    Ok(DepreciationProjection {
        car_info: car.clone(),
        current_price,
        predictions,
        model_used: MODEL_DESCRIPTION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;

    fn priced(price: Option<Price>, age: Option<u32>) -> CarRecord {
        CarRecord {
            id: 1,
            name: "Toyota Corolla".to_string(),
            link: None,
            image_url: None,
            additional_info: None,
            year: None,
            mileage: None,
            price,
            age,
            km_per_year: None,
        }
    }

    #[test]
    fn first_year_loses_fifteen_percent() {
        let projection = project_depreciation(&priced(Some(Price::Amount(100_000)), Some(0)), 1).unwrap();
        assert_eq!(projection.current_price, 100_000);
        assert_eq!(projection.model_used, MODEL_DESCRIPTION);
        assert_eq!(
            projection.predictions,
            vec![YearProjection {
                year: 1,
                future_age: 1,
                predicted_value: 85_000,
                value_loss: 15_000,
                depreciation_rate_percent: 15.0,
            }]
        );
    }

    #[test]
    fn compounds_over_several_years() {
        let projection = project_depreciation(&priced(Some(Price::Amount(200_000)), Some(4)), 3).unwrap();
        let values: Vec<_> = projection.predictions.iter().map(|p| p.predicted_value).collect();
        assert_eq!(values, vec![170_000, 144_500, 122_825]);

        let third = &projection.predictions[2];
        assert_eq!(third.future_age, 7);
        assert_eq!(third.value_loss, 77_175);
        assert_eq!(third.depreciation_rate_percent, 38.6);
        assert!(projection.predictions.windows(2).all(|w| w[0].predicted_value > w[1].predicted_value));
    }

    #[test]
    fn missing_age_counts_as_new() {
        let projection = project_depreciation(&priced(Some(Price::Amount(50_000)), None), 2).unwrap();
        assert_eq!(projection.predictions[0].future_age, 1);
        assert_eq!(projection.predictions[1].future_age, 2);
    }

    #[test]
    fn zero_years_gives_no_predictions() {
        let projection = project_depreciation(&priced(Some(Price::Amount(50_000)), Some(2)), 0).unwrap();
        assert!(projection.predictions.is_empty());
    }

    #[test]
    fn horizon_is_bounded() {
        let car = priced(Some(Price::Amount(100_000)), Some(1));
        let projection = project_depreciation(&car, MAX_YEARS_AHEAD).unwrap();
        assert_eq!(projection.predictions.len(), MAX_YEARS_AHEAD as usize);
        assert!(projection.predictions.iter().all(|p| p.predicted_value >= 0));

        let err = project_depreciation(&car, 4_000_000_000).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
        assert!(matches!(project_depreciation(&car, MAX_YEARS_AHEAD + 1), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn huge_age_is_rejected_instead_of_overflowing() {
        let err = project_depreciation(&priced(Some(Price::Amount(100_000)), Some(u32::MAX)), 1).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));

        // No years ahead means nothing is added to the age
        let projection = project_depreciation(&priced(Some(Price::Amount(100_000)), Some(u32::MAX)), 0).unwrap();
        assert!(projection.predictions.is_empty());
    }

    #[test]
    fn sold_or_unpriced_cars_are_rejected() {
        for price in [Some(Price::Sold), None] {
            let err = project_depreciation(&priced(price, Some(3)), 3).unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidInput(_)));
            assert_eq!(err.to_string(), "Invalid price data for depreciation calculation");
        }
    }
}
