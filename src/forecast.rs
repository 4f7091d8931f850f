use chrono::NaiveDate;

use crate::fixed::{round_to, to_fixed};
use crate::models::{Confidence, DataPoint, Forecast, Trend};

/// R² above this is a high-confidence fit.
pub const HIGH_CONFIDENCE_R2: f64 = 0.6;
/// R² above this (and up to the high threshold) is medium confidence.
pub const MEDIUM_CONFIDENCE_R2: f64 = 0.3;

pub const INSUFFICIENT_DATA: &str = "Insufficient data";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares over `(day_index, quantity)`.
///
/// A zero x-variance denominator yields a flat line through the mean with
/// R² = 0. A flat series (zero y-variance) also reports R² = 0.
pub fn fit_line(series: &[DataPoint]) -> LinearFit {
    let n = series.len() as f64;
    if series.is_empty() {
        return LinearFit {
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
        };
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for point in series {
        let x = point.day_index as f64;
        sum_x += x;
        sum_y += point.quantity;
        sum_xy += x * point.quantity;
        sum_xx += x * x;
    }

    let mean_y = sum_y / n;
    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return LinearFit {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 0.0,
        };
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    let (mut ss_res, mut ss_tot) = (0.0, 0.0);
    for point in series {
        let fitted = slope * point.day_index as f64 + intercept;
        ss_res += (point.quantity - fitted).powi(2);
        ss_tot += (point.quantity - mean_y).powi(2);
    }
    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    };

    LinearFit {
        slope,
        intercept,
        r_squared,
    }
}

pub fn confidence_for(r_squared: f64) -> Confidence {
    if r_squared > HIGH_CONFIDENCE_R2 {
        Confidence::High
    } else if r_squared > MEDIUM_CONFIDENCE_R2 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Predicts the quantity one day past the last observed index.
pub fn predict_next_day(series: &[DataPoint]) -> Forecast {
    if series.len() < 2 {
        return Forecast {
            prediction: 0.0,
            confidence: Confidence::Low,
            trend: None,
            growth_rate: None,
            reason: Some(INSUFFICIENT_DATA.to_string()),
        };
    }

    let fit = fit_line(series);
    let next_index = series.len() as f64;
    let raw = fit.slope * next_index + fit.intercept;

    Forecast {
        prediction: round_to(raw.max(0.0), 2),
        confidence: confidence_for(fit.r_squared),
        trend: Some(if fit.slope > 0.0 {
            Trend::Increasing
        } else {
            Trend::Decreasing
        }),
        growth_rate: Some(to_fixed(fit.slope, 2)),
        reason: None,
    }
}

/// Turns date-grouped totals (ascending) into a series indexed by row
/// position, the shape the daily-sum query produces.
pub fn series_from_daily_totals(totals: &[(NaiveDate, f64)]) -> Vec<DataPoint> {
    totals
        .iter()
        .enumerate()
        .map(|(index, (_, quantity))| DataPoint {
            day_index: index as i64,
            quantity: *quantity,
        })
        .collect()
}
