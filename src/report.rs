use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Confidence, Forecast, LocationStat, StaffMetric, Trend};

pub struct ReportInput<'a> {
    pub forecast_since: NaiveDate,
    pub hotspot_since: NaiveDate,
    pub forecast: &'a Forecast,
    pub hotspots: &'a [LocationStat],
    pub staff: &'a [StaffMetric],
    pub staff_names: &'a HashMap<Uuid, String>,
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Low => "low",
        Confidence::Medium => "medium",
        Confidence::High => "high",
    }
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# EcoCampus Waste Report");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Tomorrow's Forecast");
    let _ = writeln!(output, "Based on daily totals since {}.", input.forecast_since);

    let forecast = input.forecast;
    match (&forecast.reason, forecast.trend, &forecast.growth_rate) {
        (Some(reason), _, _) => {
            let _ = writeln!(
                output,
                "- No forecast ({reason}); confidence {}",
                confidence_label(forecast.confidence)
            );
        }
        (None, Some(trend), Some(growth)) => {
            let direction = match trend {
                Trend::Increasing => "increasing",
                Trend::Decreasing => "decreasing",
            };
            let _ = writeln!(
                output,
                "- Expected {:.2} kg ({} confidence), trend {direction} at {growth} kg/day",
                forecast.prediction,
                confidence_label(forecast.confidence)
            );
        }
        _ => {
            let _ = writeln!(output, "- Expected {:.2} kg", forecast.prediction);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hotspots");
    let _ = writeln!(output, "Events since {}.", input.hotspot_since);

    if input.hotspots.is_empty() {
        let _ = writeln!(output, "No waste reported in this window.");
    } else {
        for stat in input.hotspots.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: heat index {} across {} reports ({} kg)",
                stat.location_id, stat.heat_index, stat.event_frequency, stat.total_mass
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Staff Efficiency");

    if input.staff.is_empty() {
        let _ = writeln!(output, "No tasks have been assigned yet.");
    } else {
        for metric in input.staff {
            let name = input
                .staff_names
                .get(&metric.staff_id)
                .map(String::as_str)
                .unwrap_or("unknown staff");
            let _ = writeln!(
                output,
                "- {name}: {}% completed, avg response {} h",
                metric.completion_rate, metric.avg_response_time
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::predict_next_day;
    use crate::models::{DataPoint, ResponseTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    #[test]
    fn renders_every_section() {
        let forecast = predict_next_day(&[
            DataPoint {
                day_index: 0,
                quantity: 10.0,
            },
            DataPoint {
                day_index: 1,
                quantity: 20.0,
            },
        ]);
        let hotspots = vec![LocationStat {
            location_id: "Main Canteen".to_string(),
            event_frequency: 3,
            total_mass: "48.90".to_string(),
            heat_index: "32.60".to_string(),
        }];
        let staff_id = Uuid::new_v4();
        let staff = vec![StaffMetric {
            staff_id,
            completion_rate: "50.0".to_string(),
            avg_response_time: ResponseTime::Hours("3.0".to_string()),
        }];
        let names = HashMap::from([(staff_id, "Grace Mwangi".to_string())]);

        let report = build_report(&ReportInput {
            forecast_since: day(),
            hotspot_since: day(),
            forecast: &forecast,
            hotspots: &hotspots,
            staff: &staff,
            staff_names: &names,
        });

        assert!(report.contains(
            "Expected 30.00 kg (high confidence), trend increasing at 10.00 kg/day"
        ));
        assert!(report.contains("- Main Canteen: heat index 32.60 across 3 reports (48.90 kg)"));
        assert!(report.contains("- Grace Mwangi: 50.0% completed, avg response 3.0 h"));
    }

    #[test]
    fn empty_windows_say_so() {
        let forecast = predict_next_day(&[]);
        let names = HashMap::new();
        let report = build_report(&ReportInput {
            forecast_since: day(),
            hotspot_since: day(),
            forecast: &forecast,
            hotspots: &[],
            staff: &[],
            staff_names: &names,
        });

        assert!(report.contains("No forecast (Insufficient data); confidence low"));
        assert!(report.contains("No waste reported in this window."));
        assert!(report.contains("No tasks have been assigned yet."));
    }
}
