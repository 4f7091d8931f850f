use std::collections::HashMap;

use crate::fixed::{round_to, to_fixed};
use crate::models::{HotspotEvent, LocationStat, Severity};

pub const CRITICAL_WEIGHT: u32 = 3;
pub const HIGH_WEIGHT: u32 = 2;
pub const BASE_WEIGHT: u32 = 1;

pub fn severity_weight(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => CRITICAL_WEIGHT,
        Severity::High => HIGH_WEIGHT,
        Severity::Normal | Severity::Low => BASE_WEIGHT,
    }
}

#[derive(Debug, Clone, Default)]
struct LocationAccumulator {
    count: usize,
    weight: f64,
    score: u32,
}

impl LocationAccumulator {
    /// Severity-weighted average mass. Only built from at least one event,
    /// so `count` is never zero here.
    fn heat_index(&self) -> f64 {
        self.score as f64 * (self.weight / self.count as f64)
    }
}

/// Ranks locations by heat index, highest first. Locations with equal
/// heat index keep the order in which they were first seen.
pub fn detect_hotspots(events: &[HotspotEvent]) -> Vec<LocationStat> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, LocationAccumulator)> = Vec::new();

    for event in events {
        let index = *positions
            .entry(event.location_id.as_str())
            .or_insert_with(|| {
                groups.push((event.location_id.as_str(), LocationAccumulator::default()));
                groups.len() - 1
            });
        let entry = &mut groups[index].1;
        entry.count += 1;
        entry.weight += event.quantity_kg;
        entry.score += severity_weight(event.severity);
    }

    let mut ranked: Vec<(f64, LocationStat)> = groups
        .into_iter()
        .map(|(location_id, acc)| {
            let heat = round_to(acc.heat_index(), 2);
            (
                heat,
                LocationStat {
                    location_id: location_id.to_string(),
                    event_frequency: acc.count,
                    total_mass: to_fixed(acc.weight, 2),
                    heat_index: to_fixed(heat, 2),
                },
            )
        })
        .collect();

    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    ranked.into_iter().map(|(_, stat)| stat).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(location: &str, severity: Severity, quantity_kg: f64) -> HotspotEvent {
        HotspotEvent {
            location_id: location.to_string(),
            severity,
            quantity_kg,
        }
    }

    #[test]
    fn ranks_by_severity_weighted_average_mass() {
        let events = vec![
            event("A", Severity::Critical, 10.0),
            event("A", Severity::Normal, 5.0),
            event("B", Severity::High, 8.0),
        ];

        let stats = detect_hotspots(&events);
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].location_id, "A");
        assert_eq!(stats[0].event_frequency, 2);
        assert_eq!(stats[0].total_mass, "15.00");
        assert_eq!(stats[0].heat_index, "30.00");

        assert_eq!(stats[1].location_id, "B");
        assert_eq!(stats[1].event_frequency, 1);
        assert_eq!(stats[1].total_mass, "8.00");
        assert_eq!(stats[1].heat_index, "16.00");
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let events = vec![
            event("Library", Severity::Low, 4.0),
            event("Hostel C", Severity::High, 2.0),
            event("Canteen", Severity::Normal, 4.0),
        ];
        let order: Vec<_> = detect_hotspots(&events)
            .into_iter()
            .map(|stat| stat.location_id)
            .collect();
        assert_eq!(order, vec!["Library", "Hostel C", "Canteen"]);
    }

    #[test]
    fn low_and_normal_share_the_base_weight() {
        assert_eq!(severity_weight(Severity::Low), BASE_WEIGHT);
        assert_eq!(severity_weight(Severity::Normal), BASE_WEIGHT);
        assert_eq!(severity_weight(Severity::Critical), CRITICAL_WEIGHT);
    }

    #[test]
    fn empty_input_yields_no_hotspots() {
        assert!(detect_hotspots(&[]).is_empty());
    }

    #[test]
    fn output_is_stable_across_runs() {
        let events = vec![
            event("Lab 2", Severity::Critical, 1.25),
            event("Gym", Severity::High, 3.3),
            event("Lab 2", Severity::Low, 0.4),
        ];
        assert_eq!(detect_hotspots(&events), detect_hotspots(&events));
    }
}
