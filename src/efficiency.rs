use std::collections::HashMap;

use uuid::Uuid;

use crate::fixed::to_fixed;
use crate::models::{ResponseTime, StaffMetric, TaskTiming};

#[derive(Debug, Clone, Default)]
struct StaffTally {
    total: usize,
    completed: usize,
    total_time: f64,
}

/// Per-staff completion rate and mean response time, in first-seen order.
pub fn calculate_efficiency(tasks: &[TaskTiming]) -> Vec<StaffMetric> {
    let mut positions: HashMap<Uuid, usize> = HashMap::new();
    let mut tallies: Vec<(Uuid, StaffTally)> = Vec::new();

    for task in tasks {
        let index = *positions.entry(task.staff_id).or_insert_with(|| {
            tallies.push((task.staff_id, StaffTally::default()));
            tallies.len() - 1
        });
        let tally = &mut tallies[index].1;
        tally.total += 1;
        if task.status.is_done() {
            tally.completed += 1;
            if let Some(hours) = task.response_time_hrs {
                tally.total_time += hours;
            }
        }
    }

    tallies
        .into_iter()
        .map(|(staff_id, tally)| StaffMetric {
            staff_id,
            completion_rate: to_fixed(
                tally.completed as f64 / tally.total as f64 * 100.0,
                1,
            ),
            avg_response_time: if tally.completed > 0 {
                ResponseTime::Hours(to_fixed(tally.total_time / tally.completed as f64, 1))
            } else {
                ResponseTime::Zero(0)
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    fn timing(staff_id: Uuid, status: TaskStatus, hours: Option<f64>) -> TaskTiming {
        TaskTiming {
            staff_id,
            status,
            response_time_hrs: hours,
        }
    }

    #[test]
    fn averages_only_finished_work() {
        let s1 = Uuid::new_v4();
        let tasks = vec![
            timing(s1, TaskStatus::Completed, Some(2.0)),
            timing(s1, TaskStatus::Completed, Some(4.0)),
            timing(s1, TaskStatus::Assigned, None),
        ];

        let metrics = calculate_efficiency(&tasks);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].completion_rate, "66.7");
        assert_eq!(
            metrics[0].avg_response_time,
            ResponseTime::Hours("3.0".to_string())
        );
    }

    #[test]
    fn idle_staff_report_literal_zero() {
        let staff = Uuid::new_v4();
        let metrics = calculate_efficiency(&[
            timing(staff, TaskStatus::Assigned, Some(9.0)),
            timing(staff, TaskStatus::InProgress, None),
        ]);
        assert_eq!(metrics[0].completion_rate, "0.0");
        assert_eq!(metrics[0].avg_response_time, ResponseTime::Zero(0));

        let json = serde_json::to_value(&metrics[0]).unwrap();
        assert_eq!(json["avg_response_time"], serde_json::json!(0));
        assert_eq!(json["completion_rate"], serde_json::json!("0.0"));
    }

    #[test]
    fn verified_counts_as_completed_and_missing_times_are_skipped() {
        let staff = Uuid::new_v4();
        let metrics = calculate_efficiency(&[
            timing(staff, TaskStatus::Verified, Some(5.0)),
            timing(staff, TaskStatus::Completed, None),
        ]);
        assert_eq!(metrics[0].completion_rate, "100.0");
        assert_eq!(
            metrics[0].avg_response_time,
            ResponseTime::Hours("2.5".to_string())
        );
    }

    #[test]
    fn keeps_first_seen_staff_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let metrics = calculate_efficiency(&[
            timing(b, TaskStatus::Completed, Some(1.0)),
            timing(a, TaskStatus::Completed, Some(1.0)),
            timing(b, TaskStatus::Assigned, None),
        ]);
        let order: Vec<_> = metrics.iter().map(|m| m.staff_id).collect();
        assert_eq!(order, vec![b, a]);
        assert_eq!(metrics[0].completion_rate, "50.0");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(calculate_efficiency(&[]).is_empty());
    }
}
