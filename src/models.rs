use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Generates `as_str`, `Display` and a case-insensitive `FromStr` for a
/// text-backed enum. Parsing also accepts `_`/`-` in place of spaces so
/// CLI values like `in_progress` resolve to "In Progress".
macro_rules! text_enum {
    ($name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let wanted = normalize_label(value);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| normalize_label(candidate.as_str()) == wanted)
                    .ok_or_else(|| {
                        CoreError::validation(format!("unknown {}: {value:?}", $label))
                    })
            }
        }
    };
}

fn normalize_label(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '_' | '-' => ' ',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteCategory {
    Wet,
    Dry,
    Recyclable,
    #[serde(rename = "E-waste")]
    EWaste,
    Hazardous,
}

text_enum!(WasteCategory, "waste category" {
    Wet => "Wet",
    Dry => "Dry",
    Recyclable => "Recyclable",
    EWaste => "E-waste",
    Hazardous => "Hazardous",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Normal,
    High,
    Critical,
}

text_enum!(Severity, "severity" {
    Low => "Low",
    Normal => "Normal",
    High => "High",
    Critical => "Critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

text_enum!(Priority, "priority" {
    Low => "Low",
    Normal => "Normal",
    High => "High",
    Urgent => "Urgent",
});

/// Lifecycle of a reported waste log. Variants are declared in lifecycle
/// order so `Ord` reflects forward progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WasteLogStatus {
    Reported,
    Assigned,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Verified,
}

text_enum!(WasteLogStatus, "waste log status" {
    Reported => "Reported",
    Assigned => "Assigned",
    InProgress => "In Progress",
    Completed => "Completed",
    Verified => "Verified",
});

/// Lifecycle of a cleanup task, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Created,
    Assigned,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Verified,
}

text_enum!(TaskStatus, "task status" {
    Created => "Created",
    Assigned => "Assigned",
    InProgress => "In Progress",
    Completed => "Completed",
    Verified => "Verified",
});

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        self == TaskStatus::Verified
    }

    /// Completed and Verified both count as finished work.
    pub fn is_done(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Verified)
    }
}

impl From<TaskStatus> for WasteLogStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Created => WasteLogStatus::Reported,
            TaskStatus::Assigned => WasteLogStatus::Assigned,
            TaskStatus::InProgress => WasteLogStatus::InProgress,
            TaskStatus::Completed => WasteLogStatus::Completed,
            TaskStatus::Verified => WasteLogStatus::Verified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Staff,
    BlockAdmin,
    Admin,
}

text_enum!(Role, "role" {
    Student => "student",
    Staff => "staff",
    BlockAdmin => "block_admin",
    Admin => "admin",
});

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WasteLog {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub location: String,
    pub category: WasteCategory,
    pub quantity_kg: f64,
    pub description: String,
    pub status: WasteLogStatus,
    pub severity: Severity,
    pub reported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub image_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub waste_log_id: Uuid,
    pub assigned_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub evidence: Evidence,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// One day of the trailing daily-total series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub day_index: i64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub prediction: f64,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A single waste event as seen by the hotspot detector.
#[derive(Debug, Clone, PartialEq)]
pub struct HotspotEvent {
    pub location_id: String,
    pub severity: Severity,
    pub quantity_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStat {
    pub location_id: String,
    pub event_frequency: usize,
    pub total_mass: String,
    pub heat_index: String,
}

/// Task timing row used for staff efficiency.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTiming {
    pub staff_id: Uuid,
    pub status: TaskStatus,
    pub response_time_hrs: Option<f64>,
}

/// Average response time is a one-decimal string when a staff member has
/// finished work, and the bare number `0` when they have not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseTime {
    Hours(String),
    Zero(u8),
}

impl fmt::Display for ResponseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseTime::Hours(hours) => f.write_str(hours),
            ResponseTime::Zero(zero) => write!(f, "{zero}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMetric {
    pub staff_id: Uuid,
    pub completion_rate: String,
    pub avg_response_time: ResponseTime,
}
