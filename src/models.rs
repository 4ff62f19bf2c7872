use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::risk::{AssignmentDelay, RiskLabel};

/// Logical columns of a service order export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    State,
    Region,
    Regional,
    Base,
    Acronym,
    Team,
    OrderType,
    OrderGroup,
    Status,
    CreatedAt,
    AssignedAt,
    Deadline,
    ServiceDate,
    Duration,
    Travel,
    Price,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::State,
        Field::Region,
        Field::Regional,
        Field::Base,
        Field::Acronym,
        Field::Team,
        Field::OrderType,
        Field::OrderGroup,
        Field::Status,
        Field::CreatedAt,
        Field::AssignedAt,
        Field::Deadline,
        Field::ServiceDate,
        Field::Duration,
        Field::Travel,
        Field::Price,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::State => "state",
            Field::Region => "region",
            Field::Regional => "regional",
            Field::Base => "base",
            Field::Acronym => "acronym",
            Field::Team => "team",
            Field::OrderType => "order_type",
            Field::OrderGroup => "order_group",
            Field::Status => "status",
            Field::CreatedAt => "created_at",
            Field::AssignedAt => "assigned_at",
            Field::Deadline => "deadline",
            Field::ServiceDate => "service_date",
            Field::Duration => "duration",
            Field::Travel => "travel",
            Field::Price => "price",
        }
    }

    pub fn parse(value: &str) -> Option<Field> {
        let value = value.trim().to_ascii_lowercase().replace('-', "_");
        Field::ALL.into_iter().find(|field| field.name() == value)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceOrder {
    /// Line in the source file, header being line 1.
    pub line: u64,
    pub state: String,
    pub region: String,
    pub regional: String,
    pub base: String,
    pub acronym: String,
    pub team: String,
    pub order_type: String,
    pub order_group: String,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
    pub assigned_at: Option<NaiveDateTime>,
    pub deadline: Option<NaiveDateTime>,
    pub service_date: Option<NaiveDate>,
    pub duration: Option<String>,
    pub travel: Option<String>,
    pub price: Option<f64>,
}

impl ServiceOrder {
    pub fn category(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::State => &self.state,
            Field::Region => &self.region,
            Field::Regional => &self.regional,
            Field::Base => &self.base,
            Field::Acronym => &self.acronym,
            Field::Team => &self.team,
            Field::OrderType => &self.order_type,
            Field::OrderGroup => &self.order_group,
            Field::Status => &self.status,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Rows of one input file plus the fields its header provided.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub path: PathBuf,
    pub columns: BTreeSet<Field>,
    pub orders: Vec<ServiceOrder>,
}

/// A service order with its computed fields. Lives for one pipeline run.
#[derive(Debug, Clone)]
pub struct DerivedOrder<'a> {
    pub order: &'a ServiceOrder,
    pub duration_hours: f64,
    pub travel_hours: f64,
    pub total_hours: f64,
    pub days_to_assignment: Option<f64>,
    pub hours_to_deadline: Option<f64>,
    pub risk: RiskLabel,
    pub delay: Option<AssignmentDelay>,
    pub day: Option<NaiveDate>,
    pub month: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub keys: Vec<String>,
    pub count: usize,
    pub mean_duration_hours: f64,
    pub mean_travel_hours: f64,
    pub mean_total_hours: f64,
    pub mean_days_to_assignment: f64,
    /// Over rows with both assignment and deadline.
    pub mean_hours_to_deadline: f64,
    pub total_price: f64,
    pub flagged_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionDay {
    pub region: String,
    pub day: NaiveDate,
    pub demand_hours: f64,
    pub unavailable_hours: f64,
    pub capacity_hours: f64,
    pub balance_hours: f64,
    pub overloaded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionCapacity {
    pub region: String,
    pub days: usize,
    pub mean_demand_hours: f64,
    pub mean_unavailable_hours: f64,
    pub mean_capacity_hours: f64,
    pub mean_balance_hours: f64,
    pub overload_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionFinance {
    pub region: String,
    pub days: usize,
    pub revenue: f64,
    pub productive_hours: f64,
    pub revenue_per_hour: f64,
    pub profit_per_hour: f64,
    pub mean_day_balance: f64,
    pub viable_day_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mobilization {
    Mobilize,
    DoNotMobilize,
}

impl fmt::Display for Mobilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mobilization::Mobilize => f.write_str("MOBILIZE"),
            Mobilization::DoNotMobilize => f.write_str("DO_NOT_MOBILIZE"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MobilizationDecision {
    pub region: String,
    pub mean_balance_hours: f64,
    pub overload_rate: f64,
    pub profit_per_hour: Option<f64>,
    pub decision: Mobilization,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueMetrics {
    pub region: String,
    pub orders: usize,
    pub days: usize,
    pub teams: usize,
    pub arrival_rate: f64,
    pub service_rate: f64,
    pub occupancy: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BottleneckRow {
    pub key: String,
    pub total: usize,
    pub daily_mean: f64,
    pub share_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Period {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub days: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bottlenecks {
    pub by_type: Vec<BottleneckRow>,
    pub by_group: Vec<BottleneckRow>,
    pub by_hour: [usize; 24],
    pub period: Option<Period>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxStats {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionalDistribution {
    pub regional: String,
    pub total_hours: BoxStats,
    pub duration_hours: BoxStats,
    pub travel_hours: BoxStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyMean {
    pub month: String,
    pub regional: String,
    pub mean_total_hours: f64,
    pub mean_duration_hours: f64,
    pub mean_travel_hours: f64,
}
