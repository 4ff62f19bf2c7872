use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

/// Hour from which an assignment due the same day counts as after hours.
pub const AFTER_HOURS_START: u32 = 18;

/// SLA risk of a service order, from the time left between assignment and
/// deadline. Variants are ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskLabel {
    Unassigned,
    AfterHoursSameDay,
    Emergency,
    Red,
    Yellow,
    Ok,
    Over24h,
}

impl RiskLabel {
    pub const ALL: [RiskLabel; 7] = [
        RiskLabel::Unassigned,
        RiskLabel::AfterHoursSameDay,
        RiskLabel::Emergency,
        RiskLabel::Red,
        RiskLabel::Yellow,
        RiskLabel::Ok,
        RiskLabel::Over24h,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskLabel::Unassigned => "unassigned",
            RiskLabel::AfterHoursSameDay => "after_hours_same_day",
            RiskLabel::Emergency => "<=1h",
            RiskLabel::Red => "1-6h",
            RiskLabel::Yellow => "6-12h",
            RiskLabel::Ok => "12-24h",
            RiskLabel::Over24h => ">24h",
        }
    }

    pub fn tier(self) -> &'static str {
        match self {
            RiskLabel::Unassigned => "UNASSIGNED",
            RiskLabel::AfterHoursSameDay => "AFTER_HOURS_SAME_DAY",
            RiskLabel::Emergency => "EMERGENCY",
            RiskLabel::Red => "RED",
            RiskLabel::Yellow => "YELLOW",
            RiskLabel::Ok | RiskLabel::Over24h => "OK",
        }
    }

    /// Accepts either the fine label or the tier name.
    pub fn parse(value: &str) -> Option<RiskLabel> {
        let value = value.trim();
        RiskLabel::ALL
            .into_iter()
            .find(|label| label.label() == value || label.tier().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify_risk(
    assigned_at: Option<NaiveDateTime>,
    deadline: Option<NaiveDateTime>,
) -> RiskLabel {
    let (Some(assigned_at), Some(deadline)) = (assigned_at, deadline) else {
        return RiskLabel::Unassigned;
    };

    if assigned_at.date() == deadline.date() && assigned_at.hour() >= AFTER_HOURS_START {
        return RiskLabel::AfterHoursSameDay;
    }

    classify_hours(hours_between(assigned_at, deadline))
}

/// Threshold rules on the hours left until the deadline.
pub fn classify_hours(hours: f64) -> RiskLabel {
    if hours > 24.0 {
        RiskLabel::Over24h
    } else if hours <= 1.0 {
        RiskLabel::Emergency
    } else if hours < 6.0 {
        RiskLabel::Red
    } else if hours < 12.0 {
        RiskLabel::Yellow
    } else {
        RiskLabel::Ok
    }
}

pub fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

/// Bucket of elapsed days between creation and assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AssignmentDelay {
    SameDay,
    OneDay,
    TwoDays,
    ThreeDays,
    FourToFiveDays,
    SixToSevenDays,
    EightToFourteenDays,
    OverFourteenDays,
}

impl AssignmentDelay {
    pub fn label(self) -> &'static str {
        match self {
            AssignmentDelay::SameDay => "same day",
            AssignmentDelay::OneDay => "1 day",
            AssignmentDelay::TwoDays => "2 days",
            AssignmentDelay::ThreeDays => "3 days",
            AssignmentDelay::FourToFiveDays => "4-5 days",
            AssignmentDelay::SixToSevenDays => "6-7 days",
            AssignmentDelay::EightToFourteenDays => "8-14 days",
            AssignmentDelay::OverFourteenDays => ">14 days",
        }
    }
}

impl fmt::Display for AssignmentDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Negative elapsed time (assignment logged before creation) lands in
/// `SameDay`.
pub fn classify_delay(days: f64) -> AssignmentDelay {
    if days <= 0.0 {
        AssignmentDelay::SameDay
    } else if days <= 1.0 {
        AssignmentDelay::OneDay
    } else if days <= 2.0 {
        AssignmentDelay::TwoDays
    } else if days <= 3.0 {
        AssignmentDelay::ThreeDays
    } else if days <= 5.0 {
        AssignmentDelay::FourToFiveDays
    } else if days <= 7.0 {
        AssignmentDelay::SixToSevenDays
    } else if days <= 14.0 {
        AssignmentDelay::EightToFourteenDays
    } else {
        AssignmentDelay::OverFourteenDays
    }
}
