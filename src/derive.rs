use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{DerivedOrder, ServiceOrder};
use crate::risk::{self, classify_delay, classify_risk};

/// `H:MM` or `H:MM:SS` to fractional hours. Anything else is zero.
pub fn duration_to_hours(raw: Option<&str>) -> f64 {
    raw.and_then(parse_clock).unwrap_or(0.0)
}

fn parse_clock(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = match parts.next() {
        Some(value) => value.trim().parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(hours as f64 + minutes as f64 / 60.0 + seconds / 3600.0)
}

fn days_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 86_400_000.0
}

/// Calendar day an order counts towards: service date, else assignment date.
fn reference_day(order: &ServiceOrder) -> Option<NaiveDate> {
    order
        .service_date
        .or_else(|| order.assigned_at.map(|ts| ts.date()))
}

pub fn derive_order(order: &ServiceOrder) -> DerivedOrder<'_> {
    let duration_hours = duration_to_hours(order.duration.as_deref());
    let travel_hours = duration_to_hours(order.travel.as_deref());

    let days_to_assignment = match (order.created_at, order.assigned_at) {
        (Some(created), Some(assigned)) => Some(days_between(created, assigned)),
        _ => None,
    };
    let hours_to_deadline = match (order.assigned_at, order.deadline) {
        (Some(assigned), Some(deadline)) => Some(risk::hours_between(assigned, deadline)),
        _ => None,
    };
    let day = reference_day(order);

    DerivedOrder {
        order,
        duration_hours,
        travel_hours,
        total_hours: duration_hours + travel_hours,
        days_to_assignment,
        hours_to_deadline,
        risk: classify_risk(order.assigned_at, order.deadline),
        delay: days_to_assignment.map(classify_delay),
        day,
        month: day.map(|d| d.format("%Y-%m").to_string()),
    }
}

/// Derives every row and logs how many duration cells fell back to zero.
pub fn derive_all(orders: &[ServiceOrder]) -> Vec<DerivedOrder<'_>> {
    let malformed = orders
        .iter()
        .flat_map(|order| [order.duration.as_deref(), order.travel.as_deref()])
        .filter(|raw| matches!(raw, Some(value) if parse_clock(value).is_none()))
        .count();
    if malformed > 0 {
        log::warn!("{malformed} duration/travel values could not be parsed and count as 0h");
    }

    orders.iter().map(derive_order).collect()
}
