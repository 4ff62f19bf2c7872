use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Timelike};

use crate::config::{CapacityScenario, FinanceParams, MobilizationPolicy};
use crate::filter::Dimension;
use crate::models::{
    BottleneckRow, Bottlenecks, BoxStats, DerivedOrder, GroupSummary, Mobilization,
    MobilizationDecision, MonthlyMean, Period, QueueMetrics, RegionCapacity, RegionDay,
    RegionFinance, RegionalDistribution,
};

/// `numerator / denominator`, or zero when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: &[f64]) -> f64 {
    ratio(values.iter().sum(), values.len() as f64)
}

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    duration: f64,
    travel: f64,
    total: f64,
    days: f64,
    days_count: usize,
    deadline_hours: f64,
    deadline_count: usize,
    price: f64,
    flagged: usize,
}

impl Accumulator {
    fn add(&mut self, order: &DerivedOrder<'_>, flagged: bool) {
        self.count += 1;
        self.duration += order.duration_hours;
        self.travel += order.travel_hours;
        self.total += order.total_hours;
        if let Some(days) = order.days_to_assignment {
            self.days += days;
            self.days_count += 1;
        }
        if let Some(hours) = order.hours_to_deadline {
            self.deadline_hours += hours;
            self.deadline_count += 1;
        }
        self.price += order.order.price.unwrap_or(0.0);
        if flagged {
            self.flagged += 1;
        }
    }
}

/// Groups orders by `keys` (in order) and reduces each group. Output is
/// sorted by count, largest first, ties by key.
pub fn summarize<F>(
    orders: &[DerivedOrder<'_>],
    keys: &[Dimension],
    flag: F,
) -> Vec<GroupSummary>
where
    F: Fn(&DerivedOrder<'_>) -> bool,
{
    let mut groups: BTreeMap<Vec<String>, Accumulator> = BTreeMap::new();
    for order in orders {
        let key = keys
            .iter()
            .map(|dimension| dimension.value(order).to_string())
            .collect();
        groups.entry(key).or_default().add(order, flag(order));
    }

    let mut summaries: Vec<GroupSummary> = groups
        .into_iter()
        .filter(|(_, acc)| acc.count > 0)
        .map(|(keys, acc)| {
            let count = acc.count as f64;
            GroupSummary {
                keys,
                count: acc.count,
                mean_duration_hours: ratio(acc.duration, count),
                mean_travel_hours: ratio(acc.travel, count),
                mean_total_hours: ratio(acc.total, count),
                mean_days_to_assignment: ratio(acc.days, acc.days_count as f64),
                mean_hours_to_deadline: ratio(acc.deadline_hours, acc.deadline_count as f64),
                total_price: acc.price,
                flagged_ratio: ratio(acc.flagged as f64, count),
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Demand against shift capacity for every (region, day) with orders.
pub fn region_days(orders: &[DerivedOrder<'_>], scenario: &CapacityScenario) -> Vec<RegionDay> {
    let mut days: BTreeMap<(String, NaiveDate), (f64, f64)> = BTreeMap::new();
    let mut undated = 0usize;

    for order in orders {
        let Some(day) = order.day else {
            undated += 1;
            continue;
        };
        let entry = days.entry((order.order.region.clone(), day)).or_default();
        if scenario.is_unavailable(&order.order.order_type) {
            entry.1 += order.duration_hours;
        } else {
            entry.0 += order.total_hours;
        }
    }

    if undated > 0 {
        log::debug!("{undated} orders without a service or assignment date left out of capacity");
    }

    days.into_iter()
        .map(|((region, day), (demand_hours, unavailable_hours))| {
            let capacity_hours =
                (scenario.shift_hours - unavailable_hours).max(0.0) * scenario.capacity_factor;
            let balance_hours = capacity_hours - demand_hours;
            RegionDay {
                region,
                day,
                demand_hours,
                unavailable_hours,
                capacity_hours,
                balance_hours,
                overloaded: balance_hours < 0.0,
            }
        })
        .collect()
}

pub fn region_capacity(days: &[RegionDay]) -> Vec<RegionCapacity> {
    let mut regions: BTreeMap<&str, Vec<&RegionDay>> = BTreeMap::new();
    for day in days {
        regions.entry(day.region.as_str()).or_default().push(day);
    }

    regions
        .into_iter()
        .map(|(region, days)| {
            let pick = |f: fn(&RegionDay) -> f64| -> f64 {
                mean(&days.iter().map(|&day| f(day)).collect::<Vec<_>>())
            };
            let overloaded = days.iter().filter(|day| day.overloaded).count();
            RegionCapacity {
                region: region.to_string(),
                days: days.len(),
                mean_demand_hours: pick(|d| d.demand_hours),
                mean_unavailable_hours: pick(|d| d.unavailable_hours),
                mean_capacity_hours: pick(|d| d.capacity_hours),
                mean_balance_hours: pick(|d| d.balance_hours),
                overload_rate: ratio(overloaded as f64, days.len() as f64),
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct FinanceDay<'a> {
    revenue: f64,
    productive_hours: f64,
    teams: BTreeSet<&'a str>,
}

pub fn region_finance(
    orders: &[DerivedOrder<'_>],
    scenario: &CapacityScenario,
    params: &FinanceParams,
) -> Vec<RegionFinance> {
    let mut days: BTreeMap<(&str, NaiveDate), FinanceDay<'_>> = BTreeMap::new();
    for order in orders {
        let Some(day) = order.day else {
            continue;
        };
        let entry = days.entry((order.order.region.as_str(), day)).or_default();
        entry.revenue += order.order.price.unwrap_or(0.0);
        if !scenario.is_unavailable(&order.order.order_type) {
            entry.productive_hours += order.total_hours;
        }
        if !order.order.team.is_empty() {
            entry.teams.insert(order.order.team.as_str());
        }
    }

    let daily_team_cost = params.hourly_team_cost * scenario.shift_hours;
    let mut regions: BTreeMap<&str, Vec<(f64, f64, f64)>> = BTreeMap::new();
    for ((region, _), day) in &days {
        let teams = day.teams.len().max(1) as f64;
        let balance = day.revenue - daily_team_cost * teams;
        regions
            .entry(*region)
            .or_default()
            .push((day.revenue, day.productive_hours, balance));
    }

    regions
        .into_iter()
        .map(|(region, days)| {
            let revenue: f64 = days.iter().map(|d| d.0).sum();
            let productive_hours: f64 = days.iter().map(|d| d.1).sum();
            let balances: Vec<f64> = days.iter().map(|d| d.2).collect();
            let viable = balances.iter().filter(|&&balance| balance > 0.0).count();
            let revenue_per_hour = ratio(revenue, productive_hours);
            RegionFinance {
                region: region.to_string(),
                days: days.len(),
                revenue,
                productive_hours,
                revenue_per_hour,
                profit_per_hour: revenue_per_hour - params.hourly_team_cost,
                mean_day_balance: mean(&balances),
                viable_day_ratio: ratio(viable as f64, days.len() as f64),
            }
        })
        .collect()
}

pub fn decide(
    mean_balance_hours: f64,
    overload_rate: f64,
    profit_per_hour: Option<f64>,
    policy: &MobilizationPolicy,
) -> Mobilization {
    let stressed = mean_balance_hours < 0.0 && overload_rate > policy.overload_threshold;
    let profitable = !policy.require_profit || profit_per_hour.is_some_and(|p| p > 0.0);
    if stressed && profitable {
        Mobilization::Mobilize
    } else {
        Mobilization::DoNotMobilize
    }
}

pub fn mobilization(
    capacity: &[RegionCapacity],
    finance: &[RegionFinance],
    policy: &MobilizationPolicy,
) -> Vec<MobilizationDecision> {
    let profits: BTreeMap<&str, f64> = finance
        .iter()
        .map(|f| (f.region.as_str(), f.profit_per_hour))
        .collect();

    capacity
        .iter()
        .map(|region| {
            let profit_per_hour = profits.get(region.region.as_str()).copied();
            MobilizationDecision {
                region: region.region.clone(),
                mean_balance_hours: region.mean_balance_hours,
                overload_rate: region.overload_rate,
                profit_per_hour,
                decision: decide(
                    region.mean_balance_hours,
                    region.overload_rate,
                    profit_per_hour,
                    policy,
                ),
            }
        })
        .collect()
}

pub fn queue_metrics(
    orders: &[DerivedOrder<'_>],
    scenario: &CapacityScenario,
) -> Vec<QueueMetrics> {
    #[derive(Default)]
    struct Arrivals<'a> {
        count: usize,
        total_hours: f64,
        days: BTreeSet<NaiveDate>,
        teams: BTreeSet<&'a str>,
    }

    let mut regions: BTreeMap<&str, Arrivals<'_>> = BTreeMap::new();
    for order in orders {
        if scenario.is_unavailable(&order.order.order_type) {
            continue;
        }
        let entry = regions.entry(order.order.region.as_str()).or_default();
        entry.count += 1;
        entry.total_hours += order.total_hours;
        if let Some(day) = order.day {
            entry.days.insert(day);
        }
        if !order.order.team.is_empty() {
            entry.teams.insert(order.order.team.as_str());
        }
    }

    regions
        .into_iter()
        .map(|(region, arrivals)| {
            let days = arrivals.days.len() as f64;
            let teams = arrivals.teams.len() as f64;
            let mean_hours = ratio(arrivals.total_hours, arrivals.count as f64);
            let arrival_rate = ratio(arrivals.count as f64, days);
            let service_rate = ratio(teams * scenario.shift_hours, mean_hours);
            QueueMetrics {
                region: region.to_string(),
                orders: arrivals.count,
                days: arrivals.days.len(),
                teams: arrivals.teams.len(),
                arrival_rate,
                service_rate,
                occupancy: ratio(arrival_rate, service_rate),
                utilization: ratio(arrivals.total_hours, days * teams * scenario.shift_hours),
            }
        })
        .collect()
}

fn bottleneck_rows(
    orders: &[DerivedOrder<'_>],
    dimension: Dimension,
    days: usize,
) -> Vec<BottleneckRow> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for order in orders {
        let value = dimension.value(order);
        if !value.is_empty() {
            *counts.entry(value).or_default() += 1;
        }
    }

    let grand_total: usize = counts.values().sum();
    let mut rows: Vec<BottleneckRow> = counts
        .into_iter()
        .map(|(key, total)| BottleneckRow {
            key: key.to_string(),
            total,
            daily_mean: round1(ratio(total as f64, days as f64)),
            share_percent: round1(ratio(total as f64, grand_total as f64) * 100.0),
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

/// Where assignments pile up: by order type, order group and hour of day.
pub fn bottlenecks(orders: &[DerivedOrder<'_>]) -> Bottlenecks {
    let assigned_days: BTreeSet<NaiveDate> = orders
        .iter()
        .filter_map(|order| order.order.assigned_at.map(|ts| ts.date()))
        .collect();

    let mut by_hour = [0usize; 24];
    for ts in orders.iter().filter_map(|order| order.order.assigned_at) {
        by_hour[ts.hour() as usize] += 1;
    }

    let period = match (assigned_days.first(), assigned_days.last()) {
        (Some(&first_day), Some(&last_day)) => Some(Period {
            first_day,
            last_day,
            days: assigned_days.len(),
            rows: orders.len(),
        }),
        _ => None,
    };

    Bottlenecks {
        by_type: bottleneck_rows(orders, Dimension::OrderType, assigned_days.len()),
        by_group: bottleneck_rows(orders, Dimension::OrderGroup, assigned_days.len()),
        by_hour,
        period,
    }
}

/// Linear-interpolation quantile over sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

pub fn box_stats(mut values: Vec<f64>) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(BoxStats {
        count: values.len(),
        min: values[0],
        q1: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q3: quantile(&values, 0.75),
        max: values[values.len() - 1],
    })
}

/// Spread of handling times per regional.
pub fn tma_distribution(orders: &[DerivedOrder<'_>]) -> Vec<RegionalDistribution> {
    let mut regionals: BTreeMap<&str, Vec<&DerivedOrder<'_>>> = BTreeMap::new();
    for order in orders {
        let regional = Dimension::Regional.value(order);
        if !regional.is_empty() {
            regionals.entry(regional).or_default().push(order);
        }
    }

    regionals
        .into_iter()
        .filter_map(|(regional, group)| {
            let collect = |f: fn(&DerivedOrder<'_>) -> f64| -> Vec<f64> {
                group.iter().map(|&order| f(order)).collect()
            };
            Some(RegionalDistribution {
                regional: regional.to_string(),
                total_hours: box_stats(collect(|o| o.total_hours))?,
                duration_hours: box_stats(collect(|o| o.duration_hours))?,
                travel_hours: box_stats(collect(|o| o.travel_hours))?,
            })
        })
        .collect()
}

/// Mean handling times per (month, regional), in month order.
pub fn monthly_evolution(orders: &[DerivedOrder<'_>]) -> Vec<MonthlyMean> {
    let mut groups: BTreeMap<(&str, &str), (usize, f64, f64, f64)> = BTreeMap::new();
    for order in orders {
        let (Some(month), regional) = (order.month.as_deref(), Dimension::Regional.value(order))
        else {
            continue;
        };
        if regional.is_empty() {
            continue;
        }
        let entry = groups.entry((month, regional)).or_default();
        entry.0 += 1;
        entry.1 += order.total_hours;
        entry.2 += order.duration_hours;
        entry.3 += order.travel_hours;
    }

    groups
        .into_iter()
        .map(|((month, regional), (count, total, duration, travel))| {
            let count = count as f64;
            MonthlyMean {
                month: month.to_string(),
                regional: regional.to_string(),
                mean_total_hours: ratio(total, count),
                mean_duration_hours: ratio(duration, count),
                mean_travel_hours: ratio(travel, count),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::derive_all;
    use crate::models::ServiceOrder;
    use crate::risk::RiskLabel;
    use chrono::NaiveDateTime;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        date(day).and_hms_opt(hour, 0, 0).unwrap()
    }

    fn order(
        region: &str,
        team: &str,
        order_type: &str,
        day: u32,
        duration: &str,
        travel: &str,
    ) -> ServiceOrder {
        ServiceOrder {
            region: region.to_string(),
            regional: region.to_string(),
            team: team.to_string(),
            order_type: order_type.to_string(),
            service_date: Some(date(day)),
            duration: Some(duration.to_string()),
            travel: Some(travel.to_string()),
            price: Some(0.0),
            ..ServiceOrder::default()
        }
    }

    fn priced(mut row: ServiceOrder, price: f64) -> ServiceOrder {
        row.price = Some(price);
        row
    }

    #[test]
    fn ratio_with_zero_denominator_is_zero() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(ratio(0.0, 0.0), 0.0);
        assert_eq!(ratio(3.0, 2.0), 1.5);
    }

    #[test]
    fn summaries_group_by_ordered_keys() {
        let rows = vec![
            order("A", "T1", "NR COL", 1, "1:00", "0:30"),
            order("A", "T2", "NR COL", 1, "2:30", "0:00"),
            order("A", "T2", "RC", 2, "0:00", "1:00"),
            order("B", "T3", "RC", 2, "1:00", "1:00"),
        ];
        let derived = derive_all(&rows);
        let summaries = summarize(&derived, &[Dimension::Region, Dimension::OrderType], |o| {
            o.total_hours > 1.5
        });

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].keys, vec!["A", "NR COL"]);
        assert_eq!(summaries[0].count, 2);
        assert!(close(summaries[0].mean_total_hours, 2.0));
        assert!(close(summaries[0].flagged_ratio, 0.5));
        assert_eq!(summaries[1].keys, vec!["A", "RC"]);
        assert_eq!(summaries[2].keys, vec!["B", "RC"]);
        assert!(close(summaries[2].flagged_ratio, 1.0));
        assert_eq!(summaries[0].mean_days_to_assignment, 0.0);
    }

    #[test]
    fn summaries_sum_price_and_group_by_risk() {
        let mut late = priced(order("A", "T1", "RC", 1, "1:00", "0:00"), 100.5);
        late.assigned_at = Some(at(1, 8));
        late.deadline = Some(at(1, 10));
        let unassigned = priced(order("A", "T1", "RC", 1, "1:00", "0:00"), 20.0);
        let rows = vec![late, unassigned];
        let derived = derive_all(&rows);

        let summaries = summarize(&derived, &[Dimension::Risk], |o| o.risk == RiskLabel::Red);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].keys, vec!["1-6h"]);
        assert!(close(summaries[0].total_price, 100.5));
        assert!(close(summaries[0].flagged_ratio, 1.0));
        assert!(close(summaries[0].mean_hours_to_deadline, 2.0));
        assert_eq!(summaries[1].keys, vec!["unassigned"]);
        assert_eq!(summaries[1].mean_hours_to_deadline, 0.0);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let summaries = summarize(&[], &[Dimension::Region], |_| true);
        assert!(summaries.is_empty());
        assert!(region_days(&[], &CapacityScenario::default()).is_empty());
        assert!(region_capacity(&[]).is_empty());
        assert!(tma_distribution(&[]).is_empty());
        assert!(bottlenecks(&[]).period.is_none());
    }

    #[test]
    fn capacity_scenario_flags_overload() {
        let rows = vec![
            order("A", "T1", "NR COL", 3, "4:00", "1:00"),
            order("A", "T1", "RC", 3, "0:30", "0:30"),
            order("A", "T1", "INDISPONIBILIDADE", 3, "2:00", "0:45"),
        ];
        let derived = derive_all(&rows);
        let scenario = CapacityScenario {
            capacity_factor: 0.9,
            ..CapacityScenario::default()
        };

        let days = region_days(&derived, &scenario);
        assert_eq!(days.len(), 1);
        let day = &days[0];
        assert!(close(day.demand_hours, 6.0));
        assert!(close(day.unavailable_hours, 2.0));
        assert!(close(day.capacity_hours, 5.4));
        assert!(close(day.balance_hours, -0.6));
        assert!(day.overloaded);
    }

    #[test]
    fn capacity_never_goes_negative() {
        let rows = vec![order("A", "T1", "INDISPONIBILIDADE", 3, "10:00", "0:00")];
        let derived = derive_all(&rows);
        let days = region_days(&derived, &CapacityScenario::default());
        assert_eq!(days[0].capacity_hours, 0.0);
        assert_eq!(days[0].balance_hours, 0.0);
        assert!(!days[0].overloaded);
    }

    #[test]
    fn region_summary_averages_days() {
        let rows = vec![
            order("A", "T1", "RC", 1, "10:00", "0:00"),
            order("A", "T1", "RC", 2, "4:00", "0:00"),
            order("B", "T2", "RC", 1, "1:00", "0:00"),
        ];
        let derived = derive_all(&rows);
        let days = region_days(&derived, &CapacityScenario::default());
        let regions = region_capacity(&days);

        assert_eq!(regions.len(), 2);
        let a = &regions[0];
        assert_eq!(a.region, "A");
        assert_eq!(a.days, 2);
        assert!(close(a.mean_demand_hours, 7.0));
        assert!(close(a.mean_balance_hours, 1.0));
        assert!(close(a.overload_rate, 0.5));
        assert!(close(regions[1].overload_rate, 0.0));
    }

    #[test]
    fn finance_computes_profit_and_viability() {
        let rows = vec![
            priced(order("A", "T1", "RC", 1, "4:00", "0:00"), 2_000.0),
            priced(order("A", "T1", "RC", 1, "4:00", "0:00"), 2_000.0),
            priced(order("A", "T2", "RC", 2, "2:00", "0:00"), 500.0),
        ];
        let derived = derive_all(&rows);
        let finance = region_finance(&derived, &CapacityScenario::default(), &FinanceParams::default());

        assert_eq!(finance.len(), 1);
        let a = &finance[0];
        assert_eq!(a.days, 2);
        assert!(close(a.revenue, 4_500.0));
        assert!(close(a.productive_hours, 10.0));
        assert!(close(a.revenue_per_hour, 450.0));
        assert!(close(a.profit_per_hour, 100.0));
        // Day 1: 4000 - 2800 = 1200; day 2: 500 - 2800 = -2300.
        assert!(close(a.mean_day_balance, -550.0));
        assert!(close(a.viable_day_ratio, 0.5));
    }

    #[test]
    fn finance_without_productive_hours_has_zero_revenue_rate() {
        let rows = vec![priced(order("A", "", "RC", 1, "", ""), 100.0)];
        let derived = derive_all(&rows);
        let finance = region_finance(&derived, &CapacityScenario::default(), &FinanceParams::default());
        assert_eq!(finance[0].revenue_per_hour, 0.0);
        assert_eq!(finance[0].profit_per_hour, -350.0);
    }

    #[test]
    fn mobilization_requires_all_conditions() {
        let policy = MobilizationPolicy::default();
        assert_eq!(decide(-0.5, 0.3, None, &policy), Mobilization::Mobilize);
        assert_eq!(decide(-0.5, 0.2, None, &policy), Mobilization::DoNotMobilize);
        assert_eq!(decide(0.0, 0.9, None, &policy), Mobilization::DoNotMobilize);

        let combined = MobilizationPolicy {
            require_profit: true,
            ..MobilizationPolicy::default()
        };
        assert_eq!(decide(-0.5, 0.3, Some(10.0), &combined), Mobilization::Mobilize);
        assert_eq!(decide(-0.5, 0.3, Some(0.0), &combined), Mobilization::DoNotMobilize);
        assert_eq!(decide(-0.5, 0.3, None, &combined), Mobilization::DoNotMobilize);
    }

    #[test]
    fn mobilization_joins_finance_by_region() {
        let capacity = vec![RegionCapacity {
            region: "A".to_string(),
            days: 4,
            mean_demand_hours: 9.0,
            mean_unavailable_hours: 0.0,
            mean_capacity_hours: 8.0,
            mean_balance_hours: -1.0,
            overload_rate: 0.75,
        }];
        let finance = vec![RegionFinance {
            region: "A".to_string(),
            days: 4,
            revenue: 0.0,
            productive_hours: 0.0,
            revenue_per_hour: 0.0,
            profit_per_hour: -350.0,
            mean_day_balance: 0.0,
            viable_day_ratio: 0.0,
        }];
        let combined = MobilizationPolicy {
            require_profit: true,
            ..MobilizationPolicy::default()
        };
        let decisions = mobilization(&capacity, &finance, &combined);
        assert_eq!(decisions[0].profit_per_hour, Some(-350.0));
        assert_eq!(decisions[0].decision, Mobilization::DoNotMobilize);

        let decisions = mobilization(&capacity, &finance, &MobilizationPolicy::default());
        assert_eq!(decisions[0].decision, Mobilization::Mobilize);
    }

    #[test]
    fn queue_metrics_guard_empty_denominators() {
        let mut undated = order("A", "", "RC", 1, "", "");
        undated.service_date = None;
        let rows = vec![undated];
        let derived = derive_all(&rows);
        let metrics = queue_metrics(&derived, &CapacityScenario::default());

        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.days, 0);
        assert_eq!(m.teams, 0);
        assert_eq!(m.arrival_rate, 0.0);
        assert_eq!(m.service_rate, 0.0);
        assert_eq!(m.occupancy, 0.0);
        assert_eq!(m.utilization, 0.0);
    }

    #[test]
    fn queue_metrics_for_busy_region() {
        let rows = vec![
            order("A", "T1", "RC", 1, "2:00", "0:00"),
            order("A", "T1", "RC", 1, "2:00", "0:00"),
            order("A", "T2", "RC", 2, "2:00", "0:00"),
            order("A", "T2", "RC", 2, "2:00", "0:00"),
        ];
        let derived = derive_all(&rows);
        let m = &queue_metrics(&derived, &CapacityScenario::default())[0];
        assert!(close(m.arrival_rate, 2.0));
        // Two teams of 8h over a 2h mean order.
        assert!(close(m.service_rate, 8.0));
        assert!(close(m.occupancy, 0.25));
        assert!(close(m.utilization, 8.0 / 32.0));
    }

    #[test]
    fn bottlenecks_report_daily_means_and_shares() {
        let mut rows = Vec::new();
        for (day, hour, order_type, group) in [
            (1, 8, "NR COL", "NR"),
            (1, 9, "NR COL", "NR"),
            (2, 8, "RC", "REATIVACAO"),
            (2, 18, "NR COL", ""),
        ] {
            let mut row = order("A", "T1", order_type, day, "1:00", "0:00");
            row.order_group = group.to_string();
            row.assigned_at = Some(at(day, hour));
            rows.push(row);
        }
        let derived = derive_all(&rows);
        let report = bottlenecks(&derived);

        assert_eq!(report.by_type[0].key, "NR COL");
        assert_eq!(report.by_type[0].total, 3);
        assert_eq!(report.by_type[0].daily_mean, 1.5);
        assert_eq!(report.by_type[0].share_percent, 75.0);
        assert_eq!(report.by_group.len(), 2);
        assert_eq!(report.by_group[0].share_percent, 66.7);
        assert_eq!(report.by_hour[8], 2);
        assert_eq!(report.by_hour[18], 1);
        let period = report.period.unwrap();
        assert_eq!(period.first_day, date(1));
        assert_eq!(period.last_day, date(2));
        assert_eq!(period.days, 2);
        assert_eq!(period.rows, 4);
    }

    #[test]
    fn box_stats_interpolate_quartiles() {
        let stats = box_stats(vec![4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.q1, 1.75);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.q3, 3.25);
        assert_eq!(stats.max, 4.0);
        assert!(box_stats(Vec::new()).is_none());
        assert_eq!(box_stats(vec![2.0]).unwrap().q3, 2.0);
    }

    #[test]
    fn monthly_evolution_is_month_ordered() {
        let mut july = order("Norte", "T1", "RC", 1, "3:00", "1:00");
        july.service_date = NaiveDate::from_ymd_opt(2025, 7, 1);
        let rows = vec![
            july,
            order("Norte", "T1", "RC", 1, "1:00", "1:00"),
            order("Norte", "T1", "RC", 2, "2:00", "1:00"),
            order("Sul", "T2", "RC", 2, "1:00", "0:00"),
        ];
        let derived = derive_all(&rows);
        let months = monthly_evolution(&derived);

        assert_eq!(months.len(), 3);
        assert_eq!((months[0].month.as_str(), months[0].regional.as_str()), ("2025-06", "Norte"));
        assert!(close(months[0].mean_total_hours, 2.5));
        assert_eq!(months[1].regional, "Sul");
        assert_eq!(months[2].month, "2025-07");

        let spread = tma_distribution(&derived);
        assert_eq!(spread.len(), 2);
        assert_eq!(spread[0].total_hours.count, 3);
        assert!(close(spread[0].total_hours.median, 3.0));
    }

    #[test]
    fn repeated_runs_serialize_identically() {
        let rows = vec![
            order("B", "T1", "RC", 1, "1:00", "0:10"),
            order("A", "T2", "NR COL", 2, "2:00", "0:20"),
            order("A", "T3", "RC", 2, "0:40", "0:05"),
        ];
        let render = || {
            let derived = derive_all(&rows);
            let summaries = summarize(&derived, &[Dimension::Region, Dimension::Team], |_| false);
            let days = region_days(&derived, &CapacityScenario::default());
            serde_json::to_string(&(summaries, region_capacity(&days))).unwrap()
        };
        assert_eq!(render(), render());
    }
}
