use std::fmt::Write;
use std::path::Path;

use crate::filter::{Filter, FilterOptions};
use crate::models::{BoxStats, GroupSummary};
use crate::pipeline::{Analysis, View};

pub const NO_DATA: &str = "No service orders match the selected filters.";

fn describe_filter(filter: &Filter) -> String {
    if filter.is_empty() {
        return "no filters".to_string();
    }
    filter
        .selections()
        .map(|(dimension, values)| {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            format!("{dimension} in [{}]", values.join(", "))
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

fn write_groups(output: &mut String, groups: &[GroupSummary], flag_label: &str) {
    for group in groups {
        let _ = writeln!(
            output,
            "- {}: {} orders, TMA {:.2}h (duration {:.2}h, travel {:.2}h), {:.2} days to assignment, {:.2}h to deadline, {} {:.1}%",
            group.keys.join(" / "),
            group.count,
            group.mean_total_hours,
            group.mean_duration_hours,
            group.mean_travel_hours,
            group.mean_days_to_assignment,
            group.mean_hours_to_deadline,
            flag_label,
            group.flagged_ratio * 100.0
        );
    }
}

fn write_box(output: &mut String, label: &str, stats: &BoxStats) {
    let _ = writeln!(
        output,
        "  - {label}: min {:.2} | q1 {:.2} | median {:.2} | q3 {:.2} | max {:.2}",
        stats.min, stats.q1, stats.median, stats.q3, stats.max
    );
}

/// Plain-text body for one analysis; also valid markdown.
pub fn render(analysis: &Analysis) -> String {
    let mut output = String::new();

    match analysis {
        Analysis::Empty => {
            let _ = writeln!(output, "{NO_DATA}");
        }
        Analysis::Risk { groups } => write_groups(&mut output, groups, "urgent"),
        Analysis::Delays { groups } => write_groups(&mut output, groups, "late (>3 days)"),
        Analysis::Capacity { regions, .. } => {
            for region in regions {
                let _ = writeln!(
                    output,
                    "- {}: demand {:.2}h vs capacity {:.2}h (unavailable {:.2}h), balance {:+.2}h, overloaded on {:.1}% of {} days",
                    region.region,
                    region.mean_demand_hours,
                    region.mean_capacity_hours,
                    region.mean_unavailable_hours,
                    region.mean_balance_hours,
                    region.overload_rate * 100.0,
                    region.days
                );
            }
        }
        Analysis::Finance { regions } => {
            for region in regions {
                let _ = writeln!(
                    output,
                    "- {}: revenue {:.2} over {:.2}h, {:.2}/h, margin {:+.2}/h, day balance {:+.2}, viable on {:.1}% of {} days",
                    region.region,
                    region.revenue,
                    region.productive_hours,
                    region.revenue_per_hour,
                    region.profit_per_hour,
                    region.mean_day_balance,
                    region.viable_day_ratio * 100.0,
                    region.days
                );
            }
        }
        Analysis::Mobilization { decisions } => {
            for decision in decisions {
                let profit = decision
                    .profit_per_hour
                    .map(|p| format!(", margin {p:+.2}/h"))
                    .unwrap_or_default();
                let _ = writeln!(
                    output,
                    "- {}: {} (balance {:+.2}h, overload {:.1}%{})",
                    decision.region,
                    decision.decision,
                    decision.mean_balance_hours,
                    decision.overload_rate * 100.0,
                    profit
                );
            }
        }
        Analysis::Queue { regions } => {
            for region in regions {
                let _ = writeln!(
                    output,
                    "- {}: {} orders over {} days by {} teams, arrivals {:.2}/day, service {:.2}/day, occupancy {:.2}, utilization {:.1}%",
                    region.region,
                    region.orders,
                    region.days,
                    region.teams,
                    region.arrival_rate,
                    region.service_rate,
                    region.occupancy,
                    region.utilization * 100.0
                );
            }
        }
        Analysis::Bottlenecks(report) => {
            let tables = [
                ("By order type", &report.by_type),
                ("By order group", &report.by_group),
            ];
            for (title, rows) in tables {
                let _ = writeln!(output, "{title}:");
                for row in rows.iter() {
                    let _ = writeln!(
                        output,
                        "- {}: {:.1}/day, {} total ({:.1}%)",
                        row.key, row.daily_mean, row.total, row.share_percent
                    );
                }
            }
            let _ = writeln!(output, "By hour of assignment:");
            for (hour, count) in report.by_hour.iter().enumerate() {
                if *count == 0 {
                    continue;
                }
                let _ = writeln!(output, "- {hour:02}h: {count}");
            }
            if let Some(period) = &report.period {
                let _ = writeln!(
                    output,
                    "Period: {} - {} ({} days, {} assignments)",
                    period.first_day.format("%d/%m/%Y"),
                    period.last_day.format("%d/%m/%Y"),
                    period.days,
                    period.rows
                );
            }
        }
        Analysis::Tma { regionals, monthly } => {
            for regional in regionals {
                let _ = writeln!(
                    output,
                    "- {} ({} orders)",
                    regional.regional, regional.total_hours.count
                );
                write_box(&mut output, "TMA", &regional.total_hours);
                write_box(&mut output, "duration", &regional.duration_hours);
                write_box(&mut output, "travel", &regional.travel_hours);
            }
            if !monthly.is_empty() {
                let _ = writeln!(output, "Monthly evolution:");
                for month in monthly {
                    let _ = writeln!(
                        output,
                        "- {} {}: TMA {:.2}h, duration {:.2}h, travel {:.2}h",
                        month.month,
                        month.regional,
                        month.mean_total_hours,
                        month.mean_duration_hours,
                        month.mean_travel_hours
                    );
                }
            }
        }
    }

    output
}

pub fn render_options(options: &[FilterOptions]) -> String {
    let mut output = String::new();
    for level in options {
        let values = if level.options.is_empty() {
            "(none)".to_string()
        } else {
            level.options.join(", ")
        };
        let _ = writeln!(output, "- {}: {}", level.dimension, values);
    }
    output
}

pub fn build_report(source: &Path, filter: &Filter, sections: &[(View, Analysis)]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Field Operations Report");
    let _ = writeln!(
        output,
        "Generated from {} ({})",
        source.display(),
        describe_filter(filter)
    );

    for (view, analysis) in sections {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", view.title());
        output.push_str(&render(analysis));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Aliases;
    use crate::filter::Dimension;
    use crate::models::{Mobilization, MobilizationDecision};

    #[test]
    fn empty_analysis_shows_notice() {
        assert_eq!(render(&Analysis::Empty).trim(), NO_DATA);
    }

    #[test]
    fn report_lists_every_section_and_filter() {
        let mut filter = Filter::new();
        filter.add_expr("region=A,B", &Aliases::default()).unwrap();
        let decisions = vec![MobilizationDecision {
            region: "A".to_string(),
            mean_balance_hours: -0.6,
            overload_rate: 0.5,
            profit_per_hour: None,
            decision: Mobilization::Mobilize,
        }];
        let sections = vec![
            (View::Risk, Analysis::Empty),
            (View::Mobilization, Analysis::Mobilization { decisions }),
        ];

        let report = build_report(Path::new("orders.csv"), &filter, &sections);
        assert!(report.starts_with("# Field Operations Report"));
        assert!(report.contains("orders.csv (region in [A, B])"));
        assert!(report.contains("## SLA Risk\nNo service orders"));
        assert!(report.contains("- A: MOBILIZE (balance -0.60h, overload 50.0%)"));
    }

    #[test]
    fn options_mark_empty_levels() {
        let options = vec![
            FilterOptions {
                dimension: Dimension::State,
                options: vec!["MS".to_string(), "MT".to_string()],
            },
            FilterOptions {
                dimension: Dimension::OrderGroup,
                options: Vec::new(),
            },
        ];
        let text = render_options(&options);
        assert_eq!(text, "- state: MS, MT\n- order_group: (none)\n");
    }
}
