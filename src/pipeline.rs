use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::Serialize;

use crate::aggregate;
use crate::config::Settings;
use crate::derive::derive_all;
use crate::error::{LoadError, LoadResult};
use crate::filter::{cascading_options, Dimension, Filter, FilterOptions};
use crate::loader::require_columns;
use crate::models::{
    Bottlenecks, Dataset, DerivedOrder, Field, GroupSummary, MobilizationDecision, MonthlyMean,
    QueueMetrics, RegionCapacity, RegionDay, RegionFinance, RegionalDistribution,
};
use crate::risk::{AssignmentDelay, RiskLabel};

/// One analysis screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Risk,
    Delays,
    Capacity,
    Finance,
    Mobilization,
    Queue,
    Bottlenecks,
    Tma,
}

impl View {
    pub const ALL: [View; 8] = [
        View::Risk,
        View::Delays,
        View::Capacity,
        View::Finance,
        View::Mobilization,
        View::Queue,
        View::Bottlenecks,
        View::Tma,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::Risk => "SLA Risk",
            View::Delays => "Time to Assignment",
            View::Capacity => "Demand vs Capacity",
            View::Finance => "Economic Viability",
            View::Mobilization => "Mobilization",
            View::Queue => "Queue Metrics",
            View::Bottlenecks => "Assignment Bottlenecks",
            View::Tma => "Mean Handling Time",
        }
    }

    fn default_keys(self) -> &'static [Dimension] {
        match self {
            View::Risk => &[Dimension::Region, Dimension::Risk],
            View::Delays => &[Dimension::Region, Dimension::Delay],
            _ => &[],
        }
    }

    pub fn required_fields(self, settings: &Settings) -> Vec<Field> {
        let capacity = [Field::Region, Field::OrderType, Field::Duration, Field::Travel];
        let finance = [Field::Team, Field::Price];
        match self {
            View::Risk => vec![Field::AssignedAt, Field::Deadline],
            View::Delays => vec![Field::CreatedAt, Field::AssignedAt],
            View::Capacity => capacity.to_vec(),
            View::Finance => [&capacity[..], &finance[..]].concat(),
            View::Mobilization if settings.mobilization.require_profit => {
                [&capacity[..], &finance[..]].concat()
            }
            View::Mobilization => capacity.to_vec(),
            View::Queue => vec![Field::Region, Field::Team, Field::Duration, Field::Travel],
            View::Bottlenecks => vec![Field::AssignedAt, Field::OrderType, Field::OrderGroup],
            View::Tma => vec![Field::Regional, Field::Duration, Field::Travel],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Analysis {
    /// The filters matched no rows.
    Empty,
    Risk {
        groups: Vec<GroupSummary>,
    },
    Delays {
        groups: Vec<GroupSummary>,
    },
    Capacity {
        days: Vec<RegionDay>,
        regions: Vec<RegionCapacity>,
    },
    Finance {
        regions: Vec<RegionFinance>,
    },
    Mobilization {
        decisions: Vec<MobilizationDecision>,
    },
    Queue {
        regions: Vec<QueueMetrics>,
    },
    Bottlenecks(Bottlenecks),
    Tma {
        regionals: Vec<RegionalDistribution>,
        monthly: Vec<MonthlyMean>,
    },
}

fn is_urgent(order: &DerivedOrder<'_>) -> bool {
    matches!(
        order.risk,
        RiskLabel::AfterHoursSameDay | RiskLabel::Emergency | RiskLabel::Red
    )
}

fn is_late(order: &DerivedOrder<'_>) -> bool {
    order.delay.is_some_and(|delay| delay > AssignmentDelay::ThreeDays)
}

/// Derive, filter and aggregate one view over a loaded dataset.
pub struct Pipeline<'s> {
    settings: &'s Settings,
}

impl<'s> Pipeline<'s> {
    pub fn new(settings: &'s Settings) -> Self {
        Self { settings }
    }

    /// Fails when the dataset lacks a column that the view or the filter needs.
    pub fn check(
        &self,
        dataset: &Dataset,
        view: View,
        keys: &[Dimension],
        filter: &Filter,
    ) -> LoadResult<()> {
        let dimensions: BTreeSet<Dimension> = keys
            .iter()
            .copied()
            .chain(filter.selections().map(|(dimension, _)| dimension))
            .collect();
        let mut required: BTreeSet<Field> =
            view.required_fields(self.settings).into_iter().collect();
        required.extend(dimensions.iter().flat_map(|dimension| dimension.required_fields()));
        let required: Vec<Field> = required.into_iter().collect();
        require_columns(dataset, &self.settings.columns, &required)?;

        let dated = [Field::ServiceDate, Field::AssignedAt]
            .iter()
            .any(|field| dataset.columns.contains(field));
        if dimensions.contains(&Dimension::Month) && !dated {
            return Err(LoadError::MissingColumn {
                field: Field::ServiceDate.name(),
                column: self.settings.columns.header(Field::ServiceDate).to_string(),
                path: dataset.path.clone(),
            });
        }
        Ok(())
    }

    pub fn select<'a>(&self, dataset: &'a Dataset, filter: &Filter) -> Vec<DerivedOrder<'a>> {
        filter.apply(derive_all(&dataset.orders))
    }

    pub fn run(
        &self,
        dataset: &Dataset,
        view: View,
        keys: &[Dimension],
        filter: &Filter,
    ) -> LoadResult<Analysis> {
        let keys = if keys.is_empty() { view.default_keys() } else { keys };
        self.check(dataset, view, keys, filter)?;
        let orders = self.select(dataset, filter);
        if orders.is_empty() {
            log::info!("filters matched no rows for {}", view.title());
            return Ok(Analysis::Empty);
        }

        let settings = self.settings;
        let analysis = match view {
            View::Risk => Analysis::Risk {
                groups: aggregate::summarize(&orders, keys, is_urgent),
            },
            View::Delays => Analysis::Delays {
                groups: aggregate::summarize(&orders, keys, is_late),
            },
            View::Capacity => {
                let days = aggregate::region_days(&orders, &settings.capacity);
                let regions = aggregate::region_capacity(&days);
                Analysis::Capacity { days, regions }
            }
            View::Finance => Analysis::Finance {
                regions: aggregate::region_finance(&orders, &settings.capacity, &settings.finance),
            },
            View::Mobilization => {
                let days = aggregate::region_days(&orders, &settings.capacity);
                let capacity = aggregate::region_capacity(&days);
                let finance = if settings.mobilization.require_profit {
                    aggregate::region_finance(&orders, &settings.capacity, &settings.finance)
                } else {
                    Vec::new()
                };
                Analysis::Mobilization {
                    decisions: aggregate::mobilization(&capacity, &finance, &settings.mobilization),
                }
            }
            View::Queue => Analysis::Queue {
                regions: aggregate::queue_metrics(&orders, &settings.capacity),
            },
            View::Bottlenecks => Analysis::Bottlenecks(aggregate::bottlenecks(&orders)),
            View::Tma => Analysis::Tma {
                regionals: aggregate::tma_distribution(&orders),
                monthly: aggregate::monthly_evolution(&orders),
            },
        };
        Ok(analysis)
    }

    /// Cascading filter options over the whole dataset.
    pub fn options(&self, dataset: &Dataset, filter: &Filter) -> Vec<FilterOptions> {
        cascading_options(&derive_all(&dataset.orders), filter)
    }
}
