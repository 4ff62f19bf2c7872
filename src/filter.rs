use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::{bail, Context};
use serde::Serialize;

use crate::config::Aliases;
use crate::models::{DerivedOrder, Field};
use crate::risk::RiskLabel;

/// Categorical axis of a derived order, shared by filters and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    State,
    Region,
    Regional,
    Base,
    Acronym,
    Team,
    OrderType,
    OrderGroup,
    Status,
    Risk,
    Delay,
    Month,
}

/// Hierarchy used for cascading filter options, outermost first.
pub const CASCADE: [Dimension; 6] = [
    Dimension::State,
    Dimension::Regional,
    Dimension::Base,
    Dimension::Acronym,
    Dimension::OrderType,
    Dimension::OrderGroup,
];

impl Dimension {
    pub fn name(self) -> &'static str {
        match self {
            Dimension::Risk => "risk",
            Dimension::Delay => "delay",
            Dimension::Month => "month",
            other => other.field().map(Field::name).unwrap_or_default(),
        }
    }

    pub fn field(self) -> Option<Field> {
        match self {
            Dimension::State => Some(Field::State),
            Dimension::Region => Some(Field::Region),
            Dimension::Regional => Some(Field::Regional),
            Dimension::Base => Some(Field::Base),
            Dimension::Acronym => Some(Field::Acronym),
            Dimension::Team => Some(Field::Team),
            Dimension::OrderType => Some(Field::OrderType),
            Dimension::OrderGroup => Some(Field::OrderGroup),
            Dimension::Status => Some(Field::Status),
            Dimension::Risk | Dimension::Delay | Dimension::Month => None,
        }
    }

    pub fn parse(value: &str) -> Option<Dimension> {
        match value.trim().to_ascii_lowercase().as_str() {
            "risk" => Some(Dimension::Risk),
            "delay" => Some(Dimension::Delay),
            "month" => Some(Dimension::Month),
            other => match Field::parse(other)? {
                Field::State => Some(Dimension::State),
                Field::Region => Some(Dimension::Region),
                Field::Regional => Some(Dimension::Regional),
                Field::Base => Some(Dimension::Base),
                Field::Acronym => Some(Dimension::Acronym),
                Field::Team => Some(Dimension::Team),
                Field::OrderType => Some(Dimension::OrderType),
                Field::OrderGroup => Some(Dimension::OrderGroup),
                Field::Status => Some(Dimension::Status),
                _ => None,
            },
        }
    }

    /// Columns the dimension is read or derived from. `Month` is absent here:
    /// it needs either the service date or the assignment timestamp.
    pub fn required_fields(self) -> Vec<Field> {
        match self {
            Dimension::Risk => vec![Field::AssignedAt, Field::Deadline],
            Dimension::Delay => vec![Field::CreatedAt, Field::AssignedAt],
            Dimension::Month => Vec::new(),
            other => other.field().into_iter().collect(),
        }
    }

    /// Value of this dimension for one order; empty when unknown.
    pub fn value<'a>(self, order: &'a DerivedOrder<'_>) -> &'a str {
        match self {
            Dimension::Risk => order.risk.label(),
            Dimension::Delay => order.delay.map(|delay| delay.label()).unwrap_or_default(),
            Dimension::Month => order.month.as_deref().unwrap_or_default(),
            other => other
                .field()
                .and_then(|field| order.order.category(field))
                .unwrap_or_default(),
        }
    }

    fn matches(self, order: &DerivedOrder<'_>, selected: &BTreeSet<String>) -> bool {
        match self {
            Dimension::Risk => selected.iter().any(|value| {
                value == order.risk.label() || value.eq_ignore_ascii_case(order.risk.tier())
            }),
            _ => selected.contains(self.value(order)),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conjunction of per-dimension membership tests. A dimension without a
/// selection does not constrain anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    selections: BTreeMap<Dimension, BTreeSet<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds values for a dimension; order type values go through `aliases`.
    pub fn select<I, S>(&mut self, dimension: Dimension, values: I, aliases: &Aliases)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.selections.entry(dimension).or_default();
        for value in values {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            if dimension == Dimension::OrderType {
                entry.extend(aliases.expand(value));
            } else {
                entry.insert(value.to_string());
            }
        }
        if entry.is_empty() {
            self.selections.remove(&dimension);
        }
    }

    pub fn clear(&mut self, dimension: Dimension) {
        self.selections.remove(&dimension);
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn selections(&self) -> impl Iterator<Item = (Dimension, &BTreeSet<String>)> {
        self.selections.iter().map(|(dim, values)| (*dim, values))
    }

    /// Parses `dimension=v1,v2` and adds it to the filter.
    pub fn add_expr(&mut self, expr: &str, aliases: &Aliases) -> anyhow::Result<()> {
        let (name, values) = expr
            .split_once('=')
            .with_context(|| format!("filter '{expr}' must look like field=value[,value]"))?;
        let Some(dimension) = Dimension::parse(name) else {
            bail!("unknown filter field '{}'", name.trim());
        };
        if dimension == Dimension::Risk {
            if let Some(bad) = values
                .split(',')
                .map(str::trim)
                .find(|value| !value.is_empty() && RiskLabel::parse(value).is_none())
            {
                bail!("unknown risk label '{bad}'");
            }
        }
        self.select(dimension, values.split(','), aliases);
        Ok(())
    }

    pub fn matches(&self, order: &DerivedOrder<'_>) -> bool {
        self.selections
            .iter()
            .all(|(dimension, selected)| dimension.matches(order, selected))
    }

    fn matches_before(&self, order: &DerivedOrder<'_>, hierarchy: &[Dimension]) -> bool {
        hierarchy.iter().all(|dimension| match self.selections.get(dimension) {
            Some(selected) => dimension.matches(order, selected),
            None => true,
        })
    }

    pub fn apply<'a>(&self, orders: Vec<DerivedOrder<'a>>) -> Vec<DerivedOrder<'a>> {
        orders.into_iter().filter(|order| self.matches(order)).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub dimension: Dimension,
    pub options: Vec<String>,
}

/// Options offered at each level of [`CASCADE`], narrowed by the selections
/// made at the levels above it.
pub fn cascading_options(orders: &[DerivedOrder<'_>], filter: &Filter) -> Vec<FilterOptions> {
    CASCADE
        .iter()
        .enumerate()
        .map(|(level, &dimension)| {
            let options: BTreeSet<String> = orders
                .iter()
                .filter(|order| filter.matches_before(order, &CASCADE[..level]))
                .map(|order| dimension.value(order).to_string())
                .filter(|value| !value.is_empty())
                .collect();
            FilterOptions {
                dimension,
                options: options.into_iter().collect(),
            }
        })
        .collect()
}
