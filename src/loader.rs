use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::ColumnMap;
use crate::error::{LoadError, LoadResult};
use crate::models::{Dataset, Field, ServiceOrder};

const DATETIME_FORMATS: [&str; 6] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub columns: ColumnMap,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            columns: ColumnMap::default(),
        }
    }
}

pub fn load_orders(path: &Path, options: &LoadOptions) -> LoadResult<Dataset> {
    if !path.is_file() {
        return Err(LoadError::MissingFile {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let mut positions: HashMap<Field, usize> = HashMap::new();
    for field in Field::ALL {
        let wanted = options.columns.header(field);
        if let Some(index) = headers.iter().position(|header| header == wanted) {
            positions.insert(field, index);
        }
    }

    let mut orders = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let get = |field: Field| cell(&record, &positions, field);
        let text = |field: Field| get(field).unwrap_or_default().to_string();

        let price = if positions.contains_key(&Field::Price) {
            let raw = get(Field::Price).unwrap_or_default();
            let value = parse_price(raw).ok_or_else(|| LoadError::InvalidPrice {
                line,
                value: raw.to_string(),
            })?;
            Some(value)
        } else {
            None
        };

        orders.push(ServiceOrder {
            line,
            state: text(Field::State),
            region: text(Field::Region),
            regional: text(Field::Regional),
            base: text(Field::Base),
            acronym: text(Field::Acronym),
            team: text(Field::Team),
            order_type: text(Field::OrderType),
            order_group: text(Field::OrderGroup),
            status: text(Field::Status),
            created_at: get(Field::CreatedAt).and_then(parse_timestamp),
            assigned_at: get(Field::AssignedAt).and_then(parse_timestamp),
            deadline: get(Field::Deadline).and_then(parse_timestamp),
            service_date: get(Field::ServiceDate)
                .and_then(parse_timestamp)
                .map(|ts| ts.date()),
            duration: get(Field::Duration).map(str::to_string),
            travel: get(Field::Travel).map(str::to_string),
            price,
        });
    }

    log::info!("loaded {} service orders from {}", orders.len(), path.display());

    Ok(Dataset {
        path: path.to_path_buf(),
        columns: positions.into_keys().collect(),
        orders,
    })
}

fn cell<'r>(
    record: &'r csv::StringRecord,
    positions: &HashMap<Field, usize>,
    field: Field,
) -> Option<&'r str> {
    positions
        .get(&field)
        .and_then(|&index| record.get(index))
        .filter(|value| !value.is_empty())
}

/// Fails on the first field in `required` whose header the file lacks.
pub fn require_columns(
    dataset: &Dataset,
    columns: &ColumnMap,
    required: &[Field],
) -> LoadResult<()> {
    for &field in required {
        if !dataset.columns.contains(&field) {
            return Err(LoadError::MissingColumn {
                field: field.name(),
                column: columns.header(field).to_string(),
                path: dataset.path.clone(),
            });
        }
    }
    Ok(())
}

/// Day-first parse; date-only values land at midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// `1.234` and `1.234.567` are dot-grouped integers; `12.5` is a decimal.
fn is_dot_grouped(value: &str) -> bool {
    let groups: Vec<&str> = value.trim_start_matches('-').split('.').collect();
    groups.len() > 1
        && (1..=3).contains(&groups[0].len())
        && groups[1..].iter().all(|group| group.len() == 3)
        && groups
            .iter()
            .all(|group| group.chars().all(|c| c.is_ascii_digit()))
}

/// Decimal-comma aware: with a comma present, dots are thousands separators.
/// Without one, dots only group thousands when every group has three digits.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if is_dot_grouped(&cleaned) {
        cleaned.replace('.', "")
    } else {
        cleaned
    };
    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LoadKey {
    path: PathBuf,
    options: LoadOptions,
}

/// Loaded datasets keyed by resolved path and load options. Entries are
/// shared read-only and live as long as the cache.
#[derive(Debug, Default)]
pub struct LoadCache {
    entries: HashMap<LoadKey, Rc<Dataset>>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path, options: &LoadOptions) -> LoadResult<Rc<Dataset>> {
        let resolved = path.canonicalize().map_err(|_| LoadError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let key = LoadKey {
            path: resolved,
            options: options.clone(),
        };

        if let Some(dataset) = self.entries.get(&key) {
            log::debug!("load cache hit for {}", key.path.display());
            return Ok(Rc::clone(dataset));
        }

        let dataset = Rc::new(load_orders(&key.path, options)?);
        self.entries.insert(key, Rc::clone(&dataset));
        Ok(dataset)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
