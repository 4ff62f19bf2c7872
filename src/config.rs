use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::Field;

pub const DEFAULT_SHIFT_HOURS: f64 = 8.0;
pub const DEFAULT_HOURLY_TEAM_COST: f64 = 350.0;
pub const DEFAULT_OVERLOAD_THRESHOLD: f64 = 0.2;
pub const DEFAULT_UNAVAILABLE_TYPE: &str = "INDISPONIBILIDADE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input: InputSettings,
    pub columns: ColumnMap,
    pub capacity: CapacityScenario,
    pub finance: FinanceParams,
    pub mobilization: MobilizationPolicy,
    pub aliases: Aliases,
}

impl Settings {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub path: Option<PathBuf>,
    pub delimiter: char,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: ';',
        }
    }
}

/// Source header for each logical field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub state: String,
    pub region: String,
    pub regional: String,
    pub base: String,
    pub acronym: String,
    pub team: String,
    pub order_type: String,
    pub order_group: String,
    pub status: String,
    pub created_at: String,
    pub assigned_at: String,
    pub deadline: String,
    pub service_date: String,
    pub duration: String,
    pub travel: String,
    pub price: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            state: "estado".to_string(),
            region: "REGIAO".to_string(),
            regional: "regional".to_string(),
            base: "base".to_string(),
            acronym: "sigla".to_string(),
            team: "EQUIPE".to_string(),
            order_type: "TIPO_OS".to_string(),
            order_group: "GRUPO_OS".to_string(),
            status: "STATUS".to_string(),
            created_at: "DATA_ABERTURA_OS".to_string(),
            assigned_at: "DATA_ATRIBUICAO_OS".to_string(),
            deadline: "DATA_LIMITE_OS".to_string(),
            service_date: "DATA".to_string(),
            duration: "DURACAO".to_string(),
            travel: "DESLOCAMENTO".to_string(),
            price: "PRECO_A_COBRAR".to_string(),
        }
    }
}

impl ColumnMap {
    pub fn header(&self, field: Field) -> &str {
        match field {
            Field::State => &self.state,
            Field::Region => &self.region,
            Field::Regional => &self.regional,
            Field::Base => &self.base,
            Field::Acronym => &self.acronym,
            Field::Team => &self.team,
            Field::OrderType => &self.order_type,
            Field::OrderGroup => &self.order_group,
            Field::Status => &self.status,
            Field::CreatedAt => &self.created_at,
            Field::AssignedAt => &self.assigned_at,
            Field::Deadline => &self.deadline,
            Field::ServiceDate => &self.service_date,
            Field::Duration => &self.duration,
            Field::Travel => &self.travel,
            Field::Price => &self.price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityScenario {
    pub shift_hours: f64,
    pub capacity_factor: f64,
    /// Order type whose duration blocks team time instead of adding demand.
    pub unavailable_type: String,
}

impl Default for CapacityScenario {
    fn default() -> Self {
        Self {
            shift_hours: DEFAULT_SHIFT_HOURS,
            capacity_factor: 1.0,
            unavailable_type: DEFAULT_UNAVAILABLE_TYPE.to_string(),
        }
    }
}

impl CapacityScenario {
    pub fn is_unavailable(&self, order_type: &str) -> bool {
        order_type.trim().eq_ignore_ascii_case(self.unavailable_type.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceParams {
    pub hourly_team_cost: f64,
}

impl Default for FinanceParams {
    fn default() -> Self {
        Self {
            hourly_team_cost: DEFAULT_HOURLY_TEAM_COST,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MobilizationPolicy {
    pub overload_threshold: f64,
    /// Also require a positive profit per hour before mobilizing.
    pub require_profit: bool,
}

impl Default for MobilizationPolicy {
    fn default() -> Self {
        Self {
            overload_threshold: DEFAULT_OVERLOAD_THRESHOLD,
            require_profit: false,
        }
    }
}

/// Named groups of order types selectable as a single filter value.
/// Configured groups are merged over the built-in ones.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Aliases(pub BTreeMap<String, Vec<String>>);

impl Default for Aliases {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            "NR's".to_string(),
            vec![
                "NR IMPROD".to_string(),
                "NR IND".to_string(),
                "NR COL".to_string(),
            ],
        );
        Self(map)
    }
}

impl<'de> Deserialize<'de> for Aliases {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let configured = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        let mut aliases = Aliases::default();
        aliases.0.extend(configured);
        Ok(aliases)
    }
}

impl Aliases {
    pub fn expand(&self, value: &str) -> Vec<String> {
        match self.0.get(value) {
            Some(members) => members.clone(),
            None => vec![value.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_field_operations() {
        let settings = Settings::default();
        assert_eq!(settings.input.delimiter, ';');
        assert_eq!(settings.capacity.shift_hours, 8.0);
        assert_eq!(settings.finance.hourly_team_cost, 350.0);
        assert_eq!(settings.columns.header(Field::Price), "PRECO_A_COBRAR");
        assert_eq!(settings.columns.header(Field::State), "estado");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "[input]\npath = \"orders.csv\"\n\n[capacity]\ncapacity_factor = 0.9\n\n[columns]\nregion = \"regional_nome\"\n\n[aliases]\nRC = [\"RC SEM MEDIDOR\", \"RC SEM RAMAL\"]\n"
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.input.path, Some(PathBuf::from("orders.csv")));
        assert_eq!(settings.input.delimiter, ';');
        assert_eq!(settings.capacity.capacity_factor, 0.9);
        assert_eq!(settings.capacity.shift_hours, 8.0);
        assert_eq!(settings.columns.header(Field::Region), "regional_nome");
        assert_eq!(settings.columns.header(Field::Team), "EQUIPE");
        assert_eq!(settings.aliases.expand("RC").len(), 2);
        assert_eq!(settings.aliases.expand("NR's").len(), 3);
        assert_eq!(settings.aliases.expand("NR IND"), vec!["NR IND".to_string()]);
    }

    #[test]
    fn unavailable_type_matches_case_insensitively() {
        let scenario = CapacityScenario::default();
        assert!(scenario.is_unavailable(" indisponibilidade "));
        assert!(!scenario.is_unavailable("NR COL"));
    }
}
