//! Scenario Frame
//!
//! In-memory long-format store of IAM scenario observations keyed by
//! (model, scenario, region, variable, unit, year), plus the metadata table
//! that receives per-run cluster flags.

mod query;

pub use query::{Criteria, Selector, TimeSeriesQuery, YearFilter};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Read;

use crate::error::QueryError;

/// A single (model, scenario) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub model: String,
    pub scenario: String,
}

impl RunKey {
    pub fn new(model: impl Into<String>, scenario: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            scenario: scenario.into(),
        }
    }

    /// The `model|scenario` form used by curated scenario lists
    pub fn pipe_joined(&self) -> String {
        format!("{}|{}", self.model, self.scenario)
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.model, self.scenario)
    }
}

/// What is measured: a (variable, unit) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Measurand {
    pub variable: String,
    pub unit: String,
}

impl Measurand {
    pub fn new(variable: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            unit: unit.into(),
        }
    }
}

impl fmt::Display for Measurand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.variable, self.unit)
    }
}

/// One row of the long-format dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub model: String,
    pub scenario: String,
    pub region: String,
    pub variable: String,
    pub unit: String,
    pub year: i32,
    pub value: f64,
}

impl Observation {
    pub fn run_key(&self) -> RunKey {
        RunKey::new(&self.model, &self.scenario)
    }

    pub fn series_key(&self) -> SeriesKey {
        SeriesKey {
            model: self.model.clone(),
            scenario: self.scenario.clone(),
            region: self.region.clone(),
            variable: self.variable.clone(),
            unit: self.unit.clone(),
        }
    }

    pub(crate) fn with_value(&self, year: i32, value: f64) -> Self {
        Self {
            year,
            value,
            ..self.clone()
        }
    }
}

/// Identity of one timeseries: every index column except the year
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub model: String,
    pub scenario: String,
    pub region: String,
    pub variable: String,
    pub unit: String,
}

impl SeriesKey {
    pub(crate) fn observation(&self, year: i32, value: f64) -> Observation {
        Observation {
            model: self.model.clone(),
            scenario: self.scenario.clone(),
            region: self.region.clone(),
            variable: self.variable.clone(),
            unit: self.unit.clone(),
            year,
            value,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.model, self.scenario, self.region, self.variable, self.unit
        )
    }
}

/// A single flag written into the metadata table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub model: String,
    pub scenario: String,
    pub column: String,
    pub value: u8,
}

/// Per-run metadata columns (one column per cluster)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTable {
    columns: BTreeMap<String, BTreeMap<RunKey, u8>>,
}

impl MetaTable {
    pub fn set(&mut self, column: &str, run: &RunKey, value: u8) {
        self.columns
            .entry(column.to_string())
            .or_default()
            .insert(run.clone(), value);
    }

    pub fn get(&self, column: &str, run: &RunKey) -> Option<u8> {
        self.columns.get(column).and_then(|c| c.get(run)).copied()
    }

    pub fn column(&self, column: &str) -> Option<&BTreeMap<RunKey, u8>> {
        self.columns.get(column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Flatten the table into one record per (run, column)
    pub fn records(&self) -> Vec<MetaRecord> {
        self.columns
            .iter()
            .flat_map(|(column, values)| {
                values.iter().map(move |(run, value)| MetaRecord {
                    model: run.model.clone(),
                    scenario: run.scenario.clone(),
                    column: column.clone(),
                    value: *value,
                })
            })
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FrameDocument {
    Rows(Vec<Observation>),
    Wrapped { data: Vec<Observation> },
}

/// Long-format scenario dataset with run metadata
#[derive(Debug, Clone, Default)]
pub struct IamFrame {
    data: Vec<Observation>,
    meta: MetaTable,
}

impl IamFrame {
    pub fn new(data: Vec<Observation>) -> Self {
        Self {
            data,
            meta: MetaTable::default(),
        }
    }

    /// Parse either a bare JSON array of observations or `{"data": [...]}`
    pub fn from_json_reader(reader: impl Read) -> Result<Self, QueryError> {
        let doc: FrameDocument = serde_json::from_reader(reader)?;
        let data = match doc {
            FrameDocument::Rows(rows) => rows,
            FrameDocument::Wrapped { data } => data,
        };
        Ok(Self::new(data))
    }

    pub fn data(&self) -> &[Observation] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn meta(&self) -> &MetaTable {
        &self.meta
    }

    pub fn set_meta(&mut self, column: &str, run: &RunKey, value: u8) {
        self.meta.set(column, run, value);
    }

    /// Distinct runs in index order
    pub fn runs(&self) -> Vec<RunKey> {
        self.data
            .iter()
            .map(Observation::run_key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// All rows belonging to one run, without metadata
    pub fn run_slice(&self, run: &RunKey) -> Self {
        Self::new(
            self.data
                .iter()
                .filter(|o| o.model == run.model && o.scenario == run.scenario)
                .cloned()
                .collect(),
        )
    }

    /// Every run's rows in one pass, keyed and ordered like [`runs`](Self::runs)
    pub fn split_runs(&self) -> BTreeMap<RunKey, IamFrame> {
        let mut rows: BTreeMap<RunKey, Vec<Observation>> = BTreeMap::new();
        for obs in &self.data {
            rows.entry(obs.run_key()).or_default().push(obs.clone());
        }
        rows.into_iter().map(|(run, data)| (run, Self::new(data))).collect()
    }

    /// Whether any row matches the measurand, optionally in a region and year
    pub fn contains(&self, measurand: &Measurand, region: Option<&str>, year: Option<i32>) -> bool {
        self.data.iter().any(|o| {
            o.variable == measurand.variable
                && o.unit == measurand.unit
                && region.map_or(true, |r| o.region == r)
                && year.map_or(true, |y| o.year == y)
        })
    }

    pub(crate) fn group_series(&self) -> BTreeMap<SeriesKey, Vec<&Observation>> {
        let mut groups: BTreeMap<SeriesKey, Vec<&Observation>> = BTreeMap::new();
        for obs in &self.data {
            groups.entry(obs.series_key()).or_default().push(obs);
        }
        groups
    }
}

impl FromIterator<Observation> for IamFrame {
    fn from_iter<T: IntoIterator<Item = Observation>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
