//! Required-Data Specification
//!
//! Lists the (variable, unit) pairs a model must report before any rule of a
//! cluster is evaluated. The file layout follows the nomenclature
//! required-data format:
//!
//! ```yaml
//! description: Required variables for the HighRen cluster
//! required_data:
//!   - measurand:
//!       - Primary Energy:
//!           unit: EJ/yr
//!       - Primary Energy|Renewables (incl. Biomass):
//!           unit: EJ/yr
//!     region: [World]
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::config::read_source;
use crate::error::ConfigError;
use crate::frame::{IamFrame, Measurand};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MeasurandAttrs {
    unit: String,
}

#[derive(Debug, Deserialize)]
struct RawRequirement {
    measurand: Option<Vec<BTreeMap<String, MeasurandAttrs>>>,
    variable: Option<OneOrMany<String>>,
    unit: Option<String>,
    region: Option<OneOrMany<String>>,
    year: Option<OneOrMany<i32>>,
    model: Option<OneOrMany<String>>,
}

#[derive(Debug, Deserialize)]
struct RawSpec {
    description: Option<String>,
    model: Option<OneOrMany<String>>,
    required_data: Vec<RawRequirement>,
}

/// One block of measurands that must all be present
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirement {
    pub measurands: Vec<Measurand>,
    /// Restricts the block to these models
    pub models: Option<Vec<String>>,
    /// Every listed region must carry data
    pub regions: Option<Vec<String>>,
    /// Every listed year must carry data
    pub years: Option<Vec<i32>>,
}

impl Requirement {
    fn applies_to(&self, model: &str) -> bool {
        self.models
            .as_ref()
            .map_or(true, |models| models.iter().any(|m| m == model))
    }

    fn is_present(&self, slice: &IamFrame, measurand: &Measurand) -> bool {
        let regions: Vec<Option<&str>> = match &self.regions {
            Some(regions) => regions.iter().map(|r| Some(r.as_str())).collect(),
            None => vec![None],
        };
        let years: Vec<Option<i32>> = match &self.years {
            Some(years) => years.iter().copied().map(Some).collect(),
            None => vec![None],
        };
        regions
            .iter()
            .all(|region| years.iter().all(|year| slice.contains(measurand, *region, *year)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequiredDataSpec {
    pub description: Option<String>,
    requirements: Vec<Requirement>,
}

impl RequiredDataSpec {
    /// A spec with a single unrestricted block
    pub fn from_measurands(measurands: impl IntoIterator<Item = Measurand>) -> Self {
        Self {
            description: None,
            requirements: vec![Requirement {
                measurands: measurands.into_iter().collect(),
                ..Requirement::default()
            }],
        }
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_source(path)?;
        Self::parse(&content, path)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, Path::new("<inline>"))
    }

    fn parse(yaml: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawSpec = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;
        let file_models = raw.model.map(OneOrMany::into_vec);

        let requirements = raw
            .required_data
            .into_iter()
            .map(|entry| -> Result<Requirement, ConfigError> {
                let mut measurands: Vec<Measurand> = entry
                    .measurand
                    .unwrap_or_default()
                    .into_iter()
                    .flat_map(|m| m.into_iter().map(|(variable, attrs)| Measurand::new(variable, attrs.unit)))
                    .collect();

                if let Some(variables) = entry.variable {
                    let unit = entry.unit.ok_or_else(|| ConfigError::MalformedRequirement {
                        path: origin.to_path_buf(),
                        reason: "'variable' entries need a 'unit'".to_string(),
                    })?;
                    measurands.extend(variables.into_vec().into_iter().map(|v| Measurand::new(v, &unit)));
                }

                if measurands.is_empty() {
                    return Err(ConfigError::MalformedRequirement {
                        path: origin.to_path_buf(),
                        reason: "entry names no measurand".to_string(),
                    });
                }

                Ok(Requirement {
                    measurands,
                    models: entry.model.map(OneOrMany::into_vec).or_else(|| file_models.clone()),
                    regions: entry.region.map(OneOrMany::into_vec),
                    years: entry.year.map(OneOrMany::into_vec),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            description: raw.description,
            requirements,
        })
    }

    /// Measurands this model must report but the slice lacks.
    ///
    /// An empty result means the gate passes.
    pub fn missing_for_model(&self, slice: &IamFrame, model: &str) -> Vec<Measurand> {
        let mut missing = BTreeSet::new();
        for requirement in self.requirements.iter().filter(|r| r.applies_to(model)) {
            for measurand in &requirement.measurands {
                if !requirement.is_present(slice, measurand) {
                    missing.insert(measurand.clone());
                }
            }
        }
        missing.into_iter().collect()
    }
}
