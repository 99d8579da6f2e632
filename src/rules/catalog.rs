//! Loads rule catalogs from code-list style YAML.
//!
//! ```yaml
//! - Emissions|CO2:
//!     description: Net CO2 emissions
//!     unit: Mt CO2/yr
//!     bound: upper
//!     threshold: 0
//!     type: abs
//!     year: 2050
//! ```

use serde::Deserialize;
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

use super::{Bound, Evaluation, RuleDescriptor};
use crate::config::read_source;
use crate::error::ConfigError;

/// Ordered rules of one cluster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleCatalog {
    rules: Vec<RuleDescriptor>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    bound: Option<String>,
    threshold: Option<f64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    year: Option<Value>,
    unit: Option<String>,
    substitutes: Option<Vec<String>>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<RuleDescriptor>) -> Self {
        Self { rules }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_source(path)?;
        Self::parse(&content, path)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, Path::new("<inline>"))
    }

    fn parse(yaml: &str, origin: &Path) -> Result<Self, ConfigError> {
        let doc: Value = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;

        let mut entries: Vec<(Value, Value)> = Vec::new();
        match doc {
            Value::Null => {}
            Value::Mapping(map) => entries.extend(map),
            Value::Sequence(items) => {
                for item in items {
                    match item {
                        Value::Mapping(map) if map.len() == 1 => entries.extend(map),
                        other => {
                            return Err(ConfigError::MalformedRule {
                                key: format!("{:?}", other),
                                reason: "catalog entries must be single-key mappings".to_string(),
                            })
                        }
                    }
                }
            }
            _ => {
                return Err(ConfigError::MalformedRule {
                    key: origin.display().to_string(),
                    reason: "catalog must be a list or a mapping".to_string(),
                })
            }
        }

        let rules = entries
            .into_iter()
            .map(|(key, attrs)| {
                let key = key.as_str().map(str::to_string).ok_or_else(|| ConfigError::MalformedRule {
                    key: format!("{:?}", key),
                    reason: "variable identifier must be a string".to_string(),
                })?;
                build_rule(key, attrs)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Loaded {} rules from {}", rules.len(), origin.display());
        Ok(Self { rules })
    }

    pub fn extend(&mut self, other: RuleCatalog) {
        self.rules.extend(other.rules);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleDescriptor> {
        self.rules.iter()
    }

    pub fn rules(&self) -> &[RuleDescriptor] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleCatalog {
    type Item = &'a RuleDescriptor;
    type IntoIter = std::slice::Iter<'a, RuleDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn build_rule(key: String, attrs: Value) -> Result<RuleDescriptor, ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedRule {
        key: key.clone(),
        reason,
    };

    let raw: RawRule = serde_yaml::from_value(attrs).map_err(|e| malformed(e.to_string()))?;

    let bound = match raw.bound.as_deref() {
        Some("upper") => Bound::Upper,
        Some("lower") => Bound::Lower,
        Some(other) => return Err(malformed(format!("unknown bound '{}'", other))),
        None => return Err(malformed("missing bound".to_string())),
    };
    let threshold = raw.threshold.ok_or_else(|| malformed("missing threshold".to_string()))?;
    let unit = raw.unit.ok_or_else(|| malformed("missing unit".to_string()))?;
    let year = raw.year.ok_or_else(|| malformed("missing year".to_string()))?;

    let evaluation = match raw.kind.as_deref() {
        Some("abs") | Some("absolute") => Evaluation::Absolute {
            year: parse_year(&year).map_err(malformed)?,
        },
        Some("share") => Evaluation::Share {
            year: parse_year(&year).map_err(malformed)?,
        },
        Some("change") => {
            let (start, end) = parse_range(&year).map_err(malformed)?;
            Evaluation::Change { start, end }
        }
        Some("cum") | Some("cumulative") => {
            let (start, end) = parse_range(&year).map_err(malformed)?;
            Evaluation::Cumulative { start, end }
        }
        Some(other) => return Err(malformed(format!("unknown evaluation type '{}'", other))),
        None => return Err(malformed("missing type".to_string())),
    };

    Ok(RuleDescriptor {
        key,
        bound,
        threshold,
        evaluation,
        unit,
        substitutes: raw.substitutes,
    })
}

fn parse_year(value: &Value) -> Result<i32, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .ok_or_else(|| format!("year {} is not an integer", n)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("cannot read year from '{}'", s)),
        other => Err(format!("cannot read year from {:?}", other)),
    }
}

fn parse_range(value: &Value) -> Result<(i32, i32), String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("expected a 'start-end' range, got {:?}", value))?;
    let (start, end) = text
        .split_once('-')
        .ok_or_else(|| format!("expected a 'start-end' range, got '{}'", text))?;
    let start: i32 = start
        .trim()
        .parse()
        .map_err(|_| format!("cannot read range start from '{}'", text))?;
    let end: i32 = end
        .trim()
        .parse()
        .map_err(|_| format!("cannot read range end from '{}'", text))?;
    if start > end {
        return Err(format!("range '{}' ends before it starts", text));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIGHREN: &str = r#"
- Primary Energy|Renewables (incl. Biomass):
    description: Renewable share of primary energy
    unit: EJ/yr
    bound: lower
    threshold: 0.5
    type: share
    year: 2050
    substitutes:
      - Primary Energy|Biomass
      - Primary Energy|Non-Biomass Renewables
- Emissions|CO2@2050:
    unit: Mt CO2/yr
    bound: upper
    threshold: 0
    type: change
    year: 2020-2050
- Emissions|CO2:
    unit: Mt CO2/yr
    bound: lower
    threshold: 1000
    type: cum
    year: "2020-2100"
"#;

    #[test]
    fn test_parse_keeps_catalog_order() {
        let catalog = RuleCatalog::from_yaml_str(HIGHREN).unwrap();
        let keys: Vec<&str> = catalog.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Primary Energy|Renewables (incl. Biomass)", "Emissions|CO2@2050", "Emissions|CO2"]
        );
    }

    #[test]
    fn test_parse_evaluations() {
        let catalog = RuleCatalog::from_yaml_str(HIGHREN).unwrap();
        let rules = catalog.rules();
        assert_eq!(rules[0].evaluation, Evaluation::Share { year: 2050 });
        assert_eq!(rules[0].bound, Bound::Lower);
        assert_eq!(rules[0].substitutes.as_ref().map(Vec::len), Some(2));
        assert_eq!(rules[1].evaluation, Evaluation::Change { start: 2020, end: 2050 });
        assert_eq!(rules[1].threshold, 0.0);
        assert_eq!(rules[2].evaluation, Evaluation::Cumulative { start: 2020, end: 2100 });
    }

    #[test]
    fn test_mapping_form_is_accepted() {
        let yaml = "Final Energy:\n  unit: EJ/yr\n  bound: upper\n  threshold: 400\n  type: abs\n  year: 2050\n";
        let catalog = RuleCatalog::from_yaml_str(yaml).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.rules()[0].evaluation, Evaluation::Absolute { year: 2050 });
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let yaml = "- X:\n    unit: u\n    bound: upper\n    threshold: 1\n    type: median\n    year: 2050\n";
        let err = RuleCatalog::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedRule { ref key, .. } if key == "X"));
    }

    #[test]
    fn test_bad_ranges_are_fatal() {
        for year in ["2050", "\"2050-2020\"", "\"20x0-2050\""] {
            let yaml = format!(
                "- X:\n    unit: u\n    bound: upper\n    threshold: 1\n    type: change\n    year: {}\n",
                year
            );
            assert!(RuleCatalog::from_yaml_str(&yaml).is_err(), "accepted year {}", year);
        }
    }

    #[test]
    fn test_missing_threshold_is_fatal() {
        let yaml = "- X:\n    unit: u\n    bound: upper\n    type: abs\n    year: 2050\n";
        let err = RuleCatalog::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("missing threshold"));
    }
}
