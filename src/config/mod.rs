//! Configuration
//!
//! Process-level settings (where the cluster definitions live, which region
//! rules are read in) and the immutable per-cluster configuration handed to
//! the classifier.

mod cluster;

pub use cluster::ClusterConfig;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ConfigError;

/// Aggregation region every rule is evaluated in
pub const DEFAULT_REGION: &str = "World";

pub const ENV_DEFINITIONS_DIR: &str = "IMP_DEFINITIONS_DIR";
pub const ENV_REGION: &str = "IMP_REGION";

/// Per-cluster overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterSettings {
    /// Curated `model|scenario` list; relative paths resolve against the
    /// definitions directory
    pub allow_list: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSettings {
    pub definitions_dir: PathBuf,
    pub region: String,
    pub clusters: BTreeMap<String, ClusterSettings>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        let mut clusters = BTreeMap::new();
        clusters.insert(
            "SDG".to_string(),
            ClusterSettings {
                allow_list: Some(PathBuf::from("metadata/sdg_scenarios/imp_sdg.yaml")),
            },
        );
        Self {
            definitions_dir: PathBuf::from("definitions"),
            region: DEFAULT_REGION.to_string(),
            clusters,
        }
    }
}

impl ClassifierSettings {
    /// Read settings from an optional YAML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => {
                let content = read_source(path)?;
                serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };
        Ok(settings.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(ENV_DEFINITIONS_DIR) {
            info!("Definitions directory overridden by {}: {}", ENV_DEFINITIONS_DIR, dir);
            self.definitions_dir = PathBuf::from(dir);
        }
        if let Ok(region) = std::env::var(ENV_REGION) {
            self.region = region;
        }
        self
    }

    pub fn allow_list_path(&self, cluster: &str) -> Option<PathBuf> {
        let path = self.clusters.get(cluster)?.allow_list.as_ref()?;
        if path.is_absolute() {
            Some(path.clone())
        } else {
            Some(self.definitions_dir.join(path))
        }
    }

    /// Load everything one cluster needs from the definitions directory
    pub fn cluster_config(&self, cluster: &str) -> Result<ClusterConfig, ConfigError> {
        ClusterConfig::from_definitions(self, cluster)
    }
}

pub(crate) fn read_source(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ClusterClassifier;
    use crate::frame::{IamFrame, Observation, RunKey};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Serializes tests that read or write process environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn regional(scenario: &str, region: &str, value: f64) -> Observation {
        Observation {
            model: "MESSAGE".to_string(),
            scenario: scenario.to_string(),
            region: region.to_string(),
            variable: "Emissions|CO2".to_string(),
            unit: "Mt CO2/yr".to_string(),
            year: 2050,
            value,
        }
    }

    #[test]
    fn test_defaults() {
        let settings = ClassifierSettings::default();
        assert_eq!(settings.region, "World");
        assert_eq!(
            settings.allow_list_path("SDG"),
            Some(PathBuf::from("definitions/metadata/sdg_scenarios/imp_sdg.yaml"))
        );
        assert_eq!(settings.allow_list_path("HighRen"), None);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "definitions_dir: /opt/imp/definitions").unwrap();

        let settings = ClassifierSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.definitions_dir, PathBuf::from("/opt/imp/definitions"));
        assert_eq!(settings.region, "World");
    }

    #[test]
    fn test_env_overrides_select_definitions_and_region() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("variable")).unwrap();
        std::fs::create_dir_all(dir.path().join("requirements")).unwrap();
        std::fs::write(
            dir.path().join("variable/imp_negemis.yaml"),
            "- Emissions|CO2:\n    unit: Mt CO2/yr\n    bound: upper\n    threshold: 100\n    type: abs\n    year: 2050\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("requirements/req_data_negemis.yaml"),
            "required_data:\n  - variable: Emissions|CO2\n    unit: Mt CO2/yr\n",
        )
        .unwrap();

        std::env::set_var(ENV_DEFINITIONS_DIR, dir.path());
        std::env::set_var(ENV_REGION, "R5ASIA");
        let loaded = ClassifierSettings::load(None);
        std::env::remove_var(ENV_DEFINITIONS_DIR);
        std::env::remove_var(ENV_REGION);

        let settings = loaded.unwrap();
        assert_eq!(settings.definitions_dir, dir.path());
        assert_eq!(settings.region, "R5ASIA");

        let config = settings.cluster_config("NegEmis").unwrap();
        assert_eq!(config.region, "R5ASIA");

        // World rows would flip both verdicts
        let frame = IamFrame::new(vec![
            regional("clean", "R5ASIA", 50.0),
            regional("clean", "World", 500.0),
            regional("dirty", "R5ASIA", 150.0),
            regional("dirty", "World", 10.0),
        ]);
        let out = ClusterClassifier::new(config).apply(frame).unwrap();
        assert_eq!(out.meta().get("NegEmis", &RunKey::new("MESSAGE", "clean")), Some(1));
        assert_eq!(out.meta().get("NegEmis", &RunKey::new("MESSAGE", "dirty")), Some(0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ClassifierSettings::load(Some(Path::new("/nonexistent/settings.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
