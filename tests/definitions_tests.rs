use std::fs;
use std::path::Path;

use imp_clusters::config::ClusterSettings;
use imp_clusters::{ClassifierSettings, ClusterClassifier, ConfigError, Evaluation, IamFrame, RunKey};

const HIGHREN_RULES: &str = r#"
- Primary Energy|Renewables (incl. Biomass):
    description: Share of renewables in primary energy
    unit: EJ/yr
    bound: lower
    threshold: 0.5
    type: share
    year: 2050
    substitutes:
      - Primary Energy|Biomass
      - Primary Energy|Non-Biomass Renewables
"#;

const HIGHREN_EMISSIONS: &str = r#"
- Emissions|CO2:
    unit: Mt CO2/yr
    bound: upper
    threshold: 10000
    type: abs
    year: 2050
"#;

const REQ_HIGHREN: &str = r#"
description: HighRen required variables
required_data:
  - measurand:
      - Primary Energy:
          unit: EJ/yr
      - Primary Energy|Renewables (incl. Biomass):
          unit: EJ/yr
      - Emissions|CO2:
          unit: Mt CO2/yr
    region: World
"#;

const REQ_HIGHREN_ALT: &str = r#"
required_data:
  - measurand:
      - Primary Energy:
          unit: EJ/yr
      - Primary Energy|Biomass:
          unit: EJ/yr
      - Primary Energy|Non-Biomass Renewables:
          unit: EJ/yr
      - Emissions|CO2:
          unit: Mt CO2/yr
"#;

const REQ_SDG: &str = r#"
required_data:
  - variable: Emissions|CO2
    unit: Mt CO2/yr
"#;

const SDG_SCENARIOS: &str = r#"
- IMAGE 3.2|SSP1-SDG
"#;

const DATA: &str = r#"[
  {"model": "IMAGE 3.2", "scenario": "SSP1-SDG", "region": "World", "variable": "Primary Energy", "unit": "EJ/yr", "year": 2050, "value": 400},
  {"model": "IMAGE 3.2", "scenario": "SSP1-SDG", "region": "World", "variable": "Primary Energy|Biomass", "unit": "EJ/yr", "year": 2050, "value": 100},
  {"model": "IMAGE 3.2", "scenario": "SSP1-SDG", "region": "World", "variable": "Primary Energy|Non-Biomass Renewables", "unit": "EJ/yr", "year": 2050, "value": 150},
  {"model": "IMAGE 3.2", "scenario": "SSP1-SDG", "region": "World", "variable": "Emissions|CO2", "unit": "Mt CO2/yr", "year": 2050, "value": 2000},
  {"model": "IMAGE 3.2", "scenario": "SSP2-Base", "region": "World", "variable": "Primary Energy", "unit": "EJ/yr", "year": 2050, "value": 700},
  {"model": "IMAGE 3.2", "scenario": "SSP2-Base", "region": "World", "variable": "Primary Energy|Renewables (incl. Biomass)", "unit": "EJ/yr", "year": 2050, "value": 140},
  {"model": "IMAGE 3.2", "scenario": "SSP2-Base", "region": "World", "variable": "Emissions|CO2", "unit": "Mt CO2/yr", "year": 2050, "value": 45000}
]"#;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn definitions() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("variable/imp_highren_energy.yaml"), HIGHREN_RULES);
    write(&root.join("variable/imp_highren_emissions.yaml"), HIGHREN_EMISSIONS);
    write(&root.join("variable/README.md"), "highren notes");
    write(&root.join("requirements/req_data_highren.yaml"), REQ_HIGHREN);
    write(&root.join("requirements/req_data_highren_alt.yaml"), REQ_HIGHREN_ALT);
    write(&root.join("requirements/req_data_sdg.yaml"), REQ_SDG);
    write(&root.join("metadata/sdg_scenarios/imp_sdg.yaml"), SDG_SCENARIOS);
    dir
}

fn settings(dir: &Path) -> ClassifierSettings {
    ClassifierSettings {
        definitions_dir: dir.to_path_buf(),
        ..ClassifierSettings::default()
    }
}

#[test]
fn test_load_highren_from_definitions() {
    let dir = definitions();
    let config = settings(dir.path()).cluster_config("HighRen").unwrap();

    // Files are read in name order: emissions before energy
    let kinds: Vec<Evaluation> = config.rules.iter().map(|r| r.evaluation).collect();
    assert_eq!(
        kinds,
        vec![Evaluation::Absolute { year: 2050 }, Evaluation::Share { year: 2050 }]
    );
    assert!(config.alternate_requirements.is_some());
    assert!(config.allow_list.is_none());
    assert_eq!(config.region, "World");
}

#[test]
fn test_classify_from_definitions() {
    let dir = definitions();
    let settings = settings(dir.path());
    let frame = IamFrame::from_json_reader(DATA.as_bytes()).unwrap();

    let highren = ClusterClassifier::new(settings.cluster_config("HighRen").unwrap());
    let sdg = ClusterClassifier::new(settings.cluster_config("SDG").unwrap());
    let out = imp_clusters::classify_all(frame, &[highren, sdg]).unwrap();

    let sdg_run = RunKey::new("IMAGE 3.2", "SSP1-SDG");
    let base_run = RunKey::new("IMAGE 3.2", "SSP2-Base");

    // (100 + 150) / 400 passes through the alternate variables
    assert_eq!(out.meta().get("HighRen", &sdg_run), Some(1));
    // 45000 Mt in 2050 breaks the emissions rule
    assert_eq!(out.meta().get("HighRen", &base_run), Some(0));
    assert_eq!(out.meta().get("SDG", &sdg_run), Some(1));
    assert_eq!(out.meta().get("SDG", &base_run), Some(0));
}

#[test]
fn test_cluster_without_catalog_is_rejected() {
    let dir = definitions();
    write(&dir.path().join("requirements/req_data_lowdemand.yaml"), REQ_SDG);

    let err = settings(dir.path()).cluster_config("LowDemand").unwrap_err();
    assert!(matches!(err, ConfigError::MissingCatalog { .. }));
}

#[test]
fn test_malformed_catalog_is_fatal() {
    let dir = definitions();
    write(
        &dir.path().join("variable/imp_highren_broken.yaml"),
        "- Final Energy:\n    unit: EJ/yr\n    bound: upper\n    threshold: 1\n    type: peak\n    year: 2050\n",
    );

    let err = settings(dir.path()).cluster_config("HighRen").unwrap_err();
    assert!(matches!(err, ConfigError::MalformedRule { ref key, .. } if key == "Final Energy"));
}

#[test]
fn test_custom_allow_list_location() {
    let dir = definitions();
    write(&dir.path().join("lists/curated.yaml"), "- IMAGE 3.2|SSP2-Base\n");

    let mut settings = settings(dir.path());
    settings.clusters.insert(
        "HighRen".to_string(),
        ClusterSettings {
            allow_list: Some("lists/curated.yaml".into()),
        },
    );

    let config = settings.cluster_config("HighRen").unwrap();
    let list = config.allow_list.as_ref().unwrap();
    assert!(list.contains(&RunKey::new("IMAGE 3.2", "SSP2-Base")));
    assert!(!list.contains(&RunKey::new("IMAGE 3.2", "SSP1-SDG")));
}
