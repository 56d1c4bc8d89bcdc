mod common;

use common::{read_rows, Behaviour, FakeTwinWeb};
use dtweb_measure::app::runner::{
    LATEST_FOLDER, LOG_FILENAME, NETWORK_FOLDER, PARAMS_FILENAME, REGISTRY_FOLDER,
};
use dtweb_measure::config::toml_config::MeasurementParams;
use dtweb_measure::utils::validation::Validate;
use dtweb_measure::{MeasureConfig, MeasureError, MeasurementRunner};
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
foldername = "suite"

[registry_measurement]
run = true

[registry_measurement.params]
samples = 2
dtids = ["https://dtid.test/a", "https://dtid.test/b"]
pause_ms = 0

[network_measurements.small_tree]
run = true

[network_measurements.small_tree.params]
samples = 3
dtids = ["https://dtid.test/a"]
timeout_registry = 1.0
timeout_base = 1.0
pause_ms = 0

[network_measurements.skipped]
run = false

[network_measurements.skipped.params]
samples = 1
dtids = ["https://dtid.test/b"]
"#;

fn web() -> FakeTwinWeb {
    FakeTwinWeb::new()
        .twin("https://dtid.test/a", &["https://dtid.test/a1", "https://dtid.test/a2"])
        .twin("https://dtid.test/a1", &[])
        .twin("https://dtid.test/a2", &[])
        .configure("https://dtid.test/b", |twin| twin.fetch = Behaviour::Fail)
}

#[tokio::test]
async fn test_suite_lays_out_measurement_folders() {
    let output = TempDir::new().unwrap();
    let config = MeasureConfig::from_toml_str(CONFIG).unwrap();
    config.validate().unwrap();
    let runner = MeasurementRunner::new(Arc::new(web()), output.path());

    let report = runner.run_suite(&config).await.unwrap();

    assert!(report.folder.starts_with(output.path().join("suite")));
    assert!(report
        .folder
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("measurements-"));
    assert!(report.folder.join(PARAMS_FILENAME).exists());

    let registry_log = report.registry_log.unwrap();
    assert_eq!(
        registry_log,
        report.folder.join(REGISTRY_FOLDER).join(LOG_FILENAME)
    );
    assert!(report.folder.join(REGISTRY_FOLDER).join(PARAMS_FILENAME).exists());

    assert_eq!(report.network_logs.len(), 1);
    let (name, network_log) = &report.network_logs[0];
    assert_eq!(name, "small_tree");
    assert_eq!(
        network_log,
        &report
            .folder
            .join(NETWORK_FOLDER)
            .join("small_tree")
            .join(LOG_FILENAME)
    );
    assert!(!report.folder.join(NETWORK_FOLDER).join("skipped").exists());

    let saved = std::fs::read_to_string(report.folder.join(NETWORK_FOLDER).join("small_tree").join(PARAMS_FILENAME)).unwrap();
    let params: MeasurementParams = toml::from_str(&saved).unwrap();
    assert_eq!(params.samples, 3);
}

#[tokio::test]
async fn test_every_sample_is_appended() {
    let output = TempDir::new().unwrap();
    let config = MeasureConfig::from_toml_str(CONFIG).unwrap();
    let runner = MeasurementRunner::new(Arc::new(web()), output.path());

    let report = runner.run_suite(&config).await.unwrap();

    let registry_rows = read_rows(report.registry_log.as_ref().unwrap());
    let registry_ends: Vec<_> = registry_rows
        .iter()
        .filter(|row| row.event == "Ended measurement loop")
        .map(|row| row.number.as_str())
        .collect();
    assert_eq!(registry_ends, vec!["1", "2"]);
    assert_eq!(
        registry_rows
            .iter()
            .filter(|row| row.dtid == "https://dtid.test/b" && row.event == "Could not fetch DT doc")
            .count(),
        2
    );

    let network_rows = read_rows(&report.network_logs[0].1);
    let network_ends: Vec<_> = network_rows
        .iter()
        .filter(|row| row.event == "Ended measurement loop")
        .map(|row| row.number.as_str())
        .collect();
    assert_eq!(network_ends, vec!["1", "2", "3"]);
    // 3 nodes per sample, one fan-out row each
    assert_eq!(
        network_rows
            .iter()
            .filter(|row| row.event == "Duration to fetch all children")
            .count(),
        9
    );
}

#[tokio::test]
async fn test_unwritable_output_aborts() {
    let output = TempDir::new().unwrap();
    let blocker = output.path().join("blocked");
    std::fs::write(&blocker, "not a directory").unwrap();
    let config = MeasureConfig::from_toml_str(CONFIG).unwrap();
    let runner = MeasurementRunner::new(Arc::new(web()), &blocker);

    let result = runner.run_suite(&config).await;

    assert!(matches!(result, Err(MeasureError::IoError(_))));
}

#[tokio::test]
async fn test_latest_holds_a_copy_of_the_last_measurement() {
    let output = TempDir::new().unwrap();
    let config = MeasureConfig::from_toml_str(CONFIG).unwrap();
    let runner = MeasurementRunner::new(Arc::new(web()), output.path());

    let report = runner.run_suite(&config).await.unwrap();

    let latest = output.path().join("suite").join(LATEST_FOLDER);
    assert_eq!(report.latest, latest);
    assert!(latest.join(PARAMS_FILENAME).exists());

    let network_log = latest.join(NETWORK_FOLDER).join("small_tree").join(LOG_FILENAME);
    assert_eq!(
        std::fs::read(&network_log).unwrap(),
        std::fs::read(&report.network_logs[0].1).unwrap()
    );
    assert_eq!(
        read_rows(&latest.join(REGISTRY_FOLDER).join(LOG_FILENAME)).len(),
        read_rows(report.registry_log.as_ref().unwrap()).len()
    );
}

#[tokio::test]
async fn test_invalid_timeout_is_rejected_before_measuring() {
    let output = TempDir::new().unwrap();
    let config = MeasureConfig::from_toml_str(&CONFIG.replace("timeout_registry = 1.0", "timeout_registry = -1.0")).unwrap();
    let web = Arc::new(web());
    let runner = MeasurementRunner::new(web.clone(), output.path());

    let result = runner.run_suite(&config).await;

    assert!(matches!(
        result,
        Err(MeasureError::InvalidConfigValueError { ref field, .. })
            if field == "network_measurements.small_tree.params.timeout_registry"
    ));
    assert!(!output.path().join("suite").exists());
    assert!(web.resolve_calls().is_empty());
}

#[tokio::test]
async fn test_single_run_rejects_invalid_params() {
    let output = TempDir::new().unwrap();
    let runner = MeasurementRunner::new(Arc::new(web()), output.path());
    let params = MeasurementParams {
        samples: 1,
        dtids: vec!["https://dtid.test/a".to_string()],
        timeout_registry: 1.0,
        timeout_base: f64::NAN,
        pause_ms: 0,
    };

    let result = runner
        .run_network_measurement(&params, &output.path().join("run"))
        .await;

    assert!(matches!(
        result,
        Err(MeasureError::InvalidConfigValueError { .. })
    ));
    assert!(!output.path().join("run").exists());
}
