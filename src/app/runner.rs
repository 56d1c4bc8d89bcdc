use crate::config::toml_config::{MeasureConfig, MeasurementParams};
use crate::core::{BatchOrchestrator, ConfigProvider, FanOut, MeasurementConfig, TimingRecorder, TwinClient};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use crate::utils::validation::Validate;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const LOG_FILENAME: &str = "main_log.csv";
pub const PARAMS_FILENAME: &str = "params.toml";
pub const REGISTRY_FOLDER: &str = "registry_measurement";
pub const NETWORK_FOLDER: &str = "network_measurements";
/// Always holds a copy of the most recent measurement folder.
pub const LATEST_FOLDER: &str = "latest";

/// 一次完整量測的輸出位置
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub folder: PathBuf,
    pub latest: PathBuf,
    pub registry_log: Option<PathBuf>,
    pub network_logs: Vec<(String, PathBuf)>,
}

/// Repeats batches `samples` times per configured run and lays out the
/// measurement folders.
pub struct MeasurementRunner<C> {
    client: Arc<C>,
    output_dir: PathBuf,
    fan_out: FanOut,
    monitor: SystemMonitor,
}

impl<C: TwinClient + 'static> MeasurementRunner<C> {
    pub fn new(client: Arc<C>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            fan_out: FanOut::Concurrent,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    /// Runs every enabled measurement of `config` into a fresh timestamped folder.
    pub async fn run_suite(&self, config: &MeasureConfig) -> Result<SuiteReport> {
        config.validate()?;

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
        let folder = self
            .output_dir
            .join(&config.foldername)
            .join(format!("measurements-{}", timestamp));
        fs::create_dir_all(&folder)?;
        fs::write(folder.join(PARAMS_FILENAME), config.to_toml_string()?)?;
        tracing::info!("📁 Writing to folder: {}", folder.display());

        let registry_log = match config.enabled_registry_run() {
            Some(params) => {
                tracing::info!("---- Starting registry measurement ----");
                let run_folder = folder.join(REGISTRY_FOLDER);
                Some(self.run_registry_measurement(params, &run_folder).await?)
            }
            None => {
                tracing::info!("Skipped registry measurement due to parameter file configuration");
                None
            }
        };

        let mut network_logs = Vec::new();
        for (name, params) in config.enabled_network_runs() {
            tracing::info!("---- Running network measurement: {} ----", name);
            let run_folder = folder.join(NETWORK_FOLDER).join(name);
            let log = self.run_network_measurement(params, &run_folder).await?;
            network_logs.push((name.clone(), log));
        }

        let latest = self.output_dir.join(&config.foldername).join(LATEST_FOLDER);
        copy_tree(&folder, &latest)?;
        tracing::info!("📋 Copied all files to {}", latest.display());

        self.monitor.log_final_stats();

        Ok(SuiteReport {
            folder,
            latest,
            registry_log,
            network_logs,
        })
    }

    pub async fn run_registry_measurement(&self, params: &MeasurementParams, folder: &Path) -> Result<PathBuf> {
        params.validate_as("registry_measurement.params")?;
        let (orchestrator, log_path) = self.prepare(params, folder)?;

        for sample in 1..=params.samples() {
            self.before_sample(sample, params).await;
            let config = MeasurementConfig::for_sample(params, sample);
            orchestrator.run_registry(&config).await?;
        }

        tracing::info!("Registry measurement done: {}", log_path.display());
        Ok(log_path)
    }

    pub async fn run_network_measurement(&self, params: &MeasurementParams, folder: &Path) -> Result<PathBuf> {
        params.validate_as("network_measurements.params")?;
        let (orchestrator, log_path) = self.prepare(params, folder)?;

        for sample in 1..=params.samples() {
            self.before_sample(sample, params).await;
            let config = MeasurementConfig::for_sample(params, sample);
            orchestrator.run_network(&config).await?;
        }

        tracing::info!("Network measurement done: {}", log_path.display());
        Ok(log_path)
    }

    fn prepare(&self, params: &MeasurementParams, folder: &Path) -> Result<(BatchOrchestrator<C>, PathBuf)> {
        fs::create_dir_all(folder)?;
        fs::write(folder.join(PARAMS_FILENAME), toml::to_string_pretty(params)?)?;

        let log_path = folder.join(LOG_FILENAME);
        let recorder = Arc::new(TimingRecorder::open(&log_path)?);
        tracing::info!(
            "Measuring {} DTID(s), {} sample(s), writing to {}",
            params.dtids.len(),
            params.samples,
            recorder.destination()
        );

        let orchestrator =
            BatchOrchestrator::new(self.client.clone(), recorder).with_fan_out(self.fan_out);
        Ok((orchestrator, log_path))
    }

    async fn before_sample(&self, sample: u32, params: &MeasurementParams) {
        self.monitor
            .log_stats(&format!("Sample {} / {}", sample, params.samples));
        tokio::time::sleep(params.pause()).await;
    }
}

// 合併複製：已存在的檔案會被覆寫，舊檔保留
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
