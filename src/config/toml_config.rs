use crate::core::ConfigProvider;
use crate::utils::error::{MeasureError, Result};
use crate::utils::validation::{
    validate_non_empty_list, validate_path, validate_positive_number, validate_timeout,
    validate_url, Validate,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const MAX_TIMEOUT_SECONDS: f64 = 600.0;

fn default_timeout_registry() -> f64 {
    3.0
}

fn default_timeout_base() -> f64 {
    2.0
}

fn default_pause_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureConfig {
    pub foldername: String,
    pub registry_measurement: Option<MeasurementRun>,
    /// 依參數檔中的順序執行
    #[serde(default)]
    pub network_measurements: IndexMap<String, MeasurementRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRun {
    pub run: bool,
    pub params: MeasurementParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementParams {
    pub samples: u32,
    pub dtids: Vec<String>,
    /// DTID → hosting URL 解析逾時（秒）
    #[serde(default = "default_timeout_registry")]
    pub timeout_registry: f64,
    /// Hosting URL → DT doc 下載逾時（秒）
    #[serde(default = "default_timeout_base")]
    pub timeout_base: f64,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl MeasurementParams {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    /// Validates one run's parameters; `prefix` names the run in error messages.
    pub fn validate_as(&self, prefix: &str) -> Result<()> {
        validate_positive_number(&format!("{}.samples", prefix), self.samples, 1)?;
        validate_non_empty_list(&format!("{}.dtids", prefix), &self.dtids)?;
        for dtid in &self.dtids {
            validate_url(&format!("{}.dtids", prefix), dtid)?;
        }
        validate_timeout(
            &format!("{}.timeout_registry", prefix),
            self.timeout_registry,
            MAX_TIMEOUT_SECONDS,
        )?;
        validate_timeout(
            &format!("{}.timeout_base", prefix),
            self.timeout_base,
            MAX_TIMEOUT_SECONDS,
        )
    }
}

impl ConfigProvider for MeasurementParams {
    fn identifiers(&self) -> &[String] {
        &self.dtids
    }

    fn resolve_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_registry)
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_base)
    }

    fn samples(&self) -> u32 {
        self.samples
    }
}

impl MeasureConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MeasureError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MeasureError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${REGISTRY_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MeasureError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Runs with `run = true`, registry measurement excluded.
    pub fn enabled_network_runs(&self) -> impl Iterator<Item = (&String, &MeasurementParams)> {
        self.network_measurements
            .iter()
            .filter(|(_, run)| run.run)
            .map(|(name, run)| (name, &run.params))
    }

    pub fn enabled_registry_run(&self) -> Option<&MeasurementParams> {
        self.registry_measurement
            .as_ref()
            .filter(|run| run.run)
            .map(|run| &run.params)
    }
}

impl Validate for MeasureConfig {
    fn validate(&self) -> Result<()> {
        validate_path("foldername", &self.foldername)?;

        if let Some(registry) = &self.registry_measurement {
            registry.params.validate_as("registry_measurement.params")?;
        }
        for (name, run) in &self.network_measurements {
            run.params
                .validate_as(&format!("network_measurements.{}.params", name))?;
        }

        if self.enabled_registry_run().is_none() && self.enabled_network_runs().next().is_none() {
            return Err(MeasureError::ConfigValidationError {
                field: "network_measurements".to_string(),
                message: "No measurement has run = true".to_string(),
            });
        }

        Ok(())
    }
}
