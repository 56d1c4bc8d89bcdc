use crate::core::FanOut;
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "dtweb-measure")]
#[command(about = "Latency measurements for the digital twin web")]
pub struct CliArgs {
    /// Path to TOML parameter file
    #[arg(short, long, default_value = "measure.toml")]
    pub config: String,

    /// Root folder for measurement results
    #[arg(long, default_value = "measurements")]
    pub output_dir: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit diagnostics as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Log memory usage before every sample
    #[arg(long)]
    pub monitor: bool,

    /// Traverse children one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,

    /// Show what would be measured without sending requests
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn fan_out(&self) -> FanOut {
        if self.sequential {
            FanOut::Sequential
        } else {
            FanOut::Concurrent
        }
    }
}

impl Validate for CliArgs {
    fn validate(&self) -> Result<()> {
        validate_path("config", &self.config)?;
        validate_path("output_dir", &self.output_dir)
    }
}
