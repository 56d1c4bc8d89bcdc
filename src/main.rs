use anyhow::Context;
use clap::Parser;
use dtweb_measure::config::toml_config::MeasurementParams;
use dtweb_measure::core::ConfigProvider;
use dtweb_measure::utils::error::ErrorSeverity;
use dtweb_measure::utils::{logger, validation::Validate};
use dtweb_measure::{CliArgs, HttpTwinClient, MeasureConfig, MeasurementRunner};
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting dtweb-measure");
    tracing::debug!("CLI args: {:?}", args);

    if let Err(e) = args.validate() {
        tracing::error!("❌ Invalid arguments: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    tracing::info!("📁 Loading parameters from: {}", args.config);
    let config = MeasureConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load parameter file '{}'", args.config))?;

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No requests will be sent");
        return Ok(());
    }

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let client = Arc::new(HttpTwinClient::new().context("Failed to build HTTP client")?);
    let runner = MeasurementRunner::new(client, &args.output_dir)
        .with_fan_out(args.fan_out())
        .with_monitoring(args.monitor);

    let started = Instant::now();
    match runner.run_suite(&config).await {
        Ok(report) => {
            tracing::info!("✅ Measurement finished in {:?}", started.elapsed());
            println!("✅ Measurement finished, see this folder for results:");
            println!("📁 {}", report.folder.display());
            println!("   latest copy: {}", report.latest.display());
            if let Some(log) = &report.registry_log {
                println!("   registry: {}", log.display());
            }
            for (name, log) in &report.network_logs {
                println!("   {}: {}", name, log.display());
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Measurement failed: {} (Severity: {:?})",
                e,
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &MeasureConfig, args: &CliArgs) {
    println!("📋 Measurement Summary:");
    println!("  Folder: {}/{}", args.output_dir, config.foldername);
    println!("  Child fan-out: {:?}", args.fan_out());

    match config.enabled_registry_run() {
        Some(params) => display_run("registry", params),
        None => println!("  registry: skipped"),
    }
    for (name, params) in config.enabled_network_runs() {
        display_run(name, params);
    }
}

fn display_run(name: &str, params: &MeasurementParams) {
    println!(
        "  {}: {} sample(s), timeouts {:?} / {:?}",
        name,
        params.samples(),
        params.resolve_timeout(),
        params.fetch_timeout()
    );
    for dtid in params.identifiers() {
        println!("    - {}", dtid);
    }
}
