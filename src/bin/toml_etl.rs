use clap::Parser;
use fraud_etl::config::toml_config::TomlConfig;
use fraud_etl::core::{ConfigProvider, Pipeline};
use fraud_etl::utils::error::ErrorSeverity;
use fraud_etl::utils::{logger, validation::Validate};
use fraud_etl::{EtlEngine, LocalStorage, TracingDiagnostics, TransactionLoadPipeline};
use std::sync::Arc;
use tracing::Instrument;

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Load a transactions CSV using a TOML job file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "fraud-etl.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the input file from config
    #[arg(long)]
    input: Option<String>,

    /// Parse the input without writing anything to the sink
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 載入 TOML 配置
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting TOML-based ETL tool");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 應用命令列覆蓋設定
    if let Some(input) = &args.input {
        config.source.input_path = input.clone();
        tracing::info!("🔧 Input overridden to: {}", input);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let sink = config.sink.build(&config.execution)?;
    let span = config.execution.span();
    let pipeline = TransactionLoadPipeline::new(
        LocalStorage::new("."),
        sink,
        config,
        Arc::new(TracingDiagnostics),
    );

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
        let raw = pipeline.extract().instrument(span.clone()).await?;
        let result = pipeline.transform(raw).instrument(span).await?;
        println!(
            "🔍 Dry run complete: {} records would be appended",
            result.records.len()
        );
        return Ok(());
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().instrument(span).await {
        Ok(destination) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("✅ ETL process completed successfully!");
            println!("📁 Rows appended to: {}", destination);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());

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

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Job: {}", config.job.name);
    if let Some(description) = &config.job.description {
        println!("  Description: {}", description);
    }
    println!("  Input: {}", config.input_path());
    println!("  Header line: {}", config.has_header());
    println!("  Sink: {:?} -> {}", config.sink.kind, config.output_table());
    println!("  Batch size: {}", config.batch_size());
    println!(
        "  Runner: {} ({})",
        config.execution.runner, config.execution.job_name
    );

    if let Some(project) = &config.execution.project {
        println!("  Project: {}", project);
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
