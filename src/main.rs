use clap::Parser;
use fraud_etl::utils::error::{EtlError, ErrorSeverity};
use fraud_etl::utils::{logger, validation::Validate};
use fraud_etl::{CliConfig, EtlEngine, LocalStorage, TracingDiagnostics, TransactionLoadPipeline};
use std::sync::Arc;
use tracing::Instrument;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting fraud-etl CLI");
    tracing::debug!(
        "Input: {}, table: {}, sink: {:?}, batch size: {}",
        config.input,
        config.sink.output_table,
        config.sink.kind,
        config.batch_size
    );

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let sink = match config.sink.build(&config.execution) {
        Ok(sink) => sink,
        Err(e) => exit_with(e),
    };
    let span = config.execution.span();

    // 輸入檔路徑由 --input 決定，相對於目前目錄
    let storage = LocalStorage::new(".");
    let pipeline =
        TransactionLoadPipeline::new(storage, sink, config, Arc::new(TracingDiagnostics));
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().instrument(span).await {
        Ok(destination) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("✅ ETL process completed successfully!");
            println!("📁 Rows appended to: {}", destination);
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: EtlError) -> ! {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
