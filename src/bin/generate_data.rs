use anyhow::Context;
use clap::Parser;
use fraud_etl::core::generator::{GeneratorConfig, TransactionGenerator, DEFAULT_RECORDS};
use fraud_etl::utils::logger;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "generate-data")]
#[command(about = "Write a CSV of synthetic credit-card transactions")]
struct Args {
    /// Output CSV file
    #[arg(short, long, default_value = "transactions.csv")]
    output: PathBuf,

    /// Number of rows to generate
    #[arg(short = 'n', long, default_value_t = DEFAULT_RECORDS)]
    records: usize,

    /// Probability that a row is flagged as fraud
    #[arg(long, default_value_t = 0.5)]
    fraud_ratio: f64,

    /// Comma separated merchant catalog
    #[arg(long, value_delimiter = ',')]
    merchants: Vec<String>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let mut config = GeneratorConfig {
        records: args.records,
        fraud_ratio: args.fraud_ratio,
        seed: args.seed,
        ..Default::default()
    };
    if !args.merchants.is_empty() {
        config.merchants = args.merchants;
    }

    let mut generator = TransactionGenerator::new(config).context("invalid generator settings")?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("cannot create {}", args.output.display()))?;

    let written = generator
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("failed writing {}", args.output.display()))?;

    tracing::info!("✅ Wrote {} transactions to {}", written, args.output.display());
    println!("✅ Wrote {} transactions to {}", written, args.output.display());
    Ok(())
}
