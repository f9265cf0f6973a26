use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directive: the library plus the bundled binaries.
const DEFAULT_DIRECTIVE: &str = "fraud_etl=info,toml_etl=info,generate_data=info";
const VERBOSE_DIRECTIVE: &str = "fraud_etl=debug,toml_etl=debug,generate_data=debug,info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn init_cli_logger(verbose: bool) {
    let directive = if verbose { VERBOSE_DIRECTIVE } else { DEFAULT_DIRECTIVE };

    tracing_subscriber::registry()
        .with(env_filter(directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

fn json_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true),
    )
}

/// JSON lines on stdout, for workers whose log collector parses structured output.
pub fn init_json_logger() {
    json_subscriber(env_filter(DEFAULT_DIRECTIVE)).init();
}
