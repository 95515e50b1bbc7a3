use clap::Parser;
use journey_engine::{Cli, LoggingConfig, cli, init_logging, shutdown_telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging goes to stderr so stdout stays machine-readable
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(logging_config)?;

    let args = Cli::parse();
    let result = cli::run(args).await;

    // Ensure traces are flushed before exit
    shutdown_telemetry();

    result
}
