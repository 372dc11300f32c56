use clap::Parser;
use sheetfill::{CliArgs, LoggingConfig, PipelineConfig, init_logging, run_pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(logging_config)?;

    let cli = CliArgs::parse();
    let config = PipelineConfig::from_args(cli)?;

    let summary = run_pipeline(config).await?;
    println!("{summary}");

    Ok(())
}
