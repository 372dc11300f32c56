pub mod apply;
pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod infer;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod utils;

pub use config::{CliArgs, InferenceSettings, PipelineConfig};
pub use error::{ErrorClass, InferenceError};
pub use infer::{CompletionBackend, HttpCompletionBackend, InferenceClient};
pub use logging::{LoggingConfig, init_logging};
pub use model::{AnalysisResult, InferenceOutcome, InferenceRecord, RunSummary};

use anyhow::Result;

/// Run the whole batch against the configured HTTP completion backend.
/// Credential and input-location problems surface here before any unit is
/// attempted; everything non-fatal degrades per unit and lands in the
/// returned summary.
pub async fn run_pipeline(config: PipelineConfig) -> Result<RunSummary> {
    let backend = HttpCompletionBackend::from_settings(&config.inference)?;

    tracing::info!(
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        model = %config.inference.model,
        "starting fill pipeline"
    );

    pipeline::run(&config, &backend).await
}
