//! Sequential batch orchestration: scan → render → infer → normalize →
//! apply, one worksheet at a time. Non-fatal problems degrade the affected
//! unit and are collected into the run summary; only credential-class
//! failures abort the batch.

use crate::apply::apply_to_workbook;
use crate::config::PipelineConfig;
use crate::context::load_context;
use crate::grid::{WorksheetGrid, load_worksheet_grids};
use crate::infer::{CompletionBackend, InferenceClient};
use crate::model::{AnalysisResult, RunSummary, UnitReport, UnitStatus, WindowFallback};
use crate::normalize::{normalize, persist_analysis};
use crate::render::render_grid;
use crate::retry::RetryConfig;
use crate::utils::artifact_stem;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub async fn run(config: &PipelineConfig, backend: &dyn CompletionBackend) -> Result<RunSummary> {
    config.ensure_directories()?;

    let workbooks = discover_workbooks(config)?;
    if workbooks.is_empty() {
        tracing::info!(
            input_dir = %config.input_dir.display(),
            "no workbooks discovered; nothing to do"
        );
        return Ok(RunSummary::default());
    }
    tracing::info!(count = workbooks.len(), "workbooks discovered");

    let retry = RetryConfig::with_max_attempts(config.inference.max_attempts);
    let client = InferenceClient::new(backend, retry, config.inference.chunk_rows);

    let mut summary = RunSummary::default();
    for path in &workbooks {
        process_workbook(config, &client, path, &mut summary).await?;
    }

    tracing::info!(
        units = summary.units.len(),
        filled = summary.filled_units(),
        degraded = summary.degraded_units(),
        cells = summary.total_cells_filled(),
        "run complete"
    );
    Ok(summary)
}

fn discover_workbooks(config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let mut workbooks = Vec::new();
    for entry in WalkDir::new(&config.input_dir) {
        let entry = entry.with_context(|| {
            format!("failed to scan input directory {:?}", config.input_dir)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !config.has_supported_extension(path) {
            continue;
        }
        // Office lock files left behind by an open editor.
        if entry.file_name().to_string_lossy().starts_with("~$") {
            continue;
        }
        workbooks.push(path.to_path_buf());
    }
    workbooks.sort();
    Ok(workbooks)
}

/// Process every worksheet of one workbook, then apply the collected
/// analyses onto a fresh copy. Returns `Err` only for fatal failures.
async fn process_workbook(
    config: &PipelineConfig,
    client: &InferenceClient<'_>,
    path: &Path,
    summary: &mut RunSummary,
) -> Result<()> {
    let workbook_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "workbook.xlsx".to_string());
    tracing::info!(workbook = %workbook_name, "processing workbook");

    let grids = match load_worksheet_grids(path) {
        Ok(grids) => grids,
        Err(error) => {
            tracing::warn!(workbook = %workbook_name, error = %format!("{error:#}"), "workbook unreadable; skipping");
            summary.record(UnitReport {
                workbook: workbook_name,
                sheet: "*".to_string(),
                status: UnitStatus::Skipped {
                    reason: format!("workbook unreadable: {error:#}"),
                },
            });
            return Ok(());
        }
    };

    let mut analyses: Vec<AnalysisResult> = Vec::new();
    for grid in &grids {
        if let Some(analysis) =
            process_worksheet(config, client, &workbook_name, grid, summary).await?
        {
            analyses.push(analysis);
        }
    }

    if analyses.iter().all(|analysis| analysis.records.is_empty()) {
        tracing::info!(workbook = %workbook_name, "no cells to write; updated workbook not produced");
        return Ok(());
    }

    let output_path = config.output_dir.join(&workbook_name);
    match apply_to_workbook(path, &output_path, &analyses) {
        Ok(stats) => {
            tracing::info!(
                workbook = %workbook_name,
                written = stats.written,
                "workbook updated"
            );
        }
        Err(error) => {
            tracing::error!(workbook = %workbook_name, error = %format!("{error:#}"), "failed to apply analysis");
            summary.record(UnitReport {
                workbook: workbook_name,
                sheet: "*".to_string(),
                status: UnitStatus::Failed {
                    category: "apply".to_string(),
                    reason: format!("{error:#}"),
                },
            });
        }
    }
    Ok(())
}

/// Render, infer and normalize one worksheet. Returns the analysis to apply
/// (None when the unit was skipped or failed), `Err` only on fatal errors.
async fn process_worksheet(
    config: &PipelineConfig,
    client: &InferenceClient<'_>,
    workbook_name: &str,
    grid: &WorksheetGrid,
    summary: &mut RunSummary,
) -> Result<Option<AnalysisResult>> {
    let stem = artifact_stem(&grid.workbook_stem, &grid.sheet_name);
    let unit = |status: UnitStatus| UnitReport {
        workbook: workbook_name.to_string(),
        sheet: grid.sheet_name.clone(),
        status,
    };

    let markup = render_grid(grid);
    let markup_path = config.markup_dir.join(format!("{stem}.html"));
    if let Err(error) = fs::write(&markup_path, &markup) {
        summary.record(unit(UnitStatus::Failed {
            category: "io".to_string(),
            reason: format!("failed to persist markup: {error}"),
        }));
        return Ok(None);
    }
    tracing::debug!(markup = %markup_path.display(), "markup projection persisted");

    if grid.is_empty() {
        tracing::info!(sheet = %grid.sheet_name, "worksheet is empty; skipping inference");
        summary.record(unit(UnitStatus::Skipped {
            reason: "worksheet is empty".to_string(),
        }));
        return Ok(None);
    }

    let context = match load_context(&config.context_dir, &grid.workbook_stem, &grid.sheet_name) {
        Ok(context) => context,
        Err(error) => {
            summary.record(unit(UnitStatus::Failed {
                category: "io".to_string(),
                reason: format!("{error:#}"),
            }));
            return Ok(None);
        }
    };

    let outcome = client.infer(&markup, &context, grid.rows).await?;

    if !outcome.fallbacks().is_empty() {
        let raw_path = config.analysis_dir.join(format!("{stem}.raw.txt"));
        if let Err(error) = fs::write(
            &raw_path,
            fallback_artifact(workbook_name, &grid.sheet_name, outcome.fallbacks()),
        ) {
            tracing::error!(path = %raw_path.display(), error = %error, "failed to persist raw fallback artifact");
        } else {
            tracing::warn!(path = %raw_path.display(), "raw fallback artifact saved");
        }
    }

    let analysis = normalize(workbook_name, &grid.sheet_name, &stem, outcome.records());
    if let Err(error) = persist_analysis(&analysis, &config.analysis_dir) {
        summary.record(unit(UnitStatus::Failed {
            category: "io".to_string(),
            reason: format!("{error:#}"),
        }));
        return Ok(None);
    }

    let cells = analysis.records.len();
    summary.record(unit(if outcome.is_partial() {
        UnitStatus::Partial {
            cells,
            degraded_windows: outcome.fallbacks().len(),
        }
    } else {
        UnitStatus::Filled { cells }
    }));

    Ok(Some(analysis))
}

/// The verbatim payloads of every degraded window, one artifact per
/// worksheet, for later inspection.
fn fallback_artifact(workbook_name: &str, sheet_name: &str, fallbacks: &[WindowFallback]) -> String {
    let mut artifact = String::new();
    let _ = writeln!(artifact, "Source File: {workbook_name}");
    let _ = writeln!(artifact, "Worksheet: {sheet_name}");
    artifact.push_str(&"=".repeat(80));
    artifact.push('\n');
    for fallback in fallbacks {
        let _ = writeln!(
            artifact,
            "\nRows {}-{} (structured parsing failed):\n",
            fallback.start_row, fallback.end_row
        );
        artifact.push_str(&fallback.detail);
        artifact.push('\n');
    }
    artifact
}
