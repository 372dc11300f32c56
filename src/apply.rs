//! Applies normalized analysis results back onto the original workbook.
//!
//! Write policy, in order, per record:
//! 1. unparseable or out-of-grid reference: skip the record with a warning;
//! 2. non-anchor member of a merged region: redirect the write to the
//!    region's anchor (never to a covered cell);
//! 3. already-populated target: overwrite (the pipeline's purpose is
//!    fill-then-update), logging the value it replaces;
//! 4. otherwise write the value, leaving every other cell untouched.
//!
//! The input file is opened with a fresh handle and never mutated; the
//! updated workbook is persisted under the output directory.

use crate::model::{AnalysisResult, CellAddress, MergeRegion};
use crate::utils::parse_range;
use anyhow::{Context, Result};
use std::path::Path;
use umya_spreadsheet::reader::xlsx;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyStats {
    pub written: usize,
    pub overwritten: usize,
    pub redirected: usize,
    pub skipped_missing: usize,
    pub skipped_empty_value: usize,
    pub skipped_sheets: usize,
}

/// Apply every analysis to its worksheet and persist the updated workbook
/// at `output_path`. Holds no state between calls: applying the same
/// analyses to two fresh copies of the same input yields identical output.
pub fn apply_to_workbook(
    input_path: &Path,
    output_path: &Path,
    analyses: &[AnalysisResult],
) -> Result<ApplyStats> {
    anyhow::ensure!(
        input_path != output_path,
        "refusing to overwrite input workbook {:?} in place",
        input_path
    );

    let mut book = xlsx::read(input_path)
        .with_context(|| format!("failed to reopen workbook {:?}", input_path))?;
    let mut stats = ApplyStats::default();

    for analysis in analyses {
        let Some(sheet) = book.get_sheet_by_name_mut(&analysis.sheet_name) else {
            tracing::warn!(sheet = %analysis.sheet_name, "worksheet disappeared from workbook; skipping");
            stats.skipped_sheets += 1;
            continue;
        };

        let merges: Vec<MergeRegion> = sheet
            .get_merge_cells()
            .iter()
            .filter_map(|range| {
                let ((start_col, start_row), (end_col, end_row)) =
                    parse_range(&range.get_range())?;
                Some(MergeRegion {
                    start: CellAddress::new(start_col, start_row),
                    end: CellAddress::new(end_col, end_row),
                })
            })
            .collect();
        let (max_column, max_row) = sheet.get_highest_column_and_row();

        for record in &analysis.records {
            let Some(address) = record.coordinates else {
                tracing::warn!(
                    cell = %record.cell_reference,
                    sheet = %analysis.sheet_name,
                    "reference does not parse as a cell address; skipping record"
                );
                stats.skipped_missing += 1;
                continue;
            };

            if record.value.trim().is_empty() {
                tracing::warn!(cell = %address, "record carries no value; skipping");
                stats.skipped_empty_value += 1;
                continue;
            }

            if address.row > max_row || address.column > max_column {
                tracing::warn!(
                    cell = %address,
                    sheet = %analysis.sheet_name,
                    "reference lies outside the worksheet grid; skipping record"
                );
                stats.skipped_missing += 1;
                continue;
            }

            let target = merges
                .iter()
                .find(|region| region.contains(address))
                .map(|region| region.anchor())
                .unwrap_or(address);
            if target != address {
                tracing::info!(
                    requested = %address,
                    anchor = %target,
                    "redirecting write from covered merge member to anchor"
                );
                stats.redirected += 1;
            }

            let cell = sheet.get_cell_mut((target.column, target.row));
            let existing = cell.get_value().to_string();
            if !existing.is_empty() {
                tracing::warn!(
                    cell = %target,
                    prior = %existing,
                    new = %record.value,
                    "overwriting populated cell per fill-then-update policy"
                );
                stats.overwritten += 1;
            }

            set_coerced_value(cell, &record.value);
            stats.written += 1;
        }
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {:?}", parent))?;
    }
    umya_spreadsheet::writer::xlsx::write(&book, output_path)
        .with_context(|| format!("failed to write updated workbook {:?}", output_path))?;

    tracing::info!(
        workbook = %output_path.display(),
        written = stats.written,
        overwritten = stats.overwritten,
        redirected = stats.redirected,
        "updated workbook persisted"
    );
    Ok(stats)
}

/// Values that read as numbers are written as numbers (thousands separators
/// stripped) so filled cells participate in downstream arithmetic;
/// everything else is written as text.
fn set_coerced_value(cell: &mut umya_spreadsheet::Cell, value: &str) {
    let cleaned = value.replace(',', "");
    if let Ok(integer) = cleaned.parse::<i64>() {
        cell.set_value_number(integer as f64);
    } else if let Ok(float) = cleaned.parse::<f64>() {
        cell.set_value_number(float);
    } else {
        cell.set_value(value);
    }
}
