//! Canonicalizes inference records and persists the analysis projections.
//!
//! The canonical [`AnalysisResult`] is the single source every persisted
//! form derives from: tabular CSV, structured JSON, a human-readable
//! summary and a formatted spreadsheet table. Duplicate cell targets
//! resolve last-wins, and the displaced record is carried into the
//! summary's audit section rather than silently erased.

use crate::model::{
    AnalysisResult, CellAddress, DiscardedRecord, InferenceRecord, NormalizedRecord,
};
use anyhow::{Context, Result};
use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub fn normalize(
    source_file: &str,
    sheet_name: &str,
    artifact_stem: &str,
    records: &[InferenceRecord],
) -> AnalysisResult {
    let mut canonical: IndexMap<String, NormalizedRecord> = IndexMap::new();
    let mut discarded = Vec::new();

    for record in records {
        let reference = record.cell_reference.trim().to_ascii_uppercase();
        if reference.is_empty() {
            tracing::warn!("dropping record with empty cell reference");
            continue;
        }

        let normalized = NormalizedRecord {
            cell_reference: reference.clone(),
            coordinates: CellAddress::parse(&reference),
            value: record.value.clone(),
            context: record.context.clone(),
        };

        if let Some(previous) = canonical.insert(reference.clone(), normalized) {
            tracing::debug!(cell = %reference, "duplicate target resolved last-wins");
            discarded.push(DiscardedRecord {
                cell_reference: reference,
                discarded_value: previous.value,
                kept_value: record.value.clone(),
            });
        }
    }

    AnalysisResult {
        source_file: source_file.to_string(),
        sheet_name: sheet_name.to_string(),
        artifact_stem: artifact_stem.to_string(),
        generated_at: Utc::now(),
        records: canonical.into_values().collect(),
        discarded,
    }
}

/// Write all four projections next to each other in the analysis directory.
pub fn persist_analysis(analysis: &AnalysisResult, analysis_dir: &Path) -> Result<()> {
    let stem = &analysis.artifact_stem;

    let csv_path = analysis_dir.join(format!("{stem}.csv"));
    fs::write(&csv_path, tabular_csv(analysis))
        .with_context(|| format!("failed to write {:?}", csv_path))?;

    let json_path = analysis_dir.join(format!("{stem}.json"));
    fs::write(&json_path, structured_json(analysis)?)
        .with_context(|| format!("failed to write {:?}", json_path))?;

    let summary_path = analysis_dir.join(format!("{stem}.txt"));
    fs::write(&summary_path, human_summary(analysis))
        .with_context(|| format!("failed to write {:?}", summary_path))?;

    let table_path = analysis_dir.join(format!("{stem}.xlsx"));
    write_spreadsheet_table(analysis, &table_path)?;

    tracing::info!(
        stem = %stem,
        records = analysis.records.len(),
        "analysis projections persisted"
    );
    Ok(())
}

/// Tabular projection: `row, column, cell_reference, value, context,
/// source_file`. References that never parsed leave row/column blank.
pub fn tabular_csv(analysis: &AnalysisResult) -> String {
    let mut csv = String::from("row,column,cell_reference,value,context,source_file\n");
    for record in &analysis.records {
        let (row, column) = match record.coordinates {
            Some(address) => (address.row.to_string(), address.column.to_string()),
            None => (String::new(), String::new()),
        };
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{}",
            csv_field(&row),
            csv_field(&column),
            csv_field(&record.cell_reference),
            csv_field(&record.value),
            csv_field(&record.context),
            csv_field(&analysis.source_file),
        );
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Serialize)]
struct StructuredRecord<'a> {
    cell_reference: &'a str,
    value: &'a str,
    context: &'a str,
}

/// Structured projection: the ordered record sequence as JSON.
pub fn structured_json(analysis: &AnalysisResult) -> Result<String> {
    let records: Vec<StructuredRecord<'_>> = analysis
        .records
        .iter()
        .map(|record| StructuredRecord {
            cell_reference: &record.cell_reference,
            value: &record.value,
            context: &record.context,
        })
        .collect();
    serde_json::to_string_pretty(&records).context("failed to serialize structured records")
}

/// Human-readable projection: provenance, fill count, enumerated mappings
/// and the audit notes for displaced duplicates.
pub fn human_summary(analysis: &AnalysisResult) -> String {
    let mut summary = String::new();
    let _ = writeln!(summary, "Source File: {}", analysis.source_file);
    let _ = writeln!(summary, "Worksheet: {}", analysis.sheet_name);
    let _ = writeln!(
        summary,
        "Generated: {}",
        analysis
            .generated_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    summary.push_str(&"=".repeat(80));
    summary.push_str("\n\n");

    let _ = writeln!(summary, "Found {} cells to fill:\n", analysis.records.len());
    for record in &analysis.records {
        let _ = writeln!(summary, "Cell {}: {}", record.cell_reference, record.value);
        let _ = writeln!(summary, "  Context: {}\n", record.context);
    }

    if !analysis.discarded.is_empty() {
        summary.push_str("Duplicate targets resolved (last value wins):\n");
        for discarded in &analysis.discarded {
            let _ = writeln!(
                summary,
                "- {}: discarded \"{}\" in favour of \"{}\"",
                discarded.cell_reference, discarded.discarded_value, discarded.kept_value
            );
        }
        summary.push('\n');
    }

    summary.push_str("Files generated:\n");
    let _ = writeln!(summary, "- {}.csv (tabular)", analysis.artifact_stem);
    let _ = writeln!(summary, "- {}.json (structured)", analysis.artifact_stem);
    let _ = writeln!(summary, "- {}.xlsx (spreadsheet table)", analysis.artifact_stem);
    summary
}

const TABLE_HEADERS: &[&str] = &[
    "row",
    "column",
    "cell_reference",
    "value",
    "context",
    "source_file",
];
const MAX_TABLE_COLUMN_WIDTH: f64 = 50.0;

/// Spreadsheet projection: the tabular data as a formatted sheet with a
/// bold header row and auto-sized columns.
fn write_spreadsheet_table(analysis: &AnalysisResult, path: &Path) -> Result<()> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_by_name_mut("Sheet1")
        .context("fresh workbook is missing its default sheet")?;
    sheet.set_name("Cell_Mappings");

    let mut widths = vec![0usize; TABLE_HEADERS.len()];

    for (index, header) in TABLE_HEADERS.iter().enumerate() {
        let cell = sheet.get_cell_mut(((index + 1) as u32, 1));
        cell.set_value(*header);
        cell.get_style_mut().get_font_mut().set_bold(true);
        widths[index] = header.len();
    }

    for (row_index, record) in analysis.records.iter().enumerate() {
        let sheet_row = (row_index + 2) as u32;
        let (row, column) = match record.coordinates {
            Some(address) => (address.row.to_string(), address.column.to_string()),
            None => (String::new(), String::new()),
        };
        let fields = [
            row.as_str(),
            column.as_str(),
            record.cell_reference.as_str(),
            record.value.as_str(),
            record.context.as_str(),
            analysis.source_file.as_str(),
        ];
        for (index, field) in fields.iter().enumerate() {
            sheet
                .get_cell_mut(((index + 1) as u32, sheet_row))
                .set_value(*field);
            widths[index] = widths[index].max(field.len());
        }
    }

    for (index, width) in widths.iter().enumerate() {
        let letter = crate::utils::column_number_to_name((index + 1) as u32);
        sheet
            .get_column_dimension_mut(&letter)
            .set_width(((width + 2) as f64).min(MAX_TABLE_COLUMN_WIDTH));
    }

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .with_context(|| format!("failed to write analysis table {:?}", path))
}
