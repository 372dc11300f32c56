use crate::utils::{cell_address, parse_cell_address};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 1-based spreadsheet coordinates with an A1-style rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    pub column: u32,
    pub row: u32,
}

impl CellAddress {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    pub fn parse(reference: &str) -> Option<Self> {
        parse_cell_address(reference).map(|(column, row)| Self { column, row })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", cell_address(self.column, self.row))
    }
}

/// Rectangular merged span. The top-left cell is the anchor and the only
/// member that may carry a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRegion {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl MergeRegion {
    pub fn anchor(&self) -> CellAddress {
        self.start
    }

    pub fn contains(&self, address: CellAddress) -> bool {
        address.row >= self.start.row
            && address.row <= self.end.row
            && address.column >= self.start.column
            && address.column <= self.end.column
    }

    pub fn rowspan(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn colspan(&self) -> u32 {
        self.end.column - self.start.column + 1
    }
}

/// One cell-fill claim as returned by the inference backend. The reference
/// is kept verbatim; whether it resolves against the grid is the workbook
/// writer's decision, not the client's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub cell_reference: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: String,
    #[serde(default)]
    pub context: String,
}

// Models occasionally emit numbers or booleans where the contract says
// string; accept any scalar and render it.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar value, got {other}"
        ))),
    }
}

/// A row window whose inference exchange degraded to raw text.
#[derive(Debug, Clone, Serialize)]
pub struct WindowFallback {
    pub start_row: u32,
    pub end_row: u32,
    pub detail: String,
}

/// Tagged outcome of one worksheet's inference pass, so downstream code
/// cannot mistake a degraded unit for a clean one.
#[derive(Debug)]
pub enum InferenceOutcome {
    /// Every row window parsed into records.
    Complete(Vec<InferenceRecord>),
    /// At least one window fell back to raw text; surviving windows still
    /// contribute records.
    Partial {
        records: Vec<InferenceRecord>,
        fallbacks: Vec<WindowFallback>,
    },
}

impl InferenceOutcome {
    pub fn records(&self) -> &[InferenceRecord] {
        match self {
            InferenceOutcome::Complete(records) => records,
            InferenceOutcome::Partial { records, .. } => records,
        }
    }

    pub fn fallbacks(&self) -> &[WindowFallback] {
        match self {
            InferenceOutcome::Complete(_) => &[],
            InferenceOutcome::Partial { fallbacks, .. } => fallbacks,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, InferenceOutcome::Partial { .. })
    }
}

/// A record after normalization: reference canonicalized, coordinates
/// derived when the reference parses.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedRecord {
    pub cell_reference: String,
    pub coordinates: Option<CellAddress>,
    pub value: String,
    pub context: String,
}

/// Earlier duplicate displaced by a later record for the same cell. Never
/// silently erased; surfaces in the human-readable audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct DiscardedRecord {
    pub cell_reference: String,
    pub discarded_value: String,
    pub kept_value: String,
}

/// Canonical, deduplicated analysis for one worksheet. Every persisted
/// projection derives from this value alone.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub source_file: String,
    pub sheet_name: String,
    pub artifact_stem: String,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<NormalizedRecord>,
    pub discarded: Vec<DiscardedRecord>,
}

/// Per-worksheet outcome collected into the end-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub workbook: String,
    pub sheet: String,
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitStatus {
    Filled {
        cells: usize,
    },
    Partial {
        cells: usize,
        degraded_windows: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        category: String,
        reason: String,
    },
}

/// Everything non-fatal that happened during a run, surfaced once at the
/// end instead of raised unit by unit.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub units: Vec<UnitReport>,
}

impl RunSummary {
    pub fn record(&mut self, report: UnitReport) {
        self.units.push(report);
    }

    pub fn filled_units(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.status, UnitStatus::Filled { .. }))
            .count()
    }

    pub fn degraded_units(&self) -> usize {
        self.units
            .iter()
            .filter(|u| {
                matches!(
                    u.status,
                    UnitStatus::Partial { .. } | UnitStatus::Skipped { .. } | UnitStatus::Failed { .. }
                )
            })
            .count()
    }

    pub fn total_cells_filled(&self) -> usize {
        self.units
            .iter()
            .map(|u| match u.status {
                UnitStatus::Filled { cells } | UnitStatus::Partial { cells, .. } => cells,
                _ => 0,
            })
            .sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} unit(s) processed, {} filled cleanly, {} degraded, {} cell(s) written",
            self.units.len(),
            self.filled_units(),
            self.degraded_units(),
            self.total_cells_filled()
        )?;
        for unit in &self.units {
            match &unit.status {
                UnitStatus::Filled { cells } => {
                    writeln!(f, "  {} / {}: {} cell(s) filled", unit.workbook, unit.sheet, cells)?
                }
                UnitStatus::Partial {
                    cells,
                    degraded_windows,
                } => writeln!(
                    f,
                    "  {} / {}: {} cell(s) filled, {} window(s) degraded to raw artifact",
                    unit.workbook, unit.sheet, cells, degraded_windows
                )?,
                UnitStatus::Skipped { reason } => {
                    writeln!(f, "  {} / {}: skipped ({})", unit.workbook, unit.sheet, reason)?
                }
                UnitStatus::Failed { category, reason } => writeln!(
                    f,
                    "  {} / {}: failed [{}] {}",
                    unit.workbook, unit.sheet, category, reason
                )?,
            }
        }
        Ok(())
    }
}
