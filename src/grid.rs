use crate::model::{CellAddress, MergeRegion};
use crate::utils::{column_number_to_name, parse_range};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use umya_spreadsheet::reader::xlsx;
use umya_spreadsheet::structs::{EnumTrait, HorizontalAlignmentValues, VerticalAlignmentValues};
use umya_spreadsheet::{Style, Worksheet};

/// Style attributes the markup projection cares about. Everything else the
/// workbook carries stays untouched on disk and round-trips through the
/// writer unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyleInfo {
    pub border_top: Option<String>,
    pub border_bottom: Option<String>,
    pub border_left: Option<String>,
    pub border_right: Option<String>,
    pub bold: bool,
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: bool,
}

impl CellStyleInfo {
    pub fn has_borders(&self) -> bool {
        self.border_top.is_some()
            || self.border_bottom.is_some()
            || self.border_left.is_some()
            || self.border_right.is_some()
    }

    pub fn has_all_thin_borders(&self) -> bool {
        [
            &self.border_top,
            &self.border_bottom,
            &self.border_left,
            &self.border_right,
        ]
        .iter()
        .all(|side| side.as_deref() == Some("thin"))
    }

    fn default_alignment(&self) -> bool {
        matches!(self.horizontal.as_deref(), None | Some("left"))
            && self.vertical.is_none()
            && !self.wrap_text
    }

    fn plain_font(&self, size: f64) -> bool {
        matches!(self.font_name.as_deref(), None | Some("Calibri"))
            && self.font_size.map(|s| s == size).unwrap_or(true)
            && !self.bold
    }
}

/// One read-once cell snapshot. `value` is empty for blank cells.
#[derive(Debug, Clone)]
pub struct CellSnapshot {
    pub address: CellAddress,
    pub value: String,
    pub style: CellStyleInfo,
}

/// Structural model of one worksheet: sparse cells, merge regions, explicit
/// dimension overrides. Owned by the reader/writer pair for one file;
/// discarded after the workbook is persisted.
#[derive(Debug, Clone)]
pub struct WorksheetGrid {
    pub workbook_stem: String,
    pub sheet_name: String,
    pub rows: u32,
    pub columns: u32,
    cells: HashMap<(u32, u32), CellSnapshot>,
    merges: Vec<MergeRegion>,
    merge_members: HashMap<(u32, u32), CellAddress>,
    column_widths: BTreeMap<u32, f64>,
    row_heights: BTreeMap<u32, f64>,
}

impl WorksheetGrid {
    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|cell| cell.value.is_empty())
    }

    pub fn cell(&self, column: u32, row: u32) -> Option<&CellSnapshot> {
        self.cells.get(&(row, column))
    }

    /// Non-empty value at the coordinates, if any.
    pub fn value(&self, column: u32, row: u32) -> Option<&str> {
        self.cell(column, row)
            .map(|cell| cell.value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub fn merges(&self) -> &[MergeRegion] {
        &self.merges
    }

    /// Anchor for any member of a merge region, the address itself included.
    pub fn merge_anchor(&self, address: CellAddress) -> Option<CellAddress> {
        self.merge_members
            .get(&(address.row, address.column))
            .copied()
    }

    /// A non-anchor merge member: visually part of a span, never
    /// independently addressable for writing, omitted from the markup.
    pub fn is_covered(&self, address: CellAddress) -> bool {
        self.merge_anchor(address)
            .map(|anchor| anchor != address)
            .unwrap_or(false)
    }

    /// The merge region anchored exactly at this address, if any.
    pub fn region_at_anchor(&self, address: CellAddress) -> Option<&MergeRegion> {
        self.merges.iter().find(|region| region.start == address)
    }

    /// Addresses eligible to receive an inferred value: empty and not a
    /// covered merge member.
    pub fn fillable_cells(&self) -> Vec<CellAddress> {
        let mut fillable = Vec::new();
        for row in 1..=self.rows {
            for column in 1..=self.columns {
                let address = CellAddress::new(column, row);
                if self.is_covered(address) {
                    continue;
                }
                if self.value(column, row).is_none() {
                    fillable.push(address);
                }
            }
        }
        fillable
    }

    pub fn column_width(&self, column: u32) -> Option<f64> {
        self.column_widths.get(&column).copied()
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }
}

/// Open a workbook read-only and snapshot every worksheet. The umya handle
/// does not outlive this call; the write phase opens its own.
pub fn load_worksheet_grids(path: &Path) -> Result<Vec<WorksheetGrid>> {
    let book =
        xlsx::read(path).with_context(|| format!("failed to parse workbook {:?}", path))?;
    let workbook_stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "workbook".to_string());

    Ok(book
        .get_sheet_collection()
        .iter()
        .map(|sheet| snapshot_sheet(&workbook_stem, sheet))
        .collect())
}

fn snapshot_sheet(workbook_stem: &str, sheet: &Worksheet) -> WorksheetGrid {
    let (columns, rows) = sheet.get_highest_column_and_row();

    let mut cells = HashMap::new();
    for cell in sheet.get_cell_collection() {
        let coordinate = cell.get_coordinate();
        let row = *coordinate.get_row_num();
        let column = *coordinate.get_col_num();
        let address = CellAddress::new(column, row);
        cells.insert(
            (row, column),
            CellSnapshot {
                address,
                value: cell.get_value().to_string(),
                style: style_info(cell.get_style()),
            },
        );
    }

    let mut merges = Vec::new();
    let mut merge_members = HashMap::new();
    for range in sheet.get_merge_cells() {
        let Some(((start_col, start_row), (end_col, end_row))) = parse_range(&range.get_range())
        else {
            continue;
        };
        let region = MergeRegion {
            start: CellAddress::new(start_col, start_row),
            end: CellAddress::new(end_col, end_row),
        };
        for row in start_row..=end_row {
            for column in start_col..=end_col {
                merge_members.insert((row, column), region.start);
            }
        }
        merges.push(region);
    }

    let mut column_widths = BTreeMap::new();
    for column in 1..=columns {
        let letter = column_number_to_name(column);
        if let Some(dimension) = sheet.get_column_dimension(&letter) {
            let width = *dimension.get_width();
            if width > 0.0 {
                column_widths.insert(column, width);
            }
        }
    }

    let mut row_heights = BTreeMap::new();
    for row in 1..=rows {
        if let Some(dimension) = sheet.get_row_dimension(&row) {
            let height = *dimension.get_height();
            if height > 0.0 {
                row_heights.insert(row, height);
            }
        }
    }

    WorksheetGrid {
        workbook_stem: workbook_stem.to_string(),
        sheet_name: sheet.get_name().to_string(),
        rows,
        columns,
        cells,
        merges,
        merge_members,
        column_widths,
        row_heights,
    }
}

fn style_info(style: &Style) -> CellStyleInfo {
    let mut info = CellStyleInfo::default();

    if let Some(borders) = style.get_borders() {
        info.border_top = border_style(borders.get_top_border().get_border_style());
        info.border_bottom = border_style(borders.get_bottom_border().get_border_style());
        info.border_left = border_style(borders.get_left_border().get_border_style());
        info.border_right = border_style(borders.get_right_border().get_border_style());
    }

    if let Some(font) = style.get_font() {
        info.bold = *font.get_bold();
        let name = font.get_name();
        if !name.is_empty() {
            info.font_name = Some(name.to_string());
        }
        let size = *font.get_size();
        if size > 0.0 {
            info.font_size = Some(size);
        }
    }

    if let Some(alignment) = style.get_alignment() {
        if alignment.get_horizontal() != &HorizontalAlignmentValues::General {
            info.horizontal = Some(alignment.get_horizontal().get_value_string().to_string());
        }
        if alignment.get_vertical() != &VerticalAlignmentValues::Bottom {
            info.vertical = Some(alignment.get_vertical().get_value_string().to_string());
        }
        info.wrap_text = *alignment.get_wrap_text();
    }

    info
}

fn border_style(style: &str) -> Option<String> {
    if style.is_empty() || style.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(style.to_string())
    }
}

/// Shared markup classes for the styles that dominate real workbooks; every
/// other style renders inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonStyle {
    /// Default font at 9pt, no borders, default alignment.
    Plain,
    /// Default font at 11pt (workbook default), otherwise plain.
    PlainLarge,
    /// Thin box border, horizontally centered, default font.
    BorderedCentered,
}

impl CommonStyle {
    pub fn classify(style: &CellStyleInfo) -> Option<CommonStyle> {
        if !style.has_borders() && style.default_alignment() {
            if style.plain_font(9.0) {
                return Some(CommonStyle::Plain);
            }
            if style.plain_font(11.0) {
                return Some(CommonStyle::PlainLarge);
            }
        }
        if style.has_all_thin_borders()
            && style.horizontal.as_deref() == Some("center")
            && style.vertical.is_none()
            && !style.wrap_text
            && style.plain_font(9.0)
        {
            return Some(CommonStyle::BorderedCentered);
        }
        None
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            CommonStyle::Plain => "plain-cell",
            CommonStyle::PlainLarge => "plain-cell-lg",
            CommonStyle::BorderedCentered => "boxed-cell",
        }
    }
}
