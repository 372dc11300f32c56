use crate::grid::{CellStyleInfo, CommonStyle, WorksheetGrid};
use crate::model::CellAddress;
use crate::utils::column_number_to_name;
use std::fmt::Write as _;

const DEFAULT_ROW_HEIGHT_PX: u32 = 18;

/// Render a worksheet grid into a standalone HTML document: one visual cell
/// per merge (anchors carry rowspan/colspan, covered members are omitted),
/// every cell tagged with its A1 reference, styling kept as attributes so
/// the inference step sees the same layout cues a human reader would. An
/// empty grid produces an empty but well-formed table.
pub fn render_grid(grid: &WorksheetGrid) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\">\n");
    let _ = writeln!(
        html,
        "<title>{} - {}</title>",
        escape_html(&grid.sheet_name),
        escape_html(&grid.workbook_stem)
    );
    html.push_str(STYLESHEET);
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>Sheet: {}</h1>", escape_html(&grid.sheet_name));
    render_table(grid, &mut html);
    html.push_str("</body>\n</html>\n");
    html
}

fn render_table(grid: &WorksheetGrid, html: &mut String) {
    html.push_str("<div class=\"grid-container\" dir=\"ltr\">\n");
    html.push_str("<table class=\"sheet\" cellspacing=\"0\" cellpadding=\"0\">\n");

    html.push_str("<thead><tr>\n<th class=\"corner\"></th>\n");
    for column in 1..=grid.columns {
        let letter = column_number_to_name(column);
        match grid.column_width(column) {
            Some(width) => {
                let _ = writeln!(
                    html,
                    "<th id=\"col{}\" style=\"width:{}px;\" class=\"column-header\">{}</th>",
                    column,
                    (width * 7.0) as u32,
                    letter
                );
            }
            None => {
                let _ = writeln!(
                    html,
                    "<th id=\"col{}\" class=\"column-header\">{}</th>",
                    column, letter
                );
            }
        }
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in 1..=grid.rows {
        let height_px = grid
            .row_height(row)
            .map(|height| (height * 1.33) as u32)
            .unwrap_or(DEFAULT_ROW_HEIGHT_PX);
        let _ = writeln!(html, "<tr style=\"height:{}px\">", height_px);
        let _ = writeln!(
            html,
            "<th id=\"row{}\" class=\"row-header\"><div class=\"row-header-label\">{}</div></th>",
            row, row
        );

        for column in 1..=grid.columns {
            let address = CellAddress::new(column, row);
            // Covered merge members are not separately addressable; the
            // projection must show one visual cell per merge.
            if grid.is_covered(address) {
                continue;
            }

            let mut attributes = format!(" data-ref=\"{}\"", address);
            let style = grid
                .cell(column, row)
                .map(|cell| cell.style.clone())
                .unwrap_or_default();
            match CommonStyle::classify(&style) {
                Some(common) => {
                    let _ = write!(attributes, " class=\"{}\"", common.class_name());
                }
                None => {
                    let _ = write!(attributes, " style=\"{}\"", inline_style(&style));
                }
            }
            if let Some(region) = grid.region_at_anchor(address) {
                if region.colspan() > 1 {
                    let _ = write!(attributes, " colspan=\"{}\"", region.colspan());
                }
                if region.rowspan() > 1 {
                    let _ = write!(attributes, " rowspan=\"{}\"", region.rowspan());
                }
            }

            let value = grid.value(column, row).unwrap_or("");
            let _ = writeln!(html, "<td{}>{}</td>", attributes, escape_html(value));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n</div>\n");
}

fn inline_style(style: &CellStyleInfo) -> String {
    let mut props: Vec<String> = Vec::new();

    if let Some(side) = style.border_top.as_deref() {
        props.push(format!("border-top: {}", border_css(side)));
    }
    if let Some(side) = style.border_bottom.as_deref() {
        props.push(format!("border-bottom: {}", border_css(side)));
    }
    if let Some(side) = style.border_left.as_deref() {
        props.push(format!("border-left: {}", border_css(side)));
    }
    if let Some(side) = style.border_right.as_deref() {
        props.push(format!("border-right: {}", border_css(side)));
    }

    props.push(format!(
        "text-align: {}",
        style.horizontal.as_deref().unwrap_or("left")
    ));
    props.push(format!(
        "vertical-align: {}",
        match style.vertical.as_deref() {
            Some("center") => "middle",
            Some(other) => other,
            None => "bottom",
        }
    ));
    if style.wrap_text {
        props.push("white-space: normal".to_string());
        props.push("word-wrap: break-word".to_string());
    } else {
        props.push("white-space: nowrap".to_string());
    }

    if let Some(name) = style.font_name.as_deref() {
        props.push(format!("font-family: {}", name));
    }
    if let Some(size) = style.font_size {
        props.push(format!("font-size: {}pt", size));
    }
    if style.bold {
        props.push("font-weight: bold".to_string());
    }

    props.push("color: #000000".to_string());
    props.push("direction: ltr".to_string());
    props.push("padding: 0px 3px 0px 3px".to_string());
    props.join("; ")
}

/// CSS rendering for the border styles the markup distinguishes; everything
/// unrecognized degrades to a thin solid line.
fn border_css(style: &str) -> &'static str {
    match style {
        "thin" | "hair" => "1px SOLID #000000",
        "medium" => "2px SOLID #000000",
        "thick" => "3px SOLID #000000",
        "double" => "3px DOUBLE #000000",
        "dotted" => "1px DOTTED #000000",
        "dashed" | "dashDot" | "dashDotDot" | "slantDashDot" => "1px DASHED #000000",
        _ => "1px SOLID #000000",
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const STYLESHEET: &str = r#"<style type="text/css">
    .sheet {
        border-collapse: collapse;
        font-family: Arial, sans-serif;
        font-size: 10pt;
    }
    .sheet td, .sheet th {
        padding: 3px;
        border: 1px solid #ccc;
    }
    .column-header, .row-header {
        background-color: #f0f0f0;
        font-weight: bold;
        text-align: center;
    }
    .row-header-label {
        line-height: 18px;
    }
    .plain-cell {
        border: none;
        text-align: left;
        vertical-align: bottom;
        white-space: nowrap;
        font-family: Calibri, Arial, sans-serif;
        font-size: 9pt;
        color: #000000;
        direction: ltr;
        padding: 0px 3px 0px 3px;
    }
    .plain-cell-lg {
        border: none;
        text-align: left;
        vertical-align: bottom;
        white-space: nowrap;
        font-family: Calibri, sans-serif;
        font-size: 11pt;
        color: #000000;
        direction: ltr;
        padding: 0px 3px 0px 3px;
    }
    .boxed-cell {
        border: 1px solid #000000;
        text-align: center;
        vertical-align: bottom;
        white-space: nowrap;
        font-family: Calibri, Arial, sans-serif;
        font-size: 9pt;
        color: #000000;
        direction: ltr;
        padding: 0px 3px 0px 3px;
    }
</style>
"#;
