use std::path::Path;

pub fn column_number_to_name(column: u32) -> String {
    let mut column = column;
    let mut name = String::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        name.insert(0, (b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    name
}

pub fn column_name_to_number(name: &str) -> Option<u32> {
    if name.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for ch in name.chars() {
        let upper = ch.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return None;
        }
        value = value
            .checked_mul(26)?
            .checked_add((upper as u8 - b'A' + 1) as u32)?;
    }
    Some(value)
}

pub fn cell_address(column: u32, row: u32) -> String {
    format!("{}{}", column_number_to_name(column), row)
}

/// Parse an A1-style reference into 1-based (column, row). Accepts lowercase
/// column letters; rejects row 0 and references without a letter prefix.
pub fn parse_cell_address(reference: &str) -> Option<(u32, u32)> {
    let reference = reference.trim();
    let digits_at = reference.find(|c: char| c.is_ascii_digit())?;
    if digits_at == 0 {
        return None;
    }
    let (letters, digits) = reference.split_at(digits_at);
    let column = column_name_to_number(letters)?;
    let row = digits.parse::<u32>().ok().filter(|row| *row > 0)?;
    Some((column, row))
}

/// Parse "B2:C4" (or a single "B2") into start/end coordinates.
pub fn parse_range(range: &str) -> Option<((u32, u32), (u32, u32))> {
    match range.split_once(':') {
        Some((start, end)) => Some((parse_cell_address(start)?, parse_cell_address(end)?)),
        None => parse_cell_address(range).map(|cell| (cell, cell)),
    }
}

/// Collapse a worksheet name into the token used for artifact and context
/// file naming: whitespace and separator punctuation become underscores,
/// closing parens vanish, runs of underscores collapse.
pub fn sanitize_sheet_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        match ch {
            ' ' | '.' | '(' | ',' | '-' => cleaned.push('_'),
            ')' => {}
            other => cleaned.push(other),
        }
    }
    while cleaned.contains("__") {
        cleaned = cleaned.replace("__", "_");
    }
    cleaned.trim_matches('_').to_string()
}

/// `{workbook stem}_{sanitized sheet name}`: the stem every per-worksheet
/// artifact (markup, analysis outputs, context lookup) hangs off.
pub fn artifact_stem(workbook_stem: &str, sheet_name: &str) -> String {
    format!("{}_{}", workbook_stem, sanitize_sheet_name(sheet_name))
}

pub fn path_to_forward_slashes(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if raw.contains('\\') {
        raw.replace('\\', "/")
    } else {
        raw.into_owned()
    }
}
