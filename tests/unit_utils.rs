use proptest::prelude::*;
use sheetfill::utils::{
    artifact_stem, cell_address, column_name_to_number, column_number_to_name, parse_cell_address,
    parse_range, sanitize_sheet_name,
};

#[test]
fn column_name_round_trip_at_boundaries() {
    assert_eq!(column_number_to_name(1), "A");
    assert_eq!(column_number_to_name(26), "Z");
    assert_eq!(column_number_to_name(27), "AA");
    assert_eq!(column_number_to_name(702), "ZZ");
    assert_eq!(column_number_to_name(703), "AAA");

    assert_eq!(column_name_to_number("A"), Some(1));
    assert_eq!(column_name_to_number("Z"), Some(26));
    assert_eq!(column_name_to_number("AA"), Some(27));
    assert_eq!(column_name_to_number("zz"), Some(702));
    assert_eq!(column_name_to_number(""), None);
    assert_eq!(column_name_to_number("A1"), None);
}

#[test]
fn cell_address_formats_and_parses() {
    assert_eq!(cell_address(2, 7), "B7");
    assert_eq!(cell_address(28, 42), "AB42");

    assert_eq!(parse_cell_address("B7"), Some((2, 7)));
    assert_eq!(parse_cell_address(" ab42 "), Some((28, 42)));
    assert_eq!(parse_cell_address("B0"), None);
    assert_eq!(parse_cell_address("7"), None);
    assert_eq!(parse_cell_address("B"), None);
    assert_eq!(parse_cell_address(""), None);
}

#[test]
fn parse_range_accepts_spans_and_single_cells() {
    assert_eq!(parse_range("B2:C4"), Some(((2, 2), (3, 4))));
    assert_eq!(parse_range("B2"), Some(((2, 2), (2, 2))));
    assert_eq!(parse_range("B2:"), None);
    assert_eq!(parse_range("nonsense"), None);
}

#[test]
fn sheet_names_collapse_to_artifact_tokens() {
    assert_eq!(sanitize_sheet_name("Staff"), "Staff");
    assert_eq!(sanitize_sheet_name("revenue forecast"), "revenue_forecast");
    assert_eq!(
        sanitize_sheet_name("1. Fic. amounts (patenting) "),
        "1_Fic_amounts_patenting"
    );
    assert_eq!(
        sanitize_sheet_name("2. Fic. amounts (commercialisat"),
        "2_Fic_amounts_commercialisat"
    );
    assert_eq!(artifact_stem("budget", "revenue forecast"), "budget_revenue_forecast");
}

proptest! {
    #[test]
    fn address_codec_round_trips(column in 1u32..=20_000, row in 1u32..=1_000_000) {
        let rendered = cell_address(column, row);
        prop_assert_eq!(parse_cell_address(&rendered), Some((column, row)));
    }

    #[test]
    fn column_codec_round_trips(column in 1u32..=600_000) {
        let name = column_number_to_name(column);
        prop_assert_eq!(column_name_to_number(&name), Some(column));
    }
}
