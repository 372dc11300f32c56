use sheetfill::apply::apply_to_workbook;
use sheetfill::model::InferenceRecord;
use sheetfill::normalize::normalize;
use umya_spreadsheet::reader::xlsx;

mod support;

fn record(reference: &str, value: &str) -> InferenceRecord {
    InferenceRecord {
        cell_reference: reference.to_string(),
        value: value.to_string(),
        context: "test".to_string(),
    }
}

fn fixture(workspace: &support::TestWorkspace, name: &str) -> std::path::PathBuf {
    workspace.create_workbook(name, |book| {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A1").set_value("existing");
        sheet.get_cell_mut("D4").set_value("far corner");
        sheet.add_merge_cells("B2:C2");
    })
}

#[test]
fn merge_member_writes_redirect_to_the_anchor() {
    let workspace = support::TestWorkspace::new();
    let input = fixture(&workspace, "merge.xlsx");
    let output = workspace.path("updated_workbooks/merge.xlsx");

    let analysis = normalize("merge.xlsx", "Sheet1", "merge_Sheet1", &[record("C2", "anchored")]);
    let stats = apply_to_workbook(&input, &output, &[analysis]).expect("apply");

    assert_eq!(stats.written, 1);
    assert_eq!(stats.redirected, 1);

    let book = xlsx::read(&output).expect("read output");
    let sheet = book.get_sheet_by_name("Sheet1").expect("sheet");
    // Value lands on B2, never on the covered C2.
    assert_eq!(sheet.get_cell("B2").expect("anchor").get_value(), "anchored");
    assert!(
        sheet
            .get_cell("C2")
            .map(|cell| cell.get_value().is_empty())
            .unwrap_or(true)
    );
}

#[test]
fn populated_cells_are_overwritten_and_counted() {
    let workspace = support::TestWorkspace::new();
    let input = fixture(&workspace, "overwrite.xlsx");
    let output = workspace.path("updated_workbooks/overwrite.xlsx");

    let analysis = normalize(
        "overwrite.xlsx",
        "Sheet1",
        "overwrite_Sheet1",
        &[record("A1", "new")],
    );
    let stats = apply_to_workbook(&input, &output, &[analysis]).expect("apply");

    assert_eq!(stats.written, 1);
    assert_eq!(stats.overwritten, 1);

    let book = xlsx::read(&output).expect("read output");
    let sheet = book.get_sheet_by_name("Sheet1").expect("sheet");
    // The documented default: the inferred value replaces the old one.
    assert_eq!(sheet.get_cell("A1").expect("cell").get_value(), "new");
    // Nothing else moved.
    assert_eq!(sheet.get_cell("D4").expect("cell").get_value(), "far corner");
}

#[test]
fn records_outside_the_grid_are_skipped_per_record() {
    let workspace = support::TestWorkspace::new();
    let input = fixture(&workspace, "bounds.xlsx");
    let output = workspace.path("updated_workbooks/bounds.xlsx");

    let analysis = normalize(
        "bounds.xlsx",
        "Sheet1",
        "bounds_Sheet1",
        &[
            record("Z99", "lost"),
            record("TOTAL", "unparseable"),
            record("B3", "kept"),
            record("C3", "   "),
        ],
    );
    let stats = apply_to_workbook(&input, &output, &[analysis]).expect("apply");

    assert_eq!(stats.written, 1);
    assert_eq!(stats.skipped_missing, 2);
    assert_eq!(stats.skipped_empty_value, 1);

    let book = xlsx::read(&output).expect("read output");
    let sheet = book.get_sheet_by_name("Sheet1").expect("sheet");
    assert_eq!(sheet.get_cell("B3").expect("cell").get_value(), "kept");
}

#[test]
fn numeric_looking_values_are_written_as_numbers() {
    let workspace = support::TestWorkspace::new();
    let input = fixture(&workspace, "coerce.xlsx");
    let output = workspace.path("updated_workbooks/coerce.xlsx");

    let analysis = normalize(
        "coerce.xlsx",
        "Sheet1",
        "coerce_Sheet1",
        &[
            record("B3", "1,200"),
            record("C3", "3.5"),
            record("B4", "not a number"),
        ],
    );
    apply_to_workbook(&input, &output, &[analysis]).expect("apply");

    let book = xlsx::read(&output).expect("read output");
    let sheet = book.get_sheet_by_name("Sheet1").expect("sheet");
    assert_eq!(sheet.get_cell("B3").expect("cell").get_value(), "1200");
    assert_eq!(sheet.get_cell("C3").expect("cell").get_value(), "3.5");
    assert_eq!(sheet.get_cell("B4").expect("cell").get_value(), "not a number");
}

#[test]
fn applying_twice_to_fresh_copies_is_idempotent() {
    let workspace = support::TestWorkspace::new();
    let input = fixture(&workspace, "idem.xlsx");
    let first = workspace.path("updated_workbooks/idem-first.xlsx");
    let second = workspace.path("updated_workbooks/idem-second.xlsx");

    let analysis = normalize(
        "idem.xlsx",
        "Sheet1",
        "idem_Sheet1",
        &[record("B3", "same"), record("A1", "rewritten")],
    );

    let stats_first = apply_to_workbook(&input, &first, &[analysis.clone()]).expect("first apply");
    let stats_second = apply_to_workbook(&input, &second, &[analysis]).expect("second apply");
    assert_eq!(stats_first, stats_second);

    let book_first = xlsx::read(&first).expect("read first");
    let book_second = xlsx::read(&second).expect("read second");
    for reference in ["A1", "B2", "B3", "D4"] {
        let value_first = book_first
            .get_sheet_by_name("Sheet1")
            .and_then(|sheet| sheet.get_cell(reference))
            .map(|cell| cell.get_value().to_string())
            .unwrap_or_default();
        let value_second = book_second
            .get_sheet_by_name("Sheet1")
            .and_then(|sheet| sheet.get_cell(reference))
            .map(|cell| cell.get_value().to_string())
            .unwrap_or_default();
        assert_eq!(value_first, value_second, "cell {reference} diverged");
    }
}

#[test]
fn input_workbook_is_never_mutated_in_place() {
    let workspace = support::TestWorkspace::new();
    let input = fixture(&workspace, "immutable.xlsx");
    let before = std::fs::read(&input).expect("read input");

    let analysis = normalize(
        "immutable.xlsx",
        "Sheet1",
        "immutable_Sheet1",
        &[record("B3", "value")],
    );

    // Writing straight onto the input path is refused outright.
    assert!(apply_to_workbook(&input, &input, &[analysis.clone()]).is_err());

    let output = workspace.path("updated_workbooks/immutable.xlsx");
    apply_to_workbook(&input, &output, &[analysis]).expect("apply");
    let after = std::fs::read(&input).expect("reread input");
    assert_eq!(before, after);
}
