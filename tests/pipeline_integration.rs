use async_trait::async_trait;
use sheetfill::error::InferenceError;
use sheetfill::infer::CompletionBackend;
use sheetfill::model::UnitStatus;
use sheetfill::pipeline;
use std::sync::atomic::{AtomicU32, Ordering};
use umya_spreadsheet::reader::xlsx;

mod support;

struct FnBackend<F>(F);

#[async_trait]
impl<F> CompletionBackend for FnBackend<F>
where
    F: Fn(&str) -> Result<String, InferenceError> + Send + Sync,
{
    async fn complete(&self, prompt: &str) -> Result<String, InferenceError> {
        (self.0)(prompt)
    }
}

#[tokio::test]
async fn full_run_renders_infers_and_writes_back() {
    let workspace = support::TestWorkspace::new();
    workspace.create_workbook("alpha.xlsx", |book| {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A1").set_value("Item");
        sheet.get_cell_mut("B1").set_value("Amount");
        sheet.get_cell_mut("A2").set_value("Licence fee");
    });
    workspace.write_context("alpha_Sheet1.txt", "The licence fee for PO-778 is 1,200.");

    let backend = FnBackend(|prompt: &str| -> Result<String, InferenceError> {
        // The request must carry both the markup and the auxiliary text.
        assert!(prompt.contains("data-ref=\"B2\""));
        assert!(prompt.contains("PO-778"));
        Ok(r#"[{"cell_reference": "B2", "value": "1,200", "context": "licence fee row"}]"#
            .to_string())
    });

    let config = workspace.config();
    let summary = pipeline::run(&config, &backend).await.expect("run");

    assert_eq!(summary.units.len(), 1);
    assert!(matches!(summary.units[0].status, UnitStatus::Filled { cells: 1 }));

    assert!(workspace.path("html_outputs/alpha_Sheet1.html").is_file());
    for extension in ["csv", "json", "txt", "xlsx"] {
        assert!(
            workspace
                .path(&format!("analysis_outputs/alpha_Sheet1.{extension}"))
                .is_file()
        );
    }

    let book = xlsx::read(workspace.path("updated_workbooks/alpha.xlsx")).expect("updated workbook");
    let sheet = book.get_sheet_by_name("Sheet1").expect("sheet");
    assert_eq!(sheet.get_cell("B2").expect("filled cell").get_value(), "1200");
    assert_eq!(sheet.get_cell("A2").expect("untouched").get_value(), "Licence fee");
}

#[tokio::test]
async fn retry_exhaustion_degrades_one_unit_and_the_batch_continues() {
    let workspace = support::TestWorkspace::new();
    workspace.create_workbook("aaa.xlsx", |book| {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A1").set_value("broken unit");
    });
    workspace.create_workbook("bbb.xlsx", |book| {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A1").set_value("healthy unit");
    });

    let failing_calls = AtomicU32::new(0);
    let backend = FnBackend(|prompt: &str| -> Result<String, InferenceError> {
        if prompt.contains("Sheet1 - aaa") {
            failing_calls.fetch_add(1, Ordering::SeqCst);
            Err(InferenceError::Api {
                status: 503,
                body: "upstream unavailable".to_string(),
            })
        } else {
            Ok(r#"[{"cell_reference": "A1", "value": "ok", "context": "c"}]"#.to_string())
        }
    });

    let config = workspace.config();
    let summary = pipeline::run(&config, &backend).await.expect("run");

    // Three identical attempts against the failing unit, then it degrades.
    assert_eq!(failing_calls.load(Ordering::SeqCst), 3);

    let aaa = summary
        .units
        .iter()
        .find(|unit| unit.workbook == "aaa.xlsx")
        .expect("aaa unit");
    assert!(matches!(
        aaa.status,
        UnitStatus::Partial {
            cells: 0,
            degraded_windows: 1
        }
    ));
    assert!(workspace.path("analysis_outputs/aaa_Sheet1.raw.txt").is_file());
    assert!(!workspace.path("updated_workbooks/aaa.xlsx").exists());

    // The batch carried on to the next workbook.
    let bbb = summary
        .units
        .iter()
        .find(|unit| unit.workbook == "bbb.xlsx")
        .expect("bbb unit");
    assert!(matches!(bbb.status, UnitStatus::Filled { cells: 1 }));
    assert!(workspace.path("updated_workbooks/bbb.xlsx").is_file());
}

#[tokio::test]
async fn credential_failures_abort_the_whole_run() {
    let workspace = support::TestWorkspace::new();
    workspace.create_workbook("alpha.xlsx", |book| {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A1").set_value("Item");
    });

    let backend = FnBackend(|_prompt: &str| -> Result<String, InferenceError> {
        Err(InferenceError::Api {
            status: 401,
            body: "invalid api key".to_string(),
        })
    });

    let config = workspace.config();
    assert!(pipeline::run(&config, &backend).await.is_err());
}

#[tokio::test]
async fn empty_worksheets_are_skipped_without_an_inference_call() {
    let workspace = support::TestWorkspace::new();
    workspace.create_workbook("blank.xlsx", |_| {});

    let calls = AtomicU32::new(0);
    let backend = FnBackend(|_prompt: &str| -> Result<String, InferenceError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok("[]".to_string())
    });

    let config = workspace.config();
    let summary = pipeline::run(&config, &backend).await.expect("run");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.units.len(), 1);
    assert!(matches!(summary.units[0].status, UnitStatus::Skipped { .. }));
    // The markup artifact is still produced for inspection.
    assert!(workspace.path("html_outputs/blank_Sheet1.html").is_file());
}

#[tokio::test]
async fn missing_context_degrades_to_structural_only_inference() {
    let workspace = support::TestWorkspace::new();
    workspace.create_workbook("solo.xlsx", |book| {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A1").set_value("Header");
    });

    let backend = FnBackend(|prompt: &str| -> Result<String, InferenceError> {
        assert!(prompt.contains("no auxiliary text supplied"));
        Ok("[]".to_string())
    });

    let config = workspace.config();
    let summary = pipeline::run(&config, &backend).await.expect("run");
    assert_eq!(summary.units.len(), 1);
    assert!(matches!(summary.units[0].status, UnitStatus::Filled { cells: 0 }));
}

#[tokio::test]
async fn unreadable_workbooks_are_reported_and_skipped() {
    let workspace = support::TestWorkspace::new();
    std::fs::write(workspace.path("input/corrupt.xlsx"), b"not a zip").expect("write file");
    workspace.create_workbook("good.xlsx", |book| {
        let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
        sheet.get_cell_mut("A1").set_value("fine");
    });

    let backend = FnBackend(|_prompt: &str| -> Result<String, InferenceError> {
        Ok("[]".to_string())
    });

    let config = workspace.config();
    let summary = pipeline::run(&config, &backend).await.expect("run");

    let corrupt = summary
        .units
        .iter()
        .find(|unit| unit.workbook == "corrupt.xlsx")
        .expect("corrupt unit");
    assert!(matches!(corrupt.status, UnitStatus::Skipped { .. }));

    let good = summary
        .units
        .iter()
        .find(|unit| unit.workbook == "good.xlsx")
        .expect("good unit");
    assert!(matches!(good.status, UnitStatus::Filled { .. }));
}
