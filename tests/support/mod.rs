#![allow(dead_code)]

use sheetfill::{InferenceSettings, PipelineConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use umya_spreadsheet::{self, Spreadsheet};

pub fn write_workbook_to_path<F>(path: &Path, f: F)
where
    F: FnOnce(&mut Spreadsheet),
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dir");
    }
    let mut book = umya_spreadsheet::new_file();
    f(&mut book);
    umya_spreadsheet::writer::xlsx::write(&book, path).expect("write workbook");
}

pub struct TestWorkspace {
    _tempdir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let tempdir = tempdir().expect("tempdir");
        let root = tempdir.path().to_path_buf();
        std::fs::create_dir_all(root.join("input")).expect("input dir");
        std::fs::create_dir_all(root.join("data_sources")).expect("context dir");
        Self {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Build an xlsx fixture under `input/`.
    pub fn create_workbook<F>(&self, name: &str, f: F) -> PathBuf
    where
        F: FnOnce(&mut Spreadsheet),
    {
        let path = self.root.join("input").join(name);
        write_workbook_to_path(&path, f);
        path
    }

    /// Drop a context document under `data_sources/`.
    pub fn write_context(&self, file_name: &str, text: &str) -> PathBuf {
        let path = self.root.join("data_sources").join(file_name);
        std::fs::write(&path, text).expect("write context");
        path
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            input_dir: self.root.join("input"),
            context_dir: self.root.join("data_sources"),
            markup_dir: self.root.join("html_outputs"),
            analysis_dir: self.root.join("analysis_outputs"),
            output_dir: self.root.join("updated_workbooks"),
            supported_extensions: vec!["xlsx".to_string()],
            inference: test_inference_settings(),
        }
    }

    pub fn config_with<F>(&self, configure: F) -> PipelineConfig
    where
        F: FnOnce(&mut PipelineConfig),
    {
        let mut config = self.config();
        configure(&mut config);
        config
    }
}

pub fn test_inference_settings() -> InferenceSettings {
    InferenceSettings {
        api_base: "http://127.0.0.1:9".to_string(),
        api_key: Some("test-key".to_string()),
        model: "test-model".to_string(),
        temperature: 0.1,
        max_tokens: 2000,
        max_attempts: 3,
        request_timeout: Duration::from_secs(5),
        chunk_rows: 30,
    }
}
