use crate::utils::artifact_stem;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Unstructured auxiliary text paired with one worksheet. Immutable once
/// loaded; an absent document degrades to structural-only inference.
#[derive(Debug, Clone)]
pub struct ContextDocument {
    pub path: Option<PathBuf>,
    pub text: String,
}

impl ContextDocument {
    pub fn empty() -> Self {
        Self {
            path: None,
            text: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Resolve and read `{workbook}_{sheet}.txt` from the context directory.
/// Missing file is not an error; an unreadable existing file is.
pub fn load_context(
    context_dir: &Path,
    workbook_stem: &str,
    sheet_name: &str,
) -> Result<ContextDocument> {
    let file_name = format!("{}.txt", artifact_stem(workbook_stem, sheet_name));
    let path = context_dir.join(&file_name);

    if !path.is_file() {
        tracing::warn!(
            context_file = %path.display(),
            "no context document found; proceeding with empty context"
        );
        return Ok(ContextDocument::empty());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read context document {:?}", path))?;
    Ok(ContextDocument {
        path: Some(path),
        text: text.trim().to_string(),
    })
}
