use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_EXTENSIONS: &[&str] = &["xlsx"];
const DEFAULT_INPUT_DIR: &str = "input";
const DEFAULT_CONTEXT_DIR: &str = "data_sources";
const DEFAULT_MARKUP_DIR: &str = "html_outputs";
const DEFAULT_ANALYSIS_DIR: &str = "analysis_outputs";
const DEFAULT_OUTPUT_DIR: &str = "updated_workbooks";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_MAX_TOKENS: u32 = 20_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CHUNK_ROWS: u32 = 30;

/// Immutable run configuration. Built once at startup from CLI arguments,
/// an optional config file and the environment; core logic only ever sees
/// this object, never ambient globals.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub context_dir: PathBuf,
    pub markup_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub output_dir: PathBuf,
    pub supported_extensions: Vec<String>,
    pub inference: InferenceSettings,
}

/// Settings for the text-generation capability and its retry envelope.
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub api_base: String,
    /// Resolved from SHEETFILL_API_KEY / OPENAI_API_KEY at config-build
    /// time; `None` is only acceptable when a backend override is supplied
    /// (tests, alternative capabilities).
    pub api_key: Option<String>,
    pub model: String,
    /// Held low by default so repeated runs lean deterministic.
    pub temperature: f32,
    pub max_tokens: u32,
    /// Total attempts per row window, first try included.
    pub max_attempts: u32,
    pub request_timeout: Duration,
    /// Rows per inference request window.
    pub chunk_rows: u32,
}

impl PipelineConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            input_dir: cli_input_dir,
            context_dir: cli_context_dir,
            markup_dir: cli_markup_dir,
            analysis_dir: cli_analysis_dir,
            output_dir: cli_output_dir,
            extensions: cli_extensions,
            api_base: cli_api_base,
            model: cli_model,
            temperature: cli_temperature,
            max_tokens: cli_max_tokens,
            max_attempts: cli_max_attempts,
            request_timeout_secs: cli_request_timeout_secs,
            chunk_rows: cli_chunk_rows,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            input_dir: file_input_dir,
            context_dir: file_context_dir,
            markup_dir: file_markup_dir,
            analysis_dir: file_analysis_dir,
            output_dir: file_output_dir,
            extensions: file_extensions,
            api_base: file_api_base,
            model: file_model,
            temperature: file_temperature,
            max_tokens: file_max_tokens,
            max_attempts: file_max_attempts,
            request_timeout_secs: file_request_timeout_secs,
            chunk_rows: file_chunk_rows,
        } = file_config;

        let mut supported_extensions = cli_extensions
            .or(file_extensions)
            .unwrap_or_else(|| {
                DEFAULT_EXTENSIONS
                    .iter()
                    .map(|ext| (*ext).to_string())
                    .collect()
            })
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect::<Vec<_>>();
        supported_extensions.sort();
        supported_extensions.dedup();
        anyhow::ensure!(
            !supported_extensions.is_empty(),
            "at least one workbook extension must be provided"
        );

        let temperature = cli_temperature
            .or(file_temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        anyhow::ensure!(
            (0.0..=2.0).contains(&temperature),
            "temperature {} outside the supported range 0.0..=2.0",
            temperature
        );

        let max_attempts = cli_max_attempts
            .or(file_max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .max(1);

        let chunk_rows = cli_chunk_rows
            .or(file_chunk_rows)
            .unwrap_or(DEFAULT_CHUNK_ROWS)
            .max(1);

        let request_timeout = Duration::from_secs(
            cli_request_timeout_secs
                .or(file_request_timeout_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .max(1),
        );

        let api_key = env::var("SHEETFILL_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        let inference = InferenceSettings {
            api_base: cli_api_base
                .or(file_api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key,
            model: cli_model
                .or(file_model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            max_tokens: cli_max_tokens.or(file_max_tokens).unwrap_or(DEFAULT_MAX_TOKENS),
            max_attempts,
            request_timeout,
            chunk_rows,
        };

        Ok(Self {
            input_dir: cli_input_dir
                .or(file_input_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR)),
            context_dir: cli_context_dir
                .or(file_context_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTEXT_DIR)),
            markup_dir: cli_markup_dir
                .or(file_markup_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKUP_DIR)),
            analysis_dir: cli_analysis_dir
                .or(file_analysis_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ANALYSIS_DIR)),
            output_dir: cli_output_dir
                .or(file_output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            supported_extensions,
            inference,
        })
    }

    /// Fail-fast validation of the input side plus creation of the output
    /// directories. The input directory being unreadable is the one fatal
    /// filesystem condition; a missing context directory only degrades.
    pub fn ensure_directories(&self) -> Result<()> {
        anyhow::ensure!(
            self.input_dir.exists(),
            "input directory {:?} does not exist",
            self.input_dir
        );
        anyhow::ensure!(
            self.input_dir.is_dir(),
            "input path {:?} is not a directory",
            self.input_dir
        );
        if !self.context_dir.is_dir() {
            tracing::warn!(
                context_dir = %self.context_dir.display(),
                "context directory missing; worksheets will run with empty context"
            );
        }
        for dir in [&self.markup_dir, &self.analysis_dir, &self.output_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output directory {:?}", dir))?;
        }
        Ok(())
    }

    pub fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let lower = ext.to_ascii_lowercase();
                self.supported_extensions.iter().any(|c| c == &lower)
            })
            .unwrap_or(false)
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "sheetfill",
    about = "Fill spreadsheet cells from unstructured text with an LLM",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEETFILL_INPUT_DIR",
        value_name = "DIR",
        help = "Directory scanned for input workbooks"
    )]
    pub input_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEETFILL_CONTEXT_DIR",
        value_name = "DIR",
        help = "Directory holding {workbook}_{sheet}.txt context documents"
    )]
    pub context_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEETFILL_MARKUP_DIR",
        value_name = "DIR",
        help = "Directory receiving the per-worksheet HTML projections"
    )]
    pub markup_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEETFILL_ANALYSIS_DIR",
        value_name = "DIR",
        help = "Directory receiving analysis outputs (csv/json/txt/xlsx)"
    )]
    pub analysis_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEETFILL_OUTPUT_DIR",
        value_name = "DIR",
        help = "Directory receiving updated workbooks (input is never written)"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEETFILL_EXTENSIONS",
        value_name = "EXT",
        value_delimiter = ',',
        help = "Comma-separated list of allowed workbook extensions"
    )]
    pub extensions: Option<Vec<String>>,

    #[arg(
        long,
        env = "SHEETFILL_API_BASE",
        value_name = "URL",
        help = "Base URL of the OpenAI-compatible completion endpoint"
    )]
    pub api_base: Option<String>,

    #[arg(
        long,
        env = "SHEETFILL_MODEL",
        value_name = "MODEL",
        help = "Model identifier sent with every inference request"
    )]
    pub model: Option<String>,

    #[arg(
        long,
        env = "SHEETFILL_TEMPERATURE",
        value_name = "T",
        help = "Sampling temperature; keep low for repeatable mappings"
    )]
    pub temperature: Option<f32>,

    #[arg(
        long,
        env = "SHEETFILL_MAX_TOKENS",
        value_name = "N",
        help = "Completion token ceiling per request"
    )]
    pub max_tokens: Option<u32>,

    #[arg(
        long,
        env = "SHEETFILL_MAX_ATTEMPTS",
        value_name = "N",
        help = "Total attempts per row window on transient failure"
    )]
    pub max_attempts: Option<u32>,

    #[arg(
        long,
        env = "SHEETFILL_REQUEST_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Per-request timeout; expiry degrades only that worksheet"
    )]
    pub request_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "SHEETFILL_CHUNK_ROWS",
        value_name = "ROWS",
        help = "Worksheet rows per inference request window"
    )]
    pub chunk_rows: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    input_dir: Option<PathBuf>,
    context_dir: Option<PathBuf>,
    markup_dir: Option<PathBuf>,
    analysis_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    extensions: Option<Vec<String>>,
    api_base: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_attempts: Option<u32>,
    request_timeout_secs: Option<u64>,
    chunk_rows: Option<u32>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
