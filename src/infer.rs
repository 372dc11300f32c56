//! Inference client for the cell-fill capability.
//!
//! The text-generation capability sits behind [`CompletionBackend`]; the
//! bundled implementation talks to an OpenAI-compatible chat-completions
//! endpoint, but the client, retry envelope and response parsing do not
//! depend on that shape. The client produces claims; whether a claimed
//! cell exists in the workbook is the writer's concern.

use crate::config::InferenceSettings;
use crate::context::ContextDocument;
use crate::error::{ErrorClass, InferenceError};
use crate::model::{InferenceOutcome, InferenceRecord, WindowFallback};
use crate::retry::{RetryConfig, retry_with_policy};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Abstract "infer values for cells given context" capability.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, InferenceError>;
}

/// Chat-completions backend over HTTP.
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl HttpCompletionBackend {
    pub fn from_settings(settings: &InferenceSettings) -> Result<Self, InferenceError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(InferenceError::MissingCredentials)?;
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(InferenceError::Transport)?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(&self, prompt: &str) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(InferenceError::Transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api { status, body });
        }

        let completion: ChatCompletionResponse =
            response.json().await.map_err(InferenceError::Transport)?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| InferenceError::UnparseableResponse {
                reason: "completion carried no choices".to_string(),
                raw: String::new(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct InferenceClient<'a> {
    backend: &'a dyn CompletionBackend,
    retry: RetryConfig,
    chunk_rows: u32,
}

impl<'a> InferenceClient<'a> {
    pub fn new(backend: &'a dyn CompletionBackend, retry: RetryConfig, chunk_rows: u32) -> Self {
        Self {
            backend,
            retry,
            chunk_rows: chunk_rows.max(1),
        }
    }

    /// Infer cell values for one worksheet, one row window at a time. The
    /// full markup travels with every request so the model keeps global
    /// table context; only the window's records are requested back.
    ///
    /// Returns `Err` only on fatal failures (credentials); transient
    /// exhaustion and malformed payloads degrade the affected window to a
    /// raw-text fallback and the remaining windows still run.
    pub async fn infer(
        &self,
        markup: &str,
        context: &ContextDocument,
        total_rows: u32,
    ) -> Result<InferenceOutcome, InferenceError> {
        if markup.trim().is_empty() {
            tracing::warn!("markup is empty; nothing to infer");
            return Ok(InferenceOutcome::Complete(Vec::new()));
        }

        let windows = row_windows(total_rows, self.chunk_rows);
        tracing::info!(
            windows = windows.len(),
            chunk_rows = self.chunk_rows,
            total_rows,
            "running inference"
        );

        let mut records = Vec::new();
        let mut fallbacks = Vec::new();

        for (start_row, end_row) in windows {
            let prompt = build_prompt(markup, &context.text, start_row, end_row);
            let exchange = retry_with_policy(
                || async { self.backend.complete(&prompt).await },
                &self.retry,
                "inference",
            )
            .await;

            match exchange {
                Ok(raw) => match parse_records(&raw) {
                    Ok(window_records) => {
                        tracing::debug!(
                            start_row,
                            end_row,
                            records = window_records.len(),
                            "window parsed"
                        );
                        records.extend(window_records);
                    }
                    Err(error) => {
                        tracing::warn!(start_row, end_row, error = %error, "window degraded to raw fallback");
                        fallbacks.push(WindowFallback {
                            start_row,
                            end_row,
                            detail: error
                                .raw_payload()
                                .map(str::to_string)
                                .unwrap_or_else(|| error.to_string()),
                        });
                    }
                },
                Err(error) if error.class() == ErrorClass::Fatal => return Err(error),
                Err(error) => {
                    tracing::warn!(start_row, end_row, error = %error, "window failed after retries");
                    fallbacks.push(WindowFallback {
                        start_row,
                        end_row,
                        detail: error
                            .raw_payload()
                            .map(str::to_string)
                            .unwrap_or_else(|| error.to_string()),
                    });
                }
            }
        }

        if fallbacks.is_empty() {
            Ok(InferenceOutcome::Complete(records))
        } else {
            Ok(InferenceOutcome::Partial { records, fallbacks })
        }
    }
}

/// 1-based inclusive row windows covering the worksheet.
pub fn row_windows(total_rows: u32, chunk_rows: u32) -> Vec<(u32, u32)> {
    let chunk_rows = chunk_rows.max(1);
    let mut windows = Vec::new();
    let mut start = 1;
    while start <= total_rows {
        let end = (start + chunk_rows - 1).min(total_rows);
        windows.push((start, end));
        start = end + 1;
    }
    windows
}

fn build_prompt(markup: &str, context_text: &str, start_row: u32, end_row: u32) -> String {
    let context_section = if context_text.trim().is_empty() {
        "(no auxiliary text supplied; propose values only where the table structure itself determines them)"
    } else {
        context_text
    };

    format!(
        "Analyze the provided HTML table and the available text data to determine which cells \
         need filling or correcting.\n\n\
         ## INPUT\n\
         - HTML table:\n{markup}\n\n\
         - Text data for filling:\n{context_section}\n\n\
         - Row range: rows {start_row} to {end_row}\n\n\
         ## TASK\n\
         1. Parse the HTML table and map it to spreadsheet coordinates (A1, B2, ...); each data \
         cell carries its reference in a data-ref attribute.\n\
         2. Identify cells that should be filled: truly empty cells, placeholder markers \
         (\"N/A\", \"TBD\", \"___\", \"?\"), instructional text, and values that conflict with \
         their row and column context.\n\
         3. Match values from the text data to those cells. Use column headers, row labels and \
         neighbouring values to justify every match, and propose only values sourced from the \
         text data.\n\
         4. Analyze the complete table for context, but return only cells within rows \
         {start_row} to {end_row}.\n\n\
         ## OUTPUT\n\
         Return ONLY a JSON array, no commentary before or after:\n\
         [\n  {{\"cell_reference\": \"B3\", \"value\": \"Correct Data\", \"context\": \"why this \
         cell receives this value\"}}\n]\n"
    )
}

static JSON_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("array pattern"));

/// Pull the record list out of a completion that may wrap it in prose.
/// Accepts a bare object as a single-element list.
pub fn parse_records(raw: &str) -> Result<Vec<InferenceRecord>, InferenceError> {
    let candidate = JSON_ARRAY
        .find(raw)
        .map(|m| m.as_str())
        .unwrap_or_else(|| raw.trim());

    if let Ok(records) = serde_json::from_str::<Vec<InferenceRecord>>(candidate) {
        return Ok(records);
    }
    if let Ok(record) = serde_json::from_str::<InferenceRecord>(raw.trim()) {
        return Ok(vec![record]);
    }

    Err(InferenceError::UnparseableResponse {
        reason: "no JSON record list found in completion".to_string(),
        raw: raw.to_string(),
    })
}
