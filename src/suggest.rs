//! AI subtask suggestions.
//!
//! A [`Suggester`] turns a task's title and description into a short list
//! of actionable subtasks. Two backends exist:
//!
//! - [`GeminiSuggester`] asks the Gemini `generateContent` API and splits
//!   the answer into lines.
//! - [`EndpointSuggester`] POSTs `{taskTitle, taskDescription}` to a
//!   service that answers `{subtasks: [...]}`.
//!
//! Each call is a single request with no retry. [`apply_suggestions`]
//! writes a successful result onto the task and leaves the task untouched
//! on any failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::{SuggestConfig, SuggestProvider};
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;
use crate::store::{Stored, TaskStore};
use crate::task::Task;

#[async_trait]
pub trait Suggester: Send + Sync {
    async fn suggest(&self, title: &str, description: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl Suggester for Box<dyn Suggester> {
    async fn suggest(&self, title: &str, description: &str) -> Result<Vec<String>> {
        (**self).suggest(title, description).await
    }
}

/// Build the backend selected by `config`.
pub fn from_config(config: &SuggestConfig) -> Result<Box<dyn Suggester>> {
    match config.provider {
        SuggestProvider::Gemini => {
            let api_key = config
                .api_key()
                .ok_or_else(|| Error::MissingCredential(config.api_key_env.clone()))?;
            Ok(Box::new(GeminiSuggester::new(config, api_key)?))
        }
        SuggestProvider::Endpoint => Ok(Box::new(EndpointSuggester::new(config)?)),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Prompt asking for 3-5 subtasks, one per line, unnumbered.
pub fn build_prompt(title: &str, description: &str) -> String {
    let mut prompt = String::from("Break down this task into 3-5 smaller, actionable subtasks:\n\n");
    prompt.push_str(&format!("Task: {}\n", title.trim()));
    if !description.trim().is_empty() {
        prompt.push_str(&format!("Description: {}\n", description.trim()));
    }
    prompt.push_str(
        "\nPlease provide only the subtasks as a simple list, each on a new line, \
         without numbering or bullet points. Make them specific and actionable.",
    );
    prompt
}

/// Split generated text into subtasks: trimmed non-blank lines, minus
/// echoed instruction lines, with any leading `N. ` removed.
pub fn parse_subtasks(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_artifact_line(line))
        .map(strip_numbering)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

// Models sometimes echo "each on a new line" back; any line containing
// "line" anywhere, in any case, is dropped.
fn is_artifact_line(line: &str) -> bool {
    line.to_ascii_lowercase().contains("line")
}

fn strip_numbering(line: &str) -> &str {
    let digits = line.len() - line.trim_start_matches(|ch: char| ch.is_ascii_digit()).len();
    if digits == 0 {
        return line;
    }
    match line[digits..].strip_prefix('.') {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSuggester {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiSuggester {
    pub fn new(config: &SuggestConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key.into(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[async_trait]
impl Suggester for GeminiSuggester {
    async fn suggest(&self, title: &str, description: &str) -> Result<Vec<String>> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: build_prompt(title, description),
                }],
            }],
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| Error::InvalidConfig("API key is not a valid header value".to_string()))?;
        headers.insert("x-goog-api-key", key);

        tracing::debug!(model = %self.model, "requesting subtask suggestions");
        let response = self
            .client
            .post(self.build_url())
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Suggestion(format!("HTTP {status}: {text}")));
        }

        let parsed: GeminiResponse = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(Error::Suggestion(format!("Gemini API error: {}", error.message)));
        }

        let text: String = parsed
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Suggestion("response contained no text".to_string()));
        }

        Ok(parse_subtasks(&text))
    }
}

#[derive(Debug, Clone)]
pub struct EndpointSuggester {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EndpointRequest<'a> {
    task_title: &'a str,
    task_description: &'a str,
}

#[derive(Debug, Deserialize)]
struct EndpointResponse {
    subtasks: Vec<String>,
}

impl EndpointSuggester {
    pub fn new(config: &SuggestConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::InvalidConfig("suggest.url is not set".to_string()))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Suggester for EndpointSuggester {
    async fn suggest(&self, title: &str, description: &str) -> Result<Vec<String>> {
        tracing::debug!(url = %self.url, "requesting subtask suggestions");
        let response = self
            .client
            .post(&self.url)
            .json(&EndpointRequest {
                task_title: title,
                task_description: description,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Suggestion(format!("HTTP {status}: {text}")));
        }

        let parsed: EndpointResponse = response.json().await?;
        Ok(parse_subtasks(&parsed.subtasks.join("\n")))
    }
}

/// What happened when suggestions were requested for a task.
#[derive(Debug)]
pub enum SuggestOutcome {
    /// Subtasks were replaced with the suggestions. The list may be empty
    /// when every returned line was filtered out.
    Applied(Stored<Task>),
    /// The request failed; task unchanged
    Failed(String),
    NotFound,
}

/// Ask `suggester` for subtasks of task `id` and store them.
pub async fn apply_suggestions<S, G>(store: &TaskStore<S>, suggester: &G, id: &str) -> SuggestOutcome
where
    S: KeyValueStore,
    G: Suggester + ?Sized,
{
    let Some(task) = store.get(id) else {
        return SuggestOutcome::NotFound;
    };

    let subtasks = match suggester.suggest(&task.title, &task.description).await {
        Ok(subtasks) => subtasks,
        Err(err) => {
            tracing::warn!(id, error = %err, "subtask suggestion failed");
            return SuggestOutcome::Failed(err.to_string());
        }
    };

    if subtasks.is_empty() {
        tracing::info!(id, "suggestion left no usable subtasks; clearing");
    }

    match store.set_subtasks(id, subtasks) {
        Some(stored) => SuggestOutcome::Applied(stored),
        // Deleted by another writer while the request was in flight.
        None => SuggestOutcome::NotFound,
    }
}
