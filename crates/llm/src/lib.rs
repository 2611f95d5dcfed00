use reqwest::Client as Http;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_URL: &str = "http://127.0.0.1:11434/api/generate";
pub const DEFAULT_MODEL: &str = "gemma3:4b";
/// Replies longer than this are cut before being spoken
pub const MAX_REPLY_CHARS: usize = 800;
/// Used when the model server answers without a `response` field
pub const FALLBACK_REPLY: &str = "Desculpe, não entendi.";

#[derive(Clone, Debug)]
pub enum Provider {
    Ollama, // add more later
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("invalid inference configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Transport(#[source] reqwest::Error),

    #[error("{status} returned by model server: {body}")]
    Status { status: u16, body: String },

    #[error("invalid json from model server: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Sampling parameters sent as Ollama `options`
#[derive(Clone, Debug, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 1.2,
            top_k: 40,
            top_p: 0.95,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub provider: Provider,
    pub url: String,
    pub model: String,
    /// Upper bound for a whole generate call
    pub timeout: Duration,
    pub options: GenerateOptions,
    pub max_reply_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            url: DEFAULT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
            options: GenerateOptions::default(),
            max_reply_chars: MAX_REPLY_CHARS,
        }
    }
}

impl ClientConfig {
    /// Settings from `OLLAMA_URL`, `OLLAMA_MODEL`, `INFERENCE_TIMEOUT_SECS`
    /// and `LLM_TEMPERATURE` / `LLM_TOP_K` / `LLM_TOP_P`. Unset or blank
    /// variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InferenceError> {
        let defaults = Self::default();
        let var = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        Ok(Self {
            provider: Provider::Ollama,
            timeout: Duration::from_secs(parse_var(
                &var,
                "INFERENCE_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            options: GenerateOptions {
                temperature: parse_var(&var, "LLM_TEMPERATURE", defaults.options.temperature)?,
                top_k: parse_var(&var, "LLM_TOP_K", defaults.options.top_k)?,
                top_p: parse_var(&var, "LLM_TOP_P", defaults.options.top_p)?,
            },
            url: var("OLLAMA_URL").unwrap_or(defaults.url),
            model: var("OLLAMA_MODEL").unwrap_or(defaults.model),
            max_reply_chars: defaults.max_reply_chars,
        })
    }
}

fn parse_var<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, InferenceError>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|err| InferenceError::Config(format!("invalid value for {key}: {raw:?} ({err})"))),
        None => Ok(default),
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

#[derive(Clone, Debug)]
pub struct Client {
    http: Http,
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, InferenceError> {
        let http = Http::builder()
            .pool_max_idle_per_host(8)
            .timeout(config.timeout)
            .build()
            .map_err(|err| InferenceError::Config(format!("could not build http client: {err}")))?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// One-shot, non-streaming completion. The reply is trimmed and cut to
    /// `max_reply_chars`.
    pub async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let raw = match self.config.provider {
            Provider::Ollama => self.generate_ollama(prompt).await?,
        };
        Ok(truncate_reply(&raw, self.config.max_reply_chars))
    }

    async fn generate_ollama(&self, prompt: &str) -> Result<String, InferenceError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: &self.config.options,
        };

        debug!(model = %self.config.model, prompt_chars = prompt.chars().count(), "sending generate request");

        let resp = self
            .http
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(InferenceError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let v: Value = resp.json().await.map_err(InferenceError::Decode)?;
        let content = v
            .get("response")
            .and_then(|x| x.as_str())
            .unwrap_or(FALLBACK_REPLY);
        Ok(content.to_string())
    }
}

/// Trim surrounding whitespace and keep at most `max_chars` characters.
pub fn truncate_reply(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
