//! Per-client configuration.
//!
//! Stored as a JSON file on disk:
//! ```json
//! {
//!   "clientId": "smile-dental",
//!   "displayName": "Smile Dental",
//!   "dataDir": "data/smile-dental",
//!   "transferToolNames": ["transferCall"],
//!   "classifier": { "mode": "hybrid", "batchSize": 50, "batchDelayMs": 1000 },
//!   "llm": { "model": "gpt-4o-mini", "apiKeyEnv": "OPENAI_API_KEY" }
//! }
//! ```
//! Every field except `clientId` has a default. Credentials are never stored
//! here, only the names of the environment variables holding them.

use anyhow::{Context, Result, bail};
use call_outcome_rater::classify::ClassifierMode;
use call_outcome_rater::classify::llm::{DEFAULT_BATCH_SIZE, DEFAULT_TRANSCRIPT_CHARS};
use call_outcome_rater::features::ExtractorConfig;
use call_outcome_rater::pipeline::PipelineConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub client_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub transfer_tool_names: Option<Vec<String>>,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub voice_platform: VoicePlatformSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    pub mode: ClassifierMode,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub transcript_chars: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: 1000,
            transcript_chars: DEFAULT_TRANSCRIPT_CHARS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoicePlatformSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub page_size: usize,
}

impl Default for VoicePlatformSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.vapi.ai".into(),
            api_key_env: "VAPI_API_KEY".into(),
            page_size: 100,
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}

impl ClientConfig {
    /// Loads and validates the config at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read client config '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("invalid client config '{path}'"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            bail!("clientId must not be empty");
        }
        if self.classifier.batch_size == 0 {
            bail!("classifier.batchSize must be greater than zero");
        }
        if self.voice_platform.page_size == 0 {
            bail!("voicePlatform.pageSize must be greater than zero");
        }
        if let Some(names) = &self.transfer_tool_names {
            if names.iter().all(|n| n.trim().is_empty()) {
                bail!("transferToolNames must name at least one tool");
            }
        }
        Ok(())
    }

    pub fn extractor(&self) -> ExtractorConfig {
        match &self.transfer_tool_names {
            Some(names) => ExtractorConfig {
                transfer_tool_names: names.clone(),
            },
            None => ExtractorConfig::default(),
        }
    }

    pub fn pipeline(&self, mode: Option<ClassifierMode>, force: bool) -> PipelineConfig {
        PipelineConfig {
            mode: mode.unwrap_or(self.classifier.mode),
            batch_size: self.classifier.batch_size,
            batch_delay: Duration::from_millis(self.classifier.batch_delay_ms),
            force,
            extractor: self.extractor(),
        }
    }
}

/// Reads a credential from the environment. A missing or empty value is a
/// fatal configuration error.
pub fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{name} must be set"),
    }
}
