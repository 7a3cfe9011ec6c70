//! Application configuration for Newsroom.
//!
//! User config lives at `~/.newsroom/newsroom.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NewsroomError, Result};
use crate::types::{ImageQuality, ModelTier};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newsroom.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newsroom";

// ---------------------------------------------------------------------------
// Config structs (matching newsroom.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generative model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Research loop policies.
    #[serde(default)]
    pub research: ResearchPoliciesConfig,

    /// Search and extraction providers.
    #[serde(default)]
    pub search: SearchConfig,

    /// Hero image generation.
    #[serde(default)]
    pub image: ImageConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory that receives `<slug>/` artifact folders.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Path of the libsql artifact database.
    #[serde(default = "default_database")]
    pub database: String,

    /// How many times a rejected article may be sent back to drafting.
    #[serde(default = "default_max_redrafts")]
    pub max_redrafts: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            database: default_database(),
            max_redrafts: default_max_redrafts(),
        }
    }
}

fn default_output_dir() -> String {
    "artifacts".into()
}
fn default_database() -> String {
    "~/.newsroom/newsroom.db".into()
}
fn default_max_redrafts() -> u32 {
    2
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for planning, drafting and approval.
    #[serde(default = "default_reasoning_model")]
    pub reasoning_model: String,

    /// Model used for reviews, polishing and image prompts.
    #[serde(default = "default_smart_model")]
    pub smart_model: String,

    /// Model used for high-volume research calls.
    #[serde(default = "default_mini_model")]
    pub mini_model: String,

    /// Reasoning effort sent with the reasoning tier.
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,

    /// Reasoning effort sent with the smart and mini tiers.
    #[serde(default = "default_light_effort")]
    pub light_effort: String,

    /// HTTP timeout for one generative call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Extra attempts after a schema-validation failure.
    #[serde(default = "default_validation_retries")]
    pub validation_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            reasoning_model: default_reasoning_model(),
            smart_model: default_smart_model(),
            mini_model: default_mini_model(),
            reasoning_effort: default_reasoning_effort(),
            light_effort: default_light_effort(),
            request_timeout_secs: default_request_timeout(),
            validation_retries: default_validation_retries(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_reasoning_model() -> String {
    "gpt-5.1".into()
}
fn default_smart_model() -> String {
    "gpt-5".into()
}
fn default_mini_model() -> String {
    "gpt-5-mini".into()
}
fn default_reasoning_effort() -> String {
    "medium".into()
}
fn default_light_effort() -> String {
    "minimal".into()
}
fn default_request_timeout() -> u64 {
    180
}
fn default_validation_retries() -> u32 {
    1
}

/// `[research]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPoliciesConfig {
    /// Maximum research turns per article.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Queries generated per turn.
    #[serde(default = "default_queries_per_turn")]
    pub queries_per_turn: usize,

    /// URLs selected for full extraction per turn.
    #[serde(default = "default_max_curated")]
    pub max_curated: usize,

    /// Turn summaries kept in the rolling context.
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,

    /// Extracted text is truncated to this many characters.
    #[serde(default = "default_max_extract_chars")]
    pub max_extract_chars: usize,

    /// Timeout for one search or extraction call.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for ResearchPoliciesConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            queries_per_turn: default_queries_per_turn(),
            max_curated: default_max_curated(),
            context_turns: default_context_turns(),
            max_extract_chars: default_max_extract_chars(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_max_turns() -> u32 {
    3
}
fn default_queries_per_turn() -> usize {
    3
}
fn default_max_curated() -> usize {
    3
}
fn default_context_turns() -> usize {
    3
}
fn default_max_extract_chars() -> usize {
    12_000
}
fn default_call_timeout() -> u64 {
    60
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the Tavily key.
    #[serde(default = "default_tavily_key_env")]
    pub tavily_api_key_env: String,

    /// Tavily API base URL.
    #[serde(default = "default_tavily_base_url")]
    pub tavily_base_url: String,

    /// Results requested per web query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Also query Wikipedia for background material.
    #[serde(default = "default_true")]
    pub wikipedia: bool,

    /// Wikipedia API endpoint.
    #[serde(default = "default_wikipedia_url")]
    pub wikipedia_url: String,

    /// Extraction backend: "tavily" or "http".
    #[serde(default = "default_extraction")]
    pub extraction: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key_env: default_tavily_key_env(),
            tavily_base_url: default_tavily_base_url(),
            max_results: default_max_results(),
            wikipedia: true,
            wikipedia_url: default_wikipedia_url(),
            extraction: default_extraction(),
        }
    }
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_tavily_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> usize {
    3
}
fn default_true() -> bool {
    true
}
fn default_wikipedia_url() -> String {
    "https://en.wikipedia.org/w/api.php".into()
}
fn default_extraction() -> String {
    "tavily".into()
}

/// `[image]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Generate a hero image at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Image model name.
    #[serde(default = "default_image_model")]
    pub model: String,

    /// Rendering quality.
    #[serde(default)]
    pub quality: ImageQuality,

    /// Output size, `WIDTHxHEIGHT`.
    #[serde(default = "default_image_size")]
    pub size: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_image_model(),
            quality: ImageQuality::default(),
            size: default_image_size(),
        }
    }
}

fn default_image_model() -> String {
    "gpt-image-1.5".into()
}
fn default_image_size() -> String {
    "1536x1024".into()
}

// ---------------------------------------------------------------------------
// Runtime config (merged from config + CLI flags, threaded into stages)
// ---------------------------------------------------------------------------

/// A concrete model choice for one generative call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: String,
    pub reasoning_effort: Option<String>,
}

/// Generative settings resolved once at pipeline-build time.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub reasoning_model: String,
    pub smart_model: String,
    pub mini_model: String,
    pub reasoning_effort: String,
    pub light_effort: String,
    pub validation_retries: u32,
}

impl GenerationSettings {
    /// Map a tier onto a model name and reasoning effort.
    pub fn select(&self, tier: ModelTier) -> ModelSelection {
        let (model, effort) = match tier {
            ModelTier::Reasoning => (&self.reasoning_model, &self.reasoning_effort),
            ModelTier::Smart => (&self.smart_model, &self.light_effort),
            ModelTier::Mini => (&self.mini_model, &self.light_effort),
        };
        ModelSelection {
            model: model.clone(),
            reasoning_effort: (!effort.is_empty()).then(|| effort.clone()),
        }
    }
}

impl From<&AppConfig> for GenerationSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            reasoning_model: config.model.reasoning_model.clone(),
            smart_model: config.model.smart_model.clone(),
            mini_model: config.model.mini_model.clone(),
            reasoning_effort: config.model.reasoning_effort.clone(),
            light_effort: config.model.light_effort.clone(),
            validation_retries: config.model.validation_retries,
        }
    }
}

/// Runtime research loop configuration.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub max_turns: u32,
    pub queries_per_turn: usize,
    pub max_curated: usize,
    pub context_turns: usize,
    pub max_extract_chars: usize,
    pub call_timeout: Duration,
}

impl From<&AppConfig> for ResearchConfig {
    fn from(config: &AppConfig) -> Self {
        let r = &config.research;
        Self {
            max_turns: r.max_turns,
            queries_per_turn: r.queries_per_turn.max(1),
            max_curated: r.max_curated.max(1),
            context_turns: r.context_turns,
            max_extract_chars: r.max_extract_chars,
            call_timeout: Duration::from_secs(r.call_timeout_secs.max(1)),
        }
    }
}

/// Runtime image options.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub enabled: bool,
    pub model: String,
    pub quality: ImageQuality,
    pub size: String,
}

impl From<&AppConfig> for ImageSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            enabled: config.image.enabled,
            model: config.image.model.clone(),
            quality: config.image.quality,
            size: config.image.size.clone(),
        }
    }
}

/// Everything a pipeline run needs, resolved once and passed explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: Option<PathBuf>,
    pub max_redrafts: u32,
    pub research: ResearchConfig,
    pub generation: GenerationSettings,
    pub image: ImageSettings,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_dir: Some(expand_home(&config.defaults.output_dir)),
            max_redrafts: config.defaults.max_redrafts,
            research: ResearchConfig::from(config),
            generation: GenerationSettings::from(config),
            image: ImageSettings::from(config),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newsroom/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| NewsroomError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newsroom/newsroom.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsroomError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| NewsroomError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsroomError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsroomError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsroomError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a required secret from the env var named in config.
pub fn read_api_key(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(NewsroomError::config(format!(
            "{service} API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that every key the configured providers need is present.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    read_api_key(&config.model.api_key_env, "Model")?;
    read_api_key(&config.search.tavily_api_key_env, "Tavily")?;
    Ok(())
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
