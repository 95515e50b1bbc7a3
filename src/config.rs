use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::completion::{
    CompletionConfig, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
};
use crate::service::ServiceSettings;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_SUPPORT_EMAIL: &str = "support@resentmentrelease.com";
const DEFAULT_CONVERSATION_LIST_LIMIT: usize = 50;
const DEFAULT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementProviderKind {
    /// Premium iff tier is premium and the subscription is active or trialing
    #[default]
    Subscription,
    /// Every user is premium
    Disabled,
}

impl std::fmt::Display for EntitlementProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntitlementProviderKind::Subscription => write!(f, "subscription"),
            EntitlementProviderKind::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProviderKind {
    #[default]
    Anthropic,
    /// Canned replies, for local runs
    Mock,
    /// Always fails; every chat gets the fallback reply
    Unavailable,
}

impl std::fmt::Display for CompletionProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionProviderKind::Anthropic => write!(f, "anthropic"),
            CompletionProviderKind::Mock => write!(f, "mock"),
            CompletionProviderKind::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub entitlement_provider: EntitlementProviderKind,
    pub completion_provider: CompletionProviderKind,
    pub completion_base_url: String,
    pub completion_model: String,
    pub completion_max_tokens: u32,
    pub completion_timeout: Duration,
    pub api_key: Option<String>,
    pub support_email: String,
    pub conversation_list_limit: usize,
    pub preview_chars: usize,
    pub extra_crisis_phrases: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            entitlement_provider: EntitlementProviderKind::default(),
            completion_provider: CompletionProviderKind::default(),
            completion_base_url: DEFAULT_BASE_URL.to_string(),
            completion_model: DEFAULT_MODEL.to_string(),
            completion_max_tokens: DEFAULT_MAX_TOKENS,
            completion_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_key: None,
            support_email: DEFAULT_SUPPORT_EMAIL.to_string(),
            conversation_list_limit: DEFAULT_CONVERSATION_LIST_LIMIT,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            extra_crisis_phrases: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Resolves each setting from the command line (or its env var), then the
    /// config file, then the default.
    pub fn from_args(args: ConfigArgs) -> Result<Self> {
        let ConfigArgs {
            config,
            data_dir: cli_data_dir,
            entitlement_provider: cli_entitlement_provider,
            completion_provider: cli_completion_provider,
            completion_base_url: cli_completion_base_url,
            completion_model: cli_completion_model,
            completion_max_tokens: cli_completion_max_tokens,
            completion_timeout_secs: cli_completion_timeout_secs,
            api_key: cli_api_key,
            support_email: cli_support_email,
            conversation_list_limit: cli_conversation_list_limit,
            preview_chars: cli_preview_chars,
            extra_crisis_phrases: cli_extra_crisis_phrases,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            data_dir: file_data_dir,
            entitlement_provider: file_entitlement_provider,
            completion_provider: file_completion_provider,
            completion_base_url: file_completion_base_url,
            completion_model: file_completion_model,
            completion_max_tokens: file_completion_max_tokens,
            completion_timeout_secs: file_completion_timeout_secs,
            support_email: file_support_email,
            conversation_list_limit: file_conversation_list_limit,
            preview_chars: file_preview_chars,
            extra_crisis_phrases: file_extra_crisis_phrases,
        } = file_config;

        let defaults = EngineConfig::default();

        let extra_crisis_phrases = cli_extra_crisis_phrases
            .or(file_extra_crisis_phrases)
            .unwrap_or_default()
            .into_iter()
            .map(|phrase| phrase.trim().to_string())
            .filter(|phrase| !phrase.is_empty())
            .collect();

        let config = Self {
            data_dir: cli_data_dir.or(file_data_dir).unwrap_or(defaults.data_dir),
            entitlement_provider: cli_entitlement_provider
                .or(file_entitlement_provider)
                .unwrap_or(defaults.entitlement_provider),
            completion_provider: cli_completion_provider
                .or(file_completion_provider)
                .unwrap_or(defaults.completion_provider),
            completion_base_url: cli_completion_base_url
                .or(file_completion_base_url)
                .unwrap_or(defaults.completion_base_url)
                .trim_end_matches('/')
                .to_string(),
            completion_model: cli_completion_model
                .or(file_completion_model)
                .unwrap_or(defaults.completion_model),
            completion_max_tokens: cli_completion_max_tokens
                .or(file_completion_max_tokens)
                .unwrap_or(defaults.completion_max_tokens),
            completion_timeout: cli_completion_timeout_secs
                .or(file_completion_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.completion_timeout),
            // Secrets only come from the command line or the environment.
            api_key: cli_api_key.filter(|key| !key.trim().is_empty()),
            support_email: cli_support_email
                .or(file_support_email)
                .unwrap_or(defaults.support_email),
            conversation_list_limit: cli_conversation_list_limit
                .or(file_conversation_list_limit)
                .unwrap_or(defaults.conversation_list_limit),
            preview_chars: cli_preview_chars
                .or(file_preview_chars)
                .unwrap_or(defaults.preview_chars),
            extra_crisis_phrases,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.conversation_list_limit > 0,
            "conversation_list_limit must be positive"
        );
        anyhow::ensure!(self.preview_chars > 0, "preview_chars must be positive");
        anyhow::ensure!(
            self.completion_max_tokens > 0,
            "completion_max_tokens must be positive"
        );
        anyhow::ensure!(
            !self.completion_timeout.is_zero(),
            "completion_timeout_secs must be positive"
        );
        anyhow::ensure!(
            !self.support_email.trim().is_empty(),
            "support_email must not be empty"
        );
        if self.completion_provider == CompletionProviderKind::Anthropic {
            anyhow::ensure!(
                self.api_key.is_some(),
                "completion provider {} requires ANTHROPIC_API_KEY",
                self.completion_provider
            );
        }
        Ok(())
    }

    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            provider: self.completion_provider.to_string(),
            base_url: self.completion_base_url.clone(),
            model: self.completion_model.clone(),
            max_tokens: self.completion_max_tokens,
            timeout: self.completion_timeout,
            api_key: self.api_key.clone(),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            support_email: self.support_email.clone(),
            conversation_list_limit: self.conversation_list_limit,
            preview_chars: self.preview_chars,
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_DATA_DIR",
        value_name = "DIR",
        help = "Directory holding one JSON document per user",
        global = true
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_ENTITLEMENT_PROVIDER",
        value_enum,
        value_name = "PROVIDER",
        help = "Billing provider deciding premium access",
        global = true
    )]
    pub entitlement_provider: Option<EntitlementProviderKind>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_COMPLETION_PROVIDER",
        value_enum,
        value_name = "PROVIDER",
        help = "Completion provider backing the coach",
        global = true
    )]
    pub completion_provider: Option<CompletionProviderKind>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_COMPLETION_BASE_URL",
        value_name = "URL",
        global = true
    )]
    pub completion_base_url: Option<String>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_COMPLETION_MODEL",
        value_name = "MODEL",
        global = true
    )]
    pub completion_model: Option<String>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_COMPLETION_MAX_TOKENS",
        value_name = "N",
        value_parser = clap::value_parser!(u32),
        global = true
    )]
    pub completion_max_tokens: Option<u32>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_COMPLETION_TIMEOUT_SECS",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64),
        global = true
    )]
    pub completion_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "ANTHROPIC_API_KEY",
        hide_env_values = true,
        value_name = "KEY",
        global = true
    )]
    pub api_key: Option<String>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_SUPPORT_EMAIL",
        value_name = "EMAIL",
        help = "Contact shown when the coach is unavailable",
        global = true
    )]
    pub support_email: Option<String>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_CONVERSATION_LIST_LIMIT",
        value_name = "N",
        value_parser = clap::value_parser!(usize),
        global = true
    )]
    pub conversation_list_limit: Option<usize>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_PREVIEW_CHARS",
        value_name = "N",
        value_parser = clap::value_parser!(usize),
        global = true
    )]
    pub preview_chars: Option<usize>,

    #[arg(
        long,
        env = "JOURNEY_ENGINE_EXTRA_CRISIS_PHRASES",
        value_name = "PHRASE",
        value_delimiter = ',',
        help = "Comma-separated phrases added to the crisis screen",
        global = true
    )]
    pub extra_crisis_phrases: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    data_dir: Option<PathBuf>,
    entitlement_provider: Option<EntitlementProviderKind>,
    completion_provider: Option<CompletionProviderKind>,
    completion_base_url: Option<String>,
    completion_model: Option<String>,
    completion_max_tokens: Option<u32>,
    completion_timeout_secs: Option<u64>,
    support_email: Option<String>,
    conversation_list_limit: Option<usize>,
    preview_chars: Option<usize>,
    extra_crisis_phrases: Option<Vec<String>>,
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
