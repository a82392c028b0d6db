use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tooling::ResponseFormat;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["deskpilot.toml", "config/deskpilot.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub routing: RoutingConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

/// Keyword layers and deadline for intent routing.
///
/// `*_keywords` are the strict first-pass lists; `fallback_*_keywords` are
/// the looser lists consulted only after the remote classifier gave no usable
/// answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingConfig {
    pub classification_timeout_ms: u64,
    pub remote_classification: bool,
    pub ticket_keywords: Vec<String>,
    pub agent_keywords: Vec<String>,
    pub knowledge_keywords: Vec<String>,
    pub fallback_ticket_keywords: Vec<String>,
    pub fallback_knowledge_keywords: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ToolsConfig {
    pub provider_url: Option<String>,
    pub provider_token: Option<SecretString>,
    /// `None` means auto-detect the response shape.
    pub expected_format: Option<ResponseFormat>,
    pub ticket_tool: String,
    pub wiki_tool: String,
    pub drop_invalid_optional: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub classification_timeout_ms: Option<u64>,
    pub remote_classification: Option<bool>,
    pub expected_format: Option<ResponseFormat>,
    pub tools_provider_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            classification_timeout_ms: 1_500,
            remote_classification: true,
            ticket_keywords: words(&[
                "ticket",
                "issue",
                "bug",
                "jira",
                "create a task",
                "report a problem",
            ]),
            agent_keywords: words(&["ask the agent", "agent platform", "handoff"]),
            knowledge_keywords: words(&[
                "wiki",
                "documentation",
                "docs",
                "confluence",
                "knowledge base",
            ]),
            fallback_ticket_keywords: words(&["broken", "error", "fail", "crash", "not working"]),
            fallback_knowledge_keywords: words(&[
                "how", "what", "why", "where", "when", "explain", "guide",
            ]),
        }
    }
}

impl RoutingConfig {
    pub fn classification_timeout(&self) -> Duration {
        Duration::from_millis(self.classification_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
            },
            routing: RoutingConfig::default(),
            tools: ToolsConfig {
                provider_url: None,
                provider_token: None,
                expected_format: None,
                ticket_tool: "create_issue".to_string(),
                wiki_tool: "search_pages".to_string(),
                drop_invalid_optional: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

/// Reads `tools.expected_format`; `auto` (or empty) disables the hint.
pub fn parse_expected_format(value: &str) -> Result<Option<ResponseFormat>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    trimmed.parse::<ResponseFormat>().map(Some).map_err(ConfigError::Validation)
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options
                .config_path
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(routing) = patch.routing {
            if let Some(timeout_ms) = routing.classification_timeout_ms {
                self.routing.classification_timeout_ms = timeout_ms;
            }
            if let Some(enabled) = routing.remote_classification {
                self.routing.remote_classification = enabled;
            }
            if let Some(keywords) = routing.ticket_keywords {
                self.routing.ticket_keywords = keywords;
            }
            if let Some(keywords) = routing.agent_keywords {
                self.routing.agent_keywords = keywords;
            }
            if let Some(keywords) = routing.knowledge_keywords {
                self.routing.knowledge_keywords = keywords;
            }
            if let Some(keywords) = routing.fallback_ticket_keywords {
                self.routing.fallback_ticket_keywords = keywords;
            }
            if let Some(keywords) = routing.fallback_knowledge_keywords {
                self.routing.fallback_knowledge_keywords = keywords;
            }
        }

        if let Some(tools) = patch.tools {
            if let Some(provider_url) = tools.provider_url {
                self.tools.provider_url = Some(provider_url);
            }
            if let Some(tools_token_value) = tools.provider_token {
                self.tools.provider_token = Some(secret_value(tools_token_value));
            }
            if let Some(format) = tools.expected_format {
                self.tools.expected_format = parse_expected_format(&format)?;
            }
            if let Some(ticket_tool) = tools.ticket_tool {
                self.tools.ticket_tool = ticket_tool;
            }
            if let Some(wiki_tool) = tools.wiki_tool {
                self.tools.wiki_tool = wiki_tool;
            }
            if let Some(drop_invalid_optional) = tools.drop_invalid_optional {
                self.tools.drop_invalid_optional = drop_invalid_optional;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DESKPILOT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("DESKPILOT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DESKPILOT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("DESKPILOT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("DESKPILOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("DESKPILOT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DESKPILOT_ROUTING_CLASSIFICATION_TIMEOUT_MS") {
            self.routing.classification_timeout_ms =
                parse_u64("DESKPILOT_ROUTING_CLASSIFICATION_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("DESKPILOT_ROUTING_REMOTE_CLASSIFICATION") {
            self.routing.remote_classification =
                parse_bool("DESKPILOT_ROUTING_REMOTE_CLASSIFICATION", &value)?;
        }
        if let Some(value) = read_env("DESKPILOT_ROUTING_TICKET_KEYWORDS") {
            self.routing.ticket_keywords = parse_list(&value);
        }
        if let Some(value) = read_env("DESKPILOT_ROUTING_AGENT_KEYWORDS") {
            self.routing.agent_keywords = parse_list(&value);
        }
        if let Some(value) = read_env("DESKPILOT_ROUTING_KNOWLEDGE_KEYWORDS") {
            self.routing.knowledge_keywords = parse_list(&value);
        }
        if let Some(value) = read_env("DESKPILOT_ROUTING_FALLBACK_TICKET_KEYWORDS") {
            self.routing.fallback_ticket_keywords = parse_list(&value);
        }
        if let Some(value) = read_env("DESKPILOT_ROUTING_FALLBACK_KNOWLEDGE_KEYWORDS") {
            self.routing.fallback_knowledge_keywords = parse_list(&value);
        }

        if let Some(value) = read_env("DESKPILOT_TOOLS_PROVIDER_URL") {
            self.tools.provider_url = Some(value);
        }
        if let Some(value) = read_env("DESKPILOT_TOOLS_PROVIDER_TOKEN") {
            self.tools.provider_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("DESKPILOT_TOOLS_EXPECTED_FORMAT") {
            self.tools.expected_format = parse_expected_format(&value).map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "DESKPILOT_TOOLS_EXPECTED_FORMAT".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = read_env("DESKPILOT_TOOLS_TICKET_TOOL") {
            self.tools.ticket_tool = value;
        }
        if let Some(value) = read_env("DESKPILOT_TOOLS_WIKI_TOOL") {
            self.tools.wiki_tool = value;
        }
        if let Some(value) = read_env("DESKPILOT_TOOLS_DROP_INVALID_OPTIONAL") {
            self.tools.drop_invalid_optional =
                parse_bool("DESKPILOT_TOOLS_DROP_INVALID_OPTIONAL", &value)?;
        }

        let log_level =
            read_env("DESKPILOT_LOGGING_LEVEL").or_else(|| read_env("DESKPILOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DESKPILOT_LOGGING_FORMAT").or_else(|| read_env("DESKPILOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(timeout_ms) = overrides.classification_timeout_ms {
            self.routing.classification_timeout_ms = timeout_ms;
        }
        if let Some(enabled) = overrides.remote_classification {
            self.routing.remote_classification = enabled;
        }
        if let Some(format) = overrides.expected_format {
            self.tools.expected_format = Some(format);
        }
        if let Some(provider_url) = overrides.tools_provider_url {
            self.tools.provider_url = Some(provider_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm, self.routing.remote_classification)?;
        validate_routing(&self.routing)?;
        validate_tools(&self.tools)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig, remote_classification: bool) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !remote_classification {
        return Ok(());
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers when routing.remote_classification is enabled".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_routing(routing: &RoutingConfig) -> Result<(), ConfigError> {
    if routing.classification_timeout_ms == 0 || routing.classification_timeout_ms > 30_000 {
        return Err(ConfigError::Validation(
            "routing.classification_timeout_ms must be in range 1..=30000".to_string(),
        ));
    }

    let lists = [
        ("routing.ticket_keywords", &routing.ticket_keywords),
        ("routing.agent_keywords", &routing.agent_keywords),
        ("routing.knowledge_keywords", &routing.knowledge_keywords),
        ("routing.fallback_ticket_keywords", &routing.fallback_ticket_keywords),
        ("routing.fallback_knowledge_keywords", &routing.fallback_knowledge_keywords),
    ];
    for (key, keywords) in lists {
        if keywords.iter().any(|keyword| !keyword.chars().any(char::is_alphanumeric)) {
            return Err(ConfigError::Validation(format!(
                "{key} entries must contain at least one letter or digit"
            )));
        }
    }

    Ok(())
}

fn validate_tools(tools: &ToolsConfig) -> Result<(), ConfigError> {
    if let Some(provider_url) = &tools.provider_url {
        if !provider_url.starts_with("http://") && !provider_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "tools.provider_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if tools.ticket_tool.trim().is_empty() {
        return Err(ConfigError::Validation("tools.ticket_tool must not be empty".to_string()));
    }
    if tools.wiki_tool.trim().is_empty() {
        return Err(ConfigError::Validation("tools.wiki_tool must not be empty".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    routing: Option<RoutingPatch>,
    tools: Option<ToolsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingPatch {
    classification_timeout_ms: Option<u64>,
    remote_classification: Option<bool>,
    ticket_keywords: Option<Vec<String>>,
    agent_keywords: Option<Vec<String>>,
    knowledge_keywords: Option<Vec<String>>,
    fallback_ticket_keywords: Option<Vec<String>>,
    fallback_knowledge_keywords: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolsPatch {
    provider_url: Option<String>,
    provider_token: Option<String>,
    expected_format: Option<String>,
    ticket_tool: Option<String>,
    wiki_tool: Option<String>,
    drop_invalid_optional: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::tooling::ResponseFormat;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_and_carry_keyword_layers() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(
            config.routing.classification_timeout() == Duration::from_millis(1_500),
            "default classification timeout should be 1.5s",
        )?;
        ensure(
            config.routing.ticket_keywords.iter().any(|keyword| keyword == "ticket"),
            "ticket keyword list should contain `ticket`",
        )?;
        ensure(
            config.routing.fallback_knowledge_keywords.iter().any(|keyword| keyword == "how"),
            "fallback knowledge list should contain `how`",
        )?;
        ensure(config.tools.expected_format.is_none(), "format hint should default to auto")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_DESKPILOT_TOOLS_TOKEN", "tok-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("deskpilot.toml");
            fs::write(
                &path,
                r#"
[tools]
provider_url = "https://tools.internal.example"
provider_token = "${TEST_DESKPILOT_TOOLS_TOKEN}"
expected_format = "status_object"

[routing]
ticket_keywords = ["ticket", "incident"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .tools
                    .provider_token
                    .as_ref()
                    .is_some_and(|token| token.expose_secret() == "tok-from-env"),
                "provider token should be interpolated from environment",
            )?;
            ensure(
                config.tools.expected_format == Some(ResponseFormat::StatusObject),
                "expected format should be read from file",
            )?;
            ensure(
                config.routing.ticket_keywords == vec!["ticket".to_string(), "incident".to_string()],
                "keyword list should be replaced by the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_DESKPILOT_TOOLS_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DESKPILOT_LOG_LEVEL", "warn");
        env::set_var("DESKPILOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["DESKPILOT_LOG_LEVEL", "DESKPILOT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DESKPILOT_ROUTING_CLASSIFICATION_TIMEOUT_MS", "900");
        env::set_var("DESKPILOT_TOOLS_TICKET_TOOL", "jira_create_issue");
        env::set_var("DESKPILOT_ROUTING_AGENT_KEYWORDS", "escalate, talk to a human ,");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("deskpilot.toml");
            fs::write(
                &path,
                r#"
[routing]
classification_timeout_ms = 700

[tools]
ticket_tool = "file_ticket"
wiki_tool = "confluence_search"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    classification_timeout_ms: Some(250),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.routing.classification_timeout_ms == 250,
                "override timeout should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.tools.ticket_tool == "jira_create_issue",
                "env ticket tool should win over file and defaults",
            )?;
            ensure(config.tools.wiki_tool == "confluence_search", "file wiki tool should win")?;
            ensure(
                config.routing.agent_keywords
                    == vec!["escalate".to_string(), "talk to a human".to_string()],
                "env keyword lists are comma separated and trimmed",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "DESKPILOT_ROUTING_CLASSIFICATION_TIMEOUT_MS",
            "DESKPILOT_TOOLS_TICKET_TOOL",
            "DESKPILOT_ROUTING_AGENT_KEYWORDS",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DESKPILOT_LLM_PROVIDER", "openai");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")?;

            let offline = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    remote_classification: Some(false),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            });
            ensure(offline.is_ok(), "api key is not needed when remote classification is off")
        })();

        clear_vars(&["DESKPILOT_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn invalid_overrides_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DESKPILOT_TOOLS_EXPECTED_FORMAT", "xml");
        let bad_format = AppConfig::load(LoadOptions::default());
        clear_vars(&["DESKPILOT_TOOLS_EXPECTED_FORMAT"]);
        ensure(
            matches!(bad_format, Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "DESKPILOT_TOOLS_EXPECTED_FORMAT"),
            "unknown format token should be an invalid env override",
        )?;

        let zero_timeout = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                classification_timeout_ms: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(
            matches!(zero_timeout, Err(ConfigError::Validation(ref message)) if message.contains("classification_timeout_ms")),
            "zero classification timeout should fail validation",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DESKPILOT_LLM_API_KEY", "sk-secret-value");
        env::set_var("DESKPILOT_TOOLS_PROVIDER_TOKEN", "tok-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                !debug.contains("tok-secret-value"),
                "debug output should not contain provider token",
            )?;
            Ok(())
        })();

        clear_vars(&["DESKPILOT_LLM_API_KEY", "DESKPILOT_TOOLS_PROVIDER_TOKEN"]);
        result
    }
}
