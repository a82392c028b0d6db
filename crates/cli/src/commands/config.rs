use std::env;
use std::fs;
use std::path::Path;

use deskpilot_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key_path: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key_path, value: value.into(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let routing = &config.routing;
    let tools = &config.tools;

    vec![
        Field::new("llm.provider", config.llm.provider.as_str(), &["DESKPILOT_LLM_PROVIDER"]),
        Field::new("llm.model", config.llm.model.as_str(), &["DESKPILOT_LLM_MODEL"]),
        Field::new(
            "llm.base_url",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
            &["DESKPILOT_LLM_BASE_URL"],
        ),
        Field::new("llm.api_key", redact_secret(config.llm.api_key.as_ref()), &["DESKPILOT_LLM_API_KEY"]),
        Field::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["DESKPILOT_LLM_TIMEOUT_SECS"],
        ),
        Field::new(
            "routing.classification_timeout_ms",
            routing.classification_timeout_ms.to_string(),
            &["DESKPILOT_ROUTING_CLASSIFICATION_TIMEOUT_MS"],
        ),
        Field::new(
            "routing.remote_classification",
            routing.remote_classification.to_string(),
            &["DESKPILOT_ROUTING_REMOTE_CLASSIFICATION"],
        ),
        Field::new(
            "routing.ticket_keywords",
            render_list(&routing.ticket_keywords),
            &["DESKPILOT_ROUTING_TICKET_KEYWORDS"],
        ),
        Field::new(
            "routing.agent_keywords",
            render_list(&routing.agent_keywords),
            &["DESKPILOT_ROUTING_AGENT_KEYWORDS"],
        ),
        Field::new(
            "routing.knowledge_keywords",
            render_list(&routing.knowledge_keywords),
            &["DESKPILOT_ROUTING_KNOWLEDGE_KEYWORDS"],
        ),
        Field::new(
            "routing.fallback_ticket_keywords",
            render_list(&routing.fallback_ticket_keywords),
            &["DESKPILOT_ROUTING_FALLBACK_TICKET_KEYWORDS"],
        ),
        Field::new(
            "routing.fallback_knowledge_keywords",
            render_list(&routing.fallback_knowledge_keywords),
            &["DESKPILOT_ROUTING_FALLBACK_KNOWLEDGE_KEYWORDS"],
        ),
        Field::new(
            "tools.provider_url",
            tools.provider_url.as_deref().unwrap_or("<unset>"),
            &["DESKPILOT_TOOLS_PROVIDER_URL"],
        ),
        Field::new(
            "tools.provider_token",
            redact_secret(tools.provider_token.as_ref()),
            &["DESKPILOT_TOOLS_PROVIDER_TOKEN"],
        ),
        Field::new(
            "tools.expected_format",
            tools.expected_format.map(|format| format.as_str()).unwrap_or("auto"),
            &["DESKPILOT_TOOLS_EXPECTED_FORMAT"],
        ),
        Field::new("tools.ticket_tool", tools.ticket_tool.as_str(), &["DESKPILOT_TOOLS_TICKET_TOOL"]),
        Field::new("tools.wiki_tool", tools.wiki_tool.as_str(), &["DESKPILOT_TOOLS_WIKI_TOOL"]),
        Field::new(
            "tools.drop_invalid_optional",
            tools.drop_invalid_optional.to_string(),
            &["DESKPILOT_TOOLS_DROP_INVALID_OPTIONAL"],
        ),
        Field::new(
            "logging.level",
            config.logging.level.as_str(),
            &["DESKPILOT_LOGGING_LEVEL", "DESKPILOT_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            config.logging.format.as_str(),
            &["DESKPILOT_LOGGING_FORMAT", "DESKPILOT_LOG_FORMAT"],
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn render_list(items: &[String]) -> String {
    if items.is_empty() {
        return "<empty>".to_string();
    }
    format!("[{}]", items.join(", "))
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };

    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    // Keep vendor prefixes such as `sk-` visible.
    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.len() <= 4 {
            return format!("{prefix}-***");
        }
    }

    "<redacted>".to_string()
}
