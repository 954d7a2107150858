use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use mall_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let path = detect_config_path();
    let sources = Sources { doc: load_config_file_doc(path.as_deref()), path };
    render(&config, &sources)
}

struct Sources {
    doc: Option<Value>,
    path: Option<PathBuf>,
}

impl Sources {
    fn line(&self, key_path: &str, env_key: &str, value: &str) -> String {
        format!("- {key_path} = {value} (source: {})", self.source(key_path, env_key))
    }

    fn source(&self, key_path: &str, env_key: &str) -> String {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn render(config: &AppConfig, sources: &Sources) -> String {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let stages =
        config.resolver.stages.iter().map(|stage| stage.as_str()).collect::<Vec<_>>().join(",");

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        sources.line("database.url", "MALL_DATABASE_URL", &config.database.url),
        sources.line(
            "database.max_connections",
            "MALL_DATABASE_MAX_CONNECTIONS",
            &config.database.max_connections.to_string(),
        ),
        sources.line(
            "database.timeout_secs",
            "MALL_DATABASE_TIMEOUT_SECS",
            &config.database.timeout_secs.to_string(),
        ),
        sources.line("llm.provider", "MALL_LLM_PROVIDER", config.llm.provider.as_str()),
        sources.line("llm.model", "MALL_LLM_MODEL", &config.llm.model),
        sources.line(
            "llm.base_url",
            "MALL_LLM_BASE_URL",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
        ),
        sources.line("llm.api_key", "MALL_LLM_API_KEY", &api_key),
        sources.line(
            "oracle.timeout_secs",
            "MALL_ORACLE_TIMEOUT_SECS",
            &config.oracle.timeout_secs.to_string(),
        ),
        sources.line(
            "resolver.reference_price",
            "MALL_RESOLVER_REFERENCE_PRICE",
            &config.resolver.reference_price.to_string(),
        ),
        sources.line("resolver.stages", "MALL_RESOLVER_STAGES", &stages),
        sources.line(
            "resolver.decompose_requests",
            "MALL_RESOLVER_DECOMPOSE_REQUESTS",
            &config.resolver.decompose_requests.to_string(),
        ),
        sources.line("logging.level", "MALL_LOGGING_LEVEL", &config.logging.level),
        sources.line(
            "logging.format",
            "MALL_LOGGING_FORMAT",
            &format!("{:?}", config.logging.format),
        ),
    ];

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("mall.toml"), PathBuf::from("config/mall.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
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

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_keep_only_their_prefix() {
        assert_eq!(redact_secret("sk-live-123"), "sk-***");
        assert_eq!(redact_secret("plainsecret"), "<redacted>");
        assert_eq!(redact_secret("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_toml() {
        let doc = "[resolver]\nstages = [\"price_band\"]\n".parse::<toml::Value>().expect("toml");

        assert!(contains_path(&doc, "resolver.stages"));
        assert!(!contains_path(&doc, "resolver.reference_price"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
