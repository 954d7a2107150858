use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub oracle: OracleConfig,
    pub resolver: ResolverConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct OracleConfig {
    /// Deadline for each translation and each execution.
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolverConfig {
    pub reference_price: f64,
    pub band_lower: f64,
    pub band_upper: f64,
    pub stages: Vec<FallbackStage>,
    pub decompose_requests: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
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

/// Inventory fallback stage, tried in configured order until one yields rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStage {
    ExactFilter,
    DecomposedFilter,
    SnapshotSimilarity,
    PriceBand,
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

impl FallbackStage {
    pub const DEFAULT_ORDER: [FallbackStage; 4] =
        [Self::ExactFilter, Self::DecomposedFilter, Self::SnapshotSimilarity, Self::PriceBand];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactFilter => "exact_filter",
            Self::DecomposedFilter => "decomposed_filter",
            Self::SnapshotSimilarity => "snapshot_similarity",
            Self::PriceBand => "price_band",
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            reference_price: 250.0,
            band_lower: 0.8,
            band_upper: 1.2,
            stages: FallbackStage::DEFAULT_ORDER.to_vec(),
            decompose_requests: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub oracle_timeout_secs: Option<u64>,
    pub resolver_stages: Option<Vec<FallbackStage>>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://mall.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            oracle: OracleConfig { timeout_secs: 60 },
            resolver: ResolverConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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

impl std::str::FromStr for FallbackStage {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::DEFAULT_ORDER.into_iter().find(|stage| stage.as_str() == normalized).ok_or_else(
            || {
                ConfigError::Validation(format!(
                    "unsupported fallback stage `{value}` (expected exact_filter|decomposed_filter|snapshot_similarity|price_band)"
                ))
            },
        )
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mall.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

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
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(oracle) = patch.oracle {
            if let Some(timeout_secs) = oracle.timeout_secs {
                self.oracle.timeout_secs = timeout_secs;
            }
        }

        if let Some(resolver) = patch.resolver {
            if let Some(reference_price) = resolver.reference_price {
                self.resolver.reference_price = reference_price;
            }
            if let Some(band_lower) = resolver.band_lower {
                self.resolver.band_lower = band_lower;
            }
            if let Some(band_upper) = resolver.band_upper {
                self.resolver.band_upper = band_upper;
            }
            if let Some(stages) = resolver.stages {
                self.resolver.stages = stages;
            }
            if let Some(decompose_requests) = resolver.decompose_requests {
                self.resolver.decompose_requests = decompose_requests;
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
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MALL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MALL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("MALL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MALL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("MALL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MALL_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("MALL_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MALL_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("MALL_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("MALL_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("MALL_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MALL_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("MALL_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("MALL_ORACLE_TIMEOUT_SECS") {
            self.oracle.timeout_secs = parse_u64("MALL_ORACLE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MALL_RESOLVER_REFERENCE_PRICE") {
            self.resolver.reference_price = parse_f64("MALL_RESOLVER_REFERENCE_PRICE", &value)?;
        }
        if let Some(value) = read_env("MALL_RESOLVER_STAGES") {
            self.resolver.stages = value
                .split(',')
                .filter(|stage| !stage.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(value) = read_env("MALL_RESOLVER_DECOMPOSE_REQUESTS") {
            self.resolver.decompose_requests =
                parse_bool("MALL_RESOLVER_DECOMPOSE_REQUESTS", &value)?;
        }

        let log_level = read_env("MALL_LOGGING_LEVEL").or_else(|| read_env("MALL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("MALL_LOGGING_FORMAT").or_else(|| read_env("MALL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(timeout_secs) = overrides.oracle_timeout_secs {
            self.oracle.timeout_secs = timeout_secs;
        }
        if let Some(stages) = overrides.resolver_stages {
            self.resolver.stages = stages;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_oracle(&self.oracle)?;
        validate_resolver(&self.resolver)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("mall.toml"), PathBuf::from("config/mall.toml")]
        .into_iter()
        .find(|path| path.exists())
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
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
                    "llm.api_key is required for openai/anthropic providers".to_string(),
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

fn validate_oracle(oracle: &OracleConfig) -> Result<(), ConfigError> {
    if oracle.timeout_secs == 0 || oracle.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "oracle.timeout_secs must be in range 1..=600".to_string(),
        ));
    }
    Ok(())
}

fn validate_resolver(resolver: &ResolverConfig) -> Result<(), ConfigError> {
    if !resolver.reference_price.is_finite() || resolver.reference_price <= 0.0 {
        return Err(ConfigError::Validation(
            "resolver.reference_price must be a positive number".to_string(),
        ));
    }

    let band_valid = resolver.band_lower.is_finite()
        && resolver.band_upper.is_finite()
        && resolver.band_lower > 0.0
        && resolver.band_lower <= resolver.band_upper;
    if !band_valid {
        return Err(ConfigError::Validation(
            "resolver.band_lower and resolver.band_upper must satisfy 0 < lower <= upper"
                .to_string(),
        ));
    }

    if resolver.stages.is_empty() {
        return Err(ConfigError::Validation(
            "resolver.stages must list at least one fallback stage".to_string(),
        ));
    }

    for (index, stage) in resolver.stages.iter().enumerate() {
        if resolver.stages[..index].contains(stage) {
            return Err(ConfigError::Validation(format!(
                "resolver.stages lists `{}` more than once",
                stage.as_str()
            )));
        }
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

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    oracle: Option<OraclePatch>,
    resolver: Option<ResolverPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct OraclePatch {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolverPatch {
    reference_price: Option<f64>,
    band_lower: Option<f64>,
    band_upper: Option<f64>,
    stages: Option<Vec<FallbackStage>>,
    decompose_requests: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
