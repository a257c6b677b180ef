use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::classification::SpecialistDomain;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    pub routing: RoutingConfig,
    pub worker: WorkerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub auth: GatewayAuthConfig,
}

/// Either a pre-issued static bearer token, or the OAuth2 client-credentials
/// triple the gateway's token endpoint accepts. Exactly one mode must be
/// configured.
#[derive(Clone, Debug, Default)]
pub struct GatewayAuthConfig {
    pub static_token: Option<SecretString>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub scope: Option<String>,
    pub refresh_skew_secs: u64,
}

impl GatewayAuthConfig {
    pub fn has_static_token(&self) -> bool {
        self.static_token
            .as_ref()
            .map(|token| !token.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }

    pub fn has_client_credentials(&self) -> bool {
        self.token_url.as_ref().map(|url| !url.trim().is_empty()).unwrap_or(false)
            && self.client_id.as_ref().map(|id| !id.trim().is_empty()).unwrap_or(false)
            && self
                .client_secret
                .as_ref()
                .map(|secret| !secret.expose_secret().trim().is_empty())
                .unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct RoutingConfig {
    pub default_domain: SpecialistDomain,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Reasoning-loop iteration budget per dispatch. Exhaustion surfaces a
    /// partial answer, never an unbounded loop.
    pub max_tool_calls: u32,
    pub tool_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
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
    pub gateway_base_url: Option<String>,
    pub gateway_static_token: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub default_domain: Option<SpecialistDomain>,
    pub log_level: Option<String>,
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
            gateway: GatewayConfig {
                base_url: "http://localhost:8080/mcp".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                auth: GatewayAuthConfig { refresh_skew_secs: 300, ..GatewayAuthConfig::default() },
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                max_tokens: 2048,
                timeout_secs: 60,
                max_retries: 2,
            },
            routing: RoutingConfig { default_domain: SpecialistDomain::Operations },
            worker: WorkerConfig { max_tool_calls: 8, tool_timeout_secs: 30 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                health_check_port: 8081,
                graceful_shutdown_secs: 15,
            },
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("aerolens.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(gateway) = patch.gateway {
            if let Some(base_url) = gateway.base_url {
                self.gateway.base_url = base_url;
            }
            if let Some(timeout_secs) = gateway.timeout_secs {
                self.gateway.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = gateway.max_retries {
                self.gateway.max_retries = max_retries;
            }
            if let Some(static_token_value) = gateway.static_token {
                self.gateway.auth.static_token = Some(secret_value(static_token_value));
            }
            if let Some(token_url) = gateway.token_url {
                self.gateway.auth.token_url = Some(token_url);
            }
            if let Some(client_id) = gateway.client_id {
                self.gateway.auth.client_id = Some(client_id);
            }
            if let Some(client_secret_value) = gateway.client_secret {
                self.gateway.auth.client_secret = Some(secret_value(client_secret_value));
            }
            if let Some(scope) = gateway.scope {
                self.gateway.auth.scope = Some(scope);
            }
            if let Some(refresh_skew_secs) = gateway.refresh_skew_secs {
                self.gateway.auth.refresh_skew_secs = refresh_skew_secs;
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
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(routing) = patch.routing {
            if let Some(default_domain) = routing.default_domain {
                self.routing.default_domain = default_domain;
            }
        }

        if let Some(worker) = patch.worker {
            if let Some(max_tool_calls) = worker.max_tool_calls {
                self.worker.max_tool_calls = max_tool_calls;
            }
            if let Some(tool_timeout_secs) = worker.tool_timeout_secs {
                self.worker.tool_timeout_secs = tool_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("AEROLENS_GATEWAY_BASE_URL") {
            self.gateway.base_url = value;
        }
        if let Some(value) = read_env("AEROLENS_GATEWAY_TIMEOUT_SECS") {
            self.gateway.timeout_secs = parse_u64("AEROLENS_GATEWAY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AEROLENS_GATEWAY_MAX_RETRIES") {
            self.gateway.max_retries = parse_u32("AEROLENS_GATEWAY_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("AEROLENS_GATEWAY_STATIC_TOKEN") {
            self.gateway.auth.static_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("AEROLENS_GATEWAY_TOKEN_URL") {
            self.gateway.auth.token_url = Some(value);
        }
        if let Some(value) = read_env("AEROLENS_GATEWAY_CLIENT_ID") {
            self.gateway.auth.client_id = Some(value);
        }
        if let Some(value) = read_env("AEROLENS_GATEWAY_CLIENT_SECRET") {
            self.gateway.auth.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("AEROLENS_GATEWAY_SCOPE") {
            self.gateway.auth.scope = Some(value);
        }
        if let Some(value) = read_env("AEROLENS_GATEWAY_REFRESH_SKEW_SECS") {
            self.gateway.auth.refresh_skew_secs =
                parse_u64("AEROLENS_GATEWAY_REFRESH_SKEW_SECS", &value)?;
        }

        if let Some(value) = read_env("AEROLENS_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("AEROLENS_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AEROLENS_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("AEROLENS_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("AEROLENS_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("AEROLENS_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("AEROLENS_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("AEROLENS_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AEROLENS_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("AEROLENS_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("AEROLENS_ROUTING_DEFAULT_DOMAIN") {
            self.routing.default_domain =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "AEROLENS_ROUTING_DEFAULT_DOMAIN".to_string(),
                    value,
                })?;
        }

        if let Some(value) = read_env("AEROLENS_WORKER_MAX_TOOL_CALLS") {
            self.worker.max_tool_calls = parse_u32("AEROLENS_WORKER_MAX_TOOL_CALLS", &value)?;
        }
        if let Some(value) = read_env("AEROLENS_WORKER_TOOL_TIMEOUT_SECS") {
            self.worker.tool_timeout_secs =
                parse_u64("AEROLENS_WORKER_TOOL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("AEROLENS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("AEROLENS_SERVER_PORT") {
            self.server.port = parse_u16("AEROLENS_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("AEROLENS_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("AEROLENS_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("AEROLENS_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("AEROLENS_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("AEROLENS_LOGGING_LEVEL").or_else(|| read_env("AEROLENS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AEROLENS_LOGGING_FORMAT").or_else(|| read_env("AEROLENS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(gateway_base_url) = overrides.gateway_base_url {
            self.gateway.base_url = gateway_base_url;
        }
        if let Some(gateway_static_token) = overrides.gateway_static_token {
            self.gateway.auth.static_token = Some(secret_value(gateway_static_token));
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
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(default_domain) = overrides.default_domain {
            self.routing.default_domain = default_domain;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gateway(&self.gateway)?;
        validate_llm(&self.llm)?;
        validate_worker(&self.worker)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("aerolens.toml"), PathBuf::from("config/aerolens.toml")]
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

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    let base_url = gateway.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "gateway.base_url must start with http:// or https://".to_string(),
        ));
    }

    if gateway.timeout_secs == 0 || gateway.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "gateway.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !gateway.auth.has_static_token() && !gateway.auth.has_client_credentials() {
        return Err(ConfigError::Validation(
            "gateway.auth requires either static_token or the token_url/client_id/client_secret \
             triple for client-credentials refresh"
                .to_string(),
        ));
    }

    if let Some(token_url) = &gateway.auth.token_url {
        if !token_url.starts_with("http://") && !token_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "gateway.auth.token_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
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

fn validate_worker(worker: &WorkerConfig) -> Result<(), ConfigError> {
    if worker.max_tool_calls == 0 || worker.max_tool_calls > 64 {
        return Err(ConfigError::Validation(
            "worker.max_tool_calls must be in range 1..=64".to_string(),
        ));
    }

    if worker.tool_timeout_secs == 0 || worker.tool_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "worker.tool_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.health_check_port must differ from server.port".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    gateway: Option<GatewayPatch>,
    llm: Option<LlmPatch>,
    routing: Option<RoutingPatch>,
    worker: Option<WorkerPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    static_token: Option<String>,
    token_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
    refresh_skew_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingPatch {
    default_domain: Option<SpecialistDomain>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkerPatch {
    max_tool_calls: Option<u32>,
    tool_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
