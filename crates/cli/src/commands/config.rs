use aerolens_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let auth_mode = if config.gateway.auth.has_static_token() {
        "static_token"
    } else {
        "client_credentials"
    };

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];

    lines.push(format!("  gateway.base_url = {}", config.gateway.base_url));
    lines.push(format!("  gateway.timeout_secs = {}", config.gateway.timeout_secs));
    lines.push(format!("  gateway.max_retries = {}", config.gateway.max_retries));
    lines.push(format!("  gateway.auth.mode = {auth_mode}"));
    if let Some(token) = &config.gateway.auth.static_token {
        lines.push(format!(
            "  gateway.auth.static_token = {}",
            redact_secret(token.expose_secret())
        ));
    }
    if let Some(token_url) = &config.gateway.auth.token_url {
        lines.push(format!("  gateway.auth.token_url = {token_url}"));
    }
    if let Some(client_id) = &config.gateway.auth.client_id {
        lines.push(format!("  gateway.auth.client_id = {client_id}"));
    }
    if let Some(secret) = &config.gateway.auth.client_secret {
        lines.push(format!(
            "  gateway.auth.client_secret = {}",
            redact_secret(secret.expose_secret())
        ));
    }

    lines.push(format!("  llm.provider = {:?}", config.llm.provider));
    lines.push(format!("  llm.model = {}", config.llm.model));
    if let Some(base_url) = &config.llm.base_url {
        lines.push(format!("  llm.base_url = {base_url}"));
    }
    if let Some(api_key) = &config.llm.api_key {
        lines.push(format!("  llm.api_key = {}", redact_secret(api_key.expose_secret())));
    }
    lines.push(format!("  llm.max_tokens = {}", config.llm.max_tokens));
    lines.push(format!("  llm.timeout_secs = {}", config.llm.timeout_secs));

    lines.push(format!("  routing.default_domain = {}", config.routing.default_domain));
    lines.push(format!("  worker.max_tool_calls = {}", config.worker.max_tool_calls));
    lines.push(format!("  worker.tool_timeout_secs = {}", config.worker.tool_timeout_secs));

    lines.push(format!("  server.bind_address = {}", config.server.bind_address));
    lines.push(format!("  server.port = {}", config.server.port));
    lines.push(format!("  server.health_check_port = {}", config.server.health_check_port));

    lines.push(format!("  logging.level = {}", config.logging.level));
    lines.push(format!("  logging.format = {:?}", config.logging.format));

    lines.join("\n")
}

fn redact_secret(value: &str) -> String {
    if value.chars().count() <= 4 {
        return "****".to_string();
    }
    let prefix: String = value.chars().take(4).collect();
    format!("{prefix}****")
}

#[cfg(test)]
mod tests {
    use super::redact_secret;

    #[test]
    fn short_secrets_are_fully_masked() {
        assert_eq!(redact_secret("abc"), "****");
        assert_eq!(redact_secret(""), "****");
    }

    #[test]
    fn long_secrets_keep_only_a_short_prefix() {
        assert_eq!(redact_secret("bearer-secret-value"), "bear****");
        assert!(!redact_secret("bearer-secret-value").contains("secret"));
    }
}
