use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use aerolens_agent::{HttpReasoningClient, LlmError, QueryEngine};
use aerolens_core::config::{AppConfig, ConfigError, LoadOptions};
use aerolens_core::LogTraceSink;
use aerolens_gateway::{GatewayError, HttpToolGateway};

pub struct Application {
    pub config: AppConfig,
    pub engine: Arc<QueryEngine>,
    pub gateway: Arc<HttpToolGateway>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("gateway client initialization failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("reasoning client initialization failed: {0}")]
    Llm(#[from] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        default_domain = config.routing.default_domain.as_str(),
        "starting application bootstrap"
    );

    let gateway = Arc::new(HttpToolGateway::new(&config.gateway)?);
    info!(
        event_name = "system.bootstrap.gateway_client_ready",
        base_url = %config.gateway.base_url,
        "tool gateway client constructed"
    );

    let client = Arc::new(HttpReasoningClient::from_config(&config.llm)?);
    let engine = Arc::new(QueryEngine::from_parts(
        &config,
        gateway.clone(),
        client,
        Arc::new(LogTraceSink),
    ));
    info!(
        event_name = "system.bootstrap.engine_ready",
        model = %config.llm.model,
        "query engine wired"
    );

    Ok(Application { config, engine, gateway })
}

#[cfg(test)]
mod tests {
    use aerolens_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_without_gateway_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                gateway_base_url: Some("http://localhost:8080/mcp".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = match result {
            Ok(_) => String::new(),
            Err(error) => error.to_string(),
        };
        assert!(
            message.contains("gateway.auth"),
            "expected a gateway.auth validation failure, got: {message}"
        );
    }

    #[tokio::test]
    async fn bootstrap_succeeds_with_static_token_credentials() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                gateway_static_token: Some("bearer-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with a static token");

        assert_eq!(app.config.server.port, 8080);
        // engine and gateway are wired and shareable
        let _engine = app.engine.clone();
        let _gateway = app.gateway.clone();
    }
}
