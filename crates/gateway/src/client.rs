use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use aerolens_core::config::GatewayConfig;
use aerolens_core::SpecialistDomain;

use crate::auth::TokenManager;
use crate::catalog::ToolCatalog;
use crate::GatewayError;

/// Client-side view of the Domain Tool Gateway. Implementations must be safe
/// for concurrent use across independent queries.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    fn catalog(&self, domain: SpecialistDomain) -> &ToolCatalog;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, GatewayError>;

    /// Cheap reachability probe for health checks; must not issue a tool call.
    async fn healthcheck(&self) -> Result<(), GatewayError>;
}

/// JSON-RPC `tools/call` client over HTTP with bearer auth.
pub struct HttpToolGateway {
    http: reqwest::Client,
    base_url: String,
    auth: TokenManager,
    catalogs: BTreeMap<SpecialistDomain, ToolCatalog>,
    max_retries: u32,
}

impl HttpToolGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        let catalogs = SpecialistDomain::ALL
            .into_iter()
            .map(|domain| (domain, ToolCatalog::for_domain(domain)))
            .collect();

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: TokenManager::from_config(config)?,
            catalogs,
            max_retries: config.max_retries,
        })
    }

    async fn post_call(&self, body: &Value) -> Result<Value, GatewayError> {
        let token = self.auth.bearer_token().await?;

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(format!("gateway rejected credentials: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http { status: status.as_u16(), body });
        }

        response.json().await.map_err(|error| GatewayError::Protocol(error.to_string()))
    }
}

#[async_trait]
impl ToolGateway for HttpToolGateway {
    fn catalog(&self, domain: SpecialistDomain) -> &ToolCatalog {
        &self.catalogs[&domain]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, GatewayError> {
        let request_id = Uuid::new_v4().to_string();
        let body = build_call_request(&request_id, name, &arguments);

        let mut attempt = 0;
        loop {
            debug!(
                event_name = "gateway.tool_call",
                tool = name,
                request_id = %request_id,
                attempt,
                "invoking gateway tool"
            );

            match self.post_call(&body).await {
                Ok(payload) => return parse_call_response(name, payload),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    warn!(
                        event_name = "gateway.tool_call_retry",
                        tool = name,
                        request_id = %request_id,
                        attempt,
                        error = %error,
                        "retrying gateway call after transport failure"
                    );
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn healthcheck(&self) -> Result<(), GatewayError> {
        self.auth.probe().await
    }
}

fn build_call_request(request_id: &str, name: &str, arguments: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request_id,
        "method": "tools/call",
        "params": {
            "name": name,
            "arguments": arguments,
        }
    })
}

/// Unwraps a JSON-RPC envelope into the tool's own result payload. Text
/// content that parses as JSON is surfaced as structured data; anything else
/// comes back as a plain string value.
fn parse_call_response(name: &str, payload: Value) -> Result<Value, GatewayError> {
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unspecified gateway error")
            .to_string();
        return Err(GatewayError::Tool { name: name.to_string(), message });
    }

    let result = payload
        .get("result")
        .ok_or_else(|| GatewayError::Protocol("response carries neither result nor error".into()))?;

    let first_text = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks.iter().find_map(|block| {
                (block.get("type").and_then(Value::as_str) == Some("text"))
                    .then(|| block.get("text").and_then(Value::as_str))
                    .flatten()
            })
        });

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return Err(GatewayError::Tool {
            name: name.to_string(),
            message: first_text.unwrap_or("tool reported an error without detail").to_string(),
        });
    }

    match first_text {
        Some(text) => {
            Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
        }
        None => Ok(result.clone()),
    }
}
