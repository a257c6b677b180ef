use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use aerolens_gateway::ToolGateway;

#[derive(Clone)]
pub struct HealthState {
    gateway: Arc<dyn ToolGateway>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub gateway: HealthCheck,
    pub checked_at: String,
}

pub fn router(gateway: Arc<dyn ToolGateway>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { gateway })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    gateway: Arc<dyn ToolGateway>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router(gateway)).await {
            error!(
                event_name = "system.health.error",
                error = %err,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let gateway = gateway_check(state.gateway.as_ref()).await;
    let ready = gateway.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "aerolens-server runtime initialized".to_string(),
        },
        gateway,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn gateway_check(gateway: &dyn ToolGateway) -> HealthCheck {
    match gateway.healthcheck().await {
        Ok(()) => HealthCheck {
            status: "ready",
            detail: "gateway credentials available".to_string(),
        },
        Err(err) => HealthCheck {
            status: "degraded",
            detail: format!("gateway check failed: {err}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use serde_json::Value;

    use aerolens_core::SpecialistDomain;
    use aerolens_gateway::{GatewayError, ToolCatalog, ToolGateway};

    use crate::health::{health, HealthState};

    struct FixedGateway {
        catalogs: BTreeMap<SpecialistDomain, ToolCatalog>,
        healthy: bool,
    }

    impl FixedGateway {
        fn new(healthy: bool) -> Self {
            Self {
                catalogs: SpecialistDomain::ALL
                    .into_iter()
                    .map(|domain| (domain, ToolCatalog::for_domain(domain)))
                    .collect(),
                healthy,
            }
        }
    }

    #[async_trait]
    impl ToolGateway for FixedGateway {
        fn catalog(&self, domain: SpecialistDomain) -> &ToolCatalog {
            &self.catalogs[&domain]
        }

        async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<Value, GatewayError> {
            Err(GatewayError::Transport("not used in health tests".to_string()))
        }

        async fn healthcheck(&self) -> Result<(), GatewayError> {
            if self.healthy {
                Ok(())
            } else {
                Err(GatewayError::Auth("token endpoint unreachable".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn health_returns_ready_when_the_gateway_is_reachable() {
        let (status, Json(payload)) =
            health(State(HealthState { gateway: Arc::new(FixedGateway::new(true)) })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.gateway.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_the_gateway_is_down() {
        let (status, Json(payload)) =
            health(State(HealthState { gateway: Arc::new(FixedGateway::new(false)) })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.gateway.status, "degraded");
        assert!(payload.gateway.detail.contains("token endpoint unreachable"));
        assert_eq!(payload.service.status, "ready");
    }
}
