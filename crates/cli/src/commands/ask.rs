use std::sync::Arc;

use aerolens_agent::{HttpReasoningClient, QueryEngine, QueryPort};
use aerolens_core::config::{AppConfig, LoadOptions};
use aerolens_core::{InMemoryTraceSink, SpecialistDomain};
use aerolens_gateway::HttpToolGateway;

use super::CommandResult;

pub fn run(text: &str, session: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("config validation failed: {error}"),
            }
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("runtime initialization failed: {error}"),
            }
        }
    };

    let gateway = match HttpToolGateway::new(&config.gateway) {
        Ok(gateway) => Arc::new(gateway),
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("gateway client initialization failed: {error}"),
            }
        }
    };

    let client = match HttpReasoningClient::from_config(&config.llm) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("reasoning client initialization failed: {error}"),
            }
        }
    };

    let engine = QueryEngine::from_parts(
        &config,
        gateway,
        client,
        Arc::new(InMemoryTraceSink::default()),
    );

    let response = runtime.block_on(engine.submit_query(text, session));

    let mut lines = vec![response.text.clone(), String::new()];
    lines.push(format!(
        "domains: {}",
        response
            .contributing_domains
            .iter()
            .map(SpecialistDomain::as_str)
            .collect::<Vec<_>>()
            .join(",")
    ));
    for invocation in &response.worker_invocations {
        lines.push(format!(
            "  {}: {:?} in {} ms, {} tool call(s)",
            invocation.domain,
            invocation.status,
            invocation.elapsed_ms,
            invocation.tool_calls.len()
        ));
    }
    if response.degraded {
        lines.push("note: degraded (partial) answer".to_string());
    }

    let exit_code = match &response.error {
        Some(error) => {
            lines.push(format!("error: {error}"));
            1
        }
        None => 0,
    };

    CommandResult { exit_code, output: lines.join("\n") }
}
