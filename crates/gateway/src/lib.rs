//! Aerolens Domain Tool Gateway client
//!
//! The backing fleet graph is reachable only through a remote tool gateway:
//! named operations invoked with a JSON argument object that return a JSON
//! result or a structured error. This crate owns the client side of that
//! protocol:
//!
//! - `catalog`: the fixed, domain-namespaced tool catalogs offered to each
//!   specialist worker
//! - `auth`: bearer-token acquisition (static token or OAuth2
//!   client-credentials refresh)
//! - `client`: the `ToolGateway` trait and its HTTP JSON-RPC implementation

pub mod auth;
pub mod catalog;
pub mod client;

pub use auth::TokenManager;
pub use catalog::{qualified_name, ToolCatalog, ToolSpec};
pub use client::{HttpToolGateway, ToolGateway};

use thiserror::Error;

/// Errors specific to tool gateway operations
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport failure: {0}")]
    Transport(String),

    #[error("gateway returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("gateway protocol violation: {0}")]
    Protocol(String),

    #[error("tool `{name}` failed: {message}")]
    Tool { name: String, message: String },

    #[error("tool `{0}` is not in the offered catalog")]
    UnknownTool(String),

    #[error("gateway authentication failed: {0}")]
    Auth(String),
}

impl GatewayError {
    /// Transport failures are worth one more attempt; everything else is a
    /// definitive answer from the gateway.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
