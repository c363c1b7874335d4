//! Agent-specific error types with rich miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use crate::agent::llm::LlmError;
use crate::error::GraphError;

/// Errors from an agent strategy (remote AgentCore or the in-process agent).
///
/// These never reach the chat user; the fallback chain logs them and moves on.
#[derive(Debug, Error, Diagnostic)]
pub enum AgentError {
    #[error("agent \"{agent}\" is not configured")]
    #[diagnostic(
        code(atlas::agent::not_configured),
        help("Set AGENTCORE_URL (or `agent.remote_url` in config.toml) to enable the remote agent.")
    )]
    NotConfigured { agent: String },

    #[error("agent request to {url} failed: {message}")]
    #[diagnostic(
        code(atlas::agent::unreachable),
        help("Check that the agent service is running and reachable from this host.")
    )]
    Unreachable { url: String, message: String },

    #[error("agent \"{agent}\" timed out after {timeout_secs}s")]
    #[diagnostic(
        code(atlas::agent::timeout),
        help("Raise API_TIMEOUT or `agent.strategy_timeout_secs`, or check the agent's load.")
    )]
    Timeout { agent: String, timeout_secs: u64 },

    #[error("agent returned HTTP {status}: {message}")]
    #[diagnostic(
        code(atlas::agent::upstream_status),
        help("The agent service answered with an error status. Check its logs.")
    )]
    UpstreamStatus { status: u16, message: String },

    #[error("agent reported status \"{status}\": {message}")]
    #[diagnostic(
        code(atlas::agent::rejected),
        help("The agent processed the request but did not succeed. Check its logs.")
    )]
    Rejected { status: String, message: String },

    #[error("failed to parse agent response: {message}")]
    #[diagnostic(
        code(atlas::agent::parse),
        help("The agent answered with an unexpected JSON shape.")
    )]
    Parse { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

/// Result type for agent operations.
pub type AgentResult<T> = std::result::Result<T, AgentError>;
