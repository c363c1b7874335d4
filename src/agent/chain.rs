//! Ordered fallback over agent strategies.
//!
//! Strategies are tried in order; each is bounded by a timeout and the first
//! success wins. Failures are logged and never shown to the user. If all of
//! them fail the chain answers with [`APOLOGY`].

use std::sync::Arc;
use std::time::Duration;

use super::{Agent, AgentReply, AgentRequest, QueryCategory};

/// Answer given when no strategy could respond.
pub const APOLOGY: &str =
    "I'm sorry, I'm having trouble processing your request right now. Please try again later.";

/// Which strategy produced an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub reply: AgentReply,
    /// Name of the answering strategy; `None` for the canned apology.
    pub answered_by: Option<String>,
    /// Position of the answering strategy; anything past the first is a fallback.
    pub position: Option<usize>,
}

impl ChainOutcome {
    /// Whether a strategy other than the preferred one (or none at all) answered.
    pub fn is_fallback(&self) -> bool {
        self.position != Some(0)
    }
}

pub struct FallbackChain {
    strategies: Vec<Arc<dyn Agent>>,
    strategy_timeout: Duration,
}

impl FallbackChain {
    pub fn new(strategy_timeout: Duration) -> Self {
        Self {
            strategies: Vec::new(),
            strategy_timeout,
        }
    }

    /// Append a strategy; earlier strategies are preferred.
    pub fn push(mut self, agent: Arc<dyn Agent>) -> Self {
        self.strategies.push(agent);
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain. Never fails.
    pub async fn respond(&self, request: &AgentRequest) -> ChainOutcome {
        for (position, agent) in self.strategies.iter().enumerate() {
            match tokio::time::timeout(self.strategy_timeout, agent.respond(request)).await {
                Ok(Ok(reply)) => {
                    if position > 0 {
                        tracing::info!(agent = agent.name(), position, "answered by fallback agent");
                    }
                    return ChainOutcome {
                        reply,
                        answered_by: Some(agent.name().to_string()),
                        position: Some(position),
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!(agent = agent.name(), error = %e, "agent strategy failed");
                }
                Err(_) => {
                    tracing::warn!(
                        agent = agent.name(),
                        timeout_secs = self.strategy_timeout.as_secs(),
                        "agent strategy timed out"
                    );
                }
            }
        }

        tracing::warn!(strategies = self.strategies.len(), "all agent strategies failed");
        ChainOutcome {
            reply: AgentReply::text(QueryCategory::Error, APOLOGY).with_step("fallback"),
            answered_by: None,
            position: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentError, AgentResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Agent for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn respond(&self, _request: &AgentRequest) -> AgentResult<AgentReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::UpstreamStatus {
                status: 502,
                message: "Traceback (most recent call last)".into(),
            })
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl Agent for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        async fn respond(&self, _request: &AgentRequest) -> AgentResult<AgentReply> {
            Ok(AgentReply::text(QueryCategory::General, format!("from {}", self.0)))
        }
    }

    struct Slow;

    #[async_trait]
    impl Agent for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        async fn respond(&self, _request: &AgentRequest) -> AgentResult<AgentReply> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AgentReply::text(QueryCategory::General, "too late"))
        }
    }

    #[tokio::test]
    async fn first_success_wins() {
        let chain = FallbackChain::new(Duration::from_secs(5))
            .push(Arc::new(Fixed("primary")))
            .push(Arc::new(Fixed("secondary")));
        let out = chain.respond(&AgentRequest::new("hi")).await;
        assert_eq!(out.reply.message, "from primary");
        assert!(!out.is_fallback());
    }

    #[tokio::test]
    async fn falls_through_failures() {
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let chain = FallbackChain::new(Duration::from_secs(5))
            .push(failing.clone())
            .push(Arc::new(Fixed("local")));
        let out = chain.respond(&AgentRequest::new("hi")).await;
        assert_eq!(out.answered_by.as_deref(), Some("local"));
        assert!(out.is_fallback());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_strategy_is_cut_off() {
        let chain = FallbackChain::new(Duration::from_secs(30))
            .push(Arc::new(Slow))
            .push(Arc::new(Fixed("local")));
        let out = chain.respond(&AgentRequest::new("hi")).await;
        assert_eq!(out.reply.message, "from local");
    }

    #[tokio::test]
    async fn total_failure_apologises_without_leaking() {
        let chain = FallbackChain::new(Duration::from_secs(5)).push(Arc::new(Failing {
            calls: AtomicUsize::new(0),
        }));
        let out = chain.respond(&AgentRequest::new("hi")).await;
        assert_eq!(out.reply.message, APOLOGY);
        assert_eq!(out.reply.category, QueryCategory::Error);
        assert!(!out.reply.message.contains("Traceback"));
        assert!(out.is_fallback());
    }

    #[tokio::test]
    async fn empty_chain_apologises() {
        let chain = FallbackChain::new(Duration::from_secs(1));
        let out = chain.respond(&AgentRequest::new("hi")).await;
        assert_eq!(out.reply.message, APOLOGY);
    }
}
