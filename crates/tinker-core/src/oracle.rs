//! ReasoningOracle trait: the boundary to whatever plans the work.
//!
//! The engine never inspects free text for sentinel phrases. Adapters turn
//! their backend's output into a typed [`OracleResponse`] (`done`, `actions`)
//! and the graphs only read those fields.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use tinker_types::message::ConversationMessage;
use tinker_types::task::{ActionOutcome, ActionResult, PlannedAction};

/// What the engine is asking for, with the context for that question.
#[derive(Debug, Clone, Copy)]
pub enum OracleQuery<'a> {
    /// Plan a task: narrative plus zero or more actions.
    Analyze {
        task: &'a str,
        history: &'a [ConversationMessage],
        working_dir: &'a str,
    },
    /// One combined narrative for all results of an execution pass.
    Synthesize {
        task: &'a str,
        results: &'a [ActionResult],
    },
    /// Loop reasoning step. `done` reports that the goal is achieved.
    Think {
        goal: &'a str,
        iteration: u32,
        max_iterations: u32,
        working_memory: &'a BTreeMap<String, Value>,
        recent_observations: &'a [String],
        planned_actions: &'a [String],
        last_action: Option<&'a str>,
        last_result: Option<&'a ActionOutcome>,
    },
    /// Pick exactly one action (or none) to carry out the latest reasoning.
    SelectAction {
        goal: &'a str,
        reasoning: &'a str,
    },
}

impl OracleQuery<'_> {
    /// Short name used in logs and spans.
    pub fn name(&self) -> &'static str {
        match self {
            OracleQuery::Analyze { .. } => "analyze",
            OracleQuery::Synthesize { .. } => "synthesize",
            OracleQuery::Think { .. } => "think",
            OracleQuery::SelectAction { .. } => "select_action",
        }
    }
}

/// Typed oracle answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleResponse {
    pub narrative: String,
    pub actions: Vec<PlannedAction>,
    pub done: bool,
}

impl OracleResponse {
    pub fn narrative(text: impl Into<String>) -> Self {
        Self {
            narrative: text.into(),
            ..Self::default()
        }
    }

    pub fn with_actions(mut self, actions: Vec<PlannedAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn finished(mut self) -> Self {
        self.done = true;
        self
    }
}

/// Errors from a reasoning backend. Always degraded by the caller, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle not configured: {0}")]
    NotConfigured(String),

    #[error("oracle request failed: {0}")]
    Request(String),

    #[error("oracle returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Trait for reasoning backends (Anthropic, direct mode, test scripts).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in tinker-infra.
pub trait ReasoningOracle: Send + Sync {
    /// Backend name (e.g. "anthropic", "direct").
    fn name(&self) -> &str;

    fn consult(
        &self,
        query: &OracleQuery<'_>,
    ) -> impl Future<Output = Result<OracleResponse, OracleError>> + Send;
}

/// Object-safe version of [`ReasoningOracle`] with boxed futures.
pub trait ReasoningOracleDyn: Send + Sync {
    fn name(&self) -> &str;

    fn consult_boxed<'a>(
        &'a self,
        query: &'a OracleQuery<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<OracleResponse, OracleError>> + Send + 'a>>;
}

impl<T: ReasoningOracle> ReasoningOracleDyn for T {
    fn name(&self) -> &str {
        ReasoningOracle::name(self)
    }

    fn consult_boxed<'a>(
        &'a self,
        query: &'a OracleQuery<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<OracleResponse, OracleError>> + Send + 'a>> {
        Box::pin(self.consult(query))
    }
}

/// Type-erased oracle for runtime backend selection.
///
/// Implements [`ReasoningOracle`] itself, so the pipeline and loop can be
/// instantiated once with `BoxOracle` regardless of the configured backend.
pub struct BoxOracle {
    inner: Box<dyn ReasoningOracleDyn>,
}

impl BoxOracle {
    pub fn new<T: ReasoningOracle + 'static>(oracle: T) -> Self {
        Self {
            inner: Box::new(oracle),
        }
    }
}

impl ReasoningOracle for BoxOracle {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn consult(&self, query: &OracleQuery<'_>) -> Result<OracleResponse, OracleError> {
        self.inner.consult_boxed(query).await
    }
}

impl std::fmt::Debug for BoxOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxOracle")
            .field("name", &self.inner.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ReasoningOracle for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn consult(&self, query: &OracleQuery<'_>) -> Result<OracleResponse, OracleError> {
            match query {
                OracleQuery::Analyze { task, .. } => Ok(OracleResponse::narrative(*task)
                    .with_actions(vec![PlannedAction::shell(*task)])),
                _ => Err(OracleError::Request("unsupported".into())),
            }
        }
    }

    #[tokio::test]
    async fn box_oracle_delegates() {
        let oracle = BoxOracle::new(Echo);
        assert_eq!(ReasoningOracle::name(&oracle), "echo");

        let query = OracleQuery::Analyze {
            task: "echo hi",
            history: &[],
            working_dir: "/workspace",
        };
        let response = oracle.consult(&query).await.unwrap();
        assert_eq!(response.narrative, "echo hi");
        assert_eq!(response.actions[0].command(), Some("echo hi"));
        assert!(!response.done);

        let query = OracleQuery::SelectAction {
            goal: "g",
            reasoning: "r",
        };
        assert!(oracle.consult(&query).await.is_err());
    }

    #[test]
    fn query_names() {
        let query = OracleQuery::SelectAction {
            goal: "g",
            reasoning: "r",
        };
        assert_eq!(query.name(), "select_action");
        assert!(OracleResponse::narrative("x").finished().done);
    }
}
