//! Stage agents for the Replyline pipeline.
//!
//! Each agent wraps the [`ModelClient`] with one fixed prompt template and a
//! typed reading of the raw reply:
//!
//! - [`GuardAgent`]: safety classification (fails closed on unreadable replies)
//! - [`ResponseAgent`]: first draft from the customer message
//! - [`ToneAgent`]: PASS/FAIL against the brand's tone rubric
//! - [`RewriteAgent`]: one corrective rewrite
//!
//! Agents get their settings at construction and never read process state.

pub mod guard;
pub mod prompts;
pub mod response;
pub mod rewrite;
pub mod tone;

pub use guard::GuardAgent;
pub use response::ResponseAgent;
pub use rewrite::RewriteAgent;
pub use tone::ToneAgent;

use replyline_config::AppConfig;
use replyline_providers::{Completion, ModelClient};

/// A typed stage result plus the call's timing.
#[derive(Debug, Clone)]
pub struct AgentReply<T> {
    pub value: T,
    pub latency_ms: f64,
    pub model: String,
}

impl<T> AgentReply<T> {
    fn new(value: T, completion: Completion) -> Self {
        Self {
            value,
            latency_ms: completion.latency_ms,
            model: completion.model,
        }
    }
}

/// The four agents a pipeline needs, sharing one client.
pub struct StageAgents {
    pub guard: GuardAgent,
    pub response: ResponseAgent,
    pub tone: ToneAgent,
    pub rewrite: RewriteAgent,
}

impl StageAgents {
    pub fn from_config(client: ModelClient, config: &AppConfig) -> Self {
        Self {
            guard: GuardAgent::new(client.clone(), config.models.guard.clone()),
            response: ResponseAgent::new(
                client.clone(),
                config.models.response.clone(),
                &config.brand,
            ),
            tone: ToneAgent::new(client.clone(), config.models.tone.clone(), &config.brand),
            rewrite: RewriteAgent::new(client, config.models.rewrite.clone(), &config.brand),
        }
    }
}
