//! The Replyline pipeline: state machine, orchestrator and review desk.

pub mod machine;
pub mod orchestrator;
pub mod review;
pub mod scenarios;

pub use machine::{PipelineState, StageOutcome};
pub use orchestrator::{Orchestrator, Step, SuspendedRun};
pub use review::{PendingDecision, ReviewAction, ReviewDecision, ReviewDesk, ReviewTicket};
pub use scenarios::{SCENARIOS, Scenario, scenario};

#[cfg(test)]
pub(crate) mod test_support {
    use replyline_agents::{GuardAgent, ResponseAgent, RewriteAgent, StageAgents, ToneAgent};
    use replyline_config::{BrandConfig, StageModelConfig};
    use replyline_core::event::EventBus;
    use replyline_core::run::{PipelineRun, StageName};
    use replyline_core::testing::ScriptedProvider;
    use replyline_providers::ModelClient;
    use std::sync::Arc;

    use crate::Orchestrator;

    pub fn scripted() -> ScriptedProvider {
        ScriptedProvider::default()
    }

    fn stage(model: &str) -> StageModelConfig {
        StageModelConfig {
            model: model.into(),
            max_tokens: 200,
            temperature: 0.1,
        }
    }

    /// Orchestrator whose agents ask for models named after their stage.
    pub fn orchestrator(provider: ScriptedProvider) -> (Orchestrator, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let client = ModelClient::new(provider.clone());
        let brand = BrandConfig::default();
        let agents = StageAgents {
            guard: GuardAgent::new(client.clone(), stage("guard")),
            response: ResponseAgent::new(client.clone(), stage("response"), &brand),
            tone: ToneAgent::new(client.clone(), stage("tone"), &brand),
            rewrite: RewriteAgent::new(client, stage("rewrite"), &brand),
        };
        (
            Orchestrator::new(agents, Arc::new(EventBus::default())),
            provider,
        )
    }

    /// Executed stages are an ordered prefix-with-gaps of the canonical list.
    pub fn assert_canonical_prefix(run: &PipelineRun) {
        let stages = run.executed_stages();
        assert!(
            stages.windows(2).all(|w| w[0] < w[1]),
            "stages out of order: {stages:?}"
        );
        assert!(stages.iter().all(|s| StageName::CANONICAL.contains(s)));
    }
}
