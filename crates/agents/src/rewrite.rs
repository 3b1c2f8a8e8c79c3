//! Single-pass professional rewrite of a response that failed the tone check.

use replyline_config::{BrandConfig, StageModelConfig};
use replyline_core::error::{Error, Result};
use replyline_core::provider::ProviderRequest;
use replyline_core::verdict::ToneResult;
use replyline_providers::ModelClient;
use tracing::info;

use crate::AgentReply;
use crate::prompts;

pub struct RewriteAgent {
    client: ModelClient,
    settings: StageModelConfig,
    system_prompt: String,
}

impl RewriteAgent {
    pub fn new(client: ModelClient, settings: StageModelConfig, brand: &BrandConfig) -> Self {
        Self {
            client,
            settings,
            system_prompt: prompts::rewrite_system_prompt(brand),
        }
    }

    /// Rewrite `response` to address the issues in `tone`.
    pub async fn rewrite(&self, response: &str, tone: &ToneResult) -> Result<AgentReply<String>> {
        let system = format!(
            "{}{}",
            self.system_prompt,
            prompts::rewrite_improvements(&tone.issues, &tone.flagged_phrases)
        );
        let request = ProviderRequest::chat(&self.settings.model, system, response)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);

        let completion = self.client.complete(request).await?;
        let rewritten = completion.text.trim().to_string();
        if rewritten.is_empty() {
            return Err(Error::parse("rewrite", "model returned an empty rewrite"));
        }

        info!(
            model = %completion.model,
            latency_ms = completion.latency_ms,
            before = response.len(),
            after = rewritten.len(),
            "Response rewritten"
        );

        Ok(AgentReply::new(rewritten, completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client, stage};
    use replyline_core::testing::ScriptedProvider;
    use replyline_core::verdict::ToneIssue;
    use std::sync::Arc;

    #[tokio::test]
    async fn improvements_extend_system_prompt() {
        let provider = Arc::new(ScriptedProvider::new([
            "I understand your concern and will resolve this promptly.",
        ]));
        let agent = RewriteAgent::new(
            client(provider.clone()),
            stage("rewrite-model", 300),
            &BrandConfig::default(),
        );
        let tone = ToneResult::fail(vec![ToneIssue::CasualLanguage], vec!["ASAP".into()]);

        let reply = agent.rewrite("We'll fix it ASAP!", &tone).await.unwrap();
        assert_eq!(
            reply.value,
            "I understand your concern and will resolve this promptly."
        );

        let req = &provider.requests()[0];
        assert_eq!(req.user, "We'll fix it ASAP!");
        assert!(req.system[0].contains(
            "SPECIFIC IMPROVEMENTS NEEDED:\n- Replace casual expressions with professional language"
        ));
        assert!(req.system[0].contains("FLAGGED BY THE TONE REVIEW:\n- \"ASAP\""));
    }

    #[tokio::test]
    async fn rewrite_uses_configured_temperature() {
        let provider = Arc::new(ScriptedProvider::new(["Thank you for your patience."]));
        let mut settings = stage("rewrite-model", 300);
        settings.temperature = 0.2;
        let agent = RewriteAgent::new(client(provider.clone()), settings, &BrandConfig::default());

        agent
            .rewrite("whatever", &ToneResult::fail(vec![ToneIssue::ToneViolation], vec![]))
            .await
            .unwrap();
        assert!((provider.requests()[0].temperature - 0.2).abs() < f32::EPSILON);
    }
}
