//! Draft generation.

use replyline_config::{BrandConfig, StageModelConfig};
use replyline_core::CustomerMessage;
use replyline_core::error::{Error, Result};
use replyline_core::provider::ProviderRequest;
use replyline_providers::ModelClient;
use tracing::{debug, info};

use crate::AgentReply;
use crate::prompts;

/// Leading artefacts some models prepend to the draft.
const ARTEFACT_PREFIXES: [&str; 2] = ["Response:", "Customer service response:"];

/// Writes the first draft of a reply to a customer message.
pub struct ResponseAgent {
    client: ModelClient,
    settings: StageModelConfig,
    system_prompt: String,
}

impl ResponseAgent {
    pub fn new(client: ModelClient, settings: StageModelConfig, brand: &BrandConfig) -> Self {
        Self {
            client,
            settings,
            system_prompt: prompts::response_system_prompt(brand),
        }
    }

    pub async fn draft(&self, message: &CustomerMessage) -> Result<AgentReply<String>> {
        let mut request = ProviderRequest::chat(
            &self.settings.model,
            &self.system_prompt,
            prompts::response_user_message(message.text()),
        )
        .with_max_tokens(self.settings.max_tokens)
        .with_temperature(self.settings.temperature);

        if let Some(context) = message.context_line() {
            debug!(context = %context, "Adding customer context to draft request");
            request = request.with_context(prompts::response_context(&context));
        }

        let completion = self.client.complete(request).await?;
        let draft = clean_draft(&completion.text);
        if draft.is_empty() {
            return Err(Error::parse("generation", "model returned an empty draft"));
        }

        info!(
            model = %completion.model,
            latency_ms = completion.latency_ms,
            chars = draft.len(),
            "Draft generated"
        );

        Ok(AgentReply::new(draft, completion))
    }
}

/// Strip leading artefacts such as `Response:`.
pub fn clean_draft(raw: &str) -> String {
    let mut text = raw.trim();
    for prefix in ARTEFACT_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client, stage};
    use replyline_core::testing::ScriptedProvider;
    use std::sync::Arc;

    fn agent(provider: Arc<ScriptedProvider>) -> ResponseAgent {
        ResponseAgent::new(
            client(provider),
            stage("response-model", 400),
            &BrandConfig::default(),
        )
    }

    #[test]
    fn artefact_prefixes_removed() {
        assert_eq!(clean_draft("Response: We apologize."), "We apologize.");
        assert_eq!(
            clean_draft("  Customer service response:\nThank you for waiting. "),
            "Thank you for waiting."
        );
        assert_eq!(clean_draft("Responses vary."), "Responses vary.");
    }

    #[tokio::test]
    async fn draft_uses_customer_message() {
        let provider = Arc::new(ScriptedProvider::new([
            "Response: I apologize for the delay with your order.",
        ]));
        let reply = agent(provider.clone())
            .draft(&CustomerMessage::new("Where is my order?"))
            .await
            .unwrap();

        assert_eq!(reply.value, "I apologize for the delay with your order.");
        let req = &provider.requests()[0];
        assert_eq!(req.user, "Customer message: Where is my order?");
        assert_eq!(req.system.len(), 1);
        assert!(
            req.system[0].starts_with("You are a Your Company customer service representative.")
        );
    }

    #[tokio::test]
    async fn context_becomes_second_system_message() {
        let provider = Arc::new(ScriptedProvider::new(["We will look into it right away."]));
        let message = CustomerMessage::new("Broken chair")
            .with_customer_id("c-42")
            .with_order_id("o-7");
        agent(provider.clone()).draft(&message).await.unwrap();

        let req = &provider.requests()[0];
        assert_eq!(req.system.len(), 2);
        assert_eq!(
            req.system[1],
            "Additional context: Customer ID: c-42 | Order ID: o-7"
        );
    }

    #[tokio::test]
    async fn artefact_only_draft_is_parse_error() {
        let provider = Arc::new(ScriptedProvider::new(["Response:"]));
        let err = agent(provider)
            .draft(&CustomerMessage::new("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "parse_error");
    }
}
