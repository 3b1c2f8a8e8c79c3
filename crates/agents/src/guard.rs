//! Safety classification.

use replyline_config::StageModelConfig;
use replyline_core::error::Result;
use replyline_core::provider::ProviderRequest;
use replyline_core::verdict::{SafetyCategory, SafetyResult};
use replyline_providers::ModelClient;
use tracing::{info, warn};

use crate::AgentReply;
use crate::prompts;

/// Keywords that mark a hedged classifier reply as a potential violation.
const CAUTION_KEYWORDS: [&str; 4] = ["HARMFUL", "VIOLATION", "INAPPROPRIATE", "DANGEROUS"];

/// Runs text through the safety classifier.
pub struct GuardAgent {
    client: ModelClient,
    settings: StageModelConfig,
    system_prompt: String,
}

impl GuardAgent {
    pub fn new(client: ModelClient, settings: StageModelConfig) -> Self {
        Self {
            client,
            settings,
            system_prompt: prompts::guard_system_prompt(),
        }
    }

    /// Classify `content`.
    ///
    /// Transport and model errors propagate; an unreadable verdict does not
    /// pass (see [`interpret_verdict`]).
    pub async fn check(&self, content: &str) -> Result<AgentReply<SafetyResult>> {
        let request = ProviderRequest::chat(
            &self.settings.model,
            &self.system_prompt,
            prompts::guard_user_message(content),
        )
        .with_max_tokens(self.settings.max_tokens)
        .with_temperature(self.settings.temperature);

        let completion = self.client.complete(request).await?;
        let verdict = interpret_verdict(&completion.text);

        if verdict.passed {
            info!(
                model = %completion.model,
                latency_ms = completion.latency_ms,
                "Safety check passed"
            );
        } else {
            warn!(
                model = %completion.model,
                latency_ms = completion.latency_ms,
                categories = ?verdict.labels(),
                "Safety check failed"
            );
        }

        Ok(AgentReply::new(verdict, completion))
    }
}

/// Read a classifier reply.
///
/// Checked in order: `UNSAFE` (categories from the codes named, or
/// `content_violation`), a cautionary keyword (`potential_violation`),
/// `SAFE` (pass). Anything else fails closed as `unparseable_verdict`.
pub fn interpret_verdict(reply: &str) -> SafetyResult {
    let upper = reply.trim().to_ascii_uppercase();

    if upper.contains("UNSAFE") {
        let mut categories: Vec<SafetyCategory> = SafetyCategory::CODED
            .into_iter()
            .filter(|c| c.code().is_some_and(|code| mentions_code(&upper, code)))
            .collect();
        if categories.is_empty() {
            categories.push(SafetyCategory::ContentViolation);
        }
        return SafetyResult::flagged(categories).with_explanation(reply.trim());
    }

    if CAUTION_KEYWORDS.iter().any(|k| upper.contains(k)) {
        return SafetyResult::flagged(vec![SafetyCategory::PotentialViolation])
            .with_explanation(reply.trim());
    }

    if upper.contains("SAFE") {
        return SafetyResult::safe().with_explanation(reply.trim());
    }

    warn!(reply = %reply, "Unparseable safety verdict, failing closed");
    SafetyResult::flagged(vec![SafetyCategory::UnparseableVerdict]).with_explanation(reply.trim())
}

/// `O1` must not match inside `O10` or a longer token.
fn mentions_code(upper: &str, code: &str) -> bool {
    upper.match_indices(code).any(|(at, _)| {
        let before = upper[..at].chars().next_back();
        let after = upper[at + code.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client, stage};
    use replyline_core::testing::ScriptedProvider;
    use std::sync::Arc;

    #[test]
    fn safe_reply_passes() {
        let verdict = interpret_verdict("SAFE");
        assert!(verdict.passed);
        assert!(verdict.categories.is_empty());
    }

    #[test]
    fn unsafe_reply_lists_codes() {
        let verdict = interpret_verdict("unsafe: O1, O7");
        assert!(!verdict.passed);
        assert_eq!(
            verdict.categories,
            vec![SafetyCategory::ViolenceHate, SafetyCategory::ProfessionalStandards]
        );
    }

    #[test]
    fn unsafe_without_code_is_content_violation() {
        let verdict = interpret_verdict("UNSAFE");
        assert_eq!(verdict.categories, vec![SafetyCategory::ContentViolation]);
    }

    #[test]
    fn llamaguard_newline_format() {
        let verdict = interpret_verdict("unsafe\nO3");
        assert_eq!(verdict.categories, vec![SafetyCategory::Weapons]);
    }

    #[test]
    fn code_match_is_token_bounded() {
        assert!(!mentions_code("UNSAFE: O10", "O1"));
        assert!(mentions_code("UNSAFE: O1,O2", "O1"));
    }

    #[test]
    fn cautionary_keyword_is_potential_violation() {
        let verdict = interpret_verdict("This looks potentially harmful.");
        assert!(!verdict.passed);
        assert_eq!(verdict.categories, vec![SafetyCategory::PotentialViolation]);
    }

    #[test]
    fn unreadable_reply_fails_closed() {
        let verdict = interpret_verdict("I'm not sure what you mean.");
        assert!(!verdict.passed);
        assert_eq!(verdict.category(), Some(SafetyCategory::UnparseableVerdict));
        assert_eq!(verdict.explanation.as_deref(), Some("I'm not sure what you mean."));
    }

    #[tokio::test]
    async fn check_sends_taxonomy_and_content() {
        let provider = Arc::new(ScriptedProvider::new(["SAFE"]));
        let guard = GuardAgent::new(client(provider.clone()), stage("guard-model", 128));

        let reply = guard.check("Where is my order?").await.unwrap();
        assert!(reply.value.passed);
        assert_eq!(reply.model, "guard-model");

        let req = &provider.requests()[0];
        assert_eq!(req.model, "guard-model");
        assert_eq!(req.max_tokens, Some(128));
        assert!(req.system[0].contains("O6: Criminal Planning"));
        assert_eq!(req.user, "Classify this content:\n\nWhere is my order?");
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .then_fail(replyline_core::ProviderError::Network("reset".into())),
        );
        let guard = GuardAgent::new(client(provider), stage("guard-model", 128));
        let err = guard.check("hello").await.unwrap_err();
        assert_eq!(err.kind(), "transport_error");
    }
}
