//! Tone validation against the brand's professional standards.

use replyline_config::{BrandConfig, StageModelConfig};
use replyline_core::error::{Error, Result};
use replyline_core::provider::ProviderRequest;
use replyline_core::verdict::{ToneIssue, ToneResult};
use replyline_providers::ModelClient;
use tracing::{info, warn};

use crate::AgentReply;
use crate::prompts;

/// Keyword in the validator's reply, and the issue it signals.
const ISSUE_KEYWORDS: [(&str, ToneIssue); 8] = [
    ("CASUAL", ToneIssue::CasualLanguage),
    ("DISMISSIVE", ToneIssue::DismissiveLanguage),
    ("UNPROFESSIONAL", ToneIssue::UnprofessionalTone),
    ("JARGON", ToneIssue::TechnicalJargon),
    ("BLAME", ToneIssue::BlameLanguage),
    ("ABSOLUTE", ToneIssue::AbsoluteStatements),
    ("URGENCY", ToneIssue::InappropriateUrgency),
    ("EMOTION", ToneIssue::InappropriateEmotions),
];

pub struct ToneAgent {
    client: ModelClient,
    settings: StageModelConfig,
    system_prompt: String,
}

impl ToneAgent {
    pub fn new(client: ModelClient, settings: StageModelConfig, brand: &BrandConfig) -> Self {
        Self {
            client,
            settings,
            system_prompt: prompts::tone_system_prompt(brand),
        }
    }

    pub async fn validate(&self, response: &str) -> Result<AgentReply<ToneResult>> {
        let request = ProviderRequest::chat(
            &self.settings.model,
            &self.system_prompt,
            prompts::tone_user_message(response),
        )
        .with_max_tokens(self.settings.max_tokens)
        .with_temperature(self.settings.temperature);

        let completion = self.client.complete(request).await?;
        let result = interpret_tone(&completion.text)?;

        if result.passed {
            info!(
                model = %completion.model,
                latency_ms = completion.latency_ms,
                "Tone check passed"
            );
        } else {
            warn!(
                model = %completion.model,
                latency_ms = completion.latency_ms,
                issues = ?result.issues,
                "Tone issues detected"
            );
        }

        Ok(AgentReply::new(result, completion))
    }
}

/// Read a tone validator reply.
///
/// `PASS` at the start passes. A reply containing `FAIL` fails. The verdict
/// line reads `FAIL: issue, ... | "phrase", ...`: issues come from keywords
/// before the `|`, flagged phrases from after it. Without a `|`, only quoted
/// text on the verdict line counts as a phrase. Anything else is a parse
/// error.
pub fn interpret_tone(reply: &str) -> Result<ToneResult> {
    let trimmed = reply.trim().trim_start_matches(['"', '*', '\'', '`']).trim_start();
    let upper = trimmed.to_ascii_uppercase();

    if upper.starts_with("PASS") {
        return Ok(ToneResult::pass());
    }

    let Some(fail_at) = upper.find("FAIL") else {
        return Err(Error::parse(
            "tone_check",
            format!("expected PASS or FAIL, got '{}'", reply.trim()),
        ));
    };

    let verdict = trimmed[fail_at + "FAIL".len()..]
        .trim_start()
        .trim_start_matches(':')
        .trim_start()
        .lines()
        .next()
        .unwrap_or_default();
    let (issue_text, phrases) = match verdict.split_once('|') {
        Some((issues, phrases)) => (issues.to_ascii_uppercase(), listed_phrases(phrases)),
        None => (upper, quoted_phrases(verdict)),
    };

    let mut issues: Vec<ToneIssue> = ISSUE_KEYWORDS
        .iter()
        .filter(|(keyword, _)| issue_text.contains(keyword))
        .map(|(_, issue)| *issue)
        .collect();

    // "inappropriate" on its own is about wording; with urgency or emotion
    // it is already covered above.
    let qualified = issues
        .iter()
        .any(|i| matches!(i, ToneIssue::InappropriateUrgency | ToneIssue::InappropriateEmotions));
    if issue_text.contains("INAPPROPRIATE") && !qualified {
        issues.push(ToneIssue::InappropriateLanguage);
    }

    if issues.is_empty() {
        issues.push(ToneIssue::ToneViolation);
    }

    Ok(ToneResult::fail(issues, phrases))
}

/// Comma-separated phrases, quotes optional.
fn listed_phrases(text: &str) -> Vec<String> {
    let quoted = quoted_phrases(text);
    if !quoted.is_empty() {
        return quoted;
    }
    text.split(',')
        .map(|p| p.trim().trim_matches(['[', ']', '.']).trim())
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Text between pairs of double quotes.
fn quoted_phrases(text: &str) -> Vec<String> {
    let normalized = text.replace(['\u{201c}', '\u{201d}'], "\"");
    normalized
        .split('"')
        .skip(1)
        .step_by(2)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
