//! Prompt templates for the stage agents.
//!
//! Templates are plain `format!` strings parameterised by the brand voice.

use replyline_config::BrandConfig;
use replyline_core::verdict::{SafetyCategory, ToneIssue};

/// System prompt for the safety classifier.
pub fn guard_system_prompt() -> String {
    let mut prompt = String::from(
        "You are a safety classifier using LlamaGuard standards. \
         Classify content as SAFE or UNSAFE based on these categories:\n",
    );
    for category in SafetyCategory::CODED {
        if let Some(code) = category.code() {
            prompt.push_str(&format!("\n{code}: {}\n", guard_heading(category)));
            for rule in guard_rules(category) {
                prompt.push_str(&format!("- {rule}\n"));
            }
        }
    }
    prompt.push_str(
        "\nRespond with:\n\
         - \"SAFE\" if content doesn't violate any category\n\
         - \"UNSAFE: [Category]\" if content violates categories (e.g., \"UNSAFE: O1, O3\")\n",
    );
    prompt
}

fn guard_heading(category: SafetyCategory) -> &'static str {
    match category {
        SafetyCategory::ViolenceHate => "Violence & Hate",
        SafetyCategory::SexualContent => "Sexual Content",
        SafetyCategory::Weapons => "Guns & Illegal Weapons",
        SafetyCategory::Substances => "Regulated Substances",
        SafetyCategory::SelfHarm => "Suicide & Self-Harm",
        SafetyCategory::CriminalPlanning => "Criminal Planning",
        SafetyCategory::ProfessionalStandards => "Professional Standards",
        _ => "",
    }
}

fn guard_rules(category: SafetyCategory) -> &'static [&'static str] {
    match category {
        SafetyCategory::ViolenceHate => &[
            "Statements encouraging or helping plan violence",
            "Discrimination, slurs, hateful sentiments based on race, color, religion, national origin, sexual orientation, gender, gender identity, disability",
        ],
        SafetyCategory::SexualContent => &[
            "Encouraging sexual acts (especially with minors)",
            "Sexually explicit/erotic content",
        ],
        SafetyCategory::Weapons => &[
            "Encouraging, condoning, or helping plan illegal weapon acquisition or use",
            "Instructions for making weapons, explosives, dangerous chemicals",
        ],
        SafetyCategory::Substances => &[
            "Promoting illegal production/use of controlled substances",
            "Instructions for drug manufacturing or distribution",
        ],
        SafetyCategory::SelfHarm => &[
            "Encouraging self-harm or suicide",
            "Providing harmful advice instead of mental health resources",
        ],
        SafetyCategory::CriminalPlanning => &[
            "Encouraging, condoning, or helping plan criminal activities (arson, kidnapping, theft, fraud)",
            "Only use when content doesn't fit other violation categories",
        ],
        SafetyCategory::ProfessionalStandards => &[
            "Threats, personal insults or harassment directed at staff",
            "Abusive or demeaning language toward the company's representatives",
        ],
        _ => &[],
    }
}

/// User message wrapping the content under classification.
pub fn guard_user_message(content: &str) -> String {
    format!("Classify this content:\n\n{content}")
}

/// System prompt for draft generation.
pub fn response_system_prompt(brand: &BrandConfig) -> String {
    let BrandConfig {
        company_name: company,
        domain,
        voice,
    } = brand;
    format!(
        "You are a {company} {domain} representative. Generate professional, empathetic responses that solve customer problems.

RESPONSE REQUIREMENTS:
- Don't make up information about {company} policies or procedures
- Make responses feel personable and authentic
- Start with empathy and understanding
- Take ownership of the customer's concern
- Keep answers short, professional, and to the point
- Maintain {voice} tone throughout

PROFESSIONAL LANGUAGE STANDARDS:
- Use: \"promptly\", \"immediately\", \"as soon as possible\"
- Avoid: \"ASAP\", \"totally\", \"screwed up\", \"weird\", \"guys\"
- Use: \"We sincerely apologize\" or \"I apologize for the inconvenience\"
- Avoid: \"Sorry about that\", \"My bad\", \"Oops\"
- Use: \"I'd be happy to help\" or \"Let me assist you\"
- Avoid: \"No problem\", \"Sure thing\", \"Yeah\"

SAFETY GUIDELINES:
- Never make promises you can't keep
- Don't admit fault for legal issues
- Direct complex issues to appropriate specialists
- Maintain confidentiality and data protection
- Always provide next steps or escalation paths

Generate a professional {domain} response to this message:"
    )
}

pub fn response_context(context_line: &str) -> String {
    format!("Additional context: {context_line}")
}

pub fn response_user_message(text: &str) -> String {
    format!("Customer message: {text}")
}

/// System prompt for the tone rubric.
pub fn tone_system_prompt(brand: &BrandConfig) -> String {
    let company = &brand.company_name;
    format!(
        "You are validating customer service responses for {company}'s professional tone compliance.

CRITICAL REQUIREMENTS - Response must be:
- Empathetic and understanding
- Professional but warm
- Solution-focused
- Clear and helpful

AUTOMATIC FAILURES - Flag as FAIL if response contains:
- Casual expressions: \"ASAP\", \"totally\", \"screwed up\", \"weird\", \"guys\", \"yeah\", \"nope\"
- Dismissive language: \"can't do anything\", \"not our problem\", \"that's impossible\"
- Unprofessional urgency: \"right now\", \"hurry up\"
- Inappropriate emotions: \"frustrated\", \"annoyed\", \"angry\"
- Technical jargon without explanation
- Blame language: \"you should have\", \"you didn't\", \"your fault\"
- Absolute statements: \"never\", \"always\", \"impossible\" (without solution)

RESPONSE FORMAT:
- PASS: if tone meets all professional standards
- FAIL: [specific_issue, ...] | \"offending phrase\", ... if tone has problems
  Quote every offending phrase exactly as it appears in the response.

Examples:
\"Thanks for reaching out, we'll get back to you ASAP!\" -> FAIL: casual_language | \"ASAP\"
\"I understand your concern about the delay.\" -> PASS
\"That's totally screwed up, sorry!\" -> FAIL: unprofessional_tone, casual_language | \"totally\", \"screwed up\"
\"We sincerely apologize and will resolve this promptly.\" -> PASS"
    )
}

pub fn tone_user_message(content: &str) -> String {
    format!("Validate this customer service response:\n\n{content}")
}

/// System prompt for the rewrite pass, without the improvement list.
pub fn rewrite_system_prompt(brand: &BrandConfig) -> String {
    let BrandConfig {
        company_name: company,
        domain,
        ..
    } = brand;
    format!(
        "You are rewriting {domain} responses to meet {company}'s professional excellence standards.

OUTPUT ONLY the corrected response text. No explanations, no formatting, no additional commentary.

REWRITE GUIDELINES:
Replace casual language with professional alternatives:
- \"ASAP\" -> \"promptly\" or \"as soon as possible\"
- \"totally\" -> \"completely\" or \"entirely\"
- \"screwed up\" -> \"experienced an error\"
- \"weird\" -> \"unusual\" or \"unexpected\"
- \"guys\" -> \"team\" or remove entirely

Add empathy if missing:
- Start with \"I understand...\" or \"I can see why...\"
- Acknowledge their specific concern

Strengthen ownership language:
- \"We'll work to resolve this\"
- \"Let me personally ensure...\"

Improve solution clarity:
- Provide specific next steps
- Include timelines when possible

MAINTAIN:
- All factual information and commitments
- The core message and intent
- Any specific details or reference numbers"
    )
}

/// The "specific improvements needed" block appended to the rewrite prompt.
///
/// Empty when there is nothing specific to say.
pub fn rewrite_improvements(issues: &[ToneIssue], flagged_phrases: &[String]) -> String {
    let mut guidance: Vec<&str> = Vec::new();
    for issue in issues {
        let line = issue.guidance();
        if !guidance.contains(&line) {
            guidance.push(line);
        }
    }

    let mut block = String::new();
    if !guidance.is_empty() {
        block.push_str("\n\nSPECIFIC IMPROVEMENTS NEEDED:");
        for line in guidance {
            block.push_str("\n- ");
            block.push_str(line);
        }
    }
    if !flagged_phrases.is_empty() {
        block.push_str("\n\nFLAGGED BY THE TONE REVIEW:");
        for phrase in flagged_phrases {
            block.push_str(&format!("\n- \"{phrase}\""));
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_prompt_lists_every_code() {
        let prompt = guard_system_prompt();
        for code in ["O1", "O2", "O3", "O4", "O5", "O6", "O7"] {
            assert!(prompt.contains(&format!("{code}:")), "missing {code}");
        }
        assert!(prompt.contains("UNSAFE: O1, O3"));
    }

    #[test]
    fn brand_flows_into_prompts() {
        let brand = BrandConfig {
            company_name: "Northwind".into(),
            domain: "furniture support".into(),
            voice: "warm and precise".into(),
        };
        let response = response_system_prompt(&brand);
        assert!(response.starts_with("You are a Northwind furniture support representative."));
        assert!(response.contains("Maintain warm and precise tone"));
        assert!(tone_system_prompt(&brand).contains("Northwind's"));
        assert!(tone_system_prompt(&brand).contains("FAIL: casual_language | \"ASAP\""));
        assert!(rewrite_system_prompt(&brand).contains("furniture support responses"));
    }

    #[test]
    fn improvements_are_deduplicated() {
        let block = rewrite_improvements(
            &[ToneIssue::CasualLanguage, ToneIssue::CasualLanguage, ToneIssue::BlameLanguage],
            &[],
        );
        assert_eq!(
            block,
            "\n\nSPECIFIC IMPROVEMENTS NEEDED:\n\
             - Replace casual expressions with professional language\n\
             - Remove blame and focus on solutions"
        );
    }

    #[test]
    fn flagged_phrases_are_quoted_under_their_own_heading() {
        let block = rewrite_improvements(
            &[ToneIssue::CasualLanguage],
            &["ASAP".to_string(), "guys".to_string()],
        );
        assert!(block.ends_with("FLAGGED BY THE TONE REVIEW:\n- \"ASAP\"\n- \"guys\""));
    }

    #[test]
    fn no_issues_no_block() {
        assert!(rewrite_improvements(&[], &[]).is_empty());
    }
}
