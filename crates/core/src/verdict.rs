//! Typed stage verdicts: what the safety and tone checks concluded.

use serde::{Deserialize, Serialize};

/// Safety taxonomy used by the guard stage.
///
/// `O1`..`O7` are the codes the classifier is asked to answer with; the
/// remaining variants cover replies that name no code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    ViolenceHate,
    SexualContent,
    Weapons,
    Substances,
    SelfHarm,
    CriminalPlanning,
    ProfessionalStandards,
    /// Classifier said UNSAFE without naming a code.
    ContentViolation,
    /// Classifier hedged with a cautionary keyword.
    PotentialViolation,
    /// The reply could not be read; treated as unsafe.
    UnparseableVerdict,
}

impl SafetyCategory {
    /// The coded categories, in taxonomy order.
    pub const CODED: [SafetyCategory; 7] = [
        SafetyCategory::ViolenceHate,
        SafetyCategory::SexualContent,
        SafetyCategory::Weapons,
        SafetyCategory::Substances,
        SafetyCategory::SelfHarm,
        SafetyCategory::CriminalPlanning,
        SafetyCategory::ProfessionalStandards,
    ];

    /// Taxonomy code (`O1`..`O7`) for coded categories.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::ViolenceHate => Some("O1"),
            Self::SexualContent => Some("O2"),
            Self::Weapons => Some("O3"),
            Self::Substances => Some("O4"),
            Self::SelfHarm => Some("O5"),
            Self::CriminalPlanning => Some("O6"),
            Self::ProfessionalStandards => Some("O7"),
            Self::ContentViolation | Self::PotentialViolation | Self::UnparseableVerdict => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ViolenceHate => "violence_hate",
            Self::SexualContent => "sexual_content",
            Self::Weapons => "weapons",
            Self::Substances => "substances",
            Self::SelfHarm => "self_harm",
            Self::CriminalPlanning => "criminal_planning",
            Self::ProfessionalStandards => "professional_standards",
            Self::ContentViolation => "content_violation",
            Self::PotentialViolation => "potential_violation",
            Self::UnparseableVerdict => "unparseable_verdict",
        }
    }
}

impl std::fmt::Display for SafetyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one guard stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyResult {
    pub passed: bool,

    /// Empty when `passed`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<SafetyCategory>,

    /// Raw classifier verdict, kept for the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl SafetyResult {
    pub fn safe() -> Self {
        Self {
            passed: true,
            categories: Vec::new(),
            explanation: None,
        }
    }

    pub fn flagged(categories: Vec<SafetyCategory>) -> Self {
        Self {
            passed: false,
            categories,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Primary category of a failed check.
    pub fn category(&self) -> Option<SafetyCategory> {
        self.categories.first().copied()
    }

    pub fn labels(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.label().to_string()).collect()
    }

    /// One-line summary for stage records: `SAFE` or `UNSAFE: a, b`.
    pub fn summary(&self) -> String {
        if self.passed {
            "SAFE".into()
        } else {
            format!("UNSAFE: {}", self.labels().join(", "))
        }
    }
}

/// Tone problems the tone stage can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneIssue {
    CasualLanguage,
    DismissiveLanguage,
    UnprofessionalTone,
    TechnicalJargon,
    BlameLanguage,
    AbsoluteStatements,
    InappropriateLanguage,
    InappropriateUrgency,
    InappropriateEmotions,
    /// FAIL without a recognisable issue keyword.
    ToneViolation,
}

impl ToneIssue {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CasualLanguage => "casual_language",
            Self::DismissiveLanguage => "dismissive_language",
            Self::UnprofessionalTone => "unprofessional_tone",
            Self::TechnicalJargon => "technical_jargon",
            Self::BlameLanguage => "blame_language",
            Self::AbsoluteStatements => "absolute_statements",
            Self::InappropriateLanguage => "inappropriate_language",
            Self::InappropriateUrgency => "inappropriate_urgency",
            Self::InappropriateEmotions => "inappropriate_emotions",
            Self::ToneViolation => "tone_violation",
        }
    }

    /// Instruction handed to the rewrite stage for this issue.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::CasualLanguage => "Replace casual expressions with professional language",
            Self::DismissiveLanguage => "Make language more helpful and solution-focused",
            Self::UnprofessionalTone => "Use more empathetic and professional tone",
            Self::TechnicalJargon => "Simplify technical terms for customer understanding",
            Self::BlameLanguage => "Remove blame and focus on solutions",
            Self::AbsoluteStatements => "Soften absolute statements and provide alternatives",
            Self::InappropriateLanguage => "Remove colloquial or inappropriate expressions",
            Self::InappropriateUrgency => "Replace urgent slang with professional alternatives",
            Self::InappropriateEmotions => "Maintain professional emotional tone",
            Self::ToneViolation => "Improve overall professionalism",
        }
    }
}

impl std::fmt::Display for ToneIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of the tone stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneResult {
    pub passed: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ToneIssue>,

    /// Offending phrases quoted by the validator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged_phrases: Vec<String>,
}

impl ToneResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
            flagged_phrases: Vec::new(),
        }
    }

    pub fn fail(issues: Vec<ToneIssue>, flagged_phrases: Vec<String>) -> Self {
        Self {
            passed: false,
            issues,
            flagged_phrases,
        }
    }

    pub fn summary(&self) -> String {
        if self.passed {
            "PASS".into()
        } else {
            let labels: Vec<&str> = self.issues.iter().map(|i| i.label()).collect();
            format!("FAIL: {}", labels.join(", "))
        }
    }
}
