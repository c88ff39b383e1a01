//! Shared types for the Guardrail Pipeline (C4): findings from each stage
//! roll up into a single Safety Assessment per §4.4.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Redact,
    Block,
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub stage: &'static str,
    pub category: String,
    pub severity: Severity,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetyAssessment {
    pub action: Action,
    pub risk_score: f64,
    pub findings: Vec<Finding>,
    /// The content to use in place of the input, present when `action = redact`.
    pub sanitized: Option<String>,
}

impl SafetyAssessment {
    pub fn allow(content: &str) -> Self {
        SafetyAssessment {
            action: Action::Allow,
            risk_score: 0.0,
            findings: Vec::new(),
            sanitized: Some(content.to_string()),
        }
    }

    /// Aggregates findings into an action and a 0.0-1.0 risk score per the
    /// §4.4 rule: block on any critical finding, redact on any high finding
    /// when the content is non-executable, else allow.
    pub fn from_findings(findings: Vec<Finding>, sanitized: Option<String>, executable: bool) -> Self {
        let max_severity = findings.iter().map(|f| f.severity).max();
        let action = match max_severity {
            Some(Severity::Critical) => Action::Block,
            Some(Severity::High) if !executable => Action::Redact,
            Some(Severity::High) => Action::Block,
            _ => Action::Allow,
        };
        let risk_score = match max_severity {
            None => 0.0,
            Some(Severity::Low) => 0.25,
            Some(Severity::Medium) => 0.5,
            Some(Severity::High) => 0.75,
            Some(Severity::Critical) => 1.0,
        };
        SafetyAssessment {
            action,
            risk_score,
            findings,
            sanitized,
        }
    }
}
