//! Output validator: scans generated text for disallowed categories per
//! §4.4 stage 2. Severity is critical for self-harm instructions always,
//! and for malware payloads unless the agent holds the `security`
//! capability (in which case it drops to a redact-level finding so the
//! result still shows up in the audit trail).

use super::types::{Finding, Severity};

const SELF_HARM_PATTERNS: &[&str] = &[
    "how to commit suicide",
    "how to self-harm",
    "ways to hurt yourself",
];

const MALWARE_PATTERNS: &[&str] = &[
    "here is a working ransomware",
    "here is a keylogger you can compile",
    "here is a botnet payload",
];

pub fn validate_output(text: &str, agent_capabilities: &[String]) -> Vec<Finding> {
    let lower = text.to_ascii_lowercase();
    let mut findings = Vec::new();

    for pattern in SELF_HARM_PATTERNS {
        if lower.contains(pattern) {
            findings.push(Finding {
                stage: "output",
                category: "self_harm".into(),
                severity: Severity::Critical,
                detail: format!("matched pattern: {pattern}"),
            });
        }
    }

    let has_security_capability = agent_capabilities.iter().any(|c| c == "security");
    for pattern in MALWARE_PATTERNS {
        if lower.contains(pattern) {
            findings.push(Finding {
                stage: "output",
                category: "malware".into(),
                severity: if has_security_capability {
                    Severity::Medium
                } else {
                    Severity::Critical
                },
                detail: format!("matched pattern: {pattern}"),
            });
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_harm_is_always_critical() {
        let findings = validate_output("here is how to commit suicide safely", &["security".into()]);
        assert!(findings.iter().any(|f| f.severity == Severity::Critical));
    }

    #[test]
    fn malware_blocked_without_security_capability() {
        let findings = validate_output("here is a working ransomware for windows", &[]);
        assert!(findings.iter().any(|f| f.severity == Severity::Critical));
    }

    #[test]
    fn malware_allowed_with_security_capability() {
        let findings = validate_output("here is a working ransomware for windows", &["security".into()]);
        assert!(findings.iter().all(|f| f.severity != Severity::Critical));
    }

    #[test]
    fn clean_output_has_no_findings() {
        assert!(validate_output("the weather today is sunny", &[]).is_empty());
    }
}
