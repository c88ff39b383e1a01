//! Completion-result scoring dimensions: completeness, accuracy proxy,
//! specificity, actionability.

use super::types::QualityAssessment;

const HEDGING_MARKERS: &[&str] = &["i think", "maybe", "perhaps", "possibly", "not sure", "i guess"];
const IMPERATIVE_HINTS: &[&str] = &["run", "install", "set", "configure", "add", "remove", "update", "restart"];

fn completeness(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    let has_ending = text.trim_end().ends_with(['.', '!', '?']) || text.trim_end().ends_with(['"', '`']);
    let length_score = (words as f64 / 40.0).min(1.0);
    if has_ending {
        length_score
    } else {
        (length_score - 0.2).max(0.0)
    }
}

fn accuracy_proxy(text: &str) -> f64 {
    let lower = text.to_ascii_lowercase();
    let hits = HEDGING_MARKERS.iter().filter(|m| lower.contains(**m)).count();
    (1.0 - 0.25 * hits as f64).max(0.0)
}

fn specificity(text: &str) -> f64 {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let concrete = tokens
        .iter()
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()) || t.chars().next().is_some_and(char::is_uppercase))
        .count();
    (concrete as f64 / tokens.len() as f64 * 3.0).min(1.0)
}

fn actionability(text: &str) -> f64 {
    let lower = text.to_ascii_lowercase();
    let numbered_steps = lower.lines().filter(|l| l.trim_start().starts_with(|c: char| c.is_ascii_digit())).count();
    let imperative_hits = IMPERATIVE_HINTS.iter().filter(|m| lower.contains(**m)).count();
    ((numbered_steps as f64 * 0.2) + (imperative_hits as f64 * 0.15)).min(1.0)
}

pub fn score_completion(text: &str) -> QualityAssessment {
    let completeness = completeness(text);
    let accuracy = accuracy_proxy(text);
    let specificity = specificity(text);
    let actionability = actionability(text);

    let mut recommendations = Vec::new();
    if completeness < 0.5 {
        recommendations.push("response appears truncated or too short for the task".to_string());
    }
    if accuracy < 0.75 {
        recommendations.push("replace hedging language with a direct answer".to_string());
    }
    if specificity < 0.2 {
        recommendations.push("add concrete names, numbers, or identifiers".to_string());
    }
    if actionability < 0.2 {
        recommendations.push("spell out the steps the user should take next".to_string());
    }

    QualityAssessment::new(
        "completion",
        vec![
            ("completeness", completeness),
            ("accuracy_proxy", accuracy),
            ("specificity", specificity),
            ("actionability", actionability),
        ],
        recommendations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hedging_language_lowers_accuracy_proxy() {
        let assessment = score_completion("I think maybe this is possibly the right answer.");
        assert!(assessment.metrics["accuracy_proxy"] < 1.0);
    }

    #[test]
    fn numbered_steps_raise_actionability() {
        let text = "1. Install the package.\n2. Run the migration.\n3. Restart the service.";
        let assessment = score_completion(text);
        assert!(assessment.metrics["actionability"] > 0.0);
    }
}
