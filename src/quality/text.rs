//! Text-result scoring dimensions: clarity, relevance, tone,
//! completeness.

use std::collections::HashSet;

use super::types::QualityAssessment;

const FLAGGED_WORDS: &[&str] = &["stupid", "idiot", "shut up", "worthless"];
const TARGET_SENTENCE_WORDS: (f64, f64) = (8.0, 25.0);

fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn clarity(text: &str) -> f64 {
    let sents = sentences(text);
    if sents.is_empty() {
        return 0.0;
    }
    let (lo, hi) = TARGET_SENTENCE_WORDS;
    let in_band = sents
        .iter()
        .filter(|s| {
            let words = s.split_whitespace().count() as f64;
            words >= lo && words <= hi
        })
        .count();
    in_band as f64 / sents.len() as f64
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_ascii_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect()
}

fn relevance(text: &str, task_description: &str) -> f64 {
    let task_words = word_set(task_description);
    if task_words.is_empty() {
        return 1.0;
    }
    let text_words = word_set(text);
    let overlap = task_words.intersection(&text_words).count();
    (overlap as f64 / task_words.len() as f64).min(1.0)
}

fn tone(text: &str) -> f64 {
    let lower = text.to_ascii_lowercase();
    let hits = FLAGGED_WORDS.iter().filter(|w| lower.contains(**w)).count();
    (1.0 - 0.5 * hits as f64).max(0.0)
}

fn completeness(text: &str, task_description: &str) -> f64 {
    let questions: Vec<&str> = task_description.split('?').filter(|q| !q.trim().is_empty()).collect();
    if questions.len() <= 1 {
        return if text.trim().is_empty() { 0.0 } else { 1.0 };
    }
    let answered = questions
        .iter()
        .filter(|q| {
            let key_words = word_set(q);
            let text_words = word_set(text);
            key_words.intersection(&text_words).count() > 0
        })
        .count();
    answered as f64 / questions.len() as f64
}

pub fn score_text(text: &str, task_description: &str) -> QualityAssessment {
    let clarity = clarity(text);
    let relevance = relevance(text, task_description);
    let tone = tone(text);
    let completeness = completeness(text, task_description);

    let mut recommendations = Vec::new();
    if clarity < 0.5 {
        recommendations.push("break up very long or very short sentences".to_string());
    }
    if relevance < 0.3 {
        recommendations.push("response drifts from the task description's vocabulary".to_string());
    }
    if tone < 1.0 {
        recommendations.push("remove dismissive or hostile language".to_string());
    }
    if completeness < 0.8 {
        recommendations.push("address every sub-question the task description asks".to_string());
    }

    QualityAssessment::new(
        "text",
        vec![
            ("clarity", clarity),
            ("relevance", relevance),
            ("tone", tone),
            ("completeness", completeness),
        ],
        recommendations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_topic_clean_response_scores_well() {
        let description = "Summarize the quarterly revenue report for the finance team.";
        let text = "Here is a summary of the quarterly revenue report requested by the finance team. Revenue grew steadily across every region this quarter.";
        let assessment = score_text(text, description);
        assert!(assessment.metrics["relevance"] > 0.3);
        assert_eq!(assessment.metrics["tone"], 1.0);
    }

    #[test]
    fn hostile_language_lowers_tone() {
        let assessment = score_text("That is a stupid question.", "answer the question");
        assert!(assessment.metrics["tone"] < 1.0);
    }

    #[test]
    fn unanswered_subquestions_lower_completeness() {
        let description = "What is the capital of France? What is the capital of Germany?";
        let text = "The capital of France is Paris.";
        let assessment = score_text(text, description);
        assert!(assessment.metrics["completeness"] < 1.0);
    }
}
