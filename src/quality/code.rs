//! Code-result scoring dimensions: syntactic validity, structural
//! soundness, documentation density, surface security. None of these
//! dimensions run a real parser — the dependency stack here carries no
//! per-language grammar — so each is a textual proxy, in the same
//! pattern-matching idiom as the input/output validators in
//! [`crate::guardrails`].

use super::types::QualityAssessment;

const DANGEROUS_CALLS: &[&str] = &["eval(", "exec(", "os.system(", "subprocess.call", "unsafe {", "rm -rf"];

fn balanced(text: &str) -> bool {
    let mut stack = Vec::new();
    for c in text.chars() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

fn syntactic_validity(text: &str) -> f64 {
    if balanced(text) {
        1.0
    } else {
        0.0
    }
}

fn structural_soundness(text: &str) -> f64 {
    let lower = text.to_ascii_lowercase();
    let has_error_handling = ["result<", "try {", "except", "catch", ".unwrap_or", "?;"]
        .iter()
        .any(|m| lower.contains(m));
    let bare_unwraps = lower.matches(".unwrap()").count();
    let score = if has_error_handling { 0.7 } else { 0.3 };
    (score - 0.1 * bare_unwraps.min(3) as f64).max(0.0)
}

fn documentation_density(text: &str) -> f64 {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return 0.0;
    }
    let commented = lines
        .iter()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with("//") || t.starts_with('#') || t.starts_with("/*") || t.starts_with('*')
        })
        .count();
    ((commented as f64 / lines.len() as f64) * 4.0).min(1.0)
}

fn surface_security(text: &str) -> f64 {
    let hits = DANGEROUS_CALLS.iter().filter(|m| text.contains(**m)).count();
    (1.0 - 0.34 * hits as f64).max(0.0)
}

pub fn score_code(text: &str) -> QualityAssessment {
    let validity = syntactic_validity(text);
    let structure = structural_soundness(text);
    let docs = documentation_density(text);
    let security = surface_security(text);

    let mut recommendations = Vec::new();
    if validity < 1.0 {
        recommendations.push("unbalanced brackets/braces suggest truncated or malformed code".to_string());
    }
    if structure < 0.5 {
        recommendations.push("add explicit error handling instead of unchecked unwraps".to_string());
    }
    if docs < 0.1 {
        recommendations.push("document non-obvious logic with inline comments".to_string());
    }
    if security < 1.0 {
        recommendations.push("review use of dangerous calls (eval/exec/system/unsafe)".to_string());
    }

    QualityAssessment::new(
        "code",
        vec![
            ("syntactic_validity", validity),
            ("structural_soundness", structure),
            ("documentation_density", docs),
            ("surface_security", security),
        ],
        recommendations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_documented_code_scores_high() {
        let code = "fn add(a: i32, b: i32) -> Result<i32, String> {\n  // sums two numbers\n  Ok(a + b)\n}\n";
        let assessment = score_code(code);
        assert_eq!(assessment.metrics["syntactic_validity"], 1.0);
        assert!(assessment.overall_score > 0.5);
    }

    #[test]
    fn unbalanced_code_flags_validity() {
        let code = "fn broken( {\n  let x = (1 + 2;\n";
        let assessment = score_code(code);
        assert_eq!(assessment.metrics["syntactic_validity"], 0.0);
        assert!(!assessment.recommendations.is_empty());
    }

    #[test]
    fn dangerous_calls_reduce_security_score() {
        let code = "def run(cmd):\n    os.system(cmd)\n    eval(cmd)\n";
        let assessment = score_code(code);
        assert!(assessment.metrics["surface_security"] < 1.0);
    }
}
