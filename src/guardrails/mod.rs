//! Guardrail Pipeline (C4): input/output validation and safety scoring
//! wrapping every agent step. See [`pipeline::GuardrailPipeline`].

mod input;
mod output;
mod pipeline;
mod types;

pub use pipeline::GuardrailPipeline;
pub use types::{Action, Finding, SafetyAssessment, Severity};
