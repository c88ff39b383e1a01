//! Quality Controller (C9): post-hoc scoring of task outputs with metrics
//! and remediation recommendations.

mod code;
mod completion;
mod controller;
mod text;
mod types;

pub use controller::QualityController;
pub use types::QualityAssessment;
