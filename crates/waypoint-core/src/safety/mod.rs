//! Command safety: risk classification and pre-execution syntax checks.

pub mod classifier;
pub mod syntax;

pub use classifier::{
    classify, Classification, CommandClassifier, CommandTables, RiskCategory, RiskLevel,
};
pub use syntax::validate_syntax;
