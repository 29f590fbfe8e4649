//! Error types for rule compilation and evaluation.

use std::fmt;

use thiserror::Error;

/// A single rule that failed to compile.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// The rule is not valid expression syntax.
    #[error("{location}: failed compiling {rule:?}: {reason}")]
    Syntax {
        /// Where the rule lives in the filter (e.g. `remove[1]`).
        location: String,
        /// The rule source.
        rule: String,
        /// Parser message.
        reason: String,
    },

    /// The rule references a field the torrent schema does not define.
    #[error("{location}: unknown field '{field}' in {rule:?}\n  Suggestion: {suggestion}")]
    UnknownField {
        /// Where the rule lives in the filter.
        location: String,
        /// The rule source.
        rule: String,
        /// The unknown identifier.
        field: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The rule does not produce a boolean, or combines fields of the wrong type.
    #[error("{location}: rule {rule:?} is not a valid boolean predicate: {reason}")]
    InvalidPredicate {
        /// Where the rule lives in the filter.
        location: String,
        /// The rule source.
        rule: String,
        /// Type checker message.
        reason: String,
    },

    /// A label or tag rule was declared without any predicate.
    #[error("{location}: rule '{name}' has no predicates")]
    EmptyRule {
        /// Where the rule lives in the filter.
        location: String,
        /// Rule name.
        name: String,
    },
}

impl CompileError {
    /// Creates a `Syntax` error.
    #[must_use]
    pub fn syntax(location: &str, rule: &str, reason: impl fmt::Display) -> Self {
        Self::Syntax {
            location: location.to_string(),
            rule: rule.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `UnknownField` error.
    #[must_use]
    pub fn unknown_field(location: &str, rule: &str, field: &str) -> Self {
        Self::UnknownField {
            location: location.to_string(),
            rule: rule.to_string(),
            field: field.to_string(),
            suggestion: "Field names are camelCase, e.g. ratio, seedingDays, freeSpaceGB"
                .to_string(),
        }
    }

    /// Creates an `InvalidPredicate` error.
    #[must_use]
    pub fn invalid_predicate(location: &str, rule: &str, reason: impl fmt::Display) -> Self {
        Self::InvalidPredicate {
            location: location.to_string(),
            rule: rule.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `EmptyRule` error.
    #[must_use]
    pub fn empty_rule(location: &str, name: &str) -> Self {
        Self::EmptyRule {
            location: location.to_string(),
            name: name.to_string(),
        }
    }
}

/// Every compile error found in one filter.
#[derive(Debug, Clone, Default)]
pub struct CompileErrors {
    errors: Vec<CompileError>,
}

impl CompileErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns the collected errors in rule order.
    #[must_use]
    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rule(s) failed to compile", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

/// A compiled rule failed while evaluating a specific torrent.
#[derive(Debug, Clone, Error)]
#[error("failed evaluating {rule:?} for torrent {hash}: {reason}")]
pub struct EvaluationError {
    /// The rule source.
    pub rule: String,
    /// Hash of the torrent being evaluated.
    pub hash: String,
    /// Evaluator message.
    pub reason: String,
}

impl EvaluationError {
    #[must_use]
    pub fn new(rule: &str, hash: &str, reason: impl fmt::Display) -> Self {
        Self {
            rule: rule.to_string(),
            hash: hash.to_string(),
            reason: reason.to_string(),
        }
    }
}
