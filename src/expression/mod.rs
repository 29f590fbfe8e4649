//! Rule compilation for torrent filters.
//!
//! Rules are plain strings in the `evalexpr` language evaluated over the
//! torrent schema in [`RecordShape`]. A filter's rules are compiled once into an
//! [`ExpressionSet`] and then evaluated cheaply for every torrent of every
//! client that uses the filter.
//!
//! # Example
//!
//! ```
//! use curator_core::expression::{RecordContext, RecordShape, compile};
//! use curator_core::ledger::FreeSpaceLedger;
//! use curator_core::torrent::TorrentRecord;
//!
//! let predicate = compile("ratio > 2.0 && isSeeding", &RecordShape::torrent()).unwrap();
//! let mut record = TorrentRecord::new("abc", "Some.Release");
//! record.ratio = 3.1;
//! record.is_seeding = true;
//!
//! let ledger = FreeSpaceLedger::unset();
//! let ctx = RecordContext::build(&record, ledger.view()).unwrap();
//! assert!(predicate.evaluate(&ctx).unwrap());
//! ```

mod context;
mod error;

pub use context::{FREE_SPACE_FIELDS, RecordContext, RecordShape};
pub use error::{CompileError, CompileErrors, EvaluationError};

use evalexpr::{Context, EvalexprError, Node, Operator, build_operator_tree};
use serde::Deserialize;

use crate::config::FilterConfig;

/// Policy for a tag rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    /// Only ever adds the tag.
    Add,
    /// Only ever removes the tag.
    Remove,
    /// Keeps the tag in sync with the rule.
    Full,
}

impl TagMode {
    #[must_use]
    pub fn may_add(self) -> bool {
        matches!(self, Self::Add | Self::Full)
    }

    #[must_use]
    pub fn may_remove(self) -> bool {
        matches!(self, Self::Remove | Self::Full)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Full => "full",
        }
    }
}

/// A compiled, side-effect-free boolean rule.
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    node: Node,
}

impl Predicate {
    /// The rule text this predicate was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if the rule reads `field`.
    #[must_use]
    pub fn references(&self, field: &str) -> bool {
        self.node.iter_variable_identifiers().any(|name| name == field)
    }

    /// Evaluates the rule against one torrent.
    ///
    /// `&&` and `||` short-circuit, so `peers > 0 && seeds / peers > 1` is
    /// false rather than an error when `peers` is zero.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] if evaluation fails for this torrent's values.
    pub fn evaluate(&self, ctx: &RecordContext) -> Result<bool, EvaluationError> {
        eval_lazy(&self.node, ctx.variables())
            .map_err(|error| EvaluationError::new(&self.source, ctx.hash(), error))
    }
}

/// Boolean evaluation with left-to-right short-circuiting of `&&` and `||`.
fn eval_lazy<C: Context>(node: &Node, ctx: &C) -> Result<bool, EvalexprError> {
    match (node.operator(), node.children()) {
        (Operator::RootNode, [inner]) => eval_lazy(inner, ctx),
        (Operator::Not, [inner]) => Ok(!eval_lazy(inner, ctx)?),
        (Operator::And, [left, right]) => Ok(eval_lazy(left, ctx)? && eval_lazy(right, ctx)?),
        (Operator::Or, [left, right]) => Ok(eval_lazy(left, ctx)? || eval_lazy(right, ctx)?),
        _ => node.eval_boolean_with_context(ctx),
    }
}

/// Compiles one rule against `shape`.
///
/// # Errors
///
/// Returns [`CompileError`] on syntax errors, unknown fields, or a non-boolean result.
pub fn compile(source: &str, shape: &RecordShape) -> Result<Predicate, CompileError> {
    compile_at("rule", source, shape)
}

fn compile_at(location: &str, source: &str, shape: &RecordShape) -> Result<Predicate, CompileError> {
    let node = build_operator_tree(source)
        .map_err(|error| CompileError::syntax(location, source, error))?;

    if let Some(field) = node
        .iter_variable_identifiers()
        .find(|name| !shape.contains(name))
    {
        return Err(CompileError::unknown_field(location, source, field));
    }

    let sample = RecordContext::sample()
        .map_err(|error| CompileError::invalid_predicate(location, source, error))?;
    match node.eval_boolean_with_context(sample.variables()) {
        Ok(_) => {}
        Err(error) if is_value_dependent(&error) => {}
        Err(error) => return Err(CompileError::invalid_predicate(location, source, error)),
    }

    Ok(Predicate {
        source: source.to_string(),
        node,
    })
}

/// Arithmetic failures that depend on record values rather than on rule types.
fn is_value_dependent(error: &EvalexprError) -> bool {
    matches!(
        error,
        EvalexprError::AdditionError { .. }
            | EvalexprError::SubtractionError { .. }
            | EvalexprError::NegationError { .. }
            | EvalexprError::MultiplicationError { .. }
            | EvalexprError::DivisionError { .. }
            | EvalexprError::ModulationError { .. }
    )
}

/// A named label rule; all predicates must hold.
#[derive(Debug, Clone)]
pub struct LabelRule {
    pub name: String,
    pub predicates: Vec<Predicate>,
}

/// A named tag rule; all predicates must hold.
#[derive(Debug, Clone)]
pub struct TagRule {
    pub name: String,
    pub mode: TagMode,
    pub predicates: Vec<Predicate>,
}

/// Compiled rules of one filter.
#[derive(Debug, Clone, Default)]
pub struct ExpressionSet {
    pub ignores: Vec<Predicate>,
    pub removes: Vec<Predicate>,
    pub labels: Vec<LabelRule>,
    pub tags: Vec<TagRule>,
}

impl ExpressionSet {
    /// Compiles every rule of `filter`, collecting all errors.
    ///
    /// # Errors
    ///
    /// Returns [`CompileErrors`] listing every rule that failed.
    pub fn compile(filter: &FilterConfig) -> Result<Self, CompileErrors> {
        let shape = RecordShape::torrent();
        let mut errors = CompileErrors::new();
        let mut set = Self::default();

        set.ignores = compile_list("ignore", &filter.ignore, &shape, &mut errors);
        set.removes = compile_list("remove", &filter.remove, &shape, &mut errors);

        for (index, rule) in filter.label.iter().enumerate() {
            let location = format!("label[{index}] '{}'", rule.name);
            if rule.predicates.is_empty() {
                errors.push(CompileError::empty_rule(&location, &rule.name));
                continue;
            }
            set.labels.push(LabelRule {
                name: rule.name.clone(),
                predicates: compile_list(&location, &rule.predicates, &shape, &mut errors),
            });
        }

        for (index, rule) in filter.tag.iter().enumerate() {
            let location = format!("tag[{index}] '{}'", rule.name);
            if rule.predicates.is_empty() {
                errors.push(CompileError::empty_rule(&location, &rule.name));
                continue;
            }
            set.tags.push(TagRule {
                name: rule.name.clone(),
                mode: rule.mode,
                predicates: compile_list(&location, &rule.predicates, &shape, &mut errors),
            });
        }

        if errors.is_empty() { Ok(set) } else { Err(errors) }
    }

    /// Returns true if any rule reads the free-space ledger.
    #[must_use]
    pub fn references_free_space(&self) -> bool {
        self.predicates()
            .any(|predicate| FREE_SPACE_FIELDS.iter().any(|field| predicate.references(field)))
    }

    /// Total number of compiled predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.ignores
            .iter()
            .chain(&self.removes)
            .chain(self.labels.iter().flat_map(|rule| &rule.predicates))
            .chain(self.tags.iter().flat_map(|rule| &rule.predicates))
    }
}

fn compile_list(
    prefix: &str,
    sources: &[String],
    shape: &RecordShape,
    errors: &mut CompileErrors,
) -> Vec<Predicate> {
    let mut compiled = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        match compile_at(&format!("{prefix}[{index}]"), source, shape) {
            Ok(predicate) => compiled.push(predicate),
            Err(error) => errors.push(error),
        }
    }
    compiled
}
