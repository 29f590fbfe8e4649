//! Per-torrent decisions.
//!
//! [`decide`] resolves a filter's compiled rules into one [`Decision`] for one
//! torrent:
//!
//! 1. any ignore rule matching short-circuits everything else;
//! 2. any remove rule matching marks the torrent for removal;
//! 3. the first label rule whose predicates all hold picks the new label;
//! 4. every tag rule independently adds or removes its tag according to its mode.
//!
//! Removal and relabel/retag are computed independently. The coordinator is
//! responsible for letting removal win.

use std::collections::BTreeSet;

use tracing::trace;

use crate::expression::{EvaluationError, ExpressionSet, Predicate, RecordContext};
use crate::ledger::FreeSpaceView;
use crate::torrent::TorrentRecord;

/// Outcome of evaluating a filter against one torrent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    pub should_ignore: bool,
    pub should_remove: bool,
    /// Label chosen by the first matching label rule, if any.
    pub new_label: Option<String>,
    pub tags_to_add: BTreeSet<String>,
    pub tags_to_remove: BTreeSet<String>,
}

impl Decision {
    /// A decision that ignores the torrent.
    #[must_use]
    pub fn ignored() -> Self {
        Self {
            should_ignore: true,
            ..Self::default()
        }
    }

    /// Returns the label to apply, or `None` when no rule fired or the label is unchanged.
    #[must_use]
    pub fn relabel_target(&self, current_label: &str) -> Option<&str> {
        self.new_label
            .as_deref()
            .filter(|label| *label != current_label)
    }

    #[must_use]
    pub fn has_tag_changes(&self) -> bool {
        !self.tags_to_add.is_empty() || !self.tags_to_remove.is_empty()
    }

    /// Applies the tag add/remove sets to `current`.
    ///
    /// Idempotent: applying the result again yields the same set.
    #[must_use]
    pub fn apply_tags(&self, current: &BTreeSet<String>) -> BTreeSet<String> {
        current
            .iter()
            .filter(|tag| !self.tags_to_remove.contains(*tag))
            .chain(&self.tags_to_add)
            .cloned()
            .collect()
    }
}

/// Evaluates `expressions` against `record`.
///
/// # Errors
///
/// Returns the first [`EvaluationError`]; the caller must treat the torrent as
/// "no action" for this run rather than as a match.
pub fn decide(
    record: &TorrentRecord,
    expressions: &ExpressionSet,
    free_space: FreeSpaceView<'_>,
) -> Result<Decision, EvaluationError> {
    let ctx = RecordContext::build(record, free_space)?;

    if any_match(&expressions.ignores, &ctx)? {
        trace!(hash = %record.hash, "ignore rule matched");
        return Ok(Decision::ignored());
    }

    let mut decision = Decision {
        should_remove: any_match(&expressions.removes, &ctx)?,
        ..Decision::default()
    };

    for rule in &expressions.labels {
        if all_match(&rule.predicates, &ctx)? {
            decision.new_label = Some(rule.name.clone());
            break;
        }
    }

    for rule in &expressions.tags {
        let matched = all_match(&rule.predicates, &ctx)?;
        let present = record.has_tag(&rule.name);
        if present && !matched && rule.mode.may_remove() {
            decision.tags_to_remove.insert(rule.name.clone());
        } else if !present && matched && rule.mode.may_add() {
            decision.tags_to_add.insert(rule.name.clone());
        }
    }

    Ok(decision)
}

fn any_match(predicates: &[Predicate], ctx: &RecordContext) -> Result<bool, EvaluationError> {
    for predicate in predicates {
        if predicate.evaluate(ctx)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn all_match(predicates: &[Predicate], ctx: &RecordContext) -> Result<bool, EvaluationError> {
    for predicate in predicates {
        if !predicate.evaluate(ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{FilterConfig, LabelRuleConfig, TagRuleConfig};
    use crate::expression::TagMode;
    use crate::ledger::FreeSpaceLedger;
    use crate::torrent::TorrentTiming;

    fn rules(sources: &[&str]) -> Vec<String> {
        sources.iter().map(ToString::to_string).collect()
    }

    fn label(name: &str, predicates: &[&str]) -> LabelRuleConfig {
        LabelRuleConfig {
            name: name.to_string(),
            predicates: rules(predicates),
        }
    }

    fn tag(name: &str, mode: TagMode, predicates: &[&str]) -> TagRuleConfig {
        TagRuleConfig {
            name: name.to_string(),
            mode,
            predicates: rules(predicates),
        }
    }

    fn movie() -> TorrentRecord {
        let mut record = TorrentRecord::new("abc", "Some.Movie.2020");
        record.ratio = 0.5;
        record.timing = TorrentTiming::new(20 * 86_400, 10 * 86_400);
        record.label = "movies".to_string();
        record
    }

    fn run(filter: &FilterConfig, record: &TorrentRecord) -> Result<Decision, EvaluationError> {
        let set = ExpressionSet::compile(filter).unwrap();
        let ledger = FreeSpaceLedger::unset();
        decide(record, &set, ledger.view())
    }

    #[test]
    fn test_scenario_label_without_removal() {
        let filter = FilterConfig {
            remove: rules(&["ratio > 2.0"]),
            label: vec![label("archive", &["seedingDays > 7"])],
            ..FilterConfig::default()
        };
        let decision = run(&filter, &movie()).unwrap();
        assert!(!decision.should_remove);
        assert_eq!(decision.new_label.as_deref(), Some("archive"));
        assert_eq!(decision.relabel_target("movies"), Some("archive"));
    }

    #[test]
    fn test_scenario_removal_still_computes_label() {
        let filter = FilterConfig {
            remove: rules(&["ratio < 1.0 && seedingDays > 5"]),
            label: vec![label("archive", &["seedingDays > 7"])],
            ..FilterConfig::default()
        };
        let decision = run(&filter, &movie()).unwrap();
        assert!(decision.should_remove);
        assert_eq!(decision.new_label.as_deref(), Some("archive"));
    }

    #[test]
    fn test_ignore_short_circuits_everything() {
        let filter = FilterConfig {
            ignore: rules(&["label == \"movies\""]),
            remove: rules(&["ratio < 1.0"]),
            label: vec![label("archive", &["seedingDays > 7"])],
            tag: vec![tag("old", TagMode::Full, &["addedDays > 1"])],
        };
        let decision = run(&filter, &movie()).unwrap();
        assert_eq!(decision, Decision::ignored());
    }

    #[test]
    fn test_ignore_short_circuit_skips_failing_rules() {
        let filter = FilterConfig {
            ignore: rules(&["true"]),
            remove: rules(&["seeds / peers > 1"]),
            ..FilterConfig::default()
        };
        let decision = run(&filter, &movie()).unwrap();
        assert!(decision.should_ignore);
    }

    #[test]
    fn test_first_matching_label_wins() {
        let filter = FilterConfig {
            label: vec![
                label("first", &["seedingDays > 1"]),
                label("second", &["seedingDays > 2"]),
            ],
            ..FilterConfig::default()
        };
        let decision = run(&filter, &movie()).unwrap();
        assert_eq!(decision.new_label.as_deref(), Some("first"));
    }

    #[test]
    fn test_label_rule_requires_all_predicates() {
        let filter = FilterConfig {
            label: vec![
                label("partial", &["seedingDays > 1", "ratio > 1"]),
                label("fallback", &["true"]),
            ],
            ..FilterConfig::default()
        };
        let decision = run(&filter, &movie()).unwrap();
        assert_eq!(decision.new_label.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_relabel_target_none_when_label_unchanged() {
        let filter = FilterConfig {
            label: vec![label("movies", &["true"])],
            ..FilterConfig::default()
        };
        let decision = run(&filter, &movie()).unwrap();
        assert_eq!(decision.new_label.as_deref(), Some("movies"));
        assert_eq!(decision.relabel_target("movies"), None);
    }

    #[test]
    fn test_full_tag_follows_predicate() {
        let filter = FilterConfig {
            tag: vec![tag("slow", TagMode::Full, &["seeds < 2"])],
            ..FilterConfig::default()
        };

        let mut record = movie();
        record.seeds = 0;
        let decision = run(&filter, &record).unwrap();
        assert!(decision.tags_to_add.contains("slow"));

        record.tags.insert("slow".to_string());
        record.seeds = 5;
        let decision = run(&filter, &record).unwrap();
        assert!(decision.tags_to_remove.contains("slow"));
        assert!(decision.tags_to_add.is_empty());
    }

    #[test]
    fn test_add_tag_never_removes() {
        let filter = FilterConfig {
            tag: vec![tag("slow", TagMode::Add, &["seeds < 2"])],
            ..FilterConfig::default()
        };
        let mut record = movie();
        record.tags.insert("slow".to_string());
        record.seeds = 5;
        let decision = run(&filter, &record).unwrap();
        assert!(!decision.has_tag_changes());
    }

    #[test]
    fn test_remove_tag_never_adds() {
        let filter = FilterConfig {
            tag: vec![tag("slow", TagMode::Remove, &["seeds < 2"])],
            ..FilterConfig::default()
        };
        let mut record = movie();
        record.seeds = 0;
        let decision = run(&filter, &record).unwrap();
        assert!(!decision.has_tag_changes());

        record.tags.insert("slow".to_string());
        record.seeds = 9;
        let decision = run(&filter, &record).unwrap();
        assert!(decision.tags_to_remove.contains("slow"));
    }

    #[test]
    fn test_multiple_tag_rules_fire_independently() {
        let filter = FilterConfig {
            tag: vec![
                tag("slow", TagMode::Full, &["seeds < 2"]),
                tag("lowratio", TagMode::Add, &["ratio < 1"]),
            ],
            ..FilterConfig::default()
        };
        let decision = run(&filter, &movie()).unwrap();
        assert_eq!(decision.tags_to_add.len(), 2);
    }

    #[test]
    fn test_apply_tags_is_idempotent() {
        let mut decision = Decision::default();
        decision.tags_to_add.insert("slow".to_string());
        decision.tags_to_remove.insert("fast".to_string());

        let current: BTreeSet<String> = ["fast", "keep"].into_iter().map(String::from).collect();
        let once = decision.apply_tags(&current);
        let twice = decision.apply_tags(&once);
        assert_eq!(once, twice);
        assert!(once.contains("slow") && once.contains("keep") && !once.contains("fast"));
    }

    #[test]
    fn test_evaluation_error_is_not_a_match() {
        let filter = FilterConfig {
            remove: rules(&["seeds / peers > 1"]),
            ..FilterConfig::default()
        };
        let err = run(&filter, &movie()).unwrap_err();
        assert_eq!(err.hash, "abc");
        assert_eq!(err.rule, "seeds / peers > 1");
    }

    #[test]
    fn test_guarded_division_is_not_an_error() {
        let filter = FilterConfig {
            remove: rules(&["peers > 0 && seeds / peers > 1"]),
            label: vec![label("swarmless", &["peers == 0 || seeds / peers < 1"])],
            ..FilterConfig::default()
        };
        let record = TorrentRecord::new("h", "n");

        let decision = run(&filter, &record).unwrap();
        assert!(!decision.should_remove);
        assert_eq!(decision.new_label.as_deref(), Some("swarmless"));
    }

    #[test]
    fn test_remove_rule_reads_free_space_view() {
        let filter = FilterConfig {
            remove: rules(&["freeSpaceSet && freeSpaceGB < 10"]),
            ..FilterConfig::default()
        };
        let set = ExpressionSet::compile(&filter).unwrap();

        let mut ledger = FreeSpaceLedger::from_bytes(5 * 1024 * 1024 * 1024);
        assert!(decide(&movie(), &set, ledger.view()).unwrap().should_remove);

        ledger.record_removal(10 * 1024 * 1024 * 1024);
        assert!(!decide(&movie(), &set, ledger.view()).unwrap().should_remove);

        let unset = FreeSpaceLedger::unset();
        assert!(!decide(&movie(), &set, unset.view()).unwrap().should_remove);
    }
}
