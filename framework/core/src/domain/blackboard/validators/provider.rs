// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Validator Provider
//!
//! Turns the rule list of one logical-type handler into a [`RuleSolver`] tree:
//!
//! 1. No rules gives `Null`, a single rule is built directly.
//! 2. Several rules are grouped by `(collection_group, validation_mode)` in
//!    first-seen order. A group of one is unwrapped, larger groups become a
//!    `Group` solver. The groups are combined under `All`.
//! 3. A hierarchy rule with children becomes a `Children` solver whose
//!    children go through step 2 recursively.
//!
//! Handler settings (`Order`, `Storage`, `RemainOnSealed`) have no validator
//! and are reported as unsupported.

use regex::Regex;

use crate::domain::blackboard::rules::{compile_match_regex, LogicalTypeRule, RuleError, ValidationMode};

use super::{
    ChildrenSolver, DataTypeValidator, GroupSolver, MaxRecordValidator, NumberRangeValidator, RegexValidator,
    RuleSolver, UniqueValidator,
};

/// Builds validator trees from declarative rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorProvider;

type GroupKey = (String, ValidationMode);

impl ValidatorProvider {
    pub fn new() -> Self {
        Self
    }

    /// `handler_pattern` is the compiled pattern of the owning handler; limit
    /// rules count the records it matches.
    pub fn create(&self, handler_pattern: &Regex, rules: &[LogicalTypeRule]) -> Result<RuleSolver, RuleError> {
        match rules {
            [] => Ok(RuleSolver::Null),
            [single] => self.build(handler_pattern, single),
            _ => Ok(RuleSolver::Group(GroupSolver::new(
                ValidationMode::All,
                String::new(),
                self.build_all(handler_pattern, rules)?,
            ))),
        }
    }

    fn build_all(&self, handler_pattern: &Regex, rules: &[LogicalTypeRule]) -> Result<Vec<RuleSolver>, RuleError> {
        let mut groups: Vec<(GroupKey, Vec<&LogicalTypeRule>)> = Vec::new();

        for rule in rules {
            let key = group_key(rule);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(rule),
                None => groups.push((key, vec![rule])),
            }
        }

        groups
            .into_iter()
            .map(|((collection_group, mode), members)| {
                let mut validators = members
                    .into_iter()
                    .map(|rule| self.build(handler_pattern, rule))
                    .collect::<Result<Vec<_>, _>>()?;

                if validators.len() == 1 {
                    return Ok(validators.remove(0));
                }

                Ok(RuleSolver::Group(GroupSolver::new(mode, collection_group, validators)))
            })
            .collect()
    }

    fn build(&self, handler_pattern: &Regex, rule: &LogicalTypeRule) -> Result<RuleSolver, RuleError> {
        let root = self.build_root(handler_pattern, rule)?;

        match rule.hierarchy() {
            Some(hierarchy) if !hierarchy.children.is_empty() => Ok(RuleSolver::Children(ChildrenSolver::new(
                root,
                self.build_all(handler_pattern, &hierarchy.children)?,
            ))),
            _ => Ok(root),
        }
    }

    fn build_root(&self, handler_pattern: &Regex, rule: &LogicalTypeRule) -> Result<RuleSolver, RuleError> {
        match rule {
            LogicalTypeRule::MaxRecord {
                include_decommissioned,
                max_record,
                limit_policy,
                remove_policy,
                ..
            } => Ok(RuleSolver::MaxRecord(MaxRecordValidator::new(
                handler_pattern.clone(),
                *max_record,
                *include_decommissioned,
                *limit_policy,
                *remove_policy,
            ))),
            LogicalTypeRule::Unique { allow_replacement, .. } => {
                Ok(RuleSolver::Unique(UniqueValidator::new(*allow_replacement)))
            }
            LogicalTypeRule::Regex { match_regex, options, .. } => Ok(RuleSolver::Regex(RegexValidator::new(
                compile_match_regex(match_regex, *options)?,
            ))),
            LogicalTypeRule::TypeCheck { filter_type, .. } => {
                Ok(RuleSolver::DataType(DataTypeValidator::new(*filter_type)))
            }
            LogicalTypeRule::NumberRange { min, max, .. } => {
                if let (Some(min), Some(max)) = (min, max) {
                    if min > max {
                        return Err(RuleError::InvalidConfiguration(format!(
                            "number range min {} is greater than max {}",
                            min, max
                        )));
                    }
                }
                Ok(RuleSolver::NumberRange(NumberRangeValidator::new(*min, *max)))
            }
            LogicalTypeRule::Order { .. } | LogicalTypeRule::Storage { .. } | LogicalTypeRule::RemainOnSealed { .. } => {
                Err(RuleError::UnsupportedRule(rule.kind_name().to_string()))
            }
        }
    }
}

fn group_key(rule: &LogicalTypeRule) -> GroupKey {
    match rule.hierarchy() {
        Some(h) => (h.collection_group.clone().unwrap_or_default(), h.validation_mode),
        None => (String::new(), ValidationMode::All),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blackboard::record::DataKind;

    fn pattern() -> Regex {
        Regex::new("^metric$").unwrap()
    }

    #[test]
    fn test_empty_rules_give_null_solver() {
        let solver = ValidatorProvider::new().create(&pattern(), &[]).unwrap();
        assert!(solver.is_null());
    }

    #[test]
    fn test_single_rule_built_directly() {
        let solver = ValidatorProvider::new()
            .create(&pattern(), &[LogicalTypeRule::max_record("^metric$", 3)])
            .unwrap();
        assert!(matches!(solver, RuleSolver::MaxRecord(_)));
    }

    #[test]
    fn test_siblings_grouped_by_collection_and_mode() {
        let rules = vec![
            LogicalTypeRule::max_record("^metric$", 3),
            LogicalTypeRule::number_range("^metric$", Some(0.0), Some(1.0))
                .in_group(Some("ranges".into()), ValidationMode::AtLeastOne),
            LogicalTypeRule::number_range("^metric$", Some(10.0), Some(11.0))
                .in_group(Some("ranges".into()), ValidationMode::AtLeastOne),
            LogicalTypeRule::type_check("^metric$", DataKind::Number),
        ];

        let solver = ValidatorProvider::new().create(&pattern(), &rules).unwrap();
        let RuleSolver::Group(root) = solver else {
            panic!("expected group root");
        };
        assert_eq!(root.mode(), ValidationMode::All);

        // ("", All) holds max_record + type_check, ("ranges", AtLeastOne) holds both ranges
        assert_eq!(root.children().len(), 2);
        let RuleSolver::Group(first) = &root.children()[0] else {
            panic!("expected default group first");
        };
        assert_eq!(first.children().len(), 2);
        let RuleSolver::Group(ranges) = &root.children()[1] else {
            panic!("expected ranges group");
        };
        assert_eq!(ranges.collection_group(), "ranges");
        assert_eq!(ranges.mode(), ValidationMode::AtLeastOne);
    }

    #[test]
    fn test_hierarchy_rule_builds_children_solver() {
        let rule = LogicalTypeRule::type_check("^metric$", DataKind::Number)
            .with_children(vec![LogicalTypeRule::number_range("^metric$", Some(0.0), Some(100.0))]);

        let solver = ValidatorProvider::new().create(&pattern(), &[rule]).unwrap();
        let RuleSolver::Children(children) = solver else {
            panic!("expected children solver");
        };
        assert!(matches!(children.root(), RuleSolver::DataType(_)));
        assert!(matches!(children.children()[0], RuleSolver::NumberRange(_)));
    }

    #[test]
    fn test_handler_settings_are_unsupported() {
        let result = ValidatorProvider::new().create(
            &pattern(),
            &[LogicalTypeRule::RemainOnSealed { pattern: "^metric$".into() }],
        );
        assert_eq!(result.unwrap_err(), RuleError::UnsupportedRule("remain_on_sealed".into()));
    }

    #[test]
    fn test_invalid_match_regex_fails_fast() {
        let result = ValidatorProvider::new().create(&pattern(), &[LogicalTypeRule::regex("^metric$", "([")]);
        assert!(matches!(result, Err(RuleError::InvalidPattern { .. })));
    }
}
