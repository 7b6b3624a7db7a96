//! Rule expressions and the validated rule base.
//!
//! Antecedent expressions are an explicit discriminated tree — a term
//! reference, a fuzzy AND (min), or a fuzzy OR (max) — constructed through
//! the [`term`], [`all_of`], and [`any_of`] builders or the [`RuleExpr::and`]
//! / [`RuleExpr::or`] combinators. Every term reference is resolved against
//! the antecedent set when the [`RuleBase`] is constructed, so inference
//! never meets a dangling name.

use crate::membership::{Antecedent, OutputTerm};
use ahash::AHashMap;
use thiserror::Error;

/// Configuration-time validation failures. These always halt pipeline setup.
#[derive(Error, Debug)]
pub enum RuleValidationError {
    #[error("rule '{rule}' references unknown feature '{feature}'")]
    UnknownFeature { rule: String, feature: String },

    #[error("rule '{rule}' references term '{term}', absent from feature '{feature}'")]
    InvalidRuleReference {
        rule: String,
        feature: String,
        term: String,
    },

    #[error("a rule base must contain at least one rule")]
    EmptyRuleBase,
}

/// An antecedent expression: term references combined by AND (min) and
/// OR (max).
#[derive(Debug, Clone, PartialEq)]
pub enum RuleExpr {
    Term { feature: String, term: String },
    And(Vec<RuleExpr>),
    Or(Vec<RuleExpr>),
}

/// A reference to one named term of one feature's antecedent.
pub fn term(feature: &str, term: &str) -> RuleExpr {
    RuleExpr::Term {
        feature: feature.to_string(),
        term: term.to_string(),
    }
}

/// Fuzzy AND over all children.
pub fn all_of(children: Vec<RuleExpr>) -> RuleExpr {
    RuleExpr::And(children)
}

/// Fuzzy OR over all children.
pub fn any_of(children: Vec<RuleExpr>) -> RuleExpr {
    RuleExpr::Or(children)
}

impl RuleExpr {
    /// `self AND rhs`, flattening nested ANDs.
    pub fn and(self, rhs: RuleExpr) -> RuleExpr {
        match self {
            RuleExpr::And(mut children) => {
                children.push(rhs);
                RuleExpr::And(children)
            }
            other => RuleExpr::And(vec![other, rhs]),
        }
    }

    /// `self OR rhs`, flattening nested ORs.
    pub fn or(self, rhs: RuleExpr) -> RuleExpr {
        match self {
            RuleExpr::Or(mut children) => {
                children.push(rhs);
                RuleExpr::Or(children)
            }
            other => RuleExpr::Or(vec![other, rhs]),
        }
    }

    /// Visits every term reference in the tree.
    pub(crate) fn for_each_term(&self, f: &mut impl FnMut(&str, &str)) {
        match self {
            RuleExpr::Term { feature, term } => f(feature, term),
            RuleExpr::And(children) | RuleExpr::Or(children) => {
                for child in children {
                    child.for_each_term(f);
                }
            }
        }
    }
}

/// One immutable inference rule: an antecedent expression, an output term,
/// an optional weight, and a diagnostic label.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    expr: RuleExpr,
    consequent: OutputTerm,
    weight: f64,
    label: String,
}

impl Rule {
    pub fn new(label: &str, expr: RuleExpr, consequent: OutputTerm) -> Self {
        Self {
            expr,
            consequent,
            weight: 1.0,
            label: label.to_string(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn expr(&self) -> &RuleExpr {
        &self.expr
    }

    pub fn consequent(&self) -> OutputTerm {
        self.consequent
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A fixed rule collection whose term references were all resolved against
/// an antecedent set at construction time.
#[derive(Debug, Clone)]
pub struct RuleBase {
    rules: Vec<Rule>,
}

impl RuleBase {
    pub fn new(
        rules: Vec<Rule>,
        antecedents: &AHashMap<String, Antecedent>,
    ) -> Result<Self, RuleValidationError> {
        if rules.is_empty() {
            return Err(RuleValidationError::EmptyRuleBase);
        }
        for rule in &rules {
            let mut failure = None;
            rule.expr().for_each_term(&mut |feature, term| {
                if failure.is_some() {
                    return;
                }
                match antecedents.get(feature) {
                    None => {
                        failure = Some(RuleValidationError::UnknownFeature {
                            rule: rule.label().to_string(),
                            feature: feature.to_string(),
                        });
                    }
                    Some(antecedent) if antecedent.term(term).is_none() => {
                        failure = Some(RuleValidationError::InvalidRuleReference {
                            rule: rule.label().to_string(),
                            feature: feature.to_string(),
                            term: term.to_string(),
                        });
                    }
                    Some(_) => {}
                }
            });
            if let Some(err) = failure {
                return Err(err);
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every feature name referenced by at least one rule, sorted and
    /// deduplicated.
    pub fn referenced_features(&self) -> Vec<String> {
        let mut features = Vec::new();
        for rule in &self.rules {
            rule.expr().for_each_term(&mut |feature, _| {
                features.push(feature.to_string());
            });
        }
        features.sort_unstable();
        features.dedup();
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterModel;
    use crate::membership::Universe;

    fn antecedents() -> AHashMap<String, Antecedent> {
        let model = ClusterModel {
            centers: vec![90.0, 140.0],
            sigmas: vec![20.0, 20.0],
            fpc: 0.9,
        };
        let labels = vec!["normal_gl".to_string(), "high_gl".to_string()];
        let (glucose, _) = Antecedent::from_clusters(
            "glucose",
            Universe::new(50.0, 250.0, 1.0).unwrap(),
            &model,
            &labels,
        )
        .unwrap();
        let mut map = AHashMap::new();
        map.insert("glucose".to_string(), glucose);
        map
    }

    #[test]
    fn valid_references_pass() {
        let rules = vec![Rule::new(
            "High Glucose -> High Risk",
            term("glucose", "high_gl"),
            OutputTerm::HighRisk,
        )];
        let base = RuleBase::new(rules, &antecedents()).unwrap();
        assert_eq!(base.len(), 1);
        assert_eq!(base.referenced_features(), ["glucose"]);
    }

    #[test]
    fn unknown_term_fails_at_construction() {
        let rules = vec![Rule::new(
            "bad",
            term("glucose", "prediabetic_gl"),
            OutputTerm::MediumRisk,
        )];
        let err = RuleBase::new(rules, &antecedents()).unwrap_err();
        match err {
            RuleValidationError::InvalidRuleReference { feature, term, .. } => {
                assert_eq!(feature, "glucose");
                assert_eq!(term, "prediabetic_gl");
            }
            other => panic!("expected InvalidRuleReference, got {other:?}"),
        }
    }

    #[test]
    fn unknown_feature_fails_at_construction() {
        let rules = vec![Rule::new(
            "bad",
            term("glucose", "high_gl").and(term("hba1c", "high")),
            OutputTerm::HighRisk,
        )];
        let err = RuleBase::new(rules, &antecedents()).unwrap_err();
        assert!(matches!(
            err,
            RuleValidationError::UnknownFeature { feature, .. } if feature == "hba1c"
        ));
    }

    #[test]
    fn empty_rule_base_is_rejected() {
        assert!(matches!(
            RuleBase::new(Vec::new(), &antecedents()),
            Err(RuleValidationError::EmptyRuleBase)
        ));
    }

    #[test]
    fn combinators_flatten_nested_nodes() {
        let expr = term("glucose", "high_gl")
            .and(term("glucose", "normal_gl"))
            .and(term("glucose", "high_gl"));
        match expr {
            RuleExpr::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }
}
