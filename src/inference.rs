//! # Mamdani Inference
//!
//! The engine evaluates the validated rule base against one patient record:
//! term truth degrees come from the antecedents, AND is minimum, OR is
//! maximum, implication clips each rule's consequent term at the rule's
//! firing strength, aggregation is the pointwise maximum across rules, and
//! the crisp score is the centroid of the aggregated set over the sampled
//! output universe.
//!
//! Inference is stateless per call: everything the engine holds is immutable
//! after construction, so batches may be scored in parallel with read-only
//! shared access.

use crate::membership::{Antecedent, Consequent, MembershipError, OutputTerm};
use crate::rules::{Rule, RuleBase, RuleExpr, RuleValidationError};
use ahash::AHashMap;
use ndarray::Array1;
use rayon::prelude::*;
use thiserror::Error;

/// Per-record inference failures. These are isolated per record: one bad
/// record never aborts a batch.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("record is missing feature '{0}', which the rule base references")]
    MissingFeature(String),

    #[error("no rule fired for this record; the aggregated output set is empty")]
    UndefinedOutput,

    #[error(transparent)]
    Membership(#[from] MembershipError),
}

/// One patient's feature values, keyed by feature name.
#[derive(Debug, Clone, Default)]
pub struct PatientRecord {
    values: AHashMap<String, f64>,
}

impl PatientRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        let mut record = Self::new();
        for &(feature, value) in pairs {
            record.set(feature, value);
        }
        record
    }

    pub fn set(&mut self, feature: &str, value: f64) {
        self.values.insert(feature.to_string(), value);
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.values.get(feature).copied()
    }
}

/// Everything produced by one inference call.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    /// Firing strength of every rule, in rule-base order, keyed by label.
    pub firing_strengths: Vec<(String, f64)>,
    /// The aggregated output fuzzy set, sampled over the output grid.
    pub aggregated_output: Array1<f64>,
    /// Centroid-defuzzified crisp score in `[0, 100]`.
    pub score: f64,
}

/// A ready-to-score Mamdani engine. Construction validates the rule base
/// against the antecedent set, so every later inference call works with
/// resolved references only.
#[derive(Debug)]
pub struct InferenceEngine {
    antecedents: AHashMap<String, Antecedent>,
    rule_base: RuleBase,
    grid: Array1<f64>,
    term_samples: [Array1<f64>; 3],
}

impl InferenceEngine {
    pub fn new(
        antecedents: AHashMap<String, Antecedent>,
        consequent: Consequent,
        rules: Vec<Rule>,
    ) -> Result<Self, RuleValidationError> {
        let rule_base = RuleBase::new(rules, &antecedents)?;
        let grid = consequent.universe().grid();
        let term_samples = OutputTerm::ALL
            .map(|output| grid.mapv(|x| consequent.term(output).evaluate(x)));
        Ok(Self {
            antecedents,
            rule_base,
            grid,
            term_samples,
        })
    }

    pub fn rule_base(&self) -> &RuleBase {
        &self.rule_base
    }

    pub fn antecedent(&self, feature: &str) -> Option<&Antecedent> {
        self.antecedents.get(feature)
    }

    /// Scores one record. Fails with [`InferenceError::UndefinedOutput`] when
    /// no rule fires at all — the caller gets an explicit "no confident
    /// prediction" signal instead of an arbitrary default score.
    pub fn infer(&self, record: &PatientRecord) -> Result<InferenceResult, InferenceError> {
        let mut strengths = Vec::with_capacity(self.rule_base.len());
        for rule in self.rule_base.rules() {
            let truth = self.evaluate(rule.expr(), record)?;
            strengths.push((rule.weight() * truth).clamp(0.0, 1.0));
        }
        if strengths.iter().all(|&s| s == 0.0) {
            return Err(InferenceError::UndefinedOutput);
        }

        let mut aggregate = Array1::<f64>::zeros(self.grid.len());
        for output in OutputTerm::ALL {
            let term_strength = self
                .rule_base
                .rules()
                .iter()
                .zip(&strengths)
                .filter(|(rule, _)| rule.consequent() == output)
                .map(|(_, &s)| s)
                .fold(0.0_f64, f64::max);
            if term_strength == 0.0 {
                continue;
            }
            let clipped = self.term_samples[output.index()].mapv(|mu| mu.min(term_strength));
            aggregate.zip_mut_with(&clipped, |a, &c| *a = a.max(c));
        }

        let mass = aggregate.sum();
        if mass <= 0.0 {
            return Err(InferenceError::UndefinedOutput);
        }
        let score = (&self.grid * &aggregate).sum() / mass;

        let firing_strengths = self
            .rule_base
            .rules()
            .iter()
            .zip(strengths)
            .map(|(rule, s)| (rule.label().to_string(), s))
            .collect();

        Ok(InferenceResult {
            firing_strengths,
            aggregated_output: aggregate,
            score,
        })
    }

    /// Scores a batch in parallel. Results keep input order; per-record
    /// failures stay in place so callers can skip bad records and continue.
    pub fn score_batch(
        &self,
        records: &[PatientRecord],
    ) -> Vec<Result<InferenceResult, InferenceError>> {
        records.par_iter().map(|record| self.infer(record)).collect()
    }

    fn evaluate(&self, expr: &RuleExpr, record: &PatientRecord) -> Result<f64, InferenceError> {
        match expr {
            RuleExpr::Term { feature, term } => {
                let x = record
                    .get(feature)
                    .ok_or_else(|| InferenceError::MissingFeature(feature.clone()))?;
                let antecedent = self
                    .antecedents
                    .get(feature)
                    .expect("rule base was validated against these antecedents");
                Ok(antecedent.membership(term, x)?)
            }
            RuleExpr::And(children) => {
                let mut truth = 1.0_f64;
                for child in children {
                    truth = truth.min(self.evaluate(child, record)?);
                }
                Ok(truth)
            }
            RuleExpr::Or(children) => {
                let mut truth = 0.0_f64;
                for child in children {
                    truth = truth.max(self.evaluate(child, record)?);
                }
                Ok(truth)
            }
        }
    }
}
