//! Membership functions, antecedent variables, and the fixed risk consequent.
//!
//! An [`Antecedent`] owns the named membership functions of one input
//! feature; term insertion is validated (unique names, positive widths), and
//! lookups of undefined terms are errors rather than silent zeros. The
//! [`Consequent`] is the fixed three-term `risk` variable over `[0, 100]`.

use crate::cluster::ClusterModel;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or querying fuzzy variables.
#[derive(Error, Debug)]
pub enum MembershipError {
    #[error("universe [{start}, {stop}] with step {step} is empty or inverted")]
    InvalidUniverse { start: f64, stop: f64, step: f64 },

    #[error("variable '{variable}' has no term named '{term}'")]
    UnknownTerm { variable: String, term: String },

    #[error("variable '{variable}' defines the term '{term}' more than once")]
    DuplicateTerm { variable: String, term: String },

    #[error("membership width must be positive, got {0}")]
    InvalidSigma(f64),
}

/// A discretized real interval: the domain one fuzzy variable is defined on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    start: f64,
    stop: f64,
    step: f64,
}

impl Universe {
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, MembershipError> {
        if !(step > 0.0) || !(stop > start) || !start.is_finite() || !stop.is_finite() {
            return Err(MembershipError::InvalidUniverse { start, stop, step });
        }
        Ok(Self { start, stop, step })
    }

    /// Padded universe for an unbounded measurement: `[0.9*min, 1.1*max]`.
    pub fn padded(min: f64, max: f64, step: f64) -> Result<Self, MembershipError> {
        Self::new(min * 0.9, max * 1.1, step)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Samples the universe at its step size, inclusive of both endpoints
    /// (the stop point is kept whenever it lies on the grid).
    pub fn grid(&self) -> Array1<f64> {
        let count = ((self.stop - self.start) / self.step + 1e-9).floor() as usize + 1;
        Array1::from_iter((0..count).map(|i| self.start + i as f64 * self.step))
    }
}

/// The shape of a single membership function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// `exp(-(x - center)^2 / (2 sigma^2))`; exactly 1 at the center.
    Gaussian { center: f64, sigma: f64 },
    /// Peak at `b`, support `(a, c)`.
    Triangular { a: f64, b: f64, c: f64 },
}

impl Shape {
    pub fn evaluate(&self, x: f64) -> f64 {
        match *self {
            Shape::Gaussian { center, sigma } => {
                (-((x - center).powi(2)) / (2.0 * sigma.powi(2))).exp()
            }
            Shape::Triangular { a, b, c } => {
                if x <= a || x >= c {
                    0.0
                } else if x <= b {
                    (x - a) / (b - a)
                } else {
                    (c - x) / (c - b)
                }
            }
        }
    }
}

/// One named linguistic term over a variable's universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipFunction {
    pub name: String,
    pub shape: Shape,
}

impl MembershipFunction {
    pub fn gaussian(name: &str, center: f64, sigma: f64) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Gaussian { center, sigma },
        }
    }

    pub fn triangular(name: &str, a: f64, b: f64, c: f64) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Triangular { a, b, c },
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.shape.evaluate(x)
    }
}

/// Recoverable notice that a caller's label list did not line up with the
/// fitted cluster count. The antecedent is still built; clusters past the end
/// of the list carry generated names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMismatch {
    pub feature: String,
    pub labels_supplied: usize,
    pub clusters: usize,
}

/// An input variable: a feature name, its universe, and its ordered set of
/// named membership functions. Terms may overlap or leave gaps; they are not
/// required to partition unity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Antecedent {
    feature_name: String,
    universe: Universe,
    terms: Vec<MembershipFunction>,
}

impl Antecedent {
    /// Builds an antecedent from an explicit term list, validating that every
    /// name is unique and every Gaussian width positive.
    pub fn new(
        feature_name: &str,
        universe: Universe,
        terms: Vec<MembershipFunction>,
    ) -> Result<Self, MembershipError> {
        for (i, mf) in terms.iter().enumerate() {
            if terms[..i].iter().any(|other| other.name == mf.name) {
                return Err(MembershipError::DuplicateTerm {
                    variable: feature_name.to_string(),
                    term: mf.name.clone(),
                });
            }
            if let Shape::Gaussian { sigma, .. } = mf.shape {
                if !(sigma > 0.0) {
                    return Err(MembershipError::InvalidSigma(sigma));
                }
            }
        }
        Ok(Self {
            feature_name: feature_name.to_string(),
            universe,
            terms,
        })
    }

    /// Builds an antecedent from a fitted cluster model. `labels[i]` names the
    /// i-th ascending cluster; clusters beyond the label list get generated
    /// `cluster_<i>` names, reported through the warning channel rather than
    /// as an error.
    pub fn from_clusters(
        feature_name: &str,
        universe: Universe,
        model: &ClusterModel,
        labels: &[String],
    ) -> Result<(Self, Option<LabelMismatch>), MembershipError> {
        let terms = model
            .centers
            .iter()
            .zip(&model.sigmas)
            .enumerate()
            .map(|(i, (&center, &sigma))| {
                let name = labels
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("cluster_{i}"));
                MembershipFunction::gaussian(&name, center, sigma)
            })
            .collect();

        let antecedent = Self::new(feature_name, universe, terms)?;
        let warning = (labels.len() != model.k()).then(|| {
            log::warn!(
                "{feature_name}: {} label(s) supplied for {} cluster(s)",
                labels.len(),
                model.k()
            );
            LabelMismatch {
                feature: feature_name.to_string(),
                labels_supplied: labels.len(),
                clusters: model.k(),
            }
        });
        Ok((antecedent, warning))
    }

    pub fn feature_name(&self) -> &str {
        &self.feature_name
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn terms(&self) -> &[MembershipFunction] {
        &self.terms
    }

    pub fn term(&self, name: &str) -> Option<&MembershipFunction> {
        self.terms.iter().find(|mf| mf.name == name)
    }

    /// Truth degree of `term` at `x`.
    pub fn membership(&self, term: &str, x: f64) -> Result<f64, MembershipError> {
        self.term(term)
            .map(|mf| mf.evaluate(x))
            .ok_or_else(|| MembershipError::UnknownTerm {
                variable: self.feature_name.clone(),
                term: term.to_string(),
            })
    }
}

/// The three output terms every rule maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputTerm {
    LowRisk,
    MediumRisk,
    HighRisk,
}

impl OutputTerm {
    pub const ALL: [OutputTerm; 3] = [
        OutputTerm::LowRisk,
        OutputTerm::MediumRisk,
        OutputTerm::HighRisk,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OutputTerm::LowRisk => "low_risk",
            OutputTerm::MediumRisk => "medium_risk",
            OutputTerm::HighRisk => "high_risk",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            OutputTerm::LowRisk => 0,
            OutputTerm::MediumRisk => 1,
            OutputTerm::HighRisk => 2,
        }
    }
}

/// The fixed output variable `risk` over `[0, 100]`: three triangular terms
/// peaking at 25, 50, and 75.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consequent {
    universe: Universe,
    terms: [MembershipFunction; 3],
}

impl Consequent {
    /// The standard risk variable at unit grid resolution.
    pub fn risk() -> Self {
        Self {
            universe: Universe {
                start: 0.0,
                stop: 100.0,
                step: 1.0,
            },
            terms: Self::standard_terms(),
        }
    }

    /// The standard risk variable at a caller-chosen grid resolution.
    pub fn risk_with_step(step: f64) -> Result<Self, MembershipError> {
        Ok(Self {
            universe: Universe::new(0.0, 100.0, step)?,
            terms: Self::standard_terms(),
        })
    }

    fn standard_terms() -> [MembershipFunction; 3] {
        [
            MembershipFunction::triangular("low_risk", 0.0, 25.0, 50.0),
            MembershipFunction::triangular("medium_risk", 25.0, 50.0, 75.0),
            MembershipFunction::triangular("high_risk", 50.0, 75.0, 100.0),
        ]
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn term(&self, output: OutputTerm) -> &MembershipFunction {
        &self.terms[output.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> ClusterModel {
        ClusterModel {
            centers: vec![10.0, 30.0, 50.0],
            sigmas: vec![8.0, 8.0, 8.0],
            fpc: 0.8,
        }
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn grid_covers_inclusive_range() {
        let grid = Universe::new(0.0, 100.0, 1.0).unwrap().grid();
        assert_eq!(grid.len(), 101);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[100], 100.0);
    }

    #[test]
    fn invalid_universes_are_rejected() {
        assert!(Universe::new(10.0, 0.0, 1.0).is_err());
        assert!(Universe::new(0.0, 10.0, 0.0).is_err());
        assert!(Universe::new(0.0, 10.0, -1.0).is_err());
    }

    #[test]
    fn gaussian_is_exactly_one_at_center() {
        let mf = MembershipFunction::gaussian("mid", 30.0, 8.0);
        assert_eq!(mf.evaluate(30.0), 1.0);
        assert!(mf.evaluate(20.0) < 1.0);
        assert!(mf.evaluate(20.0) > 0.0);
    }

    #[test]
    fn membership_stays_in_unit_interval_over_universe() {
        let universe = Universe::padded(5.0, 60.0, 0.5).unwrap();
        let (antecedent, _) = Antecedent::from_clusters(
            "glucose",
            universe,
            &model(),
            &labels(&["low", "mid", "high"]),
        )
        .unwrap();
        for &x in universe.grid().iter() {
            for mf in antecedent.terms() {
                let mu = mf.evaluate(x);
                assert!((0.0..=1.0).contains(&mu), "mu({x}) = {mu} out of [0,1]");
            }
        }
    }

    #[test]
    fn labels_align_with_ascending_clusters() {
        let (antecedent, warning) = Antecedent::from_clusters(
            "glucose",
            Universe::new(0.0, 60.0, 1.0).unwrap(),
            &model(),
            &labels(&["low", "mid", "high"]),
        )
        .unwrap();
        assert!(warning.is_none());
        let names: Vec<&str> = antecedent.terms().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["low", "mid", "high"]);
        assert_eq!(antecedent.membership("mid", 30.0).unwrap(), 1.0);
    }

    #[test]
    fn short_label_list_warns_and_generates_names() {
        let (antecedent, warning) = Antecedent::from_clusters(
            "glucose",
            Universe::new(0.0, 60.0, 1.0).unwrap(),
            &model(),
            &labels(&["low"]),
        )
        .unwrap();
        let warning = warning.expect("expected a label mismatch");
        assert_eq!(warning.labels_supplied, 1);
        assert_eq!(warning.clusters, 3);
        assert!(antecedent.term("cluster_1").is_some());
        assert!(antecedent.term("cluster_2").is_some());
    }

    #[test]
    fn unknown_term_is_an_error() {
        let (antecedent, _) = Antecedent::from_clusters(
            "glucose",
            Universe::new(0.0, 60.0, 1.0).unwrap(),
            &model(),
            &labels(&["low", "mid", "high"]),
        )
        .unwrap();
        let err = antecedent.membership("prediabetic", 30.0).unwrap_err();
        assert!(matches!(err, MembershipError::UnknownTerm { .. }));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let err = Antecedent::from_clusters(
            "glucose",
            Universe::new(0.0, 60.0, 1.0).unwrap(),
            &model(),
            &labels(&["low", "low", "high"]),
        )
        .unwrap_err();
        assert!(matches!(err, MembershipError::DuplicateTerm { .. }));
    }

    #[test]
    fn consequent_terms_peak_at_quartiles() {
        let consequent = Consequent::risk();
        assert_eq!(consequent.term(OutputTerm::LowRisk).evaluate(25.0), 1.0);
        assert_eq!(consequent.term(OutputTerm::MediumRisk).evaluate(50.0), 1.0);
        assert_eq!(consequent.term(OutputTerm::HighRisk).evaluate(75.0), 1.0);
        // Supports are [0,50], [25,75], [50,100].
        assert_eq!(consequent.term(OutputTerm::LowRisk).evaluate(50.0), 0.0);
        assert_eq!(consequent.term(OutputTerm::HighRisk).evaluate(50.0), 0.0);
        assert_relative_eq!(
            consequent.term(OutputTerm::MediumRisk).evaluate(37.5),
            0.5,
            max_relative = 1e-12
        );
    }
}
