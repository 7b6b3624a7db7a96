//! # Fitted Model Artifact
//!
//! The human-readable, TOML-serializable product of the build phase: every
//! feature's universe and fitted membership-function parameters, the FCM
//! hyperparameters they were produced with, and (once calibration has run)
//! the decision thresholds. Loading an artifact rebuilds the antecedent set
//! without re-running clustering, so scoring new records needs only this
//! file plus the hand-authored rule base.

use crate::config::FcmParams;
use crate::inference::InferenceEngine;
use crate::membership::{
    Antecedent, Consequent, MembershipError, MembershipFunction, Shape, Universe,
};
use crate::rules::{Rule, RuleValidationError};
use crate::threshold::ThresholdModel;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors raised while saving, loading, or reconstituting a fitted model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model file: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("failed to serialize model: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Rules(#[from] RuleValidationError),
}

/// One fitted membership function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTerm {
    pub name: String,
    pub shape: Shape,
}

/// The fitted state of one feature: its universe and its ascending terms.
/// Scalar fields come first so the TOML serializer emits them before the
/// nested tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedFeature {
    pub name: String,
    /// Fuzzy partition coefficient of the underlying cluster fit.
    pub fpc: f64,
    pub universe: Universe,
    pub terms: Vec<FittedTerm>,
}

/// The complete serializable product of the build phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    /// Discretization step of the `[0, 100]` output universe.
    pub output_step: f64,
    pub fcm: FcmParams,
    /// Present once threshold calibration has run.
    pub thresholds: Option<ThresholdModel>,
    pub features: Vec<FittedFeature>,
}

impl FittedModel {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = fs::File::create(path)?;
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        Ok(toml::from_str(&toml_string)?)
    }

    /// Rebuilds the antecedent set from the stored parameters.
    pub fn antecedents(&self) -> Result<AHashMap<String, Antecedent>, ModelError> {
        let mut map = AHashMap::with_capacity(self.features.len());
        for feature in &self.features {
            let terms = feature
                .terms
                .iter()
                .map(|t| MembershipFunction {
                    name: t.name.clone(),
                    shape: t.shape,
                })
                .collect();
            let antecedent = Antecedent::new(&feature.name, feature.universe, terms)?;
            map.insert(feature.name.clone(), antecedent);
        }
        Ok(map)
    }

    /// Reconstitutes a ready-to-score engine from the stored parameters and
    /// the caller's rule base.
    pub fn to_engine(&self, rules: Vec<Rule>) -> Result<InferenceEngine, ModelError> {
        let antecedents = self.antecedents()?;
        let consequent = Consequent::risk_with_step(self.output_step)?;
        Ok(InferenceEngine::new(antecedents, consequent, rules)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::OutputTerm;
    use crate::rules::term;

    fn fitted_model() -> FittedModel {
        FittedModel {
            output_step: 1.0,
            fcm: FcmParams::default(),
            thresholds: Some(ThresholdModel {
                low_medium_threshold: 33.0,
                medium_high_threshold: 62.0,
                optimal_binary_threshold: 55.0,
            }),
            features: vec![FittedFeature {
                name: "glucose".to_string(),
                fpc: 0.87,
                universe: Universe::new(50.0, 250.0, 1.0).unwrap(),
                terms: vec![
                    FittedTerm {
                        name: "normal_gl".to_string(),
                        shape: Shape::Gaussian {
                            center: 100.0,
                            sigma: 20.0,
                        },
                    },
                    FittedTerm {
                        name: "high_gl".to_string(),
                        shape: Shape::Gaussian {
                            center: 170.0,
                            sigma: 20.0,
                        },
                    },
                ],
            }],
        }
    }

    #[test]
    fn toml_round_trip_preserves_the_model() {
        let model = fitted_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        model.save(&path).unwrap();
        let loaded = FittedModel::load(&path).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn loaded_model_scores_records() {
        let model = fitted_model();
        let engine = model
            .to_engine(vec![Rule::new(
                "High Glucose -> High Risk",
                term("glucose", "high_gl"),
                OutputTerm::HighRisk,
            )])
            .unwrap();
        let record = crate::inference::PatientRecord::from_pairs(&[("glucose", 170.0)]);
        let result = engine.infer(&record).unwrap();
        assert!(result.score > 50.0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = FittedModel::load("/nonexistent/model.toml").unwrap_err();
        assert!(matches!(err, ModelError::Io(_)));
    }
}
