//! # Build-Phase Orchestration
//!
//! Wires the components together: per-feature fuzzy clustering (fanned out
//! across features, joined before anything downstream starts), antecedent
//! construction with the label-mismatch warning channel, eager rule-base
//! validation, and batch scoring. Construction-time failures halt setup;
//! per-record failures at scoring time are isolated.

use crate::cluster::{self, ClusterError, ClusterModel};
use crate::config::{FeatureSpec, PipelineConfig};
use crate::inference::{InferenceEngine, InferenceError, InferenceResult, PatientRecord};
use crate::membership::{Antecedent, Consequent, LabelMismatch, MembershipError, Universe};
use crate::model::{FittedFeature, FittedModel, FittedTerm};
use crate::rules::{Rule, RuleValidationError};
use ahash::AHashMap;
use rayon::prelude::*;
use thiserror::Error;

/// Build-phase failures. All of these halt pipeline setup.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("feature '{feature}' is missing from the training dataset")]
    MissingColumn { feature: String },

    #[error("feature '{feature}' could not be clustered: {source}")]
    Cluster {
        feature: String,
        source: ClusterError,
    },

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Rules(#[from] RuleValidationError),
}

/// Fits one [`ClusterModel`] per feature. Features are independent, so the
/// fits fan out across a rayon pool; the returned map is the single
/// synchronization point before antecedent construction.
pub fn fit_feature_models(
    dataset: &AHashMap<String, Vec<f64>>,
    specs: &[FeatureSpec],
    config: &PipelineConfig,
) -> Result<AHashMap<String, ClusterModel>, PipelineError> {
    let fitted: Result<Vec<(String, ClusterModel)>, PipelineError> = specs
        .par_iter()
        .map(|spec| {
            let values = dataset
                .get(&spec.name)
                .ok_or_else(|| PipelineError::MissingColumn {
                    feature: spec.name.clone(),
                })?;
            let model =
                cluster::fit(values, spec.clusters, &config.fcm).map_err(|source| {
                    PipelineError::Cluster {
                        feature: spec.name.clone(),
                        source,
                    }
                })?;
            log::info!(
                "{}: fitted {} cluster(s), fpc = {:.4}",
                spec.name,
                model.k(),
                model.fpc
            );
            Ok((spec.name.clone(), model))
        })
        .collect();
    Ok(fitted?.into_iter().collect())
}

/// A ready-to-score risk engine together with its build provenance.
#[derive(Debug)]
pub struct RiskPipeline {
    engine: InferenceEngine,
    specs: Vec<FeatureSpec>,
    feature_models: AHashMap<String, ClusterModel>,
    config: PipelineConfig,
    warnings: Vec<LabelMismatch>,
}

impl RiskPipeline {
    /// Runs the whole build phase: cluster every feature, derive its
    /// antecedent over a universe spanning the observed data, then validate
    /// the hand-authored rules against the resulting term names.
    pub fn build(
        dataset: &AHashMap<String, Vec<f64>>,
        specs: Vec<FeatureSpec>,
        rules: Vec<Rule>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let feature_models = fit_feature_models(dataset, &specs, &config)?;

        let mut antecedents = AHashMap::with_capacity(specs.len());
        let mut warnings = Vec::new();
        for spec in &specs {
            let values = dataset
                .get(&spec.name)
                .ok_or_else(|| PipelineError::MissingColumn {
                    feature: spec.name.clone(),
                })?;
            let model = feature_models
                .get(&spec.name)
                .ok_or_else(|| PipelineError::MissingColumn {
                    feature: spec.name.clone(),
                })?;
            let (min, max) = values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            let universe = if spec.count_feature {
                Universe::new(min, max, spec.step)?
            } else {
                Universe::padded(min, max, spec.step)?
            };
            let (antecedent, warning) =
                Antecedent::from_clusters(&spec.name, universe, model, &spec.labels)?;
            if let Some(w) = warning {
                warnings.push(w);
            }
            antecedents.insert(spec.name.clone(), antecedent);
        }

        let consequent = Consequent::risk_with_step(config.output_step)?;
        let engine = InferenceEngine::new(antecedents, consequent, rules)?;
        log::info!(
            "risk pipeline ready: {} feature(s), {} rule(s)",
            specs.len(),
            engine.rule_base().len()
        );
        Ok(Self {
            engine,
            specs,
            feature_models,
            config,
            warnings,
        })
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Label-mismatch notices collected while building antecedents.
    pub fn warnings(&self) -> &[LabelMismatch] {
        &self.warnings
    }

    /// Per-feature cluster fits, for the diagnostics surface (fpc per
    /// feature).
    pub fn feature_models(&self) -> &AHashMap<String, ClusterModel> {
        &self.feature_models
    }

    pub fn score_record(&self, record: &PatientRecord) -> Result<InferenceResult, InferenceError> {
        self.engine.infer(record)
    }

    pub fn score_batch(
        &self,
        records: &[PatientRecord],
    ) -> Vec<Result<InferenceResult, InferenceError>> {
        self.engine.score_batch(records)
    }

    /// Snapshots the fitted state into its serializable artifact.
    pub fn fitted_model(
        &self,
        thresholds: Option<crate::threshold::ThresholdModel>,
    ) -> FittedModel {
        let features = self
            .specs
            .iter()
            .filter_map(|spec| {
                let antecedent = self.engine.antecedent(&spec.name)?;
                let fpc = self.feature_models.get(&spec.name).map_or(0.0, |m| m.fpc);
                Some(FittedFeature {
                    name: spec.name.clone(),
                    fpc,
                    universe: *antecedent.universe(),
                    terms: antecedent
                        .terms()
                        .iter()
                        .map(|mf| FittedTerm {
                            name: mf.name.clone(),
                            shape: mf.shape,
                        })
                        .collect(),
                })
            })
            .collect();
        FittedModel {
            output_step: self.config.output_step,
            fcm: self.config.fcm,
            thresholds,
            features,
        }
    }
}
