//! Build-phase configuration.
//!
//! Everything a caller can tune lives here, passed by value into the
//! components that need it. No component reads ambient state.

use serde::{Deserialize, Serialize};

/// Hyperparameters of the fuzzy c-means fit, shared across features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FcmParams {
    /// Fuzziness exponent `m`. Must be strictly greater than 1; 2.0 is the
    /// conventional choice.
    pub fuzziness: f64,
    /// Convergence tolerance on the largest absolute membership change
    /// between consecutive sweeps.
    pub tolerance: f64,
    /// Hard cap on optimization sweeps.
    pub max_iterations: usize,
}

impl Default for FcmParams {
    fn default() -> Self {
        Self {
            fuzziness: 2.0,
            tolerance: 0.005,
            max_iterations: 1000,
        }
    }
}

/// Build instructions for one input feature: how many clusters to fit and
/// what to call the resulting membership functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Feature name, as referenced by rules and patient records.
    pub name: String,
    /// Number of fuzzy clusters (= membership functions) to derive.
    pub clusters: usize,
    /// Ordered linguistic labels, aligned with ascending cluster centers.
    /// Clusters beyond the end of this list get generated `cluster_<i>` names.
    pub labels: Vec<String>,
    /// Grid step of the feature's discretized universe.
    pub step: f64,
    /// Non-negative count features keep their observed `[min, max]` range;
    /// all others get the padded `[0.9*min, 1.1*max]` range.
    pub count_feature: bool,
}

impl FeatureSpec {
    pub fn new(name: &str, clusters: usize, labels: &[&str], step: f64) -> Self {
        Self {
            name: name.to_string(),
            clusters,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            step,
            count_feature: false,
        }
    }

    /// Marks this feature as a non-negative count (exact-span universe).
    pub fn count(mut self) -> Self {
        self.count_feature = true;
        self
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub fcm: FcmParams,
    /// Discretization step of the `[0, 100]` output universe.
    pub output_step: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fcm: FcmParams::default(),
            output_step: 1.0,
        }
    }
}
