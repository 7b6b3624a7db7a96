//! A fuzzy-inference engine for continuous patient health-risk scoring.
//!
//! The build phase derives Gaussian membership functions for each input
//! feature from data, via fuzzy c-means clustering. A hand-authored Mamdani
//! rule base then maps per-feature truth degrees into a three-term output
//! variable, which is defuzzified (centroid) into a crisp score in `[0, 100]`.
//! Score batches are finally calibrated into an F1-optimal binary decision
//! threshold and three risk categories.

pub mod cluster;
pub mod config;
pub mod diabetes;
pub mod diagnostics;
pub mod inference;
pub mod membership;
pub mod model;
pub mod pipeline;
pub mod rules;
pub mod threshold;
