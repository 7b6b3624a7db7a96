//! Hand-authored diabetes preset: the Pima feature set and its clinical
//! rule base.
//!
//! Cluster counts follow an FPC elbow review of the reference dataset; the
//! label lists name the ascending clusters with ADA-style linguistic terms.
//! Rules are fixed constants — there is no rule learning — grouped into six
//! high-risk, six medium-risk, and six low-risk combinations of the derived
//! terms.

use crate::config::FeatureSpec;
use crate::membership::OutputTerm::{HighRisk, LowRisk, MediumRisk};
use crate::rules::{Rule, term};

/// Build specs for the eight input features.
pub fn feature_specs() -> Vec<FeatureSpec> {
    vec![
        FeatureSpec::new(
            "glucose",
            4,
            &["very_low_gl", "low_gl", "normal_gl", "high_gl"],
            1.0,
        ),
        FeatureSpec::new(
            "bmi",
            4,
            &["underweight_bmi", "normal_bmi", "overweight_bmi", "obese_bmi"],
            0.1,
        ),
        FeatureSpec::new(
            "age",
            4,
            &["young_age", "middle_aged_age", "senior_age", "elderly_age"],
            1.0,
        ),
        FeatureSpec::new(
            "blood_pressure",
            5,
            &["very_low_bp", "low_bp", "normal_bp", "elevated_bp", "high_bp"],
            1.0,
        ),
        FeatureSpec::new(
            "pregnancies",
            5,
            &["zero_preg", "low_preg", "medium_preg", "high_preg", "very_high_preg"],
            1.0,
        )
        .count(),
        FeatureSpec::new(
            "diabetes_pedigree_function",
            4,
            &["very_low_dpf", "low_dpf", "medium_dpf", "high_dpf"],
            0.01,
        ),
        FeatureSpec::new(
            "skin_thickness",
            5,
            &[
                "very_thin_skin",
                "thin_skin",
                "normal_skin",
                "thick_skin",
                "very_thick_skin",
            ],
            1.0,
        ),
        FeatureSpec::new(
            "insulin",
            5,
            &[
                "very_low_insulin",
                "low_insulin",
                "normal_insulin",
                "elevated_ins",
                "very_high_ins",
            ],
            1.0,
        ),
    ]
}

/// The fixed eighteen-rule base.
pub fn rules() -> Vec<Rule> {
    vec![
        // High risk: strong indicators and critical combinations.
        Rule::new(
            "High Glucose -> High Risk",
            term("glucose", "high_gl"),
            HighRisk,
        ),
        Rule::new("Obese BMI -> High Risk", term("bmi", "obese_bmi"), HighRisk),
        Rule::new(
            "Very High Insulin -> High Risk",
            term("insulin", "very_high_ins"),
            HighRisk,
        ),
        Rule::new(
            "High DPF & (High Glucose OR Elevated Insulin) -> High Risk",
            term("diabetes_pedigree_function", "high_dpf")
                .and(term("glucose", "high_gl").or(term("insulin", "elevated_ins"))),
            HighRisk,
        ),
        Rule::new(
            "Elderly Age & (High Glucose OR Obese BMI) -> High Risk",
            term("age", "elderly_age")
                .and(term("glucose", "high_gl").or(term("bmi", "obese_bmi"))),
            HighRisk,
        ),
        Rule::new(
            "Very High Pregnancies & High Glucose -> High Risk",
            term("pregnancies", "very_high_preg").and(term("glucose", "high_gl")),
            HighRisk,
        ),
        // Medium risk: borderline and moderate combinations.
        Rule::new(
            "Normal Glucose & Elevated Insulin -> Medium Risk",
            term("glucose", "normal_gl").and(term("insulin", "elevated_ins")),
            MediumRisk,
        ),
        Rule::new(
            "Overweight BMI & Middle/Senior Age -> Medium Risk",
            term("bmi", "overweight_bmi")
                .and(term("age", "middle_aged_age").or(term("age", "senior_age"))),
            MediumRisk,
        ),
        Rule::new(
            "Elevated BP & Normal Glucose -> Medium Risk",
            term("blood_pressure", "elevated_bp").and(term("glucose", "normal_gl")),
            MediumRisk,
        ),
        Rule::new(
            "Medium DPF & Middle/Senior Age -> Medium Risk",
            term("diabetes_pedigree_function", "medium_dpf")
                .and(term("age", "middle_aged_age").or(term("age", "senior_age"))),
            MediumRisk,
        ),
        Rule::new(
            "High Pregnancies & Overweight BMI -> Medium Risk",
            term("pregnancies", "high_preg").and(term("bmi", "overweight_bmi")),
            MediumRisk,
        ),
        Rule::new(
            "Normal Glucose & Obese BMI -> Medium Risk",
            term("glucose", "normal_gl").and(term("bmi", "obese_bmi")),
            MediumRisk,
        ),
        // Low risk: combinations indicating a healthy profile.
        Rule::new(
            "Normal Glucose & Normal BMI & Young Age -> Low Risk",
            term("glucose", "normal_gl")
                .and(term("bmi", "normal_bmi"))
                .and(term("age", "young_age")),
            LowRisk,
        ),
        Rule::new("Low Glucose -> Low Risk", term("glucose", "low_gl"), LowRisk),
        Rule::new(
            "Normal BMI & Normal BP -> Low Risk",
            term("bmi", "normal_bmi").and(term("blood_pressure", "normal_bp")),
            LowRisk,
        ),
        Rule::new(
            "Very Low DPF & Young/Middle Age -> Low Risk",
            term("diabetes_pedigree_function", "very_low_dpf")
                .and(term("age", "young_age").or(term("age", "middle_aged_age"))),
            LowRisk,
        ),
        Rule::new(
            "Zero Pregnancies & Normal Glucose & Normal BMI -> Low Risk",
            term("pregnancies", "zero_preg")
                .and(term("glucose", "normal_gl"))
                .and(term("bmi", "normal_bmi")),
            LowRisk,
        ),
        Rule::new(
            "Normal Insulin & Normal Skin -> Low Risk",
            term("insulin", "normal_insulin").and(term("skin_thickness", "normal_skin")),
            LowRisk,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::OutputTerm;

    #[test]
    fn preset_has_eight_features_and_eighteen_rules() {
        assert_eq!(feature_specs().len(), 8);
        assert_eq!(rules().len(), 18);
    }

    #[test]
    fn rules_balance_across_output_terms() {
        let rules = rules();
        for output in OutputTerm::ALL {
            let count = rules.iter().filter(|r| r.consequent() == output).count();
            assert_eq!(count, 6, "expected 6 rules for {:?}", output);
        }
    }

    #[test]
    fn every_rule_references_a_declared_label() {
        let specs = feature_specs();
        for rule in rules() {
            rule.expr().for_each_term(&mut |feature, term| {
                let spec = specs
                    .iter()
                    .find(|s| s.name == feature)
                    .unwrap_or_else(|| panic!("rule '{}' references unknown feature", rule.label()));
                assert!(
                    spec.labels.iter().any(|l| l == term),
                    "rule '{}' references undeclared term {feature}.{term}",
                    rule.label()
                );
            });
        }
    }

    #[test]
    fn only_pregnancies_is_a_count_feature() {
        for spec in feature_specs() {
            assert_eq!(spec.count_feature, spec.name == "pregnancies");
        }
    }
}
