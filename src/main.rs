//! Command-line wrapper around the risk pipeline: calibrate a model from a
//! labeled CSV, then score new records against the saved artifact. All of
//! the CSV handling lives here; the library itself never touches files
//! except for the model artifact.

use ahash::AHashMap;
use clap::{Parser, Subcommand};
use fuzzrisk::config::{FcmParams, PipelineConfig};
use fuzzrisk::diabetes;
use fuzzrisk::diagnostics::{ConfusionMatrix, roc_auc, roc_points};
use fuzzrisk::inference::PatientRecord;
use fuzzrisk::model::FittedModel;
use fuzzrisk::pipeline::RiskPipeline;
use fuzzrisk::threshold;
use std::error::Error;
use std::process;

/// Input CSV headers, mapped to the engine's feature names.
const COLUMNS: &[(&str, &str)] = &[
    ("Pregnancies", "pregnancies"),
    ("Glucose", "glucose"),
    ("BloodPressure", "blood_pressure"),
    ("SkinThickness", "skin_thickness"),
    ("Insulin", "insulin"),
    ("BMI", "bmi"),
    ("DiabetesPedigreeFunction", "diabetes_pedigree_function"),
    ("Age", "age"),
];

const OUTCOME_COLUMN: &str = "Outcome";

#[derive(Parser)]
#[command(
    name = "fuzzrisk",
    about = "Fuzzy-inference health-risk scoring",
    long_about = "Derives per-feature membership functions from data via fuzzy c-means, scores \
                  patient records through a Mamdani rule base, and calibrates the resulting \
                  score scale into risk categories and a binary decision threshold."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit membership functions, score the dataset, and calibrate thresholds
    #[command(about = "Calibrate a risk model from a labeled CSV (outputs: model.toml)")]
    Calibrate {
        /// Path to a CSV with the eight feature columns plus Outcome
        data: String,

        /// Where to write the fitted model
        #[arg(long, default_value = "model.toml")]
        model_out: String,

        /// Optional per-patient report CSV (record, score, category, outcome)
        #[arg(long)]
        report_out: Option<String>,

        /// Fuzziness exponent m
        #[arg(long, default_value_t = 2.0)]
        fuzziness: f64,

        /// Convergence tolerance of the fuzzy c-means fit
        #[arg(long, default_value_t = 0.005)]
        tolerance: f64,

        /// Iteration cap of the fuzzy c-means fit
        #[arg(long, default_value_t = 1000)]
        max_iterations: usize,

        /// Discretization step of the output universe
        #[arg(long, default_value_t = 1.0)]
        output_step: f64,
    },
    /// Score new records with a previously calibrated model
    #[command(about = "Score records against a saved model (outputs: scores.csv)")]
    Score {
        /// Path to a CSV with the eight feature columns
        data: String,

        /// Path to the fitted model
        #[arg(long, default_value = "model.toml")]
        model: String,

        /// Where to write the per-record scores
        #[arg(long, default_value = "scores.csv")]
        out: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Calibrate {
            data,
            model_out,
            report_out,
            fuzziness,
            tolerance,
            max_iterations,
            output_step,
        } => {
            let config = PipelineConfig {
                fcm: FcmParams {
                    fuzziness,
                    tolerance,
                    max_iterations,
                },
                output_step,
            };
            calibrate_command(&data, &model_out, report_out.as_deref(), config)
        }
        Commands::Score { data, model, out } => score_command(&data, &model, &out),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Rows parsed out of an input CSV. `columns` carries the per-feature sample
/// vectors for the build phase; `records` the same data keyed per patient.
struct Dataset {
    records: Vec<PatientRecord>,
    columns: AHashMap<String, Vec<f64>>,
    outcomes: Vec<Option<u8>>,
}

fn load_dataset(path: &str, require_outcome: bool) -> Result<Dataset, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut indices = Vec::with_capacity(COLUMNS.len());
    for (header, feature) in COLUMNS {
        let idx = headers
            .iter()
            .position(|h| h == *header)
            .ok_or_else(|| format!("required column '{header}' not found in {path}"))?;
        indices.push((idx, *feature));
    }
    let outcome_idx = headers.iter().position(|h| h == OUTCOME_COLUMN);
    if require_outcome && outcome_idx.is_none() {
        return Err(format!("required column '{OUTCOME_COLUMN}' not found in {path}").into());
    }

    let mut records = Vec::new();
    let mut columns: AHashMap<String, Vec<f64>> = COLUMNS
        .iter()
        .map(|(_, feature)| (feature.to_string(), Vec::new()))
        .collect();
    let mut outcomes = Vec::new();

    for (row_number, row) in reader.records().enumerate() {
        let row = row?;
        let mut parsed = Vec::with_capacity(indices.len());
        for &(idx, feature) in &indices {
            match row.get(idx).and_then(|cell| cell.trim().parse::<f64>().ok()) {
                Some(value) if value.is_finite() => parsed.push((feature, value)),
                _ => {
                    log::warn!(
                        "row {}: missing or unparsable '{}'; record skipped",
                        row_number + 1,
                        feature
                    );
                    parsed.clear();
                    break;
                }
            }
        }
        if parsed.is_empty() {
            continue;
        }

        let outcome = outcome_idx
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.trim().parse::<u8>().ok());
        if require_outcome && outcome.is_none() {
            log::warn!(
                "row {}: missing or unparsable outcome; record skipped",
                row_number + 1
            );
            continue;
        }

        let mut record = PatientRecord::new();
        for &(feature, value) in &parsed {
            record.set(feature, value);
            if let Some(column) = columns.get_mut(feature) {
                column.push(value);
            }
        }
        records.push(record);
        outcomes.push(outcome);
    }

    Ok(Dataset {
        records,
        columns,
        outcomes,
    })
}

fn calibrate_command(
    data_path: &str,
    model_out: &str,
    report_out: Option<&str>,
    config: PipelineConfig,
) -> Result<(), Box<dyn Error>> {
    println!("Loading dataset from: {}", data_path);
    let dataset = load_dataset(data_path, true)?;
    println!("Loaded {} complete record(s)", dataset.records.len());

    let specs = diabetes::feature_specs();
    let pipeline = RiskPipeline::build(&dataset.columns, specs.clone(), diabetes::rules(), config)?;
    for spec in &specs {
        if let Some(model) = pipeline.feature_models().get(&spec.name) {
            println!("{}: fpc = {:.4}", spec.name, model.fpc);
        }
    }

    println!("Scoring {} record(s)...", dataset.records.len());
    let results = pipeline.score_batch(&dataset.records);

    let mut scores = Vec::new();
    let mut labels = Vec::new();
    let mut report_rows = Vec::new();
    let mut skipped = 0usize;
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(inference) => {
                let Some(outcome) = dataset.outcomes[i] else {
                    continue;
                };
                scores.push(inference.score);
                labels.push(outcome);
                report_rows.push((i, inference.score, outcome));
            }
            Err(e) => {
                log::warn!("record {}: {}; skipped", i, e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        println!("Skipped {} record(s) with no confident prediction", skipped);
    }

    let thresholds = threshold::calibrate(&scores, &labels)?;
    println!(
        "Optimal binary threshold (max F1): {:.2}",
        thresholds.optimal_binary_threshold
    );
    println!(
        "Risk bands: Low < {:.2} <= Medium < {:.2} <= High",
        thresholds.low_medium_threshold, thresholds.medium_high_threshold
    );

    let matrix = ConfusionMatrix::from_scores(&scores, &labels, thresholds.optimal_binary_threshold)?;
    println!(
        "Accuracy: {:.4}  Precision: {:.4}  Recall: {:.4}  F1: {:.4}",
        matrix.accuracy(),
        matrix.precision(),
        matrix.recall(),
        matrix.f1()
    );
    println!("ROC AUC: {:.4}", roc_auc(&roc_points(&scores, &labels)?));

    let fitted = pipeline.fitted_model(Some(thresholds));
    fitted.save(model_out)?;
    println!("Model saved to: {}", model_out);

    if let Some(report_path) = report_out {
        let mut writer = csv::Writer::from_path(report_path)?;
        writer.write_record(["record", "score", "category", "outcome"])?;
        for (i, score, outcome) in report_rows {
            writer.write_record(&[
                i.to_string(),
                format!("{score:.4}"),
                thresholds.categorize(score).to_string(),
                outcome.to_string(),
            ])?;
        }
        writer.flush()?;
        println!("Report saved to: {}", report_path);
    }
    Ok(())
}

fn score_command(data_path: &str, model_path: &str, out_path: &str) -> Result<(), Box<dyn Error>> {
    println!("Loading model from: {}", model_path);
    let model = FittedModel::load(model_path)?;
    let thresholds = model
        .thresholds
        .ok_or("model has no calibrated thresholds; run `fuzzrisk calibrate` first")?;
    let engine = model.to_engine(diabetes::rules())?;

    println!("Loading dataset from: {}", data_path);
    let dataset = load_dataset(data_path, false)?;
    println!("Scoring {} record(s)...", dataset.records.len());
    let results = engine.score_batch(&dataset.records);

    let mut writer = csv::Writer::from_path(out_path)?;
    writer.write_record(["record", "score", "category", "decision"])?;
    let mut skipped = 0usize;
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(inference) => {
                writer.write_record(&[
                    i.to_string(),
                    format!("{:.4}", inference.score),
                    thresholds.categorize(inference.score).to_string(),
                    u8::from(thresholds.decide(inference.score)).to_string(),
                ])?;
            }
            Err(e) => {
                log::warn!("record {}: {}; skipped", i, e);
                skipped += 1;
            }
        }
    }
    writer.flush()?;
    if skipped > 0 {
        println!("Skipped {} record(s) with no confident prediction", skipped);
    }
    println!("Scores saved to: {}", out_path);
    Ok(())
}
