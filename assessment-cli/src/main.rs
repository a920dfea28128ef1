use std::path::{Path, PathBuf};

use anyhow::Context;
use assessment_core::{
    clinical_recommendations, explain, AssessmentConfig, CodeEntry, DiagnosticEngine,
    ImageAnalyzer, KeywordImageAnalyzer, KnowledgeBase, PatientData,
};
use assessment_fhir::{bundle_from_patient_data, parse_input_str, validate_bundle};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "assessment-cli",
    about = "Rule-based differential diagnosis from patient payloads and FHIR bundles."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assess a patient payload or FHIR bundle and print the result as JSON.
    Assess {
        /// Path to the input JSON.
        #[arg(short, long)]
        input: PathBuf,
        /// JSON file overriding assessment constants.
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON file replacing the built-in code tables and rules.
        #[arg(long)]
        knowledge: Option<PathBuf>,
        /// Ignore radiology studies.
        #[arg(long)]
        skip_imaging: bool,
        /// Attach decision path and data quality notes.
        #[arg(long)]
        explain: bool,
        /// Print plain-text recommendations instead of JSON.
        #[arg(long, conflicts_with = "explain")]
        summary: bool,
    },
    /// Convert a patient payload into a FHIR collection bundle.
    Bundle {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Check the structure of a FHIR bundle.
    Validate {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Search the ICD-10 table by code or name.
    SearchIcd10 { query: String },
    /// Search the SNOMED CT table by code or name.
    SearchSnomed { query: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Args::parse().command {
        Command::Assess {
            input,
            config,
            knowledge,
            skip_imaging,
            explain: with_insights,
            summary,
        } => {
            let config = match config {
                Some(path) => serde_json::from_str::<AssessmentConfig>(&read(&path)?)
                    .with_context(|| format!("Invalid config file {path:?}"))?,
                None => AssessmentConfig::default(),
            };
            let knowledge = match knowledge {
                Some(path) => serde_json::from_str::<KnowledgeBase>(&read(&path)?)
                    .with_context(|| format!("Invalid knowledge file {path:?}"))?,
                None => KnowledgeBase::builtin(),
            };
            let engine = DiagnosticEngine::new(knowledge, config);

            let parsed = parse_input_str(&read(&input)?)?;
            let analyses = if skip_imaging {
                Vec::new()
            } else {
                KeywordImageAnalyzer.analyze_all(&parsed.studies)
            };
            let today = Utc::now().date_naive();
            let result = engine.assess_at(&parsed.record, &analyses, today);

            if summary {
                for line in clinical_recommendations(&result) {
                    println!("{line}");
                }
            } else if with_insights {
                let insights = explain(&result, &parsed.to_patient_data(), today);
                print_json(&json!({ "assessment": result, "insights": insights }))?;
            } else {
                print_json(&result)?;
            }
        }
        Command::Bundle { input } => {
            let data: PatientData = serde_json::from_str(&read(&input)?)
                .with_context(|| format!("Invalid patient payload {input:?}"))?;
            print_json(&bundle_from_patient_data(&data, Utc::now()))?;
        }
        Command::Validate { input } => {
            let bundle: serde_json::Value = serde_json::from_str(&read(&input)?)
                .with_context(|| format!("Invalid JSON in {input:?}"))?;
            let report = validate_bundle(&bundle);
            print_json(&report)?;
            if !report.valid {
                anyhow::bail!("bundle failed validation with {} error(s)", report.errors.len());
            }
        }
        Command::SearchIcd10 { query } => {
            print_codes(DiagnosticEngine::default().search_icd10(&query));
        }
        Command::SearchSnomed { query } => {
            print_codes(DiagnosticEngine::default().search_snomed(&query));
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Cannot read file {path:?}"))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_codes(entries: Vec<&CodeEntry>) {
    if entries.is_empty() {
        println!("No matching codes");
    }
    for entry in entries {
        println!("{}\t{}\t{}", entry.code, entry.name, entry.category);
    }
}
