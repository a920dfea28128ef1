//! Core model and scoring pipeline for rule-based clinical assessment.
//!
//! The pipeline has two stateless stages: the finding extractor turns a
//! [`PatientRecord`] (plus optional [`ImageAnalysis`] results) into typed
//! [`ClinicalFinding`]s, and the differential ranker scores those findings
//! against an immutable [`KnowledgeBase`] to produce an [`AssessmentResult`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

mod derive;
mod engine;
mod explain;
mod extract;
mod imaging;
mod knowledge;
mod patient;
mod rank;
mod report;

pub use derive::{
    confidence_score, contraindications, follow_up_policy, monitoring_requirements, red_flags,
    risk_factors, treatment_recommendations, urgency_level,
};
pub use engine::DiagnosticEngine;
pub use explain::{explain, DataQuality, ExplainableInsights};
pub use extract::{age_on, extract_findings, parse_birth_date, PatientRecord};
pub use imaging::{
    fallback_analysis, study_severity, ImageAnalysis, ImageAnalyzer, KeywordImageAnalyzer,
    StudySeverity,
};
pub use knowledge::{find_related_codes, CodeEntry, CodeTable, DiagnosticRule, KnowledgeBase, RuleGroup};
pub use patient::{CodedDiagnosis, FileData, Gender, Patient, PatientData, RadiologyStudy};
pub use rank::{findings_text, rank_differentials, Differentials};
pub use report::clinical_recommendations;

/// Tunable constants of the extraction and scoring stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Confidence given to findings taken from free-text history.
    pub anamnesis_confidence: f64,
    /// Confidence given to findings taken from already recorded diagnoses.
    pub existing_diagnosis_confidence: f64,
    /// Confidence for an imaging finding the analysis did not score.
    pub imaging_default_confidence: f64,
    pub base_diagnosis_confidence: f64,
    /// Added per finding that references the candidate code.
    pub confidence_per_finding: f64,
    /// Hard cap for diagnosis confidence and probability.
    pub max_diagnosis_confidence: f64,
    /// Length of the ranked differential list.
    pub max_differentials: usize,
    pub findings_weight: f64,
    pub diagnoses_weight: f64,
    /// Strictly older than this counts as advanced age.
    pub advanced_age_years: i32,
    /// Strictly older than this (and not advanced) counts as middle age.
    pub middle_age_years: i32,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            anamnesis_confidence: 0.8,
            existing_diagnosis_confidence: 0.9,
            imaging_default_confidence: 0.7,
            base_diagnosis_confidence: 0.5,
            confidence_per_finding: 0.1,
            max_diagnosis_confidence: 0.9,
            max_differentials: 5,
            findings_weight: 0.6,
            diagnoses_weight: 0.4,
            advanced_age_years: 65,
            middle_age_years: 50,
        }
    }
}

/// Kind of observed clinical fact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    Symptom,
    Sign,
    Lab,
    Imaging,
    Vital,
}

/// Coarse triage tier. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    /// Never produced by the keyword scan, only by [`AssessmentResult::override_urgency`].
    Critical,
}

impl UrgencyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyLevel::Low => "low",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::High => "high",
            UrgencyLevel::Critical => "critical",
        }
    }
}

/// A single observed fact with provenance and candidate codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalFinding {
    pub finding_type: FindingType,
    pub description: String,
    pub confidence: f64,
    pub source: String,
    pub icd10_codes: BTreeSet<String>,
    pub snomed_codes: BTreeSet<String>,
}

/// One finding supporting a diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticEvidence {
    pub evidence_type: String,
    pub description: String,
    pub strength: f64,
    pub source: String,
}

/// A scored candidate diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    pub code: String,
    pub name: String,
    pub confidence: f64,
    pub probability: f64,
    pub evidence: Vec<DiagnosticEvidence>,
    /// 1-based position in the ranked list.
    pub differential_rank: u32,
}

impl Diagnosis {
    /// Ranking key: mean of confidence and probability.
    pub fn ranking_score(&self) -> f64 {
        (self.confidence + self.probability) / 2.0
    }
}

/// Everything produced by one assessment call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssessmentResult {
    pub primary_diagnosis: Option<Diagnosis>,
    pub differential_diagnoses: Vec<Diagnosis>,
    pub clinical_findings: Vec<ClinicalFinding>,
    pub confidence_score: f64,
    pub urgency_level: UrgencyLevel,
    #[serde(default)]
    pub radiology_analysis: Option<ImageAnalysis>,
    pub risk_factors: Vec<String>,
    pub follow_up_required: bool,
    pub follow_up_timeline: Option<String>,
    pub treatment_recommendations: Vec<String>,
    pub monitoring_requirements: Vec<String>,
    pub contraindications: Vec<String>,
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub recommended_tests: Vec<String>,
}

impl AssessmentResult {
    /// Replace the computed urgency and re-derive follow-up and monitoring.
    ///
    /// This is the only way to reach [`UrgencyLevel::Critical`].
    pub fn override_urgency(&mut self, level: UrgencyLevel) {
        let (required, timeline) = follow_up_policy(level, &self.differential_diagnoses);
        self.urgency_level = level;
        self.follow_up_required = required;
        self.follow_up_timeline = timeline;
        self.monitoring_requirements = monitoring_requirements(level);
    }
}

/// Errors raised by the assessment pipeline and its adapters.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("could not parse input: {0}")]
    Parse(String),
    #[error("rule '{rule}' references unknown ICD-10 code {code}")]
    UnknownCode { rule: String, code: String },
    #[error("image analysis failed: {0}")]
    Analysis(String),
}
