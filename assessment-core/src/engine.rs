//! Assessment entry point tying extraction, ranking and derivation together.

use chrono::{NaiveDate, Utc};

use crate::derive::{
    confidence_score, contraindications, follow_up_policy, monitoring_requirements, red_flags,
    risk_factors, treatment_recommendations, urgency_level,
};
use crate::{
    extract_findings, findings_text, rank_differentials, AssessmentConfig, AssessmentResult,
    CodeEntry, ImageAnalysis, ImageAnalyzer, KnowledgeBase, PatientData, PatientRecord,
};

/// Stateless scorer over an immutable knowledge base.
///
/// Holds no mutable state, so one engine can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticEngine {
    knowledge: KnowledgeBase,
    config: AssessmentConfig,
}

impl DiagnosticEngine {
    pub fn new(knowledge: KnowledgeBase, config: AssessmentConfig) -> Self {
        Self { knowledge, config }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    /// Assess a record using today's date for age-based risk factors.
    pub fn assess(&self, record: &PatientRecord, analyses: &[ImageAnalysis]) -> AssessmentResult {
        self.assess_at(record, analyses, Utc::now().date_naive())
    }

    /// Assess a record as of `today`. Identical inputs give identical results.
    pub fn assess_at(
        &self,
        record: &PatientRecord,
        analyses: &[ImageAnalysis],
        today: NaiveDate,
    ) -> AssessmentResult {
        let findings = extract_findings(record, analyses, &self.knowledge, &self.config);
        let ranked = rank_differentials(&findings, &self.knowledge, &self.config);
        let diagnoses = ranked.diagnoses;

        let text = findings_text(&findings);
        let urgency = urgency_level(&text);
        let (follow_up_required, follow_up_timeline) = follow_up_policy(urgency, &diagnoses);
        let primary_diagnosis = diagnoses.first().cloned();

        let result = AssessmentResult {
            confidence_score: confidence_score(&findings, &diagnoses, &self.config),
            risk_factors: risk_factors(record.age_on(today), &findings, &self.config),
            red_flags: red_flags(&findings),
            treatment_recommendations: treatment_recommendations(primary_diagnosis.as_ref()),
            monitoring_requirements: monitoring_requirements(urgency),
            contraindications: contraindications(),
            radiology_analysis: analyses.first().cloned(),
            recommended_tests: ranked.recommended_tests,
            urgency_level: urgency,
            follow_up_required,
            follow_up_timeline,
            primary_diagnosis,
            differential_diagnoses: diagnoses,
            clinical_findings: findings,
        };

        tracing::info!(
            findings = result.clinical_findings.len(),
            differentials = result.differential_diagnoses.len(),
            urgency = ?result.urgency_level,
            confidence = result.confidence_score,
            "assessment completed"
        );

        result
    }

    /// Run `analyzer` over the payload's radiology studies, then assess.
    pub fn assess_patient_data(
        &self,
        data: &PatientData,
        analyzer: &dyn ImageAnalyzer,
    ) -> AssessmentResult {
        let analyses = analyzer.analyze_all(&data.radiology_images);
        self.assess(&PatientRecord::from(data), &analyses)
    }

    pub fn search_icd10(&self, query: &str) -> Vec<&CodeEntry> {
        self.knowledge.icd10().search(query)
    }

    pub fn search_snomed(&self, query: &str) -> Vec<&CodeEntry> {
        self.knowledge.snomed().search(query)
    }
}
