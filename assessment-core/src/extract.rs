//! Finding extractor: normalized record and image analyses to typed findings.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    find_related_codes, AssessmentConfig, ClinicalFinding, CodedDiagnosis, FindingType,
    ImageAnalysis, KnowledgeBase, PatientData,
};

const ANAMNESIS_SOURCE: &str = "anamnesis";
const EXISTING_DIAGNOSIS_SOURCE: &str = "existing_diagnosis";
const UNKNOWN_CONDITION: &str = "Unknown condition";

/// The parts of a patient record the pipeline reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PatientRecord {
    pub birth_date: Option<String>,
    /// Free-text history entries, one finding each.
    pub history: Vec<String>,
    pub diagnoses: Vec<CodedDiagnosis>,
}

impl PatientRecord {
    /// Age in whole years on `today`, if a usable birth date is present.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let birth_date = self.birth_date.as_deref().and_then(parse_birth_date)?;
        age_on(birth_date, today)
    }
}

impl From<&PatientData> for PatientRecord {
    fn from(data: &PatientData) -> Self {
        let history = if data.anamnesis.trim().is_empty() {
            Vec::new()
        } else {
            vec![data.anamnesis.clone()]
        };

        Self {
            birth_date: data.patient.birth_date.clone(),
            history,
            diagnoses: data.diagnoses.clone(),
        }
    }
}

/// Build findings from history entries, recorded diagnoses and imaging text,
/// in that order.
pub fn extract_findings(
    record: &PatientRecord,
    analyses: &[ImageAnalysis],
    knowledge: &KnowledgeBase,
    config: &AssessmentConfig,
) -> Vec<ClinicalFinding> {
    let mut findings = Vec::new();

    for entry in &record.history {
        findings.push(ClinicalFinding {
            finding_type: FindingType::Symptom,
            description: entry.clone(),
            confidence: config.anamnesis_confidence,
            source: ANAMNESIS_SOURCE.to_string(),
            icd10_codes: find_related_codes(entry, knowledge.icd10()),
            snomed_codes: find_related_codes(entry, knowledge.snomed()),
        });
    }

    for diagnosis in &record.diagnoses {
        let description = if diagnosis.name.trim().is_empty() {
            UNKNOWN_CONDITION.to_string()
        } else {
            diagnosis.name.clone()
        };

        let code = diagnosis.code.trim();
        let icd10_codes = if code.is_empty() {
            Default::default()
        } else {
            [code.to_string()].into_iter().collect()
        };

        findings.push(ClinicalFinding {
            finding_type: FindingType::Sign,
            snomed_codes: find_related_codes(&diagnosis.name, knowledge.snomed()),
            description,
            confidence: config.existing_diagnosis_confidence,
            source: EXISTING_DIAGNOSIS_SOURCE.to_string(),
            icd10_codes,
        });
    }

    for analysis in analyses {
        let source = format!("radiology_{}", analysis.process_name);
        for text in &analysis.findings {
            let confidence = analysis
                .confidence_scores
                .get(text)
                .copied()
                .unwrap_or(config.imaging_default_confidence)
                .clamp(0.0, 1.0);

            findings.push(ClinicalFinding {
                finding_type: FindingType::Imaging,
                description: text.clone(),
                confidence,
                source: source.clone(),
                icd10_codes: find_related_codes(text, knowledge.icd10()),
                snomed_codes: find_related_codes(text, knowledge.snomed()),
            });
        }
    }

    tracing::debug!(
        history = record.history.len(),
        diagnoses = record.diagnoses.len(),
        analyses = analyses.len(),
        findings = findings.len(),
        "extracted clinical findings"
    );

    findings
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive ISO timestamps.
pub fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|datetime| datetime.date())
}

/// Whole years between `birth_date` and `today`; `None` for future birth dates.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<i32> {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }

    if age >= 0 {
        Some(age)
    } else {
        None
    }
}
