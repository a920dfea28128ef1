//! Human-readable account of how an assessment was reached.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AssessmentResult, ClinicalFinding, FindingType, PatientData, PatientRecord};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplainableInsights {
    pub decision_path: Vec<String>,
    pub key_factors: Vec<String>,
    pub confidence_breakdown: BTreeMap<String, f64>,
    pub alternative_scenarios: Vec<String>,
    pub limitations: Vec<String>,
    pub data_quality: DataQuality,
}

/// Availability of each input section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataQuality {
    pub patient_demographics: String,
    pub medical_history: String,
    pub existing_diagnoses: String,
    pub radiology_images: String,
    pub overall_quality: String,
}

/// Explain `result`, which must have been computed from `data`.
pub fn explain(result: &AssessmentResult, data: &PatientData, today: NaiveDate) -> ExplainableInsights {
    ExplainableInsights {
        decision_path: decision_path(result),
        key_factors: key_factors(result, data, today),
        confidence_breakdown: confidence_breakdown(result),
        alternative_scenarios: [
            "Consider alternative diagnosis if symptoms persist",
            "Rule out other conditions with similar presentation",
            "Monitor for progression of symptoms",
            "Consider additional diagnostic tests if indicated",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        limitations: limitations(data),
        data_quality: data_quality(data),
    }
}

fn decision_path(result: &AssessmentResult) -> Vec<String> {
    let mut path = vec![format!(
        "Extracted {} clinical findings",
        result.clinical_findings.len()
    )];

    if result.radiology_analysis.is_some() {
        let imaging = count_of(&result.clinical_findings, FindingType::Imaging);
        path.push(format!("Correlated {imaging} imaging findings"));
    }

    path.push(format!(
        "Ranked {} differential diagnoses",
        result.differential_diagnoses.len()
    ));
    if let Some(primary) = &result.primary_diagnosis {
        path.push(format!("Selected {} ({}) as primary", primary.name, primary.code));
    }
    path.push(format!("Overall confidence {:.2}", result.confidence_score));
    path.push(format!("Urgency level {}", result.urgency_level.as_str()));
    path
}

fn key_factors(result: &AssessmentResult, data: &PatientData, today: NaiveDate) -> Vec<String> {
    let mut factors = vec![format!("Patient gender: {}", data.patient.gender.as_str())];

    if let Some(age) = PatientRecord::from(data).age_on(today) {
        factors.push(format!("Patient age: {age}"));
    }
    if !data.anamnesis.trim().is_empty() {
        factors.push("Medical history available for analysis".to_string());
    }
    if !data.diagnoses.is_empty() {
        factors.push(format!(
            "Existing diagnoses: {} conditions",
            data.diagnoses.len()
        ));
    }
    if result.radiology_analysis.is_some() {
        factors.push("Radiology imaging analysis completed".to_string());
    }
    factors
}

fn confidence_breakdown(result: &AssessmentResult) -> BTreeMap<String, f64> {
    let findings = &result.clinical_findings;
    let imaging: Vec<f64> = findings
        .iter()
        .filter(|f| f.finding_type == FindingType::Imaging)
        .map(|f| f.confidence)
        .collect();

    BTreeMap::from([
        (
            "clinical_findings".to_string(),
            average(findings.iter().map(|f| f.confidence).collect()),
        ),
        ("imaging_analysis".to_string(), average(imaging)),
        (
            "diagnostic_algorithms".to_string(),
            average(
                result
                    .differential_diagnoses
                    .iter()
                    .map(|d| d.confidence)
                    .collect(),
            ),
        ),
        ("overall_assessment".to_string(), result.confidence_score),
    ])
}

fn limitations(data: &PatientData) -> Vec<String> {
    let mut limitations: Vec<String> = [
        "Rule-based analysis is for decision support only, not a replacement for clinical judgment",
        "Limited by quality and completeness of input data",
        "May not capture all clinical nuances and patient-specific factors",
        "Requires validation by qualified healthcare professionals",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if data.radiology_images.is_empty() {
        limitations.push("No radiology images available for analysis".to_string());
    }
    if data.anamnesis.trim().is_empty() {
        limitations.push("Limited medical history information".to_string());
    }
    limitations
}

fn data_quality(data: &PatientData) -> DataQuality {
    let demographics = !data.patient.name.trim().is_empty() && data.patient.birth_date.is_some();
    let history = !data.anamnesis.trim().is_empty();
    let images = !data.radiology_images.is_empty();

    let label = |present: bool, yes: &str, no: &str| (if present { yes } else { no }).to_string();

    DataQuality {
        patient_demographics: label(demographics, "complete", "incomplete"),
        medical_history: label(history, "available", "missing"),
        existing_diagnoses: label(!data.diagnoses.is_empty(), "available", "none"),
        radiology_images: label(images, "available", "none"),
        overall_quality: label(demographics && history && images, "good", "limited"),
    }
}

fn count_of(findings: &[ClinicalFinding], kind: FindingType) -> usize {
    findings.iter().filter(|f| f.finding_type == kind).count()
}

fn average(values: Vec<f64>) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiagnosticEngine, Gender, Patient};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    #[test]
    fn explains_a_sparse_record() {
        let data = PatientData {
            patient: Patient {
                gender: Gender::Male,
                birth_date: Some("1980-01-01".to_string()),
                ..Default::default()
            },
            anamnesis: "chest pain".to_string(),
            ..Default::default()
        };
        let engine = DiagnosticEngine::default();
        let result = engine.assess_at(&PatientRecord::from(&data), &[], today());
        let insights = explain(&result, &data, today());

        assert_eq!(insights.key_factors[0], "Patient gender: male");
        assert_eq!(insights.key_factors[1], "Patient age: 46");
        assert!(insights
            .limitations
            .contains(&"No radiology images available for analysis".to_string()));
        assert_eq!(insights.data_quality.patient_demographics, "incomplete");
        assert_eq!(insights.data_quality.overall_quality, "limited");
        assert_eq!(insights.confidence_breakdown["imaging_analysis"], 0.0);
        assert_eq!(
            insights.confidence_breakdown["overall_assessment"],
            result.confidence_score
        );
        assert_eq!(insights.decision_path.last().map(String::as_str), Some("Urgency level high"));
    }
}
