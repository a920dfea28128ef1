//! Plain-text recommendation lines for a finished assessment.

use crate::{AssessmentResult, UrgencyLevel};

/// Flatten an assessment into display lines for reports and terminals.
pub fn clinical_recommendations(result: &AssessmentResult) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(primary) = &result.primary_diagnosis {
        lines.push(format!("Primary diagnosis: {}", primary.name));
    }

    if !result.differential_diagnoses.is_empty() {
        lines.push("Consider differential diagnoses:".to_string());
        for (i, diagnosis) in result.differential_diagnoses.iter().take(3).enumerate() {
            lines.push(format!(
                "  {}. {} (confidence: {:.2})",
                i + 1,
                diagnosis.name,
                diagnosis.confidence
            ));
        }
    }

    match result.urgency_level {
        UrgencyLevel::Critical | UrgencyLevel::High => {
            lines.push("URGENT: Immediate medical attention required".to_string())
        }
        UrgencyLevel::Medium => {
            lines.push("MODERATE: Follow-up within 1-2 weeks recommended".to_string())
        }
        UrgencyLevel::Low => {}
    }

    if !result.red_flags.is_empty() {
        lines.push("RED FLAGS identified:".to_string());
        lines.extend(result.red_flags.iter().map(|flag| format!("  - {flag}")));
    }

    if !result.treatment_recommendations.is_empty() {
        lines.push("Treatment recommendations:".to_string());
        lines.extend(
            result
                .treatment_recommendations
                .iter()
                .map(|rec| format!("  - {rec}")),
        );
    }

    lines
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{DiagnosticEngine, PatientRecord};

    #[test]
    fn summarises_high_urgency_assessment() {
        let record = PatientRecord {
            history: vec!["severe chest pain".to_string()],
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date");
        let result = DiagnosticEngine::default().assess_at(&record, &[], today);
        let lines = clinical_recommendations(&result);

        assert_eq!(
            lines[0],
            "Primary diagnosis: Chronic ischemic heart disease, unspecified"
        );
        assert_eq!(lines[1], "Consider differential diagnoses:");
        assert_eq!(
            lines[2],
            "  1. Chronic ischemic heart disease, unspecified (confidence: 0.50)"
        );
        assert!(lines.contains(&"URGENT: Immediate medical attention required".to_string()));
        assert!(lines.contains(&"  - Red flag: severe chest pain".to_string()));
    }

    #[test]
    fn low_urgency_without_differentials_is_treatment_only() {
        let result = DiagnosticEngine::default().assess_at(
            &PatientRecord::default(),
            &[],
            NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date"),
        );
        let lines = clinical_recommendations(&result);
        assert_eq!(lines[0], "Treatment recommendations:");
        assert_eq!(lines.len(), 3);
    }
}
