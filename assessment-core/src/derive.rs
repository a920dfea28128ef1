//! Fields derived from findings and ranked differentials.

use crate::{AssessmentConfig, ClinicalFinding, Diagnosis, UrgencyLevel};

const HIGH_URGENCY_KEYWORDS: [&str; 6] = [
    "acute",
    "severe",
    "critical",
    "emergency",
    "chest pain",
    "shortness of breath",
];

const MEDIUM_URGENCY_KEYWORDS: [&str; 3] = ["moderate", "worsening", "persistent"];

const RED_FLAG_KEYWORDS: [&str; 8] = [
    "severe",
    "acute",
    "sudden",
    "worsening",
    "unable to",
    "chest pain",
    "shortness of breath",
    "loss of consciousness",
];

const CONDITION_RISK_FACTORS: [(&str, &str); 3] = [
    ("diabetes", "Diabetes mellitus"),
    ("hypertension", "Hypertension"),
    ("smoking", "Smoking history"),
];

/// `findings_weight * mean(finding confidence) + diagnoses_weight * mean(diagnosis confidence)`.
///
/// An empty list contributes 0.0 to its term.
pub fn confidence_score(
    findings: &[ClinicalFinding],
    diagnoses: &[Diagnosis],
    config: &AssessmentConfig,
) -> f64 {
    let findings_mean = mean(findings.iter().map(|finding| finding.confidence));
    let diagnoses_mean = mean(diagnoses.iter().map(|diagnosis| diagnosis.confidence));
    findings_mean * config.findings_weight + diagnoses_mean * config.diagnoses_weight
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Keyword triage over the findings text. Never returns `Critical`.
pub fn urgency_level(findings_text: &str) -> UrgencyLevel {
    if HIGH_URGENCY_KEYWORDS
        .iter()
        .any(|kw| findings_text.contains(kw))
    {
        UrgencyLevel::High
    } else if MEDIUM_URGENCY_KEYWORDS
        .iter()
        .any(|kw| findings_text.contains(kw))
    {
        UrgencyLevel::Medium
    } else {
        UrgencyLevel::Low
    }
}

/// Whether follow-up is needed and within which window.
pub fn follow_up_policy(
    urgency: UrgencyLevel,
    diagnoses: &[Diagnosis],
) -> (bool, Option<String>) {
    match urgency {
        UrgencyLevel::Critical | UrgencyLevel::High => (true, Some("24-48 hours".to_string())),
        UrgencyLevel::Medium => (true, Some("1-2 weeks".to_string())),
        UrgencyLevel::Low if !diagnoses.is_empty() => (true, Some("2-4 weeks".to_string())),
        UrgencyLevel::Low => (false, None),
    }
}

/// Age band plus condition keywords, one entry per matching finding.
pub fn risk_factors(
    age: Option<i32>,
    findings: &[ClinicalFinding],
    config: &AssessmentConfig,
) -> Vec<String> {
    let mut factors = Vec::new();

    if let Some(age) = age {
        if age > config.advanced_age_years {
            factors.push(format!("Advanced age (>{} years)", config.advanced_age_years));
        } else if age > config.middle_age_years {
            factors.push(format!(
                "Middle age ({}-{} years)",
                config.middle_age_years, config.advanced_age_years
            ));
        }
    }

    for finding in findings {
        let lower = finding.description.to_lowercase();
        for (keyword, label) in CONDITION_RISK_FACTORS {
            if lower.contains(keyword) {
                factors.push(label.to_string());
            }
        }
    }

    factors
}

/// Findings containing a red-flag keyword, echoed verbatim.
pub fn red_flags(findings: &[ClinicalFinding]) -> Vec<String> {
    findings
        .iter()
        .filter(|finding| {
            let lower = finding.description.to_lowercase();
            RED_FLAG_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .map(|finding| format!("Red flag: {}", finding.description))
        .collect()
}

pub fn treatment_recommendations(primary: Option<&Diagnosis>) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(primary) = primary {
        recommendations.push(format!("Consider treatment for {}", primary.name));
        recommendations.push("Monitor response to treatment".to_string());
        recommendations.push("Adjust therapy based on clinical response".to_string());
    }

    recommendations.push("Patient education on condition and management".to_string());
    recommendations.push("Lifestyle modifications as appropriate".to_string());
    recommendations
}

pub fn monitoring_requirements(urgency: UrgencyLevel) -> Vec<String> {
    let lines: [&str; 3] = match urgency {
        UrgencyLevel::Critical | UrgencyLevel::High => [
            "Continuous vital signs monitoring",
            "Frequent clinical assessment",
            "Laboratory monitoring as indicated",
        ],
        UrgencyLevel::Medium => [
            "Regular vital signs",
            "Symptom monitoring",
            "Follow-up laboratory tests",
        ],
        UrgencyLevel::Low => [
            "Routine follow-up",
            "Symptom monitoring",
            "Annual screening as appropriate",
        ],
    };
    lines.iter().map(|line| line.to_string()).collect()
}

// Allergy and medication data are not part of the record yet.
pub fn contraindications() -> Vec<String> {
    vec![
        "Verify drug allergies before prescribing".to_string(),
        "Check for drug interactions".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::FindingType;

    fn finding(description: &str, confidence: f64) -> ClinicalFinding {
        ClinicalFinding {
            finding_type: FindingType::Symptom,
            description: description.to_string(),
            confidence,
            source: "anamnesis".to_string(),
            icd10_codes: BTreeSet::new(),
            snomed_codes: BTreeSet::new(),
        }
    }

    fn diagnosis(confidence: f64) -> Diagnosis {
        Diagnosis {
            code: "R50.9".to_string(),
            name: "Fever, unspecified".to_string(),
            confidence,
            probability: confidence,
            evidence: Vec::new(),
            differential_rank: 1,
        }
    }

    #[test]
    fn confidence_score_weights_both_means() {
        let config = AssessmentConfig::default();
        let score = confidence_score(
            &[finding("a", 0.8), finding("b", 0.9)],
            &[diagnosis(0.5), diagnosis(0.7)],
            &config,
        );
        assert!((score - (0.85 * 0.6 + 0.6 * 0.4)).abs() < 1e-9);
    }

    #[test]
    fn confidence_score_without_diagnoses_only_counts_findings() {
        let score = confidence_score(&[finding("a", 0.8)], &[], &AssessmentConfig::default());
        assert!((score - 0.48).abs() < 1e-9);
        assert_eq!(confidence_score(&[], &[], &AssessmentConfig::default()), 0.0);
    }

    #[test]
    fn urgency_tiers() {
        assert_eq!(urgency_level("sudden chest pain"), UrgencyLevel::High);
        assert_eq!(urgency_level("persistent cough"), UrgencyLevel::Medium);
        assert_eq!(urgency_level("routine check"), UrgencyLevel::Low);
        assert_eq!(urgency_level(""), UrgencyLevel::Low);
    }

    #[test]
    fn follow_up_windows() {
        assert_eq!(
            follow_up_policy(UrgencyLevel::High, &[]),
            (true, Some("24-48 hours".to_string()))
        );
        assert_eq!(
            follow_up_policy(UrgencyLevel::Critical, &[]),
            (true, Some("24-48 hours".to_string()))
        );
        assert_eq!(
            follow_up_policy(UrgencyLevel::Medium, &[]),
            (true, Some("1-2 weeks".to_string()))
        );
        assert_eq!(
            follow_up_policy(UrgencyLevel::Low, &[diagnosis(0.5)]),
            (true, Some("2-4 weeks".to_string()))
        );
        assert_eq!(follow_up_policy(UrgencyLevel::Low, &[]), (false, None));
    }

    #[test]
    fn risk_factors_cover_every_condition_in_a_finding() {
        let factors = risk_factors(
            None,
            &[finding("patient has diabetes and hypertension", 0.8)],
            &AssessmentConfig::default(),
        );
        assert_eq!(factors, vec!["Diabetes mellitus", "Hypertension"]);
    }

    #[test]
    fn risk_factor_age_bands() {
        let config = AssessmentConfig::default();
        assert_eq!(risk_factors(Some(70), &[], &config), vec!["Advanced age (>65 years)"]);
        assert_eq!(risk_factors(Some(65), &[], &config), vec!["Middle age (50-65 years)"]);
        assert_eq!(risk_factors(Some(51), &[], &config), vec!["Middle age (50-65 years)"]);
        assert!(risk_factors(Some(50), &[], &config).is_empty());
        assert!(risk_factors(Some(49), &[], &config).is_empty());
    }

    #[test]
    fn risk_factors_repeat_per_matching_finding() {
        let factors = risk_factors(
            None,
            &[finding("smoking", 0.8), finding("Smoking 20 pack years", 0.8)],
            &AssessmentConfig::default(),
        );
        assert_eq!(factors, vec!["Smoking history", "Smoking history"]);
    }

    #[test]
    fn red_flags_echo_each_matching_finding() {
        let flags = red_flags(&[
            finding("Sudden onset headache", 0.8),
            finding("mild rash", 0.8),
            finding("Sudden onset headache", 0.8),
        ]);
        assert_eq!(
            flags,
            vec![
                "Red flag: Sudden onset headache",
                "Red flag: Sudden onset headache"
            ]
        );
    }

    #[test]
    fn treatment_mentions_primary() {
        let primary = diagnosis(0.5);
        let lines = treatment_recommendations(Some(&primary));
        assert_eq!(lines[0], "Consider treatment for Fever, unspecified");
        assert_eq!(lines.len(), 5);
        assert_eq!(treatment_recommendations(None).len(), 2);
    }

    #[test]
    fn monitoring_by_tier() {
        assert_eq!(
            monitoring_requirements(UrgencyLevel::High)[0],
            "Continuous vital signs monitoring"
        );
        assert_eq!(monitoring_requirements(UrgencyLevel::Medium)[0], "Regular vital signs");
        assert_eq!(monitoring_requirements(UrgencyLevel::Low)[0], "Routine follow-up");
    }
}
