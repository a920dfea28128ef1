//! Pluggable image analysis producing text findings for the extractor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AssessmentError, RadiologyStudy};

const CONCERNING_KEYWORDS: [&str; 6] = ["acute", "abnormal", "pathology", "lesion", "mass", "bleeding"];
const FALLBACK_FINDING: &str = "Technical analysis unavailable - manual review recommended";

/// Overall severity of one imaging study.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StudySeverity {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

/// Text findings for one study, with per-finding confidence keyed by finding text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ImageAnalysis {
    pub process_name: String,
    pub findings: Vec<String>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
    pub severity: StudySeverity,
}

/// Something that can turn a radiology study into text findings.
pub trait ImageAnalyzer {
    fn analyze(&self, study: &RadiologyStudy) -> Result<ImageAnalysis, AssessmentError>;

    /// Analyze every study, substituting [`fallback_analysis`] for failures.
    fn analyze_all(&self, studies: &[RadiologyStudy]) -> Vec<ImageAnalysis> {
        studies
            .iter()
            .map(|study| match self.analyze(study) {
                Ok(analysis) => analysis,
                Err(err) => {
                    tracing::warn!(process = %study.process_name, error = %err, "image analysis fell back");
                    fallback_analysis(study)
                }
            })
            .collect()
    }
}

/// Placeholder analysis asking for manual review.
pub fn fallback_analysis(study: &RadiologyStudy) -> ImageAnalysis {
    ImageAnalysis {
        process_name: study.process_name.clone(),
        findings: vec![FALLBACK_FINDING.to_string()],
        confidence_scores: BTreeMap::from([(FALLBACK_FINDING.to_string(), 1.0)]),
        recommendations: vec!["Manual radiological interpretation required".to_string()],
        severity: StudySeverity::Unknown,
    }
}

/// Grade a study from its findings and the mean of its scores.
pub fn study_severity(confidence_scores: &BTreeMap<String, f64>, findings: &[String]) -> StudySeverity {
    if confidence_scores.is_empty() {
        return StudySeverity::Unknown;
    }

    let mean = confidence_scores.values().sum::<f64>() / confidence_scores.len() as f64;
    let concerning = findings.iter().any(|finding| {
        let lower = finding.to_lowercase();
        CONCERNING_KEYWORDS.iter().any(|kw| lower.contains(kw))
    });

    if concerning && mean > 0.8 {
        StudySeverity::High
    } else if concerning || mean < 0.6 {
        StudySeverity::Medium
    } else {
        StudySeverity::Low
    }
}

/// Stand-in analyzer that routes on the process name to canned findings.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordImageAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StudyKind {
    ChestXray,
    Ct,
    Mri,
    General,
}

impl StudyKind {
    fn classify(process_name: &str) -> Self {
        let lower = process_name.to_lowercase();
        if lower.contains("chest") {
            StudyKind::ChestXray
        } else if lower.contains("ct") {
            StudyKind::Ct
        } else if lower.contains("mri") {
            StudyKind::Mri
        } else {
            StudyKind::General
        }
    }

    fn findings(self) -> [(&'static str, f64); 3] {
        match self {
            StudyKind::ChestXray => [
                ("Bilateral lung fields appear clear", 0.85),
                ("Cardiac silhouette within normal limits", 0.90),
                ("No acute pulmonary abnormalities detected", 0.88),
            ],
            StudyKind::Ct => [
                ("No evidence of acute intracranial pathology", 0.92),
                ("Ventricular system appears normal", 0.88),
                ("No mass lesions identified", 0.90),
            ],
            StudyKind::Mri => [
                ("Normal brain parenchyma signal intensity", 0.89),
                ("No evidence of acute stroke", 0.94),
                ("White matter changes consistent with age", 0.82),
            ],
            StudyKind::General => [
                ("Images technically adequate for interpretation", 0.85),
                ("No obvious abnormalities detected", 0.75),
                ("Clinical correlation recommended", 0.90),
            ],
        }
    }

    fn recommendations(self) -> [&'static str; 3] {
        match self {
            StudyKind::ChestXray => [
                "Continue current treatment plan",
                "Follow up in 2-4 weeks if symptoms persist",
                "Consider additional imaging if clinical suspicion remains high",
            ],
            StudyKind::Ct => [
                "No immediate intervention required",
                "Consider clinical correlation with symptoms",
                "Follow up imaging if indicated by clinical course",
            ],
            StudyKind::Mri => [
                "No acute neurological intervention required",
                "Consider neuropsychological evaluation if cognitive concerns",
                "Routine follow-up as clinically indicated",
            ],
            StudyKind::General => [
                "Correlate with clinical presentation",
                "Consider additional imaging if clinical suspicion high",
                "Follow up as clinically indicated",
            ],
        }
    }
}

impl ImageAnalyzer for KeywordImageAnalyzer {
    fn analyze(&self, study: &RadiologyStudy) -> Result<ImageAnalysis, AssessmentError> {
        if study.files.is_empty() {
            return Err(AssessmentError::Analysis(format!(
                "study '{}' has no image files",
                study.process_name
            )));
        }

        let kind = StudyKind::classify(&study.process_name);
        let canned = kind.findings();
        let findings: Vec<String> = canned.iter().map(|(text, _)| text.to_string()).collect();
        let confidence_scores: BTreeMap<String, f64> = canned
            .iter()
            .map(|(text, score)| (text.to_string(), *score))
            .collect();
        let severity = study_severity(&confidence_scores, &findings);

        Ok(ImageAnalysis {
            process_name: study.process_name.clone(),
            findings,
            confidence_scores,
            recommendations: kind.recommendations().iter().map(|s| s.to_string()).collect(),
            severity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileData;

    fn study(name: &str, files: usize) -> RadiologyStudy {
        RadiologyStudy {
            process_name: name.to_string(),
            files: (0..files)
                .map(|i| FileData {
                    file_name: format!("img{i}.dcm"),
                    file_data: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn routes_on_process_name() {
        assert_eq!(StudyKind::classify("Chest CT"), StudyKind::ChestXray);
        assert_eq!(StudyKind::classify("Head CT"), StudyKind::Ct);
        assert_eq!(StudyKind::classify("Brain MRI"), StudyKind::Mri);
        assert_eq!(StudyKind::classify("Ultrasound"), StudyKind::General);
    }

    #[test]
    fn scores_are_keyed_by_finding_text() {
        let analysis = KeywordImageAnalyzer
            .analyze(&study("Brain MRI", 1))
            .expect("analysis");
        assert_eq!(analysis.findings.len(), 3);
        for finding in &analysis.findings {
            assert!(analysis.confidence_scores.contains_key(finding));
        }
        assert_eq!(analysis.confidence_scores["No evidence of acute stroke"], 0.94);
    }

    #[test]
    fn study_without_files_falls_back() {
        let analyses = KeywordImageAnalyzer.analyze_all(&[study("Chest X-Ray", 0), study("MRI", 2)]);
        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses[0].findings, vec![FALLBACK_FINDING.to_string()]);
        assert_eq!(analyses[0].severity, StudySeverity::Unknown);
        assert_eq!(analyses[1].process_name, "MRI");
    }

    #[test]
    fn severity_grading() {
        let findings = vec!["Acute bleeding".to_string()];
        let high = BTreeMap::from([("a".to_string(), 0.9)]);
        let low = BTreeMap::from([("a".to_string(), 0.5)]);
        let mid = BTreeMap::from([("a".to_string(), 0.7)]);

        assert_eq!(study_severity(&high, &findings), StudySeverity::High);
        assert_eq!(study_severity(&mid, &findings), StudySeverity::Medium);
        assert_eq!(study_severity(&low, &["clear".to_string()]), StudySeverity::Medium);
        assert_eq!(study_severity(&mid, &["clear".to_string()]), StudySeverity::Low);
        assert_eq!(study_severity(&BTreeMap::new(), &findings), StudySeverity::Unknown);
    }
}
