//! Rule matching, candidate scoring and differential ranking.

use crate::{
    AssessmentConfig, ClinicalFinding, CodeEntry, Diagnosis, DiagnosticEvidence, KnowledgeBase,
};

const EVIDENCE_TYPE: &str = "clinical_finding";

/// Ranked differentials plus the tests requested by the rules that fired.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Differentials {
    pub diagnoses: Vec<Diagnosis>,
    /// Deduplicated, first-occurrence order.
    pub recommended_tests: Vec<String>,
}

/// Lowercased finding descriptions joined by single spaces.
pub fn findings_text(findings: &[ClinicalFinding]) -> String {
    findings
        .iter()
        .map(|finding| finding.description.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Match `findings` against every rule and rank the resulting candidates.
///
/// Candidates surfaced by more than one rule are kept once per rule. The sort
/// is stable, so equal scores keep rule-table order.
pub fn rank_differentials(
    findings: &[ClinicalFinding],
    knowledge: &KnowledgeBase,
    config: &AssessmentConfig,
) -> Differentials {
    let text = findings_text(findings);
    let mut candidates = Vec::new();
    let mut recommended_tests: Vec<String> = Vec::new();

    for rule in knowledge.rules() {
        if !rule.is_triggered_by(&text) {
            continue;
        }

        for test in &rule.required_tests {
            if !recommended_tests.contains(test) {
                recommended_tests.push(test.clone());
            }
        }

        for code in &rule.candidate_codes {
            let Some(entry) = knowledge.icd10().get(code) else {
                continue;
            };
            candidates.push(score_candidate(entry, findings, config));
        }
    }

    let surfaced = candidates.len();
    candidates.sort_by(|a, b| b.ranking_score().total_cmp(&a.ranking_score()));
    candidates.truncate(config.max_differentials);
    for (index, diagnosis) in candidates.iter_mut().enumerate() {
        diagnosis.differential_rank = index as u32 + 1;
    }

    tracing::debug!(surfaced, kept = candidates.len(), "ranked differentials");

    Differentials {
        diagnoses: candidates,
        recommended_tests,
    }
}

fn score_candidate(
    entry: &CodeEntry,
    findings: &[ClinicalFinding],
    config: &AssessmentConfig,
) -> Diagnosis {
    let evidence: Vec<DiagnosticEvidence> = findings
        .iter()
        .filter(|finding| finding.icd10_codes.contains(&entry.code))
        .map(|finding| DiagnosticEvidence {
            evidence_type: EVIDENCE_TYPE.to_string(),
            description: finding.description.clone(),
            strength: finding.confidence,
            source: finding.source.clone(),
        })
        .collect();

    let score = candidate_score(evidence.len(), config);

    Diagnosis {
        code: entry.code.clone(),
        name: entry.name.clone(),
        confidence: score,
        probability: score,
        evidence,
        differential_rank: 0,
    }
}

fn candidate_score(matching_findings: usize, config: &AssessmentConfig) -> f64 {
    let raw = config.base_diagnosis_confidence
        + config.confidence_per_finding * matching_findings as f64;
    raw.min(config.max_diagnosis_confidence)
}
