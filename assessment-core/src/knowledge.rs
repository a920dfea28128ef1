//! Code tables (ICD-10, SNOMED-CT) and the diagnostic rule table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{AssessmentError, UrgencyLevel};

const SEARCH_LIMIT: usize = 10;

/// One row of a code table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeEntry {
    pub code: String,
    pub name: String,
    pub category: String,
}

impl CodeEntry {
    pub fn new(code: &str, name: &str, category: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            category: category.to_string(),
        }
    }
}

/// Ordered code table. Iteration follows insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CodeTable {
    entries: Vec<CodeEntry>,
}

impl CodeTable {
    pub fn new(entries: Vec<CodeEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, code: &str) -> Option<&CodeEntry> {
        self.entries.iter().find(|entry| entry.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring search on code or name, at most ten hits in table order.
    pub fn search(&self, query: &str) -> Vec<&CodeEntry> {
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| {
                entry.code.to_lowercase().contains(&needle)
                    || entry.name.to_lowercase().contains(&needle)
            })
            .take(SEARCH_LIMIT)
            .collect()
    }
}

/// Coarse token membership lookup.
///
/// An entry matches when the lowercased `text` contains any whitespace token
/// of the entry's lowercased name as a substring. Single-word overlap is
/// enough, so false positives are expected (`"shortness of breath"` hits any
/// name containing the token `of`).
pub fn find_related_codes(text: &str, table: &CodeTable) -> BTreeSet<String> {
    let haystack = text.to_lowercase();
    table
        .entries
        .iter()
        .filter(|entry| {
            entry
                .name
                .to_lowercase()
                .split_whitespace()
                .any(|token| haystack.contains(token))
        })
        .map(|entry| entry.code.clone())
        .collect()
}

/// A trigger-phrase rule that surfaces a fixed list of candidate codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticRule {
    pub trigger_phrases: Vec<String>,
    /// ICD-10 codes in the order they enter the candidate list.
    pub candidate_codes: Vec<String>,
    pub urgency_hint: UrgencyLevel,
    pub required_tests: Vec<String>,
}

impl DiagnosticRule {
    /// True when any trigger phrase occurs in the lowercased findings text.
    pub fn is_triggered_by(&self, findings_text: &str) -> bool {
        self.trigger_phrases
            .iter()
            .any(|phrase| findings_text.contains(&phrase.to_lowercase()))
    }
}

/// Named group of rules. The name only organises the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleGroup {
    pub name: String,
    pub rules: Vec<DiagnosticRule>,
}

/// Immutable tables shared by every assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "KnowledgeBaseParts")]
pub struct KnowledgeBase {
    icd10: CodeTable,
    snomed: CodeTable,
    rules: Vec<RuleGroup>,
}

#[derive(Deserialize)]
struct KnowledgeBaseParts {
    icd10: CodeTable,
    snomed: CodeTable,
    rules: Vec<RuleGroup>,
}

impl TryFrom<KnowledgeBaseParts> for KnowledgeBase {
    type Error = AssessmentError;

    fn try_from(parts: KnowledgeBaseParts) -> Result<Self, Self::Error> {
        Self::new(parts.icd10, parts.snomed, parts.rules)
    }
}

impl KnowledgeBase {
    /// Build a knowledge base, rejecting rules that point at codes missing from `icd10`.
    pub fn new(
        icd10: CodeTable,
        snomed: CodeTable,
        rules: Vec<RuleGroup>,
    ) -> Result<Self, AssessmentError> {
        for group in &rules {
            for rule in &group.rules {
                if let Some(code) = rule
                    .candidate_codes
                    .iter()
                    .find(|code| !icd10.contains(code))
                {
                    return Err(AssessmentError::UnknownCode {
                        rule: group.name.clone(),
                        code: code.clone(),
                    });
                }
            }
        }

        Ok(Self {
            icd10,
            snomed,
            rules,
        })
    }

    /// The bundled demonstration tables.
    pub fn builtin() -> Self {
        Self {
            icd10: builtin_icd10(),
            snomed: builtin_snomed(),
            rules: builtin_rules(),
        }
    }

    pub fn icd10(&self) -> &CodeTable {
        &self.icd10
    }

    pub fn snomed(&self) -> &CodeTable {
        &self.snomed
    }

    pub fn rule_groups(&self) -> &[RuleGroup] {
        &self.rules
    }

    /// All rules flattened in table order.
    pub fn rules(&self) -> impl Iterator<Item = &DiagnosticRule> {
        self.rules.iter().flat_map(|group| group.rules.iter())
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_icd10() -> CodeTable {
    CodeTable::new(vec![
        CodeEntry::new(
            "I25.9",
            "Chronic ischemic heart disease, unspecified",
            "cardiovascular",
        ),
        CodeEntry::new(
            "J44.1",
            "Chronic obstructive pulmonary disease with acute exacerbation",
            "respiratory",
        ),
        CodeEntry::new("M79.3", "Panniculitis, unspecified", "musculoskeletal"),
        CodeEntry::new("R50.9", "Fever, unspecified", "symptoms"),
        CodeEntry::new(
            "Z00.00",
            "Encounter for general adult medical examination without abnormal findings",
            "examination",
        ),
        CodeEntry::new(
            "K21.9",
            "Gastro-esophageal reflux disease without esophagitis",
            "digestive",
        ),
        CodeEntry::new(
            "F32.9",
            "Major depressive disorder, single episode, unspecified",
            "mental",
        ),
        CodeEntry::new(
            "E11.9",
            "Type 2 diabetes mellitus without complications",
            "endocrine",
        ),
        CodeEntry::new("N18.6", "End stage renal disease", "genitourinary"),
        CodeEntry::new(
            "C78.00",
            "Secondary malignant neoplasm of unspecified lung",
            "neoplasms",
        ),
    ])
}

fn builtin_snomed() -> CodeTable {
    CodeTable::new(vec![
        CodeEntry::new("44054006", "Diabetes mellitus", "disorder"),
        CodeEntry::new("195967001", "Asthma", "disorder"),
        CodeEntry::new(
            "38341003",
            "Hypertensive disorder, systemic arterial",
            "disorder",
        ),
        CodeEntry::new("22253000", "Pain", "symptom"),
        CodeEntry::new("386053000", "Decision to admit", "procedure"),
        CodeEntry::new("225358003", "Chest pain", "symptom"),
        CodeEntry::new("267036007", "Dyspnea", "symptom"),
        CodeEntry::new("25064002", "Headache", "symptom"),
        CodeEntry::new("161891005", "History of myocardial infarction", "history"),
        CodeEntry::new("271737000", "Abnormal chest X-ray", "finding"),
    ])
}

fn builtin_rules() -> Vec<RuleGroup> {
    vec![
        group(
            "chest_pain",
            &["chest pain", "chest discomfort"],
            &["I25.9", "J44.1", "R50.9"],
            UrgencyLevel::High,
            &["ECG", "chest X-ray", "troponin"],
        ),
        group(
            "shortness_breath",
            &["dyspnea", "shortness of breath", "breathing difficulty"],
            &["J44.1", "I25.9", "C78.00"],
            UrgencyLevel::High,
            &["chest X-ray", "ABG", "pulse oximetry"],
        ),
        group(
            "fever",
            &["fever", "elevated temperature", "pyrexia"],
            &["R50.9", "J44.1", "K21.9"],
            UrgencyLevel::Medium,
            &["blood culture", "CBC", "chest X-ray"],
        ),
    ]
}

fn group(
    name: &str,
    triggers: &[&str],
    codes: &[&str],
    urgency_hint: UrgencyLevel,
    tests: &[&str],
) -> RuleGroup {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    RuleGroup {
        name: name.to_string(),
        rules: vec![DiagnosticRule {
            trigger_phrases: owned(triggers),
            candidate_codes: owned(codes),
            urgency_hint,
            required_tests: owned(tests),
        }],
    }
}
