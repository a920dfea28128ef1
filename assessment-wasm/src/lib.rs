//! Framework-neutral WASM <-> JavaScript bridge.

use assessment_core::{
    AssessmentConfig, AssessmentError, DiagnosticEngine, ImageAnalysis, ImageAnalyzer,
    KeywordImageAnalyzer, KnowledgeBase,
};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Partial override of [`AssessmentConfig`]; absent keys keep their defaults.
#[derive(Deserialize, Default)]
struct JsAssessmentConfig {
    #[serde(default)]
    anamnesis_confidence: Option<f64>,
    #[serde(default)]
    existing_diagnosis_confidence: Option<f64>,
    #[serde(default)]
    imaging_default_confidence: Option<f64>,
    #[serde(default)]
    max_differentials: Option<usize>,
    #[serde(default)]
    advanced_age_years: Option<i32>,
    #[serde(default)]
    middle_age_years: Option<i32>,
}

impl From<JsAssessmentConfig> for AssessmentConfig {
    fn from(cfg: JsAssessmentConfig) -> Self {
        let mut base = AssessmentConfig::default();
        if let Some(value) = cfg.anamnesis_confidence {
            base.anamnesis_confidence = value;
        }
        if let Some(value) = cfg.existing_diagnosis_confidence {
            base.existing_diagnosis_confidence = value;
        }
        if let Some(value) = cfg.imaging_default_confidence {
            base.imaging_default_confidence = value;
        }
        if let Some(value) = cfg.max_differentials {
            base.max_differentials = value;
        }
        if let Some(value) = cfg.advanced_age_years {
            base.advanced_age_years = value;
        }
        if let Some(value) = cfg.middle_age_years {
            base.middle_age_years = value;
        }
        base
    }
}

/// Assess a FHIR bundle or patient payload.
///
/// `imaging` is an optional array of precomputed image analyses. Without it the
/// record's radiology studies go through the keyword analyzer.
#[wasm_bindgen]
pub fn assess_record(
    input: JsValue,
    imaging: Option<JsValue>,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let input_value = from_value::<serde_json::Value>(input)
        .map_err(|err| JsValue::from_str(&format!("Cannot read input JSON: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsAssessmentConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Cannot read config: {err}")))?;
            AssessmentConfig::from(cfg)
        }
        None => AssessmentConfig::default(),
    };

    let parsed = assessment_fhir::parse_input(&input_value)
        .map_err(|err| JsValue::from_str(&format_assessment_error(err)))?;

    let analyses = match imaging {
        Some(js_imaging) => from_value::<Vec<ImageAnalysis>>(js_imaging)
            .map_err(|err| JsValue::from_str(&format!("Cannot read imaging analyses: {err}")))?,
        None => KeywordImageAnalyzer.analyze_all(&parsed.studies),
    };

    let engine = DiagnosticEngine::new(KnowledgeBase::builtin(), cfg);
    let result = engine.assess(&parsed.record, &analyses);

    to_value(&result).map_err(|err| JsValue::from_str(&format!("Cannot serialize assessment: {err}")))
}

/// Search the built-in `icd10` or `snomed` table.
#[wasm_bindgen]
pub fn search_codes(system: &str, query: &str) -> Result<JsValue, JsValue> {
    let knowledge = KnowledgeBase::builtin();
    let table = match system {
        "icd10" => knowledge.icd10(),
        "snomed" => knowledge.snomed(),
        other => return Err(JsValue::from_str(&format!("Unknown code system: {other}"))),
    };

    to_value(&table.search(query))
        .map_err(|err| JsValue::from_str(&format!("Cannot serialize codes: {err}")))
}

fn format_assessment_error(err: AssessmentError) -> String {
    format!("Assessment error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let js: JsAssessmentConfig =
            serde_json::from_str(r#"{"max_differentials": 3}"#).expect("config");
        let cfg = AssessmentConfig::from(js);
        assert_eq!(cfg.max_differentials, 3);
        assert_eq!(cfg.anamnesis_confidence, 0.8);
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(
            AssessmentConfig::from(JsAssessmentConfig::default()),
            AssessmentConfig::default()
        );
    }
}
