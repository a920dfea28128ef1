//! JSON and FHIR R4 adapters around the assessment pipeline.
//!
//! Input may be a FHIR `Bundle` or the raw patient payload of the upstream
//! API; both are normalized into an [`AssessmentInput`].

use assessment_core::{
    parse_birth_date, AssessmentError, AssessmentResult, CodedDiagnosis, DiagnosticEngine,
    FileData, Gender, ImageAnalyzer, Patient, PatientData, PatientRecord, RadiologyStudy,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const ICD10_SYSTEM: &str = "http://hl7.org/fhir/sid/icd-10";
const DICOM_SYSTEM: &str = "http://dicom.nema.org/resources/ontology/DCM";
const STUDY_CONCLUSION_PREFIX: &str = "Radiology study: ";

/// Everything the pipeline needs from one input document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssessmentInput {
    pub patient: Patient,
    pub record: PatientRecord,
    pub studies: Vec<RadiologyStudy>,
}

impl AssessmentInput {
    /// Rebuild a payload view. Multiple history entries are joined by newlines.
    pub fn to_patient_data(&self) -> PatientData {
        PatientData {
            patient: self.patient.clone(),
            anamnesis: self.record.history.join("\n"),
            diagnoses: self.record.diagnoses.clone(),
            radiology_images: self.studies.clone(),
        }
    }
}

impl From<PatientData> for AssessmentInput {
    fn from(data: PatientData) -> Self {
        Self {
            record: PatientRecord::from(&data),
            patient: data.patient,
            studies: data.radiology_images,
        }
    }
}

/// Parse an input document from a JSON string.
pub fn parse_input_str(input_json: &str) -> Result<AssessmentInput, AssessmentError> {
    let value: Value =
        serde_json::from_str(input_json).map_err(|err| AssessmentError::Parse(err.to_string()))?;
    parse_input(&value)
}

/// Parse an input document from a `serde_json::Value`.
///
/// Anything other than a JSON object is rejected with
/// [`AssessmentError::InvalidInput`]. Missing sections are not errors.
pub fn parse_input(value: &Value) -> Result<AssessmentInput, AssessmentError> {
    let Some(object) = value.as_object() else {
        return Err(AssessmentError::InvalidInput(format!(
            "expected a JSON object, received {}",
            json_kind(value)
        )));
    };

    match object.get("resourceType").and_then(Value::as_str) {
        Some("Bundle") => input_from_bundle(value),
        Some(other) => Err(AssessmentError::InvalidInput(format!(
            "expected resourceType Bundle, received {other}"
        ))),
        None => {
            let data: PatientData = serde_json::from_value(value.clone())
                .map_err(|err| AssessmentError::InvalidInput(err.to_string()))?;
            Ok(AssessmentInput::from(data))
        }
    }
}

/// Parse and assess in one step, analyzing any radiology studies with `analyzer`.
pub fn assess_value(
    engine: &DiagnosticEngine,
    value: &Value,
    analyzer: &dyn ImageAnalyzer,
) -> Result<AssessmentResult, AssessmentError> {
    assess_value_at(engine, value, analyzer, Utc::now().date_naive())
}

/// Like [`assess_value`] with an explicit reference date for age calculation.
pub fn assess_value_at(
    engine: &DiagnosticEngine,
    value: &Value,
    analyzer: &dyn ImageAnalyzer,
    today: NaiveDate,
) -> Result<AssessmentResult, AssessmentError> {
    let input = parse_input(value)?;
    let analyses = analyzer.analyze_all(&input.studies);
    Ok(engine.assess_at(&input.record, &analyses, today))
}

pub fn assess_str(
    engine: &DiagnosticEngine,
    input_json: &str,
    analyzer: &dyn ImageAnalyzer,
) -> Result<AssessmentResult, AssessmentError> {
    let value: Value =
        serde_json::from_str(input_json).map_err(|err| AssessmentError::Parse(err.to_string()))?;
    assess_value(engine, &value, analyzer)
}

fn input_from_bundle(bundle: &Value) -> Result<AssessmentInput, AssessmentError> {
    let entries: &[Value] = match bundle.get("entry") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(AssessmentError::InvalidInput(format!(
                "Bundle.entry must be an array, received {}",
                json_kind(other)
            )))
        }
    };

    let mut input = AssessmentInput::default();

    for entry in entries {
        let Some(resource) = entry.get("resource").filter(|r| r.is_object()) else {
            continue;
        };

        match resource
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default()
        {
            "Patient" => {
                input.patient = patient_from_resource(resource);
                input.record.birth_date = input.patient.birth_date.clone();
            }
            "Observation" => {
                if let Some(text) = resource.get("valueString").and_then(Value::as_str) {
                    input.record.history.push(text.to_string());
                }
            }
            "Condition" => input.record.diagnoses.push(diagnosis_from_condition(resource)),
            "DiagnosticReport" => input.studies.push(study_from_report(resource)),
            _ => {}
        }
    }

    tracing::debug!(
        entries = entries.len(),
        history = input.record.history.len(),
        diagnoses = input.record.diagnoses.len(),
        studies = input.studies.len(),
        "normalized FHIR bundle"
    );

    Ok(input)
}

fn patient_from_resource(resource: &Value) -> Patient {
    let id = match resource.get("id") {
        Some(Value::String(text)) => text.parse::<i64>().unwrap_or_default(),
        Some(Value::Number(number)) => number.as_i64().unwrap_or_default(),
        _ => 0,
    };

    let gender = resource
        .get("gender")
        .and_then(Value::as_str)
        .map(Gender::parse)
        .unwrap_or_default();

    Patient {
        id,
        identity_number: string_at(resource, "/identifier/0/value").unwrap_or_default(),
        name: string_at(resource, "/name/0/given/0").unwrap_or_default(),
        surname: string_at(resource, "/name/0/family").unwrap_or_default(),
        gender,
        birth_date: resource
            .get("birthDate")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn diagnosis_from_condition(resource: &Value) -> CodedDiagnosis {
    CodedDiagnosis {
        code: string_at(resource, "/code/coding/0/code").unwrap_or_default(),
        name: string_at(resource, "/code/coding/0/display").unwrap_or_default(),
    }
}

fn study_from_report(resource: &Value) -> RadiologyStudy {
    let process_name = resource
        .get("conclusion")
        .and_then(Value::as_str)
        .map(|text| {
            text.strip_prefix(STUDY_CONCLUSION_PREFIX)
                .unwrap_or(text)
                .to_string()
        })
        .unwrap_or_default();

    let files = resource
        .get("presentedForm")
        .and_then(Value::as_array)
        .map(|forms| {
            forms
                .iter()
                .map(|form| FileData {
                    file_name: form
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    file_data: form
                        .get("data")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    RadiologyStudy {
        process_name,
        files,
    }
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build a FHIR R4 `collection` Bundle from a patient payload.
pub fn bundle_from_patient_data(data: &PatientData, timestamp: DateTime<Utc>) -> Value {
    let stamp = timestamp.to_rfc3339();
    let patient_id = data.patient.id;
    let subject = json!({ "reference": format!("Patient/{patient_id}") });

    let mut entries = vec![post_entry("Patient", patient_resource(&data.patient))];

    if !data.anamnesis.trim().is_empty() {
        entries.push(post_entry(
            "Observation",
            json!({
                "resourceType": "Observation",
                "id": format!("anamnesis-{patient_id}"),
                "status": "final",
                "category": [{
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/observation-category",
                        "code": "history",
                        "display": "History"
                    }]
                }],
                "code": {
                    "coding": [{
                        "system": "http://loinc.org",
                        "code": "11369-6",
                        "display": "History of Past illness"
                    }]
                },
                "subject": subject,
                "valueString": data.anamnesis,
                "effectiveDateTime": stamp
            }),
        ));
    }

    for (i, diagnosis) in data.diagnoses.iter().enumerate() {
        entries.push(post_entry(
            "Condition",
            json!({
                "resourceType": "Condition",
                "id": format!("condition-{patient_id}-{i}"),
                "clinicalStatus": {
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/condition-clinical",
                        "code": "active",
                        "display": "Active"
                    }]
                },
                "verificationStatus": {
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/condition-ver-status",
                        "code": "confirmed",
                        "display": "Confirmed"
                    }]
                },
                "category": [{
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/condition-category",
                        "code": "encounter-diagnosis",
                        "display": "Encounter Diagnosis"
                    }]
                }],
                "code": {
                    "coding": [{
                        "system": ICD10_SYSTEM,
                        "code": diagnosis.code,
                        "display": diagnosis.name
                    }]
                },
                "subject": subject,
                "recordedDate": stamp
            }),
        ));
    }

    for (i, study) in data.radiology_images.iter().enumerate() {
        let study_id = format!("imaging-study-{patient_id}-{i}");
        let modality = json!({
            "system": DICOM_SYSTEM,
            "code": modality_code(&study.process_name)
        });
        let instances: Vec<Value> = (0..study.files.len())
            .map(|j| {
                json!({
                    "uid": format!("instance-{j}"),
                    "sopClass": {
                        "system": "urn:ietf:rfc:3986",
                        "code": "1.2.840.10008.5.1.4.1.1.1"
                    },
                    "number": j
                })
            })
            .collect();

        entries.push(post_entry(
            "ImagingStudy",
            json!({
                "resourceType": "ImagingStudy",
                "id": study_id,
                "status": "available",
                "modality": modality,
                "subject": subject,
                "started": stamp,
                "series": [{
                    "uid": format!("series-{i}"),
                    "number": i,
                    "modality": modality,
                    "instance": instances
                }]
            }),
        ));

        let forms: Vec<Value> = study
            .files
            .iter()
            .map(|file| {
                json!({
                    "contentType": "application/dicom",
                    "data": file.file_data,
                    "title": file.file_name
                })
            })
            .collect();

        entries.push(post_entry(
            "DiagnosticReport",
            json!({
                "resourceType": "DiagnosticReport",
                "id": format!("diagnostic-report-{patient_id}-{i}"),
                "status": "final",
                "category": [{
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/v2-0074",
                        "code": "RAD",
                        "display": "Radiology"
                    }]
                }],
                "code": {
                    "coding": [{
                        "system": "http://loinc.org",
                        "code": "18748-4",
                        "display": "Diagnostic imaging study"
                    }]
                },
                "subject": subject,
                "effectiveDateTime": stamp,
                "imagingStudy": [{ "reference": format!("ImagingStudy/{study_id}") }],
                "conclusion": format!("{}{}", STUDY_CONCLUSION_PREFIX, study.process_name),
                "presentedForm": forms
            }),
        ));
    }

    tracing::debug!(entries = entries.len(), "assembled FHIR bundle");

    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "timestamp": stamp,
        "entry": entries
    })
}

fn patient_resource(patient: &Patient) -> Value {
    let mut resource = json!({
        "resourceType": "Patient",
        "id": patient.id.to_string(),
        "identifier": [{
            "use": "usual",
            "type": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/v2-0203",
                    "code": "MR",
                    "display": "Medical Record Number"
                }]
            },
            "value": patient.identity_number
        }],
        "name": [{
            "use": "official",
            "family": patient.surname,
            "given": [patient.name]
        }],
        "gender": patient.gender.as_str(),
        "meta": {
            "profile": ["http://hl7.org/fhir/StructureDefinition/Patient"]
        }
    });

    if let Some(birth_date) = patient.birth_date.as_deref().and_then(parse_birth_date) {
        resource["birthDate"] = Value::String(birth_date.format("%Y-%m-%d").to_string());
    }

    resource
}

fn post_entry(url: &str, resource: Value) -> Value {
    json!({
        "resource": resource,
        "request": { "method": "POST", "url": url }
    })
}

/// DICOM modality code guessed from a free-text process name.
pub fn modality_code(process_name: &str) -> &'static str {
    let lower = process_name.to_lowercase();
    if lower.contains("xray") || lower.contains("x-ray") {
        "DX"
    } else if lower.contains("ct") {
        "CT"
    } else if lower.contains("mri") {
        "MR"
    } else if lower.contains("ultrasound") || lower.contains("us") {
        "US"
    } else if lower.contains("mammography") {
        "MG"
    } else {
        "OT"
    }
}

/// Structural check of a Bundle document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BundleValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub resource_count: usize,
}

pub fn validate_bundle(bundle: &Value) -> BundleValidation {
    let mut report = BundleValidation {
        valid: true,
        ..Default::default()
    };

    if bundle.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        report.errors.push("Root resource must be a Bundle".to_string());
    }

    match bundle.get("entry") {
        None => report.errors.push("Bundle must contain entries".to_string()),
        Some(Value::Array(entries)) => {
            report.resource_count = entries.len();
            let mut has_patient = false;
            for entry in entries {
                match entry.get("resource").and_then(Value::as_object) {
                    None => report.errors.push("Entry must contain resource".to_string()),
                    Some(resource) => match resource_type(resource) {
                        None => report
                            .errors
                            .push("Resource must have resourceType".to_string()),
                        Some("Patient") => has_patient = true,
                        Some(_) => {}
                    },
                }
            }
            if !has_patient {
                report
                    .warnings
                    .push("Bundle has no Patient resource".to_string());
            }
        }
        Some(_) => report.errors.push("Bundle.entry must be an array".to_string()),
    }

    report.valid = report.errors.is_empty();
    tracing::debug!(valid = report.valid, resources = report.resource_count, "validated bundle");
    report
}

fn resource_type(resource: &Map<String, Value>) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_mapping() {
        assert_eq!(modality_code("Chest X-Ray"), "DX");
        assert_eq!(modality_code("Head CT"), "CT");
        assert_eq!(modality_code("Brain MRI"), "MR");
        assert_eq!(modality_code("Abdominal ultrasound"), "US");
        assert_eq!(modality_code("Mammography"), "MG");
        assert_eq!(modality_code("Bone scan"), "OT");
    }

    #[test]
    fn non_object_input_is_invalid() {
        for value in [json!([1, 2]), json!("text"), json!(null), json!(3)] {
            assert!(matches!(
                parse_input(&value),
                Err(AssessmentError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn wrong_resource_type_is_invalid() {
        let err = parse_input(&json!({"resourceType": "Patient"})).expect_err("not a bundle");
        assert!(matches!(err, AssessmentError::InvalidInput(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            parse_input_str("{not json"),
            Err(AssessmentError::Parse(_))
        ));
    }

    #[test]
    fn bundle_without_entries_is_empty_input() {
        let input = parse_input(&json!({"resourceType": "Bundle"})).expect("empty bundle");
        assert_eq!(input, AssessmentInput::default());
    }

    #[test]
    fn bundle_entry_must_be_array() {
        let err = parse_input(&json!({"resourceType": "Bundle", "entry": {}}))
            .expect_err("entry object");
        assert!(matches!(err, AssessmentError::InvalidInput(_)));
    }

    #[test]
    fn condition_without_coding_keeps_empty_fields() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"resourceType": "Condition"}}]
        });
        let input = parse_input(&bundle).expect("bundle");
        assert_eq!(input.record.diagnoses, vec![CodedDiagnosis::default()]);
    }

    #[test]
    fn validation_reports_structural_problems() {
        let report = validate_bundle(&json!({
            "resourceType": "Bundle",
            "entry": [{"resource": {"id": "x"}}, {"request": {}}]
        }));
        assert!(!report.valid);
        assert_eq!(report.resource_count, 2);
        assert_eq!(
            report.errors,
            vec!["Resource must have resourceType", "Entry must contain resource"]
        );
        assert_eq!(report.warnings, vec!["Bundle has no Patient resource"]);

        let report = validate_bundle(&json!({"resourceType": "Observation"}));
        assert_eq!(
            report.errors,
            vec!["Root resource must be a Bundle", "Bundle must contain entries"]
        );
    }
}
