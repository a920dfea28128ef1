//! Patient payload as delivered by the upstream healthcare API.

use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    /// Case-insensitive; anything unrecognised is `Unknown`.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            "other" => Gender::Other,
            _ => Gender::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unknown => "unknown",
        }
    }
}

/// Patient identity block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Patient {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    pub identity_number: String,
    pub name: String,
    pub surname: String,
    #[serde(deserialize_with = "lenient_gender")]
    pub gender: Gender,
    /// Kept as received; parsed lazily when an age is needed.
    #[serde(deserialize_with = "lenient_text")]
    pub birth_date: Option<String>,
}

/// Identity fields the pipeline tolerates in any JSON shape.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Int(id) => id,
        Loose::Text(text) => text.trim().parse::<i64>().unwrap_or_default(),
        Loose::Other(_) => 0,
    })
}

fn lenient_gender<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Gender, D::Error> {
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(text) => Gender::parse(&text),
        _ => Gender::Unknown,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(text) => Some(text),
        _ => None,
    })
}

/// One encoded image file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FileData {
    pub file_name: String,
    /// Base64 payload, opaque to this crate.
    pub file_data: String,
}

/// A group of images belonging to one radiology process (e.g. "Chest X-Ray").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RadiologyStudy {
    pub process_name: String,
    pub files: Vec<FileData>,
}

/// A recorded diagnosis as a `{code, name}` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CodedDiagnosis {
    pub code: String,
    pub name: String,
}

/// Complete patient payload. Every field is optional on input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientData {
    pub patient: Patient,
    pub anamnesis: String,
    pub diagnoses: Vec<CodedDiagnosis>,
    pub radiology_images: Vec<RadiologyStudy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_payload() {
        let json = r#"{
            "patient": {
                "id": 7,
                "identityNumber": "12345678901",
                "name": "Ada",
                "surname": "Lovelace",
                "gender": "female",
                "birthDate": "1950-12-10"
            },
            "anamnesis": "chest pain since morning",
            "diagnoses": [{"code": "E11.9", "name": "Type 2 diabetes"}],
            "radiologyImages": [{"processName": "Chest X-Ray", "files": [{"fileName": "a.dcm", "fileData": "AAAA"}]}]
        }"#;

        let data: PatientData = serde_json::from_str(json).expect("payload");
        assert_eq!(data.patient.id, 7);
        assert_eq!(data.patient.gender, Gender::Female);
        assert_eq!(data.patient.birth_date.as_deref(), Some("1950-12-10"));
        assert_eq!(data.diagnoses[0].code, "E11.9");
        assert_eq!(data.radiology_images[0].files[0].file_name, "a.dcm");
    }

    #[test]
    fn mistyped_identity_fields_fall_back() {
        let json = r#"{"patient": {"id": "42", "gender": "M", "birthDate": 19500101}}"#;
        let data: PatientData = serde_json::from_str(json).expect("lenient payload");
        assert_eq!(data.patient.id, 42);
        assert_eq!(data.patient.gender, Gender::Unknown);
        assert_eq!(data.patient.birth_date, None);

        let data: PatientData =
            serde_json::from_str(r#"{"patient": {"id": null, "gender": "FEMALE"}}"#)
                .expect("lenient payload");
        assert_eq!(data.patient.id, 0);
        assert_eq!(data.patient.gender, Gender::Female);
    }

    #[test]
    fn structural_sections_stay_strict() {
        assert!(serde_json::from_str::<PatientData>(r#"{"diagnoses": "E11.9"}"#).is_err());
        assert!(serde_json::from_str::<PatientData>(r#"{"radiologyImages": {}}"#).is_err());
    }

    #[test]
    fn missing_fields_default() {
        let data: PatientData = serde_json::from_str("{}").expect("empty payload");
        assert_eq!(data, PatientData::default());
    }
}
