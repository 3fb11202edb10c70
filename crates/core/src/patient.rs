//! Patient facts supplied by the caller for one evaluation.
//!
//! A [`Patient`] is immutable input: the engine only reads it. Coded facts keep the codes as
//! sent by the source system; matching helpers treat the CURIE prefix case-insensitively so
//! `LOINC:4548-4` and `loinc:4548-4` refer to the same observation code.

use crate::constants::{
    DIABETES_COMPLICATION_ICD10, DIABETES_FAMILY_PREFIX, ICD10_PREFIX, INSULIN_RXNORM_CODES,
};
use cds_types::NonEmptyText;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Compares two codes, ignoring ASCII case in the prefix only.
pub(crate) fn codes_match(a: &str, b: &str) -> bool {
    match (a.split_once(':'), b.split_once(':')) {
        (Some((pa, la)), Some((pb, lb))) => pa.eq_ignore_ascii_case(pb) && la == lb,
        _ => a == b,
    }
}

fn non_empty(code: &Option<String>) -> Option<&str> {
    code.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

fn local_part(code: &str) -> &str {
    code.split_once(':').map(|(_, local)| local).unwrap_or(code)
}

/// Administrative sex as recorded on the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Sex {
    M,
    F,
}

impl<'de> Deserialize<'de> for Sex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_ascii_uppercase().as_str() {
            "M" => Ok(Sex::M),
            "F" => Ok(Sex::F),
            other => Err(serde::de::Error::custom(format!(
                "sex must be 'M' or 'F', got '{other}'"
            ))),
        }
    }
}

/// A recorded diagnosis with codes from two independent coding systems.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Billing classification code, e.g. `E11.9` or `ICD10CM:E11.9`.
    #[serde(default)]
    pub icd10: Option<String>,
    /// Disease-ontology code, e.g. `MONDO:0005148`.
    #[serde(default)]
    pub mondo: Option<String>,
    pub name: String,
    #[serde(default)]
    pub onset_date: Option<NaiveDate>,
}

impl Diagnosis {
    /// Non-empty codes in lookup order: disease ontology first, then classification.
    ///
    /// A bare classification code such as `E11.9` is qualified as `ICD10CM:E11.9`.
    pub fn codes(&self) -> impl Iterator<Item = Cow<'_, str>> {
        let mondo = non_empty(&self.mondo).map(Cow::Borrowed);
        let icd10 = non_empty(&self.icd10).map(|c| {
            if c.contains(':') {
                Cow::Borrowed(c)
            } else {
                Cow::Owned(format!("{ICD10_PREFIX}:{c}"))
            }
        });
        mondo.into_iter().chain(icd10)
    }

    fn in_diabetes_family(&self) -> bool {
        self.mondo
            .as_deref()
            .is_some_and(|m| m.trim().to_ascii_uppercase().starts_with(DIABETES_FAMILY_PREFIX))
    }
}

fn default_lab_source() -> String {
    "EHR".into()
}

/// A coded, dated numeric observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    #[serde(alias = "loinc")]
    pub code: String,
    pub value: f64,
    pub unit: String,
    #[serde(alias = "observed_on")]
    pub date: NaiveDate,
    #[serde(default = "default_lab_source")]
    pub source: String,
}

/// A medication on the patient's list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    #[serde(alias = "rxnorm_code")]
    pub code: String,
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// The regimen was tried and failed.
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub contraindicated: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    #[serde(default)]
    pub systolic: Option<f64>,
    #[serde(default)]
    pub diastolic: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// The patient record evaluated against the rule set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: NonEmptyText,
    #[serde(default)]
    pub mrn: Option<String>,
    pub age: u32,
    pub sex: Sex,
    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,
    #[serde(default)]
    pub labs: Vec<LabResult>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub vital_signs: Option<VitalSigns>,
    #[serde(default)]
    pub pregnant: bool,
    #[serde(default)]
    pub breastfeeding: bool,
    #[serde(default)]
    pub smoking_status: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub last_eye_exam: Option<NaiveDate>,
    #[serde(default)]
    pub last_foot_exam: Option<NaiveDate>,
    #[serde(default)]
    pub last_dental_exam: Option<NaiveDate>,
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Free-text contraindication tags, e.g. `pancreatitis`.
    #[serde(default)]
    pub contraindications: Vec<String>,
}

impl Patient {
    /// A patient with no recorded facts beyond identity, age and sex.
    pub fn new(patient_id: NonEmptyText, age: u32, sex: Sex) -> Self {
        Self {
            patient_id,
            mrn: None,
            age,
            sex,
            diagnoses: Vec::new(),
            labs: Vec::new(),
            medications: Vec::new(),
            vital_signs: None,
            pregnant: false,
            breastfeeding: false,
            smoking_status: None,
            payer: None,
            last_eye_exam: None,
            last_foot_exam: None,
            last_dental_exam: None,
            allergies: Vec::new(),
            contraindications: Vec::new(),
        }
    }

    /// The first lab result recorded under `code`.
    ///
    /// This is list order, not recency: callers wanting the latest result must sort upstream.
    pub fn lab(&self, code: &str) -> Option<&LabResult> {
        self.labs.iter().find(|l| codes_match(&l.code, code))
    }

    pub fn bmi(&self) -> Option<f64> {
        let vitals = self.vital_signs.as_ref()?;
        let weight = vitals.weight_kg?;
        let height = vitals.height_cm?;
        if height <= 0.0 {
            return None;
        }
        let h_m = height / 100.0;
        Some(weight / (h_m * h_m))
    }

    pub fn uses_insulin(&self) -> bool {
        self.medications.iter().any(|m| {
            INSULIN_RXNORM_CODES
                .iter()
                .any(|code| codes_match(&m.code, code))
        })
    }

    pub fn has_diabetes_complications(&self) -> bool {
        self.diagnoses.iter().any(|d| {
            d.icd10
                .as_deref()
                .is_some_and(|code| DIABETES_COMPLICATION_ICD10.contains(&local_part(code.trim())))
        })
    }

    /// Any diagnosis in the diabetes concept family.
    pub fn has_diabetes(&self) -> bool {
        self.diagnoses.iter().any(Diagnosis::in_diabetes_family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn patient() -> Patient {
        Patient::new(NonEmptyText::new("P1").expect("id"), 58, Sex::M)
    }

    #[test]
    fn test_deserialises_alias_field_names() {
        let json = r#"{
            "patient_id": "T001",
            "age": 58,
            "sex": "m",
            "diagnoses": [{"icd10": "E11.9", "mondo": "MONDO:0005148", "name": "Type 2 Diabetes"}],
            "labs": [{"loinc": "LOINC:4548-4", "value": 9.6, "unit": "%", "date": "2026-09-18"}],
            "medications": [{"rxnorm_code": "rxnorm:6809", "name": "Metformin", "start_date": "2025-09-01", "failed": true}],
            "payer": "medicare"
        }"#;
        let p: Patient = serde_json::from_str(json).expect("deserialise patient");
        assert_eq!(p.sex, Sex::M);
        assert_eq!(p.labs[0].code, "LOINC:4548-4");
        assert_eq!(p.labs[0].source, "EHR");
        assert_eq!(p.medications[0].code, "rxnorm:6809");
        assert!(p.medications[0].failed);
        assert!(!p.pregnant);
        assert!(p.has_diabetes());
    }

    #[test]
    fn test_qualifies_bare_classification_codes() {
        let d = Diagnosis {
            icd10: Some(" E11.9 ".into()),
            mondo: Some("MONDO:0005148".into()),
            name: "Type 2 Diabetes".into(),
            onset_date: None,
        };
        let codes: Vec<_> = d.codes().collect();
        assert_eq!(codes, vec!["MONDO:0005148", "ICD10CM:E11.9"]);

        let coded = Diagnosis {
            icd10: Some("icd10cm:E11.65".into()),
            mondo: Some("  ".into()),
            ..d
        };
        assert_eq!(coded.codes().collect::<Vec<_>>(), vec!["icd10cm:E11.65"]);
    }

    #[test]
    fn test_rejects_unknown_sex() {
        let json = r#"{"patient_id": "T1", "age": 40, "sex": "X"}"#;
        let err = serde_json::from_str::<Patient>(json).expect_err("should reject");
        assert!(err.to_string().contains("sex must be"));
    }

    #[test]
    fn test_lab_lookup_returns_first_match_not_latest() {
        let mut p = patient();
        for (value, day) in [(7.1, 1), (9.9, 20)] {
            p.labs.push(LabResult {
                code: "loinc:4548-4".into(),
                value,
                unit: "%".into(),
                date: date(2026, 9, day),
                source: "EHR".into(),
            });
        }
        let lab = p.lab("LOINC:4548-4").expect("lab present");
        assert_eq!(lab.value, 7.1);
        assert!(p.lab("LOINC:9318-7").is_none());
    }

    #[test]
    fn test_bmi_requires_positive_height() {
        let mut p = patient();
        assert_eq!(p.bmi(), None);
        p.vital_signs = Some(VitalSigns {
            weight_kg: Some(95.0),
            height_cm: Some(175.0),
            ..VitalSigns::default()
        });
        let bmi = p.bmi().expect("bmi");
        assert!((bmi - 31.02).abs() < 0.01);

        p.vital_signs = Some(VitalSigns {
            weight_kg: Some(95.0),
            height_cm: Some(0.0),
            ..VitalSigns::default()
        });
        assert_eq!(p.bmi(), None);
    }

    #[test]
    fn test_derived_flags() {
        let mut p = patient();
        assert!(!p.uses_insulin());
        assert!(!p.has_diabetes_complications());

        p.medications.push(Medication {
            code: "RXNORM:260265".into(),
            name: "Insulin glargine".into(),
            start_date: date(2026, 1, 1),
            end_date: None,
            failed: false,
            contraindicated: false,
        });
        p.diagnoses.push(Diagnosis {
            icd10: Some("ICD10CM:E11.35".into()),
            mondo: None,
            name: "T2DM with proliferative retinopathy".into(),
            onset_date: None,
        });
        assert!(p.uses_insulin());
        assert!(p.has_diabetes_complications());
        assert!(!p.has_diabetes());
    }
}
