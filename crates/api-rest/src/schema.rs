//! Request and response bodies for the REST API.
//!
//! These are transport types: they carry `utoipa` schemas for the OpenAPI document and are
//! converted to and from the `cds-core` types at the handler boundary.

use cds_core::{
    CareGap, Diagnosis, EligibilityDecision, LabResult, Medication, Patient, Sex, ValidationResult,
    VitalSigns,
};
use cds_types::NonEmptyText;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct DiagnosisReq {
    #[serde(default)]
    pub icd10: Option<String>,
    #[serde(default)]
    pub mondo: Option<String>,
    pub name: String,
    #[serde(default)]
    pub onset_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct LabResultReq {
    /// Observation code, e.g. `LOINC:4548-4`.
    pub loinc: String,
    pub value: f64,
    pub unit: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct MedicationReq {
    /// Medication code, e.g. `rxnorm:6809`.
    pub rxnorm_code: String,
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub contraindicated: bool,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct VitalSignsReq {
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

/// Patient payload for `POST /evaluate`.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct PatientRequest {
    pub patient_id: String,
    #[serde(default)]
    pub mrn: Option<String>,
    pub age: u32,
    /// `M` or `F`, case-insensitive.
    #[schema(value_type = String, example = "F")]
    pub sex: Sex,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisReq>,
    #[serde(default)]
    pub labs: Vec<LabResultReq>,
    #[serde(default)]
    pub medications: Vec<MedicationReq>,
    #[serde(default)]
    pub vital_signs: Option<VitalSignsReq>,
    #[serde(default)]
    pub pregnant: bool,
    #[serde(default)]
    pub breastfeeding: bool,
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub last_eye_exam: Option<NaiveDate>,
    #[serde(default)]
    pub last_foot_exam: Option<NaiveDate>,
    #[serde(default)]
    pub last_dental_exam: Option<NaiveDate>,
    #[serde(default)]
    pub contraindications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub smoking_status: Option<String>,
    #[serde(default)]
    pub clinician_id: Option<String>,
    /// Evaluation date; today (UTC) when omitted.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

impl PatientRequest {
    /// Builds the core patient record, rejecting a blank patient id.
    pub fn to_patient(&self) -> Result<Patient, String> {
        let patient_id =
            NonEmptyText::new(&self.patient_id).map_err(|e| format!("patient_id: {e}"))?;
        let mut patient = Patient::new(patient_id, self.age, self.sex);

        patient.mrn = self.mrn.clone();
        patient.diagnoses = self
            .diagnoses
            .iter()
            .map(|d| Diagnosis {
                icd10: d.icd10.clone(),
                mondo: d.mondo.clone(),
                name: d.name.clone(),
                onset_date: d.onset_date,
            })
            .collect();
        patient.labs = self
            .labs
            .iter()
            .map(|l| LabResult {
                code: l.loinc.clone(),
                value: l.value,
                unit: l.unit.clone(),
                date: l.date,
                source: l.source.clone().unwrap_or_else(|| "EHR".into()),
            })
            .collect();
        patient.medications = self
            .medications
            .iter()
            .map(|m| Medication {
                code: m.rxnorm_code.clone(),
                name: m.name.clone(),
                start_date: m.start_date,
                end_date: m.end_date,
                failed: m.failed,
                contraindicated: m.contraindicated,
            })
            .collect();
        patient.vital_signs = self.vital_signs.as_ref().map(|v| VitalSigns {
            systolic: v.systolic,
            diastolic: v.diastolic,
            weight_kg: v.weight_kg,
            height_cm: v.height_cm,
            date: v.date,
        });
        patient.pregnant = self.pregnant;
        patient.breastfeeding = self.breastfeeding;
        patient.payer = self.payer.clone();
        patient.last_eye_exam = self.last_eye_exam;
        patient.last_foot_exam = self.last_foot_exam;
        patient.last_dental_exam = self.last_dental_exam;
        patient.contraindications = self.contraindications.clone();
        patient.allergies = self.allergies.clone();
        patient.smoking_status = self.smoking_status.clone();
        Ok(patient)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationRes {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<ValidationResult> for ValidationRes {
    fn from(v: ValidationResult) -> Self {
        Self {
            errors: v.errors,
            warnings: v.warnings,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EligibilityRes {
    pub eligible: bool,
    /// `weak`, `moderate` or `strong`.
    pub strength: String,
    pub recommendations: Vec<String>,
    pub contraindications: Vec<String>,
    pub missing_data: Vec<String>,
    pub guideline_references: Vec<String>,
    pub evidence_levels: Vec<String>,
    pub payer_coverage_notes: Vec<String>,
    pub prior_auth_required: bool,
    /// `likely`, `unlikely` or `unknown`.
    pub estimated_coverage: String,
}

impl From<EligibilityDecision> for EligibilityRes {
    fn from(d: EligibilityDecision) -> Self {
        Self {
            eligible: d.eligible,
            strength: d.strength.as_str().into(),
            recommendations: d.recommendations,
            contraindications: d.contraindications,
            missing_data: d.missing_data,
            guideline_references: d.guideline_references,
            evidence_levels: d.evidence_levels,
            payer_coverage_notes: d.payer_coverage_notes,
            prior_auth_required: d.prior_auth_required,
            estimated_coverage: d.estimated_coverage.as_str().into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CareGapRes {
    pub name: String,
    pub ada_section: String,
    pub action: String,
}

impl From<CareGap> for CareGapRes {
    fn from(g: CareGap) -> Self {
        Self {
            name: g.name,
            ada_section: g.section,
            action: g.action,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluationResponse {
    pub evaluation_id: String,
    /// RFC 3339 time the evaluation finished.
    pub timestamp: String,
    pub validation: ValidationRes,
    /// Keyed by intervention tag.
    pub eligibility: BTreeMap<String, EligibilityRes>,
    pub care_gaps: Vec<CareGapRes>,
    pub audit_trail_id: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(sex: &str) -> serde_json::Value {
        serde_json::json!({
            "patient_id": " P42 ",
            "age": 61,
            "sex": sex,
            "diagnoses": [{"mondo": "MONDO:0005148", "name": "Type 2 Diabetes"}],
            "labs": [{"loinc": "LOINC:4548-4", "value": 9.4, "unit": "%", "date": "2026-09-01"}],
            "medications": [{
                "rxnorm_code": "rxnorm:6809",
                "name": "Metformin",
                "start_date": "2025-01-01",
                "failed": true
            }],
            "vital_signs": {"weight_kg": 90.0, "height_cm": 180.0},
            "payer": "medicare"
        })
    }

    fn request(sex: &str) -> PatientRequest {
        serde_json::from_value(payload(sex)).expect("valid request")
    }

    #[test]
    fn test_converts_request_to_patient() {
        let patient = request("f").to_patient().expect("patient");
        assert_eq!(patient.patient_id.as_str(), "P42");
        assert_eq!(patient.sex, Sex::F);
        assert_eq!(patient.labs[0].code, "LOINC:4548-4");
        assert_eq!(patient.labs[0].source, "EHR");
        assert!(patient.medications[0].failed);
        assert_eq!(patient.payer.as_deref(), Some("medicare"));
        assert!(patient.bmi().is_some());
    }

    #[test]
    fn test_unknown_sex_is_rejected_while_deserialising() {
        let err = serde_json::from_value::<PatientRequest>(payload("x")).expect_err("bad sex");
        assert!(err.to_string().contains("sex must be 'M' or 'F', got 'X'"));
        assert_eq!(request(" m ").sex, Sex::M);
    }

    #[test]
    fn test_blank_patient_id_is_rejected() {
        let mut blank = request("M");
        blank.patient_id = "   ".into();
        assert!(blank.to_patient().is_err());
    }
}
