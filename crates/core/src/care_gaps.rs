//! Overdue screenings and monitoring, independent of rule outcomes.

use crate::constants::{EGFR_LOINC, HBA1C_LOINC, UACR_LOINC};
use crate::patient::Patient;
use crate::temporal::TemporalValidator;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CareGap {
    pub name: String,
    /// Guideline section the gap is drawn from.
    #[serde(rename = "ada_section")]
    pub section: String,
    pub action: String,
}

impl CareGap {
    fn new(name: &str, section: &str, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section: section.into(),
            action: action.into(),
        }
    }
}

pub fn identify_care_gaps(patient: &Patient, temporal: &TemporalValidator<'_>) -> Vec<CareGap> {
    let mut gaps = Vec::new();

    for (kind, name, section, last) in [
        ("eye_exam", "Eye Exam", "12", patient.last_eye_exam),
        ("foot_exam", "Foot Exam", "12", patient.last_foot_exam),
        ("dental_exam", "Dental Exam", "4", patient.last_dental_exam),
    ] {
        if let Some(reason) = temporal.needs_annual_screening(last, kind, patient) {
            gaps.push(CareGap::new(name, section, reason));
        }
    }

    match patient.lab(HBA1C_LOINC) {
        Some(hba1c) => {
            if let Err(reason) = temporal.is_current(Some(hba1c.date), "hba1c") {
                gaps.push(CareGap::new("HbA1c Monitoring", "6", reason));
            }
        }
        None => gaps.push(CareGap::new("HbA1c Monitoring", "6", "No result")),
    }

    if patient.has_diabetes() {
        let cv_age = temporal.config().get_i64("thresholds.age_cv_screening", 40);
        if i64::from(patient.age) >= cv_age {
            gaps.push(CareGap::new("CV Risk Assessment", "10", "Consider statin therapy"));
        }
        if patient.lab(EGFR_LOINC).is_none() || patient.lab(UACR_LOINC).is_none() {
            gaps.push(CareGap::new("CKD Screening", "11", "Order eGFR & UACR"));
        }
    }

    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::patient::{Diagnosis, LabResult, Sex};
    use cds_types::NonEmptyText;
    use chrono::{Duration, NaiveDate};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
    }

    fn lab(code: &str, days_ago: i64) -> LabResult {
        LabResult {
            code: code.into(),
            value: 1.0,
            unit: "x".into(),
            date: today() - Duration::days(days_ago),
            source: "EHR".into(),
        }
    }

    fn names(gaps: &[CareGap]) -> Vec<&str> {
        gaps.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn test_empty_record_flags_screenings_and_hba1c() {
        let settings = Settings::defaults();
        let t = TemporalValidator::new(&settings, today());
        let p = Patient::new(NonEmptyText::new("P1").expect("id"), 30, Sex::M);
        let gaps = identify_care_gaps(&p, &t);
        assert_eq!(
            names(&gaps),
            vec!["Eye Exam", "Foot Exam", "Dental Exam", "HbA1c Monitoring"]
        );
        assert!(gaps.iter().take(3).all(|g| g.action == "Never performed"));
        assert_eq!(gaps[3].action, "No result");
        assert_eq!(gaps[2].section, "4");
    }

    #[test]
    fn test_diabetic_patient_gaps() {
        let settings = Settings::defaults();
        let t = TemporalValidator::new(&settings, today());
        let mut p = Patient::new(NonEmptyText::new("P1").expect("id"), 58, Sex::F);
        p.diagnoses.push(Diagnosis {
            icd10: Some("E11.35".into()),
            mondo: Some("MONDO:0005148".into()),
            name: "T2DM with retinopathy".into(),
            onset_date: None,
        });
        p.last_eye_exam = Some(today() - Duration::days(190));
        p.last_foot_exam = Some(today() - Duration::days(190));
        p.last_dental_exam = Some(today() - Duration::days(10));
        p.labs.push(lab(HBA1C_LOINC, 120));
        p.labs.push(lab(EGFR_LOINC, 10));

        let gaps = identify_care_gaps(&p, &t);
        assert_eq!(
            names(&gaps),
            vec!["Eye Exam", "HbA1c Monitoring", "CV Risk Assessment", "CKD Screening"]
        );
        assert_eq!(gaps[0].action, "Last performed 190 days ago");
        assert_eq!(gaps[1].action, "120 days old (max 90)");

        p.last_eye_exam = Some(today() - Duration::days(170));
        p.labs.push(lab(UACR_LOINC, 10));
        p.age = 35;
        let gaps = identify_care_gaps(&p, &t);
        assert_eq!(names(&gaps), vec!["HbA1c Monitoring"]);
    }

    #[test]
    fn test_serialises_section_as_ada_section() {
        let gap = CareGap::new("Foot Exam", "12", "Never performed");
        let value = serde_json::to_value(&gap).expect("serialise");
        assert_eq!(value["ada_section"], "12");
    }
}
