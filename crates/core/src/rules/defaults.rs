//! Built-in ADA 2026 rule set, loaded into every registry at start-up.

use super::{ClinicalCondition, ClinicalRule, Comparison, ConceptSource, Presence, RuleSource};
use crate::constants::{CGM, EGFR_LOINC, GLP1, HBA1C_LOINC, SGLT2, T2DM_MONDO, UACR_LOINC};
use chrono::NaiveDate;

const METFORMIN_FAMILY_QUERY: &str = "SELECT ?rx WHERE {\n    ?rx rdfs:subClassOf+ <rxnorm:8600> .\n}";

fn ada_2026(
    rule_id: &str,
    name: &str,
    description: &str,
    intervention: &str,
    section: u8,
    conditions: Vec<ClinicalCondition>,
) -> ClinicalRule {
    ClinicalRule {
        rule_id: rule_id.into(),
        name: name.into(),
        description: description.into(),
        intervention: intervention.into(),
        conditions,
        action: "recommend".into(),
        guideline_ref: format!("ADA 2026 Section {section}"),
        evidence_level: "A".into(),
        source: RuleSource::Ada,
        effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or(NaiveDate::MIN),
        expiration_date: None,
        payer_specific: None,
    }
}

fn t2dm_diagnosis() -> ClinicalCondition {
    ClinicalCondition::Diagnosis {
        code: T2DM_MONDO.into(),
        presence: Presence::Exists,
    }
}

fn lab_at_least(code: &str, value: f64) -> ClinicalCondition {
    ClinicalCondition::Lab {
        source: ConceptSource::Code(code.into()),
        comparison: Comparison::AtLeast,
        value,
    }
}

/// The rules every registry starts with.
pub fn default_rules() -> Vec<ClinicalRule> {
    vec![
        ada_2026(
            "GLP1_ADA_2026",
            "GLP-1 RA for Poorly Controlled T2DM",
            "GLP-1 RA when HbA1c >= 9% after oral therapy failure",
            GLP1,
            9,
            vec![
                t2dm_diagnosis(),
                lab_at_least(HBA1C_LOINC, 9.0),
                ClinicalCondition::Medication {
                    source: ConceptSource::Query(METFORMIN_FAMILY_QUERY.into()),
                    presence: Presence::Exists,
                },
                ClinicalCondition::Pregnancy {
                    presence: Presence::NotExists,
                },
            ],
        ),
        ada_2026(
            "SGLT2_CKD_ADA_2026",
            "SGLT2i for CKD in T2DM",
            "Renoprotective SGLT2i when eGFR >= 20 & UACR >= 30",
            SGLT2,
            11,
            vec![
                t2dm_diagnosis(),
                lab_at_least(EGFR_LOINC, 20.0),
                lab_at_least(UACR_LOINC, 30.0),
            ],
        ),
        ada_2026(
            "CGM_ADA_2026",
            "CGM for Diabetes Management",
            "CGM for insulin-treated diabetes or high hypoglycemia risk",
            CGM,
            7,
            vec![
                ClinicalCondition::DiabetesFamily,
                ClinicalCondition::Medication {
                    source: ConceptSource::Code("ex:Insulin".into()),
                    presence: Presence::Exists,
                },
            ],
        ),
    ]
}
