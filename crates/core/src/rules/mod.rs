//! Clinical rules: a target intervention plus a conjunctive list of conditions.

pub mod condition;
pub mod defaults;

pub use condition::{ClinicalCondition, Comparison, ConceptSource, EvalContext, Presence};

use crate::patient::Patient;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Who authored a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    Ada,
    Payer,
    Clinic,
}

fn default_action() -> String {
    "recommend".into()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRule {
    pub rule_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Intervention tag this rule recommends, e.g. `GLP1`.
    pub intervention: String,
    /// All must hold.
    pub conditions: Vec<ClinicalCondition>,
    #[serde(default = "default_action")]
    pub action: String,
    pub guideline_ref: String,
    pub evidence_level: String,
    pub source: RuleSource,
    pub effective_date: NaiveDate,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    /// Payer allow-list. `None` or empty applies to every payer.
    #[serde(default)]
    pub payer_specific: Option<Vec<String>>,
}

/// Result of evaluating one rule for one patient.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub eligible: bool,
    pub intervention: String,
    pub met_conditions: Vec<String>,
    pub unmet_conditions: Vec<String>,
    pub guideline_ref: String,
    pub evidence_level: String,
    pub action: String,
}

impl ClinicalRule {
    /// Whether the rule is in force on `as_of`.
    pub fn is_active(&self, as_of: NaiveDate) -> bool {
        self.effective_date <= as_of && self.expiration_date.map_or(true, |end| end >= as_of)
    }

    pub fn applies_to_payer(&self, payer: Option<&str>) -> bool {
        match self.payer_specific.as_deref() {
            None | Some([]) => true,
            Some(allowed) => payer.is_some_and(|p| allowed.iter().any(|a| a == p)),
        }
    }

    /// Evaluates every condition, without short-circuiting, and returns
    /// `(all_met, met_reasons, unmet_reasons)`.
    pub fn evaluate(&self, patient: &Patient, ctx: EvalContext<'_>) -> (bool, Vec<String>, Vec<String>) {
        let mut met = Vec::new();
        let mut unmet = Vec::new();
        for condition in &self.conditions {
            let (ok, reason) = condition.evaluate(patient, ctx);
            if ok {
                met.push(reason);
            } else {
                unmet.push(reason);
            }
        }
        (unmet.is_empty(), met, unmet)
    }

    pub fn outcome(&self, patient: &Patient, ctx: EvalContext<'_>) -> RuleOutcome {
        let (eligible, met_conditions, unmet_conditions) = self.evaluate(patient, ctx);
        RuleOutcome {
            eligible,
            intervention: self.intervention.clone(),
            met_conditions,
            unmet_conditions,
            guideline_ref: self.guideline_ref.clone(),
            evidence_level: self.evidence_level.clone(),
            action: self.action.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concepts::ConceptResolver;
    use crate::config::Settings;
    use crate::patient::{Diagnosis, LabResult, Medication, Sex};
    use crate::temporal::TemporalValidator;
    use cds_ontology::Graph;
    use cds_types::NonEmptyText;
    use chrono::Duration;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
    }

    fn resolver() -> ConceptResolver {
        let mut g = Graph::default();
        g.add_link("rxnorm:6809", "rdfs:subClassOf", "rxnorm:8600")
            .expect("link");
        g.add_link("rxnorm:260265", "rdfs:subClassOf", "ex:Insulin")
            .expect("link");
        g.add_link("icd10cm:E11.9", "skos:exactMatch", "mondo:0005148")
            .expect("link");
        ConceptResolver::new(Arc::new(g))
    }

    fn rule(conditions: Vec<ClinicalCondition>) -> ClinicalRule {
        ClinicalRule {
            rule_id: "TEST".into(),
            name: "test".into(),
            description: String::new(),
            intervention: "GLP1".into(),
            conditions,
            action: default_action(),
            guideline_ref: "Test ref".into(),
            evidence_level: "B".into(),
            source: RuleSource::Clinic,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"),
            expiration_date: None,
            payer_specific: None,
        }
    }

    fn patient() -> Patient {
        let mut p = Patient::new(NonEmptyText::new("P1").expect("id"), 58, Sex::M);
        p.diagnoses.push(Diagnosis {
            icd10: Some("ICD10CM:E11.9".into()),
            mondo: None,
            name: "Type 2 diabetes".into(),
            onset_date: None,
        });
        p.labs.push(LabResult {
            code: "LOINC:4548-4".into(),
            value: 9.6,
            unit: "%".into(),
            date: today() - Duration::days(30),
            source: "EHR".into(),
        });
        p.medications.push(Medication {
            code: "rxnorm:6809".into(),
            name: "Metformin".into(),
            start_date: today() - Duration::days(400),
            end_date: None,
            failed: true,
            contraindicated: false,
        });
        p
    }

    fn hba1c_at_least(value: f64) -> ClinicalCondition {
        ClinicalCondition::Lab {
            source: ConceptSource::Code("LOINC:4548-4".into()),
            comparison: Comparison::AtLeast,
            value,
        }
    }

    fn evaluate(rule: &ClinicalRule, patient: &Patient) -> (bool, Vec<String>, Vec<String>) {
        let settings = Settings::defaults();
        let resolver = resolver();
        let ctx = EvalContext {
            resolver: &resolver,
            temporal: TemporalValidator::new(&settings, today()),
        };
        rule.evaluate(patient, ctx)
    }

    #[test]
    fn test_all_conditions_reported_without_short_circuit() {
        let r = rule(vec![
            ClinicalCondition::Diagnosis {
                code: "MONDO:0005148".into(),
                presence: Presence::Exists,
            },
            hba1c_at_least(10.0),
            ClinicalCondition::Pregnancy {
                presence: Presence::NotExists,
            },
            ClinicalCondition::Unsupported {
                kind: "imaging".into(),
                code: None,
                operator: None,
            },
        ]);
        let (all_met, met, unmet) = evaluate(&r, &patient());
        assert!(!all_met);
        assert_eq!(met.len() + unmet.len(), r.conditions.len());
        assert_eq!(met, vec!["Diagnosis MONDO:0005148", "Pregnancy status"]);
        assert_eq!(
            unmet,
            vec!["LOINC:4548-4 >= 10.0", condition::NOT_IMPLEMENTED]
        );
    }

    #[test]
    fn test_met_iff_no_unmet_reasons() {
        let r = rule(vec![
            hba1c_at_least(9.0),
            ClinicalCondition::Medication {
                source: ConceptSource::Query(
                    "SELECT ?rx WHERE { ?rx rdfs:subClassOf+ <rxnorm:8600> . }".into(),
                ),
                presence: Presence::Exists,
            },
            ClinicalCondition::Age {
                comparison: Comparison::AtLeast,
                value: 18.0,
            },
            ClinicalCondition::DiabetesFamily,
        ]);
        let mut p = patient();
        p.diagnoses[0].mondo = Some("MONDO:0005148".into());
        let (all_met, met, unmet) = evaluate(&r, &p);
        assert!(all_met, "unmet: {unmet:?}");
        assert!(unmet.is_empty());
        assert!(met.contains(&"LOINC:4548-4 >= 9.0".to_string()));
        assert!(met.contains(&"Medication query".to_string()));
        assert!(met.contains(&"Age >= 18.0".to_string()));
    }

    #[test]
    fn test_lab_condition_reports_missing_stale_and_current_results() {
        let r = rule(vec![hba1c_at_least(9.0)]);
        let mut p = patient();
        p.labs[0].date = today() - Duration::days(90);
        let (all_met, met, _) = evaluate(&r, &p);
        assert!(all_met);
        assert_eq!(met, vec!["LOINC:4548-4 >= 9.0"]);

        p.labs[0].date = today() - Duration::days(200);
        let (all_met, met, unmet) = evaluate(&r, &p);
        assert!(!all_met);
        assert!(met.is_empty());
        assert_eq!(unmet, vec!["Lab LOINC:4548-4: 200 days old (max 90)"]);

        p.labs.clear();
        let (_, _, unmet) = evaluate(&r, &p);
        assert_eq!(unmet, vec!["Lab LOINC:4548-4: No lab result"]);
    }

    #[test]
    fn test_diagnosis_matches_through_equivalence_and_negation() {
        let exists = rule(vec![ClinicalCondition::Diagnosis {
            code: "MONDO:0005148".into(),
            presence: Presence::Exists,
        }]);
        let absent = rule(vec![ClinicalCondition::Diagnosis {
            code: "MONDO:0005148".into(),
            presence: Presence::NotExists,
        }]);
        let p = patient();
        assert!(evaluate(&exists, &p).0);
        assert!(!evaluate(&absent, &p).0);

        let unresolvable = rule(vec![ClinicalCondition::Diagnosis {
            code: "nope:1".into(),
            presence: Presence::NotExists,
        }]);
        let (ok, _, unmet) = evaluate(&unresolvable, &p);
        assert!(!ok, "unresolvable concepts fail closed even when negated");
        assert_eq!(unmet, vec!["Diagnosis nope:1: concept not resolvable"]);
    }

    #[test]
    fn test_medication_matches_by_code_or_subclass() {
        let insulin = rule(vec![ClinicalCondition::Medication {
            source: ConceptSource::Code("ex:Insulin".into()),
            presence: Presence::Exists,
        }]);
        let mut p = patient();
        assert!(!evaluate(&insulin, &p).0);
        p.medications.push(Medication {
            code: "rxnorm:260265".into(),
            name: "Insulin glargine".into(),
            start_date: today(),
            end_date: None,
            failed: false,
            contraindicated: false,
        });
        assert!(evaluate(&insulin, &p).0);

        let local = rule(vec![ClinicalCondition::Medication {
            source: ConceptSource::Code("metformin-local".into()),
            presence: Presence::Exists,
        }]);
        p.medications[0].code = "metformin-local".into();
        assert!(evaluate(&local, &p).0);

        let bad_query = rule(vec![ClinicalCondition::Medication {
            source: ConceptSource::Query("SELECT nonsense".into()),
            presence: Presence::NotExists,
        }]);
        assert!(!evaluate(&bad_query, &p).0);
    }

    #[test]
    fn test_activity_window_and_payer_scope() {
        let mut r = rule(vec![]);
        let start = r.effective_date;
        assert!(r.is_active(start));
        assert!(!r.is_active(start - Duration::days(1)));
        r.expiration_date = Some(start + Duration::days(10));
        assert!(r.is_active(start + Duration::days(10)));
        assert!(!r.is_active(start + Duration::days(11)));

        assert!(r.applies_to_payer(None));
        r.payer_specific = Some(vec![]);
        assert!(r.applies_to_payer(Some("medicaid")));
        r.payer_specific = Some(vec!["medicare".into()]);
        assert!(r.applies_to_payer(Some("medicare")));
        assert!(!r.applies_to_payer(Some("medicaid")));
        assert!(!r.applies_to_payer(None));
    }

    #[test]
    fn test_rule_deserialises_with_defaults() {
        let json = r#"{
            "rule_id": "CLINIC_AGE",
            "name": "Older adults",
            "intervention": "CGM",
            "conditions": [{"type": "demographic", "code": "age", "operator": ">=", "value": 65}],
            "guideline_ref": "Clinic policy 3",
            "evidence_level": "C",
            "source": "clinic",
            "effective_date": "2026-03-01"
        }"#;
        let r: ClinicalRule = serde_json::from_str(json).expect("deserialise rule");
        assert_eq!(r.action, "recommend");
        assert_eq!(r.source, RuleSource::Clinic);
        assert!(r.expiration_date.is_none());
        assert!(matches!(r.conditions[0], ClinicalCondition::Age { .. }));
    }
}
