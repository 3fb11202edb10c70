//! Condition variants and their evaluation against one patient.
//!
//! On the wire a condition is a flat record (`type`, `code` or `query`, `operator`, `value`),
//! which keeps rule files readable. In memory it is a closed enum with one shape per
//! supported kind/operator combination; everything else lands in
//! [`ClinicalCondition::Unsupported`] and is never met.

use crate::concepts::ConceptResolver;
use crate::patient::{codes_match, LabResult, Patient};
use crate::temporal::TemporalValidator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason recorded for any condition the evaluator does not handle.
pub const NOT_IMPLEMENTED: &str = "Condition type not implemented";

/// Where a condition's concept comes from: a single code, or a graph query naming a family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConceptSource {
    Code(String),
    Query(String),
}

impl ConceptSource {
    /// The code, or `"query"` for query-defined families.
    fn describe(&self) -> &str {
        match self {
            ConceptSource::Code(code) => code,
            ConceptSource::Query(_) => "query",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Exists,
    NotExists,
}

impl Presence {
    fn apply(self, found: bool) -> bool {
        match self {
            Presence::Exists => found,
            Presence::NotExists => !found,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Presence::Exists => "exists",
            Presence::NotExists => "not_exists",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    AtLeast,
    AtMost,
}

impl Comparison {
    fn holds(self, actual: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => actual >= threshold,
            Comparison::AtMost => actual <= threshold,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Comparison::AtLeast => ">=",
            Comparison::AtMost => "<=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conjunct of a clinical rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConditionRecord", into = "ConditionRecord")]
pub enum ClinicalCondition {
    /// The patient has (or lacks) a diagnosis that is, or is a kind of, `code`.
    Diagnosis { code: String, presence: Presence },
    /// A current lab result compares against `value`.
    Lab {
        source: ConceptSource,
        comparison: Comparison,
        value: f64,
    },
    /// The patient is (or is not) on a medication in the concept family.
    Medication {
        source: ConceptSource,
        presence: Presence,
    },
    Age { comparison: Comparison, value: f64 },
    Pregnancy { presence: Presence },
    /// Any diagnosis in the diabetes concept family.
    DiabetesFamily,
    /// Anything the evaluator does not handle. Always unmet.
    Unsupported {
        kind: String,
        code: Option<String>,
        operator: Option<String>,
    },
}

/// Flat wire form of a condition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ConditionRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    /// `curie` or `query`; only consulted when both `code` and `query` are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

impl ConditionRecord {
    fn concept_source(&self) -> Option<ConceptSource> {
        let code = self.code.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let query = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
        match (code, query) {
            (Some(code), None) => Some(ConceptSource::Code(code.to_owned())),
            (None, Some(query)) => Some(ConceptSource::Query(query.to_owned())),
            (Some(code), Some(query)) => match self.source.as_deref() {
                Some("query") => Some(ConceptSource::Query(query.to_owned())),
                Some("curie") | Some("code") => Some(ConceptSource::Code(code.to_owned())),
                _ => None,
            },
            (None, None) => None,
        }
    }

    fn presence(&self) -> Option<Presence> {
        match self.operator.as_deref().unwrap_or("exists") {
            "exists" => Some(Presence::Exists),
            "not_exists" => Some(Presence::NotExists),
            _ => None,
        }
    }

    fn comparison(&self) -> Option<Comparison> {
        match self.operator.as_deref()? {
            ">=" => Some(Comparison::AtLeast),
            "<=" => Some(Comparison::AtMost),
            _ => None,
        }
    }

    fn typed(&self) -> Option<ClinicalCondition> {
        let condition = match self.kind.as_str() {
            "diagnosis" => match self.concept_source()? {
                ConceptSource::Code(code) => ClinicalCondition::Diagnosis {
                    code,
                    presence: self.presence()?,
                },
                ConceptSource::Query(_) => return None,
            },
            "lab" => ClinicalCondition::Lab {
                source: self.concept_source()?,
                comparison: self.comparison()?,
                value: self.value?,
            },
            "medication" => ClinicalCondition::Medication {
                source: self.concept_source()?,
                presence: self.presence()?,
            },
            "demographic" => match self.code.as_deref()? {
                "age" => ClinicalCondition::Age {
                    comparison: self.comparison()?,
                    value: self.value?,
                },
                "pregnancy" => ClinicalCondition::Pregnancy {
                    presence: self.presence()?,
                },
                _ => return None,
            },
            "diagnosis_generic" => match (self.code.as_deref()?, self.presence()?) {
                ("diabetes", Presence::Exists) => ClinicalCondition::DiabetesFamily,
                _ => return None,
            },
            _ => return None,
        };
        Some(condition)
    }
}

impl From<ConditionRecord> for ClinicalCondition {
    fn from(record: ConditionRecord) -> Self {
        record.typed().unwrap_or(ClinicalCondition::Unsupported {
            kind: record.kind,
            code: record.code,
            operator: record.operator,
        })
    }
}

fn source_fields(source: ConceptSource) -> (Option<String>, Option<String>, Option<String>) {
    match source {
        ConceptSource::Code(code) => (Some(code), None, None),
        ConceptSource::Query(query) => (None, Some(query), Some("query".into())),
    }
}

impl From<ClinicalCondition> for ConditionRecord {
    fn from(condition: ClinicalCondition) -> Self {
        match condition {
            ClinicalCondition::Diagnosis { code, presence } => ConditionRecord {
                kind: "diagnosis".into(),
                code: Some(code),
                operator: Some(presence.as_str().into()),
                ..Default::default()
            },
            ClinicalCondition::Lab {
                source,
                comparison,
                value,
            } => {
                let (code, query, source) = source_fields(source);
                ConditionRecord {
                    kind: "lab".into(),
                    code,
                    query,
                    source,
                    operator: Some(comparison.as_str().into()),
                    value: Some(value),
                }
            }
            ClinicalCondition::Medication { source, presence } => {
                let (code, query, source) = source_fields(source);
                ConditionRecord {
                    kind: "medication".into(),
                    code,
                    query,
                    source,
                    operator: Some(presence.as_str().into()),
                    value: None,
                }
            }
            ClinicalCondition::Age { comparison, value } => ConditionRecord {
                kind: "demographic".into(),
                code: Some("age".into()),
                operator: Some(comparison.as_str().into()),
                value: Some(value),
                ..Default::default()
            },
            ClinicalCondition::Pregnancy { presence } => ConditionRecord {
                kind: "demographic".into(),
                code: Some("pregnancy".into()),
                operator: Some(presence.as_str().into()),
                ..Default::default()
            },
            ClinicalCondition::DiabetesFamily => ConditionRecord {
                kind: "diagnosis_generic".into(),
                code: Some("diabetes".into()),
                operator: Some("exists".into()),
                ..Default::default()
            },
            ClinicalCondition::Unsupported {
                kind,
                code,
                operator,
            } => ConditionRecord {
                kind,
                code,
                operator,
                ..Default::default()
            },
        }
    }
}

/// Shared read-only context for evaluating conditions.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub resolver: &'a ConceptResolver,
    pub temporal: TemporalValidator<'a>,
}

impl ClinicalCondition {
    /// Evaluates this condition, returning whether it is met and the reason to report.
    ///
    /// Never fails: unresolvable concepts, malformed queries and unsupported combinations
    /// all yield an unmet condition with an explanatory reason.
    pub fn evaluate(&self, patient: &Patient, ctx: EvalContext<'_>) -> (bool, String) {
        match self {
            ClinicalCondition::Diagnosis { code, presence } => {
                evaluate_diagnosis(code, *presence, patient, ctx.resolver)
            }
            ClinicalCondition::Lab {
                source,
                comparison,
                value,
            } => evaluate_lab(source, *comparison, *value, patient, ctx),
            ClinicalCondition::Medication { source, presence } => {
                evaluate_medication(source, *presence, patient, ctx.resolver)
            }
            ClinicalCondition::Age { comparison, value } => (
                comparison.holds(f64::from(patient.age), *value),
                format!("Age {comparison} {value:?}"),
            ),
            ClinicalCondition::Pregnancy { presence } => {
                (presence.apply(patient.pregnant), "Pregnancy status".into())
            }
            ClinicalCondition::DiabetesFamily => (patient.has_diabetes(), "Has diabetes".into()),
            ClinicalCondition::Unsupported { kind, .. } => {
                tracing::debug!("condition of type '{kind}' is not supported");
                (false, NOT_IMPLEMENTED.into())
            }
        }
    }
}

fn evaluate_diagnosis(
    code: &str,
    presence: Presence,
    patient: &Patient,
    resolver: &ConceptResolver,
) -> (bool, String) {
    let reason = format!("Diagnosis {code}");
    let target = match resolver.resolve(code) {
        Ok(target) => target,
        Err(e) => {
            tracing::debug!("diagnosis concept {code} not resolvable: {e}");
            return (false, format!("{reason}: concept not resolvable"));
        }
    };
    let found = patient
        .diagnoses
        .iter()
        .flat_map(|d| d.codes())
        .filter_map(|c| match resolver.resolve(&c) {
            Ok(concept) => Some(concept),
            Err(e) => {
                tracing::debug!("patient diagnosis code {c} not resolvable: {e}");
                None
            }
        })
        .any(|concept| resolver.is_a(&concept, &target));
    (presence.apply(found), reason)
}

fn find_lab<'p>(
    source: &ConceptSource,
    patient: &'p Patient,
    resolver: &ConceptResolver,
) -> Result<Option<&'p LabResult>, String> {
    match source {
        ConceptSource::Code(code) => Ok(patient.lab(code)),
        ConceptSource::Query(query) => {
            let members = resolver.run_query(query).map_err(|e| e.to_string())?;
            Ok(patient
                .labs
                .iter()
                .find(|lab| resolver.code_in(&lab.code, &members)))
        }
    }
}

fn evaluate_lab(
    source: &ConceptSource,
    comparison: Comparison,
    threshold: f64,
    patient: &Patient,
    ctx: EvalContext<'_>,
) -> (bool, String) {
    let label = source.describe();
    let lab = match find_lab(source, patient, ctx.resolver) {
        Ok(lab) => lab,
        Err(e) => {
            tracing::debug!("lab concept query failed: {e}");
            return (false, format!("Lab {label}: {e}"));
        }
    };
    let Some(lab) = lab else {
        return (false, format!("Lab {label}: No lab result"));
    };
    if let Err(reason) = ctx.temporal.is_current(Some(lab.date), "lab") {
        return (false, format!("Lab {label}: {reason}"));
    }
    (
        comparison.holds(lab.value, threshold),
        format!("{} {comparison} {threshold:?}", lab.code),
    )
}

fn evaluate_medication(
    source: &ConceptSource,
    presence: Presence,
    patient: &Patient,
    resolver: &ConceptResolver,
) -> (bool, String) {
    let reason = format!("Medication {}", source.describe());
    let found = match source {
        ConceptSource::Code(code) => {
            let target = resolver.resolve(code).ok();
            patient.medications.iter().any(|m| {
                codes_match(&m.code, code)
                    || target.as_ref().is_some_and(|t| {
                        resolver
                            .resolve(&m.code)
                            .is_ok_and(|concept| resolver.is_a(&concept, t))
                    })
            })
        }
        ConceptSource::Query(query) => match resolver.run_query(query) {
            Ok(members) => patient
                .medications
                .iter()
                .any(|m| resolver.code_in(&m.code, &members)),
            Err(e) => {
                tracing::debug!("medication concept query failed: {e}");
                return (false, format!("{reason}: {e}"));
            }
        },
    };
    (presence.apply(found), reason)
}
