//! Folds per-rule outcomes into one decision per intervention.

use crate::config::ConfigSource;
use crate::constants::{CGM, GLP1, SGLT2};
use crate::patient::Patient;
use crate::rules::RuleOutcome;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Confidence tier, ordered weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    pub fn as_str(self) -> &'static str {
        match self {
            Strength::Weak => "weak",
            Strength::Moderate => "moderate",
            Strength::Strong => "strong",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    Likely,
    Unlikely,
    Unknown,
}

impl Coverage {
    pub fn as_str(self) -> &'static str {
        match self {
            Coverage::Likely => "likely",
            Coverage::Unlikely => "unlikely",
            Coverage::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EligibilityDecision {
    pub eligible: bool,
    pub strength: Strength,
    pub recommendations: Vec<String>,
    /// Surfaced for clinician judgement; never changes `eligible`.
    pub contraindications: Vec<String>,
    pub missing_data: Vec<String>,
    pub guideline_references: Vec<String>,
    pub evidence_levels: Vec<String>,
    pub payer_coverage_notes: Vec<String>,
    pub prior_auth_required: bool,
    pub estimated_coverage: Coverage,
}

#[derive(Default)]
struct Group {
    eligible_rules: usize,
    met: BTreeSet<String>,
    unmet: BTreeSet<String>,
    guideline_refs: BTreeSet<String>,
    evidence_levels: BTreeSet<String>,
}

/// Groups `outcomes` by intervention and derives one decision per group.
pub fn aggregate(
    patient: &Patient,
    outcomes: &BTreeMap<String, RuleOutcome>,
    config: &dyn ConfigSource,
) -> BTreeMap<String, EligibilityDecision> {
    let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
    for outcome in outcomes.values() {
        let group = groups.entry(outcome.intervention.as_str()).or_default();
        if outcome.eligible {
            group.eligible_rules += 1;
        }
        group.met.extend(outcome.met_conditions.iter().cloned());
        group.unmet.extend(outcome.unmet_conditions.iter().cloned());
        group.guideline_refs.insert(outcome.guideline_ref.clone());
        group.evidence_levels.insert(outcome.evidence_level.clone());
    }

    groups
        .into_iter()
        .map(|(intervention, group)| {
            let eligible = group.eligible_rules > 0;
            let strength = strength(eligible, group.eligible_rules, &group.evidence_levels);
            let (payer_coverage_notes, prior_auth_required) =
                payer_notes(patient, intervention, config);
            let decision = EligibilityDecision {
                eligible,
                strength,
                recommendations: group.met.into_iter().collect(),
                contraindications: contraindications(patient, intervention),
                missing_data: group.unmet.into_iter().collect(),
                guideline_references: group.guideline_refs.into_iter().collect(),
                evidence_levels: group.evidence_levels.into_iter().collect(),
                payer_coverage_notes,
                prior_auth_required,
                estimated_coverage: estimate_coverage(patient, intervention),
            };
            (intervention.to_owned(), decision)
        })
        .collect()
}

/// Strong with two or more eligible rules or any level-A evidence among the group's evaluated
/// rules, whether or not the group ended up eligible; moderate if merely eligible; weak
/// otherwise.
pub fn strength(eligible: bool, eligible_rules: usize, evidence_levels: &BTreeSet<String>) -> Strength {
    if eligible_rules >= 2 || evidence_levels.contains("A") {
        Strength::Strong
    } else if eligible {
        Strength::Moderate
    } else {
        Strength::Weak
    }
}

/// Fixed per-intervention contraindication checks.
pub fn contraindications(patient: &Patient, intervention: &str) -> Vec<String> {
    let mut out = Vec::new();
    match intervention {
        GLP1 => {
            if patient.pregnant {
                out.push("Pregnancy".to_owned());
            }
            if patient
                .contraindications
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case("pancreatitis"))
            {
                out.push("History of pancreatitis".to_owned());
            }
        }
        SGLT2 => {
            if patient
                .diagnoses
                .iter()
                .any(|d| d.name.trim().eq_ignore_ascii_case("esrd"))
            {
                out.push("End-stage renal disease".to_owned());
            }
        }
        _ => {}
    }
    out
}

/// Coverage lookup keyed by payer and intervention.
pub fn estimate_coverage(patient: &Patient, intervention: &str) -> Coverage {
    let cgm = if patient.uses_insulin() {
        Coverage::Likely
    } else {
        Coverage::Unlikely
    };
    match (patient.payer.as_deref(), intervention) {
        (Some("medicare" | "commercial"), GLP1 | SGLT2) => Coverage::Likely,
        (Some("medicare" | "commercial"), CGM) => cgm,
        (Some("medicaid"), SGLT2) => Coverage::Likely,
        (Some("medicaid"), GLP1 | CGM) => Coverage::Unlikely,
        _ => Coverage::Unknown,
    }
}

fn payer_notes(patient: &Patient, intervention: &str, config: &dyn ConfigSource) -> (Vec<String>, bool) {
    if patient.payer.as_deref() != Some("medicare") || intervention != CGM {
        return (Vec::new(), false);
    }
    let min_age = config.get_i64("payer_rules.medicare.cgm_min_age", 65);
    if i64::from(patient.age) < min_age {
        return (Vec::new(), false);
    }
    let prior_auth = config.get_bool("payer_rules.medicare.requires_prior_auth", true);
    (vec![format!("Medicare covers CGM for age >={min_age}")], prior_auth)
}
