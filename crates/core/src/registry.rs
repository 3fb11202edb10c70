//! The active rule set.
//!
//! A registry is assembled once (defaults plus optional extension files) and is read-only
//! afterwards; evaluation takes `&self` and may run from many threads at once.

use crate::patient::Patient;
use crate::rules::defaults::default_rules;
use crate::rules::{ClinicalRule, EvalContext, RuleOutcome};
use crate::{CdsError, CdsResult};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<ClinicalRule>,
}

/// Reads an extension rule file (`.json`, `.yaml` or `.yml`) shaped as `{ rules: [...] }`.
///
/// # Errors
///
/// Returns `RuleFileRead` if the file cannot be read, `UnsupportedFormat` for other
/// extensions and `RuleFileParse` if the document does not describe rules.
pub fn read_rule_file(path: &Path) -> CdsResult<Vec<ClinicalRule>> {
    let text = std::fs::read_to_string(path).map_err(CdsError::RuleFileRead)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let parse_err = |message: String| CdsError::RuleFileParse {
        path: path.display().to_string(),
        message,
    };
    let file: RuleFile = match ext.as_str() {
        "json" => serde_json::from_str(&text).map_err(|e| parse_err(e.to_string()))?,
        "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| parse_err(e.to_string()))?,
        _ => return Err(CdsError::UnsupportedFormat(path.display().to_string())),
    };
    Ok(file.rules)
}

#[derive(Clone, Debug, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, ClinicalRule>,
}

impl RuleRegistry {
    /// A registry holding only the given rules.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRule` if two rules share an id.
    pub fn new(rules: impl IntoIterator<Item = ClinicalRule>) -> CdsResult<Self> {
        let mut registry = Self::default();
        registry.extend(rules)?;
        Ok(registry)
    }

    /// A registry holding the built-in rule set.
    pub fn with_defaults() -> Self {
        let mut rules = BTreeMap::new();
        for rule in default_rules() {
            rules.insert(rule.rule_id.clone(), rule);
        }
        Self { rules }
    }

    /// Adds `rules`, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRule` if any id is already registered or repeated in `rules`; the
    /// registry is left unchanged.
    pub fn extend(&mut self, rules: impl IntoIterator<Item = ClinicalRule>) -> CdsResult<usize> {
        let rules: Vec<ClinicalRule> = rules.into_iter().collect();
        let mut seen = BTreeSet::new();
        for rule in &rules {
            if self.rules.contains_key(&rule.rule_id) || !seen.insert(rule.rule_id.as_str()) {
                return Err(CdsError::DuplicateRule(rule.rule_id.clone()));
            }
        }
        let added = rules.len();
        for rule in rules {
            self.rules.insert(rule.rule_id.clone(), rule);
        }
        Ok(added)
    }

    /// Loads extension rules from `path` and adds them.
    ///
    /// # Errors
    ///
    /// See [`read_rule_file`] and [`RuleRegistry::extend`].
    pub fn load_extensions(&mut self, path: &Path) -> CdsResult<usize> {
        let rules = read_rule_file(path)?;
        let added = self.extend(rules)?;
        tracing::info!("loaded {added} extension rules from {}", path.display());
        Ok(added)
    }

    pub fn get(&self, rule_id: &str) -> Option<&ClinicalRule> {
        self.rules.get(rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClinicalRule> {
        self.rules.values()
    }

    pub fn rules_for_intervention(&self, intervention: &str) -> Vec<&ClinicalRule> {
        self.rules
            .values()
            .filter(|r| r.intervention == intervention)
            .collect()
    }

    /// Evaluates every rule that applies to the patient on the context's evaluation date.
    ///
    /// Rules scoped to other payers, not yet effective, or already expired are skipped and
    /// do not appear in the result.
    pub fn evaluate_all(
        &self,
        patient: &Patient,
        ctx: EvalContext<'_>,
    ) -> BTreeMap<String, RuleOutcome> {
        let as_of = ctx.temporal.today();
        let payer = patient.payer.as_deref();
        self.rules
            .values()
            .filter(|rule| {
                let applies = rule.applies_to_payer(payer) && rule.is_active(as_of);
                if !applies {
                    tracing::debug!("skipping rule {} for patient {}", rule.rule_id, patient.patient_id);
                }
                applies
            })
            .map(|rule| (rule.rule_id.clone(), rule.outcome(patient, ctx)))
            .collect()
    }
}
