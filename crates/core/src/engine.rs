//! The evaluation facade used by the transport layers.
//!
//! An [`Engine`] binds one configuration to the shared graph, rule set and audit sink. It
//! holds no per-call state: the clinician and the evaluation date are arguments, so one engine
//! serves concurrent requests.

use crate::audit::AuditSink;
use crate::care_gaps::{identify_care_gaps, CareGap};
use crate::concepts::ConceptResolver;
use crate::config::Settings;
use crate::eligibility::{aggregate, EligibilityDecision};
use crate::patient::Patient;
use crate::registry::RuleRegistry;
use crate::rules::{EvalContext, RuleOutcome};
use crate::temporal::TemporalValidator;
use crate::validation::{validate_patient, ValidationResult};
use crate::CdsResult;
use cds_ontology::{load_dir, Graph, GraphStore, NamespaceMap};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Everything produced by one evaluation.
#[derive(Clone, Debug, Serialize)]
pub struct EngineOutput {
    pub validation: ValidationResult,
    pub eligibility: BTreeMap<String, EligibilityDecision>,
    pub care_gaps: Vec<CareGap>,
    pub rule_evaluations: BTreeMap<String, RuleOutcome>,
    pub audit_trail_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Engine {
    settings: Settings,
    resolver: ConceptResolver,
    registry: Arc<RuleRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl Engine {
    pub fn new(
        settings: Settings,
        graph: Arc<dyn GraphStore>,
        registry: Arc<RuleRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            settings,
            resolver: ConceptResolver::new(graph),
            registry,
            audit,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resolver(&self) -> &ConceptResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Evaluates `patient` as of `as_of` and records the result with the audit sink.
    ///
    /// Never fails: data problems surface in `validation` and in unmet reasons.
    pub fn evaluate(&self, patient: &Patient, clinician_id: Option<&str>, as_of: NaiveDate) -> EngineOutput {
        let temporal = TemporalValidator::new(&self.settings, as_of);
        let ctx = EvalContext {
            resolver: &self.resolver,
            temporal,
        };

        let validation = validate_patient(patient, &temporal);
        let rule_evaluations = self.registry.evaluate_all(patient, ctx);
        let eligibility = aggregate(patient, &rule_evaluations, &self.settings);
        let care_gaps = identify_care_gaps(patient, &temporal);
        let audit_trail_id = self
            .audit
            .record(patient, clinician_id, &rule_evaluations, &eligibility);

        tracing::info!(
            "evaluated patient {} against {} rules ({} care gaps)",
            patient.patient_id,
            rule_evaluations.len(),
            care_gaps.len()
        );

        EngineOutput {
            validation,
            eligibility,
            care_gaps,
            rule_evaluations,
            audit_trail_id,
            timestamp: Utc::now(),
        }
    }
}

/// Loads every readable ontology source under `dir` into a fresh graph.
///
/// Unreadable sources are logged and skipped; a missing directory yields an empty graph.
pub fn load_graph(dir: &Path) -> Graph {
    let mut graph = Graph::new(NamespaceMap::with_defaults());
    let report = load_dir(&mut graph, dir);
    tracing::info!(
        "ontology load: {} sources, {} triples, {} skipped",
        report.loaded.len(),
        report.triples_added(),
        report.skipped.len()
    );
    graph
}

/// The built-in rules plus, if given, the rules in `extensions`.
///
/// # Errors
///
/// Returns an error if the extension file cannot be read or parsed, or repeats a rule id.
pub fn build_registry(extensions: Option<&Path>) -> CdsResult<RuleRegistry> {
    let mut registry = RuleRegistry::with_defaults();
    if let Some(path) = extensions {
        registry.load_extensions(path)?;
    }
    Ok(registry)
}
