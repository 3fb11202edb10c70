//! Evaluation audit trail.
//!
//! The engine reports every evaluation to an [`AuditSink`] and gets back an opaque trail id.
//! [`InMemoryAuditLog`] keeps entries for the life of the process and can render them as FHIR
//! `AuditEvent` resources.

use crate::eligibility::EligibilityDecision;
use crate::patient::Patient;
use crate::rules::RuleOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Action recorded for a full patient evaluation.
pub const EVALUATION_ACTION: &str = "clinical_evaluation";

/// Receives one record per evaluation.
pub trait AuditSink: Send + Sync {
    /// Records an evaluation and returns its trail identifier.
    fn record(
        &self,
        patient: &Patient,
        clinician_id: Option<&str>,
        outcomes: &BTreeMap<String, RuleOutcome>,
        decisions: &BTreeMap<String, EligibilityDecision>,
    ) -> String;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub patient_id: String,
    pub clinician_id: Option<String>,
    pub action: String,
    pub input: Value,
    pub output: Value,
    pub metadata: Value,
}

impl AuditEntry {
    /// FHIR `AuditEvent` rendering of this entry.
    pub fn to_fhir(&self) -> Value {
        json!({
            "resourceType": "AuditEvent",
            "id": self.id.to_string(),
            "type": { "code": self.action },
            "recorded": self.timestamp.to_rfc3339(),
            "agent": [{
                "who": { "identifier": self.clinician_id.as_deref().unwrap_or("system") }
            }],
            "entity": [{
                "what": { "reference": format!("Patient/{}", self.patient_id) },
                "detail": self.metadata.clone(),
            }],
        })
    }
}

/// Process-lifetime audit log.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every entry for `patient_id`, oldest first.
    pub fn patient_trail(&self, patient_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.patient_id == patient_id)
            .cloned()
            .collect()
    }

    /// FHIR `AuditEvent` resources for entries recorded within `[start, end]`.
    pub fn export_fhir_audit(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| start <= e.timestamp && e.timestamp <= end)
            .map(AuditEntry::to_fhir)
            .collect()
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!("failed to serialise audit payload: {e}");
        Value::Null
    })
}

impl AuditSink for InMemoryAuditLog {
    fn record(
        &self,
        patient: &Patient,
        clinician_id: Option<&str>,
        outcomes: &BTreeMap<String, RuleOutcome>,
        decisions: &BTreeMap<String, EligibilityDecision>,
    ) -> String {
        let diagnoses: Vec<&str> = patient.diagnoses.iter().map(|d| d.name.as_str()).collect();
        let rules: Vec<&str> = outcomes.keys().map(String::as_str).collect();
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            patient_id: patient.patient_id.to_string(),
            clinician_id: clinician_id.map(str::to_owned),
            action: EVALUATION_ACTION.into(),
            input: json!({
                "age": patient.age,
                "sex": to_json(&patient.sex),
                "diagnoses": diagnoses,
                "labs": patient.labs.len(),
                "medications": patient.medications.len(),
            }),
            output: to_json(decisions),
            metadata: json!({
                "rules_evaluated": rules,
                "payer": patient.payer,
            }),
        };
        let id = entry.id.to_string();
        tracing::debug!("audit entry {id} recorded for patient {}", entry.patient_id);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        id
    }
}
