//! Input validation utilities.
//!
//! Two kinds of check live here:
//! - a pre-evaluation sanity pass over a patient record, whose findings are returned next to
//!   the decisions rather than raised
//! - guards on identifiers that are later embedded in filesystem paths

use crate::constants::HBA1C_LOINC;
use crate::patient::Patient;
use crate::temporal::TemporalValidator;
use crate::{CdsError, CdsResult};
use serde::{Deserialize, Serialize};

/// Blocking errors and advisory warnings about a patient record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Sanity-checks a patient record before evaluation.
///
/// Evaluation proceeds whatever this reports.
pub fn validate_patient(patient: &Patient, temporal: &TemporalValidator<'_>) -> ValidationResult {
    let mut v = ValidationResult::default();

    if patient.diagnoses.is_empty() {
        v.errors.push("No diagnoses recorded".into());
    }

    let hba1c = patient.lab(HBA1C_LOINC).map(|l| l.date);
    if let Err(reason) = temporal.is_current(hba1c, "hba1c") {
        v.errors.push(format!("HbA1c: {reason}"));
    }

    if patient.pregnant && patient.age > 55 {
        v.warnings.push("Pregnant age > 55".into());
    }

    for med in &patient.medications {
        if med.contraindicated {
            v.errors.push(format!("Contraindicated medication: {}", med.name));
        }
        if med.end_date.is_some_and(|end| end < med.start_date) {
            v.warnings
                .push(format!("Medication {} ends before it starts", med.name));
        }
    }

    v
}

/// Validates that a tenant identifier is safe to use as a configuration file stem.
///
/// The identifier is joined onto the tenant configuration directory, so it must not be able
/// to name anything outside it:
/// - Rejects empty or whitespace-only strings
/// - Bounds the length to avoid pathological inputs
/// - Restricts characters to ASCII alphanumerics, '.', '-' and '_'
/// - Rejects `..` sequences
///
/// # Errors
///
/// Returns a `CdsError::InvalidInput` if the tenant identifier is invalid.
pub fn validate_tenant_id(tenant_id: &str) -> CdsResult<()> {
    const MAX_TENANT_ID_LEN: usize = 253;

    if tenant_id.trim().is_empty() {
        return Err(CdsError::InvalidInput("tenant id cannot be empty".into()));
    }

    if tenant_id.len() > MAX_TENANT_ID_LEN {
        return Err(CdsError::InvalidInput(format!(
            "tenant id exceeds maximum length of {} characters",
            MAX_TENANT_ID_LEN
        )));
    }

    let ok = tenant_id
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok {
        return Err(CdsError::InvalidInput(
            "tenant id contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
                .into(),
        ));
    }

    if tenant_id.contains("..") {
        return Err(CdsError::InvalidInput(
            "tenant id cannot contain '..'".into(),
        ));
    }

    Ok(())
}
