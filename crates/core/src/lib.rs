//! # CDS Core
//!
//! Rule evaluation core for the diabetes clinical decision-support service.
//!
//! This crate turns a patient record into per-intervention eligibility decisions and care gaps:
//! - Concept resolution and subsumption over the shared semantic graph
//! - Recency and screening checks against an explicit evaluation date
//! - A typed rule model whose conditions fail closed
//! - The rule registry, eligibility aggregation, care-gap detection and record validation
//! - Engine and per-tenant engine registries, plus the evaluation audit trail
//!
//! **No API concerns**: HTTP routing, authentication and process environment belong in
//! `api-rest`, the `cds` CLI and the service binary.

pub mod audit;
pub mod care_gaps;
pub mod concepts;
pub mod config;
pub mod constants;
pub mod engine;
pub mod eligibility;
pub mod error;
pub mod patient;
pub mod registry;
pub mod rules;
pub mod temporal;
pub mod tenants;
pub mod validation;

pub use audit::{AuditEntry, AuditSink, InMemoryAuditLog};
pub use care_gaps::CareGap;
pub use concepts::{ConceptId, ConceptResolver};
pub use config::{ConfigSource, ServiceConfig, Settings};
pub use engine::{build_registry, load_graph, Engine, EngineOutput};
pub use eligibility::{Coverage, EligibilityDecision, Strength};
pub use error::{CdsError, CdsResult};
pub use patient::{Diagnosis, LabResult, Medication, Patient, Sex, VitalSigns};
pub use registry::{read_rule_file, RuleRegistry};
pub use rules::{ClinicalCondition, ClinicalRule, RuleOutcome, RuleSource};
pub use temporal::TemporalValidator;
pub use tenants::TenantEngines;
pub use validation::{validate_tenant_id, ValidationResult};
