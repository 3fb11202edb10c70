//! Constants used throughout the CDS core crate.
//!
//! Coding-system identifiers, intervention tags and default locations are kept here so that
//! rules, care-gap checks and validation agree on the same codes.

/// LOINC code for haemoglobin A1c, the primary glycaemic marker.
pub const HBA1C_LOINC: &str = "LOINC:4548-4";

/// LOINC code for estimated glomerular filtration rate.
pub const EGFR_LOINC: &str = "LOINC:48643-1";

/// LOINC code for urine albumin-to-creatinine ratio.
pub const UACR_LOINC: &str = "LOINC:9318-7";

/// MONDO code for type 2 diabetes mellitus.
pub const T2DM_MONDO: &str = "MONDO:0005148";

/// Diagnosis codes starting with this prefix belong to the diabetes concept family.
pub const DIABETES_FAMILY_PREFIX: &str = "MONDO:000514";

/// RxNorm codes treated as insulin therapy for coverage estimation.
pub const INSULIN_RXNORM_CODES: &[&str] = &["rxnorm:2618", "rxnorm:260265", "rxnorm:575802"];

/// Prefix given to classification codes sent without one.
pub const ICD10_PREFIX: &str = "ICD10CM";

/// ICD-10-CM codes (local part) for type 2 diabetes with ophthalmic or circulatory complications.
pub const DIABETES_COMPLICATION_ICD10: &[&str] = &[
    "E11.31", "E11.32", "E11.33", "E11.34", "E11.35", "E11.36", "E11.39",
];

/// Intervention tag: GLP-1 receptor agonists.
pub const GLP1: &str = "GLP1";

/// Intervention tag: SGLT2 inhibitors.
pub const SGLT2: &str = "SGLT2";

/// Intervention tag: continuous glucose monitoring.
pub const CGM: &str = "CGM";

/// Eye-exam recall interval (days) for patients with diabetes complications.
/// Not configurable.
pub const COMPLICATED_EYE_EXAM_DAYS: i64 = 180;

/// Default directory scanned for ontology sources.
pub const DEFAULT_ONTOLOGY_DIR: &str = "ontologies";

/// Default directory holding per-tenant configuration files.
pub const DEFAULT_TENANT_CONFIG_DIR: &str = "configs/tenants";

/// Default configuration file used when no tenant file matches.
pub const DEFAULT_CONFIG_PATH: &str = "configs/default.json";
