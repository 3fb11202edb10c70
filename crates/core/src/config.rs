//! Core runtime configuration.
//!
//! Two layers live here:
//! - [`Settings`]: the clinical threshold tree consulted during evaluation through the
//!   [`ConfigSource`] dotted-key contract. Built-in defaults are deep-merged with an optional
//!   JSON or YAML file.
//! - [`ServiceConfig`]: locations resolved once at process startup and passed into the
//!   engine, so request handling never reads process-wide environment variables.

use crate::constants::{DEFAULT_CONFIG_PATH, DEFAULT_ONTOLOGY_DIR, DEFAULT_TENANT_CONFIG_DIR};
use crate::{CdsError, CdsResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Dotted-key lookup over nested configuration, e.g. `thresholds.hba1c_recency_days`.
///
/// Absent keys (or values of the wrong type) yield the caller-supplied default.
pub trait ConfigSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<&Value>;

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.lookup(key)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(default)
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.lookup(key).and_then(Value::as_f64).unwrap_or(default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.lookup(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

fn default_tree() -> Value {
    json!({
        "thresholds": {
            "hba1c_poor_control": 9.0,
            "hba1c_recency_days": 90,
            "annual_hba1c_days": 365,
            "obesity_bmi": 30,
            "ckd_egfr_threshold": 20,
            "ckd_uacr_threshold": 30,
            "age_cv_screening": 40,
            "annual_eye_exam_days": 365,
            "annual_foot_exam_days": 365,
            "annual_dental_exam_days": 365
        },
        "payer_rules": {
            "medicare": { "cgm_min_age": 65, "requires_prior_auth": true },
            "medicaid": { "state_specific": true },
            "commercial": { "cgm_min_age": 18, "requires_prior_auth": false }
        }
    })
}

fn deep_update(base: &mut Value, updates: Value) {
    match (base, updates) {
        (Value::Object(base), Value::Object(updates)) => {
            for (key, value) in updates {
                let nested = value.is_object() && base.get(&key).is_some_and(Value::is_object);
                if nested {
                    if let Some(existing) = base.get_mut(&key) {
                        deep_update(existing, value);
                    }
                } else {
                    base.insert(key, value);
                }
            }
        }
        (base, updates) => *base = updates,
    }
}

/// Clinical configuration tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    root: Value,
}

impl Settings {
    /// Built-in defaults only.
    pub fn defaults() -> Self {
        Self {
            root: default_tree(),
        }
    }

    /// Defaults with `overrides` deep-merged on top.
    pub fn from_value(overrides: Value) -> Self {
        let mut settings = Self::defaults();
        settings.merge(overrides);
        settings
    }

    /// Loads `path` (`.json`, `.yaml` or `.yml`) over the defaults.
    ///
    /// A `None` path or a path that does not exist yields the defaults. An empty YAML document
    /// counts as no overrides.
    ///
    /// # Errors
    ///
    /// Returns a `CdsError` if the file exists but cannot be read or parsed, or has an
    /// unrecognised extension.
    pub fn load(path: Option<&Path>) -> CdsResult<Self> {
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(Self::defaults());
        };
        let text = std::fs::read_to_string(path).map_err(CdsError::ConfigRead)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let overrides: Value = match ext.as_str() {
            "json" => serde_json::from_str(&text).map_err(CdsError::ConfigParse)?,
            "yaml" | "yml" => {
                let parsed: Option<Value> =
                    serde_yaml::from_str(&text).map_err(CdsError::YamlDeserialization)?;
                parsed.unwrap_or(Value::Null)
            }
            _ => return Err(CdsError::UnsupportedFormat(path.display().to_string())),
        };
        if overrides.is_null() {
            return Ok(Self::defaults());
        }
        tracing::debug!("loaded configuration overrides from {}", path.display());
        Ok(Self::from_value(overrides))
    }

    pub fn merge(&mut self, updates: Value) {
        deep_update(&mut self.root, updates);
    }

    /// Records threshold overrides for a clinic under `clinic_overrides.<clinic_id>`.
    pub fn set_clinic_overrides(&mut self, clinic_id: &str, overrides: Value) {
        let mut clinic = serde_json::Map::new();
        clinic.insert(clinic_id.to_owned(), overrides);
        self.merge(json!({ "clinic_overrides": Value::Object(clinic) }));
    }

    /// A copy of these settings with `clinic_overrides.<clinic_id>` merged into `thresholds`.
    /// Unknown clinics get an unchanged copy.
    pub fn for_clinic(&self, clinic_id: &str) -> Self {
        let mut out = self.clone();
        if let Some(overrides) = self
            .root
            .get("clinic_overrides")
            .and_then(|c| c.get(clinic_id))
            .cloned()
        {
            out.merge(json!({ "thresholds": overrides }));
        }
        out
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ConfigSource for Settings {
    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.root, |cur, part| cur.as_object()?.get(part))
    }
}

/// Service locations resolved at startup.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    ontology_dir: PathBuf,
    tenant_config_dir: PathBuf,
    default_config_path: PathBuf,
    rules_file: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn new(
        ontology_dir: PathBuf,
        tenant_config_dir: PathBuf,
        default_config_path: PathBuf,
        rules_file: Option<PathBuf>,
    ) -> Self {
        Self {
            ontology_dir,
            tenant_config_dir,
            default_config_path,
            rules_file,
        }
    }

    pub fn ontology_dir(&self) -> &Path {
        &self.ontology_dir
    }

    pub fn tenant_config_dir(&self) -> &Path {
        &self.tenant_config_dir
    }

    pub fn default_config_path(&self) -> &Path {
        &self.default_config_path
    }

    pub fn rules_file(&self) -> Option<&Path> {
        self.rules_file.as_deref()
    }

    /// Resolve the configuration file for `tenant_id`.
    ///
    /// Looks for `<tenant_config_dir>/<tenant_id>.json`, `.yaml` then `.yml`; falls back to the
    /// default configuration path when there is no tenant or no matching file.
    pub fn resolve_config_path(&self, tenant_id: Option<&str>) -> PathBuf {
        if let Some(tenant) = tenant_id {
            for suffix in ["json", "yaml", "yml"] {
                let candidate = self.tenant_config_dir.join(format!("{tenant}.{suffix}"));
                if candidate.is_file() {
                    return candidate;
                }
            }
        }
        self.default_config_path.clone()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(
            PathBuf::from(DEFAULT_ONTOLOGY_DIR),
            PathBuf::from(DEFAULT_TENANT_CONFIG_DIR),
            PathBuf::from(DEFAULT_CONFIG_PATH),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_answer_dotted_keys() {
        let s = Settings::defaults();
        assert_eq!(s.get_i64("thresholds.hba1c_recency_days", 0), 90);
        assert_eq!(s.get_f64("thresholds.hba1c_poor_control", 0.0), 9.0);
        assert!(s.get_bool("payer_rules.medicare.requires_prior_auth", false));
        assert_eq!(s.get_i64("thresholds.missing_key", 42), 42);
        assert_eq!(s.get_i64("thresholds", 7), 7);
    }

    #[test]
    fn test_deep_merge_keeps_sibling_keys() {
        let s = Settings::from_value(json!({
            "thresholds": { "hba1c_recency_days": 60 }
        }));
        assert_eq!(s.get_i64("thresholds.hba1c_recency_days", 0), 60);
        assert_eq!(s.get_i64("thresholds.annual_eye_exam_days", 0), 365);
    }

    #[test]
    fn test_loads_json_and_yaml_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_path = dir.path().join("tenant.json");
        fs::write(&json_path, r#"{"thresholds": {"age_cv_screening": 45}}"#).expect("write json");
        let yaml_path = dir.path().join("tenant.yaml");
        fs::write(&yaml_path, "thresholds:\n  annual_foot_exam_days: 200.0\n").expect("write yaml");
        let empty_path = dir.path().join("empty.yml");
        fs::write(&empty_path, "").expect("write empty");

        let from_json = Settings::load(Some(&json_path)).expect("load json");
        assert_eq!(from_json.get_i64("thresholds.age_cv_screening", 0), 45);

        let from_yaml = Settings::load(Some(&yaml_path)).expect("load yaml");
        assert_eq!(from_yaml.get_i64("thresholds.annual_foot_exam_days", 0), 200);

        let from_empty = Settings::load(Some(&empty_path)).expect("load empty");
        assert_eq!(from_empty, Settings::defaults());

        let missing = Settings::load(Some(&dir.path().join("absent.json"))).expect("missing");
        assert_eq!(missing, Settings::defaults());
    }

    #[test]
    fn test_rejects_bad_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bad_json = dir.path().join("bad.json");
        fs::write(&bad_json, "{ not json").expect("write");
        assert!(matches!(
            Settings::load(Some(&bad_json)),
            Err(CdsError::ConfigParse(_))
        ));

        let toml = dir.path().join("cfg.toml");
        fs::write(&toml, "a = 1").expect("write");
        assert!(matches!(
            Settings::load(Some(&toml)),
            Err(CdsError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_clinic_overrides_apply_to_thresholds() {
        let mut s = Settings::defaults();
        s.set_clinic_overrides(
            "clinic_001",
            json!({ "hba1c_recency_days": 60, "annual_eye_exam_days": 180 }),
        );
        let clinic = s.for_clinic("clinic_001");
        assert_eq!(clinic.get_i64("thresholds.hba1c_recency_days", 0), 60);
        assert_eq!(clinic.get_i64("thresholds.annual_eye_exam_days", 0), 180);
        assert_eq!(clinic.get_i64("thresholds.annual_foot_exam_days", 0), 365);

        let other = s.for_clinic("clinic_999");
        assert_eq!(other.get_i64("thresholds.hba1c_recency_days", 0), 90);
    }

    #[test]
    fn test_resolves_tenant_config_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("acme.yaml"), "{}").expect("write");
        let cfg = ServiceConfig::new(
            dir.path().join("ontologies"),
            dir.path().to_path_buf(),
            dir.path().join("default.json"),
            None,
        );
        assert_eq!(cfg.resolve_config_path(Some("acme")), dir.path().join("acme.yaml"));
        assert_eq!(cfg.resolve_config_path(Some("other")), dir.path().join("default.json"));
        assert_eq!(cfg.resolve_config_path(None), dir.path().join("default.json"));
    }
}
