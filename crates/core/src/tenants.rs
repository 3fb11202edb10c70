//! Per-tenant engines sharing one graph, rule set and audit sink.
//!
//! Engines are built on first use from the tenant's configuration file and kept until
//! explicitly evicted or reloaded. Requests without a tenant use the default configuration.

use crate::audit::AuditSink;
use crate::config::{ServiceConfig, Settings};
use crate::engine::Engine;
use crate::registry::RuleRegistry;
use crate::validation::validate_tenant_id;
use crate::CdsResult;
use cds_ontology::GraphStore;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type TenantKey = Option<String>;

pub struct TenantEngines {
    service: ServiceConfig,
    graph: Arc<dyn GraphStore>,
    registry: Arc<RuleRegistry>,
    audit: Arc<dyn AuditSink>,
    engines: RwLock<HashMap<TenantKey, Arc<Engine>>>,
}

impl TenantEngines {
    pub fn new(
        service: ServiceConfig,
        graph: Arc<dyn GraphStore>,
        registry: Arc<RuleRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            service,
            graph,
            registry,
            audit,
            engines: RwLock::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    fn key(tenant_id: Option<&str>) -> CdsResult<TenantKey> {
        match tenant_id {
            Some(id) => {
                validate_tenant_id(id)?;
                Ok(Some(id.to_owned()))
            }
            None => Ok(None),
        }
    }

    fn build(&self, tenant_id: Option<&str>) -> CdsResult<Arc<Engine>> {
        let path = self.service.resolve_config_path(tenant_id);
        let settings = Settings::load(Some(&path)).map_err(|e| {
            tracing::warn!(
                "failed to load configuration {} for tenant {:?}: {e}",
                path.display(),
                tenant_id
            );
            e
        })?;
        tracing::info!(
            "built engine for tenant {:?} from {}",
            tenant_id,
            path.display()
        );
        Ok(Arc::new(Engine::new(
            settings,
            self.graph.clone(),
            self.registry.clone(),
            self.audit.clone(),
        )))
    }

    /// The engine for `tenant_id`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unsafe tenant id, or a configuration error if the
    /// tenant's file exists but cannot be loaded.
    pub fn engine_for(&self, tenant_id: Option<&str>) -> CdsResult<Arc<Engine>> {
        let key = Self::key(tenant_id)?;
        if let Some(engine) = self
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(engine.clone());
        }
        let built = self.build(tenant_id)?;
        let mut engines = self.engines.write().unwrap_or_else(PoisonError::into_inner);
        Ok(engines.entry(key).or_insert(built).clone())
    }

    /// Drops the cached engine for `tenant_id`. Returns whether one was cached.
    pub fn evict(&self, tenant_id: Option<&str>) -> bool {
        let key = tenant_id.map(str::to_owned);
        self.engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some()
    }

    /// Rebuilds the engine for `tenant_id` from its current configuration file.
    ///
    /// # Errors
    ///
    /// As for [`TenantEngines::engine_for`]; on error the previous engine stays cached.
    pub fn reload(&self, tenant_id: Option<&str>) -> CdsResult<Arc<Engine>> {
        let key = Self::key(tenant_id)?;
        let built = self.build(tenant_id)?;
        self.engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, built.clone());
        Ok(built)
    }

    pub fn cached(&self) -> usize {
        self.engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditLog;
    use crate::config::ConfigSource;
    use crate::CdsError;
    use cds_ontology::Graph;
    use std::fs;

    fn engines(dir: &std::path::Path) -> TenantEngines {
        let service = ServiceConfig::new(
            dir.join("ontologies"),
            dir.join("tenants"),
            dir.join("default.json"),
            None,
        );
        TenantEngines::new(
            service,
            Arc::new(Graph::default()),
            Arc::new(RuleRegistry::with_defaults()),
            Arc::new(InMemoryAuditLog::new()),
        )
    }

    fn recency(engine: &Engine) -> i64 {
        engine.settings().get_i64("thresholds.hba1c_recency_days", 0)
    }

    #[test]
    fn test_builds_once_per_tenant_and_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("tenants")).expect("mkdir");
        fs::write(
            dir.path().join("tenants/acme.yaml"),
            "thresholds:\n  hba1c_recency_days: 60\n",
        )
        .expect("write tenant");
        fs::write(
            dir.path().join("default.json"),
            r#"{"thresholds": {"hba1c_recency_days": 120}}"#,
        )
        .expect("write default");

        let tenants = engines(dir.path());
        let acme = tenants.engine_for(Some("acme")).expect("acme");
        assert_eq!(recency(&acme), 60);
        let again = tenants.engine_for(Some("acme")).expect("acme again");
        assert!(Arc::ptr_eq(&acme, &again));

        let other = tenants.engine_for(Some("globex")).expect("globex");
        assert_eq!(recency(&other), 120);
        let default = tenants.engine_for(None).expect("default");
        assert_eq!(recency(&default), 120);
        assert_eq!(tenants.cached(), 3);
    }

    #[test]
    fn test_reload_picks_up_changed_configuration() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("tenants")).expect("mkdir");
        let path = dir.path().join("tenants/acme.json");
        fs::write(&path, r#"{"thresholds": {"hba1c_recency_days": 60}}"#).expect("write");

        let tenants = engines(dir.path());
        let before = tenants.engine_for(Some("acme")).expect("acme");
        fs::write(&path, r#"{"thresholds": {"hba1c_recency_days": 45}}"#).expect("rewrite");
        assert_eq!(recency(&tenants.engine_for(Some("acme")).expect("cached")), 60);

        let after = tenants.reload(Some("acme")).expect("reload");
        assert_eq!(recency(&after), 45);
        assert_eq!(recency(&before), 60);

        assert!(tenants.evict(Some("acme")));
        assert!(!tenants.evict(Some("acme")));
        assert_eq!(tenants.cached(), 0);
    }

    #[test]
    fn test_rejects_unsafe_tenants_and_broken_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("tenants")).expect("mkdir");
        fs::write(dir.path().join("tenants/broken.json"), "{ nope").expect("write");
        let tenants = engines(dir.path());

        assert!(matches!(
            tenants.engine_for(Some("../secrets")),
            Err(CdsError::InvalidInput(_))
        ));
        assert!(matches!(
            tenants.engine_for(Some("broken")),
            Err(CdsError::ConfigParse(_))
        ));
        assert_eq!(tenants.cached(), 0);
    }
}
