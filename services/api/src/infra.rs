use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use freightlens::analytics::{
    CatalogService, CustomDefinitions, DefinitionRepository, RepositoryError,
};
use freightlens::config::AppConfig;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local store for user-created definitions; the catalog core only
/// sees the repository trait.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDefinitionRepository {
    definitions: Arc<Mutex<CustomDefinitions>>,
}

impl DefinitionRepository for InMemoryDefinitionRepository {
    fn load(&self) -> Result<CustomDefinitions, RepositoryError> {
        Ok(self
            .definitions
            .lock()
            .expect("definition store mutex poisoned")
            .clone())
    }

    fn save(&self, definitions: &CustomDefinitions) -> Result<(), RepositoryError> {
        *self
            .definitions
            .lock()
            .expect("definition store mutex poisoned") = definitions.clone();
        Ok(())
    }
}

pub(crate) fn build_catalog_service(
    config: &AppConfig,
) -> Arc<CatalogService<InMemoryDefinitionRepository>> {
    Arc::new(CatalogService::new(
        Arc::new(InMemoryDefinitionRepository::default()),
        config.analytics.metric_cache_ttl,
    ))
}
