use std::sync::Arc;

use tracing::info;

use crate::config::{ClassifierKind, ServerConfig};
use crate::core::{
    BackendBuilder, BackendRegistry, CustomModelCatalog, LanguageClassifier, ScriptClassifier,
    SpeechRouter, WorkerBackendBuilder, WorkerClassifier,
};

/// Application state shared by all handlers
pub struct AppState {
    pub config: ServerConfig,
    pub router: SpeechRouter,
}

impl AppState {
    /// Wire the worker-backed builder, the configured classifier and the
    /// custom model catalog. No model is loaded here; see
    /// [`BackendRegistry::preload`].
    pub fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let builder: Arc<dyn BackendBuilder> = Arc::new(WorkerBackendBuilder::new(
            config.worker_url.clone(),
            config.worker_timeout(),
        )?);

        let classifier: Arc<dyn LanguageClassifier> = match config.classifier {
            ClassifierKind::Script => Arc::new(ScriptClassifier::new()),
            ClassifierKind::Worker => Arc::new(WorkerClassifier::new(
                config.worker_url.clone(),
                config.worker_timeout(),
            )?),
        };
        info!(classifier = ?config.classifier, worker = %config.worker_url, "Configured collaborators");

        let catalog = CustomModelCatalog::load(&config.custom_models_path);
        let registry = Arc::new(BackendRegistry::new(builder, config.device));

        Ok(Self::from_parts(
            config,
            classifier,
            registry,
            Arc::new(catalog),
        ))
    }

    /// Assemble state from already constructed collaborators
    pub fn from_parts(
        config: ServerConfig,
        classifier: Arc<dyn LanguageClassifier>,
        registry: Arc<BackendRegistry>,
        catalog: Arc<CustomModelCatalog>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            router: SpeechRouter::new(classifier, registry, catalog),
        })
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        self.router.registry()
    }

    pub fn catalog(&self) -> &Arc<CustomModelCatalog> {
        self.router.catalog()
    }
}
