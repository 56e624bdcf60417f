//! Backend registry.
//!
//! Owns every loaded backend in the process:
//!
//! - one **default** slot, holding the backend for the language most recently
//!   resolved. Loading another language replaces (and releases) it.
//! - a **custom** cache of backends built from catalog entries, keyed by model
//!   id. Entries are built on first use and kept for the process lifetime.
//!
//! Readers take an `Arc<Backend>` snapshot of the slot without locking.
//! [`BackendRegistry::swap`] is the only writer and is serialized, so two
//! requests racing to load the same language trigger one build.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use moka::future::Cache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::backend::{
    Backend, BackendBuilder, BackendLoadError, BackendLoadResult, BackendSpec, Device,
};
use super::catalog::CustomModelEntry;
use super::language::LanguageCode;

/// Outcome of acquiring the default backend for a language.
#[derive(Debug, Clone)]
pub enum DefaultBackend {
    /// The slot holds a backend for the requested language.
    Ready(Arc<Backend>),
    /// Loading the requested language failed; the previous backend stays
    /// active and is returned instead.
    Fallback {
        backend: Arc<Backend>,
        error: BackendLoadError,
    },
}

impl DefaultBackend {
    pub fn backend(&self) -> &Arc<Backend> {
        match self {
            Self::Ready(backend) | Self::Fallback { backend, .. } => backend,
        }
    }

    pub fn into_backend(self) -> Arc<Backend> {
        match self {
            Self::Ready(backend) | Self::Fallback { backend, .. } => backend,
        }
    }

    #[inline]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Load counters exposed by the health endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    pub loads: u64,
    pub failures: u64,
    pub evictions: u64,
    pub last_error: Option<String>,
}

pub struct BackendRegistry {
    builder: Arc<dyn BackendBuilder>,
    device: Device,
    active: ArcSwapOption<Backend>,
    swap_lock: AsyncMutex<()>,
    custom: Cache<String, Arc<Backend>>,
    stats: Mutex<RegistryStats>,
}

impl BackendRegistry {
    pub fn new(builder: Arc<dyn BackendBuilder>, device: Device) -> Self {
        Self {
            builder,
            device,
            active: ArcSwapOption::empty(),
            swap_lock: AsyncMutex::new(()),
            custom: Cache::builder().build(),
            stats: Mutex::new(RegistryStats::default()),
        }
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Snapshot of the default slot.
    pub fn active(&self) -> Option<Arc<Backend>> {
        self.active.load_full()
    }

    fn active_for(&self, language: LanguageCode) -> Option<Arc<Backend>> {
        self.active
            .load_full()
            .filter(|backend| backend.language() == language)
    }

    /// Load the startup backend. Unlike [`swap`](Self::swap), failure is
    /// always reported, even if a backend was already active.
    pub async fn preload(&self, language: LanguageCode) -> BackendLoadResult<Arc<Backend>> {
        match self.swap(language).await? {
            DefaultBackend::Ready(backend) => Ok(backend),
            DefaultBackend::Fallback { error, .. } => Err(error),
        }
    }

    /// Make `language` the default backend.
    ///
    /// Returns the active backend unchanged when it already serves `language`.
    /// Otherwise builds a new one and replaces the slot; the evicted backend is
    /// released once the last in-flight request holding it finishes. On build
    /// failure the slot is left untouched and the previous backend is returned
    /// as [`DefaultBackend::Fallback`]. Fails only if no backend was ever loaded.
    pub async fn swap(&self, language: LanguageCode) -> BackendLoadResult<DefaultBackend> {
        if let Some(backend) = self.active_for(language) {
            return Ok(DefaultBackend::Ready(backend));
        }

        let _guard = self.swap_lock.lock().await;

        // Another request may have loaded it while we waited
        if let Some(backend) = self.active_for(language) {
            return Ok(DefaultBackend::Ready(backend));
        }

        let spec = BackendSpec::stock(language, self.device);
        info!(language = %language, device = %self.device, "Loading default backend");

        match self.builder.build(&spec).await {
            Ok(backend) => {
                let backend = Arc::new(backend);
                let previous = self.active.swap(Some(Arc::clone(&backend)));
                self.record_load(previous.is_some());
                if let Some(previous) = previous {
                    info!(
                        evicted = %previous.language(),
                        loaded = %language,
                        "Replaced default backend"
                    );
                }
                Ok(DefaultBackend::Ready(backend))
            }
            Err(error) => {
                self.record_failure(&error);
                match self.active.load_full() {
                    Some(previous) => {
                        warn!(
                            requested = %language,
                            keeping = %previous.language(),
                            "Backend load failed, keeping previous backend: {error}"
                        );
                        Ok(DefaultBackend::Fallback {
                            backend: previous,
                            error,
                        })
                    }
                    None => Err(error),
                }
            }
        }
    }

    /// Backend for a catalog entry, built on first use and cached.
    ///
    /// Concurrent first uses of the same id share one build. Failures are
    /// returned to every waiter and are not cached.
    pub async fn custom_backend(
        &self,
        model_id: &str,
        entry: &CustomModelEntry,
    ) -> BackendLoadResult<Arc<Backend>> {
        let spec = BackendSpec::with_weights(
            entry.language,
            entry.config_path.clone(),
            entry.ckpt_path.clone(),
            self.device,
        );

        self.custom
            .try_get_with(model_id.to_string(), async {
                info!(model_id = %model_id, language = %entry.language, "Loading custom backend");
                match self.builder.build(&spec).await {
                    Ok(backend) => {
                        self.record_load(false);
                        Ok(Arc::new(backend))
                    }
                    Err(error) => {
                        self.record_failure(&error);
                        Err(error)
                    }
                }
            })
            .await
            .map_err(|error: Arc<BackendLoadError>| (*error).clone())
    }

    /// One-off backend from request-supplied weights. Never cached.
    pub async fn override_backend(
        &self,
        language: LanguageCode,
        config_path: &Path,
        ckpt_path: &Path,
    ) -> BackendLoadResult<Arc<Backend>> {
        let spec = BackendSpec::with_weights(language, config_path, ckpt_path, self.device);
        debug!(spec = %spec.describe(), "Building override backend");

        match self.builder.build(&spec).await {
            Ok(backend) => Ok(Arc::new(backend)),
            Err(error) => {
                self.record_failure(&error);
                Err(error)
            }
        }
    }

    /// Custom backends built so far, ordered by model id.
    pub fn cached_custom_models(&self) -> Vec<(String, Arc<Backend>)> {
        let mut models: Vec<_> = self
            .custom
            .iter()
            .map(|(id, backend)| (id.as_ref().clone(), backend))
            .collect();
        models.sort_by(|a, b| a.0.cmp(&b.0));
        models
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats.lock().clone()
    }

    /// Release every backend held by the registry.
    pub async fn shutdown(&self) {
        let _guard = self.swap_lock.lock().await;

        let custom = self.cached_custom_models();
        self.custom.invalidate_all();
        self.custom.run_pending_tasks().await;

        if let Some(previous) = self.active.swap(None) {
            info!(language = %previous.language(), "Releasing default backend");
            previous.release().await;
        }
        for (model_id, backend) in custom {
            info!(model_id = %model_id, "Releasing custom backend");
            backend.release().await;
        }
    }

    fn record_load(&self, evicted: bool) {
        let mut stats = self.stats.lock();
        stats.loads += 1;
        if evicted {
            stats.evictions += 1;
        }
    }

    fn record_failure(&self, error: &BackendLoadError) {
        let mut stats = self.stats.lock();
        stats.failures += 1;
        stats.last_error = Some(error.to_string());
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("device", &self.device)
            .field("active", &self.active().map(|b| b.language()))
            .field("custom", &self.custom.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{RenderRequest, SpeakerSet, SynthesisEngine, SynthesisResult};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullEngine;

    #[async_trait]
    impl SynthesisEngine for NullEngine {
        async fn render(&self, _request: RenderRequest<'_>) -> SynthesisResult<Bytes> {
            Ok(Bytes::new())
        }
    }

    #[derive(Default)]
    struct CountingBuilder {
        builds: AtomicUsize,
        failing: Mutex<HashSet<LanguageCode>>,
    }

    impl CountingBuilder {
        fn fail(&self, language: LanguageCode) {
            self.failing.lock().insert(language);
        }

        fn recover(&self, language: LanguageCode) {
            self.failing.lock().remove(&language);
        }

        fn builds(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackendBuilder for CountingBuilder {
        async fn build(&self, spec: &BackendSpec) -> BackendLoadResult<Backend> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.failing.lock().contains(&spec.language) {
                return Err(BackendLoadError::build(spec.describe(), "out of memory"));
            }
            let speakers: SpeakerSet = [(spec.language.default_voice(), 0)].into_iter().collect();
            Backend::new(
                spec.language,
                spec.language.as_str(),
                spec.device,
                speakers,
                Box::new(NullEngine),
            )
        }
    }

    fn registry() -> (Arc<CountingBuilder>, BackendRegistry) {
        let builder = Arc::new(CountingBuilder::default());
        let registry = BackendRegistry::new(builder.clone(), Device::Cpu);
        (builder, registry)
    }

    fn entry(id: &str, language: LanguageCode) -> CustomModelEntry {
        CustomModelEntry {
            model_id: id.to_string(),
            language,
            config_path: format!("/models/{id}/config.json").into(),
            ckpt_path: format!("/models/{id}/G.pth").into(),
            speaker_id: 0,
        }
    }

    #[tokio::test]
    async fn test_swap_same_language_does_not_reload() {
        let (builder, registry) = registry();

        let first = registry.swap(LanguageCode::En).await.unwrap();
        let second = registry.swap(LanguageCode::En).await.unwrap();

        assert!(!first.is_fallback());
        assert!(Arc::ptr_eq(first.backend(), second.backend()));
        assert_eq!(builder.builds(), 1);
    }

    #[tokio::test]
    async fn test_swap_replaces_single_slot() {
        let (builder, registry) = registry();

        registry.swap(LanguageCode::En).await.unwrap();
        let zh = registry.swap(LanguageCode::Zh).await.unwrap();

        assert_eq!(zh.backend().language(), LanguageCode::Zh);
        assert_eq!(registry.active().unwrap().language(), LanguageCode::Zh);
        assert_eq!(builder.builds(), 2);

        let stats = registry.stats();
        assert_eq!(stats.loads, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_failed_swap_keeps_previous_backend() {
        let (builder, registry) = registry();
        builder.fail(LanguageCode::Fr);

        registry.swap(LanguageCode::Es).await.unwrap();
        let result = registry.swap(LanguageCode::Fr).await.unwrap();

        match result {
            DefaultBackend::Fallback { backend, error } => {
                assert_eq!(backend.language(), LanguageCode::Es);
                assert!(error.to_string().contains("out of memory"));
            }
            DefaultBackend::Ready(_) => panic!("expected fallback"),
        }
        assert_eq!(registry.active().unwrap().language(), LanguageCode::Es);
        assert_eq!(registry.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_failed_swap_without_previous_is_an_error() {
        let (builder, registry) = registry();
        builder.fail(LanguageCode::En);

        assert!(registry.swap(LanguageCode::En).await.is_err());
        assert!(registry.active().is_none());
        assert!(registry.preload(LanguageCode::En).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_swaps_build_once() {
        let (builder, registry) = registry();
        let registry = Arc::new(registry);

        let (a, b) = tokio::join!(
            registry.swap(LanguageCode::Kr),
            registry.swap(LanguageCode::Kr)
        );

        assert!(Arc::ptr_eq(a.unwrap().backend(), b.unwrap().backend()));
        assert_eq!(builder.builds(), 1);
    }

    #[tokio::test]
    async fn test_custom_backend_is_cached() {
        let (builder, registry) = registry();
        let narrator = entry("narrator", LanguageCode::En);

        let first = registry.custom_backend("narrator", &narrator).await.unwrap();
        let second = registry.custom_backend("narrator", &narrator).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.builds(), 1);
        assert_eq!(registry.cached_custom_models().len(), 1);
        // Custom builds never touch the default slot
        assert!(registry.active().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_custom_builds_are_shared() {
        let (builder, registry) = registry();
        let narrator = entry("narrator", LanguageCode::En);

        let (a, b) = tokio::join!(
            registry.custom_backend("narrator", &narrator),
            registry.custom_backend("narrator", &narrator)
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(builder.builds(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_custom_failures_are_shared_not_cached() {
        let (builder, registry) = registry();
        let anchor = entry("anchor", LanguageCode::Zh);
        builder.fail(LanguageCode::Zh);

        let (a, b) = tokio::join!(
            registry.custom_backend("anchor", &anchor),
            registry.custom_backend("anchor", &anchor)
        );
        assert!(a.is_err() && b.is_err());
        assert_eq!(builder.builds(), 1);

        builder.recover(LanguageCode::Zh);
        assert!(registry.custom_backend("anchor", &anchor).await.is_ok());
        assert_eq!(builder.builds(), 2);
    }

    #[tokio::test]
    async fn test_custom_backend_failure_is_not_cached() {
        let (builder, registry) = registry();
        let anchor = entry("anchor", LanguageCode::Zh);
        builder.fail(LanguageCode::Zh);

        assert!(registry.custom_backend("anchor", &anchor).await.is_err());

        builder.recover(LanguageCode::Zh);
        assert!(registry.custom_backend("anchor", &anchor).await.is_ok());
        assert_eq!(builder.builds(), 2);
    }

    #[tokio::test]
    async fn test_override_backend_is_not_cached() {
        let (builder, registry) = registry();

        let a = registry
            .override_backend(LanguageCode::En, Path::new("/c"), Path::new("/w"))
            .await
            .unwrap();
        let b = registry
            .override_backend(LanguageCode::En, Path::new("/c"), Path::new("/w"))
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(builder.builds(), 2);
        assert!(registry.cached_custom_models().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything() {
        let (_builder, registry) = registry();
        registry.swap(LanguageCode::En).await.unwrap();
        registry
            .custom_backend("narrator", &entry("narrator", LanguageCode::En))
            .await
            .unwrap();

        registry.shutdown().await;

        assert!(registry.active().is_none());
        assert!(registry.cached_custom_models().is_empty());
    }
}
