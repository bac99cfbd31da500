//! Application-owned lifecycle of the shared HTTP engine.
//!
//! # Design
//! `NetworkContext` replaces a process-wide singleton. It starts empty,
//! `initialize` builds the engine once, and `shutdown_now` tears it down so a
//! later `initialize` can apply new settings. Lifecycle methods take
//! `&mut self` while executors borrow the context shared, so the borrow
//! checker keeps lifecycle changes away from in-flight calls made through
//! that context. Engines handed out via `engine()` are reference counted; a
//! caller that clones one out is responsible for not using it past
//! `shutdown_now`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::UreqEngine;
use crate::engine::HttpEngine;
use crate::settings::Settings;

/// Owner of the engine shared by every `JsonNetworkClient` built on it.
#[derive(Default)]
pub struct NetworkContext {
    engine: Option<Arc<dyn HttpEngine>>,
}

impl NetworkContext {
    /// An uninitialized context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize with default settings.
    pub fn initialize(&mut self) {
        self.initialize_with(&Settings::default());
    }

    /// Build the shared engine from `settings`.
    ///
    /// A no-op when already initialized; call `shutdown_now` first to apply
    /// different settings.
    pub fn initialize_with(&mut self, settings: &Settings) {
        if self.engine.is_some() {
            debug!("network context already initialized, keeping existing engine");
            return;
        }
        info!(
            follow_redirects = settings.follow_redirects,
            follow_protocol_redirects = settings.follow_protocol_redirects,
            cache = ?settings.cache_directory,
            "initializing network context"
        );
        self.engine = Some(Arc::new(UreqEngine::new(settings)));
    }

    /// Install a caller-built engine. Same no-op rule as `initialize_with`.
    pub fn initialize_with_engine(&mut self, engine: Arc<dyn HttpEngine>) {
        if self.engine.is_some() {
            debug!("network context already initialized, ignoring supplied engine");
            return;
        }
        self.engine = Some(engine);
    }

    /// Release the engine's resources and return to the uninitialized state.
    ///
    /// Steps run in order: stop workers, evict pooled connections, close the
    /// cache. Each is best effort; the engine reference is always cleared.
    pub fn shutdown_now(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };
        engine.shutdown_workers();
        engine.evict_connections();
        if let Some(cache) = engine.cache() {
            if let Err(e) = cache.close() {
                debug!(error = %e, "ignoring cache close failure");
            }
        }
        info!("network context shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// The shared engine, if initialized.
    pub fn engine(&self) -> Option<&Arc<dyn HttpEngine>> {
        self.engine.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DiskCache;
    use crate::engine::TransportError;
    use crate::http::{HttpRequest, HttpResponse};

    #[derive(Default)]
    struct RecordingEngine {
        steps: std::sync::Mutex<Vec<&'static str>>,
        cache: Option<DiskCache>,
    }

    impl HttpEngine for RecordingEngine {
        fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Other("unused".into()))
        }

        fn shutdown_workers(&self) {
            self.steps.lock().unwrap().push("workers");
        }

        fn evict_connections(&self) {
            self.steps.lock().unwrap().push("connections");
        }

        fn cache(&self) -> Option<&DiskCache> {
            self.steps.lock().unwrap().push("cache");
            self.cache.as_ref()
        }
    }

    fn cache_dir(context: &NetworkContext) -> Option<std::path::PathBuf> {
        context
            .engine()
            .and_then(|engine| engine.cache())
            .map(|cache| cache.directory().to_path_buf())
    }

    #[test]
    fn second_initialize_is_a_noop() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let mut context = NetworkContext::new();

        context.initialize_with(&Settings::default().with_cache(first.path(), 1024));
        let engine = Arc::clone(context.engine().unwrap());
        context.initialize_with(&Settings::default().with_cache(second.path(), 1024));

        assert!(Arc::ptr_eq(&engine, context.engine().unwrap()));
        assert_eq!(cache_dir(&context), Some(first.path().to_path_buf()));
    }

    #[test]
    fn second_initialize_does_not_add_a_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = NetworkContext::new();
        context.initialize();
        context.initialize_with(&Settings::default().with_cache(dir.path(), 1024));
        assert_eq!(cache_dir(&context), None);
    }

    #[test]
    fn shutdown_allows_reconfiguration() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let mut context = NetworkContext::new();

        context.initialize_with(&Settings::default().with_cache(first.path(), 1024));
        context.shutdown_now();
        assert!(!context.is_initialized());

        context.initialize_with(&Settings::default().with_cache(second.path(), 1024));
        assert_eq!(cache_dir(&context), Some(second.path().to_path_buf()));
    }

    #[test]
    fn shutdown_without_initialize_is_harmless() {
        let mut context = NetworkContext::new();
        context.shutdown_now();
        context.shutdown_now();
        assert!(!context.is_initialized());
    }

    #[test]
    fn shutdown_runs_steps_in_order_and_closes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(RecordingEngine {
            cache: Some(DiskCache::open(dir.path(), 1024)),
            ..Default::default()
        });
        let mut context = NetworkContext::new();
        context.initialize_with_engine(engine.clone());
        context.shutdown_now();

        assert_eq!(
            *engine.steps.lock().unwrap(),
            vec!["workers", "connections", "cache"]
        );
        assert!(engine.cache.as_ref().unwrap().is_closed());
        assert!(!context.is_initialized());
    }

    #[test]
    fn shutdown_without_cache_still_clears_engine() {
        let engine = Arc::new(RecordingEngine::default());
        let mut context = NetworkContext::new();
        context.initialize_with_engine(engine.clone());
        context.shutdown_now();

        assert_eq!(engine.steps.lock().unwrap().len(), 3);
        assert!(!context.is_initialized());
    }

    #[test]
    fn supplied_engine_is_ignored_once_initialized() {
        let mut context = NetworkContext::new();
        context.initialize();
        let original = Arc::clone(context.engine().unwrap());
        context.initialize_with_engine(Arc::new(RecordingEngine::default()));

        assert!(Arc::ptr_eq(&original, context.engine().unwrap()));
    }
}
