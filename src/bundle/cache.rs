use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::Revision;
use crate::observability::MetricsRegistry;
use crate::policy::{Artifact, CompileError, PolicyCompiler, PolicySources};

/// Errors surfaced by the bundle cache. The cached state is unchanged
/// whenever one of these is returned.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("failed to build bundle for revision {revision}: {source}")]
    Build {
        revision: Revision,
        #[source]
        source: CompileError,
    },

    #[error("failed to serialize bundle for revision {revision}: {source}")]
    Serialize {
        revision: Revision,
        #[source]
        source: CompileError,
    },
}

#[derive(Debug, Clone)]
struct CachedArchive {
    revision: Revision,
    bytes: Bytes,
}

#[derive(Debug, Default)]
struct CacheState {
    artifact: Option<Arc<Artifact>>,
    archive: Option<CachedArchive>,
}

/// Single-version cache of the compiled artifact and its archive.
///
/// Every lookup and build runs under one mutex, held across the compiler
/// call. Two callers racing on the same new revision therefore compile once:
/// the second one finds the cache already updated. Slow builds block other
/// callers of the same cache.
pub struct BundleCache {
    compiler: Arc<dyn PolicyCompiler>,
    sources: Arc<PolicySources>,
    state: Mutex<CacheState>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl BundleCache {
    pub fn new(compiler: Arc<dyn PolicyCompiler>, sources: Arc<PolicySources>) -> Self {
        BundleCache {
            compiler,
            sources,
            state: Mutex::new(CacheState::default()),
            metrics: None,
        }
    }

    /// Record hits and builds in the given registry.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// A fresh, empty cache sharing this cache's compiler and static sources.
    ///
    /// Nothing built in the detached cache is visible here, and vice versa.
    pub fn detached(&self) -> Self {
        BundleCache::new(self.compiler.clone(), self.sources.clone())
    }

    /// Return the artifact for `revision`, compiling `data` if the cached
    /// artifact was built from a different revision.
    pub fn get_artifact(
        &self,
        data: &[u8],
        revision: &Revision,
    ) -> Result<Arc<Artifact>, BundleError> {
        let mut state = self.state.lock();
        self.ensure_artifact(&mut state, data, revision)
    }

    /// Return the archive for `revision`, building the artifact and/or the
    /// archive as needed. Both are tagged with the same revision.
    pub fn get_archive(&self, data: &[u8], revision: &Revision) -> Result<Bytes, BundleError> {
        let mut state = self.state.lock();
        let artifact = self.ensure_artifact(&mut state, data, revision)?;

        if let Some(archive) = state.archive.as_ref().filter(|a| &a.revision == revision) {
            debug!(revision = %revision, "Archive cache hit");
            self.with_registry(|m| m.record_archive_hit());
            return Ok(archive.bytes.clone());
        }

        let bytes = match self.compiler.serialize(&artifact) {
            Ok(bytes) => Bytes::from(bytes),
            Err(source) => {
                warn!(revision = %revision, error = %source, "Archive build failed");
                self.with_registry(|m| m.record_archive_build(false));
                return Err(BundleError::Serialize {
                    revision: revision.clone(),
                    source,
                });
            }
        };

        self.with_registry(|m| m.record_archive_build(true));
        debug!(revision = %revision, size = bytes.len(), "Archive built");

        state.archive = Some(CachedArchive {
            revision: revision.clone(),
            bytes: bytes.clone(),
        });

        Ok(bytes)
    }

    /// Revision of the currently cached artifact, if any.
    pub fn current_revision(&self) -> Option<Revision> {
        self.state
            .lock()
            .artifact
            .as_ref()
            .map(|a| a.revision.clone())
    }

    fn ensure_artifact(
        &self,
        state: &mut CacheState,
        data: &[u8],
        revision: &Revision,
    ) -> Result<Arc<Artifact>, BundleError> {
        if let Some(artifact) = state.artifact.as_ref().filter(|a| &a.revision == revision) {
            debug!(revision = %revision, "Artifact cache hit");
            self.with_registry(|m| m.record_artifact_hit());
            return Ok(artifact.clone());
        }

        let start = Instant::now();
        let mut artifact = match self.compiler.compile(&self.sources, data, revision) {
            Ok(artifact) => artifact,
            Err(source) => {
                warn!(revision = %revision, error = %source, "Artifact build failed");
                self.with_registry(|m| m.record_artifact_build(false));
                return Err(BundleError::Build {
                    revision: revision.clone(),
                    source,
                });
            }
        };

        // The cache key is the caller's revision, whatever the compiler tagged.
        artifact.revision = revision.clone();
        let artifact = Arc::new(artifact);

        self.with_registry(|m| m.record_artifact_build(true));
        info!(
            revision = %revision,
            previous = ?state.artifact.as_ref().map(|a| a.revision.as_str()),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Artifact built"
        );

        state.artifact = Some(artifact.clone());
        Ok(artifact)
    }

    fn with_registry(&self, f: impl FnOnce(&MetricsRegistry)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

impl std::fmt::Debug for BundleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // try_lock: formatting must not block behind an in-flight build
        let revision = self
            .state
            .try_lock()
            .and_then(|s| s.artifact.as_ref().map(|a| a.revision.clone()));

        f.debug_struct("BundleCache")
            .field("modules", &self.sources.len())
            .field("revision", &revision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::tracing::init_test_tracing;
    use crate::policy::RuleMatchCompiler;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// Wraps the built-in compiler, counting calls and optionally failing.
    #[derive(Default)]
    struct CountingCompiler {
        inner: RuleMatchCompiler,
        compiles: AtomicUsize,
        serializes: AtomicUsize,
        fail_compile: AtomicBool,
        fail_serialize: AtomicBool,
        delay: Option<Duration>,
    }

    impl PolicyCompiler for CountingCompiler {
        fn compile(
            &self,
            sources: &PolicySources,
            data: &[u8],
            revision: &Revision,
        ) -> Result<Artifact, CompileError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            if self.fail_compile.load(Ordering::SeqCst) {
                return Err(CompileError::Other("compiler unavailable".to_string()));
            }
            self.inner.compile(sources, data, revision)
        }

        fn serialize(&self, artifact: &Artifact) -> Result<Vec<u8>, CompileError> {
            self.serializes.fetch_add(1, Ordering::SeqCst);
            if self.fail_serialize.load(Ordering::SeqCst) {
                return Err(CompileError::Other("serializer unavailable".to_string()));
            }
            self.inner.serialize(artifact)
        }
    }

    fn setup(compiler: CountingCompiler) -> (Arc<CountingCompiler>, BundleCache) {
        init_test_tracing();
        let compiler = Arc::new(compiler);
        let cache = BundleCache::new(compiler.clone(), Arc::new(PolicySources::embedded()));
        (compiler, cache)
    }

    fn data(n: usize) -> (Vec<u8>, Revision) {
        let data = format!(
            r#"{{"rules":[{{"id":"00000000-0000-0000-0000-00000000000{n}","country":"ANY","city":"ANY","building":"ANY","role":"guest","device_type":"ANY","action":"deny"}}]}}"#
        )
        .into_bytes();
        let revision = Revision::of(&data);
        (data, revision)
    }

    #[test]
    fn test_cache_hit_does_not_rebuild() {
        let (compiler, cache) = setup(CountingCompiler::default());
        let (data, rev) = data(1);

        let first = cache.get_artifact(&data, &rev).unwrap();
        let second = cache.get_artifact(&data, &rev).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiler.compiles.load(Ordering::SeqCst), 1);
        assert_eq!(cache.current_revision(), Some(rev));
    }

    #[test]
    fn test_new_revision_supersedes() {
        let (compiler, cache) = setup(CountingCompiler::default());
        let (data1, rev1) = data(1);
        let (data2, rev2) = data(2);

        cache.get_artifact(&data1, &rev1).unwrap();
        let artifact = cache.get_artifact(&data2, &rev2).unwrap();
        assert_eq!(artifact.revision, rev2);

        // Only one version is held, so going back rebuilds.
        cache.get_artifact(&data1, &rev1).unwrap();
        assert_eq!(compiler.compiles.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failed_build_keeps_previous_artifact() {
        let (compiler, cache) = setup(CountingCompiler::default());
        let (data1, rev1) = data(1);
        let (data2, rev2) = data(2);

        cache.get_artifact(&data1, &rev1).unwrap();

        compiler.fail_compile.store(true, Ordering::SeqCst);
        let err = cache.get_artifact(&data2, &rev2).unwrap_err();
        assert!(matches!(err, BundleError::Build { ref revision, .. } if *revision == rev2));
        assert_eq!(cache.current_revision(), Some(rev1.clone()));

        // The previous artifact is still served without a rebuild.
        compiler.fail_compile.store(false, Ordering::SeqCst);
        cache.get_artifact(&data1, &rev1).unwrap();
        assert_eq!(compiler.compiles.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_archive_after_artifact_does_not_recompile() {
        let (compiler, cache) = setup(CountingCompiler::default());
        let (data, rev) = data(1);

        cache.get_artifact(&data, &rev).unwrap();
        let first = cache.get_archive(&data, &rev).unwrap();
        let second = cache.get_archive(&data, &rev).unwrap();

        assert_eq!(first, second);
        assert_eq!(compiler.compiles.load(Ordering::SeqCst), 1);
        assert_eq!(compiler.serializes.load(Ordering::SeqCst), 1);

        let value: serde_json::Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(value["manifest"]["revision"], rev.as_str());
    }

    #[test]
    fn test_archive_follows_revision() {
        let (compiler, cache) = setup(CountingCompiler::default());
        let (data1, rev1) = data(1);
        let (data2, rev2) = data(2);

        let archive1 = cache.get_archive(&data1, &rev1).unwrap();
        let archive2 = cache.get_archive(&data2, &rev2).unwrap();

        assert_ne!(archive1, archive2);
        let value: serde_json::Value = serde_json::from_slice(&archive2).unwrap();
        assert_eq!(value["manifest"]["revision"], rev2.as_str());
        assert_eq!(compiler.serializes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_archive_keeps_previous_archive() {
        let (compiler, cache) = setup(CountingCompiler::default());
        let (data1, rev1) = data(1);
        let (data2, rev2) = data(2);

        let archive1 = cache.get_archive(&data1, &rev1).unwrap();

        compiler.fail_serialize.store(true, Ordering::SeqCst);
        let err = cache.get_archive(&data2, &rev2).unwrap_err();
        assert!(matches!(err, BundleError::Serialize { .. }));

        // The artifact for rev2 was built; the archive for rev1 is untouched.
        compiler.fail_serialize.store(false, Ordering::SeqCst);
        assert_eq!(cache.current_revision(), Some(rev2));
        let state = cache.state.lock();
        let cached = state.archive.as_ref().unwrap();
        assert_eq!(cached.revision, rev1);
        assert_eq!(cached.bytes, archive1);
    }

    #[test]
    fn test_concurrent_requests_compile_once() {
        let (compiler, cache) = setup(CountingCompiler {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let cache = Arc::new(cache);
        let (data, rev) = data(1);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                let data = data.clone();
                let rev = rev.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_archive(&data, &rev).unwrap()
                })
            })
            .collect();

        let archives: Vec<Bytes> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(archives.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(compiler.compiles.load(Ordering::SeqCst), 1);
        assert_eq!(compiler.serializes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detached_cache_is_isolated() {
        let (compiler, cache) = setup(CountingCompiler::default());
        let (data1, rev1) = data(1);
        let (data2, rev2) = data(2);

        cache.get_artifact(&data1, &rev1).unwrap();

        let scratch = cache.detached();
        assert_eq!(scratch.current_revision(), None);
        scratch.get_artifact(&data2, &rev2).unwrap();

        assert_eq!(cache.current_revision(), Some(rev1));
        assert_eq!(scratch.current_revision(), Some(rev2));
        assert_eq!(compiler.compiles.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_metrics_hooks() {
        let (_compiler, cache) = setup(CountingCompiler::default());
        let metrics = Arc::new(MetricsRegistry::new());
        let cache = cache.with_metrics(metrics.clone());
        let (data, rev) = data(1);

        cache.get_archive(&data, &rev).unwrap();
        cache.get_archive(&data, &rev).unwrap();

        assert_eq!(metrics.artifact_builds_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.artifact_cache_hits.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.archive_builds_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.archive_cache_hits.load(Ordering::Relaxed), 1);
    }
}
