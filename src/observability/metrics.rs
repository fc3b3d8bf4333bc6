use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Artifact requests served from cache
    pub artifact_cache_hits: AtomicU64,

    /// Artifact builds (compiler invocations)
    pub artifact_builds_total: AtomicU64,
    pub artifact_build_errors: AtomicU64,

    /// Archive requests served from cache
    pub archive_cache_hits: AtomicU64,

    /// Archive builds (serializer invocations)
    pub archive_builds_total: AtomicU64,
    pub archive_build_errors: AtomicU64,

    /// Bundle downloads answered with 304
    pub bundle_not_modified: AtomicU64,

    /// Replays
    pub replays_total: AtomicU64,
    pub replay_errors: AtomicU64,

    /// Rule mutations
    pub rules_created: AtomicU64,
    pub rules_updated: AtomicU64,
    pub rules_deleted: AtomicU64,

    /// Decision log records accepted
    pub decisions_recorded: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    pub fn record_artifact_hit(&self) {
        self.artifact_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_artifact_build(&self, success: bool) {
        self.artifact_builds_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.artifact_build_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_archive_hit(&self) {
        self.archive_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_archive_build(&self, success: bool) {
        self.archive_builds_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.archive_build_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_not_modified(&self) {
        self.bundle_not_modified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replay(&self, success: bool) {
        self.replays_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.replay_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_decisions(&self, count: usize) {
        self.decisions_recorded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP bundlr_artifact_cache_hits_total Artifact requests served from cache
# TYPE bundlr_artifact_cache_hits_total counter
bundlr_artifact_cache_hits_total {}

# HELP bundlr_artifact_builds_total Artifact builds
# TYPE bundlr_artifact_builds_total counter
bundlr_artifact_builds_total {}

# HELP bundlr_artifact_build_errors_total Failed artifact builds
# TYPE bundlr_artifact_build_errors_total counter
bundlr_artifact_build_errors_total {}

# HELP bundlr_archive_cache_hits_total Archive requests served from cache
# TYPE bundlr_archive_cache_hits_total counter
bundlr_archive_cache_hits_total {}

# HELP bundlr_archive_builds_total Archive builds
# TYPE bundlr_archive_builds_total counter
bundlr_archive_builds_total {}

# HELP bundlr_archive_build_errors_total Failed archive builds
# TYPE bundlr_archive_build_errors_total counter
bundlr_archive_build_errors_total {}

# HELP bundlr_bundle_not_modified_total Bundle downloads answered with 304
# TYPE bundlr_bundle_not_modified_total counter
bundlr_bundle_not_modified_total {}

# HELP bundlr_replays_total Decision replays
# TYPE bundlr_replays_total counter
bundlr_replays_total {}

# HELP bundlr_replay_errors_total Failed decision replays
# TYPE bundlr_replay_errors_total counter
bundlr_replay_errors_total {}

# HELP bundlr_rule_mutations_total Rule mutations by operation
# TYPE bundlr_rule_mutations_total counter
bundlr_rule_mutations_total{{op="create"}} {}
bundlr_rule_mutations_total{{op="update"}} {}
bundlr_rule_mutations_total{{op="delete"}} {}

# HELP bundlr_decisions_recorded_total Decision log records accepted
# TYPE bundlr_decisions_recorded_total counter
bundlr_decisions_recorded_total {}
"#,
            self.artifact_cache_hits.load(Ordering::Relaxed),
            self.artifact_builds_total.load(Ordering::Relaxed),
            self.artifact_build_errors.load(Ordering::Relaxed),
            self.archive_cache_hits.load(Ordering::Relaxed),
            self.archive_builds_total.load(Ordering::Relaxed),
            self.archive_build_errors.load(Ordering::Relaxed),
            self.bundle_not_modified.load(Ordering::Relaxed),
            self.replays_total.load(Ordering::Relaxed),
            self.replay_errors.load(Ordering::Relaxed),
            self.rules_created.load(Ordering::Relaxed),
            self.rules_updated.load(Ordering::Relaxed),
            self.rules_deleted.load(Ordering::Relaxed),
            self.decisions_recorded.load(Ordering::Relaxed),
        )
    }
}
