//! Session cache for analysis results, mirrored best-effort to disk.
//!
//! The in-memory map is authoritative for the current process. Every
//! accepted write rewrites the mirror file so reloads within the same
//! session pick up where they left off; mirror failures are reported
//! through the notice sink and otherwise swallowed — they never fail the
//! primary operation.

use crate::api::AnalysisResult;
use crate::notify::{Notice, NoticeSink, TracingNotices};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Key → last successful [`AnalysisResult`] store.
pub struct AnalysisCache {
    entries: Mutex<HashMap<String, AnalysisResult>>,
    mirror_path: Option<PathBuf>,
    notices: Arc<dyn NoticeSink>,
}

impl AnalysisCache {
    /// Cache without a disk mirror.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            mirror_path: None,
            notices: Arc::new(TracingNotices),
        }
    }

    /// Open a cache backed by a mirror file.
    ///
    /// Missing or corrupt mirror content yields an empty cache, never an
    /// error; the failure is published as a [`Notice::MirrorFailure`].
    pub fn load(path: impl Into<PathBuf>, notices: Arc<dyn NoticeSink>) -> Self {
        let path = path.into();
        let mut entries = HashMap::new();

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                match serde_json::from_str::<Vec<(String, AnalysisResult)>>(&contents) {
                    Ok(pairs) => entries.extend(pairs),
                    Err(e) => notices.publish(Notice::MirrorFailure {
                        path: path.display().to_string(),
                        detail: format!("corrupt mirror discarded: {e}"),
                    }),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => notices.publish(Notice::MirrorFailure {
                path: path.display().to_string(),
                detail: e.to_string(),
            }),
        }

        Self {
            entries: Mutex::new(entries),
            mirror_path: Some(path),
            notices,
        }
    }

    /// Look up a cached result. Never touches the network.
    pub fn get(&self, key: &str) -> Option<AnalysisResult> {
        self.entries.lock().get(key).cloned()
    }

    /// Store a successful result. Failed results are rejected so transient
    /// errors are never replayed as answers.
    pub fn put(&self, key: impl Into<String>, result: AnalysisResult) -> bool {
        if !result.success {
            tracing::debug!("refusing to cache a failed analysis result");
            return false;
        }

        let mut entries = self.entries.lock();
        entries.insert(key.into(), result);
        self.write_mirror(&entries);
        true
    }

    /// Remove one entry. Returns whether it existed.
    pub fn evict(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        let removed = entries.remove(key).is_some();
        if removed {
            self.write_mirror(&entries);
        }
        removed
    }

    /// Remove every entry whose key starts with `prefix`. Returns the count
    /// removed.
    pub fn evict_by_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            self.write_mirror(&entries);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Mirror file location, when mirroring is enabled.
    pub fn mirror_path(&self) -> Option<&std::path::Path> {
        self.mirror_path.as_deref()
    }

    /// Rewrite the mirror with the full entry set. Best-effort: failures
    /// are published and swallowed.
    fn write_mirror(&self, entries: &HashMap<String, AnalysisResult>) {
        let Some(path) = &self.mirror_path else {
            return;
        };

        let pairs: Vec<(&String, &AnalysisResult)> = entries.iter().collect();
        let outcome = serde_json::to_string(&pairs)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::write(path, json).map_err(|e| e.to_string())
            });

        if let Err(detail) = outcome {
            self.notices.publish(Notice::MirrorFailure {
                path: path.display().to_string(),
                detail,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotices;
    use tempfile::TempDir;

    fn success(label: &str) -> AnalysisResult {
        let mut payload = serde_json::Map::new();
        payload.insert("analysis".into(), serde_json::Value::String(label.into()));
        AnalysisResult {
            success: true,
            error: None,
            is_credits_error: false,
            ai_limits: None,
            payload,
        }
    }

    fn failure() -> AnalysisResult {
        AnalysisResult {
            success: false,
            error: Some("boom".into()),
            is_credits_error: false,
            ai_limits: None,
            payload: serde_json::Map::new(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = AnalysisCache::in_memory();
        assert!(cache.put("pattern-recognition", success("double top")));

        let hit = cache.get("pattern-recognition").unwrap();
        assert!(hit.success);
        assert_eq!(hit.payload["analysis"], "double top");
    }

    #[test]
    fn failed_results_are_never_cached() {
        let cache = AnalysisCache::in_memory();
        assert!(!cache.put("weekly-review-1", failure()));
        assert!(cache.get("weekly-review-1").is_none());
    }

    #[test]
    fn evict_by_prefix_removes_exactly_matching_keys() {
        let cache = AnalysisCache::in_memory();
        cache.put("w-1", success("a"));
        cache.put("w-2", success("b"));
        cache.put("x-1", success("c"));

        assert_eq!(cache.evict_by_prefix("w-"), 2);
        assert!(cache.get("w-1").is_none());
        assert!(cache.get("w-2").is_none());
        assert!(cache.get("x-1").is_some());
    }

    #[test]
    fn evict_single_key() {
        let cache = AnalysisCache::in_memory();
        cache.put("k", success("v"));
        assert!(cache.evict("k"));
        assert!(!cache.evict("k"));
        assert!(cache.is_empty());
    }

    #[test]
    fn mirror_survives_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("analysis-cache.json");

        let cache = AnalysisCache::load(&path, Arc::new(MemoryNotices::new()));
        cache.put("pattern-1", success("flag"));
        drop(cache);

        let reloaded = AnalysisCache::load(&path, Arc::new(MemoryNotices::new()));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("pattern-1").unwrap().payload["analysis"], "flag");
    }

    #[test]
    fn corrupt_mirror_yields_empty_cache_and_notice() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("analysis-cache.json");
        std::fs::write(&path, "not json at all").unwrap();

        let notices = Arc::new(MemoryNotices::new());
        let cache = AnalysisCache::load(&path, Arc::clone(&notices) as Arc<dyn NoticeSink>);

        assert!(cache.is_empty());
        let seen = notices.published();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], Notice::MirrorFailure { .. }));
    }

    #[test]
    fn missing_mirror_is_not_a_failure() {
        let tmp = TempDir::new().unwrap();
        let notices = Arc::new(MemoryNotices::new());
        let cache = AnalysisCache::load(
            tmp.path().join("never-written.json"),
            Arc::clone(&notices) as Arc<dyn NoticeSink>,
        );

        assert!(cache.is_empty());
        assert!(notices.is_empty());
    }

    #[test]
    fn eviction_is_mirrored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("analysis-cache.json");

        let cache = AnalysisCache::load(&path, Arc::new(MemoryNotices::new()));
        cache.put("w-1", success("a"));
        cache.put("x-1", success("b"));
        cache.evict_by_prefix("w-");
        drop(cache);

        let reloaded = AnalysisCache::load(&path, Arc::new(MemoryNotices::new()));
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get("x-1").is_some());
    }
}
