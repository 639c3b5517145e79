//! Structured notices for cross-cutting client events.
//!
//! The client reports expected business events (credit exhaustion) and
//! best-effort failures (cache mirror writes) through a [`NoticeSink`]
//! instead of logging directly, so embedders can surface them to users and
//! tests can assert on them.

use parking_lot::Mutex;
use std::fmt;

/// A user-facing or diagnostic event published by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The user's AI credit quota is exhausted. Carries the friendly,
    /// presentable message — never raw server output.
    CreditsExhausted { message: String },
    /// A best-effort cache mirror read or write failed. The primary
    /// operation already completed; this is diagnostic only.
    MirrorFailure { path: String, detail: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CreditsExhausted { message } => write!(f, "{message}"),
            Notice::MirrorFailure { path, detail } => {
                write!(f, "cache mirror failure at {path}: {detail}")
            }
        }
    }
}

/// Receiver for notices. Implementations must not block.
pub trait NoticeSink: Send + Sync {
    fn publish(&self, notice: Notice);
}

/// Default sink: forwards notices to `tracing`.
#[derive(Debug, Default)]
pub struct TracingNotices;

impl NoticeSink for TracingNotices {
    fn publish(&self, notice: Notice) {
        match &notice {
            Notice::CreditsExhausted { .. } => tracing::warn!(%notice, "AI credits exhausted"),
            Notice::MirrorFailure { .. } => tracing::warn!(%notice, "analysis cache mirror failed"),
        }
    }
}

/// Sink that records every notice in memory. Intended for tests and
/// embedders that render notices themselves.
#[derive(Debug, Default)]
pub struct MemoryNotices {
    published: Mutex<Vec<Notice>>,
}

impl MemoryNotices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.published.lock())
    }

    pub fn published(&self) -> Vec<Notice> {
        self.published.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.published.lock().is_empty()
    }
}

impl NoticeSink for MemoryNotices {
    fn publish(&self, notice: Notice) {
        self.published.lock().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemoryNotices::new();
        sink.publish(Notice::CreditsExhausted {
            message: "limit reached".into(),
        });
        sink.publish(Notice::MirrorFailure {
            path: "/tmp/cache.json".into(),
            detail: "permission denied".into(),
        });

        let seen = sink.published();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], Notice::CreditsExhausted { .. }));
        assert!(matches!(seen[1], Notice::MirrorFailure { .. }));
    }

    #[test]
    fn display_is_presentable() {
        let notice = Notice::CreditsExhausted {
            message: "You have reached your weekly AI analysis limit.".into(),
        };
        assert_eq!(
            notice.to_string(),
            "You have reached your weekly AI analysis limit."
        );
    }
}
