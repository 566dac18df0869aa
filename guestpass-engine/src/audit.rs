//! Logging-mode bookkeeping: the denial log and the sinks it flushes into.
//!
//! In logging mode every denial is recorded as an `(origin, capability)` pair.
//! At shutdown the log is flushed once, grouped by origin, in a form that can
//! be pasted into a policy as grants.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::capability::Capability;

/// Every capability one origin was denied, ready to be granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyGrant {
    pub origin: String,
    /// Sorted by rendered form.
    pub capabilities: Vec<Capability>,
}

impl fmt::Display for PolicyGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "grant origin {:?} {{", self.origin)?;
        for capability in &self.capabilities {
            writeln!(f, "  capability {capability};")?;
        }
        writeln!(f, "}}")
    }
}

/// Destination for flushed policy grants.
pub trait AuditSink: Send + Sync {
    /// Called once per origin, origins in sorted order.
    fn emit(&self, grant: &PolicyGrant);
}

/// Emits each grant as a `tracing` event on the `guestpass::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, grant: &PolicyGrant) {
        tracing::info!(
            target: "guestpass::audit",
            origin = %grant.origin,
            capabilities = grant.capabilities.len(),
            "{grant}"
        );
    }
}

/// Writes rendered grants to any writer, such as stderr or a file.
pub struct WriterAuditSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterAuditSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterAuditSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> AuditSink for WriterAuditSink<W> {
    fn emit(&self, grant: &PolicyGrant) {
        let mut writer = self.writer.lock();
        if let Err(e) = write!(writer, "{grant}").and_then(|()| writer.flush()) {
            tracing::error!(origin = %grant.origin, error = %e, "failed to write policy grant");
        }
    }
}

/// Keeps emitted grants in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    grants: Arc<Mutex<Vec<PolicyGrant>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grants(&self) -> Vec<PolicyGrant> {
        self.grants.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, grant: &PolicyGrant) {
        self.grants.lock().push(grant.clone());
    }
}

/// Denied capabilities keyed by origin.
///
/// Safe for concurrent recording from many threads. Flushing takes the
/// entries out under the lock and emits them after releasing it, so
/// recording never waits on a sink.
#[derive(Debug, Default)]
pub struct DenialLog {
    entries: Mutex<HashMap<String, HashSet<Capability>>>,
    flushed: AtomicBool,
}

impl DenialLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a denial. Returns `true` if the pair was not already logged.
    pub fn record(&self, origin: impl Into<String>, capability: Capability) -> bool {
        self.entries
            .lock()
            .entry(origin.into())
            .or_default()
            .insert(capability)
    }

    /// Current contents, grouped and sorted, without flushing.
    pub fn grants(&self) -> Vec<PolicyGrant> {
        let entries = self.entries.lock().clone();
        to_grants(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::Acquire)
    }

    /// Emit every recorded grant to `sink`. Only the first call emits
    /// anything; later calls return `false`.
    pub fn flush(&self, sink: &dyn AuditSink) -> bool {
        if self.flushed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let entries = std::mem::take(&mut *self.entries.lock());
        let grants = to_grants(entries);
        for grant in &grants {
            sink.emit(grant);
        }
        tracing::info!(origins = grants.len(), "flushed denial log");
        true
    }
}

fn to_grants(entries: HashMap<String, HashSet<Capability>>) -> Vec<PolicyGrant> {
    let mut grants: Vec<PolicyGrant> = entries
        .into_iter()
        .map(|(origin, capabilities)| {
            let mut capabilities: Vec<Capability> = capabilities.into_iter().collect();
            capabilities.sort_by_cached_key(|c| c.to_string());
            PolicyGrant {
                origin,
                capabilities,
            }
        })
        .collect();
    grants.sort_by(|a, b| a.origin.cmp(&b.origin));
    grants
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_record_deduplicates() {
        let log = DenialLog::new();
        assert!(log.record("file:/app", Capability::named("runtime", "setIO")));
        assert!(!log.record("file:/app", Capability::named("runtime", "setIO")));
        assert!(log.record("file:/app", Capability::guest(Capability::named("runtime", "setIO"))));
        assert_eq!(log.grants()[0].capabilities.len(), 2);
    }

    #[test]
    fn test_grants_are_grouped_and_sorted() {
        let log = DenialLog::new();
        log.record("file:/zeta", Capability::named("runtime", "setIO"));
        log.record("file:/alpha", Capability::named("runtime", "setIO"));
        log.record("file:/alpha", Capability::named("logging", "control"));

        let grants = log.grants();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].origin, "file:/alpha");
        assert_eq!(
            grants[0].capabilities,
            vec![
                Capability::named("logging", "control"),
                Capability::named("runtime", "setIO"),
            ]
        );
        assert_eq!(grants[1].origin, "file:/zeta");
    }

    #[test]
    fn test_similar_capabilities_order_is_stable() {
        let expected = vec![
            Capability::named("file", "t"),
            Capability::scoped("file", "t", ""),
        ];
        for _ in 0..50 {
            let log = DenialLog::new();
            log.record("file:/app", Capability::scoped("file", "t", ""));
            log.record("file:/app", Capability::named("file", "t"));
            assert_eq!(log.grants()[0].capabilities, expected);
        }
    }

    #[test]
    fn test_render() {
        let grant = PolicyGrant {
            origin: "file:/opt/app".to_string(),
            capabilities: vec![Capability::scoped("file", "target/foo", "read")],
        };
        assert_eq!(
            grant.to_string(),
            "grant origin \"file:/opt/app\" {\n  capability (\"file\" \"target/foo\" \"read\");\n}\n"
        );
    }

    #[test]
    fn test_flush_only_once() {
        let log = DenialLog::new();
        log.record("file:/app", Capability::named("runtime", "setIO"));
        let sink = MemoryAuditSink::new();

        assert!(log.flush(&sink));
        assert!(log.is_flushed());
        assert!(!log.flush(&sink));
        assert_eq!(sink.grants().len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_writer_sink() {
        let sink = WriterAuditSink::new(Vec::new());
        sink.emit(&PolicyGrant {
            origin: "tenant:acme".to_string(),
            capabilities: vec![Capability::named("runtime", "setIO")],
        });
        let written = String::from_utf8(sink.into_inner()).expect("utf-8 output");
        assert!(written.starts_with("grant origin \"tenant:acme\" {"));
        assert!(written.contains("capability (\"runtime\" \"setIO\");"));
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let log = Arc::new(DenialLog::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..50 {
                        log.record(
                            format!("origin-{}", t % 2),
                            Capability::named("runtime", format!("cap-{t}-{i}")),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("recording thread panicked");
        }

        let total: usize = log.grants().iter().map(|g| g.capabilities.len()).sum();
        assert_eq!(total, 400);
        assert_eq!(log.grants().len(), 2);
    }
}
