//! Fault fingerprinting.
//!
//! The same failure tends to repeat: a broken shared include fails every
//! page that includes it, on every rebuild. Each message is fingerprinted;
//! the first occurrence is logged in full, later ones as a one-line
//! reference to that first report.

use crate::log;
use crate::utils::hash::fingerprint;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultRecord {
    /// Never seen before; logged in full.
    First { id: String },
    /// Identical to an earlier fault.
    Repeat { id: String, first_uri: String, count: usize },
}

impl FaultRecord {
    #[cfg(test)]
    pub fn id(&self) -> &str {
        match self {
            Self::First { id } | Self::Repeat { id, .. } => id,
        }
    }
}

struct Seen {
    first_uri: String,
    count: usize,
}

/// Lives as long as the orchestrator, across builds.
#[derive(Default)]
pub struct FaultLog {
    seen: FxHashMap<String, Seen>,
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a fault without logging it.
    pub fn record(&mut self, uri: &str, message: &str) -> FaultRecord {
        let id = fingerprint(message.as_bytes());
        match self.seen.get_mut(&id) {
            Some(seen) => {
                seen.count += 1;
                FaultRecord::Repeat {
                    id,
                    first_uri: seen.first_uri.clone(),
                    count: seen.count,
                }
            }
            None => {
                self.seen.insert(
                    id.clone(),
                    Seen {
                        first_uri: uri.to_string(),
                        count: 1,
                    },
                );
                FaultRecord::First { id }
            }
        }
    }

    /// Record and log a fault for `uri`.
    pub fn report(&mut self, uri: &str, message: &str) -> FaultRecord {
        let record = self.record(uri, message);
        match &record {
            FaultRecord::First { id } => {
                log!("error"; "{} [{}]\n{}", uri, id, message);
            }
            FaultRecord::Repeat { id, first_uri, count } => {
                log!("error"; "{} [{}] same as {} (seen {} times)", uri, id, first_uri, count);
            }
        }
        record
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_then_repeat() {
        let mut faults = FaultLog::new();
        let first = faults.record("/a", "render: unknown variable `x`");
        let again = faults.record("/b", "render: unknown variable `x`");

        assert!(matches!(first, FaultRecord::First { .. }));
        assert_eq!(first.id(), again.id());
        assert_eq!(
            again,
            FaultRecord::Repeat {
                id: first.id().to_string(),
                first_uri: "/a".into(),
                count: 2
            }
        );
        assert_eq!(faults.len(), 1);
    }

    #[test]
    fn test_distinct_messages_distinct_ids() {
        let mut faults = FaultLog::new();
        let a = faults.record("/", "one");
        let b = faults.record("/", "two");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), 8);
    }
}
