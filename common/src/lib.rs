//! A library for syncing election data from a reporting API into a record store.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod auth;
pub mod config;
pub mod driver;
pub mod entity;
pub mod error;
pub mod reconcile;
pub mod relation;
pub mod source;
pub mod store;

pub use error::{SyncError, SyncResult};

use std::fmt;

pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Page size requested from paginated source endpoints.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Row limit requested from non-paginated source endpoints.
pub const NON_PAGINATED_LIMIT: u32 = 1000;

/// Upper bound on source pages fetched in one run.
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Page size used when listing a whole store collection.
pub const STORE_LIST_PAGE_SIZE: u32 = 500;

/// Timeout applied to every HTTP request, source and store alike.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The outcome of reconciling one source item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Verdict {
    Created,
    Updated,
    Skipped,
    Failed,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Verdict::Created => "created",
            Verdict::Updated => "updated",
            Verdict::Skipped => "skipped",
            Verdict::Failed => "failed",
        };
        f.write_str(tag)
    }
}

/// Counters for a single entity run.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl SyncStats {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Created => self.created += 1,
            Verdict::Updated => self.updated += 1,
            Verdict::Skipped => self.skipped += 1,
            Verdict::Failed => self.failed += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.created + self.updated + self.skipped + self.failed
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Created {}, Updated {}, Skipped {}, Failed {} ({} total)",
            self.created,
            self.updated,
            self.skipped,
            self.failed,
            self.total()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record_each_verdict() {
        let mut stats = SyncStats::default();
        for verdict in [
            Verdict::Created,
            Verdict::Updated,
            Verdict::Updated,
            Verdict::Skipped,
            Verdict::Failed,
        ] {
            stats.record(verdict);
        }
        assert_eq!(
            stats,
            SyncStats {
                created: 1,
                updated: 2,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn test_stats_summary_line() {
        let stats = SyncStats {
            created: 3,
            updated: 0,
            skipped: 7,
            failed: 1,
        };
        assert_eq!(
            stats.to_string(),
            "Created 3, Updated 0, Skipped 7, Failed 1 (11 total)"
        );
    }
}
