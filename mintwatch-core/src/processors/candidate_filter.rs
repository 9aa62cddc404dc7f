//! Cheap pre-verification filter.
//!
//! Runs before any network round-trip: for ledger records a local substring
//! check over the log lines discards most unrelated traffic, so only
//! plausible mint transactions are fetched in full.

use crate::events::{CandidateEvent, RawRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateFilter {
    /// Pass only records whose log lines contain `marker` and whose
    /// transaction did not fail. Records without log lines never pass.
    LogMarker { marker: String },
    /// Every record is already known to be relevant.
    PassThrough,
}

impl CandidateFilter {
    pub fn log_marker(marker: impl Into<String>) -> Self {
        CandidateFilter::LogMarker {
            marker: marker.into(),
        }
    }

    /// `Some` when the record is worth verifying.
    pub fn check(&self, record: RawRecord) -> Option<CandidateEvent> {
        match self {
            CandidateFilter::PassThrough => Some(CandidateEvent::new(record)),
            CandidateFilter::LogMarker { marker } => {
                let RawRecord::Ledger(notification) = &record else {
                    return None;
                };
                if notification.err.is_some() {
                    return None;
                }
                let marked = notification
                    .logs
                    .iter()
                    .any(|line| line.contains(marker.as_str()));
                marked.then(|| CandidateEvent::new(record))
            }
        }
    }
}
