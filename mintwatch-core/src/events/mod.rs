//! Records and events flowing through the detection pipeline.
//!
//! # Event Flow
//!
//! 1. `PollSource` / `SubscriptionSource` emit [`RawRecord`]s on one channel
//! 2. `Coordinator` filters each record into a [`CandidateEvent`]
//! 3. A verifier turns the candidate into a [`ConfirmedEvent`] (or rejects it)
//! 4. `DedupCache` admits the event's [`DedupKey`] at most once
//! 5. `Notifier` delivers the admitted event
//!
//! Raw records and candidates are transient; only dedup keys outlive a
//! single record.

pub mod channels;
pub mod types;

pub use channels::{DEFAULT_CHANNEL_BUFFER, RawRecordReceiver, RawRecordSender, raw_record_channel};
pub use types::{
    CandidateEvent, CanonicalId, ConfirmedEvent, DedupKey, DisplayField, RawRecord, SourceTag,
};
