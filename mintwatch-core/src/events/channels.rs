//! Channel factories for handing records from the sources to the coordinator.

use super::types::RawRecord;
use tokio::sync::mpsc;

/// Default buffer size for the record channel.
///
/// Large enough for a full feed page plus a burst of log notifications;
/// a full buffer applies backpressure to the sources.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for raw records. Cloned once per source.
pub type RawRecordSender = mpsc::Sender<RawRecord>;
/// Receiver handle for raw records, owned by the coordinator.
pub type RawRecordReceiver = mpsc::Receiver<RawRecord>;

/// Create a new raw record channel.
pub fn raw_record_channel() -> (RawRecordSender, RawRecordReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
