//! Event type definitions.

use compact_str::CompactString;
use mintwatch_sdk::objects::ledger::LogsNotification;

/// Which source an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    /// The curated-projects feed.
    Api,
    /// The ledger log subscription.
    Ledger,
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTag::Api => write!(f, "api"),
            SourceTag::Ledger => write!(f, "ledger"),
        }
    }
}

/// A record exactly as a source produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// One item of a feed page, still undecoded.
    Feed(serde_json::Value),
    /// One log notification from the ledger subscription.
    Ledger(LogsNotification),
}

impl RawRecord {
    pub fn source(&self) -> SourceTag {
        match self {
            RawRecord::Feed(_) => SourceTag::Api,
            RawRecord::Ledger(_) => SourceTag::Ledger,
        }
    }
}

/// A raw record that passed the cheap filter and awaits verification.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvent {
    pub source: SourceTag,
    pub record: RawRecord,
}

impl CandidateEvent {
    pub fn new(record: RawRecord) -> Self {
        Self {
            source: record.source(),
            record,
        }
    }
}

/// Stable identifier of a logical event: a feed item id (or slug) or a mint
/// address. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalId(CompactString);

impl CanonicalId {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(CompactString::from(value)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which an event is admitted to the dedup cache.
///
/// Partitioned by source so a feed id and a mint address can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub source: SourceTag,
    pub id: CanonicalId,
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

/// One named value shown in the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayField {
    pub name: String,
    pub value: String,
    /// Rendering hint: may share a row with neighbouring inline fields.
    pub inline: bool,
}

impl DisplayField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }
}

/// A verified event, eligible for notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedEvent {
    pub canonical_id: CanonicalId,
    /// Field names are unique; order is display order.
    pub display_fields: Vec<DisplayField>,
    pub source: SourceTag,
}

impl ConfirmedEvent {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            source: self.source,
            id: self.canonical_id.clone(),
        }
    }

    /// Look up a display field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.display_fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_id_rejects_blank() {
        assert!(CanonicalId::new("").is_none());
        assert!(CanonicalId::new("   ").is_none());
        assert_eq!(CanonicalId::new(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_dedup_key_is_partitioned_by_source() {
        let id = CanonicalId::new("same").unwrap();
        let api = DedupKey {
            source: SourceTag::Api,
            id: id.clone(),
        };
        let ledger = DedupKey {
            source: SourceTag::Ledger,
            id,
        };
        assert_ne!(api, ledger);
        assert_eq!(ledger.to_string(), "ledger:same");
    }
}
