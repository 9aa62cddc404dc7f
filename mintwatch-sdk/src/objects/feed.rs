//! Curated-projects feed objects.
//!
//! The feed endpoint answers either with an envelope (`{"data": [...]}`) or
//! with a bare array. Items are kept as raw JSON on the page so that one
//! malformed item can be dropped without losing the rest of the page.

use serde::{Deserialize, Deserializer, Serialize};

/// One page returned by the feed endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeedPage {
    Envelope { data: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

impl FeedPage {
    /// Consume the page and return its raw items, most recent first.
    pub fn into_items(self) -> Vec<serde_json::Value> {
        match self {
            FeedPage::Envelope { data } => data,
            FeedPage::Bare(items) => items,
        }
    }
}

/// A single curated project as published by the feed.
///
/// Every field is optional; the feed does not guarantee any of them. A field
/// of an unexpected JSON type reads as absent rather than failing the item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
}

impl FeedItem {
    /// The identifier used to recognise this item across polls: `id`,
    /// falling back to `slug`. Blank values count as absent.
    pub fn natural_key(&self) -> Option<&str> {
        non_blank(self.id.as_deref()).or_else(|| non_blank(self.slug.as_deref()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Reads `"abc"` or `123` as an identifier; anything else is `None`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Reads a string; any other JSON type is `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_accepts_envelope_and_bare_array() {
        let envelope: FeedPage =
            serde_json::from_value(json!({"data": [{"id": "a"}], "total": 1})).unwrap();
        assert_eq!(envelope.into_items().len(), 1);

        let bare: FeedPage = serde_json::from_value(json!([{"id": "a"}, {"id": "b"}])).unwrap();
        assert_eq!(bare.into_items().len(), 2);
    }

    #[test]
    fn test_page_rejects_other_shapes() {
        assert!(serde_json::from_value::<FeedPage>(json!({"items": []})).is_err());
        assert!(serde_json::from_value::<FeedPage>(json!("nope")).is_err());
    }

    #[test]
    fn test_numeric_id_is_normalised() {
        let item: FeedItem = serde_json::from_value(json!({"id": 42, "slug": "x"})).unwrap();
        assert_eq!(item.id.as_deref(), Some("42"));
        assert_eq!(item.natural_key(), Some("42"));
    }

    #[test]
    fn test_natural_key_falls_back_to_slug() {
        let item: FeedItem =
            serde_json::from_value(json!({"id": null, "slug": "moon-cat"})).unwrap();
        assert_eq!(item.natural_key(), Some("moon-cat"));

        let blank: FeedItem = serde_json::from_value(json!({"id": "  ", "slug": "s"})).unwrap();
        assert_eq!(blank.natural_key(), Some("s"));

        let empty: FeedItem = serde_json::from_value(json!({"name": "Nameless"})).unwrap();
        assert_eq!(empty.natural_key(), None);
    }

    #[test]
    fn test_odd_display_types_read_as_absent() {
        let item: FeedItem = serde_json::from_value(json!({
            "id": "abc",
            "slug": "moon",
            "name": "Moon",
            "category": {"id": 3, "name": "Memes"}
        }))
        .unwrap();
        assert_eq!(item.natural_key(), Some("abc"));
        assert_eq!(item.name.as_deref(), Some("Moon"));
        assert_eq!(item.category, None);

        let item: FeedItem =
            serde_json::from_value(json!({"id": ["x"], "slug": "fallback", "name": 7})).unwrap();
        assert_eq!(item.natural_key(), Some("fallback"));
        assert_eq!(item.name, None);
    }
}
