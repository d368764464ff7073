//! Store documents and change-feed events
//!
//! A document is an id plus a JSON object of fields. The change feed reports
//! per-document `added`, `modified` and `removed` notifications, grouped into
//! one batch per remote change.

use crate::numeric::Amount;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map of a document
pub type Fields = Map<String, Value>;

/// Build a field map from a JSON value. Non-object values yield an empty map.
pub fn fields_from(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// A document as returned by a point query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Raw field access
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Kind of change reported by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single document change within a feed batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub id: String,
    pub kind: ChangeKind,
    pub data: Fields,
}

impl DocumentChange {
    pub fn added(doc: Document) -> Self {
        Self {
            id: doc.id,
            kind: ChangeKind::Added,
            data: doc.data,
        }
    }

    pub fn modified(doc: Document) -> Self {
        Self {
            id: doc.id,
            kind: ChangeKind::Modified,
            data: doc.data,
        }
    }

    /// A removal carries the last known data of the document
    pub fn removed(doc: Document) -> Self {
        Self {
            id: doc.id,
            kind: ChangeKind::Removed,
            data: doc.data,
        }
    }

    /// Numeric field of the changed document
    pub fn amount(&self, name: &str) -> Option<Amount> {
        self.data.get(name).and_then(Amount::from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_from_non_object() {
        assert!(fields_from(json!([1, 2])).is_empty());
        assert_eq!(fields_from(json!({"balance": 5})).len(), 1);
    }

    #[test]
    fn test_document_accessors() {
        let doc = Document::new("t1", fields_from(json!({"name": "", "score": 7})));
        assert_eq!(doc.field("score"), Some(&json!(7)));
        assert!(doc.field("missing").is_none());

        let change = DocumentChange::added(doc);
        assert_eq!(change.amount("score"), Some(Amount::from(7)));
        assert!(change.amount("name").is_none());
    }

    #[test]
    fn test_change_kind_serialization() {
        let change = DocumentChange::modified(Document::new("A", Fields::new()));
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["kind"], "modified");
    }
}
