use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MetadataValue – one entry in a spectrum's metadata map
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value mirroring what a JSON header can hold.
///
/// Untagged, so a metadata map serialises to plain JSON and back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
    Null,
}

/// String-keyed metadata attached to every spectrum.
pub type Metadata = BTreeMap<String, MetadataValue>;

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            MetadataValue::Map(map) => write!(f, "{{{} keys}}", map.len()),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetadataValue]> {
        match self {
            MetadataValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_through_json() {
        let mut meta = Metadata::new();
        meta.insert("telescope".into(), "Keck".into());
        meta.insert("exptime".into(), MetadataValue::Float(1200.5));
        meta.insert("nexp".into(), MetadataValue::Integer(3));
        meta.insert(
            "contpoints".into(),
            MetadataValue::List(vec![MetadataValue::List(vec![4000.0.into(), 1.5.into()])]),
        );
        meta.insert("note".into(), MetadataValue::Null);

        let text = serde_json::to_string(&meta).unwrap();
        let back: Metadata = serde_json::from_str(&text).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn integer_is_numeric() {
        assert_eq!(MetadataValue::Integer(4).as_f64(), Some(4.0));
        assert_eq!(MetadataValue::Bool(true).as_f64(), None);
    }
}
