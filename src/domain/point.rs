//! Raw report rows and the time-series points built from them

use serde::Serialize;
use std::collections::BTreeMap;

/// Tokens of one tab-delimited report line, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow(Vec<String>);

impl RawRow {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for RawRow {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}

impl From<Vec<&str>> for RawRow {
    fn from(tokens: Vec<&str>) -> Self {
        Self(tokens.into_iter().map(str::to_string).collect())
    }
}

/// The single numeric field carried by every point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointFields {
    pub value: f64,
}

/// One observation ready for the store
///
/// Serializes as `{"time":..,"measurement":..,"fields":{"value":..},"tags":{..}}`.
/// Tags are kept sorted by key, which is also the canonical line protocol order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    /// Epoch seconds, UTC
    pub time: i64,
    pub measurement: String,
    pub fields: PointFields,
    pub tags: BTreeMap<&'static str, String>,
}

impl TimeSeriesPoint {
    #[inline]
    pub fn value(&self) -> f64 {
        self.fields.value
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_access() {
        let row = RawRow::from(vec!["a", "b", ""]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(1), Some("b"));
        assert_eq!(row.get(2), Some(""));
        assert_eq!(row.get(3), None);
        assert!(!row.is_empty());
        assert!(RawRow::default().is_empty());
    }

    #[test]
    fn test_point_serializes_store_shape() {
        let mut tags = BTreeMap::new();
        tags.insert("map_code", "AT".to_string());
        tags.insert("area_code", "10YAT-APG------L".to_string());
        let point = TimeSeriesPoint {
            time: 1_619_827_200,
            measurement: "generation".to_string(),
            fields: PointFields { value: 10.5 },
            tags,
        };

        let json: serde_json::Value = serde_json::to_value(&point).unwrap();
        assert_eq!(json["time"], 1_619_827_200i64);
        assert_eq!(json["measurement"], "generation");
        assert_eq!(json["fields"]["value"], 10.5);
        assert_eq!(json["tags"]["map_code"], "AT");
        assert_eq!(point.tag("area_code"), Some("10YAT-APG------L"));
        assert_eq!(point.value(), 10.5);
    }
}
