//! Page body normalization
//!
//! Upstream listing endpoints use three response conventions:
//!
//! 1. a bare JSON array of records (`[{...}, {...}]`)
//! 2. an envelope with a `data` array (`{"data": [...], ...}`)
//! 3. an envelope with an `items` array (`{"items": [...], ...}`)
//!
//! They are tried in that order. Any other shape (an object with neither key,
//! a scalar, `null`) is an empty page.

use serde_json::Value;

use crate::Record;

/// Recognized shape of one response body
#[derive(Debug, Clone, PartialEq)]
pub enum PageBody {
    /// Bare array of records
    Array(Vec<Record>),
    /// Records under a `data` key
    Data(Vec<Record>),
    /// Records under an `items` key
    Items(Vec<Record>),
    /// No recognizable record collection
    Empty,
}

impl PageBody {
    /// Classify a response body
    pub fn decode(body: Value) -> Self {
        match body {
            Value::Array(records) => PageBody::Array(records),
            Value::Object(mut map) => {
                if let Some(Value::Array(records)) = map.remove("data") {
                    PageBody::Data(records)
                } else if let Some(Value::Array(records)) = map.remove("items") {
                    PageBody::Items(records)
                } else {
                    PageBody::Empty
                }
            }
            _ => PageBody::Empty,
        }
    }

    /// Records of this page in delivery order
    pub fn into_records(self) -> Vec<Record> {
        match self {
            PageBody::Array(records) | PageBody::Data(records) | PageBody::Items(records) => {
                records
            }
            PageBody::Empty => Vec::new(),
        }
    }
}

/// Normalize a response body straight into its records
pub fn decode_records(body: Value) -> Vec<Record> {
    PageBody::decode(body).into_records()
}
