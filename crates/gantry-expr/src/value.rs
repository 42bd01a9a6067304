// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Join-key value flattening.
//!
//! Attribute values coming back from entity queries have no fixed shape: a
//! reference column may hold one identifier, a list of identifiers, or a
//! list of arbitrary JSON values. [`ScalarOrList`] names the three cases
//! explicitly so join execution never has to inspect runtime types ad hoc.

use serde_json::Value;

/// A join-key value of one of the three shapes entity queries produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarOrList {
    /// A single identifier.
    Scalar(String),
    /// A homogeneous list of identifiers.
    Strings(Vec<String>),
    /// A list containing non-string members, stringified on flattening.
    Mixed(Vec<Value>),
}

impl ScalarOrList {
    /// Classify a JSON attribute value. `null` has no join keys at all.
    pub fn classify(value: &Value) -> Option<ScalarOrList> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(ScalarOrList::Scalar(s.clone())),
            Value::Array(items) => {
                if items.iter().all(|v| v.is_string()) {
                    Some(ScalarOrList::Strings(
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_owned))
                            .collect(),
                    ))
                } else {
                    Some(ScalarOrList::Mixed(items.clone()))
                }
            }
            other => Some(ScalarOrList::Scalar(stringify(other))),
        }
    }

    /// Flatten into the identifier list used for `in` filters. Empty
    /// strings are dropped.
    pub fn flatten(&self) -> Vec<String> {
        match self {
            ScalarOrList::Scalar(s) => {
                if s.is_empty() {
                    Vec::new()
                } else {
                    vec![s.clone()]
                }
            }
            ScalarOrList::Strings(items) => items.clone(),
            ScalarOrList::Mixed(items) => items
                .iter()
                .map(stringify)
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Flatten an optional attribute value straight into identifiers.
pub fn flatten_value(value: &Value) -> Vec<String> {
    ScalarOrList::classify(value)
        .map(|v| v.flatten())
        .unwrap_or_default()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
