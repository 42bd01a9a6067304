// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bound-flag reconciliation.
//!
//! Binding rows are never deleted. When a caller submits a new selection of
//! entities for a node, the stored rows are reconciled against it: rows
//! whose entity appears in the selection get their flag raised, the rest get
//! it lowered. The reconciler is pure and returns only the rows whose flag
//! actually changes, so applying the same selection twice produces an empty
//! change set.

use std::collections::HashSet;

use crate::model::{DataBinding, PreviewBinding};

/// A stored binding row projected to what reconciliation needs.
#[derive(Debug, Clone)]
pub struct StoredBinding<I> {
    /// Row identifier, carried through to the change set.
    pub id: I,
    /// Bound entity's type id.
    pub entity_type_id: String,
    /// Bound entity's data id.
    pub entity_data_id: String,
    /// Current flag value.
    pub bound: bool,
}

impl From<&PreviewBinding> for StoredBinding<i64> {
    fn from(row: &PreviewBinding) -> Self {
        StoredBinding {
            id: row.id.unwrap_or_default(),
            entity_type_id: row.entity_type_id.clone(),
            entity_data_id: row.entity_data_id.clone(),
            bound: row.is_bound,
        }
    }
}

impl From<&DataBinding> for StoredBinding<String> {
    fn from(row: &DataBinding) -> Self {
        StoredBinding {
            id: row.id.clone(),
            entity_type_id: row.entity_type_id.clone(),
            entity_data_id: row.entity_data_id.clone(),
            bound: row.bind_flag,
        }
    }
}

/// Recompute bound flags against a submitted entity selection.
///
/// `selected` holds `(entity_type_id, entity_data_id)` pairs. Returns
/// `(id, new_flag)` for every stored row whose flag must change; rows
/// already in the right state are omitted. Selected entities with no
/// stored row are ignored here, and no row is ever removed.
pub fn reconcile_bound_flags<I: Clone>(
    stored: &[StoredBinding<I>],
    selected: &[(String, String)],
) -> Vec<(I, bool)> {
    let selected: HashSet<(&str, &str)> = selected
        .iter()
        .map(|(type_id, data_id)| (type_id.as_str(), data_id.as_str()))
        .collect();

    let mut changes = Vec::new();
    for row in stored {
        let wanted = selected.contains(&(row.entity_type_id.as_str(), row.entity_data_id.as_str()));
        if wanted != row.bound {
            changes.push((row.id.clone(), wanted));
        }
    }
    changes
}
