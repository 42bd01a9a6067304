// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plugin interface resolution.
//!
//! Several versions of a plugin package can be registered at once; only
//! enabled ones are candidates. A service name resolves to the interface of
//! the highest package version, where versions compare numerically
//! component by component ("1.10.0" beats "1.2.0").

use std::cmp::Ordering;

use crate::error::{EngineError, Result};
use crate::model::InterfaceWithVersion;

/// Compare two dotted version labels numerically, component by component.
///
/// Missing components count as zero, so "1.2" equals "1.2.0". A component
/// that does not parse as a number compares as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let left = parse(a);
    let right = parse(b);
    let len = left.len().max(right.len());
    for i in 0..len {
        let x = left.get(i).copied().unwrap_or(0);
        let y = right.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Pick the interface belonging to the highest package version.
///
/// `candidates` must already be filtered to enabled registrations of one
/// service name. Fails with [`EngineError::InterfaceNotFound`] when empty.
pub fn select_latest(
    service_name: &str,
    candidates: Vec<InterfaceWithVersion>,
) -> Result<InterfaceWithVersion> {
    candidates
        .into_iter()
        .max_by(|a, b| compare_versions(&a.version, &b.version))
        .ok_or_else(|| EngineError::InterfaceNotFound {
            service_name: service_name.to_string(),
        })
}
