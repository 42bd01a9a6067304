// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Prefixed identifier generation.
//!
//! Every persisted record gets a globally unique id with a short prefix
//! naming the record kind, so ids are self-describing in logs and foreign
//! keys.

use uuid::Uuid;

fn prefixed(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Id for a process instance (`pi_`).
pub fn instance_id() -> String {
    prefixed("pi")
}

/// Id for an instance node (`in_`).
pub fn instance_node_id() -> String {
    prefixed("in")
}

/// Id for a run workflow (`wf_`).
pub fn workflow_id() -> String {
    prefixed("wf")
}

/// Id for a run node (`wn_`).
pub fn run_node_id() -> String {
    prefixed("wn")
}

/// Id for a run link (`wl_`).
pub fn run_link_id() -> String {
    prefixed("wl")
}

/// Id for an outbound plugin request (`req_`).
pub fn request_id() -> String {
    prefixed("req")
}

/// Id for an entity cache entry (`ce_`).
pub fn cache_entry_id() -> String {
    prefixed("ce")
}

/// Id for a data binding row (`bind_`).
pub fn binding_id() -> String {
    prefixed("bind")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_carry_prefix() {
        assert!(instance_id().starts_with("pi_"));
        assert!(workflow_id().starts_with("wf_"));
        assert!(run_node_id().starts_with("wn_"));
        assert!(run_link_id().starts_with("wl_"));
        assert!(request_id().starts_with("req_"));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(instance_id(), instance_id());
    }
}
