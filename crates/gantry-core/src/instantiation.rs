// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Instance materialization.
//!
//! Starting a process turns one deployed definition plus the bound rows of
//! a preview session into a full set of runtime records: the instance, its
//! nodes, the scheduler's run graph, confirmed data bindings, and the
//! entity cache. [`build_instance_plan`] computes all of it as one pure
//! value; the persistence layer writes the plan in a single transaction so
//! a failure leaves nothing behind.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::graph::display_ordinals;
use crate::ids;
use crate::model::{
    BindType, CacheEntry, DataBinding, DefinitionLink, DefinitionNode, DefinitionStatus,
    InstanceNode, NodeType, PreviewBinding, ProcessDefinition, ProcessInstance, RunLink, RunNode,
    RunWorkflow, STATUS_READY,
};

/// Everything that must be written to start one instance.
///
/// Built in memory first, persisted atomically second.
#[derive(Debug, Clone)]
pub struct InstancePlan {
    /// The instance record.
    pub instance: ProcessInstance,
    /// The scheduler workflow record.
    pub workflow: RunWorkflow,
    /// Runtime nodes, one per definition node.
    pub instance_nodes: Vec<InstanceNode>,
    /// Scheduler nodes, one per definition node.
    pub run_nodes: Vec<RunNode>,
    /// Scheduler links, one per definition link.
    pub run_links: Vec<RunLink>,
    /// Confirmed bindings carried over from the preview session.
    pub bindings: Vec<DataBinding>,
    /// Deduplicated entities referenced by the bindings.
    pub cache_entries: Vec<CacheEntry>,
}

/// Build the materialization plan for one instance.
///
/// `preview_rows` are the session's rows as stored; only rows with the
/// bound flag raised are carried over. Nodes marked for dynamic binding
/// receive no bindings here, they inherit at runtime from their source
/// node. Fails if the definition is not deployed, the operator is blank,
/// or a node carries an unknown type.
pub fn build_instance_plan(
    definition: &ProcessDefinition,
    nodes: &[DefinitionNode],
    links: &[DefinitionLink],
    preview_rows: &[PreviewBinding],
    session_id: &str,
    operator: &str,
    now: DateTime<Utc>,
) -> Result<InstancePlan> {
    if operator.trim().is_empty() {
        return Err(EngineError::Validation {
            field: "operator".to_string(),
            message: "must not be blank".to_string(),
        });
    }
    if DefinitionStatus::parse(&definition.status)? != DefinitionStatus::Deployed {
        return Err(EngineError::Conflict {
            message: format!(
                "definition '{}' has status '{}', only deployed definitions can start",
                definition.id, definition.status
            ),
        });
    }

    let bound_rows: Vec<&PreviewBinding> = preview_rows.iter().filter(|r| r.is_bound).collect();

    // Process-level binding seeds the instance's entity fields.
    let process_row = bound_rows
        .iter()
        .find(|r| BindType::parse(&r.bind_type).map(|t| t == BindType::Process).unwrap_or(false));

    let instance_id = ids::instance_id();
    let instance = ProcessInstance {
        id: instance_id.clone(),
        definition_id: definition.id.clone(),
        definition_key: definition.key.clone(),
        definition_name: definition.name.clone(),
        status: STATUS_READY.to_string(),
        entity_data_id: process_row.map(|r| r.entity_data_id.clone()),
        entity_type_id: process_row.map(|r| r.entity_type_id.clone()),
        session_id: Some(session_id.to_string()),
        created_by: operator.to_string(),
        created_at: now,
        updated_by: None,
        updated_at: None,
    };

    let workflow = RunWorkflow {
        id: ids::workflow_id(),
        instance_id: instance_id.clone(),
        name: definition.name.clone(),
        status: STATUS_READY.to_string(),
        created_at: now,
    };

    let ordinals = display_ordinals(nodes)?;

    let mut instance_nodes = Vec::with_capacity(nodes.len());
    let mut run_nodes = Vec::with_capacity(nodes.len());
    // definition node id -> (instance node id, run node id)
    let mut node_map: HashMap<&str, (String, String)> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        let node_type = NodeType::parse(&node.node_type)?;
        let instance_node_id = ids::instance_node_id();
        let run_node_id = ids::run_node_id();

        instance_nodes.push(InstanceNode {
            id: instance_node_id.clone(),
            instance_id: instance_id.clone(),
            definition_node_id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type.clone(),
            status: STATUS_READY.to_string(),
            ordered_no: ordinals.get(&node.id).map(|o| *o as i32).unwrap_or(0),
            risk_check_result: None,
            error_msg: None,
            created_by: operator.to_string(),
            created_at: now,
        });

        // Merge nodes never time out on their own; timeInterval nodes carry
        // their schedule as the job input.
        let (timeout, input) = match node_type {
            NodeType::Merge => (0, None),
            NodeType::TimeInterval => (node.timeout, node.time_config.clone()),
            _ => (node.timeout, None),
        };

        run_nodes.push(RunNode {
            id: run_node_id.clone(),
            workflow_id: workflow.id.clone(),
            instance_node_id: instance_node_id.clone(),
            name: node.name.clone(),
            job_type: node.node_type.clone(),
            status: STATUS_READY.to_string(),
            timeout,
            input,
            created_at: now,
        });

        node_map.insert(node.id.as_str(), (instance_node_id, run_node_id));
    }

    let mut run_links = Vec::with_capacity(links.len());
    for link in links {
        let source = node_map.get(link.source.as_str());
        let target = node_map.get(link.target.as_str());
        let (Some((_, source_run)), Some((_, target_run))) = (source, target) else {
            return Err(EngineError::Validation {
                field: "links".to_string(),
                message: format!("link '{}' references a node outside the definition", link.id),
            });
        };
        run_links.push(RunLink {
            id: ids::run_link_id(),
            workflow_id: workflow.id.clone(),
            definition_link_id: link.id.clone(),
            name: link.name.clone(),
            source: source_run.clone(),
            target: target_run.clone(),
        });
    }

    // Nodes inheriting bindings at runtime are skipped here.
    let dynamic_nodes: HashSet<&str> = nodes
        .iter()
        .filter(|n| n.dynamic_bind)
        .map(|n| n.id.as_str())
        .collect();

    let mut bindings = Vec::new();
    let mut cache_entries = Vec::new();
    let mut seen_entities: HashSet<(String, String)> = HashSet::new();

    for row in &bound_rows {
        let bind_type = BindType::parse(&row.bind_type)?;
        let (definition_node_id, instance_node_id) = match bind_type {
            BindType::Process => (None, None),
            BindType::TaskNode => {
                let Some(def_node_id) = row.definition_node_id.as_deref() else {
                    return Err(EngineError::Validation {
                        field: "definition_node_id".to_string(),
                        message: "task node binding is missing its node".to_string(),
                    });
                };
                if dynamic_nodes.contains(def_node_id) {
                    continue;
                }
                let Some((instance_node, _)) = node_map.get(def_node_id) else {
                    return Err(EngineError::NodeNotFound {
                        node_id: def_node_id.to_string(),
                    });
                };
                (Some(def_node_id.to_string()), Some(instance_node.clone()))
            }
        };

        let entity_id = format!("{}:{}", row.entity_type_id, row.entity_data_id);
        bindings.push(DataBinding {
            id: ids::binding_id(),
            definition_id: definition.id.clone(),
            instance_id: instance_id.clone(),
            definition_node_id,
            instance_node_id,
            entity_id: entity_id.clone(),
            entity_data_id: row.entity_data_id.clone(),
            entity_data_name: row.entity_data_name.clone(),
            entity_type_id: row.entity_type_id.clone(),
            bind_flag: true,
            bind_type: row.bind_type.clone(),
            full_data_id: row.full_data_id.clone(),
            created_by: operator.to_string(),
            created_at: now,
            updated_by: None,
            updated_at: None,
        });

        if seen_entities.insert((row.entity_type_id.clone(), row.entity_data_id.clone())) {
            cache_entries.push(CacheEntry {
                id: ids::cache_entry_id(),
                instance_id: instance_id.clone(),
                entity_id,
                entity_data_id: row.entity_data_id.clone(),
                entity_data_name: row.entity_data_name.clone(),
                entity_type_id: row.entity_type_id.clone(),
                full_data_id: row.full_data_id.clone(),
                created_at: now,
            });
        }
    }

    Ok(InstancePlan {
        instance,
        workflow,
        instance_nodes,
        run_nodes,
        run_links,
        bindings,
        cache_entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(status: &str) -> ProcessDefinition {
        ProcessDefinition {
            id: "pd_1".to_string(),
            key: "deploy_app".to_string(),
            name: "Deploy application".to_string(),
            version: "v3".to_string(),
            status: status.to_string(),
            tags: Some("delivery".to_string()),
            created_by: "admin".to_string(),
            created_at: Utc::now(),
            updated_by: None,
            updated_at: None,
        }
    }

    fn def_node(id: &str, node_type: &str, ordered_no: i32) -> DefinitionNode {
        DefinitionNode {
            id: id.to_string(),
            definition_id: "pd_1".to_string(),
            name: format!("node {}", id),
            description: None,
            status: "deployed".to_string(),
            node_type: node_type.to_string(),
            service_name: Some("wecmdb/confirm".to_string()),
            dynamic_bind: false,
            bind_node_id: None,
            risk_check: false,
            expression: None,
            timeout: 30,
            ordered_no,
            time_config: None,
        }
    }

    fn def_link(id: &str, source: &str, target: &str) -> DefinitionLink {
        DefinitionLink {
            id: id.to_string(),
            definition_id: "pd_1".to_string(),
            source: source.to_string(),
            target: target.to_string(),
            name: None,
        }
    }

    fn preview(
        node_id: Option<&str>,
        bind_type: &str,
        data_id: &str,
        is_bound: bool,
    ) -> PreviewBinding {
        PreviewBinding {
            id: Some(1),
            definition_id: "pd_1".to_string(),
            session_id: "sess_1".to_string(),
            definition_node_id: node_id.map(str::to_string),
            entity_data_id: data_id.to_string(),
            entity_data_name: Some(format!("name of {}", data_id)),
            entity_type_id: "wecmdb:host_resource".to_string(),
            ordered_no: None,
            bind_type: bind_type.to_string(),
            full_data_id: None,
            is_bound,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
            updated_by: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_plan_materializes_every_node_and_link() {
        let nodes = vec![
            def_node("a", "human", 1),
            def_node("b", "merge", 2),
            def_node("c", "automatic", 3),
        ];
        let links = vec![def_link("l1", "a", "b"), def_link("l2", "b", "c")];
        let plan = build_instance_plan(
            &definition("deployed"),
            &nodes,
            &links,
            &[],
            "sess_1",
            "admin",
            Utc::now(),
        )
        .unwrap();

        assert_eq!(plan.instance.status, "ready");
        assert_eq!(plan.instance.definition_key, "deploy_app");
        assert_eq!(plan.instance_nodes.len(), 3);
        assert_eq!(plan.run_nodes.len(), 3);
        assert_eq!(plan.run_links.len(), 2);

        // Run links are rewritten onto run node ids.
        let run_ids: Vec<&str> = plan.run_nodes.iter().map(|n| n.id.as_str()).collect();
        for link in &plan.run_links {
            assert!(run_ids.contains(&link.source.as_str()));
            assert!(run_ids.contains(&link.target.as_str()));
        }
        // Every run node points back at its instance node.
        for (run, inst) in plan.run_nodes.iter().zip(plan.instance_nodes.iter()) {
            assert_eq!(run.instance_node_id, inst.id);
        }
    }

    #[test]
    fn test_merge_nodes_get_zero_timeout() {
        let nodes = vec![def_node("a", "automatic", 1), def_node("m", "merge", 2)];
        let plan = build_instance_plan(
            &definition("deployed"),
            &nodes,
            &[],
            &[],
            "sess_1",
            "admin",
            Utc::now(),
        )
        .unwrap();

        let merge = plan.run_nodes.iter().find(|n| n.job_type == "merge").unwrap();
        assert_eq!(merge.timeout, 0);
        let auto = plan.run_nodes.iter().find(|n| n.job_type == "automatic").unwrap();
        assert_eq!(auto.timeout, 30);
    }

    #[test]
    fn test_time_interval_node_carries_schedule_as_input() {
        let mut node = def_node("t", "timeInterval", 1);
        node.time_config = Some(r#"{"unit":"min","value":5}"#.to_string());
        let plan = build_instance_plan(
            &definition("deployed"),
            &[node],
            &[],
            &[],
            "sess_1",
            "admin",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(
            plan.run_nodes[0].input.as_deref(),
            Some(r#"{"unit":"min","value":5}"#)
        );
    }

    #[test]
    fn test_process_binding_seeds_instance_entity() {
        let nodes = vec![def_node("a", "automatic", 1)];
        let rows = vec![
            preview(None, "process", "app-1", true),
            preview(Some("a"), "taskNode", "host-1", true),
            preview(Some("a"), "taskNode", "host-2", false),
        ];
        let plan = build_instance_plan(
            &definition("deployed"),
            &nodes,
            &[],
            &rows,
            "sess_1",
            "admin",
            Utc::now(),
        )
        .unwrap();

        assert_eq!(plan.instance.entity_data_id.as_deref(), Some("app-1"));
        assert_eq!(
            plan.instance.entity_type_id.as_deref(),
            Some("wecmdb:host_resource")
        );
        // Unbound preview rows are dropped; bound rows carry over with the
        // flag raised.
        assert_eq!(plan.bindings.len(), 2);
        assert!(plan.bindings.iter().all(|b| b.bind_flag));
        let node_binding = plan
            .bindings
            .iter()
            .find(|b| b.bind_type == "taskNode")
            .unwrap();
        assert_eq!(node_binding.entity_data_id, "host-1");
        assert_eq!(
            node_binding.instance_node_id.as_deref(),
            Some(plan.instance_nodes[0].id.as_str())
        );
        let process_binding = plan
            .bindings
            .iter()
            .find(|b| b.bind_type == "process")
            .unwrap();
        assert!(process_binding.instance_node_id.is_none());
    }

    #[test]
    fn test_cache_entries_are_deduplicated() {
        let nodes = vec![def_node("a", "automatic", 1), def_node("b", "automatic", 2)];
        let rows = vec![
            preview(Some("a"), "taskNode", "host-1", true),
            preview(Some("b"), "taskNode", "host-1", true),
            preview(Some("b"), "taskNode", "host-2", true),
        ];
        let plan = build_instance_plan(
            &definition("deployed"),
            &nodes,
            &[],
            &rows,
            "sess_1",
            "admin",
            Utc::now(),
        )
        .unwrap();

        assert_eq!(plan.bindings.len(), 3);
        assert_eq!(plan.cache_entries.len(), 2);
    }

    #[test]
    fn test_dynamic_bind_nodes_get_no_bindings() {
        let mut node = def_node("a", "automatic", 1);
        node.dynamic_bind = true;
        node.bind_node_id = Some("other".to_string());
        let rows = vec![preview(Some("a"), "taskNode", "host-1", true)];
        let plan = build_instance_plan(
            &definition("deployed"),
            &[node],
            &[],
            &rows,
            "sess_1",
            "admin",
            Utc::now(),
        )
        .unwrap();
        assert!(plan.bindings.is_empty());
    }

    #[test]
    fn test_draft_definition_cannot_start() {
        let err = build_instance_plan(
            &definition("draft"),
            &[def_node("a", "automatic", 1)],
            &[],
            &[],
            "sess_1",
            "admin",
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[test]
    fn test_blank_operator_is_rejected() {
        let err = build_instance_plan(
            &definition("deployed"),
            &[def_node("a", "automatic", 1)],
            &[],
            &[],
            "sess_1",
            "  ",
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_dangling_link_fails_the_plan() {
        let err = build_instance_plan(
            &definition("deployed"),
            &[def_node("a", "automatic", 1)],
            &[def_link("l1", "a", "ghost")],
            &[],
            "sess_1",
            "admin",
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
