// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end engine tests over the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gantry_core::instantiation::InstancePlan;
use gantry_core::model::{
    CacheEntry, DataBinding, DefinitionLink, DefinitionNode, InstanceNode, InstanceRunGraph,
    InterfaceParameter, InterfaceWithVersion, NodeRequest, NodeRequestParam, PluginConfig,
    PreviewBinding, ProcessDefinition, ProcessInstance, RunNode,
};
use gantry_core::{EngineError, MemoryStore, PluginClient, ProcessEngine, Result, Store};

fn engine_with_store() -> (ProcessEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let client = PluginClient::new("gateway.test:19110", false);
    (ProcessEngine::new(store.clone(), client), store)
}

fn definition(id: &str, status: &str) -> ProcessDefinition {
    ProcessDefinition {
        id: id.to_string(),
        key: "deploy_app".to_string(),
        name: "Deploy application".to_string(),
        version: "v5".to_string(),
        status: status.to_string(),
        tags: Some("delivery".to_string()),
        created_by: "admin".to_string(),
        created_at: Utc::now(),
        updated_by: None,
        updated_at: None,
    }
}

fn node(id: &str, definition_id: &str, node_type: &str, ordered_no: i32) -> DefinitionNode {
    DefinitionNode {
        id: id.to_string(),
        definition_id: definition_id.to_string(),
        name: format!("node {}", id),
        description: None,
        status: "deployed".to_string(),
        node_type: node_type.to_string(),
        service_name: Some("wecmdb/confirm".to_string()),
        dynamic_bind: false,
        bind_node_id: None,
        risk_check: false,
        expression: Some("wecmdb:host_resource{state eq 'created'}".to_string()),
        timeout: 30,
        ordered_no,
        time_config: None,
    }
}

fn link(id: &str, definition_id: &str, source: &str, target: &str) -> DefinitionLink {
    DefinitionLink {
        id: id.to_string(),
        definition_id: definition_id.to_string(),
        source: source.to_string(),
        target: target.to_string(),
        name: None,
    }
}

fn preview_row(
    definition_id: &str,
    session_id: &str,
    node_id: Option<&str>,
    bind_type: &str,
    data_id: &str,
) -> PreviewBinding {
    PreviewBinding {
        id: None,
        definition_id: definition_id.to_string(),
        session_id: session_id.to_string(),
        definition_node_id: node_id.map(str::to_string),
        entity_data_id: data_id.to_string(),
        entity_data_name: None,
        entity_type_id: "wecmdb:host_resource".to_string(),
        ordered_no: None,
        bind_type: bind_type.to_string(),
        full_data_id: None,
        is_bound: true,
        created_by: "admin".to_string(),
        created_at: Utc::now(),
        updated_by: None,
        updated_at: None,
    }
}

async fn seed_three_node_definition(store: &dyn Store, definition_id: &str) {
    store
        .insert_definition(
            &definition(definition_id, "deployed"),
            &[
                node("dn_a", definition_id, "human", 1),
                node("dn_m", definition_id, "merge", 2),
                node("dn_b", definition_id, "automatic", 3),
            ],
            &[
                link("dl_1", definition_id, "dn_a", "dn_m"),
                link("dl_2", definition_id, "dn_m", "dn_b"),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn outline_has_dense_order_and_adjacency() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;

    let outline = engine.get_definition_outline("pd_1").await.unwrap();
    assert_eq!(outline.definition_key, "deploy_app");

    let human = outline.flow_nodes.iter().find(|n| n.node_id == "dn_a").unwrap();
    let merge = outline.flow_nodes.iter().find(|n| n.node_id == "dn_m").unwrap();
    let auto = outline.flow_nodes.iter().find(|n| n.node_id == "dn_b").unwrap();

    // Dense 1-based ordinals skip the merge node without leaving a gap.
    assert_eq!(human.ordered_no, Some(1));
    assert_eq!(merge.ordered_no, None);
    assert_eq!(auto.ordered_no, Some(2));

    assert_eq!(merge.previous_node_ids, vec!["dn_a"]);
    assert_eq!(merge.succeeding_node_ids, vec!["dn_b"]);
    assert_eq!(auto.previous_node_ids, vec!["dn_m"]);
}

#[tokio::test]
async fn missing_definition_is_a_typed_error() {
    let (engine, _) = engine_with_store();
    let err = engine.get_definition_outline("pd_ghost").await.unwrap_err();
    assert_eq!(err.error_code(), "DEFINITION_NOT_FOUND");
}

#[tokio::test]
async fn create_instance_materializes_full_graph() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[
            preview_row("pd_1", "sess_1", None, "process", "app-1"),
            preview_row("pd_1", "sess_1", Some("dn_a"), "taskNode", "host-1"),
            preview_row("pd_1", "sess_1", Some("dn_b"), "taskNode", "host-1"),
        ])
        .await
        .unwrap();

    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();

    assert_eq!(detail.summary.status, "NotStarted");
    assert_eq!(detail.summary.entity_data_id.as_deref(), Some("app-1"));
    assert_eq!(detail.nodes.len(), 3);

    // The scheduler view exists alongside the business view.
    let run_graph = engine.get_run_graph(&detail.summary.id).await.unwrap();
    assert_eq!(run_graph.nodes.len(), 3);
    assert_eq!(run_graph.links.len(), 2);
    let merge_run = run_graph.nodes.iter().find(|n| n.job_type == "merge").unwrap();
    assert_eq!(merge_run.timeout, 0);

    // Bindings carried over from the session, all raised.
    let bindings = engine
        .get_instance_bindings(&detail.summary.id, None)
        .await
        .unwrap();
    assert_eq!(bindings.len(), 3);
    assert!(bindings.iter().all(|b| b.bound));

    // One cache entry per distinct entity, not per binding.
    assert_eq!(
        store.list_cache_entries(&detail.summary.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn create_instance_requires_deployed_definition() {
    let (engine, store) = engine_with_store();
    store
        .insert_definition(
            &definition("pd_draft", "draft"),
            &[node("dn_x", "pd_draft", "automatic", 1)],
            &[],
        )
        .await
        .unwrap();

    let err = engine
        .create_instance("pd_draft", "sess_1", "admin")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONFLICT");

    // Nothing was materialized.
    assert!(engine.list_instances(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn node_binding_update_is_idempotent_and_never_deletes() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[
            preview_row("pd_1", "sess_1", Some("dn_a"), "taskNode", "host-1"),
            preview_row("pd_1", "sess_1", Some("dn_a"), "taskNode", "host-2"),
        ])
        .await
        .unwrap();

    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();
    let instance_id = detail.summary.id.clone();
    let node_a = detail.nodes.iter().find(|n| n.node_def_id == "dn_a").unwrap();

    let selection = vec![("wecmdb:host_resource".to_string(), "host-2".to_string())];
    engine
        .update_node_bindings(&instance_id, &node_a.id, &selection, "operator-2")
        .await
        .unwrap();

    let bindings = engine
        .get_instance_bindings(&instance_id, Some(&node_a.id))
        .await
        .unwrap();
    // Both rows still exist; only the flags moved.
    assert_eq!(bindings.len(), 2);
    let host1 = bindings.iter().find(|b| b.entity_data_id == "host-1").unwrap();
    let host2 = bindings.iter().find(|b| b.entity_data_id == "host-2").unwrap();
    assert!(!host1.bound);
    assert!(host2.bound);

    // Applying the same selection again is a no-op.
    engine
        .update_node_bindings(&instance_id, &node_a.id, &selection, "operator-2")
        .await
        .unwrap();
    let again = engine
        .get_instance_bindings(&instance_id, Some(&node_a.id))
        .await
        .unwrap();
    assert_eq!(bindings, again);
}

#[tokio::test]
async fn preview_binding_update_toggles_flags() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[
            preview_row("pd_1", "sess_1", Some("dn_a"), "taskNode", "host-1"),
            preview_row("pd_1", "sess_1", Some("dn_a"), "taskNode", "host-2"),
        ])
        .await
        .unwrap();

    engine
        .update_preview_bindings("sess_1", "dn_a", &[], "admin")
        .await
        .unwrap();

    let bindings = engine
        .get_preview_bindings("sess_1", Some("dn_a"))
        .await
        .unwrap();
    assert_eq!(bindings.len(), 2);
    assert!(bindings.iter().all(|b| !b.bound));
}

#[tokio::test]
async fn interface_resolution_prefers_highest_enabled_version() {
    let (engine, store) = engine_with_store();

    for (config_id, version, status, interface_id) in [
        ("cfg_1", "1.2.0", "ENABLED", "if_old"),
        ("cfg_2", "1.10.0", "ENABLED", "if_new"),
        ("cfg_3", "2.0.0", "DISABLED", "if_disabled"),
    ] {
        store
            .register_plugin_config(&PluginConfig {
                id: config_id.to_string(),
                package_name: "wecmdb".to_string(),
                version: version.to_string(),
                status: status.to_string(),
            })
            .await
            .unwrap();
        store
            .register_interface(
                &InterfaceWithVersion {
                    id: interface_id.to_string(),
                    config_id: config_id.to_string(),
                    service_name: "wecmdb/confirm".to_string(),
                    service_display_name: None,
                    path: "/wecmdb/entities/host/confirm".to_string(),
                    http_method: "POST".to_string(),
                    is_async: false,
                    filter_rule: None,
                    description: None,
                    version: String::new(),
                },
                &[
                    InterfaceParameter {
                        id: format!("{}_in", interface_id),
                        interface_id: interface_id.to_string(),
                        direction: "input".to_string(),
                        name: "host".to_string(),
                        data_type: "string".to_string(),
                        mapping_type: Some("entity".to_string()),
                        multiple: false,
                        sensitive: false,
                    },
                    InterfaceParameter {
                        id: format!("{}_out", interface_id),
                        interface_id: interface_id.to_string(),
                        direction: "output".to_string(),
                        name: "result".to_string(),
                        data_type: "string".to_string(),
                        mapping_type: None,
                        multiple: false,
                        sensitive: false,
                    },
                ],
            )
            .await
            .unwrap();
    }

    let resolved = engine.resolve_interface("wecmdb/confirm").await.unwrap();
    // "1.10.0" beats "1.2.0" numerically; "2.0.0" is disabled.
    assert_eq!(resolved.interface.id, "if_new");
    assert_eq!(resolved.interface.version, "1.10.0");
    assert_eq!(resolved.inputs.len(), 1);
    assert_eq!(resolved.outputs.len(), 1);

    let err = engine.resolve_interface("wecmdb/unknown").await.unwrap_err();
    assert_eq!(err.error_code(), "INTERFACE_NOT_FOUND");
}

#[tokio::test]
async fn node_context_regroups_logged_parameters() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[preview_row("pd_1", "sess_1", Some("dn_b"), "taskNode", "host-1")])
        .await
        .unwrap();
    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();
    let node_b = detail.nodes.iter().find(|n| n.node_def_id == "dn_b").unwrap();

    let now = Utc::now();
    let make_param = |data_index: i32, direction: &str, name: &str, value: &str| NodeRequestParam {
        id: None,
        request_id: "req_1".to_string(),
        data_index,
        direction: direction.to_string(),
        name: name.to_string(),
        data_type: "string".to_string(),
        data_value: Some(value.to_string()),
        entity_data_id: None,
        entity_type_id: None,
        multiple: false,
        param_def_id: None,
        mapping_type: None,
        callback_id: Some(format!("cb-{}", data_index)),
        created_at: now,
    };
    store
        .insert_node_request(
            &NodeRequest {
                id: "req_1".to_string(),
                instance_node_id: node_b.id.clone(),
                req_url: "http://gateway.test:19110/wecmdb/entities/host/confirm".to_string(),
                data_amount: 2,
                is_completed: false,
                error_msg: None,
                created_at: now,
                updated_at: None,
            },
            &[
                make_param(0, "input", "host", "h1"),
                make_param(1, "input", "host", "h2"),
            ],
        )
        .await
        .unwrap();
    store
        .complete_node_request(
            "req_1",
            None,
            &[
                make_param(0, "output", "result", "ok"),
                make_param(1, "output", "result", "ok"),
            ],
            Utc::now(),
        )
        .await
        .unwrap();

    let context = engine.get_node_context(&node_b.id).await.unwrap();
    assert_eq!(context.request_id.as_deref(), Some("req_1"));
    assert_eq!(context.request_objects.len(), 2);
    assert_eq!(context.request_objects[0].callback_parameter, "cb-0");
    assert_eq!(context.request_objects[0].inputs.len(), 1);
    assert_eq!(context.request_objects[0].outputs.len(), 1);
    assert_eq!(context.request_objects[1].callback_parameter, "cb-1");
}

#[tokio::test]
async fn instance_status_is_translated_for_display() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[preview_row("pd_1", "sess_1", None, "process", "app-1")])
        .await
        .unwrap();
    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();

    let node = &detail.nodes[0];
    store
        .update_instance_node_state(&node.id, Some("failed"), Some("boom"), None)
        .await
        .unwrap();

    let reloaded = engine.get_instance(&detail.summary.id).await.unwrap();
    let failed = reloaded.nodes.iter().find(|n| n.id == node.id).unwrap();
    assert_eq!(failed.status, "Faulted");
    assert!(reloaded.nodes.iter().filter(|n| n.id != node.id).all(|n| n.status == "NotStarted"));
}

#[tokio::test]
async fn execution_data_joins_run_node_to_bindings() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[
            preview_row("pd_1", "sess_1", Some("dn_b"), "taskNode", "host-1"),
            preview_row("pd_1", "sess_1", Some("dn_b"), "taskNode", "host-2"),
        ])
        .await
        .unwrap();
    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();

    let run_graph = engine.get_run_graph(&detail.summary.id).await.unwrap();
    let auto_run = run_graph
        .nodes
        .iter()
        .find(|n| n.job_type == "automatic")
        .unwrap();

    let data = engine.get_node_execution_data(&auto_run.id).await.unwrap();
    assert_eq!(data.run_node.id, auto_run.id);
    assert_eq!(data.definition_node.id, "dn_b");
    assert_eq!(data.instance_node.node_type, "automatic");
    assert_eq!(data.bindings.len(), 2);
    assert!(data.bindings.iter().all(|b| b.bind_flag));

    let err = engine.get_node_execution_data("wn_ghost").await.unwrap_err();
    assert_eq!(err.error_code(), "NODE_NOT_FOUND");
}

#[tokio::test]
async fn dynamic_bind_node_inherits_source_bindings() {
    let (engine, store) = engine_with_store();
    let mut follower = node("dn_follow", "pd_1", "automatic", 2);
    follower.dynamic_bind = true;
    follower.bind_node_id = Some("dn_lead".to_string());
    store
        .insert_definition(
            &definition("pd_1", "deployed"),
            &[node("dn_lead", "pd_1", "automatic", 1), follower],
            &[link("dl_1", "pd_1", "dn_lead", "dn_follow")],
        )
        .await
        .unwrap();
    store
        .insert_preview_bindings(&[
            preview_row("pd_1", "sess_1", Some("dn_lead"), "taskNode", "host-1"),
            // A row targeting the dynamic node itself is dropped at
            // instantiation.
            preview_row("pd_1", "sess_1", Some("dn_follow"), "taskNode", "host-9"),
        ])
        .await
        .unwrap();
    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();
    let instance_id = detail.summary.id.clone();

    let inherited = engine
        .get_dynamic_bind_data(&instance_id, "dn_follow")
        .await
        .unwrap();
    assert_eq!(inherited.len(), 1);
    assert_eq!(inherited[0].entity_data_id, "host-1");
    assert_eq!(inherited[0].definition_node_id.as_deref(), Some("dn_lead"));

    // Asking the same of a static node is a validation error.
    let err = engine
        .get_dynamic_bind_data(&instance_id, "dn_lead")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn node_state_update_keeps_unset_fields() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[preview_row("pd_1", "sess_1", None, "process", "app-1")])
        .await
        .unwrap();
    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();
    let node_id = detail.nodes[0].id.clone();

    engine
        .update_node_state(&node_id, None, None, Some("passed"))
        .await
        .unwrap();
    let node = store.get_instance_node(&node_id).await.unwrap().unwrap();
    assert_eq!(node.status, "ready");
    assert_eq!(node.risk_check_result.as_deref(), Some("passed"));

    engine
        .update_node_state(&node_id, Some("running"), None, None)
        .await
        .unwrap();
    let node = store.get_instance_node(&node_id).await.unwrap().unwrap();
    assert_eq!(node.status, "running");
    assert_eq!(node.risk_check_result.as_deref(), Some("passed"));
}

#[tokio::test]
async fn cache_entries_accumulate_without_duplicates() {
    let (engine, store) = engine_with_store();
    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[preview_row("pd_1", "sess_1", Some("dn_a"), "taskNode", "host-1")])
        .await
        .unwrap();
    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();
    let instance_id = detail.summary.id.clone();

    engine
        .add_cache_entries(
            &instance_id,
            &[
                ("wecmdb:host_resource".to_string(), "host-1".to_string()),
                ("wecmdb:host_resource".to_string(), "host-3".to_string()),
            ],
        )
        .await
        .unwrap();

    let entries = store.list_cache_entries(&instance_id).await.unwrap();
    // host-1 was already cached at instantiation.
    assert_eq!(entries.len(), 2);
}

/// Delegating store whose instance-graph write always fails, to observe
/// what callers see when materialization dies inside the transaction.
struct FailingGraphStore {
    inner: MemoryStore,
}

#[async_trait]
impl Store for FailingGraphStore {
    async fn insert_definition(
        &self,
        definition: &ProcessDefinition,
        nodes: &[DefinitionNode],
        links: &[DefinitionLink],
    ) -> Result<()> {
        self.inner.insert_definition(definition, nodes, links).await
    }

    async fn get_definition(&self, definition_id: &str) -> Result<Option<ProcessDefinition>> {
        self.inner.get_definition(definition_id).await
    }

    async fn list_definitions(
        &self,
        include_draft: bool,
        tag: Option<&str>,
    ) -> Result<Vec<ProcessDefinition>> {
        self.inner.list_definitions(include_draft, tag).await
    }

    async fn list_definition_nodes(&self, definition_id: &str) -> Result<Vec<DefinitionNode>> {
        self.inner.list_definition_nodes(definition_id).await
    }

    async fn get_definition_node(&self, node_id: &str) -> Result<Option<DefinitionNode>> {
        self.inner.get_definition_node(node_id).await
    }

    async fn list_definition_links(&self, definition_id: &str) -> Result<Vec<DefinitionLink>> {
        self.inner.list_definition_links(definition_id).await
    }

    async fn insert_preview_bindings(&self, rows: &[PreviewBinding]) -> Result<()> {
        self.inner.insert_preview_bindings(rows).await
    }

    async fn list_preview_bindings(
        &self,
        session_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<PreviewBinding>> {
        self.inner.list_preview_bindings(session_id, node_id).await
    }

    async fn update_preview_bound_flags(
        &self,
        changes: &[(i64, bool)],
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.inner
            .update_preview_bound_flags(changes, operator, now)
            .await
    }

    async fn insert_instance_graph(&self, _plan: &InstancePlan) -> Result<()> {
        Err(EngineError::Database {
            operation: "insert_instance_graph".to_string(),
            details: "connection reset mid-transaction".to_string(),
        })
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<ProcessInstance>> {
        self.inner.get_instance(instance_id).await
    }

    async fn list_instances(&self, limit: i64) -> Result<Vec<ProcessInstance>> {
        self.inner.list_instances(limit).await
    }

    async fn list_instance_nodes(&self, instance_id: &str) -> Result<Vec<InstanceNode>> {
        self.inner.list_instance_nodes(instance_id).await
    }

    async fn get_instance_node(&self, node_id: &str) -> Result<Option<InstanceNode>> {
        self.inner.get_instance_node(node_id).await
    }

    async fn update_instance_node_state(
        &self,
        node_id: &str,
        status: Option<&str>,
        error_msg: Option<&str>,
        risk_check_result: Option<&str>,
    ) -> Result<()> {
        self.inner
            .update_instance_node_state(node_id, status, error_msg, risk_check_result)
            .await
    }

    async fn get_run_graph(&self, instance_id: &str) -> Result<Option<InstanceRunGraph>> {
        self.inner.get_run_graph(instance_id).await
    }

    async fn get_run_node(&self, run_node_id: &str) -> Result<Option<RunNode>> {
        self.inner.get_run_node(run_node_id).await
    }

    async fn list_instance_bindings(
        &self,
        instance_id: &str,
        instance_node_id: Option<&str>,
    ) -> Result<Vec<DataBinding>> {
        self.inner
            .list_instance_bindings(instance_id, instance_node_id)
            .await
    }

    async fn update_binding_bound_flags(
        &self,
        changes: &[(String, bool)],
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.inner
            .update_binding_bound_flags(changes, operator, now)
            .await
    }

    async fn list_cache_entries(&self, instance_id: &str) -> Result<Vec<CacheEntry>> {
        self.inner.list_cache_entries(instance_id).await
    }

    async fn insert_cache_entries(&self, entries: &[CacheEntry]) -> Result<()> {
        self.inner.insert_cache_entries(entries).await
    }

    async fn register_plugin_config(&self, config: &PluginConfig) -> Result<()> {
        self.inner.register_plugin_config(config).await
    }

    async fn register_interface(
        &self,
        interface: &InterfaceWithVersion,
        parameters: &[InterfaceParameter],
    ) -> Result<()> {
        self.inner.register_interface(interface, parameters).await
    }

    async fn list_enabled_interfaces(
        &self,
        service_name: &str,
    ) -> Result<Vec<InterfaceWithVersion>> {
        self.inner.list_enabled_interfaces(service_name).await
    }

    async fn list_interface_parameters(
        &self,
        interface_id: &str,
    ) -> Result<Vec<InterfaceParameter>> {
        self.inner.list_interface_parameters(interface_id).await
    }

    async fn insert_node_request(
        &self,
        request: &NodeRequest,
        params: &[NodeRequestParam],
    ) -> Result<()> {
        self.inner.insert_node_request(request, params).await
    }

    async fn complete_node_request(
        &self,
        request_id: &str,
        error_msg: Option<&str>,
        outputs: &[NodeRequestParam],
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.inner
            .complete_node_request(request_id, error_msg, outputs, now)
            .await
    }

    async fn latest_node_request(&self, instance_node_id: &str) -> Result<Option<NodeRequest>> {
        self.inner.latest_node_request(instance_node_id).await
    }

    async fn list_node_request_params(&self, request_id: &str) -> Result<Vec<NodeRequestParam>> {
        self.inner.list_node_request_params(request_id).await
    }
}

#[tokio::test]
async fn instance_graph_write_failure_leaves_no_instances() {
    let store = Arc::new(FailingGraphStore {
        inner: MemoryStore::new(),
    });
    let client = PluginClient::new("gateway.test:19110", false);
    let engine = ProcessEngine::new(store.clone(), client);

    seed_three_node_definition(store.as_ref(), "pd_1").await;
    store
        .insert_preview_bindings(&[
            preview_row("pd_1", "sess_1", None, "process", "app-1"),
            preview_row("pd_1", "sess_1", Some("dn_a"), "taskNode", "host-1"),
        ])
        .await
        .unwrap();

    let err = engine
        .create_instance("pd_1", "sess_1", "admin")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "DATABASE_ERROR");

    // The failed write left nothing behind.
    assert!(engine.list_instances(10).await.unwrap().is_empty());
    assert!(store.inner.list_instances(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn dispatch_rejects_node_without_service() {
    let (engine, store) = engine_with_store();
    let mut data_node = node("dn_d", "pd_1", "data", 1);
    data_node.service_name = None;
    store
        .insert_definition(&definition("pd_1", "deployed"), &[data_node], &[])
        .await
        .unwrap();
    store
        .insert_preview_bindings(&[preview_row("pd_1", "sess_1", Some("dn_d"), "taskNode", "host-1")])
        .await
        .unwrap();
    let detail = engine.create_instance("pd_1", "sess_1", "admin").await.unwrap();

    let err = engine
        .dispatch_node(&detail.nodes[0].id, "txn-1", "admin", "Bearer t")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
}
