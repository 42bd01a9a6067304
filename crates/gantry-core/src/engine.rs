// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The engine service object.
//!
//! [`ProcessEngine`] owns a [`Store`] and a [`PluginClient`] and exposes
//! the engine's operations: definition outlines, preview binding sessions,
//! instance creation, binding reconciliation, node context lookup, and
//! automatic node dispatch. All state lives behind the store; the engine
//! itself is cheap to clone and share.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use gantry_expr::parse;

use crate::binding::{StoredBinding, reconcile_bound_flags};
use crate::context::{NodeContext, build_node_context};
use crate::error::{EngineError, Result};
use crate::graph::{build_outline, derive_adjacency, display_ordinals};
use crate::ids;
use crate::instantiation::build_instance_plan;
use crate::model::{
    CacheEntry, DataBinding, DefinitionNode, DefinitionOutline, InstanceDetail, InstanceNode,
    InstanceNodeView, InstanceRunGraph, InstanceSummary, NodeRequest, NodeRequestParam,
    PreviewBinding, ProcessDefinition, ProcessInstance, ResolvedInterface, RunNode,
    TaskNodeBinding, display_status,
};
use crate::persistence::Store;
use crate::registry::select_latest;
use crate::remote::{EntityQueryFilter, InvocationResult, PluginClient};

/// Everything a scheduler needs to execute one run node.
#[derive(Debug, Clone)]
pub struct NodeExecutionData {
    /// The scheduler node being executed.
    pub run_node: RunNode,
    /// Its business instance node.
    pub instance_node: InstanceNode,
    /// The definition node it was materialized from.
    pub definition_node: DefinitionNode,
    /// Currently bound entities of the node.
    pub bindings: Vec<DataBinding>,
}

/// Central service object for process orchestration.
#[derive(Clone)]
pub struct ProcessEngine {
    store: Arc<dyn Store>,
    client: PluginClient,
}

impl ProcessEngine {
    /// Create an engine over a store and a plugin client.
    pub fn new(store: Arc<dyn Store>, client: PluginClient) -> Self {
        Self { store, client }
    }

    // ===== Definitions =====

    /// List definitions visible to callers.
    pub async fn list_definitions(
        &self,
        include_draft: bool,
        tag: Option<&str>,
    ) -> Result<Vec<ProcessDefinition>> {
        self.store.list_definitions(include_draft, tag).await
    }

    /// Fetch a definition's outline: nodes with derived adjacency and dense
    /// display ordinals.
    pub async fn get_definition_outline(&self, definition_id: &str) -> Result<DefinitionOutline> {
        let definition = self.require_definition(definition_id).await?;
        let nodes = self.store.list_definition_nodes(definition_id).await?;
        let links = self.store.list_definition_links(definition_id).await?;
        build_outline(&definition, &nodes, &links)
    }

    // ===== Preview binding sessions =====

    /// Build a preview binding session for a definition, resolving each
    /// node's path expression from the given root entity.
    ///
    /// Returns the created session rows as caller-facing bindings. Nodes
    /// without an expression, and nodes marked for dynamic binding,
    /// contribute no rows.
    #[instrument(skip(self, token), fields(definition_id = %definition_id))]
    pub async fn build_preview(
        &self,
        definition_id: &str,
        session_id: &str,
        root_entity_type: &str,
        root_data_id: &str,
        operator: &str,
        token: &str,
    ) -> Result<Vec<TaskNodeBinding>> {
        let definition = self.require_definition(definition_id).await?;
        let nodes = self.store.list_definition_nodes(definition_id).await?;
        let ordinals = display_ordinals(&nodes)?;
        let now = Utc::now();

        let mut rows = Vec::new();

        // Process-level row for the root entity itself.
        rows.push(PreviewBinding {
            id: None,
            definition_id: definition.id.clone(),
            session_id: session_id.to_string(),
            definition_node_id: None,
            entity_data_id: root_data_id.to_string(),
            entity_data_name: None,
            entity_type_id: root_entity_type.to_string(),
            ordered_no: None,
            bind_type: "process".to_string(),
            full_data_id: Some(root_data_id.to_string()),
            is_bound: true,
            created_by: operator.to_string(),
            created_at: now,
            updated_by: None,
            updated_at: None,
        });

        for node in &nodes {
            if node.dynamic_bind {
                continue;
            }
            let Some(expression) = node.expression.as_deref().filter(|e| !e.trim().is_empty())
            else {
                continue;
            };
            let segments = parse(expression)?;
            let entities = self
                .client
                .query_expression_data(&segments, Some(root_data_id), &[], token)
                .await?;
            let Some(last) = segments.last() else {
                continue;
            };
            let entity_type_id = last.entity_ref();
            debug!(node = %node.id, count = entities.len(), "resolved node expression");

            for row in entities {
                let Some(data_id) = row.get("id").and_then(Value::as_str) else {
                    continue;
                };
                rows.push(PreviewBinding {
                    id: None,
                    definition_id: definition.id.clone(),
                    session_id: session_id.to_string(),
                    definition_node_id: Some(node.id.clone()),
                    entity_data_id: data_id.to_string(),
                    entity_data_name: row
                        .get("displayName")
                        .or_else(|| row.get("key_name"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    entity_type_id: entity_type_id.clone(),
                    ordered_no: ordinals.get(&node.id).map(|o| o.to_string()),
                    bind_type: "taskNode".to_string(),
                    full_data_id: Some(data_id.to_string()),
                    is_bound: true,
                    created_by: operator.to_string(),
                    created_at: now,
                    updated_by: None,
                    updated_at: None,
                });
            }
        }

        self.store.insert_preview_bindings(&rows).await?;
        info!(session = %session_id, rows = rows.len(), "preview session created");

        let stored = self.store.list_preview_bindings(session_id, None).await?;
        Ok(stored.iter().map(preview_to_view).collect())
    }

    /// List a preview session's bindings, optionally narrowed to one node.
    pub async fn get_preview_bindings(
        &self,
        session_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<TaskNodeBinding>> {
        let rows = self.store.list_preview_bindings(session_id, node_id).await?;
        Ok(rows.iter().map(preview_to_view).collect())
    }

    /// Reconcile one node's preview rows against a submitted entity
    /// selection. Rows are toggled, never deleted; repeating the same
    /// selection changes nothing.
    pub async fn update_preview_bindings(
        &self,
        session_id: &str,
        node_id: &str,
        selected: &[(String, String)],
        operator: &str,
    ) -> Result<()> {
        let rows = self
            .store
            .list_preview_bindings(session_id, Some(node_id))
            .await?;
        let stored: Vec<StoredBinding<i64>> = rows.iter().map(StoredBinding::from).collect();
        let changes = reconcile_bound_flags(&stored, selected);
        if changes.is_empty() {
            return Ok(());
        }
        self.store
            .update_preview_bound_flags(&changes, operator, Utc::now())
            .await
    }

    // ===== Instances =====

    /// Materialize an instance from a deployed definition and a preview
    /// session, atomically: the instance, its nodes, the run graph, the
    /// confirmed bindings, and the entity cache all land together.
    #[instrument(skip(self), fields(definition_id = %definition_id, session = %session_id))]
    pub async fn create_instance(
        &self,
        definition_id: &str,
        session_id: &str,
        operator: &str,
    ) -> Result<InstanceDetail> {
        let definition = self.require_definition(definition_id).await?;
        let nodes = self.store.list_definition_nodes(definition_id).await?;
        let links = self.store.list_definition_links(definition_id).await?;
        let preview_rows = self.store.list_preview_bindings(session_id, None).await?;

        let plan = build_instance_plan(
            &definition,
            &nodes,
            &links,
            &preview_rows,
            session_id,
            operator,
            Utc::now(),
        )?;
        self.store.insert_instance_graph(&plan).await?;
        info!(
            instance = %plan.instance.id,
            nodes = plan.instance_nodes.len(),
            bindings = plan.bindings.len(),
            "instance created"
        );

        self.get_instance(&plan.instance.id).await
    }

    /// Fetch an instance with its node views, statuses translated to their
    /// display form.
    pub async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetail> {
        let instance = self.require_instance(instance_id).await?;
        let nodes = self.store.list_instance_nodes(instance_id).await?;

        let def_nodes = self
            .store
            .list_definition_nodes(&instance.definition_id)
            .await?;
        let def_links = self
            .store
            .list_definition_links(&instance.definition_id)
            .await?;
        let adjacency = derive_adjacency(&def_nodes, &def_links);
        let ordinals = display_ordinals(&def_nodes)?;

        let node_views = nodes
            .iter()
            .map(|node| InstanceNodeView {
                id: node.id.clone(),
                node_def_id: node.definition_node_id.clone(),
                name: node.name.clone(),
                node_type: node.node_type.clone(),
                status: display_status(&node.status).to_string(),
                ordered_no: ordinals.get(&node.definition_node_id).copied(),
                previous_node_ids: adjacency.previous_of(&node.definition_node_id),
                succeeding_node_ids: adjacency.succeeding_of(&node.definition_node_id),
            })
            .collect();

        Ok(InstanceDetail {
            summary: instance_summary(&instance),
            nodes: node_views,
        })
    }

    /// List recent instances with display statuses.
    pub async fn list_instances(&self, limit: i64) -> Result<Vec<InstanceSummary>> {
        let instances = self.store.list_instances(limit).await?;
        Ok(instances.iter().map(instance_summary).collect())
    }

    /// Fetch the scheduler's run graph for an instance.
    pub async fn get_run_graph(&self, instance_id: &str) -> Result<InstanceRunGraph> {
        self.store
            .get_run_graph(instance_id)
            .await?
            .ok_or_else(|| EngineError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    // ===== Instance bindings =====

    /// List an instance's currently bound entities, optionally narrowed to
    /// one instance node.
    pub async fn get_instance_bindings(
        &self,
        instance_id: &str,
        instance_node_id: Option<&str>,
    ) -> Result<Vec<TaskNodeBinding>> {
        self.require_instance(instance_id).await?;
        let rows = self
            .store
            .list_instance_bindings(instance_id, instance_node_id)
            .await?;
        Ok(rows
            .iter()
            .map(|row| TaskNodeBinding {
                node_def_id: row.definition_node_id.clone().unwrap_or_default(),
                entity_type_id: row.entity_type_id.clone(),
                entity_data_id: row.entity_data_id.clone(),
                ordered_no: None,
                bound: row.bind_flag,
            })
            .collect())
    }

    /// Reconcile one instance node's bindings against a submitted entity
    /// selection. Idempotent, like the preview variant.
    pub async fn update_node_bindings(
        &self,
        instance_id: &str,
        instance_node_id: &str,
        selected: &[(String, String)],
        operator: &str,
    ) -> Result<()> {
        self.require_instance(instance_id).await?;
        let rows = self
            .store
            .list_instance_bindings(instance_id, Some(instance_node_id))
            .await?;
        let stored: Vec<StoredBinding<String>> = rows.iter().map(StoredBinding::from).collect();
        let changes = reconcile_bound_flags(&stored, selected);
        if changes.is_empty() {
            debug!(node = %instance_node_id, "binding selection already in effect");
            return Ok(());
        }
        self.store
            .update_binding_bound_flags(&changes, operator, Utc::now())
            .await
    }

    /// Everything a scheduler needs to execute one run node: the business
    /// node, its definition node, and the currently bound entities.
    ///
    /// Keyed by run node id since that is what the scheduler holds.
    pub async fn get_node_execution_data(&self, run_node_id: &str) -> Result<NodeExecutionData> {
        let run_node = self
            .store
            .get_run_node(run_node_id)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound {
                node_id: run_node_id.to_string(),
            })?;
        let instance_node = self.require_instance_node(&run_node.instance_node_id).await?;
        let definition_node = self
            .store
            .get_definition_node(&instance_node.definition_node_id)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound {
                node_id: instance_node.definition_node_id.clone(),
            })?;
        let bindings = self
            .store
            .list_instance_bindings(&instance_node.instance_id, Some(&instance_node.id))
            .await?
            .into_iter()
            .filter(|b| b.bind_flag)
            .collect();
        Ok(NodeExecutionData {
            run_node,
            instance_node,
            definition_node,
            bindings,
        })
    }

    /// Resolve the bindings a dynamic-bind node inherits at runtime: the
    /// currently bound entities of its source node within the same
    /// instance.
    pub async fn get_dynamic_bind_data(
        &self,
        instance_id: &str,
        definition_node_id: &str,
    ) -> Result<Vec<DataBinding>> {
        self.require_instance(instance_id).await?;
        let def_node = self
            .store
            .get_definition_node(definition_node_id)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound {
                node_id: definition_node_id.to_string(),
            })?;
        if !def_node.dynamic_bind {
            return Err(EngineError::Validation {
                field: "dynamic_bind".to_string(),
                message: format!("node '{}' does not bind dynamically", definition_node_id),
            });
        }
        let Some(source_node_id) = def_node.bind_node_id.as_deref().filter(|s| !s.is_empty())
        else {
            return Err(EngineError::Validation {
                field: "bind_node_id".to_string(),
                message: format!("node '{}' names no source node to inherit from", def_node.id),
            });
        };
        let bindings = self
            .store
            .list_instance_bindings(instance_id, None)
            .await?
            .into_iter()
            .filter(|b| b.bind_flag && b.definition_node_id.as_deref() == Some(source_node_id))
            .collect();
        Ok(bindings)
    }

    /// Register entities in an instance's cache; entities already recorded
    /// for the instance are skipped.
    pub async fn add_cache_entries(
        &self,
        instance_id: &str,
        entities: &[(String, String)],
    ) -> Result<()> {
        self.require_instance(instance_id).await?;
        let now = Utc::now();
        let entries: Vec<_> = entities
            .iter()
            .map(|(entity_type_id, entity_data_id)| CacheEntry {
                id: ids::cache_entry_id(),
                instance_id: instance_id.to_string(),
                entity_id: format!("{}:{}", entity_type_id, entity_data_id),
                entity_data_id: entity_data_id.clone(),
                entity_data_name: None,
                entity_type_id: entity_type_id.clone(),
                full_data_id: None,
                created_at: now,
            })
            .collect();
        self.store.insert_cache_entries(&entries).await
    }

    /// Update an instance node's mutable state; `None` fields are left
    /// untouched.
    pub async fn update_node_state(
        &self,
        instance_node_id: &str,
        status: Option<&str>,
        error_msg: Option<&str>,
        risk_check_result: Option<&str>,
    ) -> Result<()> {
        self.require_instance_node(instance_node_id).await?;
        self.store
            .update_instance_node_state(instance_node_id, status, error_msg, risk_check_result)
            .await
    }

    /// Log the request phase of an outbound plugin call.
    pub async fn record_node_request(
        &self,
        request: &NodeRequest,
        inputs: &[NodeRequestParam],
    ) -> Result<()> {
        self.store.insert_node_request(request, inputs).await
    }

    /// Log the completion phase of an outbound plugin call.
    pub async fn complete_node_request(
        &self,
        request_id: &str,
        error_msg: Option<&str>,
        outputs: &[NodeRequestParam],
    ) -> Result<()> {
        self.store
            .complete_node_request(request_id, error_msg, outputs, Utc::now())
            .await
    }

    // ===== Node context =====

    /// Rebuild the execution context of a node's most recent plugin call.
    pub async fn get_node_context(&self, instance_node_id: &str) -> Result<NodeContext> {
        let node = self.require_instance_node(instance_node_id).await?;
        let request = self.store.latest_node_request(instance_node_id).await?;
        let params = match &request {
            Some(request) => self.store.list_node_request_params(&request.id).await?,
            None => Vec::new(),
        };
        Ok(build_node_context(&node, request.as_ref(), &params))
    }

    // ===== Plugin dispatch =====

    /// Resolve a service name to the interface of its highest enabled
    /// package version, with parameter specs split by direction.
    pub async fn resolve_interface(&self, service_name: &str) -> Result<ResolvedInterface> {
        let candidates = self.store.list_enabled_interfaces(service_name).await?;
        let interface = select_latest(service_name, candidates)?;
        let params = self.store.list_interface_parameters(&interface.id).await?;
        let (inputs, outputs): (Vec<_>, Vec<_>) = params
            .into_iter()
            .partition(|p| p.direction == "input");
        Ok(ResolvedInterface {
            interface,
            inputs,
            outputs,
        })
    }

    /// Dispatch an automatic node to its plugin service.
    ///
    /// One input object is built per bound entity, the call is logged
    /// before it is sent, and the outputs are logged when it returns. The
    /// node's status moves to `running` for the duration and lands on
    /// `completed` or `failed`.
    #[instrument(skip(self, token), fields(node = %instance_node_id))]
    pub async fn dispatch_node(
        &self,
        instance_node_id: &str,
        transaction_id: &str,
        operator: &str,
        token: &str,
    ) -> Result<InvocationResult> {
        let node = self.require_instance_node(instance_node_id).await?;
        let def_node = self
            .store
            .get_definition_node(&node.definition_node_id)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound {
                node_id: node.definition_node_id.clone(),
            })?;
        let Some(service_name) = def_node.service_name.as_deref().filter(|s| !s.is_empty())
        else {
            return Err(EngineError::Validation {
                field: "service_name".to_string(),
                message: format!("node '{}' has no service to dispatch", def_node.id),
            });
        };

        let resolved = self.resolve_interface(service_name).await?;

        let bindings = self
            .store
            .list_instance_bindings(&node.instance_id, Some(instance_node_id))
            .await?;
        let bound: Vec<_> = bindings.into_iter().filter(|b| b.bind_flag).collect();

        // One input object per bound entity; its attribute values come from
        // a fresh entity query so the plugin sees current data.
        let now = Utc::now();
        let request_id = ids::request_id();
        let mut inputs: Vec<Map<String, Value>> = Vec::with_capacity(bound.len());
        let mut input_params: Vec<NodeRequestParam> = Vec::new();

        for (data_index, binding) in bound.iter().enumerate() {
            let (package, entity) = split_entity_type(&binding.entity_type_id)?;
            let rows = self
                .client
                .query_entity(
                    package,
                    entity,
                    &[EntityQueryFilter::eq("id", &binding.entity_data_id)],
                    token,
                )
                .await?;
            let entity_row = rows.into_iter().next().unwrap_or_default();

            let callback_id = binding.entity_data_id.clone();
            let mut object = Map::new();
            object.insert(
                "callbackParameter".to_string(),
                Value::String(callback_id.clone()),
            );

            for spec in &resolved.inputs {
                let value = entity_row.get(&spec.name).cloned().unwrap_or(Value::Null);
                object.insert(spec.name.clone(), value.clone());

                let stored_value = if spec.sensitive {
                    Some("***".to_string())
                } else {
                    Some(value_to_stored(&value))
                };
                input_params.push(NodeRequestParam {
                    id: None,
                    request_id: request_id.clone(),
                    data_index: data_index as i32,
                    direction: "input".to_string(),
                    name: spec.name.clone(),
                    data_type: spec.data_type.clone(),
                    data_value: stored_value,
                    entity_data_id: Some(binding.entity_data_id.clone()),
                    entity_type_id: Some(binding.entity_type_id.clone()),
                    multiple: spec.multiple,
                    param_def_id: Some(spec.id.clone()),
                    mapping_type: spec.mapping_type.clone(),
                    callback_id: Some(callback_id.clone()),
                    created_at: now,
                });
            }
            inputs.push(object);
        }

        let req_url = self.client.interface_url(&resolved.interface);
        let request = NodeRequest {
            id: request_id.clone(),
            instance_node_id: instance_node_id.to_string(),
            req_url,
            data_amount: inputs.len() as i32,
            is_completed: false,
            error_msg: None,
            created_at: now,
            updated_at: None,
        };
        self.store.insert_node_request(&request, &input_params).await?;
        self.store
            .update_instance_node_state(instance_node_id, Some("running"), None, None)
            .await?;

        let result = self
            .client
            .invoke_interface(
                &resolved.interface,
                &inputs,
                &request_id,
                transaction_id,
                operator,
                token,
            )
            .await;

        match result {
            Ok(result) => {
                let output_params =
                    output_params_from(&request_id, &resolved, &result.outputs, &bound, now);
                self.store
                    .complete_node_request(&request_id, None, &output_params, Utc::now())
                    .await?;
                self.store
                    .update_instance_node_state(instance_node_id, Some("completed"), None, None)
                    .await?;
                info!(request = %request_id, outputs = result.outputs.len(), "node dispatched");
                Ok(result)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(request = %request_id, error = %message, "node dispatch failed");
                self.store
                    .complete_node_request(&request_id, Some(&message), &[], Utc::now())
                    .await?;
                self.store
                    .update_instance_node_state(
                        instance_node_id,
                        Some("failed"),
                        Some(&message),
                        None,
                    )
                    .await?;
                Err(err)
            }
        }
    }

    // ===== Lookups =====

    async fn require_definition(&self, definition_id: &str) -> Result<ProcessDefinition> {
        self.store
            .get_definition(definition_id)
            .await?
            .ok_or_else(|| EngineError::DefinitionNotFound {
                definition_id: definition_id.to_string(),
            })
    }

    async fn require_instance(&self, instance_id: &str) -> Result<ProcessInstance> {
        self.store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| EngineError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn require_instance_node(&self, node_id: &str) -> Result<InstanceNode> {
        self.store
            .get_instance_node(node_id)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound {
                node_id: node_id.to_string(),
            })
    }
}

fn instance_summary(instance: &ProcessInstance) -> InstanceSummary {
    InstanceSummary {
        id: instance.id.clone(),
        definition_id: instance.definition_id.clone(),
        definition_key: instance.definition_key.clone(),
        name: instance.definition_name.clone(),
        operator: instance.created_by.clone(),
        status: display_status(&instance.status).to_string(),
        entity_data_id: instance.entity_data_id.clone(),
        entity_type_id: instance.entity_type_id.clone(),
        created_at: instance.created_at,
    }
}

fn preview_to_view(row: &PreviewBinding) -> TaskNodeBinding {
    TaskNodeBinding {
        node_def_id: row.definition_node_id.clone().unwrap_or_default(),
        entity_type_id: row.entity_type_id.clone(),
        entity_data_id: row.entity_data_id.clone(),
        ordered_no: row.ordered_no.clone(),
        bound: row.is_bound,
    }
}

/// Split a `package:entity` type id.
fn split_entity_type(entity_type_id: &str) -> Result<(&str, &str)> {
    match entity_type_id.split_once(':') {
        Some((package, entity)) if !package.is_empty() && !entity.is_empty() => {
            Ok((package, entity))
        }
        _ => Err(EngineError::Validation {
            field: "entity_type_id".to_string(),
            message: format!("'{}' is not of the form package:entity", entity_type_id),
        }),
    }
}

fn value_to_stored(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Match returned output objects back to their request objects via the
/// callback parameter and flatten them to loggable rows.
fn output_params_from(
    request_id: &str,
    resolved: &ResolvedInterface,
    outputs: &[Map<String, Value>],
    bound: &[DataBinding],
    now: chrono::DateTime<Utc>,
) -> Vec<NodeRequestParam> {
    let index_by_callback: HashMap<&str, i32> = bound
        .iter()
        .enumerate()
        .map(|(i, b)| (b.entity_data_id.as_str(), i as i32))
        .collect();

    let mut params = Vec::new();
    for (position, output) in outputs.iter().enumerate() {
        let callback_id = output
            .get("callbackParameter")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let data_index = index_by_callback
            .get(callback_id)
            .copied()
            .unwrap_or(position as i32);

        for spec in &resolved.outputs {
            let Some(value) = output.get(&spec.name) else {
                continue;
            };
            let stored_value = if spec.sensitive {
                Some("***".to_string())
            } else {
                Some(value_to_stored(value))
            };
            params.push(NodeRequestParam {
                id: None,
                request_id: request_id.to_string(),
                data_index,
                direction: "output".to_string(),
                name: spec.name.clone(),
                data_type: spec.data_type.clone(),
                data_value: stored_value,
                entity_data_id: None,
                entity_type_id: None,
                multiple: spec.multiple,
                param_def_id: Some(spec.id.clone()),
                mapping_type: spec.mapping_type.clone(),
                callback_id: Some(callback_id.to_string()),
                created_at: now,
            });
        }
    }
    params
}
