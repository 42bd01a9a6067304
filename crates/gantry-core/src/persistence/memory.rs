// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory store for tests and embedded use.
//!
//! Mirrors the relational backend's semantics, including the atomicity of
//! the multi-table writes: each write method mutates the state under one
//! lock acquisition, so partially applied plans are impossible.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::instantiation::InstancePlan;
use crate::model::{
    CacheEntry, DataBinding, DefinitionLink, DefinitionNode, InstanceNode, InstanceRunGraph,
    InterfaceParameter, InterfaceWithVersion, NodeRequest, NodeRequestParam, PluginConfig,
    PreviewBinding, ProcessDefinition, ProcessInstance, RunLink, RunNode, RunWorkflow,
};
use crate::persistence::Store;

#[derive(Default)]
struct Inner {
    definitions: Vec<ProcessDefinition>,
    definition_nodes: Vec<DefinitionNode>,
    definition_links: Vec<DefinitionLink>,
    preview_bindings: Vec<PreviewBinding>,
    next_preview_id: i64,
    instances: Vec<ProcessInstance>,
    instance_nodes: Vec<InstanceNode>,
    workflows: Vec<RunWorkflow>,
    run_nodes: Vec<RunNode>,
    run_links: Vec<RunLink>,
    bindings: Vec<DataBinding>,
    cache_entries: Vec<CacheEntry>,
    plugin_configs: Vec<PluginConfig>,
    interfaces: Vec<InterfaceWithVersion>,
    interface_params: Vec<InterfaceParameter>,
    requests: Vec<NodeRequest>,
    request_params: Vec<NodeRequestParam>,
    next_param_id: i64,
}

/// Non-durable [`Store`] backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens after a panic in another test thread;
        // recover the data rather than cascade the panic.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_definition(
        &self,
        definition: &ProcessDefinition,
        nodes: &[DefinitionNode],
        links: &[DefinitionLink],
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.definitions.push(definition.clone());
        inner.definition_nodes.extend(nodes.iter().cloned());
        inner.definition_links.extend(links.iter().cloned());
        Ok(())
    }

    async fn get_definition(&self, definition_id: &str) -> Result<Option<ProcessDefinition>> {
        let inner = self.lock();
        Ok(inner.definitions.iter().find(|d| d.id == definition_id).cloned())
    }

    async fn list_definitions(
        &self,
        include_draft: bool,
        tag: Option<&str>,
    ) -> Result<Vec<ProcessDefinition>> {
        let inner = self.lock();
        let mut rows: Vec<ProcessDefinition> = inner
            .definitions
            .iter()
            .filter(|d| include_draft || d.status == "deployed")
            .filter(|d| tag.is_none() || d.tags.as_deref() == tag)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_definition_nodes(&self, definition_id: &str) -> Result<Vec<DefinitionNode>> {
        let inner = self.lock();
        let mut rows: Vec<DefinitionNode> = inner
            .definition_nodes
            .iter()
            .filter(|n| n.definition_id == definition_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.ordered_no.cmp(&b.ordered_no).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_definition_node(&self, node_id: &str) -> Result<Option<DefinitionNode>> {
        let inner = self.lock();
        Ok(inner.definition_nodes.iter().find(|n| n.id == node_id).cloned())
    }

    async fn list_definition_links(&self, definition_id: &str) -> Result<Vec<DefinitionLink>> {
        let inner = self.lock();
        Ok(inner
            .definition_links
            .iter()
            .filter(|l| l.definition_id == definition_id)
            .cloned()
            .collect())
    }

    async fn insert_preview_bindings(&self, rows: &[PreviewBinding]) -> Result<()> {
        let mut inner = self.lock();
        for row in rows {
            let mut row = row.clone();
            inner.next_preview_id += 1;
            row.id = Some(inner.next_preview_id);
            inner.preview_bindings.push(row);
        }
        Ok(())
    }

    async fn list_preview_bindings(
        &self,
        session_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<PreviewBinding>> {
        let inner = self.lock();
        Ok(inner
            .preview_bindings
            .iter()
            .filter(|r| r.session_id == session_id)
            .filter(|r| node_id.is_none() || r.definition_node_id.as_deref() == node_id)
            .cloned()
            .collect())
    }

    async fn update_preview_bound_flags(
        &self,
        changes: &[(i64, bool)],
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        for (id, bound) in changes {
            if let Some(row) = inner
                .preview_bindings
                .iter_mut()
                .find(|r| r.id == Some(*id))
            {
                row.is_bound = *bound;
                row.updated_by = Some(operator.to_string());
                row.updated_at = Some(now);
            }
        }
        Ok(())
    }

    async fn insert_instance_graph(&self, plan: &InstancePlan) -> Result<()> {
        let mut inner = self.lock();
        inner.instances.push(plan.instance.clone());
        inner.workflows.push(plan.workflow.clone());
        inner.instance_nodes.extend(plan.instance_nodes.iter().cloned());
        inner.run_nodes.extend(plan.run_nodes.iter().cloned());
        inner.run_links.extend(plan.run_links.iter().cloned());
        inner.bindings.extend(plan.bindings.iter().cloned());
        inner.cache_entries.extend(plan.cache_entries.iter().cloned());
        Ok(())
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<ProcessInstance>> {
        let inner = self.lock();
        Ok(inner.instances.iter().find(|i| i.id == instance_id).cloned())
    }

    async fn list_instances(&self, limit: i64) -> Result<Vec<ProcessInstance>> {
        let inner = self.lock();
        let mut rows = inner.instances.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn list_instance_nodes(&self, instance_id: &str) -> Result<Vec<InstanceNode>> {
        let inner = self.lock();
        let mut rows: Vec<InstanceNode> = inner
            .instance_nodes
            .iter()
            .filter(|n| n.instance_id == instance_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.ordered_no.cmp(&b.ordered_no).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_instance_node(&self, node_id: &str) -> Result<Option<InstanceNode>> {
        let inner = self.lock();
        Ok(inner.instance_nodes.iter().find(|n| n.id == node_id).cloned())
    }

    async fn update_instance_node_state(
        &self,
        node_id: &str,
        status: Option<&str>,
        error_msg: Option<&str>,
        risk_check_result: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.lock();
        if let Some(node) = inner.instance_nodes.iter_mut().find(|n| n.id == node_id) {
            if let Some(status) = status {
                node.status = status.to_string();
            }
            if let Some(error_msg) = error_msg {
                node.error_msg = Some(error_msg.to_string());
            }
            if let Some(result) = risk_check_result {
                node.risk_check_result = Some(result.to_string());
            }
        }
        Ok(())
    }

    async fn get_run_node(&self, run_node_id: &str) -> Result<Option<RunNode>> {
        let inner = self.lock();
        Ok(inner.run_nodes.iter().find(|n| n.id == run_node_id).cloned())
    }

    async fn get_run_graph(&self, instance_id: &str) -> Result<Option<InstanceRunGraph>> {
        let inner = self.lock();
        let Some(workflow) = inner
            .workflows
            .iter()
            .find(|w| w.instance_id == instance_id)
            .cloned()
        else {
            return Ok(None);
        };
        let nodes = inner
            .run_nodes
            .iter()
            .filter(|n| n.workflow_id == workflow.id)
            .cloned()
            .collect();
        let links = inner
            .run_links
            .iter()
            .filter(|l| l.workflow_id == workflow.id)
            .cloned()
            .collect();
        Ok(Some(InstanceRunGraph {
            workflow,
            nodes,
            links,
        }))
    }

    async fn list_instance_bindings(
        &self,
        instance_id: &str,
        instance_node_id: Option<&str>,
    ) -> Result<Vec<DataBinding>> {
        let inner = self.lock();
        Ok(inner
            .bindings
            .iter()
            .filter(|b| b.instance_id == instance_id)
            .filter(|b| {
                instance_node_id.is_none() || b.instance_node_id.as_deref() == instance_node_id
            })
            .cloned()
            .collect())
    }

    async fn update_binding_bound_flags(
        &self,
        changes: &[(String, bool)],
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        for (id, bound) in changes {
            if let Some(row) = inner.bindings.iter_mut().find(|b| &b.id == id) {
                row.bind_flag = *bound;
                row.updated_by = Some(operator.to_string());
                row.updated_at = Some(now);
            }
        }
        Ok(())
    }

    async fn list_cache_entries(&self, instance_id: &str) -> Result<Vec<CacheEntry>> {
        let inner = self.lock();
        Ok(inner
            .cache_entries
            .iter()
            .filter(|e| e.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn insert_cache_entries(&self, entries: &[CacheEntry]) -> Result<()> {
        let mut inner = self.lock();
        for entry in entries {
            let exists = inner.cache_entries.iter().any(|e| {
                e.instance_id == entry.instance_id
                    && e.entity_type_id == entry.entity_type_id
                    && e.entity_data_id == entry.entity_data_id
            });
            if !exists {
                inner.cache_entries.push(entry.clone());
            }
        }
        Ok(())
    }

    async fn register_plugin_config(&self, config: &PluginConfig) -> Result<()> {
        let mut inner = self.lock();
        inner.plugin_configs.push(config.clone());
        Ok(())
    }

    async fn register_interface(
        &self,
        interface: &InterfaceWithVersion,
        parameters: &[InterfaceParameter],
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.interfaces.push(interface.clone());
        inner.interface_params.extend(parameters.iter().cloned());
        Ok(())
    }

    async fn list_enabled_interfaces(
        &self,
        service_name: &str,
    ) -> Result<Vec<InterfaceWithVersion>> {
        let inner = self.lock();
        let mut rows = Vec::new();
        for interface in inner.interfaces.iter().filter(|i| i.service_name == service_name) {
            let Some(config) = inner
                .plugin_configs
                .iter()
                .find(|c| c.id == interface.config_id && c.status == "ENABLED")
            else {
                continue;
            };
            let mut row = interface.clone();
            row.version = config.version.clone();
            rows.push(row);
        }
        Ok(rows)
    }

    async fn list_interface_parameters(
        &self,
        interface_id: &str,
    ) -> Result<Vec<InterfaceParameter>> {
        let inner = self.lock();
        Ok(inner
            .interface_params
            .iter()
            .filter(|p| p.interface_id == interface_id)
            .cloned()
            .collect())
    }

    async fn insert_node_request(
        &self,
        request: &NodeRequest,
        params: &[NodeRequestParam],
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.requests.push(request.clone());
        for param in params {
            let mut param = param.clone();
            inner.next_param_id += 1;
            param.id = Some(inner.next_param_id);
            inner.request_params.push(param);
        }
        Ok(())
    }

    async fn complete_node_request(
        &self,
        request_id: &str,
        error_msg: Option<&str>,
        outputs: &[NodeRequestParam],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        if let Some(request) = inner.requests.iter_mut().find(|r| r.id == request_id) {
            request.is_completed = true;
            request.error_msg = error_msg.map(str::to_string);
            request.updated_at = Some(now);
        }
        for param in outputs {
            let mut param = param.clone();
            inner.next_param_id += 1;
            param.id = Some(inner.next_param_id);
            inner.request_params.push(param);
        }
        Ok(())
    }

    async fn latest_node_request(
        &self,
        instance_node_id: &str,
    ) -> Result<Option<NodeRequest>> {
        let inner = self.lock();
        Ok(inner
            .requests
            .iter()
            .filter(|r| r.instance_node_id == instance_node_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn list_node_request_params(
        &self,
        request_id: &str,
    ) -> Result<Vec<NodeRequestParam>> {
        let inner = self.lock();
        let mut rows: Vec<NodeRequestParam> = inner
            .request_params
            .iter()
            .filter(|p| p.request_id == request_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.data_index.cmp(&b.data_index).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}
