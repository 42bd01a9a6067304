// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence abstraction for the engine.
//!
//! The [`Store`] trait is the single seam between the engine services and
//! storage. Two implementations ship: [`postgres::PostgresStore`] for
//! production and [`memory::MemoryStore`] for tests and embedded use.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::instantiation::InstancePlan;
use crate::model::{
    CacheEntry, DataBinding, DefinitionLink, DefinitionNode, InstanceNode, InstanceRunGraph,
    InterfaceParameter, InterfaceWithVersion, NodeRequest, NodeRequestParam, PluginConfig,
    PreviewBinding, ProcessDefinition, ProcessInstance, RunNode,
};

/// Storage operations required by the engine.
///
/// Write methods that touch several tables are atomic: either every row
/// lands or none does.
#[async_trait]
pub trait Store: Send + Sync {
    // ===== Definitions =====

    /// Store a definition with its nodes and links atomically.
    async fn insert_definition(
        &self,
        definition: &ProcessDefinition,
        nodes: &[DefinitionNode],
        links: &[DefinitionLink],
    ) -> Result<()>;

    /// Fetch one definition by id.
    async fn get_definition(&self, definition_id: &str) -> Result<Option<ProcessDefinition>>;

    /// List definitions, newest first. Draft definitions are included only
    /// when `include_draft` is set; `tag` narrows to one classification.
    async fn list_definitions(
        &self,
        include_draft: bool,
        tag: Option<&str>,
    ) -> Result<Vec<ProcessDefinition>>;

    /// List a definition's nodes in stored ordinal order.
    async fn list_definition_nodes(&self, definition_id: &str) -> Result<Vec<DefinitionNode>>;

    /// Fetch one definition node by id.
    async fn get_definition_node(&self, node_id: &str) -> Result<Option<DefinitionNode>>;

    /// List a definition's links.
    async fn list_definition_links(&self, definition_id: &str) -> Result<Vec<DefinitionLink>>;

    // ===== Preview bindings =====

    /// Append preview rows for a bind session.
    async fn insert_preview_bindings(&self, rows: &[PreviewBinding]) -> Result<()>;

    /// List a session's preview rows, optionally narrowed to one
    /// definition node.
    async fn list_preview_bindings(
        &self,
        session_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<PreviewBinding>>;

    /// Apply reconciled bound-flag changes to preview rows.
    async fn update_preview_bound_flags(
        &self,
        changes: &[(i64, bool)],
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    // ===== Instances =====

    /// Write a complete instance plan atomically.
    async fn insert_instance_graph(&self, plan: &InstancePlan) -> Result<()>;

    /// Fetch one instance by id.
    async fn get_instance(&self, instance_id: &str) -> Result<Option<ProcessInstance>>;

    /// List instances, newest first, up to `limit`.
    async fn list_instances(&self, limit: i64) -> Result<Vec<ProcessInstance>>;

    /// List an instance's nodes in display order.
    async fn list_instance_nodes(&self, instance_id: &str) -> Result<Vec<InstanceNode>>;

    /// Fetch one instance node by id.
    async fn get_instance_node(&self, node_id: &str) -> Result<Option<InstanceNode>>;

    /// Update an instance node's mutable state. Each `Some` field is
    /// written; `None` fields keep their current value.
    async fn update_instance_node_state(
        &self,
        node_id: &str,
        status: Option<&str>,
        error_msg: Option<&str>,
        risk_check_result: Option<&str>,
    ) -> Result<()>;

    /// Fetch the scheduler's run graph for an instance.
    async fn get_run_graph(&self, instance_id: &str) -> Result<Option<InstanceRunGraph>>;

    /// Fetch one scheduler node by id.
    async fn get_run_node(&self, run_node_id: &str) -> Result<Option<RunNode>>;

    // ===== Data bindings and entity cache =====

    /// List an instance's bindings, optionally narrowed to one instance
    /// node.
    async fn list_instance_bindings(
        &self,
        instance_id: &str,
        instance_node_id: Option<&str>,
    ) -> Result<Vec<DataBinding>>;

    /// Apply reconciled bound-flag changes to binding rows.
    async fn update_binding_bound_flags(
        &self,
        changes: &[(String, bool)],
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// List an instance's cached entities.
    async fn list_cache_entries(&self, instance_id: &str) -> Result<Vec<CacheEntry>>;

    /// Append cache entries for entities not yet recorded. Entries whose
    /// `(entity_type_id, entity_data_id)` already exists for the instance
    /// are skipped.
    async fn insert_cache_entries(&self, entries: &[CacheEntry]) -> Result<()>;

    // ===== Plugin registry =====

    /// Register a plugin package version.
    async fn register_plugin_config(&self, config: &PluginConfig) -> Result<()>;

    /// Register a plugin interface and its parameter specs atomically. The
    /// interface's version is taken from its owning config at query time,
    /// not stored.
    async fn register_interface(
        &self,
        interface: &InterfaceWithVersion,
        parameters: &[InterfaceParameter],
    ) -> Result<()>;

    /// List interfaces registered under a service name whose owning config
    /// is enabled, across all package versions.
    async fn list_enabled_interfaces(
        &self,
        service_name: &str,
    ) -> Result<Vec<InterfaceWithVersion>>;

    /// List an interface's declared parameters.
    async fn list_interface_parameters(
        &self,
        interface_id: &str,
    ) -> Result<Vec<InterfaceParameter>>;

    // ===== Request history =====

    /// Record an outbound request and its input parameters atomically.
    async fn insert_node_request(
        &self,
        request: &NodeRequest,
        params: &[NodeRequestParam],
    ) -> Result<()>;

    /// Mark a request completed and append its output parameters
    /// atomically.
    async fn complete_node_request(
        &self,
        request_id: &str,
        error_msg: Option<&str>,
        outputs: &[NodeRequestParam],
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Fetch the most recent request recorded for an instance node.
    async fn latest_node_request(
        &self,
        instance_node_id: &str,
    ) -> Result<Option<NodeRequest>>;

    /// List a request's parameters ordered by `(data_index, id)` so that
    /// grouped request objects come out contiguous and stable.
    async fn list_node_request_params(
        &self,
        request_id: &str,
    ) -> Result<Vec<NodeRequestParam>>;
}
