// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Data model for definitions, instances, bindings, and plugin metadata.
//!
//! Record structs mirror the relational schema one-to-one and derive
//! `sqlx::FromRow`. The closed enumerations ([`NodeType`],
//! [`DefinitionStatus`], [`BindType`], [`ParamDirection`]) are parsed from
//! their stored string form at consumption sites and matched exhaustively;
//! an unrecognized stored value is a validation error, never a silent
//! fallthrough.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ============================================================================
// Closed enumerations
// ============================================================================

/// The fixed set of definition node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    /// A task performed by a person.
    Human,
    /// A task dispatched to a plugin service.
    Automatic,
    /// A data-manipulation task.
    Data,
    /// A join point waiting for all incoming branches.
    Merge,
    /// A timed wait carrying a time configuration payload.
    TimeInterval,
}

impl NodeType {
    /// Parse the stored string form.
    pub fn parse(value: &str) -> Result<NodeType, EngineError> {
        match value {
            "human" => Ok(NodeType::Human),
            "automatic" => Ok(NodeType::Automatic),
            "data" => Ok(NodeType::Data),
            "merge" => Ok(NodeType::Merge),
            "timeInterval" => Ok(NodeType::TimeInterval),
            other => Err(EngineError::Validation {
                field: "node_type".to_string(),
                message: format!("unknown node type '{}'", other),
            }),
        }
    }

    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Human => "human",
            NodeType::Automatic => "automatic",
            NodeType::Data => "data",
            NodeType::Merge => "merge",
            NodeType::TimeInterval => "timeInterval",
        }
    }

    /// Whether nodes of this type receive a dense 1-based display ordinal.
    pub fn has_display_order(&self) -> bool {
        match self {
            NodeType::Human | NodeType::Automatic | NodeType::Data => true,
            NodeType::Merge | NodeType::TimeInterval => false,
        }
    }
}

/// Lifecycle status of a process definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionStatus {
    /// Editable, not yet startable.
    Draft,
    /// Published and immutable; the draft→deployed transition is monotonic.
    Deployed,
}

impl DefinitionStatus {
    /// Parse the stored string form.
    pub fn parse(value: &str) -> Result<DefinitionStatus, EngineError> {
        match value {
            "draft" => Ok(DefinitionStatus::Draft),
            "deployed" => Ok(DefinitionStatus::Deployed),
            other => Err(EngineError::Validation {
                field: "status".to_string(),
                message: format!("unknown definition status '{}'", other),
            }),
        }
    }

    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionStatus::Draft => "draft",
            DefinitionStatus::Deployed => "deployed",
        }
    }
}

/// Scope of an entity binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindType {
    /// Bound to the whole process instance rather than one node.
    Process,
    /// Bound to a single task node.
    TaskNode,
}

impl BindType {
    /// Parse the stored string form.
    pub fn parse(value: &str) -> Result<BindType, EngineError> {
        match value {
            "process" => Ok(BindType::Process),
            "taskNode" => Ok(BindType::TaskNode),
            other => Err(EngineError::Validation {
                field: "bind_type".to_string(),
                message: format!("unknown bind type '{}'", other),
            }),
        }
    }

    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            BindType::Process => "process",
            BindType::TaskNode => "taskNode",
        }
    }
}

/// Direction of a logged request parameter or an interface parameter spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamDirection {
    /// Sent to the plugin.
    Input,
    /// Returned by the plugin.
    Output,
}

impl ParamDirection {
    /// Parse the stored string form.
    pub fn parse(value: &str) -> Result<ParamDirection, EngineError> {
        match value {
            "input" => Ok(ParamDirection::Input),
            "output" => Ok(ParamDirection::Output),
            other => Err(EngineError::Validation {
                field: "direction".to_string(),
                message: format!("unknown parameter direction '{}'", other),
            }),
        }
    }

    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamDirection::Input => "input",
            ParamDirection::Output => "output",
        }
    }
}

// ============================================================================
// Status display mapping
// ============================================================================

/// Translate an internal lifecycle code to its external display code.
///
/// The mapping is a fixed enumeration; any code without an entry passes
/// through unchanged.
pub fn display_status(code: &str) -> &str {
    match code {
        "ready" => "NotStarted",
        "running" => "InProgress",
        "completed" => "Completed",
        "failed" => "Faulted",
        "timeout" => "Timeouted",
        "terminated" => "InternallyTerminated",
        other => other,
    }
}

/// Internal lifecycle code for a freshly materialized instance or node.
pub const STATUS_READY: &str = "ready";

// ============================================================================
// Definition records
// ============================================================================

/// Process definition header from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessDefinition {
    /// Unique definition id.
    pub id: String,
    /// Stable business key shared across versions.
    pub key: String,
    /// Human-readable name.
    pub name: String,
    /// Definition version label.
    pub version: String,
    /// Lifecycle status (`draft`, `deployed`).
    pub status: String,
    /// Optional classification tag.
    pub tags: Option<String>,
    /// Who created the definition.
    pub created_by: String,
    /// When the definition was created.
    pub created_at: DateTime<Utc>,
    /// Who last updated the definition.
    pub updated_by: Option<String>,
    /// When the definition was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

/// One step of a process definition.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DefinitionNode {
    /// Unique node id.
    pub id: String,
    /// Owning definition.
    pub definition_id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Node lifecycle status within the definition.
    pub status: String,
    /// Stored [`NodeType`] string.
    pub node_type: String,
    /// Plugin service dispatched for automatic nodes.
    pub service_name: Option<String>,
    /// Whether bindings are inherited at runtime from `bind_node_id`.
    pub dynamic_bind: bool,
    /// Source node for dynamic binding.
    pub bind_node_id: Option<String>,
    /// Whether a risk check gates this node's execution.
    pub risk_check: bool,
    /// Path expression selecting the entities this node operates on.
    pub expression: Option<String>,
    /// Execution timeout in minutes.
    pub timeout: i32,
    /// Stored display ordinal.
    pub ordered_no: i32,
    /// Time configuration payload for timeInterval nodes.
    pub time_config: Option<String>,
}

/// Directed edge between two definition nodes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DefinitionLink {
    /// Unique link id.
    pub id: String,
    /// Owning definition.
    pub definition_id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Optional label.
    pub name: Option<String>,
}

// ============================================================================
// Instance records
// ============================================================================

/// One execution of a process definition.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessInstance {
    /// Unique instance id.
    pub id: String,
    /// Definition this instance was materialized from.
    pub definition_id: String,
    /// Definition business key, denormalized at creation.
    pub definition_key: String,
    /// Definition name, denormalized at creation.
    pub definition_name: String,
    /// Lifecycle status (ready, running, completed, failed, terminated).
    pub status: String,
    /// Process-level bound entity data id.
    pub entity_data_id: Option<String>,
    /// Process-level bound entity type id (`package:entity`).
    pub entity_type_id: Option<String>,
    /// Preview session the instance was started from.
    pub session_id: Option<String>,
    /// Operator who started the instance.
    pub created_by: String,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
    /// Who last updated the instance.
    pub updated_by: Option<String>,
    /// When the instance was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Runtime counterpart of one definition node.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstanceNode {
    /// Unique instance node id.
    pub id: String,
    /// Owning instance.
    pub instance_id: String,
    /// Definition node this was materialized from.
    pub definition_node_id: String,
    /// Name copied from the definition node.
    pub name: String,
    /// Stored [`NodeType`] string.
    pub node_type: String,
    /// Lifecycle status.
    pub status: String,
    /// Display ordinal copied from the definition node.
    pub ordered_no: i32,
    /// Result of the pre-execution risk check, if any.
    pub risk_check_result: Option<String>,
    /// Error message from a failed execution.
    pub error_msg: Option<String>,
    /// Operator who created the node.
    pub created_by: String,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Run-graph records (scheduler view)
// ============================================================================

/// Execution-scheduler view of one instance, decoupled from the business
/// instance record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunWorkflow {
    /// Unique workflow id.
    pub id: String,
    /// Owning instance.
    pub instance_id: String,
    /// Name copied from the definition.
    pub name: String,
    /// Scheduler status.
    pub status: String,
    /// When the workflow was created.
    pub created_at: DateTime<Utc>,
}

/// Scheduler counterpart of one instance node.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunNode {
    /// Unique run node id.
    pub id: String,
    /// Owning workflow.
    pub workflow_id: String,
    /// Business instance node this schedules.
    pub instance_node_id: String,
    /// Name copied from the definition node.
    pub name: String,
    /// Job type (the definition node's type string).
    pub job_type: String,
    /// Scheduler status.
    pub status: String,
    /// Timeout in minutes; 0 for merge nodes.
    pub timeout: i32,
    /// Input payload; the time configuration for timeInterval nodes.
    pub input: Option<String>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
}

/// Scheduler counterpart of one definition link.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunLink {
    /// Unique run link id.
    pub id: String,
    /// Owning workflow.
    pub workflow_id: String,
    /// Definition link this was materialized from.
    pub definition_link_id: String,
    /// Optional label copied from the definition link.
    pub name: Option<String>,
    /// Source run node id.
    pub source: String,
    /// Target run node id.
    pub target: String,
}

// ============================================================================
// Binding records
// ============================================================================

/// A tentative entity-to-node binding scoped to a preview session.
///
/// Exists only before instance creation; superseded by [`DataBinding`] at
/// instantiation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PreviewBinding {
    /// Database primary key (None when inserting new rows).
    #[sqlx(default)]
    pub id: Option<i64>,
    /// Definition the session previews.
    pub definition_id: String,
    /// Owning bind session.
    pub session_id: String,
    /// Target definition node; empty for process-level rows.
    pub definition_node_id: Option<String>,
    /// Bound entity's data id.
    pub entity_data_id: String,
    /// Bound entity's display name.
    pub entity_data_name: Option<String>,
    /// Bound entity's type id (`package:entity`).
    pub entity_type_id: String,
    /// Display ordinal of the target node.
    pub ordered_no: Option<String>,
    /// Stored [`BindType`] string.
    pub bind_type: String,
    /// Full hierarchical data id from the entity tree.
    pub full_data_id: Option<String>,
    /// Whether the entity is currently selected.
    pub is_bound: bool,
    /// Who created the row.
    pub created_by: String,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// Who last toggled the row.
    pub updated_by: Option<String>,
    /// When the row was last toggled.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A confirmed entity-to-node binding on a live instance.
///
/// Rows are toggled via `bind_flag`, never hard-deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DataBinding {
    /// Unique binding id.
    pub id: String,
    /// Definition of the owning instance.
    pub definition_id: String,
    /// Owning instance.
    pub instance_id: String,
    /// Target definition node; None for process-level rows.
    pub definition_node_id: Option<String>,
    /// Target instance node; None for process-level rows.
    pub instance_node_id: Option<String>,
    /// Bound entity id.
    pub entity_id: String,
    /// Bound entity's data id.
    pub entity_data_id: String,
    /// Bound entity's display name.
    pub entity_data_name: Option<String>,
    /// Bound entity's type id (`package:entity`).
    pub entity_type_id: String,
    /// Whether the entity is currently selected.
    pub bind_flag: bool,
    /// Stored [`BindType`] string.
    pub bind_type: String,
    /// Full hierarchical data id from the entity tree.
    pub full_data_id: Option<String>,
    /// Who created the row.
    pub created_by: String,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// Who last toggled the row.
    pub updated_by: Option<String>,
    /// When the row was last toggled.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Deduplicated registry of entities ever referenced by an instance.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CacheEntry {
    /// Unique cache entry id.
    pub id: String,
    /// Owning instance.
    pub instance_id: String,
    /// Referenced entity id.
    pub entity_id: String,
    /// Referenced entity's data id.
    pub entity_data_id: String,
    /// Referenced entity's display name.
    pub entity_data_name: Option<String>,
    /// Referenced entity's type id.
    pub entity_type_id: String,
    /// Full hierarchical data id.
    pub full_data_id: Option<String>,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Plugin registry records
// ============================================================================

/// A registered plugin package version.
///
/// Several versions of one package can be registered; only configs with
/// status `ENABLED` take part in interface resolution.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PluginConfig {
    /// Unique config id.
    pub id: String,
    /// Plugin package name.
    pub package_name: String,
    /// Package version label.
    pub version: String,
    /// Registration status (`ENABLED`, `DISABLED`).
    pub status: String,
}

/// A callable operation exposed by a plugin, joined with its owning
/// package's version.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InterfaceWithVersion {
    /// Unique interface id.
    pub id: String,
    /// Owning plugin configuration.
    pub config_id: String,
    /// Registered service name (resolution key).
    pub service_name: String,
    /// Display name for UIs.
    pub service_display_name: Option<String>,
    /// Request path relative to the gateway.
    pub path: String,
    /// HTTP method of the operation.
    pub http_method: String,
    /// Whether the plugin processes the call asynchronously.
    pub is_async: bool,
    /// Optional entity filter rule.
    pub filter_rule: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Version of the owning plugin package.
    pub version: String,
}

/// Declared input/output parameter of a plugin interface.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InterfaceParameter {
    /// Unique parameter id.
    pub id: String,
    /// Owning interface.
    pub interface_id: String,
    /// Stored [`ParamDirection`] string.
    pub direction: String,
    /// Parameter name.
    pub name: String,
    /// Declared data type (`string`, `list`).
    pub data_type: String,
    /// How the value is produced (entity mapping, constant, context).
    pub mapping_type: Option<String>,
    /// Whether the parameter holds multiple values.
    pub multiple: bool,
    /// Whether the value is masked in logs and history.
    pub sensitive: bool,
}

/// A fully resolved interface: the highest enabled version of a service
/// name plus its parameter specs.
#[derive(Debug, Clone)]
pub struct ResolvedInterface {
    /// The selected interface row.
    pub interface: InterfaceWithVersion,
    /// Declared input parameters.
    pub inputs: Vec<InterfaceParameter>,
    /// Declared output parameters.
    pub outputs: Vec<InterfaceParameter>,
}

// ============================================================================
// Request history records
// ============================================================================

/// One logged call to a plugin for a node.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NodeRequest {
    /// Unique request id (also sent as the RequestId header).
    pub id: String,
    /// Instance node the call was made for.
    pub instance_node_id: String,
    /// Target URL of the call.
    pub req_url: String,
    /// Number of logical request objects sent.
    pub data_amount: i32,
    /// Whether the response phase has been recorded.
    pub is_completed: bool,
    /// Error message recorded at completion, if the call failed.
    pub error_msg: Option<String>,
    /// When the request was recorded.
    pub created_at: DateTime<Utc>,
    /// When the completion was recorded.
    pub updated_at: Option<DateTime<Utc>>,
}

/// One ordered, typed, optionally multi-valued parameter of a logged call.
///
/// Parameters sharing a `data_index` form one logical request object.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NodeRequestParam {
    /// Database primary key (None when inserting new rows).
    #[sqlx(default)]
    pub id: Option<i64>,
    /// Owning request record.
    pub request_id: String,
    /// Group index of the logical request object.
    pub data_index: i32,
    /// Stored [`ParamDirection`] string.
    pub direction: String,
    /// Parameter name.
    pub name: String,
    /// Declared data type (`string`, `list`).
    pub data_type: String,
    /// Stored string form of the value.
    pub data_value: Option<String>,
    /// Entity the value was mapped from.
    pub entity_data_id: Option<String>,
    /// Entity type the value was mapped from.
    pub entity_type_id: Option<String>,
    /// Whether the value holds multiple members.
    pub multiple: bool,
    /// Interface parameter spec this value was produced for.
    pub param_def_id: Option<String>,
    /// How the value was produced.
    pub mapping_type: Option<String>,
    /// Callback correlation id of the request object.
    pub callback_id: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// API-facing objects
// ============================================================================

/// Caller-facing view of one node binding, used by the get/update binding
/// operations for both preview sessions and live instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNodeBinding {
    /// Definition node the entity is bound to.
    pub node_def_id: String,
    /// Entity type id (`package:entity`).
    pub entity_type_id: String,
    /// Entity data id.
    pub entity_data_id: String,
    /// Display ordinal of the node, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered_no: Option<String>,
    /// Whether the entity is currently selected.
    pub bound: bool,
}

/// Flow node of a definition outline, with derived adjacency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    /// Definition node id.
    pub node_id: String,
    /// Node name.
    pub name: String,
    /// Node type string.
    pub node_type: String,
    /// Node status within the definition.
    pub status: String,
    /// Optional description.
    pub description: Option<String>,
    /// Whether runtime bindings are inherited dynamically.
    pub dynamic_bind: bool,
    /// Dense display ordinal; None for merge/timeInterval nodes.
    pub ordered_no: Option<u32>,
    /// Ids of nodes with a link into this node.
    pub previous_node_ids: Vec<String>,
    /// Ids of nodes this node links to.
    pub succeeding_node_ids: Vec<String>,
}

/// Definition header plus its flow nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionOutline {
    /// Definition id.
    pub definition_id: String,
    /// Definition business key.
    pub definition_key: String,
    /// Definition name.
    pub name: String,
    /// Definition version label.
    pub version: String,
    /// Definition status.
    pub status: String,
    /// Flow nodes with derived adjacency and display order.
    pub flow_nodes: Vec<FlowNode>,
}

/// Caller-facing instance summary with display-translated status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    /// Instance id.
    pub id: String,
    /// Definition id.
    pub definition_id: String,
    /// Definition business key.
    pub definition_key: String,
    /// Instance display name (the definition name).
    pub name: String,
    /// Operator who started the instance.
    pub operator: String,
    /// Display status code.
    pub status: String,
    /// Process-level bound entity data id.
    pub entity_data_id: Option<String>,
    /// Process-level bound entity type id.
    pub entity_type_id: Option<String>,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
}

/// Caller-facing node view inside an instance detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceNodeView {
    /// Instance node id.
    pub id: String,
    /// Definition node id.
    pub node_def_id: String,
    /// Node name.
    pub name: String,
    /// Node type string.
    pub node_type: String,
    /// Display status code.
    pub status: String,
    /// Dense display ordinal; None for merge/timeInterval nodes.
    pub ordered_no: Option<u32>,
    /// Ids of definition nodes with a link into this node.
    pub previous_node_ids: Vec<String>,
    /// Ids of definition nodes this node links to.
    pub succeeding_node_ids: Vec<String>,
}

/// Caller-facing instance detail: summary plus node views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDetail {
    /// Instance summary with display status.
    #[serde(flatten)]
    pub summary: InstanceSummary,
    /// Node views in stored order.
    pub nodes: Vec<InstanceNodeView>,
}

/// The materialized run graph returned from instantiation.
#[derive(Debug, Clone)]
pub struct InstanceRunGraph {
    /// The workflow record.
    pub workflow: RunWorkflow,
    /// Run nodes in definition order.
    pub nodes: Vec<RunNode>,
    /// Run links.
    pub links: Vec<RunLink>,
}
