// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution context assembly for instance nodes.
//!
//! Rebuilds what a node's last plugin call looked like from the request
//! history: parameters sharing a `data_index` are regrouped into logical
//! request objects, and stored string values are decoded back to their
//! declared types. Decoding is best effort, a value that no longer parses
//! is logged and kept as its raw string so one bad cell cannot hide the
//! rest of the context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use crate::model::{InstanceNode, NodeRequest, NodeRequestParam, ParamDirection};

/// One logical request object of a plugin call: the inputs sent and the
/// outputs received for one bound entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestObject {
    /// Callback correlation id of the object.
    pub callback_parameter: String,
    /// Input parameters, name to decoded value.
    pub inputs: Vec<Map<String, Value>>,
    /// Output parameters, name to decoded value.
    pub outputs: Vec<Map<String, Value>>,
}

/// Everything known about a node's most recent plugin call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeContext {
    /// Instance node id.
    pub node_id: String,
    /// Definition node id.
    pub node_def_id: String,
    /// Node name.
    pub node_name: String,
    /// Node type string.
    pub node_type: String,
    /// Id of the logged request, when one exists.
    pub request_id: Option<String>,
    /// Target URL of the logged request.
    pub request_url: Option<String>,
    /// Error recorded at completion, if the call failed.
    pub error_message: Option<String>,
    /// Regrouped request objects.
    pub request_objects: Vec<RequestObject>,
}

/// Decode a stored parameter value back to its declared type.
///
/// `string` parameters marked multiple and `list` parameters are stored as
/// JSON text; everything else is kept verbatim. A stored value that fails
/// to parse is returned as its raw string.
pub fn decode_param_value(data_type: &str, multiple: bool, raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    let needs_json = data_type == "list" || multiple;
    if !needs_json {
        return Value::String(raw.to_string());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(err) => {
            error!(data_type, %err, "stored parameter value is not valid json, keeping raw");
            Value::String(raw.to_string())
        }
    }
}

/// Regroup a request's parameters into logical request objects.
///
/// `params` must already be ordered by `(data_index, id)`; each distinct
/// `data_index` yields one object. The object's callback parameter is the
/// first callback id seen in the group.
pub fn group_request_objects(params: &[NodeRequestParam]) -> Vec<RequestObject> {
    let mut objects: Vec<RequestObject> = Vec::new();
    let mut current_index: Option<i32> = None;

    for param in params {
        if current_index != Some(param.data_index) {
            objects.push(RequestObject::default());
            current_index = Some(param.data_index);
        }
        // Grouping guarantees at least one object at this point.
        let object = objects.last_mut().unwrap();

        if object.callback_parameter.is_empty()
            && let Some(callback_id) = &param.callback_id
        {
            object.callback_parameter = callback_id.clone();
        }

        let value = decode_param_value(&param.data_type, param.multiple, param.data_value.as_deref());
        let mut entry = Map::new();
        entry.insert(param.name.clone(), value);

        match ParamDirection::parse(&param.direction) {
            Ok(ParamDirection::Input) => object.inputs.push(entry),
            Ok(ParamDirection::Output) => object.outputs.push(entry),
            Err(_) => {
                error!(
                    direction = %param.direction,
                    name = %param.name,
                    "skipping parameter with unknown direction"
                );
            }
        }
    }
    objects
}

/// Assemble the full context of a node's most recent call. `request` and
/// `params` are absent when the node never called out.
pub fn build_node_context(
    node: &InstanceNode,
    request: Option<&NodeRequest>,
    params: &[NodeRequestParam],
) -> NodeContext {
    NodeContext {
        node_id: node.id.clone(),
        node_def_id: node.definition_node_id.clone(),
        node_name: node.name.clone(),
        node_type: node.node_type.clone(),
        request_id: request.map(|r| r.id.clone()),
        request_url: request.map(|r| r.req_url.clone()),
        error_message: request.and_then(|r| r.error_msg.clone()),
        request_objects: group_request_objects(params),
    }
}
