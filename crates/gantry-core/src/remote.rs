// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound calls to plugin services through the gateway.
//!
//! All plugin traffic uses one envelope: `{status, message, data}` with
//! status `"OK"` on success. Anything else, including transport and decode
//! failures, surfaces as [`EngineError::RemoteCall`].

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use gantry_expr::{ExpressionSegment, ScalarOrList};

use crate::error::{EngineError, Result};
use crate::ids;
use crate::model::InterfaceWithVersion;

/// Header carrying the engine's request id.
pub const HEADER_REQUEST_ID: &str = "RequestId";
/// Header carrying the caller's transaction id.
pub const HEADER_TRANSACTION_ID: &str = "TransactionId";
/// Header carrying the caller's auth token, forwarded as-is.
pub const HEADER_AUTHORIZATION: &str = "Authorization";

const STATUS_OK: &str = "OK";

/// Response envelope shared by every plugin endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// `"OK"` on success, an error code otherwise.
    pub status: String,
    /// Human-readable message; carries the error detail on failure.
    #[serde(default)]
    pub message: String,
    /// Endpoint-specific payload.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Whether the remote reported success.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// One filter of an entity query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityQueryFilter {
    /// Attribute to filter on.
    pub attr_name: String,
    /// Operator (`eq`, `in`, `like`, ...).
    pub op: String,
    /// Comparison value; a list for `in`.
    pub condition: Value,
}

impl EntityQueryFilter {
    /// Equality filter.
    pub fn eq(attr: &str, value: &str) -> Self {
        Self {
            attr_name: attr.to_string(),
            op: "eq".to_string(),
            condition: Value::String(value.to_string()),
        }
    }

    /// Membership filter.
    pub fn within(attr: &str, values: Vec<String>) -> Self {
        Self {
            attr_name: attr.to_string(),
            op: "in".to_string(),
            condition: Value::Array(values.into_iter().map(Value::String).collect()),
        }
    }
}

/// Result of one interface invocation.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    /// Output objects, one per submitted input object.
    pub outputs: Vec<Map<String, Value>>,
}

/// HTTP client for plugin services behind the gateway.
#[derive(Clone)]
pub struct PluginClient {
    http: reqwest::Client,
    gateway_url: String,
    https_enabled: bool,
}

impl PluginClient {
    /// Create a client for the given gateway host (scheme-less).
    pub fn new(gateway_url: &str, https_enabled: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            https_enabled,
        }
    }

    fn base_url(&self) -> String {
        let scheme = if self.https_enabled { "https" } else { "http" };
        format!("{}://{}", scheme, self.gateway_url)
    }

    /// Full URL an interface invocation will be sent to.
    pub fn interface_url(&self, interface: &InterfaceWithVersion) -> String {
        format!(
            "{}/{}",
            self.base_url(),
            interface.path.trim_start_matches('/')
        )
    }

    async fn post_envelope(
        &self,
        url: &str,
        body: &Value,
        request_id: &str,
        transaction_id: &str,
        token: &str,
    ) -> Result<Value> {
        let started = Instant::now();
        let mut request = self
            .http
            .post(url)
            .json(body)
            .header(HEADER_REQUEST_ID, request_id)
            .header(HEADER_AUTHORIZATION, token);
        if !transaction_id.is_empty() {
            request = request.header(HEADER_TRANSACTION_ID, transaction_id);
        }
        read_envelope(request.send().await, url, request_id, transaction_id, started).await
    }

    async fn get_envelope(&self, url: &str, request_id: &str, token: &str) -> Result<Value> {
        let started = Instant::now();
        let sent = self
            .http
            .get(url)
            .header(HEADER_REQUEST_ID, request_id)
            .header(HEADER_AUTHORIZATION, token)
            .send()
            .await;
        read_envelope(sent, url, request_id, "", started).await
    }

    /// Query entity rows of one model through the gateway.
    pub async fn query_entity(
        &self,
        package: &str,
        entity: &str,
        filters: &[EntityQueryFilter],
        token: &str,
    ) -> Result<Vec<Map<String, Value>>> {
        let url = format!("{}/{}/entities/{}/query", self.base_url(), package, entity);
        let body = json!({ "additionalFilters": filters });
        // Entity queries run outside any dispatch transaction; each gets a
        // call-scoped request id.
        let request_id = ids::request_id();
        let data = self.post_envelope(&url, &body, &request_id, "", token).await?;
        rows_from(data, &url)
    }

    /// Fetch a package's declared data models.
    pub async fn fetch_data_models(&self, package: &str, token: &str) -> Result<Value> {
        let url = format!("{}/{}/data-model", self.base_url(), package);
        let request_id = ids::request_id();
        self.get_envelope(&url, &request_id, token).await
    }

    /// Invoke a plugin interface with grouped input objects.
    pub async fn invoke_interface(
        &self,
        interface: &InterfaceWithVersion,
        inputs: &[Map<String, Value>],
        request_id: &str,
        transaction_id: &str,
        operator: &str,
        token: &str,
    ) -> Result<InvocationResult> {
        let url = self.interface_url(interface);
        let body = json!({
            "requestId": request_id,
            "operator": operator,
            "inputs": inputs,
        });
        let data = self
            .post_envelope(&url, &body, request_id, transaction_id, token)
            .await?;
        // Plugins wrap their outputs either directly as a list or under an
        // "outputs" key.
        let outputs = match data {
            Value::Array(_) => rows_from(data, &url)?,
            Value::Object(mut object) => match object.remove("outputs") {
                Some(outputs) => rows_from(outputs, &url)?,
                None => Vec::new(),
            },
            Value::Null => Vec::new(),
            other => {
                return Err(EngineError::RemoteCall {
                    url,
                    message: format!("unexpected response payload: {}", other),
                });
            }
        };
        Ok(InvocationResult { outputs })
    }

    /// Resolve a parsed path expression to the entity rows of its last
    /// segment, starting from one root entity.
    ///
    /// `positional_filters` carries externally supplied filters per
    /// segment position; each list is merged into that segment's query
    /// after the filters written in the expression itself. Each join step
    /// queries the gateway once with an `in` filter built from the
    /// previous step's rows; an empty intermediate result short-circuits
    /// to an empty final result.
    pub async fn query_expression_data(
        &self,
        segments: &[ExpressionSegment],
        root_data_id: Option<&str>,
        positional_filters: &[Vec<EntityQueryFilter>],
        token: &str,
    ) -> Result<Vec<Map<String, Value>>> {
        let Some(first) = segments.first() else {
            return Ok(Vec::new());
        };

        let mut filters = merged_segment_filters(first, 0, positional_filters);
        if let Some(root) = root_data_id {
            filters.push(EntityQueryFilter::eq("id", root));
        }
        let mut rows = self
            .query_entity(&first.package, &first.entity, &filters, token)
            .await?;

        for (step, window) in segments.windows(2).enumerate() {
            let segment = &window[1];
            if rows.is_empty() {
                return Ok(Vec::new());
            }

            let mut filters = merged_segment_filters(segment, step + 1, positional_filters);
            if let Some(left_column) = &segment.left_join_column {
                // Forward join: the previous rows' column values are ids of
                // the next entity.
                let ids = collect_column(&rows, left_column);
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                filters.push(EntityQueryFilter::within("id", ids));
            } else if let Some(ref_column) = &segment.ref_column {
                // Reverse join: the next entity's column refers back to the
                // previous rows' ids.
                let ids = collect_column(&rows, "id");
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                filters.push(EntityQueryFilter::within(ref_column, ids));
            } else {
                return Err(EngineError::Validation {
                    field: "expression".to_string(),
                    message: format!(
                        "segment '{}' has no join relation to its predecessor",
                        segment.entity_ref()
                    ),
                });
            }

            rows = self
                .query_entity(&segment.package, &segment.entity, &filters, token)
                .await?;
        }

        Ok(rows)
    }
}

/// Decode a plugin response envelope, logging the call's identifiers,
/// elapsed time, and outcome on every exit path.
async fn read_envelope(
    sent: reqwest::Result<reqwest::Response>,
    url: &str,
    request_id: &str,
    transaction_id: &str,
    started: Instant,
) -> Result<Value> {
    let response = match sent {
        Ok(response) => response,
        Err(err) => {
            warn!(
                url,
                request_id,
                transaction_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "plugin call transport failed"
            );
            return Err(err.into());
        }
    };
    let status = response.status();
    if !status.is_success() {
        warn!(
            url,
            request_id,
            transaction_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            %status,
            "plugin call failed"
        );
        return Err(EngineError::RemoteCall {
            url: url.to_string(),
            message: format!("unexpected http status {}", status),
        });
    }
    let envelope = match response.json::<Envelope>().await {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(
                url,
                request_id,
                transaction_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "plugin response decode failed"
            );
            return Err(err.into());
        }
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if !envelope.is_ok() {
        warn!(
            url,
            request_id,
            transaction_id,
            elapsed_ms,
            remote_status = %envelope.status,
            message = %envelope.message,
            "plugin reported failure"
        );
        return Err(EngineError::RemoteCall {
            url: url.to_string(),
            message: format!("remote status '{}': {}", envelope.status, envelope.message),
        });
    }
    debug!(
        url,
        request_id,
        transaction_id,
        elapsed_ms,
        body = %envelope.data,
        "plugin call done"
    );
    Ok(envelope.data)
}

/// Flatten one column of queried rows to its string values.
///
/// Null cells are skipped, list cells contribute every member, and empty
/// strings are dropped where the value was not already a plain string
/// list.
pub fn collect_column(rows: &[Map<String, Value>], column: &str) -> Vec<String> {
    let mut values = Vec::new();
    for row in rows {
        let Some(cell) = row.get(column) else {
            continue;
        };
        if let Some(classified) = ScalarOrList::classify(cell) {
            values.extend(classified.flatten());
        }
    }
    values
}

/// Project queried rows onto an expression's trailing result column.
///
/// Returns exactly one value per row; a row without the column (or with a
/// null cell) yields a null placeholder so positions stay aligned with the
/// input rows. The column defaults to `id` when the expression names none.
pub fn extract_result_column(
    rows: &[Map<String, Value>],
    segments: &[ExpressionSegment],
) -> Vec<Value> {
    let Some(last) = segments.last() else {
        return Vec::new();
    };
    let column = last.result_column.as_deref().unwrap_or("id");
    rows.iter()
        .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Filters for one segment's query: the filters written in the expression
/// followed by any externally supplied filters for that position.
fn merged_segment_filters(
    segment: &ExpressionSegment,
    position: usize,
    positional: &[Vec<EntityQueryFilter>],
) -> Vec<EntityQueryFilter> {
    let mut filters: Vec<EntityQueryFilter> = segment
        .filters
        .iter()
        .map(|f| EntityQueryFilter {
            attr_name: f.name.clone(),
            op: f.operator.clone(),
            condition: Value::String(f.value.clone()),
        })
        .collect();
    if let Some(extra) = positional.get(position) {
        filters.extend(extra.iter().cloned());
    }
    filters
}

fn rows_from(data: Value, url: &str) -> Result<Vec<Map<String, Value>>> {
    match data {
        Value::Array(items) => {
            let mut rows = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => rows.push(map),
                    other => {
                        return Err(EngineError::RemoteCall {
                            url: url.to_string(),
                            message: format!("expected object row, got: {}", other),
                        });
                    }
                }
            }
            Ok(rows)
        }
        Value::Null => Ok(Vec::new()),
        other => Err(EngineError::RemoteCall {
            url: url.to_string(),
            message: format!("expected row list, got: {}", other),
        }),
    }
}
