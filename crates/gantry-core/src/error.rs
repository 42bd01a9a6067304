// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for gantry-core.
//!
//! Provides a unified error type whose codes map one-to-one onto the
//! engine's error taxonomy: not-found, validation, expression, persistence,
//! remote-call, and conflict.

use std::fmt;

use gantry_expr::ParseError;

/// Result type using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine errors that can occur during request processing.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EngineError {
    /// Process definition was not found in the database.
    DefinitionNotFound {
        /// The definition ID that was not found.
        definition_id: String,
    },

    /// Process instance was not found.
    InstanceNotFound {
        /// The instance ID that was not found.
        instance_id: String,
    },

    /// Instance node (or its run-graph counterpart) was not found.
    NodeNotFound {
        /// The node ID that was not found.
        node_id: String,
    },

    /// No enabled plugin interface is registered under a service name.
    InterfaceNotFound {
        /// The service name that failed to resolve.
        service_name: String,
    },

    /// Input validation failed.
    Validation {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// A path expression failed to parse.
    Expression(ParseError),

    /// Database operation failed.
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// A remote plugin call failed: transport error, decode error, or a
    /// non-success envelope status.
    RemoteCall {
        /// The target URL of the failed call.
        url: String,
        /// The transport error or the remote envelope's message.
        message: String,
    },

    /// The requested change conflicts with the record's current state.
    Conflict {
        /// Description of the conflict.
        message: String,
    },
}

impl EngineError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DefinitionNotFound { .. } => "DEFINITION_NOT_FOUND",
            Self::InstanceNotFound { .. } => "INSTANCE_NOT_FOUND",
            Self::NodeNotFound { .. } => "NODE_NOT_FOUND",
            Self::InterfaceNotFound { .. } => "INTERFACE_NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Expression(..) => "EXPRESSION_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::RemoteCall { .. } => "REMOTE_CALL_ERROR",
            Self::Conflict { .. } => "CONFLICT",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefinitionNotFound { definition_id } => {
                write!(f, "Process definition '{}' not found", definition_id)
            }
            Self::InstanceNotFound { instance_id } => {
                write!(f, "Process instance '{}' not found", instance_id)
            }
            Self::NodeNotFound { node_id } => {
                write!(f, "Node '{}' not found", node_id)
            }
            Self::InterfaceNotFound { service_name } => {
                write!(
                    f,
                    "No enabled plugin interface registered for service '{}'",
                    service_name
                )
            }
            Self::Validation { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::Expression(err) => {
                write!(f, "Expression error: {}", err)
            }
            Self::Database { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
            Self::RemoteCall { url, message } => {
                write!(f, "Remote call to '{}' failed: {}", url, message)
            }
            Self::Conflict { message } => {
                write!(f, "Conflict: {}", message)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Database {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<ParseError> for EngineError {
    fn from(err: ParseError) -> Self {
        EngineError::Expression(err)
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::RemoteCall {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            message: err.to_string(),
        }
    }
}
