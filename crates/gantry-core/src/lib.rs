// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gantry Core - Process Orchestration Engine
//!
//! This crate turns DAG-shaped process definitions into running instances
//! over a live configuration model: it resolves which entities each task
//! node operates on, materializes instances atomically, and dispatches
//! automatic nodes to plugin services through a gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Callers / UIs                             │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ProcessEngine                              │
//! │   outlines · preview sessions · instantiation · bindings        │
//! │           node context · interface dispatch                     │
//! └─────────────────────────────────────────────────────────────────┘
//!        │                      │                       │
//!        │ gantry-expr          │ Store trait           │ PluginClient
//!        ▼                      ▼                       ▼
//! ┌──────────────┐   ┌─────────────────────┐   ┌──────────────────┐
//! │  Expression  │   │  PostgresStore or   │   │  Plugin gateway  │
//! │   parsing    │   │    MemoryStore      │   │  (HTTP, JSON)    │
//! └──────────────┘   └─────────────────────┘   └──────────────────┘
//! ```
//!
//! # Flow
//!
//! 1. A caller previews a deployed definition against a root entity:
//!    every node's path expression is resolved through the gateway into
//!    candidate entities, stored as a preview session
//!    ([`engine::ProcessEngine::build_preview`]).
//! 2. The caller toggles which candidates stay selected; the reconciler
//!    only flips flags, never deletes rows ([`binding`]).
//! 3. Starting the process materializes the instance, its nodes, the
//!    scheduler's run graph, the confirmed bindings, and the entity cache
//!    in one transaction ([`instantiation`]).
//! 4. Automatic nodes dispatch to the highest enabled version of their
//!    plugin interface; every call is logged parameter by parameter and
//!    can be replayed as a node context later ([`context`]).

#![deny(missing_docs)]

pub mod binding;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ids;
pub mod instantiation;
pub mod migrations;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod remote;

pub use config::EngineConfig;
pub use engine::ProcessEngine;
pub use error::{EngineError, Result};
pub use persistence::Store;
pub use persistence::memory::MemoryStore;
pub use persistence::postgres::PostgresStore;
pub use remote::PluginClient;
