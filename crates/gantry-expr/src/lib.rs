// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Entity path-expression language.
//!
//! An expression describes a chain of CMDB entity queries, for example:
//!
//! ```text
//! wecmdb:app_instance~(host_resource)wecmdb:host_resource{ip_address eq '10.128.200.7'}.resource_set>wecmdb:resource_set.code
//! ```
//!
//! Each segment names a `package:entity` pair, carries zero or more
//! `{attribute operator value}` filters, and is chained to its predecessor
//! with either `>` (forward join through the predecessor's trailing
//! `.column`) or `~(column)` (reverse join through an explicitly named
//! column). Single-quoted literals are opaque to the grammar, so values may
//! contain any delimiter character.
//!
//! This crate only parses; executing the resulting segments against a remote
//! entity-query service is the engine's job. [`ScalarOrList`] is the shared
//! helper for flattening join-key values of unknown shape into identifier
//! lists.

pub mod lexer;
pub mod parser;
pub mod value;

pub use parser::{EntityFilter, ExpressionSegment, ParseError, parse};
pub use value::ScalarOrList;
