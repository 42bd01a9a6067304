// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Definition graph derivation.
//!
//! The persisted model stores nodes and directed links separately; callers
//! want each node annotated with its predecessors, successors, and a dense
//! display ordinal. Everything in this module is a pure function over the
//! loaded rows.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{DefinitionLink, DefinitionNode, DefinitionOutline, FlowNode, NodeType,
    ProcessDefinition};

/// Predecessor and successor ids for every node in a definition, derived
/// from its links.
#[derive(Debug, Default)]
pub struct Adjacency {
    /// node id -> ids of nodes with a link into it
    pub previous: HashMap<String, Vec<String>>,
    /// node id -> ids of nodes it links to
    pub succeeding: HashMap<String, Vec<String>>,
}

impl Adjacency {
    /// Predecessor ids of a node, in link order.
    pub fn previous_of(&self, node_id: &str) -> Vec<String> {
        self.previous.get(node_id).cloned().unwrap_or_default()
    }

    /// Successor ids of a node, in link order.
    pub fn succeeding_of(&self, node_id: &str) -> Vec<String> {
        self.succeeding.get(node_id).cloned().unwrap_or_default()
    }
}

/// Derive adjacency from definition links.
///
/// Links pointing at nodes absent from the node set are ignored rather than
/// rejected; a partially loaded definition still yields a usable view.
pub fn derive_adjacency(nodes: &[DefinitionNode], links: &[DefinitionLink]) -> Adjacency {
    let known: HashMap<&str, ()> = nodes.iter().map(|n| (n.id.as_str(), ())).collect();
    let mut adjacency = Adjacency::default();
    for link in links {
        if !known.contains_key(link.source.as_str()) || !known.contains_key(link.target.as_str()) {
            continue;
        }
        adjacency
            .succeeding
            .entry(link.source.clone())
            .or_default()
            .push(link.target.clone());
        adjacency
            .previous
            .entry(link.target.clone())
            .or_default()
            .push(link.source.clone());
    }
    adjacency
}

/// Compute the dense 1-based display ordinal for every orderable node.
///
/// Human, automatic, and data nodes are sorted by their stored ordinal
/// (ties broken by id for determinism) and numbered 1..n with no gaps.
/// Merge and timeInterval nodes never receive an ordinal, and their stored
/// ordinals do not create gaps in the numbering.
pub fn display_ordinals(nodes: &[DefinitionNode]) -> Result<HashMap<String, u32>> {
    let mut orderable: Vec<(&DefinitionNode, NodeType)> = Vec::new();
    for node in nodes {
        let node_type = NodeType::parse(&node.node_type)?;
        if node_type.has_display_order() {
            orderable.push((node, node_type));
        }
    }
    orderable.sort_by(|(a, _), (b, _)| a.ordered_no.cmp(&b.ordered_no).then(a.id.cmp(&b.id)));

    let mut ordinals = HashMap::with_capacity(orderable.len());
    for (position, (node, _)) in orderable.iter().enumerate() {
        ordinals.insert(node.id.clone(), position as u32 + 1);
    }
    Ok(ordinals)
}

/// Assemble the caller-facing outline of a definition: header fields plus
/// flow nodes carrying derived adjacency and display ordinals.
pub fn build_outline(
    definition: &ProcessDefinition,
    nodes: &[DefinitionNode],
    links: &[DefinitionLink],
) -> Result<DefinitionOutline> {
    let adjacency = derive_adjacency(nodes, links);
    let ordinals = display_ordinals(nodes)?;

    let mut flow_nodes = Vec::with_capacity(nodes.len());
    for node in nodes {
        flow_nodes.push(FlowNode {
            node_id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type.clone(),
            status: node.status.clone(),
            description: node.description.clone(),
            dynamic_bind: node.dynamic_bind,
            ordered_no: ordinals.get(&node.id).copied(),
            previous_node_ids: adjacency.previous_of(&node.id),
            succeeding_node_ids: adjacency.succeeding_of(&node.id),
        });
    }

    // Ordered nodes first by ordinal, then the rest in stored order.
    flow_nodes.sort_by(|a, b| match (a.ordered_no, b.ordered_no) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.node_id.cmp(&b.node_id),
    });

    Ok(DefinitionOutline {
        definition_id: definition.id.clone(),
        definition_key: definition.key.clone(),
        name: definition.name.clone(),
        version: definition.version.clone(),
        status: definition.status.clone(),
        flow_nodes,
    })
}
