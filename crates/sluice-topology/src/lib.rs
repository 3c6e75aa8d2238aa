//! Directed graph of physical components and the propagation order.
//!
//! Edges point downstream: `(upstream, downstream)` states that the
//! upstream component's outflow is the downstream component's inflow
//! within a single step. The graph is built once at scenario assembly
//! and is immutable afterwards; reconfiguring topology means building a
//! new scenario.
//!
//! A cycle among edges active within one step is a configuration error,
//! detected here at build time. Closed loops across steps — agents
//! issuing commands based on prior-step state — are the sanctioned
//! feedback mechanism and involve no graph edge.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;
use sluice_core::ComponentId;

/// Adjacency lists for one node. Most water networks are nearly linear,
/// so two inline slots cover the common case without allocation.
#[derive(Clone, Debug, Default)]
struct Node {
    downstream: SmallVec<[ComponentId; 2]>,
    upstream: SmallVec<[ComponentId; 2]>,
}

/// Errors detected while building a [`Topology`].
#[derive(Clone, Debug, PartialEq)]
pub enum TopologyError {
    /// The same component id was declared twice.
    DuplicateComponent {
        /// The repeated id.
        id: ComponentId,
    },
    /// An edge references a component that was never declared.
    UnknownEndpoint {
        /// The undeclared id.
        id: ComponentId,
    },
    /// The same directed edge was declared twice. Duplicate edges would
    /// double-count flow, so they are rejected rather than merged.
    DuplicateEdge {
        /// Upstream endpoint.
        upstream: ComponentId,
        /// Downstream endpoint.
        downstream: ComponentId,
    },
    /// The edge set contains a cycle along the flow direction.
    Cycle {
        /// Components left unordered after the sort; every one of them
        /// lies on or downstream of a cycle.
        remaining: Vec<ComponentId>,
    },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateComponent { id } => {
                write!(f, "component '{id}' declared more than once")
            }
            Self::UnknownEndpoint { id } => {
                write!(f, "edge references undeclared component '{id}'")
            }
            Self::DuplicateEdge {
                upstream,
                downstream,
            } => write!(f, "duplicate edge {upstream} -> {downstream}"),
            Self::Cycle { remaining } => {
                write!(f, "topology contains a cycle involving: ")?;
                for (i, id) in remaining.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{id}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for TopologyError {}

/// An immutable directed acyclic graph of components with a precomputed
/// topological propagation order.
#[derive(Clone, Debug)]
pub struct Topology {
    nodes: IndexMap<ComponentId, Node>,
    order: Vec<ComponentId>,
}

impl Topology {
    /// Build a topology from declared component ids and directed edges.
    ///
    /// Runs Kahn's algorithm once; the resulting order is fixed for the
    /// lifetime of the topology. Ties are broken by declaration order,
    /// so the propagation order is deterministic across runs.
    pub fn build(
        ids: impl IntoIterator<Item = ComponentId>,
        edges: &[(ComponentId, ComponentId)],
    ) -> Result<Self, TopologyError> {
        let mut nodes: IndexMap<ComponentId, Node> = IndexMap::new();
        for id in ids {
            if nodes.insert(id.clone(), Node::default()).is_some() {
                return Err(TopologyError::DuplicateComponent { id });
            }
        }

        for (up, down) in edges {
            if !nodes.contains_key(up) {
                return Err(TopologyError::UnknownEndpoint { id: up.clone() });
            }
            if !nodes.contains_key(down) {
                return Err(TopologyError::UnknownEndpoint { id: down.clone() });
            }
            if nodes[up].downstream.contains(down) {
                return Err(TopologyError::DuplicateEdge {
                    upstream: up.clone(),
                    downstream: down.clone(),
                });
            }
            nodes[up].downstream.push(down.clone());
            nodes[down].upstream.push(up.clone());
        }

        let order = toposort(&nodes)?;
        Ok(Self { nodes, order })
    }

    /// The propagation order, upstream before downstream.
    pub fn order(&self) -> &[ComponentId] {
        &self.order
    }

    /// Components feeding into `id`, in edge declaration order.
    pub fn upstream(&self, id: &ComponentId) -> &[ComponentId] {
        self.nodes.get(id).map(|n| n.upstream.as_slice()).unwrap_or(&[])
    }

    /// Components fed by `id`, in edge declaration order.
    pub fn downstream(&self, id: &ComponentId) -> &[ComponentId] {
        self.nodes
            .get(id)
            .map(|n| n.downstream.as_slice())
            .unwrap_or(&[])
    }

    /// Number of declared components.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no components are declared.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if `id` was declared.
    pub fn contains(&self, id: &ComponentId) -> bool {
        self.nodes.contains_key(id)
    }
}

/// Kahn's algorithm over node indices. Declaration order seeds the queue,
/// so equal-rank components keep a stable relative order.
fn toposort(nodes: &IndexMap<ComponentId, Node>) -> Result<Vec<ComponentId>, TopologyError> {
    let mut in_degree: Vec<usize> = nodes.values().map(|n| n.upstream.len()).collect();
    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, deg)| **deg == 0)
        .map(|(i, _)| i)
        .collect();

    let mut visited = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(i) = queue.pop_front() {
        visited[i] = true;
        let (id, node) = nodes.get_index(i).expect("index within node map");
        order.push(id.clone());
        for down in &node.downstream {
            let j = nodes.get_index_of(down).expect("endpoints validated");
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                queue.push_back(j);
            }
        }
    }

    if order.len() != nodes.len() {
        let remaining = nodes
            .keys()
            .enumerate()
            .filter(|(i, _)| !visited[*i])
            .map(|(_, id)| id.clone())
            .collect();
        return Err(TopologyError::Cycle { remaining });
    }
    Ok(order)
}
