//! DFA path matcher.
//!
//! # Data Flow
//! ```text
//! Build (once per endpoint generation):
//!     Vec<Arc<Endpoint>>
//!     → builder.rs (breadth-first by depth: literals, parameters, catch-alls)
//!     → DfaMatcher { nodes: arena, endpoints: resolved constraints }
//!
//! Match (per request):
//!     "/users/42/"
//!     → tokenize (["users", "42"])
//!     → walk: literal → parameters → exit (nearest catch-all)
//!     → terminal node matches → matcher.rs (capture, defaults, constraints)
//!     → CandidateSet
//! ```
//!
//! # Design Decisions
//! - Nodes live in an arena and refer to each other by index; catch-all
//!   nodes loop back to themselves
//! - Parameter endpoints are also copied into sibling literal children so a
//!   walk never backtracks; precedence sorts it out afterwards
//! - Each node remembers the nearest catch-all on its path as its exit, used
//!   when a segment has no transition or is empty
//! - Terminal match lists are sorted by score at build time

mod builder;
mod graph;
mod matcher;

use std::collections::HashMap;

pub use builder::{BuildError, DfaMatcherBuilder};
pub use matcher::DfaMatcher;

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

impl NodeId {
    pub(crate) const ROOT: NodeId = NodeId(0);

    fn index(self) -> usize {
        self.0
    }
}

/// A terminal match: endpoint index plus its score within the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeMatch {
    pub(crate) endpoint: usize,
    pub(crate) score: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DfaNode {
    /// Human readable path to this node, e.g. `/users/{...}`.
    pub(crate) label: String,
    pub(crate) depth: usize,
    /// Keys are lowercased.
    pub(crate) literals: HashMap<String, NodeId>,
    pub(crate) parameters: Option<NodeId>,
    pub(crate) catch_all: Option<NodeId>,
    /// Own catch-all or the nearest one inherited from an ancestor.
    pub(crate) exit: Option<NodeId>,
    pub(crate) matches: Vec<NodeMatch>,
}

impl DfaNode {
    /// Next node for `segment`. Empty segments only follow the exit.
    pub(crate) fn transition(&self, segment: &str) -> Option<NodeId> {
        if segment.is_empty() {
            return self.exit;
        }
        self.literals
            .get(&segment.to_lowercase())
            .copied()
            .or(self.parameters)
            .or(self.exit)
    }
}
