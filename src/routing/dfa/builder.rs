//! Compiles an endpoint list into a [`DfaMatcher`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::matcher::CompiledEndpoint;
use super::{DfaMatcher, DfaNode, NodeId, NodeMatch};
use crate::routing::constraints::{ConstraintError, ConstraintRegistry, ParameterPolicy};
use crate::routing::endpoint::Endpoint;
use crate::routing::pattern::{PathSegment, RoutePattern};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("endpoint '{endpoint}': constraint '{constraint}' on parameter '{parameter}': {source}")]
    Constraint {
        endpoint: String,
        parameter: String,
        constraint: String,
        #[source]
        source: ConstraintError,
    },
}

pub struct DfaMatcherBuilder {
    registry: ConstraintRegistry,
    endpoints: Vec<Arc<Endpoint>>,
}

impl DfaMatcherBuilder {
    pub fn new(registry: ConstraintRegistry) -> Self {
        Self {
            registry,
            endpoints: Vec::new(),
        }
    }

    /// Registration order is the final tie-break between equal scores.
    pub fn add_endpoint(&mut self, endpoint: Arc<Endpoint>) -> &mut Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn add_endpoints(&mut self, endpoints: impl IntoIterator<Item = Arc<Endpoint>>) -> &mut Self {
        self.endpoints.extend(endpoints);
        self
    }

    pub fn build(&self) -> Result<DfaMatcher, BuildError> {
        let compiled = self
            .endpoints
            .iter()
            .map(|endpoint| self.compile(endpoint))
            .collect::<Result<Vec<_>, _>>()?;

        self.warn_indistinguishable();

        let mut graph = Graph::new(self.endpoints.len());
        let mut level = vec![NodeId::ROOT];
        let mut depth = 0;
        while !level.is_empty() {
            let mut next = Vec::new();
            for node in level {
                graph.expand(&self.endpoints, node, depth, &mut next);
            }
            level = next;
            depth += 1;
        }

        let mut nodes = graph.nodes;
        for node in &mut nodes {
            assign_scores(&self.endpoints, &mut node.matches);
        }

        tracing::debug!(
            endpoints = self.endpoints.len(),
            nodes = nodes.len(),
            max_depth = depth,
            "DFA matcher built"
        );

        Ok(DfaMatcher::new(nodes, compiled))
    }

    /// Resolves every constraint of the endpoint, both those on template
    /// parameters and those on names outside the template.
    fn compile(&self, endpoint: &Arc<Endpoint>) -> Result<CompiledEndpoint, BuildError> {
        let pattern = endpoint.pattern();
        let references = pattern
            .parameters()
            .flat_map(|parameter| {
                parameter
                    .constraints
                    .iter()
                    .map(move |reference| (parameter.name.as_str(), reference))
            })
            .chain(pattern.extra_constraints());

        let mut constraints: Vec<(String, Vec<Arc<dyn ParameterPolicy>>)> = Vec::new();
        for (name, reference) in references {
            let policy = self.registry.resolve(reference).map_err(|source| BuildError::Constraint {
                endpoint: endpoint.display_name().to_string(),
                parameter: name.to_string(),
                constraint: reference.to_string(),
                source,
            })?;
            match constraints.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(name)) {
                Some((_, policies)) => policies.push(policy),
                None => constraints.push((name.to_string(), vec![policy])),
            }
        }

        Ok(CompiledEndpoint {
            endpoint: endpoint.clone(),
            constraints,
        })
    }

    /// Identical structure at equal order can only ever produce an
    /// ambiguous match at request time.
    fn warn_indistinguishable(&self) {
        let mut groups: HashMap<(i32, &[u8]), Vec<&Arc<Endpoint>>> = HashMap::new();
        for endpoint in &self.endpoints {
            let key = (endpoint.order(), endpoint.pattern().precedence().digits());
            groups.entry(key).or_default().push(endpoint);
        }

        for group in groups.values().filter(|group| group.len() > 1) {
            for (i, first) in group.iter().enumerate() {
                for second in &group[i + 1..] {
                    if first.pattern().is_structurally_equal(second.pattern()) {
                        tracing::warn!(
                            first = %first.display_name(),
                            second = %second.display_name(),
                            order = first.order(),
                            "Endpoints have the same route structure and order; requests matching both are ambiguous"
                        );
                    }
                }
            }
        }
    }
}

enum SegmentKind<'a> {
    Literal(&'a str),
    Parameter,
    CatchAll,
}

/// The segment an endpoint consumes at `depth`. A trailing catch-all keeps
/// consuming every deeper segment.
fn segment_at(pattern: &RoutePattern, depth: usize) -> Option<SegmentKind<'_>> {
    let segments = pattern.segments();
    let segment: &PathSegment = match segments.get(depth) {
        Some(segment) => segment,
        None => segments.last().filter(|last| last.is_catch_all())?,
    };

    Some(if let Some(text) = segment.as_literal() {
        SegmentKind::Literal(text)
    } else if segment.is_catch_all() {
        SegmentKind::CatchAll
    } else {
        SegmentKind::Parameter
    })
}

/// Whether a path that ends at `depth` can match the pattern.
fn is_terminal(pattern: &RoutePattern, depth: usize) -> bool {
    depth >= pattern.segments().len() || pattern.is_optional_from(depth)
}

fn compare(a: &Endpoint, b: &Endpoint) -> Ordering {
    a.order()
        .cmp(&b.order())
        .then_with(|| a.pattern().precedence().cmp(b.pattern().precedence()))
}

fn assign_scores(endpoints: &[Arc<Endpoint>], matches: &mut Vec<NodeMatch>) {
    matches.sort_by(|a, b| compare(&endpoints[a.endpoint], &endpoints[b.endpoint]).then(a.endpoint.cmp(&b.endpoint)));
    matches.dedup_by_key(|m| m.endpoint);

    let mut score = 0;
    for i in 0..matches.len() {
        if i > 0 && compare(&endpoints[matches[i - 1].endpoint], &endpoints[matches[i].endpoint]).is_ne() {
            score += 1;
        }
        matches[i].score = score;
    }
}

/// Nodes under construction plus the endpoints waiting at each of them.
struct Graph {
    nodes: Vec<DfaNode>,
    pending: Vec<Vec<usize>>,
}

impl Graph {
    fn new(endpoint_count: usize) -> Self {
        Self {
            nodes: vec![DfaNode {
                label: "/".to_string(),
                ..DfaNode::default()
            }],
            pending: vec![(0..endpoint_count).collect()],
        }
    }

    fn add_node(&mut self, parent: NodeId, part: &str) -> NodeId {
        let parent = &self.nodes[parent.index()];
        let label = if parent.depth == 0 {
            format!("/{}", part)
        } else {
            format!("{}/{}", parent.label, part)
        };
        let depth = parent.depth + 1;

        let id = NodeId(self.nodes.len());
        self.nodes.push(DfaNode {
            label,
            depth,
            ..DfaNode::default()
        });
        self.pending.push(Vec::new());
        id
    }

    fn literal_child(&mut self, parent: NodeId, text: &str) -> NodeId {
        let key = text.to_lowercase();
        if let Some(&child) = self.nodes[parent.index()].literals.get(&key) {
            return child;
        }
        let child = self.add_node(parent, text);
        self.nodes[parent.index()].literals.insert(key, child);
        child
    }

    fn parameters_child(&mut self, parent: NodeId) -> NodeId {
        if let Some(child) = self.nodes[parent.index()].parameters {
            return child;
        }
        let child = self.add_node(parent, "{...}");
        self.nodes[parent.index()].parameters = Some(child);
        child
    }

    fn catch_all_child(&mut self, parent: NodeId) -> NodeId {
        if let Some(child) = self.nodes[parent.index()].catch_all {
            return child;
        }
        let child = self.add_node(parent, "{**}");
        let node = &mut self.nodes[child.index()];
        node.parameters = Some(child);
        node.catch_all = Some(child);
        node.exit = Some(child);
        self.nodes[parent.index()].catch_all = Some(child);
        child
    }

    /// Literal children plus the parameters child, in that order.
    fn path_children(&self, node: NodeId) -> Vec<NodeId> {
        let node = &self.nodes[node.index()];
        let mut literals: Vec<(&String, &NodeId)> = node.literals.iter().collect();
        literals.sort_by(|a, b| a.0.cmp(b.0));
        literals
            .into_iter()
            .map(|(_, &id)| id)
            .chain(node.parameters)
            .collect()
    }

    /// Distributes the endpoints waiting at `node` into its children.
    ///
    /// Literals go first so parameter and catch-all endpoints can be copied
    /// into every literal child created at this depth.
    fn expand(&mut self, endpoints: &[Arc<Endpoint>], node: NodeId, depth: usize, next: &mut Vec<NodeId>) {
        let work = std::mem::take(&mut self.pending[node.index()]);

        for &index in &work {
            let pattern = endpoints[index].pattern();
            if is_terminal(pattern, depth) {
                self.nodes[node.index()].matches.push(NodeMatch {
                    endpoint: index,
                    score: 0,
                });
            }
            if let Some(SegmentKind::Literal(text)) = segment_at(pattern, depth) {
                let child = self.literal_child(node, text);
                self.pending[child.index()].push(index);
            }
        }

        for &index in &work {
            if let Some(SegmentKind::Parameter) = segment_at(endpoints[index].pattern(), depth) {
                let parameters = self.parameters_child(node);
                self.pending[parameters.index()].push(index);
                let literals: Vec<NodeId> = self.nodes[node.index()].literals.values().copied().collect();
                for literal in literals {
                    self.pending[literal.index()].push(index);
                }
            }
        }

        for &index in &work {
            if let Some(SegmentKind::CatchAll) = segment_at(endpoints[index].pattern(), depth) {
                let catch_all = self.catch_all_child(node);
                self.nodes[catch_all.index()].matches.push(NodeMatch {
                    endpoint: index,
                    score: 0,
                });
                for child in self.path_children(node) {
                    self.pending[child.index()].push(index);
                }
            }
        }

        let exit = self.nodes[node.index()].catch_all.or(self.nodes[node.index()].exit);
        self.nodes[node.index()].exit = exit;
        for child in self.path_children(node) {
            self.nodes[child.index()].exit = exit;
            next.push(child);
        }
    }
}
