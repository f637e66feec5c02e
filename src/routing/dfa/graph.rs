//! Graphviz export of the automaton, for debugging route tables.

use std::fmt;

use super::{DfaMatcher, NodeId};

/// DOT rendering of a [`DfaMatcher`]; use `to_string()` or `{}`.
pub struct DotGraph<'a> {
    matcher: &'a DfaMatcher,
}

impl DfaMatcher {
    pub fn dot(&self) -> DotGraph<'_> {
        DotGraph { matcher: self }
    }
}

impl fmt::Display for DotGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph DFA {{")?;
        writeln!(f, "  rankdir=LR;")?;

        for (index, node) in self.matcher.nodes().iter().enumerate() {
            let id = NodeId(index);
            let mut label = escape(&node.label);
            for m in &node.matches {
                let endpoint = self.matcher.endpoint(m.endpoint);
                label.push_str(&format!("\\n{} [{}]", escape(endpoint.display_name()), m.score));
            }
            let shape = if node.matches.is_empty() { "ellipse" } else { "box" };
            writeln!(f, "  {} [label=\"{}\", shape={}];", index, label, shape)?;

            let mut literals: Vec<_> = node.literals.iter().collect();
            literals.sort_by(|a, b| a.0.cmp(b.0));
            for (text, child) in literals {
                writeln!(f, "  {} -> {} [label=\"{}\"];", index, child.index(), escape(text))?;
            }
            if let Some(child) = node.parameters.filter(|&child| child != id) {
                writeln!(f, "  {} -> {} [label=\"{{...}}\"];", index, child.index())?;
            }
            if let Some(child) = node.catch_all {
                writeln!(f, "  {} -> {} [label=\"{{**}}\"];", index, child.index())?;
            }
            if let Some(exit) = node.exit.filter(|&exit| Some(exit) != node.catch_all) {
                writeln!(f, "  {} -> {} [style=dashed, label=\"exit\"];", index, exit.index())?;
            }
        }

        writeln!(f, "}}")
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
