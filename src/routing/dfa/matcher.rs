//! Walking the DFA and turning terminal matches into candidates.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use super::{DfaNode, NodeId, NodeMatch};
use crate::routing::candidate::{Candidate, CandidateSet, Rejections};
use crate::routing::constraints::ParameterPolicy;
use crate::routing::endpoint::Endpoint;
use crate::routing::pattern::{ParameterPart, Part, RoutePattern};
use crate::routing::values::RouteValues;

/// An endpoint with its constraint references resolved.
pub(crate) struct CompiledEndpoint {
    pub(crate) endpoint: Arc<Endpoint>,
    /// Parameter name and its policies, in declaration order.
    pub(crate) constraints: Vec<(String, Vec<Arc<dyn ParameterPolicy>>)>,
}

impl CompiledEndpoint {
    /// Runs constraints against captured values or defaults. Parameters
    /// with neither are skipped.
    fn accepts(&self, values: &RouteValues) -> bool {
        self.constraints.iter().all(|(name, policies)| match values.get(name) {
            Some(value) => policies.iter().all(|policy| policy.matches(value)),
            None => true,
        })
    }
}

/// Immutable path matcher, shared by every request of one generation.
pub struct DfaMatcher {
    nodes: Vec<DfaNode>,
    endpoints: Vec<CompiledEndpoint>,
}

impl DfaMatcher {
    pub(crate) fn new(nodes: Vec<DfaNode>, endpoints: Vec<CompiledEndpoint>) -> Self {
        Self { nodes, endpoints }
    }

    /// Finds every endpoint whose pattern matches `path`.
    ///
    /// Candidates come out ordered by score. Those whose captures or
    /// constraints failed are kept, rejected with
    /// [`Rejections::CONSTRAINT`].
    pub fn candidates(&self, path: &str) -> CandidateSet {
        let segments = tokenize(path);

        let mut current = NodeId::ROOT;
        for segment in &segments {
            match self.node(current).transition(&segment.text) {
                Some(next) => current = next,
                None => return CandidateSet::default(),
            }
        }

        let candidates = self
            .node(current)
            .matches
            .iter()
            .map(|m| self.evaluate(m, path, &segments))
            .collect();
        CandidateSet::new(candidates)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.endpoints.iter().map(|compiled| &compiled.endpoint)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn nodes(&self) -> &[DfaNode] {
        &self.nodes
    }

    pub(crate) fn node(&self, id: NodeId) -> &DfaNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn endpoint(&self, index: usize) -> &Arc<Endpoint> {
        &self.endpoints[index].endpoint
    }

    fn evaluate(&self, m: &NodeMatch, path: &str, segments: &[Segment<'_>]) -> Candidate {
        let compiled = &self.endpoints[m.endpoint];
        let (values, rejections) = match capture(compiled.endpoint.pattern(), path, segments) {
            Some(values) if compiled.accepts(&values) => (values, Rejections::empty()),
            Some(values) => (values, Rejections::CONSTRAINT),
            None => (RouteValues::new(), Rejections::CONSTRAINT),
        };
        Candidate::new(compiled.endpoint.clone(), values, m.score, rejections)
    }
}

impl fmt::Debug for DfaMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DfaMatcher")
            .field("nodes", &self.nodes.len())
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}

/// One request path segment: byte range in the raw path plus decoded text.
struct Segment<'p> {
    start: usize,
    end: usize,
    text: Cow<'p, str>,
}

/// Drops a leading `/` and one trailing `/`, then splits on `/`.
fn tokenize(path: &str) -> Vec<Segment<'_>> {
    let start = usize::from(path.starts_with('/'));
    let mut end = path.len();
    if end > start && path.ends_with('/') {
        end -= 1;
    }
    if start >= end {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut offset = start;
    for raw in path[start..end].split('/') {
        segments.push(Segment {
            start: offset,
            end: offset + raw.len(),
            text: decode(raw),
        });
        offset += raw.len() + 1;
    }
    segments
}

fn decode(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

/// Extracts route values for `pattern` from the request path, then adds
/// the defaults for names outside the template.
///
/// Returns `None` when the path does not actually fit the pattern, e.g. an
/// empty required catch-all or a complex segment whose literals are absent.
fn capture(pattern: &RoutePattern, path: &str, segments: &[Segment<'_>]) -> Option<RouteValues> {
    let mut values = capture_segments(pattern, path, segments)?;
    for (name, value) in pattern.extra_defaults() {
        values.insert(name, value);
    }
    Some(values)
}

fn capture_segments(pattern: &RoutePattern, path: &str, segments: &[Segment<'_>]) -> Option<RouteValues> {
    let mut values = RouteValues::new();

    for (i, segment) in pattern.segments().iter().enumerate() {
        if let Some(parameter) = segment.as_parameter().filter(|p| p.is_catch_all()) {
            // Raw rest of the path, so a trailing '/' stays in the value.
            let remainder = match segments.get(i) {
                Some(first) => decode(&path[first.start..]),
                None => Cow::Borrowed(""),
            };
            if !remainder.is_empty() {
                values.insert(parameter.name.as_str(), remainder);
            } else if let Some(default) = &parameter.default {
                values.insert(parameter.name.as_str(), default.as_str());
            } else if !parameter.optional {
                return None;
            }
            return Some(values);
        }

        let Some(text) = segments.get(i).map(|s| s.text.as_ref()) else {
            if !pattern.is_optional_from(i) {
                return None;
            }
            for parameter in segment.parts().iter().filter_map(Part::as_parameter) {
                if let Some(default) = &parameter.default {
                    values.insert(parameter.name.as_str(), default.as_str());
                }
            }
            continue;
        };

        match segment.parts() {
            [Part::Literal(literal)] => {
                if literal.to_lowercase() != text.to_lowercase() {
                    return None;
                }
            }
            [Part::Parameter(parameter)] => {
                if text.is_empty() {
                    return None;
                }
                values.insert(parameter.name.as_str(), text);
            }
            parts => match_complex(parts, text, &mut values)?,
        }
    }

    if segments.len() > pattern.segments().len() {
        return None;
    }
    Some(values)
}

/// Matches a multi-part segment such as `{name}.{ext?}` or `file-{id}.txt`.
fn match_complex(parts: &[Part], text: &str, values: &mut RouteValues) -> Option<()> {
    if let Some(captured) = match_parts(parts, text) {
        for (name, value) in captured {
            values.insert(name, value);
        }
        return Some(());
    }

    // `{name}.{ext?}` also matches without the separator and extension.
    if let [head @ .., Part::Separator(_), Part::Parameter(last)] = parts {
        if last.is_optional() {
            let captured = match_parts(head, text)?;
            for (name, value) in captured {
                values.insert(name, value);
            }
            if let Some(default) = &last.default {
                values.insert(last.name.as_str(), default.as_str());
            }
            return Some(());
        }
    }
    None
}

/// Right-to-left scan: each literal is located at the last position that
/// leaves at least one character for the parameter to its right.
fn match_parts<'a, 't>(parts: &'a [Part], text: &'t str) -> Option<Vec<(&'a str, &'t str)>> {
    let lower = text.to_ascii_lowercase();
    let mut end = text.len();
    let mut pending: Option<&ParameterPart> = None;
    let mut captured = Vec::new();

    for part in parts.iter().rev() {
        let literal = match part {
            Part::Parameter(parameter) => {
                pending = Some(parameter);
                continue;
            }
            Part::Literal(literal) | Part::Separator(literal) => literal.to_ascii_lowercase(),
        };

        let start = match pending {
            Some(_) => lower[..end]
                .rmatch_indices(literal.as_str())
                .map(|(index, _)| index)
                .find(|index| index + literal.len() < end)?,
            None if lower[..end].ends_with(literal.as_str()) => end - literal.len(),
            None => return None,
        };

        if let Some(parameter) = pending.take() {
            captured.push((parameter.name.as_str(), &text[start + literal.len()..end]));
        }
        end = start;
    }

    match pending {
        Some(_) if end == 0 => return None,
        Some(parameter) => captured.push((parameter.name.as_str(), &text[..end])),
        None if end != 0 => return None,
        None => {}
    }

    captured.reverse();
    Some(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::constraints::ConstraintRegistry;
    use crate::routing::dfa::DfaMatcherBuilder;

    fn matcher(templates: &[&str]) -> DfaMatcher {
        let mut builder = DfaMatcherBuilder::new(ConstraintRegistry::default());
        for template in templates {
            builder.add_endpoint(Endpoint::parse(template).unwrap().build());
        }
        builder.build().unwrap()
    }

    /// Display names and values of the valid candidates for `path`.
    fn valid(matcher: &DfaMatcher, path: &str) -> Vec<(String, Vec<(String, String)>)> {
        matcher
            .candidates(path)
            .valid()
            .map(|c| {
                let values = c
                    .values()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                (c.endpoint().display_name().to_string(), values)
            })
            .collect()
    }

    fn kv(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_tokenize() {
        let texts = |path: &str| tokenize(path).iter().map(|s| s.text.to_string()).collect::<Vec<_>>();
        assert!(texts("/").is_empty());
        assert!(texts("").is_empty());
        assert_eq!(texts("/a/b/"), vec!["a", "b"]);
        assert_eq!(texts("/a//b"), vec!["a", "", "b"]);
        assert_eq!(texts("/a%20b"), vec!["a b"]);
    }

    #[test]
    fn test_literal_match_is_case_insensitive() {
        let m = matcher(&["users/list"]);
        assert_eq!(valid(&m, "/USERS/List").len(), 1);
        assert!(m.candidates("/users").is_empty());
    }

    #[test]
    fn test_literal_and_parameter_both_reachable() {
        let m = matcher(&["a/b", "a/{x}"]);
        let found = valid(&m, "/a/b");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "a/b");

        let set = m.candidates("/a/b");
        assert!(set.get(0).unwrap().score() < set.get(1).unwrap().score());
    }

    #[test]
    fn test_parameter_values_are_decoded() {
        let m = matcher(&["users/{name}"]);
        assert_eq!(
            valid(&m, "/users/J%C3%BCrgen%20K"),
            vec![("users/{name}".to_string(), kv(&[("name", "Jürgen K")]))]
        );
    }

    #[test]
    fn test_catch_all_captures_remainder() {
        let m = matcher(&["files/{*path}"]);
        assert_eq!(
            valid(&m, "/files/a/b/c"),
            vec![("files/{*path}".to_string(), kv(&[("path", "a/b/c")]))]
        );
        assert!(m.candidates("/files").is_empty());
        assert!(m.candidates("/files/").is_empty());
    }

    #[test]
    fn test_catch_all_keeps_trailing_slash() {
        let m = matcher(&["files/{*path}"]);
        assert_eq!(
            valid(&m, "/files/a/b/"),
            vec![("files/{*path}".to_string(), kv(&[("path", "a/b/")]))]
        );
        assert_eq!(valid(&m, "/files//")[0].1, kv(&[("path", "/")]));
    }

    #[test]
    fn test_extra_defaults_added_to_values() {
        let mut builder = DfaMatcherBuilder::new(ConstraintRegistry::default());
        let endpoint = Endpoint::parse("{a}/{b}/{c=cc}")
            .unwrap()
            .default_value("a", "aa")
            .unwrap()
            .default_value("d", "dd")
            .unwrap()
            .build();
        builder.add_endpoint(endpoint);
        let m = builder.build().unwrap();

        assert_eq!(
            valid(&m, "/x/y")[0].1,
            kv(&[("a", "x"), ("b", "y"), ("c", "cc"), ("d", "dd")])
        );
        assert!(m.candidates("/x").is_empty());
    }

    #[test]
    fn test_optional_catch_all_matches_parent() {
        let m = matcher(&["files/{*path?}", "docs/{*path=index}"]);
        assert_eq!(valid(&m, "/files"), vec![("files/{*path?}".to_string(), vec![])]);
        assert_eq!(
            valid(&m, "/docs"),
            vec![("docs/{*path=index}".to_string(), kv(&[("path", "index")]))]
        );
    }

    #[test]
    fn test_exit_falls_back_to_ancestor_catch_all() {
        let m = matcher(&["a/{b}/c", "a/{*rest}"]);
        assert_eq!(
            valid(&m, "/a/x/y"),
            vec![("a/{*rest}".to_string(), kv(&[("rest", "x/y")]))]
        );
        let found = valid(&m, "/a/x/c");
        assert_eq!(found[0], ("a/{b}/c".to_string(), kv(&[("b", "x")])));
        assert_eq!(found[1], ("a/{*rest}".to_string(), kv(&[("rest", "x/c")])));
    }

    #[test]
    fn test_empty_segment_never_satisfies_parameter() {
        let m = matcher(&["a/{b}/c"]);
        assert!(m.candidates("/a//c").is_empty());
    }

    #[test]
    fn test_defaults_fill_omitted_segments() {
        let m = matcher(&["{controller=Home}/{action=Index}/{id?}"]);
        assert_eq!(
            valid(&m, "/"),
            vec![(
                "{controller=Home}/{action=Index}/{id?}".to_string(),
                kv(&[("controller", "Home"), ("action", "Index")])
            )]
        );
        assert_eq!(
            valid(&m, "/Products/Edit/5")[0].1,
            kv(&[("controller", "Products"), ("action", "Edit"), ("id", "5")])
        );
    }

    #[test]
    fn test_complex_segments() {
        let m = matcher(&["files/{name}.{ext?}", "img/{w}x{h}.png"]);
        assert_eq!(
            valid(&m, "/files/archive.tar.gz")[0].1,
            kv(&[("name", "archive.tar"), ("ext", "gz")])
        );
        assert_eq!(valid(&m, "/files/readme")[0].1, kv(&[("name", "readme")]));
        assert_eq!(valid(&m, "/img/640x480.PNG")[0].1, kv(&[("w", "640"), ("h", "480")]));
        assert!(valid(&m, "/img/640x.png").is_empty());
        assert!(valid(&m, "/img/640.png").is_empty());
    }

    #[test]
    fn test_constraints_reject_without_removing() {
        let m = matcher(&["items/{id:int}"]);
        let set = m.candidates("/items/abc");
        assert_eq!(set.len(), 1);
        assert!(!set.has_valid());

        assert_eq!(
            valid(&m, "/items/42"),
            vec![("items/{id:int}".to_string(), kv(&[("id", "42")]))]
        );
    }

    #[test]
    fn test_constraint_runs_against_default() {
        let m = matcher(&["page/{n:int=first}"]);
        assert!(!m.candidates("/page").has_valid());
        assert!(m.candidates("/page/3").has_valid());
    }

    #[test]
    fn test_unmatched_path_is_empty() {
        let m = matcher(&["a/b"]);
        assert!(m.candidates("/missing").is_empty());
        assert!(m.candidates("/a/b/c").is_empty());
    }
}
