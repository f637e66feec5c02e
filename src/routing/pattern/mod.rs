//! Route patterns.
//!
//! # Data Flow
//! ```text
//! template text ("api/[controller]/{id:int}")
//!     → tokens.rs (replace [token] placeholders)
//!     → parser.rs (segments, parts, parameters)
//!     → RoutePattern (immutable, shared by the endpoint)
//!     → format.rs (route values back into a path)
//! ```
//!
//! # Design Decisions
//! - Parsing validates everything it can; constraints are only resolved
//!   against the registry when the matcher is built
//! - Positions in errors are byte offsets into the template text

mod format;
mod parser;
pub mod tokens;

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

pub use format::FormatError;
pub use parser::{PatternError, PatternErrorKind};

use crate::routing::values::RouteValues;

/// A parsed route template.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<PathSegment>,
    precedence: Precedence,
    /// Defaults for names that are not template parameters.
    extra_defaults: Vec<(String, String)>,
    /// Constraints on names that are not template parameters.
    extra_constraints: Vec<(String, ConstraintReference)>,
}

/// A default or constraint supplied next to the template that cannot be
/// merged into it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExplicitValueError {
    #[error("parameter '{name}' has an inline default '{inline}' and a different explicit default '{explicit}'")]
    ConflictingDefault {
        name: String,
        inline: String,
        explicit: String,
    },

    #[error("optional parameter '{0}' cannot have a default value")]
    OptionalWithDefault(String),

    #[error("constraint '{constraint}' for '{name}' is malformed")]
    InvalidConstraint { name: String, constraint: String },
}

impl RoutePattern {
    /// Parse a template string.
    pub fn parse(template: &str) -> Result<Self, PatternError> {
        parser::parse(template)
    }

    pub(crate) fn from_segments(raw: String, segments: Vec<PathSegment>) -> Self {
        let precedence = Precedence::compute(&segments);
        Self {
            raw,
            segments,
            precedence,
            extra_defaults: Vec::new(),
            extra_constraints: Vec::new(),
        }
    }

    /// Adds a default outside the template text.
    ///
    /// A default for a parameter makes it optional, exactly like `{name=value}`.
    /// A default for any other name is still added to the route values of
    /// every match.
    pub fn with_default(mut self, name: &str, value: impl Into<String>) -> Result<Self, ExplicitValueError> {
        let value = value.into();
        let Some(parameter) = self.parameter_mut(name) else {
            match self.extra_defaults.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
                Some((_, existing)) => *existing = value,
                None => self.extra_defaults.push((name.to_string(), value)),
            }
            return Ok(self);
        };

        if parameter.optional {
            return Err(ExplicitValueError::OptionalWithDefault(parameter.name.clone()));
        }
        if let Some(inline) = parameter.default.as_ref().filter(|inline| **inline != value) {
            return Err(ExplicitValueError::ConflictingDefault {
                name: parameter.name.clone(),
                inline: inline.clone(),
                explicit: value,
            });
        }
        parameter.default = Some(value);
        Ok(self)
    }

    /// Adds constraints outside the template text, written the way they
    /// appear inline (`int`, `range(1,10)`, `int:min(1)`).
    pub fn with_constraint(mut self, name: &str, constraint: &str) -> Result<Self, ExplicitValueError> {
        let references =
            parser::parse_constraint_list(constraint).ok_or_else(|| ExplicitValueError::InvalidConstraint {
                name: name.to_string(),
                constraint: constraint.to_string(),
            })?;

        match self.parameter_mut(name) {
            Some(parameter) => {
                parameter.constraints.extend(references);
                self.precedence = Precedence::compute(&self.segments);
            }
            None => self
                .extra_constraints
                .extend(references.into_iter().map(|reference| (name.to_string(), reference))),
        }
        Ok(self)
    }

    /// The template text this pattern was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn precedence(&self) -> &Precedence {
        &self.precedence
    }

    /// All parameters in template order.
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterPart> {
        self.segments
            .iter()
            .flat_map(|segment| segment.parts.iter())
            .filter_map(Part::as_parameter)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterPart> {
        self.parameters()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn parameter_mut(&mut self, name: &str) -> Option<&mut ParameterPart> {
        self.segments
            .iter_mut()
            .flat_map(|segment| segment.parts.iter_mut())
            .find_map(|part| match part {
                Part::Parameter(parameter) if parameter.name.eq_ignore_ascii_case(name) => Some(parameter),
                _ => None,
            })
    }

    /// Every default: parameter defaults in template order, then the
    /// defaults for names outside the template.
    pub fn defaults(&self) -> RouteValues {
        self.parameters()
            .filter_map(|p| p.default.as_deref().map(|value| (p.name.as_str(), value)))
            .chain(self.extra_defaults())
            .collect()
    }

    /// Defaults for names that do not appear in the template.
    pub fn extra_defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extra_defaults
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Constraints on names that do not appear in the template.
    pub fn extra_constraints(&self) -> impl Iterator<Item = (&str, &ConstraintReference)> {
        self.extra_constraints
            .iter()
            .map(|(name, reference)| (name.as_str(), reference))
    }

    /// The trailing catch-all parameter, if any.
    pub fn catch_all(&self) -> Option<&ParameterPart> {
        self.segments
            .last()
            .and_then(|segment| segment.parts.last())
            .and_then(Part::as_parameter)
            .filter(|p| p.is_catch_all())
    }

    /// True when every segment from `depth` onwards may be omitted from a
    /// request path.
    pub fn is_optional_from(&self, depth: usize) -> bool {
        self.segments
            .iter()
            .skip(depth)
            .all(PathSegment::is_optional)
    }

    /// Whether two patterns route exactly the same paths to the same
    /// parameter positions, ignoring parameter names.
    pub fn is_structurally_equal(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.is_structurally_equal(b))
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One `/`-delimited segment of a pattern.
#[derive(Debug, Clone)]
pub struct PathSegment {
    parts: Vec<Part>,
}

impl PathSegment {
    pub(crate) fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// A simple segment holds exactly one part.
    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1
    }

    /// The literal text when the segment is a single literal.
    pub fn as_literal(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [Part::Literal(text)] => Some(text),
            _ => None,
        }
    }

    /// The parameter when the segment is a single parameter.
    pub fn as_parameter(&self) -> Option<&ParameterPart> {
        match self.parts.as_slice() {
            [Part::Parameter(parameter)] => Some(parameter),
            _ => None,
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.as_parameter().map_or(false, ParameterPart::is_catch_all)
    }

    fn is_optional(&self) -> bool {
        self.as_parameter().map_or(false, ParameterPart::is_optional)
    }

    fn is_structurally_equal(&self, other: &PathSegment) -> bool {
        self.parts.len() == other.parts.len()
            && self.parts.iter().zip(&other.parts).all(|pair| match pair {
                (Part::Literal(a), Part::Literal(b)) => a.eq_ignore_ascii_case(b),
                (Part::Separator(a), Part::Separator(b)) => a == b,
                (Part::Parameter(a), Part::Parameter(b)) => {
                    a.is_catch_all() == b.is_catch_all()
                        && a.is_optional() == b.is_optional()
                        && a.constraints == b.constraints
                }
                _ => false,
            })
    }
}

/// A piece of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    /// A literal that may be dropped together with a following optional
    /// parameter, as in `{name}.{ext?}`.
    Separator(String),
    Parameter(ParameterPart),
}

impl Part {
    pub fn as_parameter(&self) -> Option<&ParameterPart> {
        match self {
            Part::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }
}

/// How a catch-all treats `/` when a link is generated from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchAll {
    /// `{*name}`: slashes in the value are percent-encoded.
    EncodeSlashes,
    /// `{**name}`: slashes in the value are written as-is.
    KeepSlashes,
}

/// A `{...}` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPart {
    pub name: String,
    pub default: Option<String>,
    pub constraints: Vec<ConstraintReference>,
    /// Marked with a trailing `?`.
    pub optional: bool,
    pub catch_all: Option<CatchAll>,
}

impl ParameterPart {
    /// Optional either explicitly or through a default value.
    pub fn is_optional(&self) -> bool {
        self.optional || self.default.is_some()
    }

    pub fn is_catch_all(&self) -> bool {
        self.catch_all.is_some()
    }
}

/// A constraint as written in the template, e.g. `range(1,10)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintReference {
    pub name: String,
    pub argument: Option<String>,
}

impl fmt::Display for ConstraintReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(argument) => write!(f, "{}({})", self.name, argument),
            None => f.write_str(&self.name),
        }
    }
}

/// Inbound route precedence: one digit per segment, lower is more specific.
///
/// Digits are compared as the fractional digits of a decimal number, so a
/// missing trailing digit compares as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precedence(Vec<u8>);

impl Precedence {
    fn compute(segments: &[PathSegment]) -> Self {
        Self(segments.iter().map(Self::digit).collect())
    }

    fn digit(segment: &PathSegment) -> u8 {
        let parameter = match segment.parts.as_slice() {
            [Part::Literal(_)] | [Part::Separator(_)] => return 1,
            [Part::Parameter(parameter)] => parameter,
            _ => return 2,
        };

        let digit = if parameter.is_catch_all() { 5 } else { 3 };
        if parameter.constraints.is_empty() {
            digit
        } else {
            digit - 1
        }
    }

    pub fn digits(&self) -> &[u8] {
        &self.0
    }
}

impl Ord for Precedence {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Precedence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn precedence(template: &str) -> Precedence {
        RoutePattern::parse(template).unwrap().precedence().clone()
    }

    #[test]
    fn test_literal_more_specific_than_parameter() {
        assert!(precedence("a/b") < precedence("a/{x}"));
        assert!(precedence("a/{x:int}") < precedence("a/{x}"));
        assert!(precedence("a/{x}") < precedence("a/{*rest}"));
        assert!(precedence("a/{x}.txt") < precedence("a/{x}"));
    }

    #[test]
    fn test_identical_structure_has_equal_precedence() {
        assert_eq!(precedence("{x}"), precedence("{y}"));
        assert_eq!(
            precedence("a").cmp(&precedence("a/")),
            Ordering::Equal
        );
    }

    #[test]
    fn test_optional_from() {
        let pattern = RoutePattern::parse("{controller=Home}/{action=Index}/{id?}").unwrap();
        assert!(pattern.is_optional_from(0));

        let pattern = RoutePattern::parse("files/{*path}").unwrap();
        assert!(!pattern.is_optional_from(1));

        let pattern = RoutePattern::parse("files/{*path?}").unwrap();
        assert!(pattern.is_optional_from(1));
    }

    #[test]
    fn test_explicit_default_makes_parameter_optional() {
        let pattern = RoutePattern::parse("{a}/{b}/{c=cc}")
            .unwrap()
            .with_default("A", "aa")
            .unwrap()
            .with_default("d", "dd")
            .unwrap()
            .with_default("c", "cc")
            .unwrap();

        assert_eq!(pattern.parameter("a").unwrap().default.as_deref(), Some("aa"));
        assert!(!pattern.is_optional_from(1));
        assert!(pattern.is_optional_from(2));
        assert_eq!(pattern.extra_defaults().collect::<Vec<_>>(), vec![("d", "dd")]);

        let defaults = pattern.defaults();
        assert_eq!(defaults.get("a"), Some("aa"));
        assert_eq!(defaults.get("c"), Some("cc"));
        assert_eq!(defaults.get("d"), Some("dd"));
        assert_eq!(defaults.get("b"), None);
    }

    #[test]
    fn test_explicit_default_conflicts() {
        let conflict = RoutePattern::parse("{c=cc}").unwrap().with_default("c", "other").unwrap_err();
        assert!(matches!(conflict, ExplicitValueError::ConflictingDefault { .. }));

        let optional = RoutePattern::parse("{id?}").unwrap().with_default("id", "1").unwrap_err();
        assert_eq!(optional, ExplicitValueError::OptionalWithDefault("id".into()));
    }

    #[test]
    fn test_explicit_constraints() {
        let pattern = RoutePattern::parse("a/{x}")
            .unwrap()
            .with_constraint("x", "int:min(1)")
            .unwrap()
            .with_constraint("tenant", "alpha")
            .unwrap();

        let x = pattern.parameter("x").unwrap();
        assert_eq!(x.constraints.len(), 2);
        assert_eq!(x.constraints[1].argument.as_deref(), Some("1"));
        assert_eq!(pattern.precedence(), &precedence("a/{x:int}"));

        let extra: Vec<(&str, String)> = pattern
            .extra_constraints()
            .map(|(name, reference)| (name, reference.to_string()))
            .collect();
        assert_eq!(extra, vec![("tenant", "alpha".to_string())]);

        assert!(RoutePattern::parse("{x}").unwrap().with_constraint("x", "int=5").is_err());
        assert!(RoutePattern::parse("{x}").unwrap().with_constraint("x", "").is_err());
    }

    #[test]
    fn test_structural_equality_ignores_names() {
        let a = RoutePattern::parse("users/{id}").unwrap();
        let b = RoutePattern::parse("Users/{name}").unwrap();
        let c = RoutePattern::parse("users/{id:int}").unwrap();

        assert!(a.is_structurally_equal(&b));
        assert!(!a.is_structurally_equal(&c));
    }
}
