//! Parameter constraints.
//!
//! # Responsibilities
//! - Define the [`ParameterPolicy`] predicate applied to captured values
//! - Provide the built-in constraints (`int`, `guid`, `range(1,10)`, ...)
//! - Resolve constraint references from templates through a registry
//!
//! # Design Decisions
//! - Resolution happens once, when the matcher is built; unknown names and
//!   bad arguments fail the build
//! - Constraint names are case-insensitive
//! - Policies are pure predicates over the decoded value

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::routing::pattern::ConstraintReference;

/// A predicate over a single route value.
pub trait ParameterPolicy: Send + Sync {
    fn matches(&self, value: &str) -> bool;
}

impl<F> ParameterPolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, value: &str) -> bool {
        self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("unknown constraint '{0}'")]
    Unknown(String),

    #[error("constraint '{0}' requires an argument")]
    MissingArgument(String),

    #[error("constraint '{0}' does not take an argument")]
    UnexpectedArgument(String),

    #[error("invalid argument '{argument}' for constraint '{name}': {reason}")]
    InvalidArgument {
        name: String,
        argument: String,
        reason: String,
    },
}

/// Builds a policy from the optional argument text of a reference.
pub type ConstraintFactory =
    Arc<dyn Fn(Option<&str>) -> Result<Arc<dyn ParameterPolicy>, ConstraintError> + Send + Sync>;

/// Maps constraint names to factories.
#[derive(Clone)]
pub struct ConstraintRegistry {
    factories: HashMap<String, ConstraintFactory>,
}

impl ConstraintRegistry {
    /// A registry without any constraints.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) a constraint factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Option<&str>) -> Result<Arc<dyn ParameterPolicy>, ConstraintError> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into().to_ascii_lowercase(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Resolve a template reference into a policy.
    pub fn resolve(&self, reference: &ConstraintReference) -> Result<Arc<dyn ParameterPolicy>, ConstraintError> {
        let factory = self
            .factories
            .get(&reference.name.to_ascii_lowercase())
            .ok_or_else(|| ConstraintError::Unknown(reference.name.clone()))?;
        factory(reference.argument.as_deref())
    }

    fn register_builtin(&mut self, name: &'static str, build: fn(&'static str, Option<&str>) -> Result<Builtin, ConstraintError>) {
        self.register(name, move |argument| {
            build(name, argument).map(|policy| Arc::new(policy) as Arc<dyn ParameterPolicy>)
        });
    }
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.register_builtin("int", |name, arg| no_argument(name, arg, Builtin::Int));
        registry.register_builtin("long", |name, arg| no_argument(name, arg, Builtin::Long));
        registry.register_builtin("bool", |name, arg| no_argument(name, arg, Builtin::Bool));
        registry.register_builtin("datetime", |name, arg| no_argument(name, arg, Builtin::DateTime));
        registry.register_builtin("decimal", |name, arg| no_argument(name, arg, Builtin::Decimal));
        registry.register_builtin("double", |name, arg| no_argument(name, arg, Builtin::Double));
        registry.register_builtin("float", |name, arg| no_argument(name, arg, Builtin::Float));
        registry.register_builtin("guid", |name, arg| no_argument(name, arg, Builtin::Guid));
        registry.register_builtin("alpha", |name, arg| no_argument(name, arg, Builtin::Alpha));
        registry.register_builtin("required", |name, arg| no_argument(name, arg, Builtin::Required));
        registry.register_builtin("file", |name, arg| no_argument(name, arg, Builtin::File));
        registry.register_builtin("nonfile", |name, arg| no_argument(name, arg, Builtin::NonFile));

        registry.register_builtin("min", |name, arg| {
            let [min] = arguments::<i64, 1>(name, arg)?;
            Ok(Builtin::Min(min))
        });
        registry.register_builtin("max", |name, arg| {
            let [max] = arguments::<i64, 1>(name, arg)?;
            Ok(Builtin::Max(max))
        });
        registry.register_builtin("range", |name, arg| {
            let [min, max] = arguments::<i64, 2>(name, arg)?;
            ordered(name, arg, min, max)?;
            Ok(Builtin::Range(min, max))
        });
        registry.register_builtin("minlength", |name, arg| {
            let [min] = arguments::<usize, 1>(name, arg)?;
            Ok(Builtin::Length(min, usize::MAX))
        });
        registry.register_builtin("maxlength", |name, arg| {
            let [max] = arguments::<usize, 1>(name, arg)?;
            Ok(Builtin::Length(0, max))
        });
        registry.register_builtin("length", |name, arg| {
            let text = arg.ok_or_else(|| ConstraintError::MissingArgument(name.to_string()))?;
            if text.contains(',') {
                let [min, max] = arguments::<usize, 2>(name, arg)?;
                ordered(name, arg, min, max)?;
                Ok(Builtin::Length(min, max))
            } else {
                let [exact] = arguments::<usize, 1>(name, arg)?;
                Ok(Builtin::Length(exact, exact))
            }
        });
        registry.register_builtin("regex", |name, arg| {
            let pattern = arg.ok_or_else(|| ConstraintError::MissingArgument(name.to_string()))?;
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(Builtin::Regex)
                .map_err(|e| ConstraintError::InvalidArgument {
                    name: name.to_string(),
                    argument: pattern.to_string(),
                    reason: e.to_string(),
                })
        });

        registry
    }
}

impl fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ConstraintRegistry").field("constraints", &names).finish()
    }
}

fn no_argument(name: &str, argument: Option<&str>, policy: Builtin) -> Result<Builtin, ConstraintError> {
    match argument {
        Some(_) => Err(ConstraintError::UnexpectedArgument(name.to_string())),
        None => Ok(policy),
    }
}

/// Parses exactly `N` comma separated arguments.
fn arguments<T, const N: usize>(name: &str, argument: Option<&str>) -> Result<[T; N], ConstraintError>
where
    T: std::str::FromStr + Copy + Default,
    T::Err: fmt::Display,
{
    let text = argument.ok_or_else(|| ConstraintError::MissingArgument(name.to_string()))?;
    let invalid = |reason: String| ConstraintError::InvalidArgument {
        name: name.to_string(),
        argument: text.to_string(),
        reason,
    };

    let pieces: Vec<&str> = text.split(',').map(str::trim).collect();
    if pieces.len() != N {
        return Err(invalid(format!("expected {} value(s), found {}", N, pieces.len())));
    }

    let mut values = [T::default(); N];
    for (slot, piece) in values.iter_mut().zip(pieces) {
        *slot = piece.parse().map_err(|e: T::Err| invalid(e.to_string()))?;
    }
    Ok(values)
}

fn ordered<T: PartialOrd>(name: &str, argument: Option<&str>, min: T, max: T) -> Result<(), ConstraintError> {
    if min > max {
        return Err(ConstraintError::InvalidArgument {
            name: name.to_string(),
            argument: argument.unwrap_or_default().to_string(),
            reason: "minimum is greater than maximum".to_string(),
        });
    }
    Ok(())
}

/// The constraints available in every default registry.
#[derive(Debug)]
enum Builtin {
    Int,
    Long,
    Bool,
    DateTime,
    Decimal,
    Double,
    Float,
    Guid,
    Alpha,
    Required,
    File,
    NonFile,
    Min(i64),
    Max(i64),
    Range(i64, i64),
    /// Inclusive bounds on the number of characters.
    Length(usize, usize),
    Regex(Regex),
}

impl ParameterPolicy for Builtin {
    fn matches(&self, value: &str) -> bool {
        match self {
            Builtin::Int => value.parse::<i32>().is_ok(),
            Builtin::Long => value.parse::<i64>().is_ok(),
            Builtin::Bool => value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false"),
            Builtin::DateTime => is_datetime(value),
            Builtin::Decimal | Builtin::Double => value.parse::<f64>().map_or(false, f64::is_finite),
            Builtin::Float => value.parse::<f32>().map_or(false, f32::is_finite),
            Builtin::Guid => uuid::Uuid::parse_str(value).is_ok(),
            Builtin::Alpha => value.chars().all(|c| c.is_ascii_alphabetic()),
            Builtin::Required => !value.is_empty(),
            Builtin::File => is_file_name(value),
            Builtin::NonFile => !is_file_name(value),
            Builtin::Min(min) => value.parse::<i64>().map_or(false, |v| v >= *min),
            Builtin::Max(max) => value.parse::<i64>().map_or(false, |v| v <= *max),
            Builtin::Range(min, max) => value.parse::<i64>().map_or(false, |v| (*min..=*max).contains(&v)),
            Builtin::Length(min, max) => (*min..=*max).contains(&value.chars().count()),
            Builtin::Regex(regex) => regex.is_match(value),
        }
    }
}

fn is_datetime(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDate::parse_from_str(value, "%m/%d/%Y").is_ok()
}

/// A file name has a non-empty extension in its last path segment.
fn is_file_name(value: &str) -> bool {
    let last = value.rsplit('/').next().unwrap_or(value);
    match last.rfind('.') {
        Some(dot) => dot + 1 < last.len(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(name: &str, argument: Option<&str>) -> Arc<dyn ParameterPolicy> {
        let reference = ConstraintReference {
            name: name.to_string(),
            argument: argument.map(str::to_string),
        };
        ConstraintRegistry::default().resolve(&reference).unwrap()
    }

    fn resolve_err(name: &str, argument: Option<&str>) -> ConstraintError {
        let reference = ConstraintReference {
            name: name.to_string(),
            argument: argument.map(str::to_string),
        };
        match ConstraintRegistry::default().resolve(&reference) {
            Ok(_) => panic!("expected {} to fail", name),
            Err(e) => e,
        }
    }

    #[test]
    fn test_type_constraints() {
        assert!(policy("int", None).matches("42"));
        assert!(policy("int", None).matches("-7"));
        assert!(!policy("int", None).matches("abc"));
        assert!(!policy("int", None).matches("9999999999"));
        assert!(policy("long", None).matches("9999999999"));
        assert!(policy("bool", None).matches("TRUE"));
        assert!(!policy("bool", None).matches("yes"));
        assert!(policy("guid", None).matches("6f9619ff-8b86-d011-b42d-00cf4fc964ff"));
        assert!(!policy("guid", None).matches("not-a-guid"));
        assert!(policy("double", None).matches("3.25"));
        assert!(!policy("double", None).matches("NaN"));
        assert!(policy("datetime", None).matches("2024-02-29"));
        assert!(policy("datetime", None).matches("2024-02-29T10:00:00Z"));
        assert!(!policy("datetime", None).matches("2023-02-29"));
        assert!(policy("alpha", None).matches("abcXYZ"));
        assert!(!policy("alpha", None).matches("abc1"));
    }

    #[test]
    fn test_numeric_and_length_constraints() {
        assert!(policy("min", Some("10")).matches("10"));
        assert!(!policy("min", Some("10")).matches("9"));
        assert!(policy("max", Some("10")).matches("-3"));
        assert!(policy("range", Some("1, 5")).matches("5"));
        assert!(!policy("range", Some("1,5")).matches("6"));
        assert!(policy("length", Some("3")).matches("abc"));
        assert!(!policy("length", Some("3")).matches("abcd"));
        assert!(policy("length", Some("2,4")).matches("abcd"));
        assert!(policy("minlength", Some("2")).matches("ab"));
        assert!(!policy("maxlength", Some("2")).matches("abc"));
    }

    #[test]
    fn test_regex_is_case_insensitive() {
        let policy = policy("regex", Some("^[a-z]+-\\d+$"));
        assert!(policy.matches("ABC-12"));
        assert!(!policy.matches("abc"));
    }

    #[test]
    fn test_file_constraints() {
        assert!(policy("file", None).matches("docs/readme.md"));
        assert!(!policy("file", None).matches("docs.d/readme"));
        assert!(policy("nonfile", None).matches("docs"));
    }

    #[test]
    fn test_names_are_case_insensitive() {
        assert!(policy("INT", None).matches("1"));
    }

    #[test]
    fn test_resolution_errors() {
        assert_eq!(resolve_err("slug", None), ConstraintError::Unknown("slug".into()));
        assert_eq!(resolve_err("int", Some("5")), ConstraintError::UnexpectedArgument("int".into()));
        assert_eq!(resolve_err("min", None), ConstraintError::MissingArgument("min".into()));
        assert!(matches!(resolve_err("range", Some("5,1")), ConstraintError::InvalidArgument { .. }));
        assert!(matches!(resolve_err("range", Some("1")), ConstraintError::InvalidArgument { .. }));
        assert!(matches!(resolve_err("regex", Some("(")), ConstraintError::InvalidArgument { .. }));
    }

    #[test]
    fn test_custom_constraint() {
        let mut registry = ConstraintRegistry::default();
        registry.register("even", |_| {
            Ok(Arc::new(|value: &str| value.parse::<u32>().map_or(false, |n| n % 2 == 0))
                as Arc<dyn ParameterPolicy>)
        });

        let reference = ConstraintReference {
            name: "Even".into(),
            argument: None,
        };
        let policy = registry.resolve(&reference).unwrap();
        assert!(policy.matches("4"));
        assert!(!policy.matches("3"));
    }
}
