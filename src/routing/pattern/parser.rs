//! Route template parser.
//!
//! # Syntax
//! ```text
//! template   := ["/" | "~/"] segment ("/" segment)* ["/"]
//! segment    := (literal | parameter)+
//! parameter  := "{" ["*" | "**"] name (":" constraint)* ["=" default] ["?"] "}"
//! constraint := name ["(" argument ")"]
//! ```
//! `{{` and `}}` escape braces, both in literals and inside parameters.

use thiserror::Error;

use super::{CatchAll, ConstraintReference, ParameterPart, Part, PathSegment, RoutePattern};

/// A template that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid route template '{template}' at position {position}: {kind}")]
pub struct PatternError {
    pub template: String,
    /// Byte offset of the offending character.
    pub position: usize,
    pub kind: PatternErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternErrorKind {
    #[error("a leading '~' must be followed by '/'")]
    InvalidTilde,

    #[error("the separator '/' cannot appear consecutively")]
    ConsecutiveSeparators,

    #[error("literal section '{0}' cannot contain the '?' character")]
    QuestionMarkInLiteral(String),

    #[error("unbalanced '{{' or '}}'; use '{{{{' or '}}}}' to escape a brace")]
    MismatchedBraces,

    #[error("parameter is not closed with '}}'")]
    UnterminatedParameter,

    #[error("parameter name '{0}' is invalid; names must be non-empty and cannot contain '{{', '}}', '/', '?' or '*'")]
    InvalidParameterName(String),

    #[error("parameter name '{0}' appears more than once")]
    DuplicateParameter(String),

    #[error("constraint '{0}' is malformed")]
    InvalidConstraint(String),

    #[error("optional parameter '{0}' cannot have a default value")]
    OptionalWithDefault(String),

    #[error("only one catch-all parameter is allowed")]
    MultipleCatchAll,

    #[error("catch-all parameter '{0}' must be the last segment")]
    CatchAllNotLast(String),

    #[error("catch-all parameter '{0}' cannot be part of a segment with other text")]
    CatchAllInComplexSegment(String),

    #[error("a segment cannot contain two consecutive parameters")]
    ConsecutiveParameters,

    #[error("optional parameter '{0}' must be at the end of its segment")]
    OptionalNotLast(String),

    #[error("optional parameter '{name}' is preceded by '{preceding}'; only a period may precede an optional parameter")]
    OptionalNotAfterPeriod { name: String, preceding: String },
}

struct Located {
    part: Part,
    position: usize,
}

struct Parser<'a> {
    template: &'a str,
    chars: Vec<(usize, char)>,
    index: usize,
}

pub(super) fn parse(template: &str) -> Result<RoutePattern, PatternError> {
    Parser::new(template).parse()
}

impl<'a> Parser<'a> {
    fn new(template: &'a str) -> Self {
        Self {
            template,
            chars: template.char_indices().collect(),
            index: 0,
        }
    }

    fn error(&self, position: usize, kind: PatternErrorKind) -> PatternError {
        PatternError {
            template: self.template.to_string(),
            position,
            kind,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).map(|&(_, c)| c)
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).map(|&(_, c)| c)
    }

    fn position(&self) -> usize {
        self.chars
            .get(self.index)
            .map_or(self.template.len(), |&(p, _)| p)
    }

    fn parse(mut self) -> Result<RoutePattern, PatternError> {
        if self.template.starts_with("~/") {
            self.index = 2;
        } else if self.template.starts_with('~') {
            return Err(self.error(0, PatternErrorKind::InvalidTilde));
        } else if self.template.starts_with('/') {
            self.index = 1;
        }

        let mut segments: Vec<Vec<Located>> = Vec::new();
        while self.index < self.chars.len() {
            let start = self.position();
            let parts = self.parse_segment()?;

            if parts.is_empty() {
                if self.index >= self.chars.len() && !segments.is_empty() {
                    // single trailing slash
                    break;
                }
                return Err(self.error(start, PatternErrorKind::ConsecutiveSeparators));
            }

            segments.push(self.validate_segment(parts)?);

            if self.peek() == Some('/') {
                self.index += 1;
                if self.index >= self.chars.len() {
                    break;
                }
            }
        }

        self.validate_pattern(&segments)?;

        let segments = segments
            .into_iter()
            .map(|parts| PathSegment::new(parts.into_iter().map(|p| p.part).collect()))
            .collect();
        Ok(RoutePattern::from_segments(self.template.to_string(), segments))
    }

    /// Reads parts until the next '/' (not consumed) or the end.
    fn parse_segment(&mut self) -> Result<Vec<Located>, PatternError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut literal_start = self.position();

        while let Some(c) = self.peek() {
            match c {
                '/' => break,
                '{' if self.peek_next() == Some('{') => {
                    literal.push('{');
                    self.index += 2;
                }
                '}' if self.peek_next() == Some('}') => {
                    literal.push('}');
                    self.index += 2;
                }
                '{' => {
                    self.flush_literal(&mut parts, &mut literal, literal_start)?;
                    let position = self.position();
                    let parameter = self.parse_parameter()?;
                    parts.push(Located {
                        part: Part::Parameter(parameter),
                        position,
                    });
                    literal_start = self.position();
                }
                '}' => {
                    return Err(self.error(self.position(), PatternErrorKind::MismatchedBraces));
                }
                c => {
                    literal.push(c);
                    self.index += 1;
                }
            }
        }

        self.flush_literal(&mut parts, &mut literal, literal_start)?;
        Ok(parts)
    }

    fn flush_literal(
        &self,
        parts: &mut Vec<Located>,
        literal: &mut String,
        position: usize,
    ) -> Result<(), PatternError> {
        if literal.is_empty() {
            return Ok(());
        }
        if literal.contains('?') {
            return Err(self.error(
                position,
                PatternErrorKind::QuestionMarkInLiteral(literal.clone()),
            ));
        }
        parts.push(Located {
            part: Part::Literal(std::mem::take(literal)),
            position,
        });
        Ok(())
    }

    /// Reads `{...}` starting at the opening brace.
    fn parse_parameter(&mut self) -> Result<ParameterPart, PatternError> {
        let open = self.position();
        self.index += 1;

        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error(open, PatternErrorKind::UnterminatedParameter)),
                Some('{') if self.peek_next() == Some('{') => {
                    text.push('{');
                    self.index += 2;
                }
                Some('{') => {
                    return Err(self.error(self.position(), PatternErrorKind::MismatchedBraces));
                }
                Some('}') if self.peek_next() == Some('}') => {
                    text.push('}');
                    self.index += 2;
                }
                Some('}') => {
                    self.index += 1;
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.index += 1;
                }
            }
        }

        parse_parameter_text(&text).map_err(|kind| self.error(open, kind))
    }

    fn validate_segment(&self, mut parts: Vec<Located>) -> Result<Vec<Located>, PatternError> {
        if parts.len() == 1 {
            return Ok(parts);
        }

        for i in 0..parts.len() {
            let Part::Parameter(parameter) = &parts[i].part else {
                continue;
            };

            if parameter.is_catch_all() {
                return Err(self.error(
                    parts[i].position,
                    PatternErrorKind::CatchAllInComplexSegment(parameter.name.clone()),
                ));
            }

            if let Some(Located {
                part: Part::Parameter(_),
                position,
            }) = parts.get(i + 1)
            {
                return Err(self.error(*position, PatternErrorKind::ConsecutiveParameters));
            }

            if parameter.optional {
                if i + 1 != parts.len() {
                    return Err(self.error(
                        parts[i].position,
                        PatternErrorKind::OptionalNotLast(parameter.name.clone()),
                    ));
                }
                let name = parameter.name.clone();
                let preceding = &mut parts[i - 1];
                match &preceding.part {
                    Part::Literal(text) if text == "." => {
                        preceding.part = Part::Separator(".".to_string());
                    }
                    Part::Literal(text) => {
                        return Err(self.error(
                            preceding.position,
                            PatternErrorKind::OptionalNotAfterPeriod {
                                name,
                                preceding: text.clone(),
                            },
                        ));
                    }
                    _ => return Err(self.error(preceding.position, PatternErrorKind::ConsecutiveParameters)),
                }
            }
        }

        Ok(parts)
    }

    fn validate_pattern(&self, segments: &[Vec<Located>]) -> Result<(), PatternError> {
        let last_segment = segments.len().saturating_sub(1);
        let parameters = segments.iter().enumerate().flat_map(|(index, parts)| {
            parts.iter().filter_map(move |located| match &located.part {
                Part::Parameter(parameter) => Some((index, located.position, parameter)),
                _ => None,
            })
        });

        let mut seen: Vec<&str> = Vec::new();
        let mut catch_alls = Vec::new();
        for (index, position, parameter) in parameters {
            if seen.iter().any(|name| name.eq_ignore_ascii_case(&parameter.name)) {
                return Err(self.error(
                    position,
                    PatternErrorKind::DuplicateParameter(parameter.name.clone()),
                ));
            }
            seen.push(&parameter.name);

            if parameter.is_catch_all() {
                catch_alls.push((index, position, parameter));
            }
        }

        match catch_alls.as_slice() {
            [] => Ok(()),
            [(index, position, parameter)] if *index != last_segment => Err(self.error(
                *position,
                PatternErrorKind::CatchAllNotLast(parameter.name.clone()),
            )),
            [_] => Ok(()),
            [_, (_, position, _), ..] => {
                Err(self.error(*position, PatternErrorKind::MultipleCatchAll))
            }
        }
    }
}

/// Parses the text between the braces of a parameter.
fn parse_parameter_text(text: &str) -> Result<ParameterPart, PatternErrorKind> {
    let (catch_all, mut rest) = if let Some(rest) = text.strip_prefix("**") {
        (Some(CatchAll::KeepSlashes), rest)
    } else if let Some(rest) = text.strip_prefix('*') {
        (Some(CatchAll::EncodeSlashes), rest)
    } else {
        (None, text)
    };

    let optional = rest.ends_with('?');
    if optional {
        rest = &rest[..rest.len() - 1];
    }

    let name_end = rest.find([':', '=']).unwrap_or(rest.len());
    let name = &rest[..name_end];
    if name.is_empty() || name.contains(['{', '}', '/', '?', '*']) {
        return Err(PatternErrorKind::InvalidParameterName(name.to_string()));
    }
    rest = &rest[name_end..];

    let mut constraints = Vec::new();
    while let Some(after_colon) = rest.strip_prefix(':') {
        let (constraint, remaining) = parse_constraint(after_colon)?;
        constraints.push(constraint);
        rest = remaining;
    }

    let default = rest.strip_prefix('=').map(str::to_string);
    if optional && default.is_some() {
        return Err(PatternErrorKind::OptionalWithDefault(name.to_string()));
    }

    Ok(ParameterPart {
        name: name.to_string(),
        default,
        constraints,
        optional,
        catch_all,
    })
}

/// Parses constraints given outside a template, e.g. `int:min(1)`.
pub(super) fn parse_constraint_list(text: &str) -> Option<Vec<ConstraintReference>> {
    let mut constraints = Vec::new();
    let mut rest = text;
    loop {
        let (constraint, remaining) = parse_constraint(rest).ok()?;
        constraints.push(constraint);
        match remaining.strip_prefix(':') {
            Some(next) => rest = next,
            None if remaining.is_empty() => return Some(constraints),
            None => return None,
        }
    }
}

/// Parses one constraint; returns it with the unconsumed remainder.
///
/// An argument runs to the first ')' that is followed by ':', '=' or the
/// end, so arguments may themselves contain parentheses.
fn parse_constraint(text: &str) -> Result<(ConstraintReference, &str), PatternErrorKind> {
    let name_end = text.find(['(', ':', '=']).unwrap_or(text.len());
    let name = &text[..name_end];
    if name.is_empty() {
        return Err(PatternErrorKind::InvalidConstraint(text.to_string()));
    }

    let rest = &text[name_end..];
    if !rest.starts_with('(') {
        let constraint = ConstraintReference {
            name: name.to_string(),
            argument: None,
        };
        return Ok((constraint, rest));
    }

    let close = rest
        .char_indices()
        .filter(|&(_, c)| c == ')')
        .map(|(i, _)| i)
        .find(|&i| matches!(rest[i + 1..].chars().next(), None | Some(':') | Some('=')))
        .ok_or_else(|| PatternErrorKind::InvalidConstraint(text.to_string()))?;

    let constraint = ConstraintReference {
        name: name.to_string(),
        argument: Some(rest[1..close].to_string()),
    };
    Ok((constraint, &rest[close + 1..]))
}
