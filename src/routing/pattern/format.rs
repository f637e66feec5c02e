//! Link generation: writes route values back into a template.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

use super::{CatchAll, ParameterPart, Part, RoutePattern};
use crate::routing::values::RouteValues;

/// Characters escaped inside a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Same as [`SEGMENT`] but leaves `/` alone, for `{**name}` catch-alls.
const SEGMENT_KEEP_SLASH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("no value for required parameter '{0}'")]
    MissingValue(String),

    #[error("parameter '{0}' was omitted but a later segment has a value")]
    GapAfterOptional(String),
}

impl RoutePattern {
    /// Builds a path from `values`, falling back to parameter defaults.
    ///
    /// Omitted optional parameters drop their segment, which is only
    /// allowed at the end of the path.
    pub fn format(&self, values: &RouteValues) -> Result<String, FormatError> {
        let mut path = String::new();
        let mut omitted: Option<&str> = None;

        for segment in self.segments() {
            let mut text = String::new();
            let mut segment_omitted = None;

            for (i, part) in segment.parts().iter().enumerate() {
                match part {
                    Part::Literal(literal) => text.push_str(literal),
                    Part::Separator(separator) => {
                        let next_present = segment
                            .parts()
                            .get(i + 1)
                            .and_then(Part::as_parameter)
                            .map_or(true, |p| value_for(p, values).is_some());
                        if next_present {
                            text.push_str(separator);
                        }
                    }
                    Part::Parameter(parameter) => match value_for(parameter, values) {
                        Some(value) => text.push_str(&encode(parameter, value)),
                        None if parameter.is_optional() => {
                            if segment.is_simple() {
                                segment_omitted = Some(parameter.name.as_str());
                            }
                        }
                        None => return Err(FormatError::MissingValue(parameter.name.clone())),
                    },
                }
            }

            if let Some(name) = segment_omitted {
                omitted.get_or_insert(name);
                continue;
            }
            if let Some(name) = omitted {
                return Err(FormatError::GapAfterOptional(name.to_string()));
            }

            path.push('/');
            path.push_str(&text);
        }

        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

fn value_for<'a>(parameter: &'a ParameterPart, values: &'a RouteValues) -> Option<&'a str> {
    values
        .get(&parameter.name)
        .filter(|value| !value.is_empty())
        .or(parameter.default.as_deref())
}

fn encode(parameter: &ParameterPart, value: &str) -> String {
    let set = match parameter.catch_all {
        Some(CatchAll::KeepSlashes) => SEGMENT_KEEP_SLASH,
        _ => SEGMENT,
    };
    utf8_percent_encode(value, set).to_string()
}
