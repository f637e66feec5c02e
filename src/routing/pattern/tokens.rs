//! `[token]` replacement, applied to template text before parsing.
//!
//! `[[` and `]]` produce literal brackets. Token names are looked up
//! ASCII case-insensitively.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token '[{name}]' at position {position} has no replacement value")]
    UnknownToken { name: String, position: usize },

    #[error("empty token '[]' at position {0}")]
    EmptyToken(usize),

    #[error("token starting at position {0} is not closed with ']'")]
    Unterminated(usize),

    #[error("unescaped ']' at position {0}; use ']]' for a literal bracket")]
    UnbalancedClose(usize),
}

/// Replaces every `[name]` in `template` with its value from `tokens`.
pub fn replace_tokens(template: &str, tokens: &HashMap<String, String>) -> Result<String, TokenError> {
    let chars: Vec<(usize, char)> = template.char_indices().collect();
    let mut output = String::with_capacity(template.len());
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        match (c, next) {
            ('[', Some('[')) | (']', Some(']')) => {
                output.push(c);
                i += 2;
            }
            ('[', _) => {
                let (name, end) = read_token(&chars, i + 1).ok_or(TokenError::Unterminated(position))?;
                if name.is_empty() {
                    return Err(TokenError::EmptyToken(position));
                }
                let value = lookup(tokens, &name).ok_or(TokenError::UnknownToken { name, position })?;
                output.push_str(value);
                i = end;
            }
            (']', _) => return Err(TokenError::UnbalancedClose(position)),
            _ => {
                output.push(c);
                i += 1;
            }
        }
    }

    Ok(output)
}

/// Reads a token name up to its closing bracket; returns the name and the
/// index just past the bracket.
fn read_token(chars: &[(usize, char)], mut i: usize) -> Option<(String, usize)> {
    let mut name = String::new();
    while i < chars.len() {
        let c = chars[i].1;
        let next = chars.get(i + 1).map(|&(_, c)| c);
        match (c, next) {
            (']', Some(']')) => {
                name.push(']');
                i += 2;
            }
            (']', _) => return Some((name, i + 1)),
            ('[', _) => return None,
            _ => {
                name.push(c);
                i += 1;
            }
        }
    }
    None
}

fn lookup<'a>(tokens: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    tokens
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
