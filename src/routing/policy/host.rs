//! Host header filtering.
//!
//! # Responsibilities
//! - Parse host patterns (`example.com`, `*.example.com`, `example.com:8080`,
//!   `*:8080`, `*`)
//! - Match them against the request `Host` header
//!
//! # Design Decisions
//! - Host comparison is case-insensitive
//! - A pattern without a port accepts any port; a pattern with a port only
//!   accepts requests that state that port explicitly
//! - A request without a host only matches the bare `*` pattern

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use super::{any_candidate_has, MatcherPolicy};
use crate::routing::candidate::{CandidateSet, Rejections};
use crate::routing::context::RequestContext;
use crate::routing::endpoint::Endpoint;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostPatternError {
    #[error("host pattern is empty")]
    Empty,

    #[error("invalid port in host pattern '{0}'")]
    InvalidPort(String),

    #[error("'*' is only allowed as the whole host or as a '*.' prefix in '{0}'")]
    InvalidWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostName {
    Any,
    /// Lowercased, with the leading dot: `.example.com`.
    Suffix(String),
    /// Lowercased.
    Exact(String),
}

/// One parsed host pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    host: HostName,
    /// `None` accepts any port.
    port: Option<u16>,
}

impl HostPattern {
    pub fn matches(&self, host: &str, port: Option<u16>) -> bool {
        if let Some(expected) = self.port {
            if port != Some(expected) {
                return false;
            }
        }

        match &self.host {
            HostName::Any => true,
            HostName::Suffix(suffix) => host.len() > suffix.len() && host.to_lowercase().ends_with(suffix.as_str()),
            HostName::Exact(expected) => host.to_lowercase() == *expected,
        }
    }

    fn is_catch_all(&self) -> bool {
        self.host == HostName::Any && self.port.is_none()
    }
}

impl FromStr for HostPattern {
    type Err = HostPatternError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() {
            return Err(HostPatternError::Empty);
        }

        let (host, port) = split_host_port(text);
        let port = match port {
            None | Some("*") => None,
            Some(port) => Some(
                port.parse::<u16>()
                    .map_err(|_| HostPatternError::InvalidPort(text.to_string()))?,
            ),
        };

        let host = if host == "*" || host.is_empty() {
            HostName::Any
        } else if let Some(rest) = host.strip_prefix("*.") {
            if rest.is_empty() || rest.contains('*') {
                return Err(HostPatternError::InvalidWildcard(text.to_string()));
            }
            HostName::Suffix(format!(".{}", rest.to_lowercase()))
        } else if host.contains('*') {
            return Err(HostPatternError::InvalidWildcard(text.to_string()));
        } else {
            HostName::Exact(host.to_lowercase())
        };

        Ok(Self { host, port })
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            HostName::Any => f.write_str("*")?,
            HostName::Suffix(suffix) => write!(f, "*{}", suffix)?,
            HostName::Exact(host) => f.write_str(host)?,
        }
        match self.port {
            Some(port) => write!(f, ":{}", port),
            None => Ok(()),
        }
    }
}

/// Splits `host[:port]`, keeping bracketed IPv6 literals intact.
fn split_host_port(text: &str) -> (&str, Option<&str>) {
    if text.starts_with('[') {
        if let Some(close) = text.find(']') {
            let (host, rest) = text.split_at(close + 1);
            return (host, rest.strip_prefix(':'));
        }
    }
    match text.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, Some(port)),
        _ => (text, None),
    }
}

/// Hosts an endpoint answers for. An empty list accepts any host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMetadata {
    hosts: Vec<HostPattern>,
}

impl HostMetadata {
    pub fn new<I, S>(hosts: I) -> Result<Self, HostPatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| host.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { hosts })
    }

    pub fn hosts(&self) -> &[HostPattern] {
        &self.hosts
    }

    /// Matches the raw `Host` header value.
    pub fn matches(&self, host: Option<&str>) -> bool {
        if self.hosts.is_empty() {
            return true;
        }

        match host.filter(|host| !host.is_empty()) {
            Some(value) => {
                let (host, port) = split_host_port(value);
                let port = port.and_then(|port| port.parse::<u16>().ok());
                self.hosts.iter().any(|pattern| pattern.matches(host, port))
            }
            None => self.hosts.iter().any(HostPattern::is_catch_all),
        }
    }
}

/// Rejects candidates whose [`HostMetadata`] does not accept the request host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMatcherPolicy;

impl MatcherPolicy for HostMatcherPolicy {
    fn name(&self) -> &'static str {
        "host"
    }

    fn order(&self) -> i32 {
        -100
    }

    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        endpoints
            .iter()
            .any(|endpoint| endpoint.metadata_of::<HostMetadata>().is_some())
    }

    fn is_applicable(&self, _request: &RequestContext, candidates: &CandidateSet) -> bool {
        any_candidate_has::<HostMetadata>(candidates)
    }

    fn apply(&self, request: &RequestContext, candidates: &mut CandidateSet) {
        let rejected: Vec<usize> = candidates
            .path_matches()
            .filter(|(_, candidate)| {
                candidate
                    .endpoint()
                    .metadata_of::<HostMetadata>()
                    .map_or(false, |metadata| !metadata.matches(request.host()))
            })
            .map(|(index, _)| index)
            .collect();

        for index in rejected {
            candidates.reject(index, Rejections::HOST);
        }
    }
}
