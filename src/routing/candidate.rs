//! Per-request candidate set.
//!
//! The DFA walk produces one [`Candidate`] per reachable endpoint. Matcher
//! policies never remove candidates; they record rejection reasons so the
//! selector can tell a 405 from a 404 and diagnostics keep stable indices.

use std::sync::Arc;

use bitflags::bitflags;

use crate::routing::endpoint::Endpoint;
use crate::routing::values::RouteValues;

bitflags! {
    /// Why a candidate was ruled out. Empty means still valid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Rejections: u8 {
        const METHOD = 0b0001;
        const HOST = 0b0010;
        const CONTENT_TYPE = 0b0100;
        /// Parameter capture or constraint evaluation failed.
        const CONSTRAINT = 0b1000;
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    endpoint: Arc<Endpoint>,
    values: RouteValues,
    score: u32,
    rejections: Rejections,
}

impl Candidate {
    pub(crate) fn new(endpoint: Arc<Endpoint>, values: RouteValues, score: u32, rejections: Rejections) -> Self {
        Self {
            endpoint,
            values,
            score,
            rejections,
        }
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn values(&self) -> &RouteValues {
        &self.values
    }

    /// Lower scores win. Candidates with equal order and route precedence
    /// share a score.
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn rejections(&self) -> Rejections {
        self.rejections
    }

    pub fn is_valid(&self) -> bool {
        self.rejections.is_empty()
    }

    /// The path (and its constraints) matched, regardless of policies.
    pub fn is_path_match(&self) -> bool {
        !self.rejections.contains(Rejections::CONSTRAINT)
    }

    pub(crate) fn into_match(self) -> (Arc<Endpoint>, RouteValues) {
        (self.endpoint, self.values)
    }
}

/// Candidates for one request, ordered by score.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    /// Candidates whose path matched, with their indices. Policies evaluate
    /// these even when another policy already rejected them.
    pub fn path_matches(&self) -> impl Iterator<Item = (usize, &Candidate)> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.is_path_match())
    }

    /// Candidates without any rejection.
    pub fn valid(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|candidate| candidate.is_valid())
    }

    pub fn has_valid(&self) -> bool {
        self.valid().next().is_some()
    }

    /// Add `reason` to the rejections of the candidate at `index`.
    ///
    /// Out of range indices are ignored.
    pub fn reject(&mut self, index: usize, reason: Rejections) {
        if let Some(candidate) = self.candidates.get_mut(index) {
            candidate.rejections.insert(reason);
        }
    }

    pub(crate) fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }
}
