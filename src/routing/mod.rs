//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (startup and every source change):
//!     Endpoint[] (source.rs)
//!     → pattern/ (parse templates, precedence)
//!     → constraints.rs (resolve inline constraints)
//!     → dfa/ (build the segment graph, score matches)
//!     → Freeze as immutable MatcherSnapshot (router.rs)
//!
//! Incoming Request (method, host, path, content type):
//!     → context.rs (RequestContext)
//!     → dfa/ (walk segments, capture values, check constraints)
//!     → policy/ (method, host, content type)
//!     → selector.rs (lowest score wins)
//!     → Return: Matched, NotFound, MethodNotAllowed or Ambiguous
//! ```
//!
//! # Design Decisions
//! - Path lookup cost depends on segment count, not endpoint count
//! - Snapshots are immutable; rebuilds swap them atomically
//! - Deterministic: same table and request always give the same outcome
//! - Ambiguity is reported, never resolved by registration order

pub mod candidate;
pub mod constraints;
pub mod context;
pub mod dfa;
pub mod endpoint;
pub mod pattern;
pub mod policy;
pub mod router;
pub mod selector;
pub mod source;
pub mod values;

pub use candidate::{Candidate, CandidateSet, Rejections};
pub use constraints::{ConstraintError, ConstraintRegistry, ParameterPolicy};
pub use context::RequestContext;
pub use dfa::{BuildError, DfaMatcher, DfaMatcherBuilder};
pub use endpoint::{Endpoint, EndpointBuilder};
pub use pattern::{ExplicitValueError, PatternError, RoutePattern};
pub use router::{MatcherSnapshot, RebuildCoordinator, Router, RouterBuilder};
pub use selector::{EndpointMatch, MatchOutcome};
pub use source::{CompositeEndpointDataSource, DefaultEndpointDataSource, EndpointDataSource};
pub use values::RouteValues;
