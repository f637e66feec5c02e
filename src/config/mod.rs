//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, every endpoint compiled once)
//!     → RouterConfig (validated, immutable)
//!     → endpoints.rs (token replacement, metadata)
//!     → DefaultEndpointDataSource
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → endpoints replaced in the data source
//!     → router rebuilds its snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the endpoint table is reloadable; listener, admin and
//!   observability settings apply at startup

pub mod endpoints;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::AdminConfig;
pub use schema::EndpointConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::RouterConfig;
pub use validation::ValidationError;
