//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, CIRCUIT_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (validated, immutable)
//!     → breaker layers handed to the registry
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → registry swaps its default/service layers
//!     → breakers created from then on use the new layers
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A breaker's settings never change after it is built

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerOverride, BreakerSettings, BreakersConfig, LogFormat, ManagerConfig,
    ObservabilityConfig, ServiceEndpoint,
};
