//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI flags and BANME_* environment overrides
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env, finalize, load_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, BanConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ProxyConfig, StatsConfig,
};
pub use validation::{validate_config, ValidationError};
