//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → runtime.rs (codec + site-flag regexes compiled)
//!     → shared via Arc<ArcSwap<RuntimeConfig>>
//!
//! On reload (file change or controller message):
//!     watcher.rs detects change / controller merges a partial config
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the RuntimeConfig
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod runtime;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use runtime::{RuntimeConfig, SharedConfig};
pub use schema::{Flag, FlagSet, ProxyConfig, ServerConfig};
