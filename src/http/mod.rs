//! HTTP protocol handling.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request-id and trace layers)
//!     → /__webrascal/* admin endpoints
//!     → files.wasm → bundle.rs (engine as a script, when configured)
//!     → {prefix}* → request.rs (buffer body) → pipeline
//!     → anything else → 404
//! ```

pub mod bundle;
pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
