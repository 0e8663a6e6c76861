//! Client API virtualization.
//!
//! # Responsibilities
//! - Model the browser APIs an embedded page reaches for as [`ApiCall`]s
//! - Rewrite each call so it stays inside the proxy, and translate results
//!   back so the page sees its real site
//! - Track nested contexts (frames, workers) and hook them lazily
//!
//! # Data Flow
//! ```text
//! page code ──► ExecutionContext::call ──► interceptor chain (by order)
//!                                               │ delegate
//!                                               ▼
//!                                            HostApi::invoke
//! ```
//!
//! # Design Decisions
//! - The host embedding owns the real APIs; this module only decides what
//!   they are called with
//! - Interceptors are installed once per context; a second install is a
//!   no-op

pub mod api;
pub mod context;
pub mod hooks;
pub mod interceptor;
pub mod registry;
pub mod runtime;

pub use api::{ApiCall, ApiTarget, ApiValue, ContextId, ContextKind, ElementRef};
pub use context::{ClientServices, ExecutionContext, HostApi};
pub use interceptor::{Delegate, InterceptError, Interception, Interceptor};
pub use registry::ContextRegistry;
pub use runtime::{ClientRuntime, ClientRuntimeBuilder};
