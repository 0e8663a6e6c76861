//! URL codec subsystem.
//!
//! # Data Flow
//! ```text
//! real URL + UrlMeta
//!     → url.rs (scheme dispatch, base resolution)
//!     → transform.rs (named codec)
//!     → "{prefix}{encoded}"
//!
//! proxied path / absolute proxied URL
//!     → url.rs (prefix or marker slicing)
//!     → transform.rs (reverse)
//!     → real URL, or the input unchanged on failure
//! ```
//!
//! # Design Decisions
//! - Transforms are chosen once, when the config is compiled
//! - Decoding never fails outward; a malformed path is returned as-is
//! - `blob:` and `data:` URIs are tagged with a marker instead of encoded

pub mod meta;
pub mod transform;
pub mod url;

pub use meta::UrlMeta;
pub use transform::{CodecError, CodecTransform};
pub use url::{IdentityScripts, ScriptRewrite, UrlCodec};
