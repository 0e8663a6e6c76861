//! Cookie jar subsystem.
//!
//! Cookies set by proxied sites are captured here instead of reaching the
//! host's native store. They are keyed by the target host, so every
//! embedded site keeps its own cookies even though all of them share the
//! proxy's origin.

pub mod jar;
pub mod record;

pub use jar::{CookieJar, JarError};
pub use record::CookieRecord;
