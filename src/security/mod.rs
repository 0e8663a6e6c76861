//! Site-policy subsystem.
//!
//! # Data Flow
//! ```text
//! Intercepted request:
//!     → site.rs (classify target vs. referrer)
//!     → referrer.rs (merge with what earlier hops of a redirect chain saw)
//!     → sec-fetch-site header sent upstream
//!
//! Upstream response:
//!     → referrer.rs (record redirect target and referrer-policy)
//! ```
//!
//! # Design Decisions
//! - Entries expire one hour after their last touch
//! - Expired entries are swept once per completed request, not on a timer

pub mod referrer;
pub mod site;

pub use referrer::{ReferrerTracker, TrackerEntry};
pub use site::{get_site_directive, SiteDirective};
