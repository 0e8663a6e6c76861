//! Fetch interception subsystem.
//!
//! # Data Flow
//! ```text
//! proxied request (prefix path)
//!     → fetch.rs (stage sequence)
//!         → codec (decode target), security (site policy), cookies (jar)
//!         → transport.rs (upstream, redirects not followed)
//!         → rewrite (headers, body by resource kind)
//!     → ProxyResponse, or error_page.rs on failure
//! ```
//!
//! # Design Decisions
//! - One linear sequence per request; the stage reached is retained
//! - Failures become typed HTML pages, never panics or dropped connections
//! - Navigations always answer 200 so the embedded frame renders the page

pub mod error;
pub mod error_page;
pub mod fetch;
pub mod resource;
pub mod stage;
pub mod transport;

pub use error::PipelineError;
pub use fetch::{FetchPipeline, ProxyRequest, ProxyResponse};
pub use resource::ResourceKind;
pub use stage::Stage;
pub use transport::{ReqwestTransport, Transport, TransportError, UpstreamRequest, UpstreamResponse};
