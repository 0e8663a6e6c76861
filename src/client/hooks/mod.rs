//! Built-in interceptors.
//!
//! | order | hook       |
//! |-------|------------|
//! | -100  | location   |
//! | -95   | origin     |
//! | -90   | execution  |
//! | -50   | cookie     |
//! | -40   | storage    |
//! | 0     | network    |
//! | 0     | navigation |
//! | 10    | content    |
//! | 20    | frames     |
//! | 30    | messaging  |
//! | 40    | sourcemaps |
//! | 50    | download   |

pub mod content;
pub mod cookie;
pub mod download;
pub mod execution;
pub mod frames;
pub mod location;
pub mod messaging;
pub mod navigation;
pub mod network;
pub mod origin;
pub mod sourcemaps;
pub mod storage;

use std::sync::Arc;

use super::interceptor::Interceptor;

pub fn default_interceptors() -> Vec<Arc<dyn Interceptor>> {
    vec![
        Arc::new(location::LocationHook),
        Arc::new(origin::OriginHook),
        Arc::new(execution::ExecutionHook),
        Arc::new(cookie::CookieHook),
        Arc::new(storage::StorageHook),
        Arc::new(network::NetworkHook),
        Arc::new(navigation::NavigationHook),
        Arc::new(content::ContentHook),
        Arc::new(frames::FrameHook),
        Arc::new(messaging::MessagingHook),
        Arc::new(sourcemaps::SourceMapHook),
        Arc::new(download::DownloadHook),
    ]
}
