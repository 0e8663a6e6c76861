//! Web storage partitioning.
//!
//! Every site shares the proxy's storage, so keys are namespaced as
//! `{host}@{key}` using the real host (with port).

use crate::client::api::{ApiCall, ApiTarget, LocationPart};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};

use super::location::location_part;

#[derive(Debug, Default)]
pub struct StorageHook;

pub fn storage_key(host: &str, key: &str) -> String {
    format!("{host}@{key}")
}

impl Interceptor for StorageHook {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn order(&self) -> i32 {
        -40
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::Storage]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        let host = location_part(&ctx.url(), LocationPart::Host);
        let call = match call {
            ApiCall::StorageGet { area, key } => ApiCall::StorageGet {
                area,
                key: storage_key(&host, &key),
            },
            ApiCall::StorageSet { area, key, value } => ApiCall::StorageSet {
                area,
                key: storage_key(&host, &key),
                value,
            },
            ApiCall::StorageRemove { area, key } => ApiCall::StorageRemove {
                area,
                key: storage_key(&host, &key),
            },
            other => other,
        };
        Ok(Interception::delegated(next(call)))
    }
}
