//! Origin getters report the real site instead of the proxy.

use crate::client::api::{ApiCall, ApiTarget, ApiValue, OriginProperty};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};

#[derive(Debug, Default)]
pub struct OriginHook;

impl Interceptor for OriginHook {
    fn name(&self) -> &'static str {
        "origin"
    }

    fn order(&self) -> i32 {
        -95
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::Origin]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        let ApiCall::OriginGet { property } = call else {
            return Ok(Interception::delegated(next(call)));
        };

        let url = ctx.url();
        let value = match property {
            OriginProperty::Origin => url.origin().ascii_serialization(),
            OriginProperty::DocumentUrl | OriginProperty::DocumentUri => url.to_string(),
            OriginProperty::Domain => url.host_str().unwrap_or_default().to_string(),
        };
        Ok(Interception::short_circuit(ApiValue::Text(value)))
    }
}
