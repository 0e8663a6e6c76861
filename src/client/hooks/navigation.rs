//! History and `window.open`.

use crate::client::api::{ApiCall, ApiTarget};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};

#[derive(Debug, Default)]
pub struct NavigationHook;

impl Interceptor for NavigationHook {
    fn name(&self) -> &'static str {
        "navigation"
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::History, ApiTarget::WindowOpen]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        match call {
            ApiCall::HistoryState {
                method,
                url: Some(url),
            } => {
                let proxied = ctx.rewrite_url(&url);
                let value = next(ApiCall::HistoryState {
                    method,
                    url: Some(proxied.clone()),
                });
                if !value.is_error() {
                    ctx.set_location(proxied);
                }
                Ok(Interception::delegated(value))
            }
            ApiCall::WindowOpen {
                url: Some(url),
                target,
            } => {
                let value = next(ApiCall::WindowOpen {
                    url: Some(ctx.rewrite_url(&url)),
                    target,
                });
                super::network::install_child(ctx, &value);
                Ok(Interception::delegated(value))
            }
            other => Ok(Interception::delegated(next(other))),
        }
    }
}
