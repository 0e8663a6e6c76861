//! `document.cookie` bridged to the shared jar.
//!
//! Writes are announced on the sync port so the service side can reload
//! its copy of the jar.

use tracing::warn;

use crate::client::api::{ApiCall, ApiTarget, ApiValue};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};
use crate::controller::messages::Message;

#[derive(Debug, Default)]
pub struct CookieHook;

impl Interceptor for CookieHook {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn order(&self) -> i32 {
        -50
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::Cookie]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        let services = ctx.services();
        match call {
            ApiCall::CookieGet => Ok(Interception::short_circuit(ApiValue::Text(
                services.jar.get_cookies(&ctx.url(), true),
            ))),
            ApiCall::CookieSet { value } => {
                services.jar.set_from_script(&value, &ctx.url());
                if let Some(port) = &services.sync {
                    match services.jar.dump() {
                        Ok(cookies) => {
                            port.post(Message::CookieSync { cookies });
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize cookie jar"),
                    }
                }
                Ok(Interception::short_circuit(ApiValue::Undefined))
            }
            other => Ok(Interception::delegated(next(other))),
        }
    }
}
