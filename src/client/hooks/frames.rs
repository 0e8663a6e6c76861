//! `iframe.contentWindow`: child contexts get hooked the first time a
//! page touches them.

use crate::client::api::{ApiCall, ApiTarget};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};

use super::network::install_child;

#[derive(Debug, Default)]
pub struct FrameHook;

impl Interceptor for FrameHook {
    fn name(&self) -> &'static str {
        "frames"
    }

    fn order(&self) -> i32 {
        20
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::FrameContent]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        let value = next(call);
        install_child(ctx, &value);
        Ok(Interception::delegated(value))
    }
}
