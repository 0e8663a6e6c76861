//! Download interception: instead of letting the host save the file, the
//! real URL is announced to the controller.

use crate::client::api::{ApiCall, ApiTarget, ApiValue};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};
use crate::config::Flag;
use crate::controller::messages::Message;

#[derive(Debug, Default)]
pub struct DownloadHook;

impl Interceptor for DownloadHook {
    fn name(&self) -> &'static str {
        "download"
    }

    fn order(&self) -> i32 {
        50
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::Download]
    }

    fn enabled(&self, ctx: &ExecutionContext) -> bool {
        ctx.flag(Flag::InterceptDownloads)
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        let ApiCall::Download { url, filename } = call else {
            return Ok(Interception::delegated(next(call)));
        };

        let real = ctx
            .url()
            .join(&ctx.unrewrite_url(&url))
            .map_err(|_| InterceptError::InvalidUrl(url.clone()))?;
        let Some(port) = &ctx.services().sync else {
            return Ok(Interception::delegated(next(ApiCall::Download { url, filename })));
        };
        port.post(Message::Download {
            url: real.to_string(),
            filename,
        });
        Ok(Interception::short_circuit(ApiValue::Undefined))
    }
}
