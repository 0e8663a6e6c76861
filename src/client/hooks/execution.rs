//! Dynamic code execution: `eval` and the `Function` constructor family.
//!
//! Source handed to either is run through the JS rewriter before the host
//! evaluates it.

use crate::client::api::{ApiCall, ApiTarget};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};

#[derive(Debug, Default)]
pub struct ExecutionHook;

impl Interceptor for ExecutionHook {
    fn name(&self) -> &'static str {
        "execution"
    }

    fn order(&self) -> i32 {
        -90
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::Eval, ApiTarget::Function]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        let rewritten = match call {
            ApiCall::Eval { source, direct } => ApiCall::Eval {
                source: ctx.rewrite_js(&source, false),
                direct,
            },
            ApiCall::FunctionConstructor { kind, mut args } => {
                // The body is always the last argument.
                if let Some(body) = args.last_mut() {
                    *body = ctx.rewrite_js(body, false);
                }
                ApiCall::FunctionConstructor { kind, args }
            }
            other => other,
        };

        Ok(Interception::delegated(next(rewritten)))
    }
}
