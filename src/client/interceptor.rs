//! Interceptor contract.
//!
//! An interceptor wraps one or more [`ApiTarget`]s. It receives the call and
//! a delegate to the rest of the chain (ending at the host), and either
//! answers by itself or forwards a possibly rewritten call.

use std::fmt;

use thiserror::Error;

use super::api::{ApiCall, ApiTarget, ApiValue};
use super::context::ExecutionContext;

/// The remainder of the chain below the current interceptor.
pub type Delegate<'a> = dyn Fn(ApiCall) -> ApiValue + 'a;

#[derive(Debug, Clone, PartialEq)]
pub struct Interception {
    /// True when the host was never reached for this call.
    pub short_circuit: bool,
    pub value: ApiValue,
}

impl Interception {
    pub fn short_circuit(value: ApiValue) -> Self {
        Self {
            short_circuit: true,
            value,
        }
    }

    pub fn delegated(value: ApiValue) -> Self {
        Self {
            short_circuit: false,
            value,
        }
    }
}

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("{0}")]
    Rejected(String),
}

pub trait Interceptor: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Lower orders install first and run outermost.
    fn order(&self) -> i32 {
        0
    }

    fn targets(&self) -> &'static [ApiTarget];

    /// Checked once, when the interceptor is installed into a context.
    fn enabled(&self, _ctx: &ExecutionContext) -> bool {
        true
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError>;
}
