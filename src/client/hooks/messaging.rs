//! `postMessage` envelopes.
//!
//! Every proxied context shares the proxy origin, so the sender's real
//! origin travels inside a wrapper and is restored on delivery.

use serde_json::{json, Value};

use crate::client::api::{ApiCall, ApiTarget, ApiValue};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};

const TYPE_KEY: &str = "$webrascal$messagetype";
const ORIGIN_KEY: &str = "$webrascal$origin";
const DATA_KEY: &str = "$webrascal$data";

pub fn wrap_message(data: Value, origin: &str) -> Value {
    json!({
        TYPE_KEY: "wrapped",
        ORIGIN_KEY: origin,
        DATA_KEY: data,
    })
}

/// Returns the inner data and the sender's origin if `data` is wrapped.
pub fn unwrap_message(data: &Value) -> Option<(Value, String)> {
    let obj = data.as_object()?;
    if obj.get(TYPE_KEY)?.as_str()? != "wrapped" {
        return None;
    }
    let origin = obj.get(ORIGIN_KEY)?.as_str()?.to_string();
    let inner = obj.get(DATA_KEY).cloned().unwrap_or(Value::Null);
    Some((inner, origin))
}

#[derive(Debug, Default)]
pub struct MessagingHook;

impl Interceptor for MessagingHook {
    fn name(&self) -> &'static str {
        "messaging"
    }

    fn order(&self) -> i32 {
        30
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::PostMessage, ApiTarget::MessageDispatch]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        match call {
            ApiCall::PostMessage { data, target_origin } => {
                let origin = ctx.url().origin().ascii_serialization();
                // Real delivery happens on the proxy origin.
                let target_origin = match target_origin.as_str() {
                    "*" | "/" => target_origin,
                    _ => ctx.config().origin().origin().ascii_serialization(),
                };
                Ok(Interception::delegated(next(ApiCall::PostMessage {
                    data: wrap_message(data, &origin),
                    target_origin,
                })))
            }
            ApiCall::MessageDispatch { data, origin } => match unwrap_message(&data) {
                Some((data, origin)) => {
                    Ok(Interception::short_circuit(ApiValue::Message { data, origin }))
                }
                None => Ok(Interception::delegated(next(ApiCall::MessageDispatch { data, origin }))),
            },
            other => Ok(Interception::delegated(next(other))),
        }
    }
}
