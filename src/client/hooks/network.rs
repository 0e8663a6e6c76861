//! Outbound requests: `fetch`, XHR, WebSocket, EventSource, workers and
//! service worker registration.

use crate::client::api::{ApiCall, ApiTarget, ApiValue};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};
use crate::config::Flag;

#[derive(Debug, Default)]
pub struct NetworkHook;

impl Interceptor for NetworkHook {
    fn name(&self) -> &'static str {
        "network"
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[
            ApiTarget::Fetch,
            ApiTarget::Xhr,
            ApiTarget::WebSocket,
            ApiTarget::EventSource,
            ApiTarget::Worker,
            ApiTarget::ServiceWorker,
            ApiTarget::ResponseUrl,
        ]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        match call {
            ApiCall::Fetch { url } => Ok(Interception::delegated(next(ApiCall::Fetch {
                url: ctx.rewrite_url(&url),
            }))),
            ApiCall::XhrOpen { method, url, is_async } => {
                if !is_async && !ctx.flag(Flag::SyncXhr) {
                    return Ok(Interception::short_circuit(ApiValue::Error(
                        "synchronous XHR is disabled".to_string(),
                    )));
                }
                Ok(Interception::delegated(next(ApiCall::XhrOpen {
                    method,
                    url: ctx.rewrite_url(&url),
                    is_async,
                })))
            }
            ApiCall::WebSocket { url, protocols } => {
                Ok(Interception::delegated(next(ApiCall::WebSocket {
                    url: ctx.rewrite_url(&url),
                    protocols,
                })))
            }
            ApiCall::EventSource { url } => Ok(Interception::delegated(next(ApiCall::EventSource {
                url: ctx.rewrite_url(&url),
            }))),
            ApiCall::Worker { url, shared } => {
                let value = next(ApiCall::Worker {
                    url: ctx.rewrite_url(&url),
                    shared,
                });
                install_child(ctx, &value);
                Ok(Interception::delegated(value))
            }
            ApiCall::ServiceWorkerRegister { url, scope } => {
                if !ctx.flag(Flag::ServiceWorkers) {
                    return Ok(Interception::short_circuit(ApiValue::Error(
                        "service worker registration is disabled".to_string(),
                    )));
                }
                Ok(Interception::delegated(next(ApiCall::ServiceWorkerRegister {
                    url: ctx.rewrite_url(&url),
                    scope: scope.map(|s| ctx.rewrite_url(&s)),
                })))
            }
            ApiCall::ResponseUrl { url } => Ok(Interception::short_circuit(ApiValue::Text(
                ctx.unrewrite_url(&url),
            ))),
            other => Ok(Interception::delegated(next(other))),
        }
    }
}

/// Install interceptors into a context the host just handed back.
pub(crate) fn install_child(ctx: &ExecutionContext, value: &ApiValue) {
    let ApiValue::Context(id) = value else {
        return;
    };
    if let Some(child) = ctx.registry().and_then(|registry| registry.get(id)) {
        child.install();
    }
}
