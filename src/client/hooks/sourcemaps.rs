//! Source map registry and `Function.prototype.toString` cleanup.
//!
//! Rewritten functions carry a `/*rascaltag <n> <tag>*/` marker. When the
//! tag has a registered map, `toString` hides the marker.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::client::api::{ApiCall, ApiTarget, ApiValue};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};
use crate::config::Flag;

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\*rascaltag\s+\d+\s+([^*\s]+)\s*\*/").expect("valid regex"));

#[derive(Debug, Default)]
pub struct SourceMapHook;

impl Interceptor for SourceMapHook {
    fn name(&self) -> &'static str {
        "sourcemaps"
    }

    fn order(&self) -> i32 {
        40
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::SourceMap, ApiTarget::FunctionToString]
    }

    fn enabled(&self, ctx: &ExecutionContext) -> bool {
        ctx.flag(Flag::SourceMaps)
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        match call {
            ApiCall::PushSourceMap { tag, map } => {
                ctx.services().source_maps.insert(tag, map);
                Ok(Interception::short_circuit(ApiValue::Undefined))
            }
            other @ ApiCall::FunctionToString { .. } => {
                let value = next(other);
                Ok(Interception::delegated(match value {
                    ApiValue::Text(source) => ApiValue::Text(strip_tags(ctx, &source)),
                    other => other,
                }))
            }
            other => Ok(Interception::delegated(next(other))),
        }
    }
}

fn strip_tags(ctx: &ExecutionContext, source: &str) -> String {
    let maps = &ctx.services().source_maps;
    TAG_RE
        .replace_all(source, |caps: &regex::Captures<'_>| {
            if maps.contains_key(&caps[1]) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
