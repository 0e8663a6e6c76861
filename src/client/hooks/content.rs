//! DOM content: attributes, `innerHTML` and reflected URL properties.
//!
//! # Design Decisions
//! - The original value of a rewritten attribute is kept in a shadow
//!   attribute `webrascal-attr-{name}` and returned by `getAttribute`
//! - Shadow attributes are invisible to page scripts

use crate::client::api::{ApiCall, ApiTarget, ApiValue, ElementRef};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};
use crate::rewrite::rules::{self, AttrAction};

pub const SHADOW_PREFIX: &str = "webrascal-attr";

pub fn shadow_name(name: &str) -> String {
    format!("{SHADOW_PREFIX}-{name}")
}

#[derive(Debug, Default)]
pub struct ContentHook;

impl Interceptor for ContentHook {
    fn name(&self) -> &'static str {
        "content"
    }

    fn order(&self) -> i32 {
        10
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::Attribute, ApiTarget::InnerHtml, ApiTarget::ElementUrl]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        match call {
            ApiCall::SetAttribute { element, name, value } => {
                set_attribute(ctx, element, name.to_ascii_lowercase(), value, next)
            }
            ApiCall::GetAttribute { element, name } => {
                let name = name.to_ascii_lowercase();
                if name.starts_with(SHADOW_PREFIX) {
                    return Ok(Interception::short_circuit(ApiValue::Null));
                }
                let shadow = next(ApiCall::GetAttribute {
                    element: element.clone(),
                    name: shadow_name(&name),
                });
                if shadow.as_text().is_some() {
                    return Ok(Interception::delegated(shadow));
                }
                Ok(Interception::delegated(next(ApiCall::GetAttribute { element, name })))
            }
            ApiCall::RemoveAttribute { element, name } => {
                let name = name.to_ascii_lowercase();
                next(ApiCall::RemoveAttribute {
                    element: element.clone(),
                    name: shadow_name(&name),
                });
                Ok(Interception::delegated(next(ApiCall::RemoveAttribute { element, name })))
            }
            ApiCall::SetInnerHtml { element, html } => {
                let html = if element.is("script") {
                    ctx.rewrite_js(&html, false)
                } else {
                    ctx.rewrite_html(&html)
                };
                Ok(Interception::delegated(next(ApiCall::SetInnerHtml { element, html })))
            }
            ApiCall::ElementUrlGet { element, property } => {
                let value = next(ApiCall::ElementUrlGet { element, property });
                Ok(Interception::delegated(match value {
                    ApiValue::Text(url) => ApiValue::Text(ctx.unrewrite_url(&url)),
                    other => other,
                }))
            }
            ApiCall::ElementUrlSet {
                element,
                property,
                value,
            } => Ok(Interception::delegated(next(ApiCall::ElementUrlSet {
                element,
                property,
                value: ctx.rewrite_url(&value),
            }))),
            other => Ok(Interception::delegated(next(other))),
        }
    }
}

fn set_attribute(
    ctx: &ExecutionContext,
    element: ElementRef,
    name: String,
    value: String,
    next: &Delegate<'_>,
) -> Result<Interception, InterceptError> {
    if name.starts_with(SHADOW_PREFIX) {
        return Ok(Interception::short_circuit(ApiValue::Undefined));
    }

    let rewritten = match rules::attribute_rule(&name) {
        Some(AttrAction::Remove) => {
            next(ApiCall::RemoveAttribute { element, name });
            return Ok(Interception::short_circuit(ApiValue::Undefined));
        }
        Some(AttrAction::Blank) => String::new(),
        None if rules::is_url_attribute(&name) => ctx.rewrite_url(&value),
        None if rules::is_event_attribute(&name) => ctx.rewrite_js(&value, false),
        None => return Ok(Interception::delegated(next(ApiCall::SetAttribute { element, name, value }))),
    };

    next(ApiCall::SetAttribute {
        element: element.clone(),
        name: shadow_name(&name),
        value,
    });
    Ok(Interception::delegated(next(ApiCall::SetAttribute {
        element,
        name,
        value: rewritten,
    })))
}
