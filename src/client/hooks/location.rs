//! `Location` virtualization: reads report the real URL, writes navigate
//! to the rewritten one.

use url::Url;

use crate::client::api::{ApiCall, ApiTarget, ApiValue, LocationPart};
use crate::client::context::ExecutionContext;
use crate::client::interceptor::{Delegate, InterceptError, Interception, Interceptor};

#[derive(Debug, Default)]
pub struct LocationHook;

impl Interceptor for LocationHook {
    fn name(&self) -> &'static str {
        "location"
    }

    fn order(&self) -> i32 {
        -100
    }

    fn targets(&self) -> &'static [ApiTarget] {
        &[ApiTarget::Location]
    }

    fn intercept(
        &self,
        ctx: &ExecutionContext,
        call: ApiCall,
        next: &Delegate<'_>,
    ) -> Result<Interception, InterceptError> {
        match call {
            ApiCall::LocationGet { part } => Ok(Interception::short_circuit(ApiValue::Text(
                location_part(&ctx.url(), part),
            ))),
            ApiCall::LocationSet { part, value } => {
                let target = apply_part(ctx.url(), part, &value)?;
                let proxied = ctx.rewrite_url(target.as_str());
                let result = next(ApiCall::LocationSet {
                    part: LocationPart::Href,
                    value: proxied.clone(),
                });
                ctx.set_location(proxied);
                Ok(Interception::delegated(result))
            }
            other => Ok(Interception::delegated(next(other))),
        }
    }
}

/// Read one component the way `Location` formats it.
pub fn location_part(url: &Url, part: LocationPart) -> String {
    match part {
        LocationPart::Href => url.to_string(),
        LocationPart::Protocol => format!("{}:", url.scheme()),
        LocationPart::Host => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        },
        LocationPart::Hostname => url.host_str().unwrap_or_default().to_string(),
        LocationPart::Port => url.port().map(|p| p.to_string()).unwrap_or_default(),
        LocationPart::Pathname => url.path().to_string(),
        LocationPart::Search => url.query().map(|q| format!("?{q}")).unwrap_or_default(),
        LocationPart::Hash => url
            .fragment()
            .filter(|f| !f.is_empty())
            .map(|f| format!("#{f}"))
            .unwrap_or_default(),
        LocationPart::Origin => url.origin().ascii_serialization(),
    }
}

fn apply_part(mut url: Url, part: LocationPart, value: &str) -> Result<Url, InterceptError> {
    let invalid = || InterceptError::InvalidUrl(value.to_string());
    match part {
        LocationPart::Href => return url.join(value).map_err(|_| invalid()),
        LocationPart::Protocol => url
            .set_scheme(value.trim_end_matches(':'))
            .map_err(|_| invalid())?,
        LocationPart::Host => {
            let (host, port) = match value.rsplit_once(':') {
                Some((host, port)) => (host, Some(port.parse::<u16>().map_err(|_| invalid())?)),
                None => (value, None),
            };
            url.set_host(Some(host)).map_err(|_| invalid())?;
            url.set_port(port).map_err(|_| invalid())?;
        }
        LocationPart::Hostname => url.set_host(Some(value)).map_err(|_| invalid())?,
        LocationPart::Port => {
            let port = if value.is_empty() {
                None
            } else {
                Some(value.parse::<u16>().map_err(|_| invalid())?)
            };
            url.set_port(port).map_err(|_| invalid())?;
        }
        LocationPart::Pathname => url.set_path(value),
        LocationPart::Search => {
            let query = value.trim_start_matches('?');
            url.set_query((!query.is_empty()).then_some(query));
        }
        LocationPart::Hash => {
            let fragment = value.trim_start_matches('#');
            url.set_fragment(Some(fragment));
        }
        LocationPart::Origin => {
            return Err(InterceptError::Rejected("location.origin is read-only".into()))
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parts() {
        let url = Url::parse("https://site.test:8443/a/b?x=1#top").unwrap();
        assert_eq!(location_part(&url, LocationPart::Protocol), "https:");
        assert_eq!(location_part(&url, LocationPart::Host), "site.test:8443");
        assert_eq!(location_part(&url, LocationPart::Hostname), "site.test");
        assert_eq!(location_part(&url, LocationPart::Port), "8443");
        assert_eq!(location_part(&url, LocationPart::Pathname), "/a/b");
        assert_eq!(location_part(&url, LocationPart::Search), "?x=1");
        assert_eq!(location_part(&url, LocationPart::Hash), "#top");
        assert_eq!(location_part(&url, LocationPart::Origin), "https://site.test:8443");
    }

    #[test]
    fn test_apply_part() {
        let base = Url::parse("https://site.test/a/b?x=1").unwrap();
        assert_eq!(
            apply_part(base.clone(), LocationPart::Href, "../c").unwrap().as_str(),
            "https://site.test/c"
        );
        assert_eq!(
            apply_part(base.clone(), LocationPart::Search, "?y=2").unwrap().as_str(),
            "https://site.test/a/b?y=2"
        );
        assert_eq!(
            apply_part(base.clone(), LocationPart::Hash, "#frag").unwrap().as_str(),
            "https://site.test/a/b?x=1#frag"
        );
        assert_eq!(
            apply_part(base.clone(), LocationPart::Host, "other.test:81").unwrap().as_str(),
            "https://other.test:81/a/b?x=1"
        );
        assert!(apply_part(base, LocationPart::Origin, "https://x.test").is_err());
    }
}
