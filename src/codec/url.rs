//! Bidirectional mapping between real URLs and proxied paths.

use std::sync::Arc;

use url::Url;

use crate::codec::meta::UrlMeta;
use crate::codec::transform::{Base64Codec, CodecTransform};

const PASSTHROUGH_SCHEMES: &[&str] = &["mailto", "tel", "about"];
const TAGGED_SCHEMES: &[&str] = &["blob:", "data:"];

/// Rewrites the payload of `javascript:` URLs.
///
/// The codec sits below the JS rewriter, so the rewriter is passed in by the
/// caller rather than owned here.
pub trait ScriptRewrite {
    fn rewrite_script(&self, source: &str, meta: &UrlMeta) -> String;
}

/// Leaves `javascript:` payloads untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityScripts;

impl ScriptRewrite for IdentityScripts {
    fn rewrite_script(&self, source: &str, _meta: &UrlMeta) -> String {
        source.to_string()
    }
}

/// The compiled codec for one configuration.
#[derive(Debug, Clone)]
pub struct UrlCodec {
    prefix: String,
    origin: Url,
    transform: Arc<dyn CodecTransform>,
}

impl UrlCodec {
    pub fn new(prefix: impl Into<String>, origin: Url, transform: Arc<dyn CodecTransform>) -> Self {
        Self {
            prefix: prefix.into(),
            origin,
            transform,
        }
    }

    /// Default codec (base64) for the given prefix and proxy origin.
    pub fn base64(prefix: impl Into<String>, origin: Url) -> Self {
        Self::new(prefix, origin, Arc::new(Base64Codec))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn transform(&self) -> &Arc<dyn CodecTransform> {
        &self.transform
    }

    /// `scheme://host[:port]` of the proxy, without a trailing slash.
    pub fn origin_str(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    /// Encode `input` into a proxied reference.
    pub fn encode(&self, input: &str, meta: &UrlMeta, scripts: &dyn ScriptRewrite) -> String {
        if input.is_empty() {
            return String::new();
        }

        if let Some(payload) = strip_scheme(input, "javascript:") {
            return format!("javascript:{}", scripts.rewrite_script(payload, meta));
        }

        if TAGGED_SCHEMES.iter().any(|s| has_scheme(input, s)) {
            return format!("{}{}{}", self.origin_str(), self.prefix, input);
        }

        let resolved = match meta.base.join(input.trim()) {
            Ok(url) => url,
            Err(_) => return input.to_string(),
        };

        if PASSTHROUGH_SCHEMES.contains(&resolved.scheme()) {
            return resolved.to_string();
        }

        format!("{}{}", self.prefix, self.transform.encode(resolved.as_str()))
    }

    /// Decode a proxied reference, returning the input unchanged on failure.
    pub fn decode(&self, input: &str) -> String {
        self.try_decode(input).unwrap_or_else(|| input.to_string())
    }

    /// Decode a proxied reference, or `None` if `input` is not one.
    pub fn try_decode(&self, input: &str) -> Option<String> {
        if input.is_empty() {
            return Some(String::new());
        }

        if let Some(tagged) = self.tagged_payload(input) {
            return Some(tagged.to_string());
        }

        if let Some(rest) = input.strip_prefix(self.prefix.as_str()) {
            return self.decode_tail(rest);
        }

        let url = Url::parse(input).ok()?;
        if url.origin() != self.origin.origin() {
            return None;
        }
        let tail = &url[url::Position::BeforePath..];
        let rest = tail.strip_prefix(self.prefix.as_str())?;
        self.decode_tail(rest)
    }

    /// True if `input` is already in proxied form.
    pub fn is_proxied(&self, input: &str) -> bool {
        if input.starts_with(self.prefix.as_str()) {
            return true;
        }
        let marker = format!("{}{}", self.origin_str(), self.prefix);
        input.starts_with(&marker)
    }

    /// The verbatim `blob:`/`data:` URI stored after the origin+prefix
    /// marker, if `input` carries one.
    fn tagged_payload<'a>(&self, input: &'a str) -> Option<&'a str> {
        let marker = format!("{}{}", self.origin_str(), self.prefix);
        let start = input.find(&marker)? + marker.len();
        let payload = &input[start..];
        TAGGED_SCHEMES
            .iter()
            .any(|s| has_scheme(payload, s))
            .then_some(payload)
    }

    fn decode_tail(&self, rest: &str) -> Option<String> {
        if TAGGED_SCHEMES.iter().any(|s| has_scheme(rest, s)) {
            return Some(rest.to_string());
        }

        // The encoded token never contains '?' or '#'; anything after it was
        // appended by the proxy (e.g. `?type=module`) or the page.
        let (token, fragment) = match rest.find(['?', '#']) {
            Some(idx) => {
                let suffix = &rest[idx..];
                let fragment = suffix.find('#').map(|f| &suffix[f..]);
                (&rest[..idx], fragment)
            }
            None => (rest, None),
        };

        let mut decoded = self.transform.decode(token).ok()?;
        if let Some(fragment) = fragment {
            if !decoded.contains('#') {
                decoded.push_str(fragment);
            }
        }
        Some(decoded)
    }
}

fn has_scheme(input: &str, scheme: &str) -> bool {
    input
        .get(..scheme.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
}

fn strip_scheme<'a>(input: &'a str, scheme: &str) -> Option<&'a str> {
    if has_scheme(input, scheme) {
        Some(&input[scheme.len()..])
    } else {
        None
    }
}
