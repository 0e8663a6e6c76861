//! Pattern-based HTML rewriting.
//!
//! # Responsibilities
//! - Rewrite quoted `src`/`href` attribute values
//! - Rewrite inline `<script>` bodies (classic or module) and `<style>` bodies
//! - Inject the bootstrap sequence into top-level documents
//!
//! # Design Decisions
//! - One pass with an alternation, so attribute values inside inline script
//!   bodies are never touched as markup
//! - Only matched spans change; all other bytes are copied through

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static HTML_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?is)",
        r"(?P<sopen><script\b)(?P<sattrs>[^>]*)>(?P<sbody>.*?)(?P<sclose></script\s*>)",
        r"|(?P<yopen><style\b)(?P<yattrs>[^>]*)>(?P<ybody>.*?)(?P<yclose></style\s*>)",
        r#"|(?P<ws>\s)(?P<name>src|href)=(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#,
    ))
    .expect("HTML pattern is valid")
});

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?P<ws>\s)(?P<name>src|href)=(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
        .expect("attribute pattern is valid")
});

static SRC_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsrc\s*=").expect("src pattern is valid"));

static TYPE_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\btype\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("type pattern is valid")
});

static HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("head pattern is valid"));

const SCRIPT_TYPES: &[&str] = &[
    "",
    "module",
    "text/javascript",
    "application/javascript",
    "text/ecmascript",
    "application/ecmascript",
    "application/x-javascript",
];

/// Callbacks used by [`rewrite_html`] for embedded content.
pub trait HtmlContext {
    fn url(&self, value: &str) -> String;
    fn script(&self, source: &str, is_module: bool) -> String;
    fn style(&self, source: &str) -> String;
}

/// Rewrite `html`. When `bootstrap` is given it is injected right after the
/// opening `<head>` tag, or in front of the document if there is none.
pub fn rewrite_html(html: &str, ctx: &dyn HtmlContext, bootstrap: Option<&str>) -> String {
    let out = HTML_RE
        .replace_all(html, |caps: &Captures| {
            if let Some(open) = caps.name("sopen") {
                let attrs = caps.name("sattrs").map_or("", |m| m.as_str());
                let body = caps.name("sbody").map_or("", |m| m.as_str());
                let close = caps.name("sclose").map_or("", |m| m.as_str());
                let body = match script_kind(attrs) {
                    Some(is_module) if !body.trim().is_empty() => ctx.script(body, is_module),
                    _ => body.to_string(),
                };
                format!("{}{}>{}{}", open.as_str(), rewrite_attrs(attrs, ctx), body, close)
            } else if let Some(open) = caps.name("yopen") {
                let attrs = caps.name("yattrs").map_or("", |m| m.as_str());
                let body = caps.name("ybody").map_or("", |m| m.as_str());
                let close = caps.name("yclose").map_or("", |m| m.as_str());
                format!("{}{}>{}{}", open.as_str(), attrs, ctx.style(body), close)
            } else {
                attribute(caps, ctx)
            }
        })
        .into_owned();

    match bootstrap {
        None => out,
        Some(bootstrap) => match HEAD_RE.find(&out) {
            Some(head) => {
                let mut injected = String::with_capacity(out.len() + bootstrap.len());
                injected.push_str(&out[..head.end()]);
                injected.push_str(bootstrap);
                injected.push_str(&out[head.end()..]);
                injected
            }
            None => format!("{}{}", bootstrap, out),
        },
    }
}

fn rewrite_attrs(attrs: &str, ctx: &dyn HtmlContext) -> String {
    ATTR_RE
        .replace_all(attrs, |caps: &Captures| attribute(caps, ctx))
        .into_owned()
}

fn attribute(caps: &Captures, ctx: &dyn HtmlContext) -> String {
    let ws = caps.name("ws").map_or("", |m| m.as_str());
    let name = caps.name("name").map_or("", |m| m.as_str());
    match (caps.name("dq"), caps.name("sq")) {
        (Some(v), _) => format!("{}{}=\"{}\"", ws, name, ctx.url(v.as_str())),
        (_, Some(v)) => format!("{}{}='{}'", ws, name, ctx.url(v.as_str())),
        _ => caps[0].to_string(),
    }
}

/// `None` if the body must be left alone (external or non-JS script),
/// otherwise whether it is a module.
fn script_kind(attrs: &str) -> Option<bool> {
    if SRC_ATTR_RE.is_match(attrs) {
        return None;
    }
    let ty = TYPE_ATTR_RE
        .captures(attrs)
        .and_then(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().trim().to_ascii_lowercase())
        .unwrap_or_default();
    if SCRIPT_TYPES.contains(&ty.as_str()) {
        Some(ty == "module")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl HtmlContext for Marker {
        fn url(&self, value: &str) -> String {
            format!("/p/{}", value)
        }
        fn script(&self, source: &str, is_module: bool) -> String {
            format!("[{}:{}]", if is_module { "module" } else { "classic" }, source)
        }
        fn style(&self, source: &str) -> String {
            format!("[css:{}]", source)
        }
    }

    #[test]
    fn test_attributes_keep_quotes_and_case() {
        let html = "<a HREF='x.html'>x</a><img\nsrc=\"i.png\">";
        assert_eq!(
            rewrite_html(html, &Marker, None),
            "<a HREF='/p/x.html'>x</a><img\nsrc=\"/p/i.png\">"
        );
    }

    #[test]
    fn test_other_markup_is_byte_identical() {
        let html = "<!doctype html>\n<p class=a data-x=\"src='no'\">Hi &amp; bye</p>";
        assert_eq!(rewrite_html(html, &Marker, None), html);
    }

    #[test]
    fn test_inline_scripts() {
        let html = "<script>a()</script><SCRIPT type=\"module\">b()</SCRIPT >";
        assert_eq!(
            rewrite_html(html, &Marker, None),
            "<script>[classic:a()]</script><SCRIPT type=\"module\">[module:b()]</SCRIPT >"
        );
    }

    #[test]
    fn test_external_script_body_untouched() {
        let html = "<script src=\"a.js\">ignored()</script>";
        assert_eq!(
            rewrite_html(html, &Marker, None),
            "<script src=\"/p/a.js\">ignored()</script>"
        );
    }

    #[test]
    fn test_data_scripts_untouched() {
        let html = "<script type=\"application/ld+json\">{\"a\":1}</script>";
        assert_eq!(rewrite_html(html, &Marker, None), html);
    }

    #[test]
    fn test_script_body_strings_are_not_markup() {
        let html = "<script>x = ' src=\"q\"';</script>";
        assert_eq!(
            rewrite_html(html, &Marker, None),
            "<script>[classic:x = ' src=\"q\"';]</script>"
        );
    }

    #[test]
    fn test_style_blocks() {
        let html = "<style media=\"all\">a{}</style>";
        assert_eq!(rewrite_html(html, &Marker, None), "<style media=\"all\">[css:a{}]</style>");
    }

    #[test]
    fn test_bootstrap_after_head() {
        let html = "<html><header></header><HEAD lang=en><title>t</title></HEAD></html>";
        assert_eq!(
            rewrite_html(html, &Marker, Some("<!--boot-->")),
            "<html><header></header><HEAD lang=en><!--boot--><title>t</title></HEAD></html>"
        );
    }

    #[test]
    fn test_non_ascii_values_and_text() {
        let html = "<p>日本語</p><a href=\"日本.html\">é</a>";
        assert_eq!(
            rewrite_html(html, &Marker, None),
            "<p>日本語</p><a href=\"/p/日本.html\">é</a>"
        );
    }

    #[test]
    fn test_bootstrap_without_head() {
        assert_eq!(rewrite_html("<p>x</p>", &Marker, Some("<!--boot-->")), "<!--boot--><p>x</p>");
    }
}
