//! CSS `url(...)` rewriting.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CSS_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)url\(([^)]+)\)").expect("CSS url pattern is valid"));

/// Rewrite every `url(...)` reference with `rewrite`, emitting `url("...")`.
pub fn rewrite_css(css: &str, rewrite: impl Fn(&str) -> String) -> String {
    CSS_URL_RE
        .replace_all(css, |caps: &Captures| {
            let raw = caps[1].trim();
            let raw = raw.strip_prefix(['"', '\'']).unwrap_or(raw);
            let raw = raw.strip_suffix(['"', '\'']).unwrap_or(raw);
            format!("url(\"{}\")", rewrite(raw))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(url: &str) -> String {
        format!("/p/{}", url)
    }

    #[test]
    fn test_quoted_and_bare_urls() {
        let css = "a{background:url('x.png')} b{src:URL( \"f.woff\" )} c{d:url(y.gif)}";
        assert_eq!(
            rewrite_css(css, tag),
            "a{background:url(\"/p/x.png\")} b{src:url(\"/p/f.woff\")} c{d:url(\"/p/y.gif\")}"
        );
    }

    #[test]
    fn test_text_without_urls_is_untouched() {
        let css = "body { color: red; }";
        assert_eq!(rewrite_css(css, tag), css);
    }
}
