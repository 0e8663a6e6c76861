//! Site relationship classification.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Value of the `sec-fetch-site` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteDirective {
    None,
    SameOrigin,
    SameSite,
    CrossSite,
}

impl SiteDirective {
    pub fn as_str(self) -> &'static str {
        match self {
            SiteDirective::None => "none",
            SiteDirective::SameOrigin => "same-origin",
            SiteDirective::SameSite => "same-site",
            SiteDirective::CrossSite => "cross-site",
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            SiteDirective::None => 3,
            SiteDirective::SameOrigin => 2,
            SiteDirective::SameSite => 1,
            SiteDirective::CrossSite => 0,
        }
    }
}

impl fmt::Display for SiteDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `target` relative to the page that referred to it.
pub fn get_site_directive(target: &Url, referrer: Option<&Url>) -> SiteDirective {
    let Some(referrer) = referrer else {
        return SiteDirective::None;
    };
    if target.origin() == referrer.origin() {
        return SiteDirective::SameOrigin;
    }
    match (target.host_str(), referrer.host_str()) {
        (Some(a), Some(b)) if registrable_domain(a) == registrable_domain(b) => SiteDirective::SameSite,
        _ => SiteDirective::CrossSite,
    }
}

/// Last two labels of `host`, lower-cased.
pub fn registrable_domain(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }
    labels[labels.len() - 2..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_classification() {
        let target = url("https://www.site.test/a");
        assert_eq!(get_site_directive(&target, None), SiteDirective::None);
        assert_eq!(
            get_site_directive(&target, Some(&url("https://www.site.test/b"))),
            SiteDirective::SameOrigin
        );
        assert_eq!(
            get_site_directive(&target, Some(&url("https://api.site.test/"))),
            SiteDirective::SameSite
        );
        assert_eq!(
            get_site_directive(&target, Some(&url("http://www.site.test/"))),
            SiteDirective::SameSite
        );
        assert_eq!(
            get_site_directive(&target, Some(&url("https://other.test/"))),
            SiteDirective::CrossSite
        );
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("A.B.Example.COM"), "example.com");
        assert_eq!(registrable_domain("localhost"), "localhost");
    }

    #[test]
    fn test_ranks() {
        assert!(SiteDirective::None.rank() > SiteDirective::SameOrigin.rank());
        assert!(SiteDirective::SameSite.rank() > SiteDirective::CrossSite.rank());
        assert_eq!(SiteDirective::CrossSite.to_string(), "cross-site");
    }
}
