//! Compiled configuration.
//!
//! A `RuntimeConfig` is what the rest of the crate reads: the validated
//! `ProxyConfig` plus the codec and site-flag regexes built from it. It is
//! swapped as a whole on reload, so readers never observe a half-applied
//! configuration.

use std::sync::Arc;

use arc_swap::ArcSwap;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use url::Url;

use crate::codec::transform::{builtin, CodecTransform};
use crate::codec::UrlCodec;
use crate::config::loader::ConfigError;
use crate::config::schema::{Flag, PartialFlags, ProxyConfig};
use crate::config::validation::{validate_proxy_config, ValidationError};

/// Configuration shared between the server, the pipeline and the controller.
pub type SharedConfig = Arc<ArcSwap<RuntimeConfig>>;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    config: ProxyConfig,
    codec: UrlCodec,
    site_rules: Vec<(Regex, PartialFlags)>,
}

impl RuntimeConfig {
    /// Compile `config` with its named built-in codec.
    pub fn compile(config: ProxyConfig, origin: Url) -> Result<Self, ConfigError> {
        let errors = validate_proxy_config(&config);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        let transform = builtin(&config.codec.algorithm, config.codec.xor_key).map_err(|e| {
            ConfigError::Validation(vec![ValidationError {
                field: "codec.algorithm".to_string(),
                message: e.to_string(),
            }])
        })?;
        Self::build(config, origin, transform)
    }

    /// Compile `config` with a host-supplied transform. `codec.algorithm`
    /// is ignored.
    pub fn with_transform(
        config: ProxyConfig,
        origin: Url,
        transform: Arc<dyn CodecTransform>,
    ) -> Result<Self, ConfigError> {
        let errors: Vec<_> = validate_proxy_config(&config)
            .into_iter()
            .filter(|e| e.field != "codec.algorithm")
            .collect();
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        Self::build(config, origin, transform)
    }

    fn build(
        config: ProxyConfig,
        origin: Url,
        transform: Arc<dyn CodecTransform>,
    ) -> Result<Self, ConfigError> {
        let mut site_rules = Vec::with_capacity(config.site_flags.len());
        let mut errors = Vec::new();
        for (i, rule) in config.site_flags.iter().enumerate() {
            match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
                Ok(re) => site_rules.push((re, rule.flags)),
                Err(e) => errors.push(ValidationError {
                    field: format!("site_flags[{}].pattern", i),
                    message: e.to_string(),
                }),
            }
        }
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        let codec = UrlCodec::new(config.prefix.clone(), origin, transform);
        Ok(Self {
            config,
            codec,
            site_rules,
        })
    }

    /// Compile `config` against this one's origin. The current transform is
    /// kept unless the codec section changed.
    pub fn recompile(&self, config: ProxyConfig) -> Result<Self, ConfigError> {
        let origin = self.origin().clone();
        if config.codec == self.config.codec {
            Self::with_transform(config, origin, Arc::clone(self.codec.transform()))
        } else {
            Self::compile(config, origin)
        }
    }

    /// Wrap into the shared, swappable form.
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(ArcSwap::from_pointee(self))
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn codec(&self) -> &UrlCodec {
        &self.codec
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    pub fn origin(&self) -> &Url {
        self.codec.origin()
    }

    /// Resolve `flag` for `url`: the first site rule that matches and names
    /// the flag wins, otherwise the global value applies.
    pub fn flag_enabled(&self, flag: Flag, url: &Url) -> bool {
        self.site_rules
            .iter()
            .filter(|(re, _)| re.is_match(url.as_str()))
            .find_map(|(_, flags)| flags.get(flag))
            .unwrap_or_else(|| self.config.flags.get(flag))
    }

    /// The configuration as published to execution contexts.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }
}

/// Merge a partial JSON configuration over `base`.
///
/// Objects merge key by key; every other value replaces what was there.
pub fn merge_partial(base: &ProxyConfig, partial: Value) -> Result<ProxyConfig, ConfigError> {
    let mut merged = serde_json::to_value(base).map_err(ConfigError::Json)?;
    merge_json(&mut merged, partial);
    serde_json::from_value(merged).map_err(ConfigError::Json)
}

fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, patch) => *slot = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SiteFlagRule;
    use serde_json::json;

    fn origin() -> Url {
        Url::parse("http://proxy.test").unwrap()
    }

    #[test]
    fn test_site_flags_override_globals() {
        let mut config = ProxyConfig::default();
        config.site_flags.push(SiteFlagRule {
            pattern: "EXAMPLE\\.com".to_string(),
            flags: PartialFlags {
                allow_invalid_js: Some(false),
                ..Default::default()
            },
        });
        config.site_flags.push(SiteFlagRule {
            pattern: "example".to_string(),
            flags: PartialFlags {
                allow_invalid_js: Some(true),
                sourcemaps: Some(false),
                ..Default::default()
            },
        });
        let runtime = RuntimeConfig::compile(config, origin()).unwrap();

        let hit = Url::parse("https://www.example.com/app.js").unwrap();
        let miss = Url::parse("https://other.test/").unwrap();
        assert!(!runtime.flag_enabled(Flag::AllowInvalidJs, &hit));
        assert!(!runtime.flag_enabled(Flag::SourceMaps, &hit));
        assert!(runtime.flag_enabled(Flag::AllowInvalidJs, &miss));
        assert!(runtime.flag_enabled(Flag::SourceMaps, &miss));
    }

    #[test]
    fn test_unknown_codec_is_fatal() {
        let mut config = ProxyConfig::default();
        config.codec.algorithm = "rot13".to_string();
        assert!(matches!(
            RuntimeConfig::compile(config, origin()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_merge_partial_keeps_unnamed_fields() {
        let merged = merge_partial(
            &ProxyConfig::default(),
            json!({ "prefix": "/p/", "flags": { "syncxhr": true } }),
        )
        .unwrap();
        assert_eq!(merged.prefix, "/p/");
        assert!(merged.flags.syncxhr);
        assert!(merged.flags.serviceworkers);
        assert_eq!(merged.files.all, "/dist/webrascal.all.js");
    }

    #[test]
    fn test_merge_partial_rejects_wrong_types() {
        assert!(merge_partial(&ProxyConfig::default(), json!({ "prefix": 3 })).is_err());
    }
}
