//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the prefix shape and the codec name
//! - Compile every site-flag pattern once so bad regexes fail at load
//! - Check that the public origin and bind address parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::codec::transform::BUILTIN_CODECS;
use crate::config::schema::{ProxyConfig, ServerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a full server configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_proxy_config(&config.proxy);

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match url::Url::parse(&config.listener.public_origin) {
        Ok(origin) if origin.has_host() => {}
        _ => errors.push(ValidationError::new(
            "listener.public_origin",
            format!("'{}' is not an absolute origin", config.listener.public_origin),
        )),
    }

    if config.limits.max_upstream_body == 0 {
        errors.push(ValidationError::new(
            "limits.max_upstream_body",
            "must be greater than zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the client-facing part of the configuration.
///
/// Also used for configurations received through the controller.
pub fn validate_proxy_config(config: &ProxyConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !config.prefix.starts_with('/') || !config.prefix.ends_with('/') {
        errors.push(ValidationError::new(
            "prefix",
            format!("'{}' must start and end with '/'", config.prefix),
        ));
    }

    if !BUILTIN_CODECS.contains(&config.codec.algorithm.as_str()) {
        errors.push(ValidationError::new(
            "codec.algorithm",
            format!(
                "unknown codec '{}' (expected one of {})",
                config.codec.algorithm,
                BUILTIN_CODECS.join(", ")
            ),
        ));
    }

    for (i, rule) in config.site_flags.iter().enumerate() {
        if let Err(e) = regex::RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
        {
            errors.push(ValidationError::new(
                format!("site_flags[{}].pattern", i),
                e.to_string(),
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SiteFlagRule;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServerConfig::default();
        config.proxy.prefix = "webrascal".to_string();
        config.proxy.codec.algorithm = "rot13".to_string();
        config.proxy.site_flags.push(SiteFlagRule {
            pattern: "(".to_string(),
            flags: Default::default(),
        });
        config.listener.public_origin = "not a url".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "prefix",
                "codec.algorithm",
                "site_flags[0].pattern",
                "listener.public_origin"
            ]
        );
    }
}
