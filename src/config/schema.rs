//! Configuration schema definitions.
//!
//! `ProxyConfig` is the part of the configuration every execution context
//! sees: it is inlined into bootstrapped documents, carried by `loadConfig`
//! messages and handed to the external JS rewriter. `ServerConfig` wraps it
//! with the sections only the HTTP server needs.
//!
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Rewriting configuration shared with every execution context.
    #[serde(flatten)]
    pub proxy: ProxyConfig,

    /// Listener configuration (bind address, public origin).
    pub listener: ListenerConfig,

    /// Upstream transport settings.
    pub upstream: UpstreamConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// On-disk client bundles served by this process.
    pub bundle: BundleConfig,
}

/// Rewriting configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Path prefix every proxied URL starts with.
    pub prefix: String,

    /// Names of the globals the rewritten scripts call into.
    pub globals: HookNames,

    /// Locations of the client bundles injected by bootstrap.
    pub files: BootstrapFiles,

    /// Global feature flags.
    pub flags: FlagSet,

    /// Per-site overrides, checked in order. The first rule whose pattern
    /// matches the full URL and names the flag decides it.
    pub site_flags: Vec<SiteFlagRule>,

    /// URL codec selection.
    pub codec: CodecConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            prefix: "/webrascal/".to_string(),
            globals: HookNames::default(),
            files: BootstrapFiles::default(),
            flags: FlagSet::default(),
            site_flags: Vec::new(),
            codec: CodecConfig::default(),
        }
    }
}

/// Hook-name table shared with the external JS rewriter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HookNames {
    pub wrapfn: String,
    pub wrappropertybase: String,
    pub wrappropertyfn: String,
    pub cleanrestfn: String,
    pub importfn: String,
    pub rewritefn: String,
    pub metafn: String,
    pub setrealmfn: String,
    pub pushsourcemapfn: String,
    pub trysetfn: String,
    pub templocid: String,
    pub tempunusedid: String,
}

impl Default for HookNames {
    fn default() -> Self {
        Self {
            wrapfn: "$webrascal$wrap".to_string(),
            wrappropertybase: "$webrascal__".to_string(),
            wrappropertyfn: "$webrascal$prop".to_string(),
            cleanrestfn: "$webrascal$clean".to_string(),
            importfn: "$webrascal$import".to_string(),
            rewritefn: "$webrascal$rewrite".to_string(),
            metafn: "$webrascal$meta".to_string(),
            setrealmfn: "$webrascal$setrealm".to_string(),
            pushsourcemapfn: "$webrascal$pushsourcemap".to_string(),
            trysetfn: "$webrascal$tryset".to_string(),
            templocid: "$webrascal$temploc".to_string(),
            tempunusedid: "$webrascal$tempunused".to_string(),
        }
    }
}

/// Client bundle locations.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapFiles {
    /// Compiled rewriting engine bundle.
    pub wasm: String,
    /// Client runtime bundle (virtualization layer).
    pub all: String,
    /// Controller bundle.
    pub sync: String,
}

impl Default for BootstrapFiles {
    fn default() -> Self {
        Self {
            wasm: "/dist/webrascal.wasm.js".to_string(),
            all: "/dist/webrascal.all.js".to_string(),
            sync: "/dist/webrascal.controller.js".to_string(),
        }
    }
}

/// Names of every feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    ServiceWorkers,
    SyncXhr,
    StrictRewrites,
    RewriterLogs,
    CaptureErrors,
    CleanErrors,
    Rascalitize,
    SourceMaps,
    DestructureRewrites,
    InterceptDownloads,
    AllowInvalidJs,
    AllowFailedIntercepts,
}

/// Feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlagSet {
    pub serviceworkers: bool,
    pub syncxhr: bool,
    pub strict_rewrites: bool,
    pub rewriter_logs: bool,
    pub capture_errors: bool,
    pub clean_errors: bool,
    pub rascalitize: bool,
    pub sourcemaps: bool,
    pub destructure_rewrites: bool,
    pub intercept_downloads: bool,
    pub allow_invalid_js: bool,
    pub allow_failed_intercepts: bool,
}

impl Default for FlagSet {
    fn default() -> Self {
        Self {
            serviceworkers: true,
            syncxhr: false,
            strict_rewrites: true,
            rewriter_logs: false,
            capture_errors: false,
            clean_errors: true,
            rascalitize: false,
            sourcemaps: true,
            destructure_rewrites: true,
            intercept_downloads: true,
            allow_invalid_js: true,
            allow_failed_intercepts: true,
        }
    }
}

impl FlagSet {
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::ServiceWorkers => self.serviceworkers,
            Flag::SyncXhr => self.syncxhr,
            Flag::StrictRewrites => self.strict_rewrites,
            Flag::RewriterLogs => self.rewriter_logs,
            Flag::CaptureErrors => self.capture_errors,
            Flag::CleanErrors => self.clean_errors,
            Flag::Rascalitize => self.rascalitize,
            Flag::SourceMaps => self.sourcemaps,
            Flag::DestructureRewrites => self.destructure_rewrites,
            Flag::InterceptDownloads => self.intercept_downloads,
            Flag::AllowInvalidJs => self.allow_invalid_js,
            Flag::AllowFailedIntercepts => self.allow_failed_intercepts,
        }
    }
}

/// A partial flag set used by site overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PartialFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serviceworkers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syncxhr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_rewrites: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewriter_logs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_errors: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_errors: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rascalitize: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcemaps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructure_rewrites: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intercept_downloads: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_invalid_js: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_failed_intercepts: Option<bool>,
}

impl PartialFlags {
    pub fn get(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::ServiceWorkers => self.serviceworkers,
            Flag::SyncXhr => self.syncxhr,
            Flag::StrictRewrites => self.strict_rewrites,
            Flag::RewriterLogs => self.rewriter_logs,
            Flag::CaptureErrors => self.capture_errors,
            Flag::CleanErrors => self.clean_errors,
            Flag::Rascalitize => self.rascalitize,
            Flag::SourceMaps => self.sourcemaps,
            Flag::DestructureRewrites => self.destructure_rewrites,
            Flag::InterceptDownloads => self.intercept_downloads,
            Flag::AllowInvalidJs => self.allow_invalid_js,
            Flag::AllowFailedIntercepts => self.allow_failed_intercepts,
        }
    }
}

/// Flag overrides for URLs matching `pattern` (case-insensitive regex).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteFlagRule {
    pub pattern: String,
    #[serde(default)]
    pub flags: PartialFlags,
}

/// URL codec selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CodecConfig {
    /// One of `base64`, `urlencode`, `xor`.
    pub algorithm: String,

    /// Key for the `xor` codec.
    pub xor_key: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            algorithm: "base64".to_string(),
            xor_key: 2,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Origin the embedding page sees the proxy under. Used for blob/data
    /// markers and for the anti-loop guard.
    pub public_origin: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_origin: "http://localhost:8080".to_string(),
        }
    }
}

/// Upstream transport configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// User agent sent upstream when the client did not send one.
    pub user_agent: Option<String>,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds. `None` leaves requests unbounded.
    pub request_timeout_secs: Option<u64>,

    /// Honour HTTP(S)_PROXY environment variables.
    pub system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            connect_timeout_secs: 10,
            request_timeout_secs: Some(60),
            system_proxy: false,
        }
    }
}

/// Client bundle sources.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BundleConfig {
    /// Compiled rewriting engine (`.wasm`). When set, `files.wasm` is served
    /// as a script that defines `self.WASM` with the module bytes.
    pub wasm_module: Option<PathBuf>,
}

/// Body limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body accepted from the embedded page.
    pub max_request_body: usize,

    /// Maximum upstream response body buffered for rewriting.
    pub max_upstream_body: usize,

    /// Bytes of an upstream 5xx body shown on the error page.
    pub error_preview_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body: 16 * 1024 * 1024,
            max_upstream_body: 64 * 1024 * 1024,
            error_preview_bytes: 512,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ServerConfig = toml::from_str("prefix = \"/p/\"").unwrap();
        assert_eq!(config.proxy.prefix, "/p/");
        assert_eq!(config.proxy.codec.algorithm, "base64");
        assert!(config.proxy.flags.serviceworkers);
        assert_eq!(config.listener.public_origin, "http://localhost:8080");
    }

    #[test]
    fn test_site_flags_parse_in_order() {
        let raw = r#"
            [[site_flags]]
            pattern = "example\\.com"
            flags = { allow_invalid_js = false }

            [[site_flags]]
            pattern = ".*"
            flags = { sourcemaps = false }
        "#;
        let config: ServerConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.proxy.site_flags.len(), 2);
        assert_eq!(config.proxy.site_flags[0].flags.get(Flag::AllowInvalidJs), Some(false));
        assert_eq!(config.proxy.site_flags[1].flags.get(Flag::AllowInvalidJs), None);
    }
}
