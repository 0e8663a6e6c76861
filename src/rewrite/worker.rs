//! Worker script bootstrap.

use crate::config::RuntimeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// Classic dedicated worker; the runtime is pulled in with `importScripts`.
    Dedicated,
    /// Shared worker, loaded as a module.
    Shared,
}

impl WorkerKind {
    pub fn is_module(self) -> bool {
        matches!(self, WorkerKind::Shared)
    }
}

/// Preamble that reinstalls the client runtime inside the worker realm.
pub fn preamble(cfg: &RuntimeConfig, kind: WorkerKind) -> String {
    let runtime = format!("{}{}", cfg.codec().origin_str(), cfg.proxy().files.all);
    let runtime = serde_json::to_string(&runtime).unwrap_or_else(|_| "\"\"".to_string());
    let config = super::inline_config(cfg);
    let install = "self.$webrascalLoadClient().loadAndHook(self.__WEBRASCAL_CONFIG__);";
    match kind {
        WorkerKind::Dedicated => format!(
            "self.__WEBRASCAL_CONFIG__={};importScripts({});{}\n",
            config, runtime, install
        ),
        WorkerKind::Shared => format!(
            "import {};self.__WEBRASCAL_CONFIG__={};{}\n",
            runtime, config, install
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use url::Url;

    fn cfg() -> RuntimeConfig {
        RuntimeConfig::compile(ProxyConfig::default(), Url::parse("http://proxy.test:8080").unwrap())
            .unwrap()
    }

    #[test]
    fn test_classic_preamble() {
        let p = preamble(&cfg(), WorkerKind::Dedicated);
        assert!(p.starts_with("self.__WEBRASCAL_CONFIG__={"));
        assert!(p.contains("importScripts(\"http://proxy.test:8080/dist/webrascal.all.js\");"));
        assert!(p.ends_with("loadAndHook(self.__WEBRASCAL_CONFIG__);\n"));
    }

    #[test]
    fn test_shared_preamble_uses_import() {
        let p = preamble(&cfg(), WorkerKind::Shared);
        assert!(p.starts_with("import \"http://proxy.test:8080/dist/webrascal.all.js\";"));
        assert!(WorkerKind::Shared.is_module());
    }
}
