// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-level configuration: listen address, default debounce delay,
//! and log verbosity, loaded from an optional ini-style file with
//! CLI-level overrides layered on top.
//!
//! The file is entirely optional, every field has a sane default, and
//! `merge_cli` lets command-line flags win over the file without the file
//! winning over the hardcoded defaults.

use std::path::Path;
use std::time::Duration;

use ini::Ini;

/// The directory/file name this crate looks for under the path passed to
/// the demo binaries.
pub const CONFIG_DIR: &str = ".ot-collab";
pub const CONFIG_FILE: &str = "config";

fn default_listen_addr() -> String {
    "127.0.0.1:4242".to_string()
}

const fn default_debounce_ms() -> u64 {
    0
}

/// Process-level settings. Every field has a default, so a completely
/// absent config file (or a file missing some fields) is always usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub listen_addr: String,
    pub debounce_ms: u64,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            debounce_ms: default_debounce_ms(),
            debug: false,
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Loads overrides from an ini file's `[general]`/default section. A
    /// missing file is not an error — it simply means "use the defaults";
    /// a present file with an unparsable field is.
    ///
    /// # Errors
    ///
    /// Returns an error string if the file exists but cannot be parsed, or
    /// if a present field cannot be parsed into its expected type.
    pub fn from_config_file(config_file: &Path) -> Result<Self, String> {
        let mut config = Self::default();
        if !config_file.exists() {
            return Ok(config);
        }
        let conf = Ini::load_from_file(config_file)
            .map_err(|source| format!("could not read {}: {source}", config_file.display()))?;
        let section = conf.general_section();

        if let Some(raw) = section.get("listen_addr") {
            config.listen_addr = raw.to_string();
        }
        if let Some(raw) = section.get("debounce_ms") {
            config.debounce_ms = raw
                .parse()
                .map_err(|_| format!("config field `debounce_ms` is not a valid integer: {raw:?}"))?;
        }
        if let Some(raw) = section.get("debug") {
            config.debug = raw
                .parse()
                .map_err(|_| format!("config field `debug` is not a valid bool: {raw:?}"))?;
        }
        Ok(config)
    }

    /// Layers CLI-provided overrides on top of `self` (typically the result
    /// of [`Self::from_config_file`]). `None` fields mean "no override,
    /// keep what the file/default had".
    #[must_use]
    pub fn merge_cli(
        mut self,
        listen_addr: Option<String>,
        debounce_ms: Option<u64>,
        debug: Option<bool>,
    ) -> Self {
        if let Some(listen_addr) = listen_addr {
            self.listen_addr = listen_addr;
        }
        if let Some(debounce_ms) = debounce_ms {
            self.debounce_ms = debounce_ms;
        }
        if let Some(debug) = debug {
            self.debug = debug;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_usable_without_a_file() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:4242");
        assert_eq!(config.debounce_delay(), Duration::ZERO);
        assert!(!config.debug);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = AppConfig::from_config_file(Path::new("/nonexistent/ot-collab-config-test")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn cli_overrides_win_over_defaults() {
        let config = AppConfig::default().merge_cli(Some("0.0.0.0:9000".to_string()), Some(150), Some(true));
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.debounce_ms, 150);
        assert!(config.debug);
    }

    #[test]
    fn loads_fields_from_an_ini_file() {
        let dir = std::env::temp_dir().join(format!("ot-collab-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config");
        std::fs::write(&path, "listen_addr=1.2.3.4:5555\ndebounce_ms=300\n").unwrap();

        let config = AppConfig::from_config_file(&path).unwrap();
        assert_eq!(config.listen_addr, "1.2.3.4:5555");
        assert_eq!(config.debounce_ms, 300);
        assert!(!config.debug, "unset fields keep their default");

        std::fs::remove_file(&path).unwrap();
        std::fs::remove_dir(&dir).unwrap();
    }
}
