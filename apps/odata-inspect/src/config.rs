use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use odata_adapter::{AdapterConfig, ODataVersion};
use serde::{Deserialize, Serialize};

/// Environment variable prefix; `ODATA_INSPECT__ODATA__VERSION=v2` sets `odata.version`.
pub const ENV_PREFIX: &str = "ODATA_INSPECT__";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset and no `-v` is given.
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
        }
    }
}

/// Effective inspector configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    pub odata: AdapterConfig,
    pub logging: LoggingConfig,
}

/// Command-line values that win over every other layer.
#[derive(Clone, Copy, Debug, Default)]
pub struct CliOverrides {
    pub version: Option<ODataVersion>,
    pub json_logs: bool,
}

impl InspectConfig {
    /// Layered load: defaults, then the YAML file (if any), then `ODATA_INSPECT__*`
    /// environment variables, then CLI overrides.
    ///
    /// # Errors
    /// Fails when the file is missing or any layer does not deserialize.
    pub fn load(path: Option<&Path>, overrides: CliOverrides) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .context("failed to load odata-inspect configuration")?;
        config.apply_cli_overrides(overrides);
        Ok(config)
    }

    pub fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(version) = overrides.version {
            self.odata.version = version;
        }
        if overrides.json_logs {
            self.logging.json = true;
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let cfg = InspectConfig::load(None, CliOverrides::default()).unwrap();
        assert_eq!(cfg.odata.version, ODataVersion::V4);
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn test_yaml_layer_and_cli_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "odata:\n  version: v2\n  normalizer:\n    unknown_type: Thing\nlogging:\n  level: info"
        )
        .unwrap();

        let cfg = InspectConfig::load(Some(file.path()), CliOverrides::default())
            .unwrap();
        assert_eq!(cfg.odata.version, ODataVersion::V2);
        assert_eq!(cfg.odata.normalizer.unknown_type, "Thing");
        assert_eq!(cfg.logging.level, "info");

        let cfg = InspectConfig::load(
            Some(file.path()),
            CliOverrides {
                version: Some(ODataVersion::V4),
                json_logs: true,
            },
        )
        .unwrap();
        assert_eq!(cfg.odata.version, ODataVersion::V4);
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_missing_file_fails() {
        let err = InspectConfig::load(
            Some(Path::new("/definitely/not/here.yaml")),
            CliOverrides::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_invalid_version_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "odata:\n  version: v3").unwrap();
        let loaded = InspectConfig::load(Some(file.path()), CliOverrides::default());
        assert!(loaded.is_err());

    }
}
