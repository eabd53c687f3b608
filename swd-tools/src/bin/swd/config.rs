use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// The configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "swd.toml";

/// Environment variables are `SWD_` followed by the key in upper case.
const ENV_PREFIX: &str = "SWD_";

/// Settings of a run.
///
/// Each value is taken from the first source that sets it: command line,
/// `SWD_*` environment variables, the configuration file, built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Start or end of the serial number of the ST-Link to use.
    pub serial: String,
    /// SWD frequency in Hz.
    pub frequency: u32,
    /// Timeout of a single USB transfer.
    pub timeout_ms: u64,
    /// Verbosity of memory dumps.
    pub verbose: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: String::new(),
            frequency: 1_800_000,
            timeout_ms: 1000,
            verbose: 0,
        }
    }
}

/// Values given on the command line. `None` leaves the value to the
/// other sources.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<u8>,
}

impl Config {
    fn figment(path: Option<&Path>, overrides: &Overrides) -> Figment {
        let file = path.unwrap_or(Path::new(CONFIG_FILE));

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(
                Env::prefixed(ENV_PREFIX).only(&["serial", "frequency", "timeout_ms", "verbose"]),
            )
            .merge(Serialized::defaults(overrides))
    }

    /// Loads the configuration, reading `path` instead of [`CONFIG_FILE`]
    /// if given. A missing file is not an error.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(path, overrides).extract()?;
        tracing::debug!("Using configuration {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|_jail| {
            assert_eq!(Config::load(None, &Overrides::default())?, Config::default());
            Ok(())
        });
    }

    #[test]
    fn layers_override_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                    serial = "066DFF"
                    frequency = 4000000
                    verbose = 1
                "#,
            )?;
            jail.set_env("SWD_FREQUENCY", "480000");

            let overrides = Overrides {
                verbose: Some(2),
                ..Default::default()
            };
            let config = Config::load(None, &overrides)?;

            assert_eq!(
                config,
                Config {
                    serial: "066DFF".to_string(),
                    frequency: 480_000,
                    timeout_ms: 1000,
                    verbose: 2,
                }
            );
            Ok(())
        });
    }

    #[test]
    fn explicit_config_path() {
        Jail::expect_with(|jail| {
            jail.create_file("probe.toml", "timeout_ms = 200")?;

            let config = Config::load(Some(Path::new("probe.toml")), &Overrides::default())?;
            assert_eq!(config.timeout_ms, 200);
            Ok(())
        });
    }

    #[test]
    fn unrelated_environment_is_ignored() {
        Jail::expect_with(|jail| {
            jail.set_env("SWD_CONFIG", "other.toml");

            assert_eq!(Config::load(None, &Overrides::default())?, Config::default());
            Ok(())
        });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE, "speed = 100")?;

            assert!(Config::load(None, &Overrides::default()).is_err());
            Ok(())
        });
    }
}
