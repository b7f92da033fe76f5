use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "FORMULIO_";
/// Separator between nested keys in an override name.
pub const ENV_NESTING: &str = "__";

/// Load configuration from file with environment variable overrides.
///
/// `FORMULIO_RESOLVER__TIMEOUT_SECS=45` overrides `[resolver] timeout_secs`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_layered(path, ENV_PREFIX)
}

fn load_layered(path: &Path, env_prefix: &str) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Toml::file(path))
        .merge(Env::prefixed(env_prefix).split(ENV_NESTING))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse TOML directly, without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
