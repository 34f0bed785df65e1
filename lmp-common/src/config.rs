//! Configuration file resolution shared by Linkmart services.
//!
//! Resolution priority: explicit env-var path, then `./<service>.toml`,
//! then built-in defaults. Services layer their own env-var overrides for
//! individual fields on top of whatever this returns.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing::{debug, info};

/// Resolve the config file path for a service, if one exists.
///
/// Checks `LMP_<SERVICE>_CONFIG` (service name uppercased, dashes to
/// underscores), then `./<service>.toml` in the working directory.
pub fn resolve_config_file(service: &str) -> Option<PathBuf> {
    let env_key = format!(
        "LMP_{}_CONFIG",
        service.to_uppercase().replace('-', "_")
    );
    if let Ok(path) = std::env::var(&env_key) {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Config for {} from {} = {}", service, env_key, path.display());
            return Some(path);
        }
        debug!("{} set but {} does not exist, ignoring", env_key, path.display());
    }

    let local = PathBuf::from(format!("{}.toml", service));
    if local.exists() {
        info!("Config for {} from {}", service, local.display());
        return Some(local);
    }

    debug!("No config file for {}, using defaults", service);
    None
}

/// Load a service's TOML config, falling back to `T::default()` when no
/// file is present. A file that exists but fails to parse is an error, not
/// a silent fallback.
pub fn load_toml_config<T>(service: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match resolve_config_file(service) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            toml::from_str(&raw).map_err(|e| {
                Error::Config(format!("Failed to parse {}: {}", path.display(), e))
            })
        }
        None => Ok(T::default()),
    }
}
