//! TOML configuration loading.
//!
//! Connection defaults can come from a file so credentials stay off the
//! command line. Every field is optional; unset fields keep the value of the
//! layer below (built-in defaults, then file, then flags).

use crate::domain::{ConnectionConfig, LocatorError};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Partial connection settings from one configuration layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionOverrides {
    /// Seed host.
    pub host: Option<String>,
    /// Seed port.
    pub port: Option<u16>,
    /// Encrypted transport.
    pub tls: Option<bool>,
    /// Bucket name.
    pub bucket: Option<String>,
    /// SASL username.
    pub username: Option<String>,
    /// SASL password.
    pub password: Option<String>,
    /// Per-operation timeout.
    pub timeout_secs: Option<u64>,
}

impl ConnectionOverrides {
    /// Overwrite the fields of `config` that this layer sets.
    pub fn apply(&self, config: &mut ConnectionConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(tls) = self.tls {
            config.tls = tls;
        }
        if let Some(bucket) = &self.bucket {
            config.bucket = bucket.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    connection: ConnectionOverrides,
    #[serde(default)]
    lookup: LookupSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupSection {
    collection: Option<String>,
    search_all_vbs: Option<bool>,
}

/// Configuration read from a TOML file.
///
/// # Config File Format
///
/// ```toml
/// [connection]
/// host = "10.0.0.5"
/// port = 11210
/// bucket = "travel-sample"
/// username = "ops"
/// password = "s3cret"
/// timeout_secs = 5
///
/// [lookup]
/// collection = "inventory.airline"
/// search_all_vbs = true
/// ```
#[derive(Debug, Default)]
pub struct TomlConfigProvider {
    connection: ConnectionOverrides,
    collection: Option<String>,
    search_all_vbs: Option<bool>,
}

impl TomlConfigProvider {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `LocatorError::Config` if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LocatorError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| LocatorError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "[vbd] Loaded config file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, LocatorError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| LocatorError::Config(e.to_string()))?;
        Ok(Self {
            connection: file.connection,
            collection: file.lookup.collection,
            search_all_vbs: file.lookup.search_all_vbs,
        })
    }

    /// Connection layer of the file.
    pub fn connection(&self) -> &ConnectionOverrides {
        &self.connection
    }

    /// Collection path, when set.
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Full-scan default, when set.
    pub fn search_all_vbs(&self) -> Option<bool> {
        self.search_all_vbs
    }

    /// Built-in defaults with this file applied.
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::default();
        self.connection.apply(&mut config);
        config
    }
}
