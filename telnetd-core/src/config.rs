use serde::Deserialize;

use crate::error::{ConfigError, Error};

/// Run-time capabilities for one engine instance.
///
/// The historical daemon compiled these in or out; here the embedding
/// daemon decides per deployment and hands the result to
/// [`Engine::new`](crate::engine::Engine::new).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Negotiate RFC 2941 AUTHENTICATION and forward its suboptions.
    pub authentication: bool,

    /// Negotiate RFC 2946 ENCRYPT and forward its suboptions.
    pub encryption: bool,

    /// Probe the first OLD_ENVIRON frame for clients that swap the VAR
    /// and VALUE tag bytes. When disabled the conventional assignment is
    /// assumed.
    pub env_tag_heuristic: bool,

    /// Offer linemode on our own initiative. When off the server runs
    /// character-at-a-time and never probes for kludge linemode, though
    /// a client that asks can still get it.
    pub linemode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            authentication: false,
            encryption: false,
            env_tag_heuristic: true,
            linemode: true,
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML, e.g. the `[telnet]` table of the daemon's
    /// config file.
    ///
    /// # Errors
    ///
    /// Returns an error when the TOML doesn't deserialize.
    pub fn from_toml_str(raw: &str) -> Result<Self, Error> {
        Ok(toml::from_str(raw).map_err(ConfigError::from)?)
    }
}
