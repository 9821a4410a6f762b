//! Configuration for the [`Controller`](crate::Controller)

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Manufacturer string Sonos devices announce
pub const SONOS_MANUFACTURER: &str = "Sonos, Inc.";

/// Service type whose announcement creates a device
pub const ZONE_SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:RenderingControl:1";

/// State variable carrying AVTransport and RenderingControl changes
pub const LAST_CHANGE_VARIABLE: &str = "LastChange";

/// Environment variable overriding [`ControllerConfig::search_timeout_secs`]
pub const ENV_SEARCH_TIMEOUT: &str = "SONOS_SEARCH_TIMEOUT_SECS";

/// Environment variable overriding [`ControllerConfig::manufacturer`]
pub const ENV_MANUFACTURER: &str = "SONOS_MANUFACTURER";

/// Configuration for device classification and the indexing search window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Manufacturer whose services are tracked; everything else is ignored
    /// Default: "Sonos, Inc."
    pub manufacturer: String,

    /// Service type that identifies a zone-capable device
    /// Default: RenderingControl:1
    pub zone_service_type: String,

    /// Name of the state variable forwarded to devices as a notification
    /// Default: "LastChange"
    pub state_variable: String,

    /// How long `index_rooms` keeps the search active
    /// Default: 30 seconds
    pub search_timeout_secs: u64,

    /// Port used to build each device's base URL
    /// Default: 1400
    pub control_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            manufacturer: SONOS_MANUFACTURER.to_string(),
            zone_service_type: ZONE_SERVICE_TYPE.to_string(),
            state_variable: LAST_CHANGE_VARIABLE.to_string(),
            search_timeout_secs: 30,
            control_port: soap_client::DEFAULT_CONTROL_PORT,
        }
    }
}

impl ControllerConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Apply `SONOS_SEARCH_TIMEOUT_SECS` and `SONOS_MANUFACTURER` from the
    /// process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// logged and ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SEARCH_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.search_timeout_secs = secs,
                Err(_) => tracing::warn!(
                    variable = ENV_SEARCH_TIMEOUT,
                    value = %raw,
                    "ignoring invalid search timeout"
                ),
            }
        }

        if let Some(manufacturer) = lookup(ENV_MANUFACTURER) {
            if !manufacturer.trim().is_empty() {
                self.manufacturer = manufacturer;
            }
        }

        self
    }

    /// Set the search window
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout_secs = timeout.as_secs();
        self
    }

    /// The search window as a `Duration`
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}
