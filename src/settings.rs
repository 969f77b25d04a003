//! Port forwarding settings

use crate::portforward::natpmp::{NATPMP_SERVER_PORT, NATPMP_TIMEOUT};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port forwarding settings
///
/// Stored in JSON format and can be loaded/saved from disk.
///
/// # Example
/// ```rust,no_run
/// use tunnelgate::PortForwardSettings;
///
/// // Load settings (returns default if file doesn't exist)
/// let settings = PortForwardSettings::load("portforward.json").expect("Failed to load");
/// settings.validate().expect("Invalid settings");
///
/// println!("Lease: {:?}, renewed every {:?}", settings.lifetime(), settings.refresh_interval());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortForwardSettings {
    /// Requested mapping lifetime in seconds
    pub lifetime_secs: u32,
    /// Delay between two renewals in seconds, shorter than the lifetime
    pub refresh_interval_secs: u64,
    /// Timeout of a single NAT-PMP exchange in milliseconds
    pub request_timeout_ms: u64,
    /// UDP port of the gateway's NAT-PMP service
    pub gateway_port: u16,
}

impl PortForwardSettings {
    /// Load settings from a JSON file
    ///
    /// Missing fields take their default value. A missing or empty file
    /// yields the defaults.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Self = serde_json::from_str(&data)?;

        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }

    /// Check the settings are usable for negotiation and renewal
    pub fn validate(&self) -> Result<()> {
        if self.lifetime_secs == 0 {
            return Err(Error::Config("lifetime cannot be zero".to_string()));
        }

        if self.refresh_interval_secs == 0 {
            return Err(Error::Config("refresh interval cannot be zero".to_string()));
        }

        if self.refresh_interval_secs >= u64::from(self.lifetime_secs) {
            return Err(Error::Config(format!(
                "refresh interval {}s must be shorter than lifetime {}s",
                self.refresh_interval_secs, self.lifetime_secs
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request timeout cannot be zero".to_string()));
        }

        if self.gateway_port == 0 {
            return Err(Error::Config("gateway port cannot be zero".to_string()));
        }

        Ok(())
    }

    /// Requested mapping lifetime
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(u64::from(self.lifetime_secs))
    }

    /// Delay between two renewals
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Timeout of a single NAT-PMP exchange
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for PortForwardSettings {
    fn default() -> Self {
        Self {
            lifetime_secs: 60,
            refresh_interval_secs: 45,
            request_timeout_ms: NATPMP_TIMEOUT.as_millis() as u64,
            gateway_port: NATPMP_SERVER_PORT,
        }
    }
}
