//! Configuration for the sync coordinator.

use reachme_protocol::{RequestContext, SimInfo};
use reachme_store::ContactMatch;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Endpoint every command is posted to.
    pub server_url: String,
    /// Rows requested by a foreground message fetch.
    pub foreground_page_size: u32,
    /// Rows requested by a background message fetch.
    pub background_page_size: u32,
    /// How server phone numbers are matched against contact ids.
    pub contact_match: ContactMatch,
    /// Device and client identification sent with every request.
    pub context: RequestContext,
    /// SIM used when the profile doesn't carry one.
    pub sim: SimInfo,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080/iv".to_string(),
            foreground_page_size: 1000,
            background_page_size: 500,
            contact_match: ContactMatch::default(),
            context: RequestContext::new(uuid::Uuid::new_v4().to_string()),
            sim: SimInfo::default(),
            timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    /// Creates a configuration for a server URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Sets the device id.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.context.device_id = device_id.into();
        self
    }

    /// Sets the client identification.
    pub fn with_client(
        mut self,
        app_id: impl Into<String>,
        version: impl Into<String>,
        os: impl Into<String>,
    ) -> Self {
        self.context = self.context.with_app_id(app_id).with_client(version, os);
        self
    }

    /// Sets the page sizes for foreground and background fetches.
    pub fn with_page_sizes(mut self, foreground: u32, background: u32) -> Self {
        self.foreground_page_size = foreground;
        self.background_page_size = background;
        self
    }

    /// Sets the contact matching mode.
    pub fn with_contact_match(mut self, mode: ContactMatch) -> Self {
        self.contact_match = mode;
        self
    }

    /// Sets the fallback SIM.
    pub fn with_sim(mut self, sim: SimInfo) -> Self {
        self.sim = sim;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.foreground_page_size, 1000);
        assert_eq!(config.background_page_size, 500);
        assert_eq!(config.contact_match, ContactMatch::Substring);
        assert!(!config.context.device_id.is_empty());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new("https://rm.test/iv")
            .with_device_id("dev-1")
            .with_client("rm", "2.1.0", "ios")
            .with_contact_match(ContactMatch::Exact)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.server_url, "https://rm.test/iv");
        assert_eq!(config.context.device_id, "dev-1");
        assert_eq!(config.context.client_os, "ios");
        assert_eq!(config.contact_match, ContactMatch::Exact);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn from_json() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"server_url": "https://rm.test/iv", "contact_match": "exact",
                "context": {"device_id": "dev-9"}}"#,
        )
        .unwrap();
        assert_eq!(config.contact_match, ContactMatch::Exact);
        assert_eq!(config.context.device_id, "dev-9");
        assert_eq!(config.foreground_page_size, 1000);
    }
}
