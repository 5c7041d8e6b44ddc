//! Push session configuration.

use crate::error::{PushError, PushResult};
use reachme_store::MqttSettings;
use serde::Deserialize;

/// TLS port used when the server doesn't send one.
pub const DEFAULT_PORT: u16 = 8883;

/// Configuration for one push session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Broker user.
    pub username: Option<String>,
    /// Broker password.
    pub password: Option<String>,
    /// Server-assigned device id; the client id is derived from it.
    pub device_id: i64,
    /// Topic presence updates are published to.
    pub chat_topic: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Start every connection without a stored session.
    pub clean_session: bool,
    /// Connect over TLS.
    pub use_tls: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            device_id: 0,
            chat_topic: String::new(),
            keep_alive_secs: 60,
            clean_session: true,
            use_tls: true,
        }
    }
}

impl PushConfig {
    /// Creates a configuration for a broker and device.
    pub fn new(host: impl Into<String>, device_id: i64, chat_topic: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            device_id,
            chat_topic: chat_topic.into(),
            ..Self::default()
        }
    }

    /// Builds a configuration from the MQTT settings of a fetched profile.
    ///
    /// The broker host falls back to the chat host when no MQTT host was
    /// sent. A missing host or chat topic is an error; an unparsable port
    /// falls back to [`DEFAULT_PORT`].
    pub fn from_settings(settings: &MqttSettings) -> PushResult<Self> {
        let host = settings
            .mqtt_hostname
            .as_deref()
            .or(settings.chat_hostname.as_deref())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| PushError::not_configured("no broker host"))?;
        let chat_topic = settings
            .chat_topic
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PushError::not_configured("no chat topic"))?;
        let port = settings
            .mqtt_port_ssl
            .as_deref()
            .or(settings.chat_port_ssl.as_deref())
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let mut config = Self::new(host, settings.device_id, chat_topic).with_port(port);
        if let Some(user) = settings.mqtt_user.as_ref().or(settings.chat_user.as_ref()) {
            let password = settings
                .mqtt_password
                .as_ref()
                .or(settings.chat_password.as_ref());
            config = config.with_credentials(user.clone(), password.cloned());
        }
        Ok(config)
    }

    /// Sets the broker port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the broker credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Sets the keep-alive interval.
    pub fn with_keep_alive(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Enables or disables TLS.
    pub fn with_tls(mut self, enabled: bool) -> Self {
        self.use_tls = enabled;
        self
    }

    /// Returns the client id, which is also the subscribe topic.
    pub fn client_id(&self) -> String {
        format!("iv/pn/device{:012}", self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MqttSettings {
        MqttSettings {
            chat_topic: Some("iv/chat/4242".into()),
            mqtt_hostname: Some("mqtt.example.net".into()),
            mqtt_port_ssl: Some("9883".into()),
            mqtt_user: Some("u-4242".into()),
            mqtt_password: Some("p".into()),
            device_id: 31337,
            ..MqttSettings::default()
        }
    }

    #[test]
    fn client_id_is_zero_padded() {
        let config = PushConfig::new("host", 31337, "topic");
        assert_eq!(config.client_id(), "iv/pn/device000000031337");
    }

    #[test]
    fn from_stored_settings() {
        let config = PushConfig::from_settings(&settings()).unwrap();
        assert_eq!(config.host, "mqtt.example.net");
        assert_eq!(config.port, 9883);
        assert_eq!(config.chat_topic, "iv/chat/4242");
        assert_eq!(config.username.as_deref(), Some("u-4242"));
        assert_eq!(config.password.as_deref(), Some("p"));
        assert!(config.use_tls);
        assert!(config.clean_session);
    }

    #[test]
    fn chat_host_and_bad_port_fall_back() {
        let mut stored = settings();
        stored.mqtt_hostname = None;
        stored.chat_hostname = Some("chat.example.net".into());
        stored.mqtt_port_ssl = Some("not-a-port".into());

        let config = PushConfig::from_settings(&stored).unwrap();
        assert_eq!(config.host, "chat.example.net");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn missing_topic_is_not_configured() {
        let mut stored = settings();
        stored.chat_topic = None;
        assert!(matches!(
            PushConfig::from_settings(&stored),
            Err(PushError::NotConfigured(_))
        ));
    }
}
