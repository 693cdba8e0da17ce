use crate::error::{PeerlinkError, Result};
use std::env;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Signalling server configuration
    pub signal: SignalServerConfig,
    /// Status API configuration
    pub api: ApiServerConfig,
    /// CLI client configuration
    pub client: ClientConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct SignalServerConfig {
    /// Host to bind to (default: localhost)
    pub host: String,
    /// Port for the WebSocket listener (default: 8765)
    pub port: u16,
    /// Seconds between heartbeat messages (default: 3)
    pub heartbeat_interval: u64,
    /// Seconds to wait for the opening handshake message, 0 = wait forever (default: 10)
    pub handshake_timeout: u64,
    /// Seconds without inbound traffic before a session is closed, 0 = never (default: 0)
    pub idle_timeout: u64,
    /// Seconds to wait for sessions to close on shutdown (default: 5)
    pub shutdown_drain: u64,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Serve the status API (default: true)
    pub enabled: bool,
    /// Host to bind to (default: 127.0.0.1)
    pub host: String,
    /// Port for the API server (default: 8766)
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URI the CLI connects to (default: ws://localhost:8765)
    pub uri: String,
    /// Peer identifier announced during the handshake (default: 1234)
    pub peer_id: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl LogConfig {
    /// Load logging settings alone; this never fails, so logging can start
    /// before the rest of the configuration is validated
    pub fn from_env() -> Self {
        Self {
            level: get_env_or("LOG_LEVEL", "info"),
            format: get_env_or("LOG_FORMAT", "pretty"),
        }
    }
}

impl Default for SignalServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8765,
            heartbeat_interval: 3,
            handshake_timeout: 10,
            idle_timeout: 0,
            shutdown_drain: 5,
        }
    }
}

impl SignalServerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.handshake_timeout)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.idle_timeout)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let heartbeat_interval: u64 = parse_env("HEARTBEAT_INTERVAL_SECS", "3")?;
        if heartbeat_interval == 0 {
            return Err(PeerlinkError::InvalidConfig(
                "HEARTBEAT_INTERVAL_SECS must be greater than zero".into(),
            ));
        }

        let peer_id = get_env_or("PEER_ID", "1234");
        if peer_id.is_empty() {
            return Err(PeerlinkError::InvalidConfig(
                "PEER_ID must not be empty".into(),
            ));
        }

        Ok(Config {
            signal: SignalServerConfig {
                host: get_env_or("SIGNAL_HOST", "localhost"),
                port: get_env_or("SIGNAL_PORT", "8765").parse().map_err(|_| {
                    PeerlinkError::InvalidConfig("SIGNAL_PORT must be a valid port number".into())
                })?,
                heartbeat_interval,
                handshake_timeout: parse_env("HANDSHAKE_TIMEOUT_SECS", "10")?,
                idle_timeout: parse_env("IDLE_TIMEOUT_SECS", "0")?,
                shutdown_drain: parse_env("SHUTDOWN_DRAIN_SECS", "5")?,
            },
            api: ApiServerConfig {
                enabled: get_env_or("API_ENABLED", "true").parse().unwrap_or(true),
                host: get_env_or("API_HOST", "127.0.0.1"),
                port: get_env_or("API_PORT", "8766").parse().map_err(|_| {
                    PeerlinkError::InvalidConfig("API_PORT must be a valid port number".into())
                })?,
            },
            client: ClientConfig {
                uri: parse_client_uri(&get_env_or("CLIENT_URI", "ws://localhost:8765"))?,
                peer_id,
            },
            log: LogConfig::from_env(),
        })
    }

    /// Get the signalling server address
    pub fn signal_addr(&self) -> String {
        format!("{}:{}", self.signal.host, self.signal.port)
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_client_uri(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        PeerlinkError::InvalidConfig(format!("CLIENT_URI must be a valid URL: {}", e))
    })?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(PeerlinkError::InvalidConfig(format!(
                "CLIENT_URI has unsupported scheme: {}",
                other
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(PeerlinkError::InvalidConfig(
            "CLIENT_URI must include a host".into(),
        ));
    }

    Ok(url.to_string())
}

fn parse_env(key: &str, default: &str) -> Result<u64> {
    get_env_or(key, default)
        .parse()
        .map_err(|_| PeerlinkError::InvalidConfig(format!("{} must be a valid number", key)))
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "SIGNAL_HOST",
        "SIGNAL_PORT",
        "HEARTBEAT_INTERVAL_SECS",
        "HANDSHAKE_TIMEOUT_SECS",
        "IDLE_TIMEOUT_SECS",
        "SHUTDOWN_DRAIN_SECS",
        "API_ENABLED",
        "API_HOST",
        "API_PORT",
        "CLIENT_URI",
        "PEER_ID",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let config = Config::from_env().unwrap();

        assert_eq!(config.signal.host, "localhost");
        assert_eq!(config.signal.port, 8765);
        assert_eq!(config.signal.heartbeat_interval(), Duration::from_secs(3));
        assert_eq!(
            config.signal.handshake_timeout(),
            Some(Duration::from_secs(10))
        );
        assert_eq!(config.signal.idle_timeout(), None);

        assert!(config.api.enabled);
        assert_eq!(config.api.port, 8766);

        assert_eq!(config.client.uri, "ws://localhost:8765/");
        assert_eq!(config.client.peer_id, "1234");
        assert_eq!(config.log.format, "pretty");
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("SIGNAL_HOST", "0.0.0.0");
        env::set_var("SIGNAL_PORT", "9000");
        env::set_var("HEARTBEAT_INTERVAL_SECS", "15");
        env::set_var("HANDSHAKE_TIMEOUT_SECS", "0");
        env::set_var("IDLE_TIMEOUT_SECS", "120");
        env::set_var("API_ENABLED", "false");
        env::set_var("CLIENT_URI", "wss://signal.example:443/peers");
        env::set_var("PEER_ID", "camera 7");

        let config = Config::from_env().unwrap();

        assert_eq!(config.signal_addr(), "0.0.0.0:9000");
        assert_eq!(config.signal.heartbeat_interval(), Duration::from_secs(15));
        assert_eq!(config.signal.handshake_timeout(), None);
        assert_eq!(
            config.signal.idle_timeout(),
            Some(Duration::from_secs(120))
        );
        assert!(!config.api.enabled);
        assert_eq!(config.client.uri, "wss://signal.example/peers");
        assert_eq!(config.client.peer_id, "camera 7");
    }

    #[test]
    fn test_config_from_env_invalid_port() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("SIGNAL_PORT", "not-a-port");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, PeerlinkError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_env_rejects_zero_heartbeat() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("HEARTBEAT_INTERVAL_SECS", "0");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, PeerlinkError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_env_rejects_http_client_uri() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("CLIENT_URI", "http://localhost:8765");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, PeerlinkError::InvalidConfig(_)));

        env::set_var("CLIENT_URI", "not a url");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, PeerlinkError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_env_rejects_empty_peer_id() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("PEER_ID", "");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, PeerlinkError::InvalidConfig(_)));
    }

    #[test]
    fn test_log_config_loads_despite_invalid_config() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("SIGNAL_PORT", "not-a-port");
        env::set_var("LOG_LEVEL", "debug");
        env::set_var("LOG_FORMAT", "json");

        assert!(Config::from_env().is_err());

        let log = LogConfig::from_env();
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, "json");
    }

    #[test]
    fn test_config_formatters() {
        let config = Config {
            signal: SignalServerConfig::default(),
            api: ApiServerConfig {
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 8766,
            },
            client: ClientConfig {
                uri: "ws://localhost:8765/".to_string(),
                peer_id: "1234".to_string(),
            },
            log: LogConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        assert_eq!(config.signal_addr(), "localhost:8765");
        assert_eq!(config.api_addr(), "127.0.0.1:8766");
    }
}
