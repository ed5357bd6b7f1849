use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::Result;
use crate::presence::DEFAULT_PRESENCE_EVENT;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum accepted HTTP request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Heartbeat interval in seconds (server sends heartbeat frame)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Outbound frames buffered per connection before new frames are dropped
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Event name carrying the online user list
    #[serde(default = "default_presence_event")]
    pub presence_event: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_body_limit() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_heartbeat_interval() -> u64 {
    30 // 30 seconds
}

fn default_channel_buffer_size() -> usize {
    64
}

fn default_presence_event() -> String {
    DEFAULT_PRESENCE_EVENT.to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

impl Settings {
    pub fn new() -> Result<Self> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("websocket.heartbeat_interval", default_heartbeat_interval() as i64)?
            .set_default("presence.presence_event", default_presence_event())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // REALTIME__SERVER__PORT, REALTIME__API__KEY, REALTIME__REDIS__CHANNELS=a,b ...
            .add_source(
                Environment::with_prefix("REALTIME")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .with_list_parse_key("redis.channels"),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            channel_buffer_size: default_channel_buffer_size(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            presence_event: default_presence_event(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            channels: vec![],
        }
    }
}
