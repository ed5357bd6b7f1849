mod settings;

pub use settings::{
    ApiConfig, LogConfig, LogFormat, PresenceConfig, RedisConfig, ServerConfig, Settings,
    WebSocketConfig,
};
