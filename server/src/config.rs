//! Process configuration loaded from environment variables.
//!
//! DESIGN
//! ======
//! Every knob has a default so the server starts with no environment at all:
//! an unset `DATABASE_URL` selects the in-memory store. `main` loads `.env`
//! (via `dotenvy`) before calling [`ServerConfig::from_env`].

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_MESSAGE_HISTORY_LIMIT: usize = 50;

/// Upper bound for `?limit=` on the message history endpoint.
pub const MAX_MESSAGE_HISTORY_LIMIT: usize = 500;

/// Top-level server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres connection string. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Outbound frame buffer per websocket connection.
    pub client_channel_capacity: usize,
    /// Default number of chat messages returned by the history endpoint.
    pub message_history_limit: usize,
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            client_channel_capacity: env_parse("CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY).max(1),
            message_history_limit: env_parse("MESSAGE_HISTORY_LIMIT", DEFAULT_MESSAGE_HISTORY_LIMIT)
                .clamp(1, MAX_MESSAGE_HISTORY_LIMIT),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            message_history_limit: DEFAULT_MESSAGE_HISTORY_LIMIT,
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when the
/// variable is unset or unparsable.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
