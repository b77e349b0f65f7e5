//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 64)
    pub body_limit_kb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL; in-memory storage when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Interval between sweeps of expired challenges in seconds (default: 60)
    pub challenge_sweep_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 64,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            challenge_sweep_secs: 60,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty());

        Self {
            port: env_parse("PORT", defaults.port),
            host,
            allowed_origins,
            body_limit_kb: env_parse("BODY_LIMIT_KB", defaults.body_limit_kb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            database_url,
            database_max_connections: env_parse(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            challenge_sweep_secs: env_parse("CHALLENGE_SWEEP_SECS", defaults.challenge_sweep_secs),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(!config.rate_limit_enabled);
        assert!(config.database_url.is_none());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_env_parse_falls_back() {
        assert_eq!(env_parse("PASSGATE_TEST_UNSET_VARIABLE", 42u32), 42);
    }
}
