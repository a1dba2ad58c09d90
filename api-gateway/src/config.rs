//! Application configuration

use std::env;

use profile_service::ProfileServiceConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listening address
    pub addr: String,
    /// Key expected in the `x-api-key` header of gated routes
    pub api_key: Option<String>,
    /// Profile store configuration
    pub service: ProfileServiceConfig,
}

impl AppConfig {
    /// Create a new configuration from environment variables
    pub fn new() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        Self {
            addr: format!("{}:{}", host, port),
            api_key: env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            service: ProfileServiceConfig::from_env(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
