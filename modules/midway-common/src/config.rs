use std::env;

/// Application configuration loaded from environment variables.
/// Everything has a sane default; nothing here is secret except the
/// optional rendering-service token.
#[derive(Debug, Clone)]
pub struct Config {
    // Geocoding
    pub geocode_base_url: String,
    pub geocode_user_agent: String,

    // Rendering service for JS-heavy list pages
    pub browserless_url: String,
    pub browserless_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            geocode_base_url: env::var("GEOCODE_BASE_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            geocode_user_agent: env::var("GEOCODE_USER_AGENT")
                .unwrap_or_else(|_| "midway/0.1".to_string()),
            browserless_url: env::var("BROWSERLESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
        }
    }
}
