use std::env;
use std::time::Duration;

pub const DEFAULT_PROVIDER_URL: &str = "https://openexchangerates.org/api";
pub const DEFAULT_RATE_SOURCE: &str = "openexchangerates.org";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Open Exchange Rates `app_id`. Empty means not configured.
    pub api_key: String,
    pub timeout: Duration,
    pub source: String,
}

impl ProviderConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(10),
            source: DEFAULT_RATE_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// In-memory stores are used when unset.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub provider: ProviderConfig,
    /// User attached to new conversions when it exists.
    pub default_user_id: Option<i64>,
}

impl Config {
    pub fn from_env() -> Self {
        let mut provider = ProviderConfig::new(
            &env::var("OPEN_EXCHANGE_BASE_URL").unwrap_or_else(|_| DEFAULT_PROVIDER_URL.into()),
            &env::var("OPEN_EXCHANGE_API_KEY").unwrap_or_default(),
        );
        provider.timeout = Duration::from_secs(parse_var("PROVIDER_TIMEOUT_SECS").unwrap_or(10));
        if let Ok(source) = env::var("RATE_SOURCE") {
            provider.source = source;
        }

        Self {
            host: env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("APP_PORT").unwrap_or(8080),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS").unwrap_or(5),
            provider,
            default_user_id: match env::var("DEFAULT_USER_ID") {
                Ok(v) if v.trim().eq_ignore_ascii_case("none") => None,
                Ok(v) => v.trim().parse().ok(),
                Err(_) => Some(1),
            },
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
