use std::env;
use std::time::Duration;

use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub dev_auth_overrides_enabled: bool,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub database_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    pub db_run_migrations: bool,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: Option<String>,
    pub billing_timezone: String,
    pub billing_scheduler_enabled: bool,
    pub billing_run_day: u32,
    pub billing_run_hour: u32,
    pub building_cache_ttl_seconds: u64,
    pub building_cache_max_entries: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Rentdesk API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            dev_auth_overrides_enabled: env_parse_bool_or("DEV_AUTH_OVERRIDES_ENABLED", false),
            rate_limit_enabled: env_parse_bool_or("RATE_LIMIT_ENABLED", true),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            database_url: env_opt("DATABASE_URL"),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: env_parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            db_run_migrations: env_parse_bool_or("DB_RUN_MIGRATIONS", true),
            jwt_secret: env_opt("JWT_SECRET"),
            jwt_issuer: env_opt("JWT_ISSUER"),
            billing_timezone: env_or("BILLING_TIMEZONE", "UTC"),
            billing_scheduler_enabled: env_parse_bool_or("BILLING_SCHEDULER_ENABLED", true),
            billing_run_day: env_parse_or::<u32>("BILLING_RUN_DAY", 1).clamp(1, 28),
            billing_run_hour: env_parse_or::<u32>("BILLING_RUN_HOUR", 2).min(23),
            building_cache_ttl_seconds: env_parse_or("BUILDING_CACHE_TTL_SECONDS", 60),
            building_cache_max_entries: env_parse_or("BUILDING_CACHE_MAX_ENTRIES", 1000),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    pub fn auth_dev_overrides_enabled(&self) -> bool {
        if self.is_production() {
            return false;
        }
        self.dev_auth_overrides_enabled
    }

    /// Zone used to decide "today" and "last month" for bill generation.
    /// Unknown names fall back to UTC.
    pub fn billing_tz(&self) -> Tz {
        match self.billing_timezone.trim().parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(
                    billing_timezone = %self.billing_timezone,
                    "Unknown BILLING_TIMEZONE, using UTC"
                );
                Tz::UTC
            }
        }
    }

    pub fn building_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.building_cache_ttl_seconds.max(1))
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    match env_opt(key).as_deref().map(str::to_ascii_lowercase) {
        Some(value) if value == "1" || value == "true" || value == "yes" || value == "on" => true,
        Some(value) if value == "0" || value == "false" || value == "no" || value == "off" => false,
        Some(_) => default,
        None => default,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
impl AppConfig {
    /// In-memory configuration for handler and service tests.
    pub fn for_tests() -> Self {
        Self {
            app_name: "Rentdesk API".to_string(),
            environment: "test".to_string(),
            api_prefix: "/v1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["http://localhost:3000".to_string()],
            dev_auth_overrides_enabled: true,
            rate_limit_enabled: false,
            rate_limit_per_second: 10,
            rate_limit_burst_size: 100,
            database_url: None,
            db_pool_max_connections: 1,
            db_pool_min_connections: 0,
            db_pool_acquire_timeout_seconds: 1,
            db_pool_idle_timeout_seconds: 60,
            db_run_migrations: false,
            jwt_secret: Some("test-secret".to_string()),
            jwt_issuer: None,
            billing_timezone: "UTC".to_string(),
            billing_scheduler_enabled: false,
            billing_run_day: 1,
            billing_run_hour: 2,
            building_cache_ttl_seconds: 60,
            building_cache_max_entries: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_prefix, parse_csv, AppConfig};

    #[test]
    fn normalizes_prefix() {
        assert_eq!(normalize_prefix("v1"), "/v1");
        assert_eq!(normalize_prefix("/v1/"), "/v1");
        assert_eq!(normalize_prefix(""), "/v1");
    }

    #[test]
    fn splits_csv_and_drops_blanks() {
        assert_eq!(
            parse_csv(" http://a.test, ,http://b.test "),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn billing_timezone_falls_back_to_utc() {
        let mut config = AppConfig::for_tests();
        config.billing_timezone = "Asia/Shanghai".to_string();
        assert_eq!(config.billing_tz(), chrono_tz::Asia::Shanghai);
        config.billing_timezone = "Mars/Olympus".to_string();
        assert_eq!(config.billing_tz(), chrono_tz::Tz::UTC);
    }

    #[test]
    fn production_disables_dev_overrides() {
        let mut config = AppConfig::for_tests();
        assert!(config.auth_dev_overrides_enabled());
        config.environment = "Production".to_string();
        assert!(!config.auth_dev_overrides_enabled());
    }
}
