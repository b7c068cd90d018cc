use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub pagination: PaginationConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => anyhow::bail!("unknown STORE_BACKEND {other:?}"),
        };
        let database_url = match backend {
            StoreBackend::Postgres => std::env::var("DATABASE_URL").context("DATABASE_URL")?,
            StoreBackend::Memory => std::env::var("DATABASE_URL").unwrap_or_default(),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "socialite".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "socialite-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let pagination = PaginationConfig {
            default_page_size: env_parse("DEFAULT_PAGE_SIZE", 20),
            max_page_size: env_parse("MAX_PAGE_SIZE", 100),
        };
        Ok(Self {
            backend,
            database_url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            pagination,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("SOCIALITE_TEST_PAGE_SIZE", "not-a-number");
        assert_eq!(env_parse("SOCIALITE_TEST_PAGE_SIZE", 20_i64), 20);
        std::env::set_var("SOCIALITE_TEST_PAGE_SIZE", "35");
        assert_eq!(env_parse("SOCIALITE_TEST_PAGE_SIZE", 20_i64), 35);
        assert_eq!(env_parse("SOCIALITE_TEST_MISSING_KEY", 7_u32), 7);
    }
}
