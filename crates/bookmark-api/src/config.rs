//! Server configuration read from the environment.
//!
//! Environment variables:
//!   DATABASE_URL        - PostgreSQL connection string
//!   HOST                - bind address (default: "0.0.0.0")
//!   PORT                - bind port (default: 3000)
//!   DEFAULT_PAGE_SIZE   - page size when a list request omits `count`
//!   MAX_PAGE_SIZE       - upper bound on `count`
//!   TOTAL_COUNT_POLICY  - "always", "narrow" or "never"
//!   DB_MAX_CONNECTIONS  - connection pool size
//!   RUN_MIGRATIONS      - "false"/"0" to skip migrations at startup

use std::str::FromStr;

use bookmark_core::defaults;
use bookmark_core::{Error, PaginationConfig, Result, TotalCountPolicy};
use bookmark_db::PoolConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pagination: PaginationConfig,
    pub pool: PoolConfig,
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            pagination: PaginationConfig::default(),
            pool: PoolConfig::default(),
            run_migrations: true,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();

        let default_page_size =
            parse_or(&lookup, "DEFAULT_PAGE_SIZE", defaults::PAGE_SIZE)?;
        let max_page_size = parse_or(&lookup, "MAX_PAGE_SIZE", defaults::MAX_PAGE_SIZE)?;
        let total_count = match lookup("TOTAL_COUNT_POLICY") {
            Some(v) => TotalCountPolicy::from_str(&v)?,
            None => TotalCountPolicy::default(),
        };
        let pagination =
            PaginationConfig::new(default_page_size, max_page_size)?.with_total_count(total_count);

        let mut pool = base.pool;
        if let Some(v) = lookup("DB_MAX_CONNECTIONS") {
            let max = v
                .parse::<u32>()
                .map_err(|_| Error::Config(format!("DB_MAX_CONNECTIONS must be an integer: {}", v)))?;
            pool = pool.max_connections(max);
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(base.database_url),
            host: lookup("HOST").unwrap_or(base.host),
            port: parse_or(&lookup, "PORT", base.port)?,
            pagination,
            pool,
            run_migrations: lookup("RUN_MIGRATIONS")
                .map(|v| !(v == "false" || v == "0"))
                .unwrap_or(base.run_migrations),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, v))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, defaults::SERVER_PORT);
        assert_eq!(config.database_url, defaults::DATABASE_URL);
        assert_eq!(config.pagination.default_page_size, defaults::PAGE_SIZE);
        assert_eq!(config.pagination.total_count, TotalCountPolicy::NarrowFilters);
        assert!(config.run_migrations);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DEFAULT_PAGE_SIZE", "20"),
            ("MAX_PAGE_SIZE", "100"),
            ("TOTAL_COUNT_POLICY", "never"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("RUN_MIGRATIONS", "false"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.pagination.default_page_size, 20);
        assert_eq!(config.pagination.max_page_size, 100);
        assert_eq!(config.pagination.total_count, TotalCountPolicy::Never);
        assert_eq!(config.pool.max_connections, 4);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for vars in [
            [("PORT", "http")],
            [("DEFAULT_PAGE_SIZE", "lots")],
            [("TOTAL_COUNT_POLICY", "sometimes")],
            [("DB_MAX_CONNECTIONS", "-1")],
        ] {
            let err = ServerConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{:?}", vars);
        }
    }
}
