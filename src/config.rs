use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_read_url: Option<String>,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub variance_max_relative: Decimal,
    pub variance_max_absolute: Decimal,
    pub stale_pending_hours: i64,
    pub stale_scan_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // treating empty DATABASE_URL as unset because docker-compose was setting it to ""
        let mut database_url = non_empty("DATABASE_URL");

        // fallback to loading .env next to the manifest in case working directory isn't set correctly
        if database_url.is_none() {
            let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
            let _ = dotenvy::from_path_override(&env_path);
            database_url = non_empty("DATABASE_URL");
        }

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            database_url: database_url.ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?,
            database_read_url: non_empty("DATABASE_READ_URL"),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            run_migrations: env::var("RUN_MIGRATIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            variance_max_relative: Decimal::from_str(
                &env::var("VARIANCE_MAX_RELATIVE").unwrap_or_else(|_| "0.02".to_string()),
            )?,
            variance_max_absolute: Decimal::from_str(
                &env::var("VARIANCE_MAX_ABSOLUTE").unwrap_or_else(|_| "100".to_string()),
            )?,
            stale_pending_hours: env::var("STALE_PENDING_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,
            stale_scan_interval_secs: env::var("STALE_SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_STALE_PENDING_HOURS).contains(&self.stale_pending_hours) {
            anyhow::bail!(
                "STALE_PENDING_HOURS must be between 1 and {}, got {}",
                MAX_STALE_PENDING_HOURS,
                self.stale_pending_hours
            );
        }
        if self.stale_scan_interval_secs == 0 {
            anyhow::bail!("STALE_SCAN_INTERVAL_SECS must be at least 1");
        }
        if self.variance_max_relative.is_sign_negative() || self.variance_max_absolute.is_sign_negative() {
            anyhow::bail!("variance limits must not be negative");
        }
        Ok(())
    }
}

/// A year; anything longer means the monitor is effectively off.
pub const MAX_STALE_PENDING_HOURS: i64 = 24 * 366;

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/handovers".to_string(),
            database_read_url: None,
            db_max_connections: 5,
            run_migrations: true,
            variance_max_relative: Decimal::new(2, 2),
            variance_max_absolute: Decimal::new(100, 0),
            stale_pending_hours: 24,
            stale_scan_interval_secs: 300,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_stale_hours_out_of_range() {
        for hours in [0, -5, MAX_STALE_PENDING_HOURS + 1, i64::MAX] {
            let mut config = config();
            config.stale_pending_hours = hours;
            assert!(config.validate().is_err(), "{hours}");
        }
    }

    #[test]
    fn test_zero_scan_interval() {
        let mut config = config();
        config.stale_scan_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_tolerance() {
        let mut config = config();
        config.variance_max_absolute = Decimal::new(-1, 0);
        assert!(config.validate().is_err());
    }
}
