use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub session_idle_minutes: i64,
    pub bcrypt_cost: u32,
    pub seed_sample_data: bool,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        let database_url = var("DATABASE_URL")
            .or_else(|| var("DATABASE_PATH"))
            .unwrap_or_else(|| {
                info!("DATABASE_URL not set, using default: restaurant.db");
                "restaurant.db".to_string()
            });

        let config = Self {
            host: try_load("HOST", "0.0.0.0")?,
            port: try_load("PORT", "5000")?,
            database_path: database_path(&database_url),
            log_dir: log_dir(),
            session_idle_minutes: try_load("SESSION_IDLE_MINUTES", "720")?,
            bcrypt_cost: try_load("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
            seed_sample_data: try_load("SEED_SAMPLE_DATA", "true")?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.session_idle_minutes < 1 {
            return Err(AppError::Config(
                "SESSION_IDLE_MINUTES must be at least 1".into(),
            ));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(AppError::Config("BCRYPT_COST must be between 4 and 31".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read on its own so logging can start before the rest of the config.
pub fn log_dir() -> PathBuf {
    PathBuf::from(var("LOG_DIR").unwrap_or_else(|| "logs".to_string()))
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        AppError::Config(format!("invalid {key} value {raw:?}: {e}"))
    })
}

/// Accepts a bare path or a `sqlite://` URL.
fn database_path(url: &str) -> PathBuf {
    let trimmed = url.trim();
    let path = trimmed
        .strip_prefix("sqlite:///")
        .or_else(|| trimmed.strip_prefix("sqlite://"))
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sqlite_url_prefixes() {
        assert_eq!(database_path("restaurant.db"), PathBuf::from("restaurant.db"));
        assert_eq!(database_path("sqlite:///data/pos.db"), PathBuf::from("data/pos.db"));
        assert_eq!(database_path("sqlite://pos.db"), PathBuf::from("pos.db"));
        assert_eq!(database_path("sqlite:pos.db"), PathBuf::from("pos.db"));
    }

    #[test]
    fn try_load_falls_back_and_rejects_garbage() {
        let port: u16 = try_load("POS_TEST_UNSET_PORT", "5000").unwrap();
        assert_eq!(port, 5000);

        env::set_var("POS_TEST_BAD_PORT", "not-a-port");
        assert!(matches!(
            try_load::<u16>("POS_TEST_BAD_PORT", "5000"),
            Err(AppError::Config(_))
        ));
        env::remove_var("POS_TEST_BAD_PORT");
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config {
            host: "127.0.0.1".into(),
            port: 5000,
            database_path: "restaurant.db".into(),
            log_dir: "logs".into(),
            session_idle_minutes: 720,
            bcrypt_cost: 4,
            seed_sample_data: false,
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "127.0.0.1:5000");

        config.bcrypt_cost = 2;
        assert!(config.validate().is_err());
        config.bcrypt_cost = 4;
        config.session_idle_minutes = 0;
        assert!(config.validate().is_err());
    }
}
