//! Key/value system settings with typed accessors for the keys the pages use.

use rusqlite::Connection;
use std::collections::BTreeMap;

use crate::db;
use crate::error::AppError;

pub const STORE_NAME_KEY: &str = "store_name";
pub const POLL_INTERVAL_KEY: &str = "poll_interval_seconds";

pub const DEFAULT_STORE_NAME: &str = "餐廳點餐系統";
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 10;

const MIN_POLL_INTERVAL_SECONDS: u64 = 3;
const MAX_POLL_INTERVAL_SECONDS: u64 = 300;
const MAX_KEY_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct SystemSettings {
    values: BTreeMap<String, String>,
}

impl SystemSettings {
    pub fn load(conn: &Connection) -> Result<Self, AppError> {
        Ok(Self {
            values: db::get_all_settings(conn)?,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn store_name(&self) -> &str {
        self.get(STORE_NAME_KEY)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STORE_NAME)
    }

    /// Staff page polling interval, clamped to a sane range.
    pub fn poll_interval_seconds(&self) -> u64 {
        self.get(POLL_INTERVAL_KEY)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS)
            .clamp(MIN_POLL_INTERVAL_SECONDS, MAX_POLL_INTERVAL_SECONDS)
    }
}

/// Upsert several settings. All keys are validated before anything is written.
pub fn update_many(conn: &Connection, values: &BTreeMap<String, String>) -> Result<(), AppError> {
    for key in values.keys() {
        let trimmed = key.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_KEY_LEN {
            return Err(AppError::invalid(format!("無效的設定名稱: {key}")));
        }
    }
    if let Some(raw) = values.get(POLL_INTERVAL_KEY) {
        if raw.trim().parse::<u64>().is_err() {
            return Err(AppError::invalid("輪詢間隔必須是正整數"));
        }
    }
    for (key, value) in values {
        db::set_setting(conn, key.trim(), value.trim())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_fall_back_and_clamp() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();

        let empty = SystemSettings::load(&conn).unwrap();
        assert_eq!(empty.store_name(), DEFAULT_STORE_NAME);
        assert_eq!(empty.poll_interval_seconds(), DEFAULT_POLL_INTERVAL_SECONDS);

        let mut values = BTreeMap::new();
        values.insert(STORE_NAME_KEY.to_string(), " 巷口小館 ".to_string());
        values.insert(POLL_INTERVAL_KEY.to_string(), "1".to_string());
        update_many(&conn, &values).unwrap();

        let loaded = SystemSettings::load(&conn).unwrap();
        assert_eq!(loaded.store_name(), "巷口小館");
        assert_eq!(loaded.poll_interval_seconds(), MIN_POLL_INTERVAL_SECONDS);
    }

    #[test]
    fn rejects_bad_keys_without_partial_writes() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();

        let mut values = BTreeMap::new();
        values.insert(STORE_NAME_KEY.to_string(), "x".to_string());
        values.insert("  ".to_string(), "y".to_string());
        assert!(update_many(&conn, &values).is_err());
        assert!(db::get_setting(&conn, STORE_NAME_KEY).is_none());

        let mut bad_interval = BTreeMap::new();
        bad_interval.insert(POLL_INTERVAL_KEY.to_string(), "soon".to_string());
        assert!(update_many(&conn, &bad_interval).is_err());
    }
}
