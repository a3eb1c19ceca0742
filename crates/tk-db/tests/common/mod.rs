//! Shared fixtures: every backend, opened through the same config path the
//! binary uses.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use tk_core::Meta;
use tk_db::BackendConfig;

/// One of each backend. The temp dir must outlive the stores.
pub fn backends() -> (TempDir, Vec<(&'static str, Box<dyn Meta>)>) {
    let temp = tempfile::tempdir().unwrap();
    let configs = [
        ("memory", BackendConfig::Memory),
        (
            "file",
            BackendConfig::File {
                path: temp.path().join("tk.json"),
            },
        ),
        (
            "sqlite",
            BackendConfig::Sqlite {
                path: temp.path().join("tk.db"),
                busy_timeout_ms: 5_000,
            },
        ),
    ];
    let stores = configs
        .into_iter()
        .map(|(name, config)| (name, tk_db::open(&config).unwrap()))
        .collect();
    (temp, stores)
}

/// A fixed instant so elapsed-time assertions are exact.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}
