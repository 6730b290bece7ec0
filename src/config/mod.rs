//! Configuration module for Keepr.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;
use crate::rollover::DayBoundary;

/// Remote auth (GoTrue/Supabase) connection settings.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Public anon key sent as the `apikey` header
    pub anon_key: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for the local API (unset disables API auth)
    pub api_psk: Option<String>,
    /// Path to the SQLite device-storage file
    pub db_path: PathBuf,
    /// Address to bind the local API to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Remote auth settings; `None` runs with offline auth
    pub supabase: Option<SupabaseConfig>,
    /// How often the rollover watcher re-checks the date
    pub rollover_interval: Duration,
    /// Which calendar the "today" date is taken from
    pub day_boundary: DayBoundary,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_psk = var("KEEPR_API_PSK").filter(|s| !s.is_empty());

        let db_path = var("KEEPR_DB_PATH")
            .unwrap_or_else(|| "./data/keepr.sqlite".to_string())
            .into();

        let bind_addr = var("KEEPR_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid KEEPR_BIND_ADDR format".to_string()))?;

        let log_level = var("KEEPR_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let supabase = match (var("KEEPR_SUPABASE_URL"), var("KEEPR_SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) if !url.is_empty() && !anon_key.is_empty() => {
                Some(SupabaseConfig {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key,
                })
            }
            _ => None,
        };

        let rollover_secs: u64 = match var("KEEPR_ROLLOVER_INTERVAL_SECS") {
            Some(raw) => raw.parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
                AppError::Validation(
                    "KEEPR_ROLLOVER_INTERVAL_SECS must be a positive integer".to_string(),
                )
            })?,
            None => 60,
        };

        let day_boundary = match var("KEEPR_DAY_BOUNDARY") {
            Some(raw) => raw
                .parse::<DayBoundary>()
                .map_err(|e| AppError::Validation(format!("KEEPR_DAY_BOUNDARY: {}", e)))?,
            None => DayBoundary::Utc,
        };

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            supabase,
            rollover_interval: Duration::from_secs(rollover_secs),
            day_boundary,
        })
    }
}
