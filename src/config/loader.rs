//! Load config from the process environment (with `.env` support).

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::str::FromStr;

/// Read `ForgeConfig` from environment variables, loading `.env` first if present.
pub fn load_from_env() -> Result<ForgeConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Build config from any key lookup. Unset keys fall back to defaults; set but malformed keys are errors.
pub fn load_from_lookup<F>(lookup: F) -> Result<ForgeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = PoolConfig::default();
    let pool = PoolConfig {
        pool_size: parse_or(&lookup, "DB_POOL_SIZE", defaults.pool_size)?,
        max_overflow: parse_or(&lookup, "DB_MAX_OVERFLOW", defaults.max_overflow)?,
        pool_timeout: parse_or(&lookup, "DB_POOL_TIMEOUT", defaults.pool_timeout)?,
        pool_pre_ping: parse_bool_or(&lookup, "DB_POOL_PRE_PING", defaults.pool_pre_ping)?,
    };
    let db = DbConfig {
        db_type: lookup("DB_TYPE").unwrap_or_else(|| "postgresql".into()),
        driver_type: lookup("DRIVER_TYPE").unwrap_or_else(|| "async".into()),
        host: lookup("DB_HOST").unwrap_or_else(|| "localhost".into()),
        port: parse_or(&lookup, "DB_PORT", 5432)?,
        database: lookup("DB_NAME").unwrap_or_else(|| "postgres".into()),
        user: lookup("DB_USER").unwrap_or_else(|| "postgres".into()),
        password: lookup("DB_PASSWORD").unwrap_or_default(),
        echo: parse_bool_or(&lookup, "DB_ECHO", false)?,
        pool,
    };

    let include_schemas = lookup("FORGE_INCLUDE_SCHEMAS")
        .map(|s| split_list(&s))
        .unwrap_or_else(|| vec!["public".into()]);
    let exclude_tables = lookup("FORGE_EXCLUDE_TABLES")
        .map(|s| split_list(&s))
        .unwrap_or_default();

    let mut info = ForgeInfo::default();
    if let Some(name) = lookup("FORGE_PROJECT_NAME") {
        info.project_name = name;
    }
    if let Some(version) = lookup("FORGE_VERSION") {
        info.version = version;
    }
    info.description = lookup("FORGE_DESCRIPTION");
    info.author = lookup("FORGE_AUTHOR");

    let config = ForgeConfig {
        db,
        include_schemas,
        exclude_tables,
        info,
        environment: lookup("FORGE_ENVIRONMENT").unwrap_or_else(|| "development".into()),
    };
    validate(&config)?;
    Ok(config)
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { key, value: raw }),
        },
    }
}
