//! Config validation: supported backend, sane pool, well-formed schema scope.

use crate::config::ForgeConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

const SUPPORTED_DB_TYPES: &[&str] = &["postgresql", "postgres"];
const DRIVER_TYPES: &[&str] = &["sync", "async"];

/// Plain PostgreSQL identifier as used in schema names: letters, digits, `_`, `$`, not starting with a digit.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 63 && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

pub fn validate(config: &ForgeConfig) -> Result<(), ConfigError> {
    let db_type = config.db.db_type.to_lowercase();
    if !SUPPORTED_DB_TYPES.contains(&db_type.as_str()) {
        return Err(ConfigError::UnsupportedDatabase(config.db.db_type.clone()));
    }
    if !DRIVER_TYPES.contains(&config.db.driver_type.to_lowercase().as_str()) {
        return Err(ConfigError::InvalidValue {
            key: "driver_type",
            value: config.db.driver_type.clone(),
        });
    }
    if config.db.pool.pool_size == 0 {
        return Err(ConfigError::InvalidValue {
            key: "pool_size",
            value: "0".into(),
        });
    }
    if config.include_schemas.is_empty() {
        return Err(ConfigError::Validation("at least one schema must be included".into()));
    }

    let mut seen = HashSet::new();
    for schema in &config.include_schemas {
        if !is_valid_identifier(schema) {
            return Err(ConfigError::InvalidIdentifier(schema.clone()));
        }
        if !seen.insert(schema.as_str()) {
            return Err(ConfigError::Validation(format!("schema '{}' listed twice", schema)));
        }
    }
    Ok(())
}
