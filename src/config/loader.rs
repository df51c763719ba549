//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{HandlerKind, TidemarkConfig};
use crate::config::secret_string;
use crate::domain::errors::TidemarkError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Prefix of every override variable
const ENV_PREFIX: &str = "TIDEMARK_";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`TidemarkConfig`]
/// 4. Applies environment variable overrides (`TIDEMARK_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `TidemarkError::Configuration` if the file cannot be read, a
/// referenced variable is unset, parsing fails, an override has the wrong
/// type, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use tidemark::config::loader::load_config;
///
/// let config = load_config("tidemark.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TidemarkConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(TidemarkError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        TidemarkError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Same as [`load_config`] for configuration already in memory
pub fn load_config_from_str(contents: &str) -> Result<TidemarkConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: TidemarkConfig = toml::from_str(&contents)
        .map_err(|e| TidemarkError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        TidemarkError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| TidemarkError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(TidemarkError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Read `TIDEMARK_<key>`
fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}")).ok()
}

/// Read and parse `TIDEMARK_<key>`
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_var(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            TidemarkError::Configuration(format!(
                "Invalid value for {ENV_PREFIX}{key}: '{raw}'"
            ))
        }),
    }
}

/// Applies environment variable overrides using the `TIDEMARK_*` prefix
///
/// Variables follow the pattern `TIDEMARK_<SECTION>_<KEY>`, for example
/// `TIDEMARK_FEED_COLLECTIONS` or `TIDEMARK_LEADERSHIP_ENABLED`.
fn apply_env_overrides(config: &mut TidemarkConfig) -> Result<()> {
    // Application
    if let Some(val) = env_var("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // PostgreSQL
    if let Some(val) = env_var("POSTGRESQL_CONNECTION_STRING") {
        config.postgresql.connection_string = secret_string(val);
    }
    if let Some(val) = env_parse("POSTGRESQL_MAX_CONNECTIONS")? {
        config.postgresql.max_connections = val;
    }

    // Feed
    if let Some(val) = env_var("FEED_COLLECTIONS") {
        config.feed.collections = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(val) = env_var("FEED_EVENTS_TABLE") {
        config.feed.events_table = val;
    }
    if let Some(val) = env_var("FEED_RESUME_TOKEN_TABLE") {
        config.feed.resume_token_table = val;
    }
    if let Some(val) = env_parse("FEED_POLL_INTERVAL_MS")? {
        config.feed.poll_interval_ms = val;
    }
    if let Some(val) = env_parse("FEED_BATCH_SIZE")? {
        config.feed.batch_size = val;
    }

    // Leadership
    if let Some(val) = env_parse("LEADERSHIP_ENABLED")? {
        config.leadership.enabled = val;
    }
    if let Some(val) = env_var("LEADERSHIP_GROUP") {
        config.leadership.group = val;
    }
    if let Some(val) = env_parse("LEADERSHIP_TTL_MS")? {
        config.leadership.ttl_ms = val;
    }
    if let Some(val) = env_parse("LEADERSHIP_WAIT_MS")? {
        config.leadership.wait_ms = val;
    }
    if let Some(val) = env_parse("LEADERSHIP_RECHECK_ON_RECONNECT")? {
        config.leadership.recheck_on_reconnect = val;
    }

    // Handler
    if let Some(val) = env_var("HANDLER_KIND") {
        config.handler.kind = match val.to_lowercase().as_str() {
            "log" => HandlerKind::Log,
            "webhook" => HandlerKind::Webhook,
            other => {
                return Err(TidemarkError::Configuration(format!(
                    "Invalid value for {ENV_PREFIX}HANDLER_KIND: '{other}' (expected log or webhook)"
                )))
            }
        };
    }
    if let Some(val) = env_var("HANDLER_URL") {
        config.handler.url = Some(val);
    }

    // Logging
    if let Some(val) = env_parse("LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env_var("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = env_parse("LOGGING_JSON")? {
        config.logging.json = val;
    }

    Ok(())
}
