//! Typed readers for environment variables.
//!
//! Every reader treats a missing or blank variable as "use the default" and
//! reports a bad value as [`ConfigError::Parse`] naming the variable.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Serializes tests that mutate the process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Trimmed value of `key`, `None` when unset or blank.
fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read `key` (or `default`) through `parse`.
fn env_with<T>(
    key: &'static str,
    default: &str,
    parse: impl FnOnce(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    let value = var(key).unwrap_or_else(|| default.to_string());
    parse(&value).map_err(|reason| ConfigError::Parse { key, value, reason })
}

/// String value of `key`, or `default`.
pub fn env_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_string())
}

/// Boolean flag: `1/true/yes/on` or `0/false/no/off`.
pub fn env_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    let default = if default { "1" } else { "0" };
    env_with(key, default, |v| match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected a boolean".to_string()),
    })
}

/// Any `FromStr` value.
pub fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Parse {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Duration such as `500ms`, `30s`, `2m`, `1h`, `1d` or plain seconds.
/// `off` and `0` disable the setting.
pub fn parse_duration(s: &str) -> Result<Option<Duration>, String> {
    let s = s.trim().to_ascii_lowercase();
    if s.is_empty() || s == "off" || s == "0" {
        return Ok(None);
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num_str, unit) = s.split_at(split);
    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid duration: {}", s))?;

    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(num),
        "ms" => Duration::from_millis(num),
        "m" => Duration::from_secs(num * 60),
        "h" => Duration::from_secs(num * 3600),
        "d" => Duration::from_secs(num * 86400),
        other => return Err(format!("unknown duration unit: {}", other)),
    };

    Ok(Some(duration))
}

/// Duration variable, `None` when disabled.
pub fn env_duration(key: &'static str, default: &str) -> Result<Option<Duration>, ConfigError> {
    env_with(key, default, parse_duration)
}

/// Byte size such as `8192`, `512k`, `1mb` or `10MiB`.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim().to_ascii_lowercase();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num_str, unit) = s.split_at(split);

    let num: usize = num_str
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;

    let shift = match unit.trim() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 10,
        "m" | "mb" | "mib" => 20,
        "g" | "gb" | "gib" => 30,
        other => return Err(format!("unknown size unit: {}", other)),
    };

    num.checked_mul(1 << shift)
        .ok_or_else(|| format!("size overflow: {}", s))
}

/// Byte size variable.
pub fn env_size(key: &'static str, default: &str) -> Result<usize, ConfigError> {
    env_with(key, default, parse_size)
}
