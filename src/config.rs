//! Runtime configuration read from the environment (optionally seeded from a `.env` file).

use crate::cache::DEFAULT_LOCK_WAIT;
use crate::timeout::{DEFAULT_NOMINAL, DEFAULT_UNREACHABLE};
use std::time::Duration;
use std::{fs, path::Path};

pub const DEFAULT_POLL_SECS: u64 = 10;
pub const DEFAULT_DEVICE_NAME: &str = "Thermostat";

#[derive(Debug, Clone)]
pub struct Config {
    /// Device Access project id (the `enterprises/<id>` segment).
    pub project_id: String,
    /// Bare device id or full `enterprises/.../devices/...` resource name.
    pub device_id: String,
    /// Accessory name used in log lines.
    pub device_name: String,
    pub client_id: String,
    pub client_secret: String,
    /// Google OAuth refresh token obtained through the Device Access consent flow.
    pub refresh_token: String,
    /// Cadence of the characteristic monitor loop.
    pub poll_interval: Duration,
    /// Staleness budget while the device is reachable.
    pub cache_nominal: Duration,
    /// Staleness budget after the device reported OFFLINE.
    pub cache_unreachable: Duration,
    /// Longest a caller waits for the refresh lock before getting "resource busy".
    pub cache_lock_wait: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| non_empty(key).ok_or_else(|| format!("Missing required setting {}", key));

        // Prefer env var; fallback to token.txt in working directory
        let refresh_token = match non_empty("SDM_REFRESH_TOKEN") {
            Some(v) => v,
            None => match fs::read_to_string(Path::new("token.txt")) {
                Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => {
                    return Err(
                        "Missing refresh token: set SDM_REFRESH_TOKEN or provide token.txt in working directory"
                            .to_string(),
                    );
                }
            },
        };

        let duration = |key: &str, default: Duration, unit: fn(u64) -> Duration| -> Result<Duration, String> {
            match non_empty(key) {
                Some(s) => s
                    .parse::<u64>()
                    .map(unit)
                    .map_err(|_| format!("{} must be a non-negative integer, got {:?}", key, s)),
                None => Ok(default),
            }
        };

        Ok(Config {
            project_id: required("SDM_PROJECT_ID")?,
            device_id: required("SDM_DEVICE_ID")?,
            device_name: non_empty("DEVICE_NAME").unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            client_id: required("SDM_CLIENT_ID")?,
            client_secret: required("SDM_CLIENT_SECRET")?,
            refresh_token,
            poll_interval: duration("POLL_INTERVAL_SECS", Duration::from_secs(DEFAULT_POLL_SECS), Duration::from_secs)?,
            cache_nominal: duration("CACHE_NOMINAL_SECS", DEFAULT_NOMINAL, Duration::from_secs)?,
            cache_unreachable: duration("CACHE_UNREACHABLE_SECS", DEFAULT_UNREACHABLE, Duration::from_secs)?,
            cache_lock_wait: duration("CACHE_LOCK_WAIT_MS", DEFAULT_LOCK_WAIT, Duration::from_millis)?,
        })
    }
}

/// Load `KEY=VALUE` lines into the process environment. Variables that are
/// already set keep their value.
pub fn load_env_file(path: &Path) -> Result<(), String> {
    let contents = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    for (index, line) in contents.lines().enumerate() {
        let Some((key, value)) = parse_env_line(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?
        else {
            continue;
        };
        if std::env::var_os(&key).is_none() {
            // Updating process-level environment variables is unsafe on some targets.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

fn parse_env_line(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let assignment = trimmed.strip_prefix("export ").map(str::trim_start).unwrap_or(trimmed);
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;

    let key = key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(format!("invalid variable name {:?}", key));
    }

    let raw = raw.trim();
    let value = match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &raw[1..];
            let end = inner
                .find(quote)
                .ok_or_else(|| format!("unterminated {} quoted value", quote))?;
            let rest = inner[end + 1..].trim();
            if !rest.is_empty() && !rest.starts_with('#') {
                return Err("unexpected characters after closing quote".to_string());
            }
            inner[..end].to_string()
        }
        _ => raw.split('#').next().unwrap_or_default().trim_end().to_string(),
    };
    Ok(Some((key.to_string(), value)))
}
