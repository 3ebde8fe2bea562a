//! Runtime configuration read from the environment (and `.env`).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MIN_DELAY_MS: u64 = 1200;
const DEFAULT_MAX_DELAY_MS: u64 = 2500;
const DEFAULT_HISTORY_RACES: usize = 5;
const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);

/// HTTP behaviour shared by every site adapter
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: Duration::from_millis(DEFAULT_MIN_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl HttpConfig {
    /// No pacing and fast retries, for tests against a local mock server
    pub fn immediate() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 1,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub webhook_url: Option<String>,
    pub http: HttpConfig,
    pub history_races: usize,
    pub bind: SocketAddr,
    pub ci: bool,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_url = lookup("DISCORD_WEBHOOK_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let timeout_secs = parse_or(&lookup, "KEIBA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let max_retries = parse_or(&lookup, "KEIBA_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let min_delay_ms = parse_or(&lookup, "KEIBA_MIN_DELAY_MS", DEFAULT_MIN_DELAY_MS)?;
        let max_delay_ms = parse_or(&lookup, "KEIBA_MAX_DELAY_MS", DEFAULT_MAX_DELAY_MS)?;
        let history_races = parse_or(&lookup, "KEIBA_HISTORY_RACES", DEFAULT_HISTORY_RACES)?;
        let bind = parse_or(&lookup, "KEIBA_BIND", SocketAddr::from(DEFAULT_BIND))?;

        if min_delay_ms > max_delay_ms {
            return Err(ConfigError::Invalid {
                key: "KEIBA_MIN_DELAY_MS",
                value: min_delay_ms.to_string(),
                reason: format!("greater than KEIBA_MAX_DELAY_MS ({})", max_delay_ms),
            });
        }

        let ci = lookup("CI")
            .map(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(false);

        Ok(Self {
            webhook_url,
            http: HttpConfig {
                timeout: Duration::from_secs(timeout_secs),
                max_retries,
                min_delay: Duration::from_millis(min_delay_ms),
                max_delay: Duration::from_millis(max_delay_ms),
            },
            history_races,
            bind,
            ci,
        })
    }

    /// Under CI a run that is meant to notify must have somewhere to send to
    pub fn require_webhook(&self) -> Result<Option<&str>, ConfigError> {
        match (&self.webhook_url, self.ci) {
            (Some(url), _) => Ok(Some(url.as_str())),
            (None, true) => Err(ConfigError::MissingWebhook),
            (None, false) => Ok(None),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.webhook_url.is_none());
        assert_eq!(config.http.timeout, Duration::from_secs(15));
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.history_races, 5);
        assert_eq!(config.bind.port(), 3000);
        assert!(!config.ci);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/abc"),
            ("KEIBA_TIMEOUT_SECS", "30"),
            ("KEIBA_HISTORY_RACES", "3"),
            ("CI", "true"),
        ])
        .unwrap();
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://discord.test/api/webhooks/1/abc")
        );
        assert_eq!(config.http.timeout, Duration::from_secs(30));
        assert_eq!(config.history_races, 3);
        assert!(config.ci);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = config_from(&[("KEIBA_MAX_RETRIES", "many")]).unwrap_err();
        assert!(err.to_string().contains("KEIBA_MAX_RETRIES"));
    }

    #[test]
    fn test_delay_range_checked() {
        let result = config_from(&[("KEIBA_MIN_DELAY_MS", "3000"), ("KEIBA_MAX_DELAY_MS", "100")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_webhook_required_under_ci() {
        let config = config_from(&[("CI", "1")]).unwrap();
        assert!(matches!(
            config.require_webhook(),
            Err(ConfigError::MissingWebhook)
        ));

        let config = config_from(&[("CI", "false")]).unwrap();
        assert!(matches!(config.require_webhook(), Ok(None)));
    }
}
