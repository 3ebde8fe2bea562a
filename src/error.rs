//! Error types for scraping, notification and configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal failures while fetching or locating a race card
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("access to {url} was refused (HTTP 403); the site is rate limiting us")]
    Blocked { url: String },

    #[error("no race card table found at {url}")]
    TableNotFound { url: String },

    #[error("race {label} is not listed on {site}")]
    RaceNotListed { label: String, site: String },

    #[error("invalid race target: {0}")]
    InvalidTarget(String),
}

impl ScrapeError {
    /// Transport errors and 5xx responses are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::Http { source, .. } => !source.is_builder() && !source.is_decode(),
            ScrapeError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// Failures while posting to the webhook
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl NotifyError {
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::Http(e) => !e.is_builder(),
            NotifyError::Status { status, .. } => {
                status.is_server_error() || status.as_u16() == 429
            }
        }
    }
}

/// Malformed environment configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("DISCORD_WEBHOOK_URL must be set when running under CI")]
    MissingWebhook,
}

/// Why a row of a race card did not become a horse record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    NoHorseLink,
    NoPostPosition,
    InvalidPostPosition(String),
    MissingName,
    MissingOdds,
    DuplicatePostPosition(u8),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoHorseLink => write!(f, "row has no horse link"),
            SkipReason::NoPostPosition => write!(f, "post position not found"),
            SkipReason::InvalidPostPosition(raw) => {
                write!(f, "post position {:?} out of range", raw)
            }
            SkipReason::MissingName => write!(f, "horse name not found"),
            SkipReason::MissingOdds => write!(f, "odds not found"),
            SkipReason::DuplicatePostPosition(n) => write!(f, "post position {} seen twice", n),
        }
    }
}

/// A skipped row and the reason it was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSkip {
    pub row: usize,
    pub reason: SkipReason,
}

impl fmt::Display for RowSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.reason)
    }
}
