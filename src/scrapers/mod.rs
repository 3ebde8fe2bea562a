//! Race card adapters. Everything that knows about a site's markup lives
//! in this module tree.

pub mod fetcher;
pub mod keibalab;
pub mod netkeiba;
pub mod paste;

pub use fetcher::HttpFetcher;
pub use keibalab::KeibalabSource;
pub use netkeiba::NetkeibaSource;

use crate::config::AppConfig;
use crate::error::ScrapeError;
use crate::models::{HistoryStatus, HorseRecord, RaceCard, RaceTarget, Site};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

#[async_trait]
pub trait RaceCardSource: Send + Sync {
    fn site(&self) -> Site;

    async fn fetch_race_card(&self, target: &RaceTarget) -> Result<RaceCard, ScrapeError>;
}

/// Sites selectable from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Keibalab,
    Netkeiba,
}

impl SourceKind {
    pub fn build(&self, config: &AppConfig) -> Result<Box<dyn RaceCardSource>, ScrapeError> {
        let fetcher = HttpFetcher::new(&config.http)?;
        Ok(match self {
            SourceKind::Keibalab => Box::new(KeibalabSource::new(fetcher, config.history_races)),
            SourceKind::Netkeiba => Box::new(NetkeibaSource::new(fetcher, config.history_races)),
        })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Keibalab => f.write_str("keibalab"),
            SourceKind::Netkeiba => f.write_str("netkeiba"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keibalab" => Ok(SourceKind::Keibalab),
            "netkeiba" => Ok(SourceKind::Netkeiba),
            other => Err(format!("unknown site: {}", other)),
        }
    }
}

/// Trimmed text content of an element
pub(crate) fn text_of(elem: &scraper::ElementRef) -> String {
    elem.text().collect::<String>().trim().to_string()
}

/// Fetch and parse past races for every horse, pausing between requests.
///
/// Failures are recorded on the horse and never abort the card. After the
/// site refuses access once, the remaining lookups are skipped.
pub(crate) async fn load_histories<U, P>(
    fetcher: &HttpFetcher,
    horses: &mut [HorseRecord],
    history_url: U,
    parse: P,
) where
    U: Fn(&HorseRecord) -> Option<String> + Sync,
    P: Fn(&str) -> Vec<f64> + Sync,
{
    let mut blocked = false;

    for horse in horses.iter_mut() {
        let Some(url) = history_url(horse) else {
            horse.history = HistoryStatus::Skipped;
            continue;
        };

        if blocked {
            horse.history = HistoryStatus::Failed("skipped after access was refused".to_string());
            continue;
        }

        fetcher.pause().await;

        match fetcher.get_text(&url).await {
            Ok(html) => {
                horse.time_gaps = parse(&html);
                horse.history = HistoryStatus::Loaded;
                info!(
                    "  {:>2} {}: {} past races",
                    horse.post_position,
                    horse.name,
                    horse.time_gaps.len()
                );
            }
            Err(e) => {
                if matches!(e, ScrapeError::Blocked { .. }) {
                    warn!("Access refused while loading {}: stopping history lookups", horse.name);
                    blocked = true;
                } else {
                    warn!("History for {} unavailable: {}", horse.name, e);
                }
                horse.history = HistoryStatus::Failed(e.to_string());
            }
        }
    }
}

/// Parse a time-gap cell such as `0.3`, `-0.2` or `(0.5)`
pub(crate) fn parse_gap_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || !cleaned.contains('.') {
        return None;
    }
    cleaned.parse().ok()
}
