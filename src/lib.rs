pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod utils;

pub use api::DiscordWebhook;
pub use config::{AppConfig, HttpConfig};
pub use error::{ConfigError, NotifyError, RowSkip, ScrapeError, SkipReason};
pub use models::*;
pub use scrapers::{RaceCardSource, SourceKind};
pub use utils::scoring::{ScoringStrategy, StrategyKind};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utils::betting::{recommended_bets, BetPlan};
use utils::data::{load_from_cache, save_to_cache};
use utils::ranking::{rank, top_n};
use utils::report::format_message;

/// Directory for saved race cards and ranking exports
pub const CACHE_DIR: &str = "cache";

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `plain` turns off ANSI colours for CI logs.
pub fn init_tracing(plain: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keiba_signal=info,cli=info,web=info,tower_http=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(!plain))
        .try_init();
}

/// Everything we want to show for one race, in the CLI, Discord or the web page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceAnalysis {
    pub heading: String,
    pub site: Site,
    pub strategy: String,
    /// Full normalized ranking
    pub ranked: Vec<ScoredHorse>,
    pub top: Vec<ScoredHorse>,
    pub bets: Vec<BetPlan>,
    pub skipped: Vec<RowSkip>,
    /// Horses whose past races could not be loaded
    pub history_failures: usize,
}

impl RaceAnalysis {
    pub fn message(&self) -> String {
        format_message(self)
    }
}

/// Log every row the card's parser had to drop, returning how many there were
pub fn log_skipped(card: &RaceCard) -> usize {
    for skip in &card.skipped {
        warn!("{}: skipped {}", card.label, skip);
    }
    card.skipped.len()
}

/// Score, rank and build bets for a card that has already been fetched
pub fn analyze_card(card: &RaceCard, strategy: &dyn ScoringStrategy, top: usize) -> RaceAnalysis {
    log_skipped(card);

    let history_failures = card
        .horses
        .iter()
        .filter(|h| matches!(h.history, HistoryStatus::Failed(_)))
        .count();
    if history_failures > 0 {
        warn!(
            "{}: {} horses scored without past races",
            card.label, history_failures
        );
    }

    let ranked = rank(&card.horses, strategy);
    let bets = recommended_bets(&ranked);
    info!(
        "{}: ranked {} horses with {}",
        card.label,
        ranked.len(),
        strategy.name()
    );

    RaceAnalysis {
        heading: card.heading(),
        site: card.site,
        strategy: strategy.name().to_string(),
        top: top_n(&ranked, top),
        ranked,
        bets,
        skipped: card.skipped.clone(),
        history_failures,
    }
}

/// Fetch a race card from `source` and analyze it
pub async fn analyze_race(
    source: &dyn RaceCardSource,
    target: &RaceTarget,
    strategy: &dyn ScoringStrategy,
    top: usize,
) -> Result<RaceAnalysis, ScrapeError> {
    let card = source.fetch_race_card(target).await?;
    Ok(analyze_card(&card, strategy, top))
}

pub fn card_cache_path(cache_dir: impl AsRef<Path>, site: Site, target: &RaceTarget) -> PathBuf {
    cache_dir
        .as_ref()
        .join(format!("{}_{}.json", site, target.cache_key()))
}

/// Fetch a race card, or reuse the saved copy when `use_cache` is set.
/// Freshly fetched cards are always saved.
pub async fn load_or_fetch_card(
    source: &dyn RaceCardSource,
    target: &RaceTarget,
    use_cache: bool,
    cache_dir: impl AsRef<Path>,
) -> Result<RaceCard> {
    let cache_file = card_cache_path(cache_dir, source.site(), target);

    if use_cache && cache_file.exists() {
        info!("Loading race card from cache file: {}", cache_file.display());
        return load_from_cache(&cache_file);
    }

    let card = source
        .fetch_race_card(target)
        .await
        .with_context(|| format!("Failed to fetch race card for {}", target.label()))?;

    if card.horses.is_empty() {
        warn!("{}: race card has no horses, not caching it", target.label());
    } else {
        save_to_cache(&card, &cache_file)?;
        info!("Saved race card to cache file: {}", cache_file.display());
    }
    Ok(card)
}

/// Post the analysis to Discord when a webhook is configured.
///
/// Returns `false` when there was nowhere to send it.
pub async fn notify(config: &AppConfig, analysis: &RaceAnalysis) -> Result<bool> {
    let Some(url) = config.require_webhook()? else {
        info!("DISCORD_WEBHOOK_URL not set; skipping notification");
        return Ok(false);
    };

    let webhook = DiscordWebhook::new(url, &config.http)?;
    webhook
        .send(&analysis.message())
        .await
        .context("Failed to send prediction to Discord")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::paste::parse_pasted;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedSource {
        card: RaceCard,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RaceCardSource for CannedSource {
        fn site(&self) -> Site {
            self.card.site
        }

        async fn fetch_race_card(&self, _target: &RaceTarget) -> Result<RaceCard, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.card.clone())
        }
    }

    fn target() -> RaceTarget {
        let date = NaiveDate::from_ymd_opt(2024, 5, 26).unwrap();
        RaceTarget::new(date, Venue::Tokyo, 11).unwrap()
    }

    fn card() -> RaceCard {
        let mut card = RaceCard::new(target().label(), Site::Keibalab);
        for (post, name, odds, gaps) in [
            (1, "ダノンデサイル", 46.6, vec![-0.2, 0.3]),
            (2, "ジャスティンミラノ", 2.2, vec![-0.1, 0.0]),
            (5, "レガレイラ", 6.8, vec![0.4]),
            (7, "シックスペンス", 9.0, vec![]),
        ] {
            let mut horse = HorseRecord::new(post, name);
            horse.odds = odds;
            horse.time_gaps = gaps;
            card.horses.push(horse);
        }
        card.horses[3].history = HistoryStatus::Failed("HTTP 500".to_string());
        card
    }

    #[test]
    fn test_analyze_card() {
        let analysis = analyze_card(&card(), &utils::scoring::PeakForm, 3);
        assert_eq!(analysis.strategy, "peak-form");
        assert_eq!(analysis.ranked.len(), 4);
        assert_eq!(analysis.top.len(), 3);
        assert_eq!(analysis.history_failures, 1);
        // 1 and 2 tie on a winning run plus one gap within 0.5; post order breaks it
        assert_eq!(analysis.top[0].horse.post_position, 1);
        assert_eq!(analysis.top[1].horse.post_position, 2);
        assert_eq!(analysis.top[0].score, 75.0);
        assert_eq!(analysis.top[1].score, 75.0);
        assert!(analysis.top[0].longshot);
        assert!(!analysis.bets.is_empty());
    }

    #[test]
    fn test_log_skipped_counts_rows() {
        let card = parse_pasted("1\n2\n");
        assert!(card.horses.is_empty());
        assert_eq!(log_skipped(&card), 2);
        assert_eq!(log_skipped(&RaceCard::new("label", Site::Paste)), 0);
    }

    #[test]
    fn test_empty_top_still_reports_ranked_card() {
        let analysis = analyze_card(&card(), &utils::scoring::PeakForm, 0);
        assert!(analysis.top.is_empty());
        let msg = analysis.message();
        assert!(!msg.contains("出走馬を取得できませんでした"));
        assert!(msg.contains("馬連 軸1頭流し"));
    }

    #[test]
    fn test_analyze_pasted_card_with_favorite_defense() {
        let text = include_str!("../tests/fixtures/paste_card.txt");
        let card = parse_pasted(text);
        let strategy = StrategyKind::FavoriteDefense.build();
        let analysis = analyze_card(&card, strategy.as_ref(), 5);

        assert_eq!(analysis.site, Site::Paste);
        assert_eq!(analysis.skipped.len(), 3);
        // 2.2 odds (+60), last gap 0.3 (+20), キズナ (+15)
        assert_eq!(analysis.top[0].horse.name, "ジャスティンミラノ");
        assert_eq!(analysis.top[0].score, 145.0);
    }

    #[tokio::test]
    async fn test_analyze_race() {
        let source = CannedSource {
            card: card(),
            calls: AtomicUsize::new(0),
        };
        let analysis = analyze_race(&source, &target(), &utils::scoring::PeakForm, 5)
            .await
            .unwrap();
        assert_eq!(analysis.top.len(), 4);
        assert!(analysis.heading.starts_with("2024-05-26 東京11R"));
    }

    #[tokio::test]
    async fn test_load_or_fetch_card_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = CannedSource {
            card: card(),
            calls: AtomicUsize::new(0),
        };

        let first = load_or_fetch_card(&source, &target(), true, dir.path())
            .await
            .unwrap();
        let second = load_or_fetch_card(&source, &target(), true, dir.path())
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.horses, second.horses);
        assert!(card_cache_path(dir.path(), Site::Keibalab, &target()).exists());

        load_or_fetch_card(&source, &target(), false, dir.path())
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_notify_without_webhook() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let analysis = analyze_card(&card(), &utils::scoring::PeakForm, 3);
        assert!(!notify(&config, &analysis).await.unwrap());

        let ci = AppConfig::from_lookup(|k| (k == "CI").then(|| "true".to_string())).unwrap();
        assert!(notify(&ci, &analysis).await.is_err());
    }
}
