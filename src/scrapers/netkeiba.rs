//! netkeiba.com adapter: daily race list, shutuba card and horse database.

use super::{load_histories, parse_gap_text, text_of, HttpFetcher, RaceCardSource};
use crate::error::{RowSkip, ScrapeError, SkipReason};
use crate::models::{HorseRecord, RaceCard, RaceTarget, Site, MISSING_ODDS, UNPARSED_GAP};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};

pub const NETKEIBA_RACE_URL: &str = "https://race.netkeiba.com";
pub const NETKEIBA_DB_URL: &str = "https://db.netkeiba.com";

/// Column of the margin in `.db_h_race_results` when the header is missing
const DEFAULT_GAP_COLUMN: usize = 18;

pub struct NetkeibaSource {
    fetcher: HttpFetcher,
    race_url: String,
    db_url: String,
    history_races: usize,
}

impl NetkeibaSource {
    pub fn new(fetcher: HttpFetcher, history_races: usize) -> Self {
        Self {
            fetcher,
            race_url: NETKEIBA_RACE_URL.to_string(),
            db_url: NETKEIBA_DB_URL.to_string(),
            history_races,
        }
    }

    pub fn with_base_urls(mut self, race_url: impl Into<String>, db_url: impl Into<String>) -> Self {
        self.race_url = race_url.into().trim_end_matches('/').to_string();
        self.db_url = db_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn race_list_url(&self, target: &RaceTarget) -> String {
        format!(
            "{}/race/list/{}/",
            self.db_url,
            target.date.format("%Y%m%d")
        )
    }

    pub fn card_url(&self, race_id: &str) -> String {
        format!("{}/race/shutuba.html?race_id={}", self.race_url, race_id)
    }

    async fn resolve_race_id(&self, target: &RaceTarget) -> Result<String, ScrapeError> {
        let url = self.race_list_url(target);
        info!("Looking up race id: {}", url);
        let html = self.fetcher.get_text(&url).await?;
        let ids = parse_race_list(&html);
        debug!("{} races listed on {}", ids.len(), target.date);

        find_race_id(&ids, target).ok_or_else(|| ScrapeError::RaceNotListed {
            label: target.label(),
            site: Site::Netkeiba.to_string(),
        })
    }
}

#[async_trait]
impl RaceCardSource for NetkeibaSource {
    fn site(&self) -> Site {
        Site::Netkeiba
    }

    async fn fetch_race_card(&self, target: &RaceTarget) -> Result<RaceCard, ScrapeError> {
        let race_id = self.resolve_race_id(target).await?;
        let url = self.card_url(&race_id);
        info!("Fetching race card: {}", url);

        self.fetcher.pause().await;
        let html = self.fetcher.get_text(&url).await?;
        let mut card = parse_race_card(&html, &target.label())
            .ok_or_else(|| ScrapeError::TableNotFound { url: url.clone() })?;
        card.url = Some(url);

        info!("{} horses on card, loading past races", card.horses.len());
        let limit = self.history_races;
        load_histories(
            &self.fetcher,
            &mut card.horses,
            |horse| {
                horse
                    .profile_path
                    .as_deref()
                    .map(|p| format!("{}{}", self.db_url, p))
            },
            |html| parse_time_gaps(html, limit),
        )
        .await;

        Ok(card)
    }
}

/// Twelve-digit race ids linked from a daily list page, sorted and unique
pub fn parse_race_list(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let (Ok(link_selector), Ok(id_re)) = (
        Selector::parse("a[href*='/race/']"),
        Regex::new(r"/race/(\d{12})/"),
    ) else {
        return Vec::new();
    };

    let mut ids: Vec<String> = document
        .select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| id_re.captures(href).map(|caps| caps[1].to_string()))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Race ids are `YYYY` + venue + meeting + day + race number
pub fn find_race_id(ids: &[String], target: &RaceTarget) -> Option<String> {
    let year = target.date.format("%Y").to_string();
    let venue = target.venue.code();
    let race = format!("{:02}", target.race_number);

    ids.iter()
        .find(|id| {
            id.len() == 12 && id[0..4] == year && &id[4..6] == venue && id[10..12] == race
        })
        .cloned()
}

/// Parse a shutuba page. Returns `None` when the entry table is missing.
pub fn parse_race_card(html: &str, label: &str) -> Option<RaceCard> {
    let document = Html::parse_document(html);

    let table = [".Shutuba_Table", "table.ShutubaTable"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| document.select(&selector).next())?;

    let mut card = RaceCard::new(label, Site::Netkeiba);
    if let Ok(selector) = Selector::parse(".RaceName") {
        card.title = document
            .select(&selector)
            .next()
            .map(|e| text_of(&e))
            .filter(|s| !s.is_empty());
    }

    let row_selector = Selector::parse("tr.HorseList").ok()?;
    let mut seen = HashSet::new();

    for (i, row) in table.select(&row_selector).enumerate() {
        match parse_entry_row(&row) {
            Ok(horse) if !seen.insert(horse.post_position) => card.skipped.push(RowSkip {
                row: i,
                reason: SkipReason::DuplicatePostPosition(horse.post_position),
            }),
            Ok(horse) => card.horses.push(horse),
            Err(reason) => card.skipped.push(RowSkip { row: i, reason }),
        }
    }

    Some(card)
}

fn parse_entry_row(row: &ElementRef) -> Result<HorseRecord, SkipReason> {
    let horse_selector =
        Selector::parse("a[href*='/horse/']").map_err(|_| SkipReason::NoHorseLink)?;
    let link = row
        .select(&horse_selector)
        .next()
        .ok_or(SkipReason::NoHorseLink)?;

    let name = text_of(&link);
    if name.is_empty() {
        return Err(SkipReason::MissingName);
    }

    let post_selector = Selector::parse("td[class^='Umaban'], td.Umaban")
        .map_err(|_| SkipReason::NoPostPosition)?;
    let post_text = row
        .select(&post_selector)
        .next()
        .map(|e| text_of(&e))
        .filter(|s| !s.is_empty())
        .ok_or(SkipReason::NoPostPosition)?;
    let post_position = match post_text.parse::<u8>() {
        Ok(n) if (1..=18).contains(&n) => n,
        _ => return Err(SkipReason::InvalidPostPosition(post_text)),
    };

    let mut horse = HorseRecord::new(post_position, name);

    let id_re = Regex::new(r"/horse/(\d+)").map_err(|_| SkipReason::NoHorseLink)?;
    horse.profile_path = link
        .value()
        .attr("href")
        .and_then(|href| id_re.captures(href))
        .map(|caps| format!("/horse/{}/", &caps[1]));

    if let Ok(selector) = Selector::parse("a[href*='/jockey/']") {
        horse.jockey = row
            .select(&selector)
            .next()
            .map(|e| text_of(&e))
            .filter(|s| !s.is_empty());
    }

    // "---.-" until odds are published
    horse.odds = Selector::parse("span[id^='odds-']")
        .ok()
        .and_then(|selector| row.select(&selector).next())
        .and_then(|e| text_of(&e).parse::<f64>().ok())
        .filter(|odds| *odds > 0.0)
        .unwrap_or(MISSING_ODDS);

    Ok(horse)
}

/// Margins from the first `limit` rows of `.db_h_race_results`.
///
/// The margin column is found by its `着差` header.
pub fn parse_time_gaps(html: &str, limit: usize) -> Vec<f64> {
    let document = Html::parse_document(html);
    let (Ok(table_selector), Ok(th_selector), Ok(row_selector), Ok(td_selector)) = (
        Selector::parse(".db_h_race_results"),
        Selector::parse("th"),
        Selector::parse("tr"),
        Selector::parse("td"),
    ) else {
        return Vec::new();
    };

    let Some(table) = document.select(&table_selector).next() else {
        return Vec::new();
    };

    let column = table
        .select(&th_selector)
        .position(|th| text_of(&th) == "着差")
        .unwrap_or(DEFAULT_GAP_COLUMN);

    table
        .select(&row_selector)
        .map(|row| row.select(&td_selector).map(|c| text_of(&c)).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .take(limit)
        .map(|cells| {
            cells
                .get(column)
                .and_then(|text| parse_gap_text(text))
                .unwrap_or(UNPARSED_GAP)
        })
        .collect()
}
