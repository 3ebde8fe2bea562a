//! keibalab.jp race card (出馬表) and horse history adapter.

use super::{load_histories, parse_gap_text, text_of, HttpFetcher, RaceCardSource};
use crate::error::{RowSkip, ScrapeError, SkipReason};
use crate::models::{HorseRecord, RaceCard, RaceTarget, Site, MISSING_ODDS, UNPARSED_GAP};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{info, warn};

pub const KEIBALAB_BASE_URL: &str = "https://www.keibalab.jp";

/// Past-race rows shorter than this are banners or spacer rows
const MIN_HISTORY_CELLS: usize = 14;

pub struct KeibalabSource {
    fetcher: HttpFetcher,
    base_url: String,
    history_races: usize,
}

impl KeibalabSource {
    pub fn new(fetcher: HttpFetcher, history_races: usize) -> Self {
        Self {
            fetcher,
            base_url: KEIBALAB_BASE_URL.to_string(),
            history_races,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn card_url(&self, target: &RaceTarget) -> String {
        format!(
            "{}/db/race/{}/shutsubahyou.html",
            self.base_url,
            target.keibalab_id()
        )
    }

    /// Result page, used when the card has not been published yet
    pub fn result_url(&self, target: &RaceTarget) -> String {
        format!("{}/db/race/{}/", self.base_url, target.keibalab_id())
    }

    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", self.base_url, href)
        }
    }

    async fn fetch_card_page(&self, url: &str, label: &str) -> Result<Option<RaceCard>, ScrapeError> {
        match self.fetcher.get_text(url).await {
            Ok(html) => Ok(parse_race_card(&html, label)),
            Err(ScrapeError::Status { status, .. }) if status.as_u16() == 404 => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RaceCardSource for KeibalabSource {
    fn site(&self) -> Site {
        Site::Keibalab
    }

    async fn fetch_race_card(&self, target: &RaceTarget) -> Result<RaceCard, ScrapeError> {
        let label = target.label();
        let card_url = self.card_url(target);
        info!("Fetching race card: {}", card_url);

        let mut card = match self.fetch_card_page(&card_url, &label).await? {
            Some(mut card) => {
                card.url = Some(card_url);
                card
            }
            None => {
                let result_url = self.result_url(target);
                warn!("No race card table at {}, trying {}", card_url, result_url);
                let mut card = self
                    .fetch_card_page(&result_url, &label)
                    .await?
                    .ok_or_else(|| ScrapeError::TableNotFound {
                        url: result_url.clone(),
                    })?;
                card.url = Some(result_url);
                card
            }
        };

        info!("{} horses on card, loading past races", card.horses.len());
        let limit = self.history_races;
        load_histories(
            &self.fetcher,
            &mut card.horses,
            |horse| horse.profile_path.as_deref().map(|p| self.absolute(p)),
            |html| parse_time_gaps(html, limit),
        )
        .await;

        Ok(card)
    }
}

/// Parse the entry table of a card or result page.
///
/// Returns `None` when neither table is present.
pub fn parse_race_card(html: &str, label: &str) -> Option<RaceCard> {
    let document = Html::parse_document(html);

    let table = ["table.shutsubaTable", "table.table_p01"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| document.select(&selector).next())?;

    let mut card = RaceCard::new(label, Site::Keibalab);
    card.title = parse_title(&document);

    let row_selector = Selector::parse("tr").ok()?;
    let td_selector = Selector::parse("td").ok()?;
    let mut seen = HashSet::new();

    for (i, row) in table.select(&row_selector).enumerate() {
        let cells: Vec<ElementRef> = row.select(&td_selector).collect();
        // header rows carry only <th>
        if cells.is_empty() {
            continue;
        }

        match parse_entry_row(&row, &cells) {
            Ok(horse) => {
                if seen.insert(horse.post_position) {
                    card.horses.push(horse);
                } else {
                    card.skipped.push(RowSkip {
                        row: i,
                        reason: SkipReason::DuplicatePostPosition(horse.post_position),
                    });
                }
            }
            Err(reason) => card.skipped.push(RowSkip { row: i, reason }),
        }
    }

    Some(card)
}

fn parse_title(document: &Html) -> Option<String> {
    ["h1.raceTitle", ".raceTitle", ".race_name", "h1"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .filter_map(|selector| document.select(&selector).next().map(|e| text_of(&e)))
        .find(|text| !text.is_empty())
}

fn parse_entry_row(row: &ElementRef, cells: &[ElementRef]) -> Result<HorseRecord, SkipReason> {
    let link_selector =
        Selector::parse(r#"a[href*="/db/horse/"]"#).map_err(|_| SkipReason::NoHorseLink)?;
    let link = row
        .select(&link_selector)
        .next()
        .ok_or(SkipReason::NoHorseLink)?;

    let name = text_of(&link);
    if name.is_empty() {
        return Err(SkipReason::MissingName);
    }

    let post_text = post_position_text(row, cells).ok_or(SkipReason::NoPostPosition)?;
    let post_position = match post_text.parse::<u8>() {
        Ok(n) if (1..=18).contains(&n) => n,
        _ => return Err(SkipReason::InvalidPostPosition(post_text)),
    };

    let mut horse = HorseRecord::new(post_position, name);
    horse.profile_path = link.value().attr("href").map(|s| s.to_string());
    horse.odds = parse_odds(row).unwrap_or(MISSING_ODDS);

    if let Ok(selector) = Selector::parse(r#"a[href*="/db/jockey/"]"#) {
        horse.jockey = row
            .select(&selector)
            .next()
            .map(|e| text_of(&e))
            .filter(|s| !s.is_empty());
    }

    Ok(horse)
}

/// `td.umaban` when the page marks it, else the first all-digit cell
fn post_position_text(row: &ElementRef, cells: &[ElementRef]) -> Option<String> {
    if let Ok(selector) = Selector::parse("td.umaban") {
        if let Some(cell) = row.select(&selector).next() {
            let text = text_of(&cell);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    cells
        .iter()
        .map(text_of)
        .find(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
}

fn parse_odds(row: &ElementRef) -> Option<f64> {
    let odds_re = Regex::new(r"(\d{1,4}\.\d)").ok()?;

    // an odds cell without a number means odds are not out yet
    if let Ok(selector) = Selector::parse("td.odds") {
        if let Some(cell) = row.select(&selector).next() {
            let text = text_of(&cell);
            return odds_re
                .captures(&text)
                .and_then(|caps| caps[1].parse().ok());
        }
    }

    let text = row.text().collect::<String>();
    odds_re
        .captures(&text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Time gaps from the most recent `limit` rows of a horse's record table
pub fn parse_time_gaps(html: &str, limit: usize) -> Vec<f64> {
    let document = Html::parse_document(html);
    let (Ok(row_selector), Ok(td_selector), Ok(gap_re)) = (
        Selector::parse("table.db-horse-table tbody tr"),
        Selector::parse("td"),
        Regex::new(r"^\(?-?\d+\.\d+\)?$"),
    ) else {
        return Vec::new();
    };

    document
        .select(&row_selector)
        .take(limit)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&td_selector).map(|c| text_of(&c)).collect();
            if cells.len() < MIN_HISTORY_CELLS {
                return None;
            }
            let gap = cells
                .iter()
                .find(|t| gap_re.is_match(t))
                .and_then(|t| parse_gap_text(t))
                .unwrap_or(UNPARSED_GAP);
            Some(gap)
        })
        .collect()
}
