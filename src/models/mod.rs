use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RowSkip, ScrapeError};

/// Odds value used when a row carries no readable odds
pub const MISSING_ODDS: f64 = 99.9;

/// Best time gap used when a horse has no usable past race
pub const NO_FORM_GAP: f64 = 9.9;

/// Gap value for a past-race row whose margin cell could not be read
pub const UNPARSED_GAP: f64 = 99.9;

/// Gaps at or above this are treated as noise (distance-off or DNF rows)
pub const MAX_PLAUSIBLE_GAP: f64 = 5.0;

/// JRA racecourses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Sapporo,
    Hakodate,
    Fukushima,
    Niigata,
    Tokyo,
    Nakayama,
    Chukyo,
    Kyoto,
    Hanshin,
    Kokura,
}

impl Venue {
    pub const ALL: [Venue; 10] = [
        Venue::Sapporo,
        Venue::Hakodate,
        Venue::Fukushima,
        Venue::Niigata,
        Venue::Tokyo,
        Venue::Nakayama,
        Venue::Chukyo,
        Venue::Kyoto,
        Venue::Hanshin,
        Venue::Kokura,
    ];

    /// Two-digit course code shared by keibalab and netkeiba race ids
    pub fn code(&self) -> &'static str {
        match self {
            Venue::Sapporo => "01",
            Venue::Hakodate => "02",
            Venue::Fukushima => "03",
            Venue::Niigata => "04",
            Venue::Tokyo => "05",
            Venue::Nakayama => "06",
            Venue::Chukyo => "07",
            Venue::Kyoto => "08",
            Venue::Hanshin => "09",
            Venue::Kokura => "10",
        }
    }

    pub fn japanese(&self) -> &'static str {
        match self {
            Venue::Sapporo => "札幌",
            Venue::Hakodate => "函館",
            Venue::Fukushima => "福島",
            Venue::Niigata => "新潟",
            Venue::Tokyo => "東京",
            Venue::Nakayama => "中山",
            Venue::Chukyo => "中京",
            Venue::Kyoto => "京都",
            Venue::Hanshin => "阪神",
            Venue::Kokura => "小倉",
        }
    }

    fn romaji(&self) -> &'static str {
        match self {
            Venue::Sapporo => "sapporo",
            Venue::Hakodate => "hakodate",
            Venue::Fukushima => "fukushima",
            Venue::Niigata => "niigata",
            Venue::Tokyo => "tokyo",
            Venue::Nakayama => "nakayama",
            Venue::Chukyo => "chukyo",
            Venue::Kyoto => "kyoto",
            Venue::Hanshin => "hanshin",
            Venue::Kokura => "kokura",
        }
    }

    pub fn from_code(code: &str) -> Option<Venue> {
        Venue::ALL.into_iter().find(|v| v.code() == code)
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.japanese())
    }
}

impl FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_lowercase();
        Venue::ALL
            .into_iter()
            .find(|v| v.japanese() == s || v.romaji() == lower || v.code() == s)
            .ok_or_else(|| format!("unknown racecourse: {}", s))
    }
}

/// Which site a race card was scraped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Site {
    Keibalab,
    Netkeiba,
    Paste,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Keibalab => f.write_str("keibalab"),
            Site::Netkeiba => f.write_str("netkeiba"),
            Site::Paste => f.write_str("paste"),
        }
    }
}

/// A race identified by date, course and race number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceTarget {
    pub date: NaiveDate,
    pub venue: Venue,
    pub race_number: u8,
}

impl RaceTarget {
    pub fn new(date: NaiveDate, venue: Venue, race_number: u8) -> Result<Self, ScrapeError> {
        if !(1..=12).contains(&race_number) {
            return Err(ScrapeError::InvalidTarget(format!(
                "race number must be 1-12, got {}",
                race_number
            )));
        }
        Ok(Self {
            date,
            venue,
            race_number,
        })
    }

    /// keibalab race id: YYYYMMDD + course code + race number
    pub fn keibalab_id(&self) -> String {
        format!(
            "{}{}{:02}",
            self.date.format("%Y%m%d"),
            self.venue.code(),
            self.race_number
        )
    }

    /// Cache key used for saved race cards
    pub fn cache_key(&self) -> String {
        self.keibalab_id()
    }

    /// "2024-05-26 東京11R"
    pub fn label(&self) -> String {
        format!(
            "{} {}{}R",
            self.date.format("%Y-%m-%d"),
            self.venue.japanese(),
            self.race_number
        )
    }
}

/// Outcome of the per-horse past-race lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum HistoryStatus {
    Loaded,
    /// No history was requested (pasted cards, missing profile link)
    #[default]
    Skipped,
    Failed(String),
}

/// One horse on a race card; every field is best effort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseRecord {
    pub post_position: u8,
    pub name: String,
    pub profile_path: Option<String>,
    pub odds: f64,
    pub jockey: Option<String>,
    pub sire: Option<String>,
    /// Time gaps to the winner in recent races, most recent first
    pub time_gaps: Vec<f64>,
    #[serde(default)]
    pub history: HistoryStatus,
}

impl HorseRecord {
    pub fn new(post_position: u8, name: impl Into<String>) -> Self {
        Self {
            post_position,
            name: name.into(),
            profile_path: None,
            odds: MISSING_ODDS,
            jockey: None,
            sire: None,
            time_gaps: Vec::new(),
            history: HistoryStatus::Skipped,
        }
    }

    pub fn has_odds(&self) -> bool {
        self.odds > 0.0 && self.odds != MISSING_ODDS
    }

    /// Gaps usable for scoring: plausible values only
    pub fn usable_gaps(&self) -> impl Iterator<Item = f64> + '_ {
        self.time_gaps
            .iter()
            .copied()
            .filter(|g| g.is_finite() && *g < MAX_PLAUSIBLE_GAP)
    }

    /// Smallest usable gap, or `NO_FORM_GAP`
    pub fn best_gap(&self) -> f64 {
        self.usable_gaps().fold(NO_FORM_GAP, f64::min)
    }

    /// Most recent usable gap, or `NO_FORM_GAP`
    pub fn last_gap(&self) -> f64 {
        self.usable_gaps().next().unwrap_or(NO_FORM_GAP)
    }
}

/// Everything extracted from one race card page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceCard {
    pub label: String,
    pub title: Option<String>,
    pub site: Site,
    pub url: Option<String>,
    pub horses: Vec<HorseRecord>,
    #[serde(default)]
    pub skipped: Vec<RowSkip>,
}

impl RaceCard {
    pub fn new(label: impl Into<String>, site: Site) -> Self {
        Self {
            label: label.into(),
            title: None,
            site,
            url: None,
            horses: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Label with the race name when one was found
    pub fn heading(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => format!("{} {}", self.label, title),
            _ => self.label.clone(),
        }
    }
}

/// A horse after scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHorse {
    pub horse: HorseRecord,
    pub score: f64,
    pub best_gap: f64,
    pub longshot: bool,
    pub value_index: f64,
}
