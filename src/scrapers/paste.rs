//! Race card text copied from a browser and pasted into the web form.
//!
//! The text is a flat list of lines. Each horse starts at a line holding
//! only its post position, followed by name, sire, odds and a last-race
//! margin such as `+0.3` that closes the block.

use crate::error::{RowSkip, SkipReason};
use crate::models::{HistoryStatus, HorseRecord, RaceCard, Site};
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

pub const UNKNOWN_RACE_LABEL: &str = "レース未特定";

/// Lines scanned after a post position line
const BLOCK_LINES: usize = 19;

/// Longest line accepted as the race label
const MAX_LABEL_CHARS: usize = 30;

struct Patterns {
    post: Regex,
    name: Regex,
    sire: Regex,
    odds: Regex,
    margin: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            post: Regex::new(r"^([1-9]|1[0-8])$")?,
            name: Regex::new(r"^[ァ-ヶー]{2,9}$")?,
            sire: Regex::new(r"^[ァ-ヶー]{2,10}$")?,
            odds: Regex::new(r"^\d{1,3}\.\d$")?,
            margin: Regex::new(r"([-+]\d\.\d)")?,
        })
    }
}

/// Parse pasted text into a race card. Never fails; unreadable blocks are
/// recorded in `skipped`.
pub fn parse_pasted(text: &str) -> RaceCard {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let label = lines
        .iter()
        .find(|l| l.contains('R') && l.chars().count() < MAX_LABEL_CHARS)
        .copied()
        .unwrap_or(UNKNOWN_RACE_LABEL);
    let mut card = RaceCard::new(label, Site::Paste);

    let patterns = match Patterns::new() {
        Ok(p) => p,
        Err(e) => {
            warn!("Paste patterns failed to compile: {}", e);
            return card;
        }
    };

    let mut seen = HashSet::new();
    for (i, line) in lines.iter().enumerate() {
        if !patterns.post.is_match(line) {
            continue;
        }
        let post_position: u8 = match line.parse() {
            Ok(n) => n,
            Err(_) => continue,
        };

        let end = (i + 1 + BLOCK_LINES).min(lines.len());
        match parse_block(post_position, &lines[i + 1..end], &patterns) {
            Ok(horse) if !seen.insert(post_position) => card.skipped.push(RowSkip {
                row: i,
                reason: SkipReason::DuplicatePostPosition(horse.post_position),
            }),
            Ok(horse) => card.horses.push(horse),
            Err(reason) => card.skipped.push(RowSkip { row: i, reason }),
        }
    }

    card
}

fn parse_block(post_position: u8, block: &[&str], patterns: &Patterns) -> Result<HorseRecord, SkipReason> {
    let mut name: Option<&str> = None;
    let mut sire: Option<&str> = None;
    let mut odds = 0.0;
    let mut margin = None;

    for line in block {
        match name {
            None if patterns.name.is_match(line) => {
                name = Some(*line);
                continue;
            }
            Some(n) if sire.is_none() && *line != n && patterns.sire.is_match(line) => {
                sire = Some(*line);
                continue;
            }
            _ => {}
        }

        if patterns.odds.is_match(line) {
            odds = line.parse().unwrap_or(0.0);
        } else if let Some(caps) = patterns.margin.captures(line) {
            margin = caps[1].parse::<f64>().ok();
            break;
        }
    }

    let name = name.ok_or(SkipReason::MissingName)?;
    if odds <= 0.0 {
        return Err(SkipReason::MissingOdds);
    }

    let mut horse = HorseRecord::new(post_position, name);
    horse.odds = odds;
    horse.sire = sire.map(str::to_string);
    if let Some(gap) = margin {
        horse.time_gaps.push(gap);
        horse.history = HistoryStatus::Loaded;
    }
    Ok(horse)
}
