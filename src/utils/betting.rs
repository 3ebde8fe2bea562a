//! Prediction marks and quinella (馬連) ticket formation from a ranking.

use crate::models::ScoredHorse;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Newspaper-style prediction marks for the top four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    /// ◎ main pick
    Honmei,
    /// ○ main rival
    Taikou,
    /// ▲ third choice
    Tanana,
    /// △ outsider worth covering
    Renka,
}

impl Mark {
    pub fn for_rank(rank: usize) -> Option<Mark> {
        match rank {
            0 => Some(Mark::Honmei),
            1 => Some(Mark::Taikou),
            2 => Some(Mark::Tanana),
            3 => Some(Mark::Renka),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Mark::Honmei => "◎",
            Mark::Taikou => "○",
            Mark::Tanana => "▲",
            Mark::Renka => "△",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetKind {
    /// 軸1頭流し: one axis horse against several partners
    AxisFlow,
    /// フォーメーション: every unordered pair across two legs
    Formation,
}

/// A group of quinella tickets built from the ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetPlan {
    pub kind: BetKind,
    pub first_leg: Vec<u8>,
    pub second_leg: Vec<u8>,
    /// Unordered post-position pairs, smaller number first
    pub tickets: Vec<(u8, u8)>,
}

impl BetPlan {
    pub fn describe(&self) -> String {
        match self.kind {
            BetKind::AxisFlow => format!(
                "馬連 軸1頭流し: {} - {} ({}点)",
                join_posts(&self.first_leg),
                join_posts(&self.second_leg),
                self.tickets.len()
            ),
            BetKind::Formation => format!(
                "馬連 フォーメーション: 1頭目 {} / 2頭目 {} ({}点)",
                join_posts(&self.first_leg),
                join_posts(&self.second_leg),
                self.tickets.len()
            ),
        }
    }
}

/// Rank 1 against ranks 2..=`partners + 1`
pub fn axis_flow(ranked: &[ScoredHorse], partners: usize) -> Option<BetPlan> {
    let (axis, rest) = ranked.split_first()?;
    let axis = axis.horse.post_position;
    let second_leg: Vec<u8> = rest
        .iter()
        .take(partners)
        .map(|h| h.horse.post_position)
        .collect();
    if second_leg.is_empty() {
        return None;
    }

    let tickets = second_leg.iter().map(|&p| ordered_pair(axis, p)).collect();
    Some(BetPlan {
        kind: BetKind::AxisFlow,
        first_leg: vec![axis],
        second_leg,
        tickets,
    })
}

/// Top `first` horses against top `second` horses, pairs deduplicated
pub fn formation(ranked: &[ScoredHorse], first: usize, second: usize) -> Option<BetPlan> {
    let first_leg: Vec<u8> = ranked
        .iter()
        .take(first)
        .map(|h| h.horse.post_position)
        .collect();
    let second_leg: Vec<u8> = ranked
        .iter()
        .take(second)
        .map(|h| h.horse.post_position)
        .collect();

    let mut tickets: Vec<(u8, u8)> = Vec::new();
    for &a in &first_leg {
        for &b in &second_leg {
            if a == b {
                continue;
            }
            let pair = ordered_pair(a, b);
            if !tickets.contains(&pair) {
                tickets.push(pair);
            }
        }
    }

    if tickets.is_empty() {
        return None;
    }
    Some(BetPlan {
        kind: BetKind::Formation,
        first_leg,
        second_leg,
        tickets,
    })
}

/// The default pair of plans: 4-partner axis flow and a 2x4 formation
pub fn recommended_bets(ranked: &[ScoredHorse]) -> Vec<BetPlan> {
    [axis_flow(ranked, 4), formation(ranked, 2, 4)]
        .into_iter()
        .flatten()
        .collect()
}

fn join_posts(posts: &[u8]) -> String {
    posts
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn ordered_pair(a: u8, b: u8) -> (u8, u8) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
