//! Pluggable scoring strategies.
//!
//! Every strategy is a pure function of a [`HorseRecord`]: recent time gaps,
//! odds, jockey and sire. None of them is treated as authoritative; the CLI
//! and web UI let the user pick one.

use crate::models::HorseRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sires whose progeny get a bloodline bonus under [`FavoriteDefense`]
pub const TOP_BLOOD_LIST: [&str; 9] = [
    "キズナ",
    "ドゥラメンテ",
    "エピファネイア",
    "ロードカナロア",
    "モーリス",
    "ハーツクライ",
    "ルーラーシップ",
    "ディープインパクト",
    "キングカメハメハ",
];

/// Leading jockeys for [`JockeyForm`]
pub const TOP_JOCKEYS: [&str; 8] = [
    "ルメール",
    "川田将雅",
    "戸崎圭太",
    "武豊",
    "坂井瑠星",
    "横山武史",
    "松山弘平",
    "モレイラ",
];

pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, horse: &HorseRecord) -> f64;
}

/// Peak ability plus a bonus for every narrow defeat.
///
/// `60` for a win in the window, `45` for a best gap within 0.3s, plus `15`
/// per race finished within 0.5s of the winner.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakForm;

impl ScoringStrategy for PeakForm {
    fn name(&self) -> &'static str {
        "peak-form"
    }

    fn score(&self, horse: &HorseRecord) -> f64 {
        let gaps: Vec<f64> = horse.usable_gaps().collect();
        if gaps.is_empty() {
            return 0.0;
        }

        let best = gaps.iter().copied().fold(f64::INFINITY, f64::min);
        let peak = if best <= 0.0 {
            60.0
        } else if best <= 0.3 {
            45.0
        } else {
            0.0
        };
        let close_finishes = gaps.iter().filter(|g| (0.0..=0.5).contains(*g)).count();

        peak + close_finishes as f64 * 15.0
    }
}

/// Trusts the market favourite, backed by last-race margin and bloodline.
#[derive(Debug, Clone, Copy, Default)]
pub struct FavoriteDefense;

impl ScoringStrategy for FavoriteDefense {
    fn name(&self) -> &'static str {
        "favorite-defense"
    }

    fn score(&self, horse: &HorseRecord) -> f64 {
        let mut power = 50.0;

        if horse.has_odds() {
            if horse.odds <= 2.9 {
                power += 60.0;
            } else if horse.odds <= 4.9 {
                power += 40.0;
            }
        }

        let last_gap = horse.last_gap();
        if last_gap <= 0.0 {
            power += 35.0;
        } else if last_gap <= 0.4 {
            power += 20.0;
        }

        if let Some(sire) = &horse.sire {
            if TOP_BLOOD_LIST.iter().any(|s| sire.contains(s)) {
                power += 15.0;
            }
        }

        power
    }
}

/// [`PeakForm`] with a bonus for leading jockeys
#[derive(Debug, Clone, Copy, Default)]
pub struct JockeyForm;

impl ScoringStrategy for JockeyForm {
    fn name(&self) -> &'static str {
        "jockey-form"
    }

    fn score(&self, horse: &HorseRecord) -> f64 {
        let base = PeakForm.score(horse);
        match &horse.jockey {
            Some(jockey) if is_top_jockey(jockey) => base + 10.0,
            _ => base,
        }
    }
}

/// Race cards show jockeys with inconsistent spacing and often truncated
/// ("Ｃ．ルメール", "川田", "武 豊"), so match on a whitespace-free prefix
/// in either direction.
pub fn is_top_jockey(name: &str) -> bool {
    let compact: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.chars().count() < 2 {
        return false;
    }
    TOP_JOCKEYS
        .iter()
        .any(|top| compact.contains(top) || top.starts_with(compact.as_str()))
}

/// Strategy selector for the CLI and web form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    PeakForm,
    FavoriteDefense,
    JockeyForm,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::PeakForm,
        StrategyKind::FavoriteDefense,
        StrategyKind::JockeyForm,
    ];

    pub fn build(&self) -> Box<dyn ScoringStrategy> {
        match self {
            StrategyKind::PeakForm => Box::new(PeakForm),
            StrategyKind::FavoriteDefense => Box::new(FavoriteDefense),
            StrategyKind::JockeyForm => Box::new(JockeyForm),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::PeakForm => "peak-form",
            StrategyKind::FavoriteDefense => "favorite-defense",
            StrategyKind::JockeyForm => "jockey-form",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| format!("unknown strategy: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HorseRecord, UNPARSED_GAP};

    fn horse(gaps: &[f64], odds: f64) -> HorseRecord {
        let mut h = HorseRecord::new(1, "テスト");
        h.time_gaps = gaps.to_vec();
        h.odds = odds;
        h
    }

    #[test]
    fn test_peak_form_winner_with_close_finishes() {
        // best -0.2 -> 60; 0.3 and 0.5 are close finishes (-0.2 is below 0.0)
        let h = horse(&[-0.2, 0.3, 0.5, 1.2, 2.0], 3.4);
        assert_eq!(PeakForm.score(&h), 60.0 + 2.0 * 15.0);
    }

    #[test]
    fn test_peak_form_near_miss() {
        let h = horse(&[0.2, 0.0, 0.9], 8.0);
        // best 0.0 counts as a win; 0.2 and 0.0 are close finishes
        assert_eq!(PeakForm.score(&h), 60.0 + 30.0);

        let h = horse(&[0.3, 0.8], 8.0);
        assert_eq!(PeakForm.score(&h), 45.0 + 15.0);

        let h = horse(&[0.6, 1.1], 8.0);
        assert_eq!(PeakForm.score(&h), 0.0);
    }

    #[test]
    fn test_peak_form_ignores_noise_and_empty_history() {
        assert_eq!(PeakForm.score(&horse(&[], 5.0)), 0.0);
        assert_eq!(PeakForm.score(&horse(&[UNPARSED_GAP, 7.5], 5.0)), 0.0);
    }

    #[test]
    fn test_favorite_defense() {
        let mut h = horse(&[0.0], 2.1);
        h.sire = Some("キズナ".to_string());
        assert_eq!(FavoriteDefense.score(&h), 50.0 + 60.0 + 35.0 + 15.0);

        let h = horse(&[0.4], 4.9);
        assert_eq!(FavoriteDefense.score(&h), 50.0 + 40.0 + 20.0);

        // missing odds and no form: base only
        let h = HorseRecord::new(2, "ノーデータ");
        assert_eq!(FavoriteDefense.score(&h), 50.0);
    }

    #[test]
    fn test_jockey_form_bonus() {
        let mut h = horse(&[0.1], 6.0);
        let base = PeakForm.score(&h);
        h.jockey = Some("Ｃ．ルメール".to_string());
        assert_eq!(JockeyForm.score(&h), base + 10.0);
        h.jockey = Some("武 豊".to_string());
        assert_eq!(JockeyForm.score(&h), base + 10.0);
        h.jockey = Some("川田".to_string());
        assert_eq!(JockeyForm.score(&h), base + 10.0);
        h.jockey = Some("丹内祐次".to_string());
        assert_eq!(JockeyForm.score(&h), base);
    }

    #[test]
    fn test_scores_are_deterministic() {
        let h = horse(&[0.1, 0.4, -0.3], 12.0);
        for kind in StrategyKind::ALL {
            let strategy = kind.build();
            assert_eq!(strategy.score(&h), strategy.score(&h.clone()));
        }
    }

    #[test]
    fn test_strategy_kind_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
            assert_eq!(kind.build().name(), kind.as_str());
        }
        assert!("random".parse::<StrategyKind>().is_err());
    }
}
