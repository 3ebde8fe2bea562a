use crate::models::{HorseRecord, ScoredHorse};
use crate::utils::scoring::ScoringStrategy;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Longshot ("穴馬") thresholds: close to the winner once, but long odds
pub const LONGSHOT_MAX_GAP: f64 = 0.6;
pub const LONGSHOT_MIN_ODDS: f64 = 15.0;

/// Score every horse and return the normalized ranking
pub fn rank(horses: &[HorseRecord], strategy: &dyn ScoringStrategy) -> Vec<ScoredHorse> {
    let scored = horses
        .iter()
        .map(|horse| {
            let score = strategy.score(horse);
            let best_gap = horse.best_gap();
            let longshot =
                horse.has_odds() && best_gap <= LONGSHOT_MAX_GAP && horse.odds > LONGSHOT_MIN_ODDS;
            let value_index = if horse.has_odds() {
                (score / 50.0) * (10.0 / horse.odds)
            } else {
                0.0
            };

            ScoredHorse {
                horse: horse.clone(),
                score,
                best_gap,
                longshot,
                value_index,
            }
        })
        .collect();

    normalize(scored)
}

/// Sort by score (descending), then post position, and keep the first entry
/// per post position. Applying it to its own output changes nothing.
pub fn normalize(mut ranked: Vec<ScoredHorse>) -> Vec<ScoredHorse> {
    ranked.sort_by(compare_ranked);

    let mut seen = HashSet::new();
    ranked.retain(|h| seen.insert(h.horse.post_position));
    ranked
}

fn compare_ranked(a: &ScoredHorse, b: &ScoredHorse) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.horse.post_position.cmp(&b.horse.post_position))
}

/// First `n` horses of a normalized ranking
pub fn top_n(ranked: &[ScoredHorse], n: usize) -> Vec<ScoredHorse> {
    ranked.iter().take(n).cloned().collect()
}

pub fn longshots(ranked: &[ScoredHorse]) -> Vec<&ScoredHorse> {
    ranked.iter().filter(|h| h.longshot).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MISSING_ODDS;
    use crate::utils::scoring::{FavoriteDefense, PeakForm};

    fn horse(post: u8, gaps: &[f64], odds: f64) -> HorseRecord {
        let mut h = HorseRecord::new(post, format!("ホース{}", post));
        h.time_gaps = gaps.to_vec();
        h.odds = odds;
        h
    }

    fn field() -> Vec<HorseRecord> {
        vec![
            horse(1, &[1.0, 1.5], 30.0),
            horse(2, &[0.0, 0.2], 2.5),
            horse(3, &[0.5, 0.6], 18.0),
            horse(4, &[0.3], 6.0),
            horse(5, &[], MISSING_ODDS),
        ]
    }

    #[test]
    fn test_rank_orders_by_score() {
        let ranked = rank(&field(), &PeakForm);
        let order: Vec<u8> = ranked.iter().map(|h| h.horse.post_position).collect();
        // 2: 60+30, 4: 45+15, 3: 0+15, then 1 and 5 tie at 0 -> post order
        assert_eq!(order, vec![2, 4, 3, 1, 5]);
        assert_eq!(ranked[0].score, 90.0);
    }

    #[test]
    fn test_longshot_flag() {
        let ranked = rank(&field(), &PeakForm);
        let shots: Vec<u8> = longshots(&ranked)
            .iter()
            .map(|h| h.horse.post_position)
            .collect();
        // horse 3: best 0.5 at 18.0; horse 5 has no odds so never a longshot
        assert_eq!(shots, vec![3]);
    }

    #[test]
    fn test_value_index() {
        let ranked = rank(&field(), &FavoriteDefense);
        let no_odds = ranked.iter().find(|h| h.horse.post_position == 5).unwrap();
        assert_eq!(no_odds.value_index, 0.0);

        let fav = ranked.iter().find(|h| h.horse.post_position == 2).unwrap();
        // 50 + 60 + 35 = 145 -> 145/50 * 10/2.5
        assert!((fav.value_index - 11.6).abs() < 1e-9);
    }

    #[test]
    fn test_dedup_keeps_best_entry_per_post() {
        let mut horses = field();
        horses.push(horse(2, &[], 50.0));
        let ranked = rank(&horses, &PeakForm);

        assert_eq!(ranked.len(), 5);
        let two = ranked.iter().find(|h| h.horse.post_position == 2).unwrap();
        assert_eq!(two.score, 90.0);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut horses = field();
        horses.push(horse(4, &[0.1], 4.0));
        let once = rank(&horses, &PeakForm);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);

        let top_once = top_n(&once, 3);
        let top_twice = top_n(&normalize(top_once.clone()), 3);
        assert_eq!(top_once, top_twice);
    }

    #[test]
    fn test_top_n_shorter_field() {
        let ranked = rank(&field(), &PeakForm);
        assert_eq!(top_n(&ranked, 3).len(), 3);
        assert_eq!(top_n(&ranked, 10).len(), 5);
        assert!(top_n(&[], 3).is_empty());
    }
}
