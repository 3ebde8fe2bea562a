use crate::models::ScoredHorse;
use crate::utils::betting::Mark;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Save any serializable value to a JSON cache file, creating the directory
pub fn save_to_cache<T: Serialize + ?Sized>(data: &T, cache_file: impl AsRef<Path>) -> Result<()> {
    let path = cache_file.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(data).context("Failed to serialize cache data")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write cache file {}", path.display()))?;
    Ok(())
}

/// Load a value previously written by [`save_to_cache`]
pub fn load_from_cache<T: DeserializeOwned>(cache_file: impl AsRef<Path>) -> Result<T> {
    let path = cache_file.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache file {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to deserialize cache file {}", path.display()))
}

#[derive(Debug, Serialize)]
struct RankingRow<'a> {
    rank: usize,
    mark: &'static str,
    post_position: u8,
    name: &'a str,
    odds: Option<f64>,
    score: f64,
    best_gap: f64,
    value_index: f64,
    longshot: bool,
    jockey: &'a str,
    sire: &'a str,
}

/// Save the ranked field to CSV, one row per horse
pub fn save_ranking_to_csv(ranked: &[ScoredHorse], filename: impl AsRef<Path>) -> Result<()> {
    let path = filename.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;

    for (i, scored) in ranked.iter().enumerate() {
        let horse = &scored.horse;
        writer
            .serialize(RankingRow {
                rank: i + 1,
                mark: Mark::for_rank(i).map(|m| m.symbol()).unwrap_or(""),
                post_position: horse.post_position,
                name: &horse.name,
                odds: horse.has_odds().then_some(horse.odds),
                score: scored.score,
                best_gap: scored.best_gap,
                value_index: scored.value_index,
                longshot: scored.longshot,
                jockey: horse.jockey.as_deref().unwrap_or(""),
                sire: horse.sire.as_deref().unwrap_or(""),
            })
            .context("Failed to write CSV row")?;
    }

    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}
