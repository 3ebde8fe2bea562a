//! Text rendering of an analysis for Discord and the terminal.

use crate::utils::betting::Mark;
use crate::utils::ranking::longshots;
use crate::RaceAnalysis;

/// Discord rejects message content longer than this many characters
pub const DISCORD_CONTENT_LIMIT: usize = 2000;

pub fn format_message(analysis: &RaceAnalysis) -> String {
    let mut lines = vec![
        format!("🏇 {} 予想 [{}]", analysis.heading, analysis.strategy),
        format!("source: {}", analysis.site),
    ];

    if analysis.ranked.is_empty() {
        lines.push("⚠️ 出走馬を取得できませんでした".to_string());
    } else if !analysis.top.is_empty() {
        lines.push(String::new());
        lines.push("📊 ランキング".to_string());
        for (i, h) in analysis.top.iter().enumerate() {
            let mark = Mark::for_rank(i).map(|m| m.symbol()).unwrap_or("　");
            let odds = if h.horse.has_odds() {
                format!("{:.1}倍", h.horse.odds)
            } else {
                "--".to_string()
            };
            lines.push(format!(
                "{} {:>2} {} {:.0}点 ({}, Best:{:.1})",
                mark, h.horse.post_position, h.horse.name, h.score, odds, h.best_gap
            ));
        }
    }

    if !analysis.bets.is_empty() {
        lines.push(String::new());
        lines.push("🎯 推奨買い目".to_string());
        lines.extend(analysis.bets.iter().map(|plan| plan.describe()));
    }

    let longshots: Vec<String> = longshots(&analysis.ranked)
        .into_iter()
        .map(|h| format!("{} {}", h.horse.post_position, h.horse.name))
        .collect();
    if !longshots.is_empty() {
        lines.push(String::new());
        lines.push(format!("💣 穴馬: {}", longshots.join(" / ")));
    }

    if !analysis.skipped.is_empty() || analysis.history_failures > 0 {
        lines.push(String::new());
        lines.push(format!(
            "⚠️ skipped rows: {}, missing history: {}",
            analysis.skipped.len(),
            analysis.history_failures
        ));
    }

    lines.join("\n")
}

/// Split `content` into chunks of at most `limit` characters, breaking on
/// line boundaries where possible.
pub fn split_message(content: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.lines() {
        let line_len = line.chars().count();

        if line_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            line_len
        } else {
            line_len + 1
        };
        if current_len + needed > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
