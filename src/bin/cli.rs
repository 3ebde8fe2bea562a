use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::Parser;
use keiba_signal::utils::data::save_ranking_to_csv;
use keiba_signal::{
    analyze_card, init_tracing, load_or_fetch_card, notify, AppConfig, RaceTarget, SourceKind,
    StrategyKind, Venue, CACHE_DIR,
};
use std::path::Path;
use tracing::info;

const JST_OFFSET_SECS: i32 = 9 * 3600;

#[derive(Parser, Debug)]
#[command(name = "keiba-signal")]
#[command(version, about = "Scrape a JRA race card, rank the field and post quinella picks to Discord", long_about = None)]
struct Cli {
    /// Race date as YYYYMMDD or YYYY-MM-DD [default: today in JST]
    #[arg(value_name = "DATE", value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Racecourse: 東京, tokyo or 05
    #[arg(value_name = "PLACE", default_value = "東京")]
    place: Venue,

    /// Race number
    #[arg(value_name = "RACE", default_value_t = 11, value_parser = clap::value_parser!(u8).range(1..=12))]
    race: u8,

    /// Site to scrape (keibalab, netkeiba)
    #[arg(long, default_value = "keibalab")]
    site: SourceKind,

    /// Scoring strategy (peak-form, favorite-defense, jockey-form)
    #[arg(short, long, default_value = "peak-form")]
    strategy: StrategyKind,

    /// Horses to show in the ranking
    #[arg(
        short = 'n',
        long,
        default_value_t = 5,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    top: usize,

    /// Print the prediction without posting to Discord
    #[arg(long)]
    dry_run: bool,

    /// Reuse a saved race card from cache/ instead of scraping
    #[arg(long)]
    use_cache: bool,

    /// Write the full ranking to a CSV file under cache/
    #[arg(long)]
    save_csv: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| format!("expected YYYYMMDD or YYYY-MM-DD, got {:?}", s))
}

/// JRA race days are Japanese calendar days
fn today_jst() -> NaiveDate {
    let now = Utc::now();
    FixedOffset::east_opt(JST_OFFSET_SECS)
        .map(|jst| now.with_timezone(&jst).date_naive())
        .unwrap_or_else(|| now.date_naive())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.ci);

    let date = cli.date.unwrap_or_else(today_jst);
    let target = RaceTarget::new(date, cli.place, cli.race)?;
    let strategy = cli.strategy.build();
    info!(
        "Predicting {} from {} with {}",
        target.label(),
        cli.site,
        strategy.name()
    );

    let source = cli
        .site
        .build(&config)
        .context("Failed to set up HTTP client")?;
    let card = load_or_fetch_card(source.as_ref(), &target, cli.use_cache, CACHE_DIR).await?;

    let analysis = analyze_card(&card, strategy.as_ref(), cli.top);
    println!("{}", analysis.message());

    if analysis.ranked.is_empty() {
        bail!("No horses could be read for {}", target.label());
    }

    if cli.save_csv {
        let csv_file = Path::new(CACHE_DIR).join(format!(
            "ranking_{}_{}.csv",
            card.site,
            target.cache_key()
        ));
        std::fs::create_dir_all(CACHE_DIR).context("Failed to create cache directory")?;
        save_ranking_to_csv(&analysis.ranked, &csv_file)?;
        info!("Saved ranking to {}", csv_file.display());
    }

    if cli.dry_run {
        info!("Dry run: not posting to Discord");
    } else if !notify(&config, &analysis).await? {
        info!("Set DISCORD_WEBHOOK_URL to post predictions");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 26).unwrap();
        assert_eq!(parse_date("20240526").unwrap(), expected);
        assert_eq!(parse_date("2024-05-26").unwrap(), expected);
        assert!(parse_date("26/05/2024").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["keiba-signal"]).unwrap();
        assert!(cli.date.is_none());
        assert_eq!(cli.place, Venue::Tokyo);
        assert_eq!(cli.race, 11);
        assert_eq!(cli.site, SourceKind::Keibalab);
        assert_eq!(cli.strategy, StrategyKind::PeakForm);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_positional_and_flags() {
        let cli = Cli::try_parse_from([
            "keiba-signal",
            "20240526",
            "kyoto",
            "10",
            "--site",
            "netkeiba",
            "--strategy",
            "favorite-defense",
            "--dry-run",
            "--save-csv",
        ])
        .unwrap();
        assert_eq!(cli.place, Venue::Kyoto);
        assert_eq!(cli.race, 10);
        assert_eq!(cli.site, SourceKind::Netkeiba);
        assert_eq!(cli.strategy, StrategyKind::FavoriteDefense);
        assert!(cli.dry_run && cli.save_csv);
        assert_eq!(cli.top, 5);
    }

    #[test]
    fn test_cli_rejects_bad_input() {
        assert!(Cli::try_parse_from(["keiba-signal", "20240526", "大井"]).is_err());
        assert!(Cli::try_parse_from(["keiba-signal", "20240526", "東京", "13"]).is_err());
        assert!(Cli::try_parse_from(["keiba-signal", "-n", "0"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
