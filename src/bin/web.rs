use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use keiba_signal::scrapers::paste::parse_pasted;
use keiba_signal::utils::betting::Mark;
use keiba_signal::utils::ranking::longshots;
use keiba_signal::{
    analyze_card, init_tracing, log_skipped, notify, AppConfig, RaceAnalysis, StrategyKind,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// Custom filters for formatting
mod filters {
    use keiba_signal::{MISSING_ODDS, NO_FORM_GAP};

    pub fn format_odds(odds: &f64) -> ::askama::Result<String> {
        if *odds <= 0.0 || *odds == MISSING_ODDS {
            Ok("--".to_string())
        } else {
            Ok(format!("{:.1}", odds))
        }
    }

    pub fn format_gap(gap: &f64) -> ::askama::Result<String> {
        if *gap >= NO_FORM_GAP {
            Ok("--".to_string())
        } else {
            Ok(format!("{:+.1}", gap))
        }
    }

    pub fn format_score(score: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.0}", score))
    }

    pub fn format_value(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.2}", value))
    }
}

const DEFAULT_TOP: usize = 10;

struct StrategyOption {
    value: &'static str,
    selected: bool,
}

fn strategy_options(selected: StrategyKind) -> Vec<StrategyOption> {
    StrategyKind::ALL
        .iter()
        .map(|k| StrategyOption {
            value: k.as_str(),
            selected: *k == selected,
        })
        .collect()
}

/// One line of the ranking table
struct RankRow {
    mark: &'static str,
    post_position: u8,
    name: String,
    sire: String,
    odds: f64,
    score: f64,
    best_gap: f64,
    value_index: f64,
    longshot: bool,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    active_page: String,
    strategies: Vec<StrategyOption>,
    top: usize,
    webhook_configured: bool,
}

#[derive(Template)]
#[template(path = "result.html")]
struct ResultTemplate {
    active_page: String,
    heading: String,
    strategy: String,
    rows: Vec<RankRow>,
    bets: Vec<String>,
    longshots: Vec<String>,
    skipped: Vec<String>,
    message: String,
    discord_status: Option<String>,
}

impl ResultTemplate {
    fn from_analysis(analysis: &RaceAnalysis) -> Self {
        let rows = analysis
            .top
            .iter()
            .enumerate()
            .map(|(i, h)| RankRow {
                mark: Mark::for_rank(i).map(|m| m.symbol()).unwrap_or(""),
                post_position: h.horse.post_position,
                name: h.horse.name.clone(),
                sire: h.horse.sire.clone().unwrap_or_default(),
                odds: h.horse.odds,
                score: h.score,
                best_gap: h.best_gap,
                value_index: h.value_index,
                longshot: h.longshot,
            })
            .collect();

        Self {
            active_page: "result".to_string(),
            heading: analysis.heading.clone(),
            strategy: analysis.strategy.clone(),
            rows,
            bets: analysis.bets.iter().map(|b| b.describe()).collect(),
            longshots: longshots(&analysis.ranked)
                .into_iter()
                .map(|h| format!("{} {}", h.horse.post_position, h.horse.name))
                .collect(),
            skipped: analysis.skipped.iter().map(|s| s.to_string()).collect(),
            message: analysis.message(),
            discord_status: None,
        }
    }
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

type SharedConfig = Arc<AppConfig>;

#[derive(Debug, Deserialize)]
struct AnalyzeForm {
    text: String,
    #[serde(default)]
    strategy: StrategyKind,
    #[serde(default = "default_top")]
    top: usize,
    /// Checkbox: present only when ticked
    send_discord: Option<String>,
}

fn default_top() -> usize {
    DEFAULT_TOP
}

async fn home(State(config): State<SharedConfig>) -> impl IntoResponse {
    let template = HomeTemplate {
        active_page: "home".to_string(),
        strategies: strategy_options(StrategyKind::default()),
        top: DEFAULT_TOP,
        webhook_configured: config.webhook_url.is_some(),
    };

    HtmlTemplate(template)
}

async fn analyze(State(config): State<SharedConfig>, Form(form): Form<AnalyzeForm>) -> Response {
    let card = parse_pasted(&form.text);
    if card.horses.is_empty() {
        let skipped = log_skipped(&card);
        info!("Pasted text produced no horses ({} blocks skipped)", skipped);
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!(
                "データの抽出に失敗しました ({}件スキップ)。出馬表をそのまま貼り付けてください。",
                skipped
            ),
        )
            .into_response();
    }

    let strategy = form.strategy.build();
    let analysis = analyze_card(&card, strategy.as_ref(), form.top.max(1));
    let mut template = ResultTemplate::from_analysis(&analysis);

    if form.send_discord.is_some() {
        template.discord_status = Some(match notify(&config, &analysis).await {
            Ok(true) => "Discordに送信しました".to_string(),
            Ok(false) => "DISCORD_WEBHOOK_URL が設定されていません".to_string(),
            Err(e) => {
                error!("Discord notification failed: {:#}", e);
                format!("送信に失敗しました: {}", e)
            }
        });
    }

    HtmlTemplate(template).into_response()
}

async fn health() -> &'static str {
    "ok"
}

fn app(config: SharedConfig) -> Router {
    Router::new()
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(home))
        .route("/analyze", post(analyze))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.ci);

    let bind = config.bind;
    let app = app(Arc::new(config));

    info!("Starting web server at http://{}", bind);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
