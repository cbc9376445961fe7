use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coinsage_core::analysis::{backtest, risk, trend};
use coinsage_core::config::Settings;
use coinsage_core::ingest::provider::{self, CoinGeckoClient, MarketDataProvider};
use coinsage_core::ingest::sentiment::{CoinbaseSentimentClient, SentimentSource};
use coinsage_core::llm::gemini::GeminiClient;
use coinsage_core::llm::{parse, GenerateInput, TextGenerator};
use coinsage_core::notify::telegram::TelegramNotifier;
use coinsage_core::notify::{message, AlertSink};

const DEFAULT_HISTORY_DAYS: u32 = 90;

#[derive(Debug, Parser)]
#[command(name = "coinsage_worker")]
struct Args {
    /// Number of assets to pull into the market snapshot.
    #[arg(long)]
    top: Option<usize>,

    /// Days of daily price history fetched per asset for trend derivation.
    #[arg(long)]
    history_days: Option<u32>,

    /// Seed for the backtest simulation; omit for a fresh OS-seeded run.
    #[arg(long)]
    seed: Option<u64>,

    /// Do everything except sending the alert.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let mut market = CoinGeckoClient::from_settings(&settings)?;
    if let Some(top) = args.top {
        market = market.with_per_page(top);
    }
    let sentiment_source = CoinbaseSentimentClient::from_settings(&settings)?;

    // The snapshot and the sentiment read are independent of each other.
    let (snapshot, sentiment) = tokio::join!(
        market.fetch_markets(),
        sentiment_source.market_sentiment(),
    );
    let snapshot = snapshot?;
    let sentiment = sentiment?;
    tracing::info!(
        rows = snapshot.rows.len(),
        provider = market.provider_name(),
        "fetched market snapshot"
    );

    // Risk scoring and trend derivation both have to land before the
    // generator sees anything.
    let risks = risk::score(&snapshot.rows, &risk::RiskWeights::from_env());

    let history_days = args.history_days.unwrap_or(DEFAULT_HISTORY_DAYS);
    let histories =
        provider::fetch_price_histories(&market, &snapshot, history_days, market.req_delay()).await;
    let trends = trend::derive_all(&histories, &trend::TrendWindows::default());
    tracing::info!(
        risks = risks.len(),
        trends = trends.len(),
        "analysis complete"
    );

    let llm = GeminiClient::from_settings(&settings)?;
    let input = GenerateInput {
        snapshot,
        trends,
        risks,
        sentiment,
    };

    let text = match llm.generate_recommendations(&input).await {
        Ok(text) => text,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            if let Some(diag) = err.downcast_ref::<coinsage_core::llm::error::LlmDiagnosticsError>()
            {
                tracing::error!(
                    stage = diag.stage,
                    raw_output = diag.raw_output.as_deref().unwrap_or(""),
                    error = %err,
                    "recommendation generation failed"
                );
            } else {
                tracing::error!(error = %err, "recommendation generation failed");
            }
            return Ok(());
        }
    };

    let recommendations = parse::parse_recommendations(&text);
    if recommendations.is_empty() {
        tracing::warn!("generator output produced no parseable recommendations");
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let results = backtest::simulate(&recommendations, &backtest::BacktestConfig::from_env(), &mut rng);
    tracing::info!(
        recommendations = recommendations.len(),
        qualifying = results.individual_performances.len(),
        overall_performance = results.overall_performance,
        success_rate = results.success_rate,
        "backtest complete"
    );

    let alert = message::format_alert(&recommendations, &results, &sentiment_source.market_news());

    if args.dry_run {
        tracing::info!(dry_run = true, alert = %alert, "dry-run: skipping alert delivery");
        return Ok(());
    }

    let notifier = TelegramNotifier::from_settings(&settings)?;
    match notifier.send(&alert).await {
        Ok(()) => tracing::info!(sink = notifier.sink_name(), "alert delivered"),
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(sink = notifier.sink_name(), error = %err, "alert delivery failed");
        }
    }

    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
