use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use stateful_rsi::feed::{load_klines_json, KlineBuffer, MarketScenario, SyntheticKlineGenerator};
use stateful_rsi::models::{KLine, RsiPoint, SeriesKey};
use stateful_rsi::output::{self, Drawable};
use stateful_rsi::persistence::StateStore;
use stateful_rsi::plugin::{CustomIndicator, IndicatorRunner, StatefulRsiIndicator};
use stateful_rsi::settings::RsiSettings;
use stateful_rsi::Result;
use std::path::PathBuf;

/// Replay a kline series through the incremental RSI indicator
#[derive(Parser, Debug)]
#[command(name = "stateful-rsi", version)]
struct Cli {
    /// TOML settings file (period, overbought, oversold, colors)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "SYNTH")]
    symbol: String,

    #[arg(long, global = true, default_value = "5m")]
    timeframe: String,

    /// Bars appended between indicator runs
    #[arg(long, global = true, default_value_t = 10)]
    batch: usize,

    /// Rolling buffer size; older bars are trimmed
    #[arg(long, global = true, default_value_t = 500)]
    window: usize,

    /// Print the final drawables as JSON instead of a point table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    source: Source,
}

#[derive(Subcommand, Debug)]
enum Source {
    /// Read klines from a JSON array of {"timestamp", "close"}
    Replay {
        #[arg(long)]
        input: PathBuf,
    },
    /// Generate a reproducible random series
    Synthetic {
        #[arg(long, default_value_t = 200)]
        bars: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, value_enum, default_value_t = MarketScenario::Sideways)]
        scenario: MarketScenario,
        #[arg(long, default_value_t = 5)]
        interval_minutes: i64,
        /// Timestamp of the first bar (RFC 3339)
        #[arg(long, default_value = "2024-01-01T00:00:00Z")]
        start: DateTime<Utc>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = RsiSettings::load(cli.config.as_deref())?;
    let klines = load_source(&cli.source)?;

    tracing::info!(
        "Replaying {} bars for {}@{} (period {}, batch {}, window {})",
        klines.len(),
        cli.symbol,
        cli.timeframe,
        settings.period,
        cli.batch,
        cli.window
    );

    let series = SeriesKey::new(cli.symbol.clone(), cli.timeframe.clone());
    let buffer = KlineBuffer::new(cli.window.max(1));
    let runner = IndicatorRunner::new(StatefulRsiIndicator::new(), settings, StateStore::new());

    let mut all_points: Vec<RsiPoint> = Vec::new();
    for (batch_no, chunk) in klines.chunks(cli.batch.max(1)).enumerate() {
        let accepted = buffer.extend(&series, chunk)?;
        let bars = buffer.klines(&series)?;
        let drawables = runner.run(&series, &bars)?;
        let points = polyline_points(&drawables);

        tracing::debug!(
            "Batch {}: +{} bars, {} buffered, {} new points",
            batch_no,
            accepted,
            bars.len(),
            points.len()
        );
        all_points.extend(points);
    }

    let bars = buffer.klines(&series)?;
    if cli.json {
        let style = runner.settings().band_style();
        let drawables = output::emit(&all_points, &bars, &style);
        println!("{}", serde_json::to_string_pretty(&drawables)?);
    } else {
        print_table(&all_points, runner.settings());
    }

    tracing::info!(
        "{} produced {} points",
        runner.indicator().name(),
        all_points.len()
    );
    runner.unload()?;

    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stateful_rsi=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_source(source: &Source) -> Result<Vec<KLine>> {
    match source {
        Source::Replay { input } => Ok(load_klines_json(input)?),
        Source::Synthetic {
            bars,
            seed,
            scenario,
            interval_minutes,
            start,
        } => {
            let mut generator = SyntheticKlineGenerator::new(*seed);
            Ok(generator.generate(*scenario, *bars, *interval_minutes, *start))
        }
    }
}

fn polyline_points(drawables: &[Drawable]) -> Vec<RsiPoint> {
    drawables
        .iter()
        .filter_map(|d| match d {
            Drawable::Polyline { points, .. } => Some(points),
            _ => None,
        })
        .flatten()
        .map(|p| RsiPoint {
            timestamp: p.timestamp,
            value: p.value,
        })
        .collect()
}

fn print_table(points: &[RsiPoint], settings: &RsiSettings) {
    println!("{:<26} | {:>14} | Zone", "Timestamp", "RSI");
    println!("{:-<26}-|-{:->14}-|-----------", "", "");

    for point in points {
        let zone = if point.value >= settings.overbought {
            "overbought"
        } else if point.value <= settings.oversold {
            "oversold"
        } else {
            ""
        };
        println!(
            "{:<26} | {:>14} | {}",
            point.timestamp.to_rfc3339(),
            point.value.round_dp(4),
            zone
        );
    }
}
