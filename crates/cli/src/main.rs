use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rebid_core::{category_label, Config};
use rebid_features::{
    band_statistics, band_variation, daily_bids, initial_bids, price_band_changes, GroupSummary,
    RebidEngine, RebidReport, Summary,
};
use rebid_ingestion::{
    load_bids, AemoCsvSource, LoadedBids, ParticipantTable, PlainCsvSource, TableSource,
};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rebids")]
#[command(about = "Classify true rebids and rebuild bid curves from NEM bid tables")]
struct Cli {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resubmission and true-rebid summaries per category and product
    Summary {
        #[command(flatten)]
        input: InputArgs,

        /// Directory for CSV output (summary is printed when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bid curve segments of every auction
    Curves {
        #[command(flatten)]
        input: InputArgs,

        /// Only this participant
        #[arg(long)]
        participant: Option<String>,

        /// Only this product
        #[arg(long)]
        product: Option<String>,

        /// Render every submission, not only the initial bid and true rebids
        #[arg(long)]
        all_submissions: bool,

        /// Write step-line vertices instead of segments
        #[arg(long)]
        points: bool,

        /// Output CSV file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Price-band movement and per-unit variation
    PriceBands {
        #[command(flatten)]
        input: InputArgs,

        /// Directory for CSV output
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Print the default configuration as JSON
    Config,
}

#[derive(Args)]
struct InputArgs {
    /// Price band table (BIDDAYOFFER)
    #[arg(long)]
    price: PathBuf,

    /// Quantity band table (BIDOFFERPERIOD)
    #[arg(long)]
    quantity: PathBuf,

    /// Participant classification table
    #[arg(long)]
    participants: PathBuf,

    /// Layout of the bid tables
    #[arg(long, value_enum, default_value = "aemo")]
    format: InputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// MMS multi-record CSV with C/I/D rows
    Aemo,
    /// Plain CSV with a single header row
    Plain,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Summary { input, out, json } => {
            let bids = load(&config, &input)?;
            let report = RebidEngine::new(&config).run(&bids);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            match out {
                Some(dir) => write_report(&report, &dir)?,
                None if !json => print_summary(&report),
                None => {}
            }
        }
        Command::Curves {
            input,
            participant,
            product,
            all_submissions,
            points,
            out,
        } => {
            let mut config = config;
            if all_submissions {
                config.analysis.true_rebids_only_curves = false;
            }
            let bids = load(&config, &input)?;
            let joined = bids.join();
            info!(
                joined = joined.diagnostics.joined,
                unjoined_quantities = joined.diagnostics.unjoined_quantities,
                unjoined_prices = joined.diagnostics.unjoined_prices,
                "joined price and quantity bands"
            );
            let records: Vec<_> = joined
                .records
                .into_iter()
                .filter(|r| participant.as_deref().map_or(true, |p| r.quantity.participant.as_str() == p))
                .filter(|r| product.as_deref().map_or(true, |p| r.quantity.product.as_str() == p))
                .collect();

            let auctions = RebidEngine::new(&config).curves(&records);
            let sink = || -> Result<Box<dyn Write>> {
                match &out {
                    Some(path) => {
                        let file = fs::File::create(path)
                            .with_context(|| format!("creating {}", path.display()))?;
                        Ok(Box::new(file))
                    }
                    None => Ok(Box::new(io::stdout())),
                }
            };
            if points {
                let rows = auctions.iter().flat_map(|auction| {
                    auction.curves.iter().flat_map(move |timed| {
                        timed
                            .curve
                            .step_points()
                            .into_iter()
                            .enumerate()
                            .map(move |(vertex, (quantity, price))| PointRow {
                                auction: auction.key.to_string(),
                                offer_timestamp: timed.offer_timestamp.to_string(),
                                sequence: timed.sequence,
                                vertex,
                                quantity,
                                price,
                            })
                    })
                });
                write_rows(csv::Writer::from_writer(sink()?), rows)?;
            } else {
                let rows = auctions.iter().flat_map(|auction| {
                    auction.curves.iter().flat_map(move |timed| {
                        timed.curve.segments().iter().map(move |s| CurveRow {
                            participant: auction.key.participant.as_str(),
                            product: auction.key.product.as_str(),
                            market_day: auction.key.market_day.to_string(),
                            dispatch_period: auction.key.dispatch_period,
                            offer_timestamp: timed.offer_timestamp.to_string(),
                            submission_type: timed.submission_type.to_string(),
                            sequence: timed.sequence,
                            band: s.band,
                            start: s.start,
                            end: s.end,
                            price: s.price,
                            quantity: s.quantity,
                        })
                    })
                });
                write_rows(csv::Writer::from_writer(sink()?), rows)?;
            }
        }
        Command::PriceBands { input, out } => {
            let bids = load(&config, &input)?;
            fs::create_dir_all(&out).with_context(|| format!("creating {}", out.display()))?;

            let changes = price_band_changes(&bids.prices.records);
            let change_rows = changes.iter().flat_map(|c| {
                (0..c.change.len()).map(move |i| BandChangeRow {
                    participant: c.key.participant.as_str(),
                    product: c.key.product.as_str(),
                    market_day: c.key.market_day.to_string(),
                    category: category_label(c.category),
                    num_submissions: c.num_submissions,
                    band: i + 1,
                    initial: c.initial[i],
                    last: c.last[i],
                    change: c.change[i],
                })
            });
            write_csv(&out.join("price_band_changes.csv"), change_rows)?;

            let daily = daily_bids(&bids.prices.records);
            let variation = band_variation(&daily);
            let variation_rows = variation.iter().map(|v| VariationRow {
                participant: v.participant.as_str(),
                category: category_label(v.category),
                band: v.band,
                samples: v.samples,
                mean: v.mean,
                std_dev: v.std_dev,
                cv: v.cv,
                distinct: v.distinct,
            });
            write_csv(&out.join("price_band_variation.csv"), variation_rows)?;

            let initial = initial_bids(&bids.prices.records);
            let subsets = [
                ("daily_price_band_stats.csv", &daily),
                ("initial_price_band_stats.csv", &initial),
            ];
            for (name, subset) in subsets {
                let rows = band_statistics(subset).into_iter().map(|((category, band), s)| BandStatsRow {
                    category: category_label(category),
                    band,
                    n: s.n,
                    mean: s.mean,
                    median: s.median,
                    std: s.std,
                    min: s.min,
                    max: s.max,
                    q25: s.q25,
                    q75: s.q75,
                });
                write_csv(&out.join(name), rows)?;
            }
            info!(
                auctions = changes.len(),
                changed = changes.iter().filter(|c| c.any_change()).count(),
                daily_bids = daily.len(),
                units = variation.len(),
                "wrote price band analyses"
            );
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&Config::default())?);
        }
    }

    Ok(())
}

fn load(config: &Config, input: &InputArgs) -> Result<LoadedBids> {
    let participants = ParticipantTable::from_path(&input.participants, &config.columns.participants)
        .with_context(|| format!("reading participants {}", input.participants.display()))?;
    info!(participants = participants.len(), "loaded participant classification");

    let bids = match input.format {
        InputFormat::Aemo => load_from(
            config,
            &participants,
            AemoCsvSource::open(&input.price)?.with_table(config.loader.price_table.as_deref()),
            AemoCsvSource::open(&input.quantity)?.with_table(config.loader.quantity_table.as_deref()),
        ),
        InputFormat::Plain => load_from(
            config,
            &participants,
            PlainCsvSource::open(&input.price)?,
            PlainCsvSource::open(&input.quantity)?,
        ),
    };
    bids.with_context(|| {
        format!(
            "loading bids from {} and {}",
            input.price.display(),
            input.quantity.display()
        )
    })
}

fn load_from(
    config: &Config,
    participants: &ParticipantTable,
    prices: impl TableSource,
    quantities: impl TableSource,
) -> Result<LoadedBids> {
    Ok(load_bids(config, participants, prices, quantities)?)
}

fn print_summary(report: &RebidReport) {
    println!("Rebid Analysis Summary");
    println!("======================");
    println!(
        "Day-level auctions: {}   Period-level auctions: {}",
        report.day_auctions.len(),
        report.period_auctions.len()
    );
    println!(
        "Resubmissions: {}   True rebids: {}",
        report.total_period_resubmissions(),
        report.total_true_rebids()
    );

    println!();
    println!("Resubmissions per day-level auction:");
    for group in &report.resubmissions_by_category {
        print_group(group);
    }
    println!();
    println!("True rebids per period-level auction:");
    for group in &report.true_rebids_by_category {
        print_group(group);
    }
}

fn print_group(group: &GroupSummary) {
    let s = &group.summary;
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{:.2}", x));
    println!(
        "  {:<24} n={:<7} mean={:<8} median={:<8} std={:<8} max={}",
        category_label(group.category),
        s.n,
        fmt(s.mean),
        fmt(s.median),
        fmt(s.std),
        fmt(s.max),
    );
}

fn write_report(report: &RebidReport, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    write_csv(
        &dir.join("day_auctions.csv"),
        report.day_auctions.iter().map(|a| AuctionRow {
            participant: a.key.participant.as_str(),
            product: a.key.product.as_str(),
            market_day: a.key.market_day.to_string(),
            dispatch_period: None,
            category: category_label(a.category),
            num_submissions: a.num_submissions,
            num_resubmissions: a.num_resubmissions,
            num_true_rebids: None,
        }),
    )?;
    write_csv(
        &dir.join("period_auctions.csv"),
        report.period_auctions.iter().map(|a| AuctionRow {
            participant: a.key.participant.as_str(),
            product: a.key.product.as_str(),
            market_day: a.key.market_day.to_string(),
            dispatch_period: a.key.dispatch_period,
            category: category_label(a.category),
            num_submissions: a.num_submissions,
            num_resubmissions: a.num_resubmissions,
            num_true_rebids: Some(a.num_true_rebids),
        }),
    )?;

    let summaries = [
        ("resubmissions", &report.resubmissions_by_category),
        ("resubmissions", &report.resubmissions_by_product),
        ("true_rebids", &report.true_rebids_by_category),
        ("true_rebids", &report.true_rebids_by_product),
        ("unit_mean_true_rebids", &report.unit_mean_true_rebids),
    ];
    write_csv(
        &dir.join("summaries.csv"),
        summaries.iter().flat_map(|(metric, groups)| {
            groups.iter().map(move |g| SummaryRow::new(metric, g))
        }),
    )?;

    write_csv(
        &dir.join("unit_profiles.csv"),
        report.unit_profiles.iter().map(|p| UnitRow {
            category: category_label(p.key.category),
            product: p.key.product.as_str(),
            participant: p.key.participant.as_str(),
            auctions: p.auctions,
            total_true_rebids: p.total_true_rebids,
            mean: p.true_rebids.mean,
            median: p.true_rebids.median,
            std: p.true_rebids.std,
        }),
    )?;

    fs::write(
        dir.join("diagnostics.json"),
        serde_json::to_string_pretty(&serde_json::json!({
            "prices": report.price_diagnostics,
            "quantities": report.quantity_diagnostics,
        }))?,
    )?;

    info!(dir = %dir.display(), "wrote report");
    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    write_rows(writer, rows)
}

fn write_rows<W: Write, T: Serialize>(
    mut writer: csv::Writer<W>,
    rows: impl IntoIterator<Item = T>,
) -> Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct AuctionRow<'a> {
    participant: &'a str,
    product: &'a str,
    market_day: String,
    dispatch_period: Option<u16>,
    category: &'static str,
    num_submissions: usize,
    num_resubmissions: usize,
    num_true_rebids: Option<usize>,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    metric: &'a str,
    category: &'static str,
    product: &'a str,
    n: usize,
    mean: Option<f64>,
    median: Option<f64>,
    std: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    q25: Option<f64>,
    q75: Option<f64>,
    pct_zero: Option<f64>,
}

impl<'a> SummaryRow<'a> {
    fn new(metric: &'a str, group: &'a GroupSummary) -> Self {
        let Summary {
            n,
            mean,
            median,
            std,
            min,
            max,
            q25,
            q75,
            pct_zero,
        } = group.summary;
        Self {
            metric,
            category: category_label(group.category),
            product: group.product.as_ref().map_or("ALL", |p| p.as_str()),
            n,
            mean,
            median,
            std,
            min,
            max,
            q25,
            q75,
            pct_zero,
        }
    }
}

#[derive(Serialize)]
struct UnitRow<'a> {
    category: &'static str,
    product: &'a str,
    participant: &'a str,
    auctions: usize,
    total_true_rebids: usize,
    mean: Option<f64>,
    median: Option<f64>,
    std: Option<f64>,
}

#[derive(Serialize)]
struct CurveRow<'a> {
    participant: &'a str,
    product: &'a str,
    market_day: String,
    dispatch_period: Option<u16>,
    offer_timestamp: String,
    submission_type: String,
    sequence: usize,
    band: usize,
    start: f64,
    end: f64,
    price: Option<f64>,
    quantity: Option<f64>,
}

#[derive(Serialize)]
struct PointRow {
    auction: String,
    offer_timestamp: String,
    sequence: usize,
    vertex: usize,
    quantity: f64,
    price: Option<f64>,
}

#[derive(Serialize)]
struct BandStatsRow {
    category: &'static str,
    band: usize,
    n: usize,
    mean: Option<f64>,
    median: Option<f64>,
    std: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    q25: Option<f64>,
    q75: Option<f64>,
}

#[derive(Serialize)]
struct BandChangeRow<'a> {
    participant: &'a str,
    product: &'a str,
    market_day: String,
    category: &'static str,
    num_submissions: usize,
    band: usize,
    initial: Option<f64>,
    last: Option<f64>,
    change: Option<f64>,
}

#[derive(Serialize)]
struct VariationRow<'a> {
    participant: &'a str,
    category: &'static str,
    band: usize,
    samples: usize,
    mean: Option<f64>,
    std_dev: Option<f64>,
    cv: Option<f64>,
    distinct: usize,
}
