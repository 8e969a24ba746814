mod config;
mod enrich;
mod extract;
mod fetch;
mod models;
mod pipeline;
mod positions;
mod resolve;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;
use crate::fetch::Fetcher;
use crate::pipeline::Pipeline;
use crate::resolve::cache::TickerCache;

#[derive(Parser)]
#[command(name = "ptr-etl", about = "House PTR disclosure ETL", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Download the yearly disclosure index and all matching filing PDFs
    Fetch {
        /// Disclosure year, e.g. 2024
        #[arg(short, long)]
        year: u16,

        /// Filer last name, or "all"
        #[arg(short, long, default_value = "all")]
        filer: String,
    },

    /// Extract, resolve and enrich records from downloaded PDFs
    Extract {
        /// Limit to one filer directory
        #[arg(short, long)]
        filer: Option<String>,
    },

    /// Rebuild per-filer position ledgers from extracted records
    Positions {
        /// Limit to one filer directory
        #[arg(short, long)]
        filer: Option<String>,
    },

    /// Fetch + extract + positions in one go
    Run {
        #[arg(short, long)]
        year: u16,

        #[arg(short, long, default_value = "all")]
        filer: String,
    },

    /// Show data directory statistics
    Stats,

    /// List resolved instruments in the ticker cache
    Cache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "ptr_ledger=info,warn",
        1 => "ptr_ledger=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Fetch { year, filer } => {
            let _t = utils::Timer::start("Filing download");
            let fetcher = Fetcher::new(&config.fetch, &config.storage.data_dir)?;
            let stats = fetcher.fetch_year(year, &filer).await?;
            info!(
                "Done: {} filings, {} downloaded, {} already present, {} errors",
                stats.filings_found, stats.downloaded, stats.already_present, stats.errors
            );
        }

        Command::Extract { filer } => {
            let _t = utils::Timer::start("Record extraction");
            let stats = Pipeline::new(config).run_extraction(filer.as_deref()).await?;
            info!(
                "Done: {} documents, {} skipped, {} records, {} bad rows",
                stats.documents_processed,
                stats.documents_skipped,
                stats.records_extracted,
                stats.rows_skipped
            );
        }

        Command::Positions { filer } => {
            let _t = utils::Timer::start("Position aggregation");
            let n = Pipeline::new(config).run_positions(filer.as_deref()).await?;
            info!("Done: {} instrument positions", n);
        }

        Command::Run { year, filer } => {
            let _t = utils::Timer::start("Full pipeline");
            let fetcher = Fetcher::new(&config.fetch, &config.storage.data_dir)?;
            fetcher.fetch_year(year, &filer).await?;

            let pipeline = Pipeline::new(config);
            let only = (filer != "all").then_some(filer.as_str());
            let stats = pipeline.run_extraction(only).await?;
            let instruments = pipeline.run_positions(only).await?;
            info!(
                "Done: {} documents, {} records, {} instrument positions",
                stats.documents_processed, stats.records_extracted, instruments
            );
        }

        Command::Stats => {
            let data_dir = &config.storage.data_dir;
            let mut filers = 0usize;
            let mut pdfs = 0usize;
            let mut jsons = 0usize;
            let mut ledgers = 0usize;

            if data_dir.exists() {
                for entry in std::fs::read_dir(data_dir)? {
                    let path = entry?.path();
                    if !path.is_dir() {
                        continue;
                    }
                    filers += 1;
                    pdfs += utils::count_files(&path, "pdf");
                    jsons += utils::count_files(&path, "json");
                    if path.join(&config.storage.ledger_filename).exists() {
                        ledgers += 1;
                        jsons -= 1; // the ledger is not a document
                    }
                }
            }

            println!("─────────────────────────────────");
            println!("  PTR ETL — Data Stats");
            println!("─────────────────────────────────");
            println!("  Filers     : {}", utils::fmt_number(filers as i64));
            println!("  PDFs       : {}", utils::fmt_number(pdfs as i64));
            println!("  Documents  : {}", utils::fmt_number(jsons as i64));
            println!("  Ledgers    : {}", utils::fmt_number(ledgers as i64));
            println!("─────────────────────────────────");
        }

        Command::Cache => {
            let cache = TickerCache::load(&config.resolver.cache_path)?;
            if cache.is_empty() {
                println!("Ticker cache is empty — run `ptr-etl extract` first.");
            } else {
                println!("{} cached instruments:", cache.len());
                for (company, entry) in cache.iter() {
                    println!("  {:40} {:8} {}", company, entry.ticker, entry.isin);
                }
            }
        }
    }

    Ok(())
}
