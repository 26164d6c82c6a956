use clap::{Parser, Subcommand};
use tracing::error;

mod classify;
mod config;
mod constants;
#[cfg(feature = "db")]
mod db;
mod engine;
mod error;
mod filter;
mod logging;
mod normalize;
mod period;
mod providers;
mod storage;
mod types;

use crate::config::SeriesCatalog;
use crate::engine::{IngestOptions, IngestionEngine, SeriesOutcome};
use crate::providers::FredClient;
use crate::storage::FactStore;
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "macrolake")]
#[command(about = "Bitemporal macroeconomic data ingestion engine")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest configured series into the fact store
    Ingest {
        /// Specific tables to ingest (comma-separated). Default: all
        #[arg(long)]
        tables: Option<String>,
        /// Only persist data past each series' watermark (plus revisions)
        #[arg(long)]
        update_only: bool,
        /// Explicit fetch start date (YYYY-MM-DD); overrides update-only
        #[arg(long)]
        start_date: Option<String>,
        /// Explicit fetch end date (YYYY-MM-DD); default today
        #[arg(long)]
        end_date: Option<String>,
        /// Abort the whole run on the first series failure
        #[arg(long)]
        fail_fast: bool,
        /// Path to the series catalog
        #[arg(long, default_value = "series_catalog.toml")]
        catalog: String,
    },
    /// List the series defined in the catalog
    Series {
        /// Path to the series catalog
        #[arg(long, default_value = "series_catalog.toml")]
        catalog: String,
    },
}

fn parse_cli_date(raw: &str, name: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("{name} must be in YYYY-MM-DD format, got: {raw}").into())
}

async fn build_store() -> Result<Arc<dyn FactStore>, Box<dyn std::error::Error>> {
    #[cfg(feature = "db")]
    {
        let db = db::LakeDb::new().await?;
        db.run_migrations().await?;
        Ok(Arc::new(db))
    }
    #[cfg(not(feature = "db"))]
    {
        Ok(Arc::new(storage::InMemoryStore::new()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Series { catalog } => {
            let catalog = SeriesCatalog::load(&catalog)?;
            println!("Configured series:");
            for meta in &catalog.series {
                println!(
                    "   {} -> {} ({} {}, {})",
                    meta.series_id,
                    meta.table,
                    meta.frequency.as_str(),
                    meta.unit,
                    if meta.fetch_vintages { "all vintages" } else { "latest only" }
                );
            }
        }
        Commands::Ingest {
            tables,
            update_only,
            start_date,
            end_date,
            fail_fast,
            catalog,
        } => {
            println!("🔄 Running ingestion...");

            let catalog = SeriesCatalog::load(&catalog)?;

            let table_selection: Option<Vec<String>> = tables.map(|list| {
                list.split(',').map(|s| s.trim().to_string()).collect()
            });
            let series: Vec<_> = catalog
                .series_for_tables(table_selection.as_deref())
                .into_iter()
                .cloned()
                .collect();
            if series.is_empty() {
                return Err("No catalog series match the requested tables".into());
            }

            let opts = IngestOptions {
                update_only,
                start_date: start_date
                    .as_deref()
                    .map(|s| parse_cli_date(s, "start_date"))
                    .transpose()?,
                end_date: end_date
                    .as_deref()
                    .map(|s| parse_cli_date(s, "end_date"))
                    .transpose()?,
                fail_fast,
            };

            let provider = Arc::new(FredClient::from_env(catalog.provider.base_url.clone())?);
            let store = build_store().await?;

            let engine = IngestionEngine::new(provider, store);
            match engine.run(&series, &opts).await {
                Ok(summary) => {
                    println!("\n📊 Ingestion summary (run {}):", summary.run_id);
                    for report in &summary.reports {
                        match &report.outcome {
                            SeriesOutcome::Inserted { rows } => {
                                println!("   ✅ {} -> {} ({} rows)", report.series_id, report.table, rows)
                            }
                            SeriesOutcome::Skipped { reason } => {
                                println!("   ⏭️  {} ({})", report.series_id, reason)
                            }
                            SeriesOutcome::Failed { reason } => {
                                println!("   ❌ {} ({})", report.series_id, reason)
                            }
                        }
                    }
                    println!("   Total rows inserted: {}", summary.rows_inserted());

                    if summary.has_failures() {
                        error!("{} series failed this run", summary.failed().len());
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    error!("Ingestion run aborted: {}", e);
                    println!("❌ Ingestion run aborted: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
