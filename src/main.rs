mod catalog;
mod config;
mod dataset;
mod db;
mod discover;
mod export;
mod fetch;
mod resolve;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::dataset::{ColumnMap, Table, MISSING};

#[derive(Parser)]
#[command(name = "remake_scraper", about = "Movie remake dataset scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the index pages and store the discovered link pairs
    Discover,
    /// Resolve detail pages to catalog identifiers
    Resolve {
        /// Max pairs to resolve (default: all discovered)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Look up catalog records and assemble the raw table
    Fetch {
        /// Max pairs to fetch (default: all resolved)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Discover + resolve + fetch in one pipeline
    Run {
        /// Max pairs to resolve+fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Clean the raw table and write the CSV artifact
    Export {
        /// Output path (default: from settings)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show pipeline statistics
    Stats,
    /// Cleaned dataset sample
    Overview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Discover => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let client = http_client(&settings)?;
            let pairs = discover::discover_pairs(&client).await?;
            let inserted = db::replace_link_pairs(&conn, &pairs)?;
            let absent = pairs
                .iter()
                .filter(|p| p.original_ref == MISSING || p.remake_ref == MISSING)
                .count();
            println!(
                "Discovered {} pairs ({} with a missing side).",
                inserted, absent
            );
            Ok(())
        }
        Commands::Resolve { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pairs = db::fetch_link_pairs(&conn, limit)?;
            if pairs.is_empty() {
                println!("No link pairs. Run 'discover' first.");
                return Ok(());
            }
            let client = http_client(&settings)?;
            println!("Resolving {} pairs...", pairs.len());
            let rows = resolve_stage(&client, &settings, &pairs).await?;
            let resolved = rows
                .iter()
                .filter(|r| r.original_id != MISSING && r.remake_id != MISSING)
                .count();
            db::replace_id_pairs(&conn, &rows)?;
            println!(
                "Resolved {} of {} pairs to catalog identifiers.",
                resolved,
                rows.len()
            );
            Ok(())
        }
        Commands::Fetch { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let id_pairs = db::fetch_id_pairs(&conn, limit)?;
            if id_pairs.is_empty() {
                println!("No identifier pairs. Run 'resolve' first.");
                return Ok(());
            }
            let catalog = catalog_client(&settings)?;
            println!("Fetching catalog records for {} pairs...", id_pairs.len());
            let rows = fetch::fetch_rows(&catalog, &id_pairs, settings.concurrency).await?;
            let complete = rows
                .iter()
                .filter(|(_, row)| row.iter().all(|cell| cell.as_str() != MISSING))
                .count();
            db::replace_movie_rows(&conn, &rows)?;
            println!(
                "Assembled {} rows ({} complete, {} all-missing).",
                rows.len(),
                complete,
                rows.len() - complete
            );
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let client = http_client(&settings)?;

            // Phase 1: discover
            let t_discover = Instant::now();
            let pairs = discover::discover_pairs(&client).await?;
            db::replace_link_pairs(&conn, &pairs)?;
            println!(
                "Discovered {} pairs in {:.1}s",
                pairs.len(),
                t_discover.elapsed().as_secs_f64()
            );

            // Phase 2: resolve
            let t_resolve = Instant::now();
            let stored = db::fetch_link_pairs(&conn, limit)?;
            println!("Resolving {} pairs...", stored.len());
            let id_rows = resolve_stage(&client, &settings, &stored).await?;
            db::replace_id_pairs(&conn, &id_rows)?;
            println!(
                "Resolved in {:.1}s",
                t_resolve.elapsed().as_secs_f64()
            );

            // Phase 3: fetch
            let t_fetch = Instant::now();
            let catalog = catalog_client(&settings)?;
            println!("Fetching catalog records for {} pairs...", id_rows.len());
            let rows = fetch::fetch_rows(&catalog, &id_rows, settings.concurrency).await?;
            db::replace_movie_rows(&conn, &rows)?;
            println!(
                "Assembled {} rows in {:.1}s",
                rows.len(),
                t_fetch.elapsed().as_secs_f64()
            );
            println!("Run 'export' to write the cleaned CSV.");
            Ok(())
        }
        Commands::Export { output } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let raw = db::fetch_movie_rows(&conn)?;
            if raw.is_empty() {
                println!("No fetched rows. Run 'fetch' first.");
                return Ok(());
            }
            let table = Table::from_rows(raw);
            let cleaned = table.clean();
            let path = output.unwrap_or_else(|| PathBuf::from(&settings.export_path));
            export::write_csv(&cleaned, &path)?;
            println!(
                "Wrote {} rows to {} ({} dropped in cleaning).",
                cleaned.len(),
                path.display(),
                table.len() - cleaned.len()
            );
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Pairs discovered:  {}", s.pairs);
            println!("  missing a side:  {}", s.absent_refs);
            println!("Pairs resolved:    {}", s.id_pairs);
            println!("  sentinel ids:    {}", s.sentinel_ids);
            println!("Rows assembled:    {}", s.rows);
            println!("  complete:        {}", s.complete_rows);
            println!("  would drop:      {}", s.rows - s.complete_rows);
            Ok(())
        }
        Commands::Overview { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let raw = db::fetch_movie_rows(&conn)?;
            if raw.is_empty() {
                println!("No fetched rows. Run 'fetch' first.");
                return Ok(());
            }
            let table = Table::from_rows(raw);
            let cleaned = table.clean();
            print_overview(&cleaned, limit);
            println!(
                "\n{} rows total ({} dropped in cleaning)",
                cleaned.len(),
                table.len() - cleaned.len()
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Resolve both sides of each pair, originals first, then remakes, each
/// side an independent ordered sequence.
async fn resolve_stage(
    client: &reqwest::Client,
    settings: &Settings,
    pairs: &[db::LinkPairRow],
) -> Result<Vec<db::IdPairRow>> {
    let originals: Vec<String> = pairs.iter().map(|p| p.original_ref.clone()).collect();
    let remakes: Vec<String> = pairs.iter().map(|p| p.remake_ref.clone()).collect();

    let original_ids = resolve::resolve_references(client, &originals, settings.concurrency).await?;
    let remake_ids = resolve::resolve_references(client, &remakes, settings.concurrency).await?;

    Ok(pairs
        .iter()
        .zip(original_ids)
        .zip(remake_ids)
        .map(|((pair, original_id), remake_id)| db::IdPairRow {
            pair_id: pair.id,
            original_id,
            remake_id,
        })
        .collect())
}

fn http_client(settings: &Settings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("remake_scraper/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

fn catalog_client(settings: &Settings) -> Result<catalog::CatalogClient> {
    if settings.catalog_api_key.is_empty() {
        bail!("REMAKE_CATALOG_API_KEY must be set to query the catalog");
    }
    Ok(catalog::CatalogClient::new(http_client(settings)?, settings))
}

fn print_overview(table: &Table, limit: usize) {
    let columns = ColumnMap::new();
    println!(
        "{:>3} | {:<28} | {:>4} | {:>5} | {:<28} | {:>4} | {:>5}",
        "#", "Original", "Year", "Score", "Remake", "Year", "Score"
    );
    println!("{}", "-".repeat(96));

    for (i, row) in table.rows().iter().take(limit).enumerate() {
        println!(
            "{:>3} | {:<28} | {:>4} | {:>5} | {:<28} | {:>4} | {:>5}",
            i,
            truncate(&row[columns.index("original_title")], 28),
            row[columns.index("original_year")],
            row[columns.index("original_rating")],
            truncate(&row[columns.index("remake_title")], 28),
            row[columns.index("remake_year")],
            row[columns.index("remake_rating")],
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MovieRecord;
    use crate::dataset::missing_row;
    use crate::discover::parse_index_page;
    use crate::fetch::combine_row;
    use crate::resolve::extract_catalog_id;

    /// The full pure path: a one-anchor index row propagates the missing
    /// marker through resolution and assembly, and cleaning drops it.
    #[test]
    fn missing_side_propagates_and_is_cleaned_away() {
        let html = std::fs::read_to_string("tests/fixtures/index_page.html").unwrap();
        let pairs = parse_index_page(&html);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1].remake_ref, MISSING);

        let detail = std::fs::read_to_string("tests/fixtures/detail_page.html").unwrap();
        assert_eq!(extract_catalog_id(&detail).as_deref(), Some("0120338"));

        let original = MovieRecord {
            title: "The Parent Trap".to_string(),
            year: 1961,
            genres: vec!["Comedy".to_string()],
            rating: 7.1,
            votes: 22_310,
        };
        let remake = MovieRecord {
            title: "The Parent Trap".to_string(),
            year: 1998,
            genres: vec!["Adventure".to_string(), "Comedy".to_string()],
            rating: 6.6,
            votes: 110_259,
        };

        // Valid pair keeps its row; the one-sided pair collapses whole.
        let table = Table::from_rows(vec![combine_row(&original, &remake), missing_row()]);
        let cleaned = table.clean();
        assert_eq!(cleaned.len(), 1);
        assert!(cleaned
            .rows()
            .iter()
            .flatten()
            .all(|cell| cell.as_str() != MISSING));

        let columns = ColumnMap::new();
        assert_eq!(cleaned.rows()[0][columns.index("remake_year")], "1998");
        assert_eq!(
            cleaned.rows()[0][columns.index("original_genres")],
            "Comedy"
        );
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("short", 28), "short");
        assert_eq!(truncate("a very long movie title here", 8), "a very l...");
    }
}
