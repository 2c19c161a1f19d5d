use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::catalog::{CatalogClient, MovieRecord};
use crate::dataset::{missing_row, MISSING, Row};
use crate::db::IdPairRow;

/// Assemble one 10-field row per identifier pair, in input order. Lookups
/// run through a bounded task pool; a pair whose lookup fails in any way
/// yields a row of missing markers, never a partial row.
pub async fn fetch_rows(
    catalog: &CatalogClient,
    pairs: &[IdPairRow],
    concurrency: usize,
) -> Result<Vec<(i64, Row)>> {
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let pb = ProgressBar::new(pairs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<(usize, i64, Row)>(concurrency * 2);

    for (idx, pair) in pairs.iter().cloned().enumerate() {
        let catalog = catalog.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let row = fetch_pair(&catalog, &pair.original_id, &pair.remake_id).await;
            let _ = tx.send((idx, pair.pair_id, row)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut rows: Vec<(i64, Row)> = pairs.iter().map(|p| (p.pair_id, missing_row())).collect();
    while let Some((idx, pair_id, row)) = rx.recv().await {
        rows[idx] = (pair_id, row);
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(rows)
}

async fn fetch_pair(catalog: &CatalogClient, original_id: &str, remake_id: &str) -> Row {
    let original = lookup_side(catalog, original_id).await;
    let remake = lookup_side(catalog, remake_id).await;
    match (original, remake) {
        (Some(original), Some(remake)) => combine_row(&original, &remake),
        _ => missing_row(),
    }
}

async fn lookup_side(catalog: &CatalogClient, id: &str) -> Option<MovieRecord> {
    if id == MISSING {
        return None;
    }
    match catalog.lookup(id).await {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Catalog lookup failed for {}: {}", id, e);
            None
        }
    }
}

/// Flatten an (original, remake) record pair into the exported column order.
/// Genre lists are joined with `|` so the cell stays a single flat value.
pub fn combine_row(original: &MovieRecord, remake: &MovieRecord) -> Row {
    [
        original.title.clone(),
        original.year.to_string(),
        original.genres.join("|"),
        original.rating.to_string(),
        original.votes.to_string(),
        remake.title.clone(),
        remake.year.to_string(),
        remake.genres.join("|"),
        remake.rating.to_string(),
        remake.votes.to_string(),
    ]
}

// ── Tests ──
