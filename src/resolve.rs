use std::sync::{Arc, LazyLock};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use scraper::{Html, Selector};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::dataset::MISSING;

static CATALOG_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"imdb\.com/title/").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Resolve an ordered sequence of detail-page references to catalog
/// identifiers, 1:1 and order-preserving. Fetches run through a bounded
/// task pool; every per-item failure collapses to the missing marker.
pub async fn resolve_references(
    client: &reqwest::Client,
    refs: &[String],
    concurrency: usize,
) -> Result<Vec<String>> {
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let pb = ProgressBar::new(refs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<(usize, String)>(concurrency * 2);

    for (idx, reference) in refs.iter().cloned().enumerate() {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let id = resolve_one(&client, &reference).await;
            let _ = tx.send((idx, id)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ids = vec![MISSING.to_string(); refs.len()];
    while let Some((idx, id)) = rx.recv().await {
        ids[idx] = id;
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(ids)
}

/// Resolve a single reference. Absent references never touch the network;
/// fetch failures and pages without a catalog link both yield the marker.
async fn resolve_one(client: &reqwest::Client, reference: &str) -> String {
    if reference == MISSING {
        return MISSING.to_string();
    }
    match fetch_page(client, reference).await {
        Ok(html) => extract_catalog_id(&html).unwrap_or_else(|| {
            debug!("No catalog link on {}", reference);
            MISSING.to_string()
        }),
        Err(e) => {
            warn!("Fetch failed for {}: {}", reference, e);
            MISSING.to_string()
        }
    }
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, reqwest::Error> {
    client.get(url).send().await?.error_for_status()?.text().await
}

/// Scan the page's "external text" hyperlinks for the first catalog
/// detail-page target and take the first run of digits as the identifier.
pub fn extract_catalog_id(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let external_sel = Selector::parse("a.external.text[href]").unwrap();

    for anchor in doc.select(&external_sel) {
        let href = anchor.value().attr("href").unwrap_or("");
        if CATALOG_LINK_RE.is_match(href) {
            if let Some(m) = DIGITS_RE.find(href) {
                return Some(m.as_str().to_string());
            }
        }
    }
    None
}

// ── Tests ──
