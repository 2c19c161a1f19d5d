use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use crate::dataset::MISSING;
use crate::db::LinkPair;

pub const BASE_URL: &str = "https://en.wikipedia.org";
pub const INDEX_URLS: [&str; 2] = [
    "https://en.wikipedia.org/wiki/List_of_film_remakes_(A%E2%80%93M)",
    "https://en.wikipedia.org/wiki/List_of_film_remakes_(N%E2%80%93Z)",
];

/// Fetch both index pages and return every (original, remake) pair found,
/// in page order. An index fetch failure is fatal; malformed rows are not.
pub async fn discover_pairs(client: &reqwest::Client) -> Result<Vec<LinkPair>> {
    let mut pairs = Vec::new();
    for url in INDEX_URLS {
        info!("Fetching index page: {}", url);
        let html = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
            .with_context(|| format!("Failed to fetch index page {}", url))?;
        let page_pairs = parse_index_page(&html);
        info!("Found {} pairs on {}", page_pairs.len(), url);
        pairs.extend(page_pairs);
    }
    Ok(pairs)
}

/// Parse one index page. The first table on each page is navigation, not
/// data, and the first row of each data table is the header. The first
/// anchor of a row is the original, the second the remake; a row short on
/// anchors gets the missing marker for that side and the scan continues.
pub fn parse_index_page(html: &str) -> Vec<LinkPair> {
    let doc = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let anchor_sel = Selector::parse("a[href]").unwrap();

    let mut pairs = Vec::new();
    for table in doc.select(&table_sel).skip(1) {
        for row in table.select(&row_sel).skip(1) {
            let anchors: Vec<ElementRef> = row.select(&anchor_sel).collect();
            let (original_title, original_ref) = anchor_fields(anchors.first());
            let (remake_title, remake_ref) = anchor_fields(anchors.get(1));
            pairs.push(LinkPair {
                original_title,
                original_ref,
                remake_title,
                remake_ref,
            });
        }
    }
    pairs
}

fn anchor_fields(anchor: Option<&ElementRef>) -> (String, String) {
    match anchor {
        Some(a) => {
            let title = a
                .value()
                .attr("title")
                .map(str::to_string)
                .unwrap_or_else(|| MISSING.to_string());
            let href = a
                .value()
                .attr("href")
                .map(absolute_url)
                .unwrap_or_else(|| MISSING.to_string());
            (title, href)
        }
        None => (MISSING.to_string(), MISSING.to_string()),
    }
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", BASE_URL, href)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_pairs() -> Vec<LinkPair> {
        let html = std::fs::read_to_string("tests/fixtures/index_page.html").unwrap();
        parse_index_page(&html)
    }

    #[test]
    fn parses_rows_across_data_tables() {
        let pairs = fixture_pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].original_title, "The Parent Trap (1961 film)");
        assert_eq!(
            pairs[0].remake_ref,
            "https://en.wikipedia.org/wiki/The_Parent_Trap_(1998_film)"
        );
        assert_eq!(pairs[2].remake_title, "True Grit (2010 film)");
    }

    #[test]
    fn first_table_is_skipped() {
        let pairs = fixture_pairs();
        assert!(pairs
            .iter()
            .all(|p| p.original_title != "Lists of films" && p.remake_title != "Lists of films"));
    }

    #[test]
    fn single_anchor_row_marks_remake_absent() {
        let pairs = fixture_pairs();
        assert_eq!(pairs[1].original_title, "Solaris (1972 film)");
        assert_eq!(pairs[1].remake_title, MISSING);
        assert_eq!(pairs[1].remake_ref, MISSING);
    }

    #[test]
    fn relative_hrefs_are_joined_against_base() {
        let pairs = fixture_pairs();
        assert!(pairs
            .iter()
            .filter(|p| p.original_ref != MISSING)
            .all(|p| p.original_ref.starts_with(BASE_URL)));
    }

    #[test]
    fn anchorless_row_yields_full_sentinel_pair() {
        let html = "<table></table>\
                    <table><tr><th>Original</th><th>Remake</th></tr>\
                    <tr><td>plain</td><td>text</td></tr></table>";
        let pairs = parse_index_page(html);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].original_ref, MISSING);
        assert_eq!(pairs[0].remake_ref, MISSING);
    }

    #[test]
    fn header_rows_are_not_emitted_as_pairs() {
        let pairs = fixture_pairs();
        assert!(pairs.iter().all(|p| p.original_title != "Original film"));
    }
}
