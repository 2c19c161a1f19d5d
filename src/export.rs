use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::dataset::{Table, COLUMNS};

/// Write a table to disk as CSV, header first, columns in schema order.
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;
    writer.write_record(COLUMNS)?;
    for row in table.rows() {
        writer.write_record(row.iter())?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Row;

    fn sample_row() -> Row {
        [
            "The Parent Trap".to_string(),
            "1961".to_string(),
            "Comedy|Family".to_string(),
            "7.1".to_string(),
            "22310".to_string(),
            "The Parent Trap".to_string(),
            "1998".to_string(),
            "Adventure|Comedy|Drama".to_string(),
            "6.6".to_string(),
            "110259".to_string(),
        ]
    }

    #[test]
    fn csv_roundtrip_preserves_cells() {
        let dir = std::env::temp_dir().join(format!("remake_scraper_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.csv");

        let table = Table::from_rows(vec![sample_row()]);
        write_csv(&table, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), COLUMNS.len());
        for (i, name) in COLUMNS.iter().enumerate() {
            assert_eq!(&headers[i], *name);
        }

        let records: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][2], "Comedy|Family");
        assert_eq!(&records[0][6], "1998");

        std::fs::remove_dir_all(&dir).ok();
    }
}
