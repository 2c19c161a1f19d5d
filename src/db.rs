use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::dataset::{COLUMNS, MISSING, Row};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    let row_columns: String = COLUMNS
        .iter()
        .map(|c| format!("{} TEXT NOT NULL", c))
        .collect::<Vec<_>>()
        .join(",\n            ");
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS link_pairs (
            id             INTEGER PRIMARY KEY,
            position       INTEGER NOT NULL,
            original_title TEXT NOT NULL,
            original_ref   TEXT NOT NULL,
            remake_title   TEXT NOT NULL,
            remake_ref     TEXT NOT NULL,
            discovered_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_link_pairs_position ON link_pairs(position);

        CREATE TABLE IF NOT EXISTS id_pairs (
            pair_id     INTEGER PRIMARY KEY REFERENCES link_pairs(id),
            original_id TEXT NOT NULL,
            remake_id   TEXT NOT NULL,
            resolved_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS movie_rows (
            pair_id    INTEGER PRIMARY KEY REFERENCES id_pairs(pair_id),
            {},
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
        row_columns
    ))?;
    Ok(())
}

// ── Discovery ──

/// One (original, remake) pair as parsed off an index page. Sides that were
/// structurally absent carry the missing marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPair {
    pub original_title: String,
    pub original_ref: String,
    pub remake_title: String,
    pub remake_ref: String,
}

/// The columns the resolve stage needs; titles stay behind in the store.
#[derive(Debug, Clone)]
pub struct LinkPairRow {
    pub id: i64,
    pub original_ref: String,
    pub remake_ref: String,
}

/// Store a fresh discovery run. Downstream stage tables are cleared too:
/// their rows are keyed by pair id and would no longer line up.
pub fn replace_link_pairs(conn: &Connection, pairs: &[LinkPair]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch("DELETE FROM movie_rows; DELETE FROM id_pairs; DELETE FROM link_pairs;")?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO link_pairs (position, original_title, original_ref, remake_title, remake_ref)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, p) in pairs.iter().enumerate() {
            count += stmt.execute(rusqlite::params![
                position as i64,
                p.original_title,
                p.original_ref,
                p.remake_title,
                p.remake_ref,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_link_pairs(conn: &Connection, limit: Option<usize>) -> Result<Vec<LinkPairRow>> {
    let sql = format!(
        "SELECT id, original_ref, remake_ref FROM link_pairs ORDER BY position{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LinkPairRow {
                id: row.get(0)?,
                original_ref: row.get(1)?,
                remake_ref: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Resolution ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPairRow {
    pub pair_id: i64,
    pub original_id: String,
    pub remake_id: String,
}

pub fn replace_id_pairs(conn: &Connection, rows: &[IdPairRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch("DELETE FROM movie_rows; DELETE FROM id_pairs;")?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO id_pairs (pair_id, original_id, remake_id) VALUES (?1, ?2, ?3)",
        )?;
        for r in rows {
            stmt.execute(rusqlite::params![r.pair_id, r.original_id, r.remake_id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn fetch_id_pairs(conn: &Connection, limit: Option<usize>) -> Result<Vec<IdPairRow>> {
    let sql = format!(
        "SELECT pair_id, original_id, remake_id FROM id_pairs ORDER BY pair_id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(IdPairRow {
                pair_id: row.get(0)?,
                original_id: row.get(1)?,
                remake_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Assembled rows ──

pub fn replace_movie_rows(conn: &Connection, rows: &[(i64, Row)]) -> Result<()> {
    let placeholders = (1..=COLUMNS.len() + 1)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO movie_rows (pair_id, {}) VALUES ({})",
        COLUMNS.join(", "),
        placeholders
    );

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch("DELETE FROM movie_rows;")?;
    {
        let mut stmt = tx.prepare(&sql)?;
        for (pair_id, row) in rows {
            stmt.execute(rusqlite::params![
                pair_id, row[0], row[1], row[2], row[3], row[4], row[5], row[6], row[7], row[8],
                row[9],
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Raw rows in discovery order, missing markers included.
pub fn fetch_movie_rows(conn: &Connection) -> Result<Vec<Row>> {
    let sql = format!(
        "SELECT {} FROM movie_rows ORDER BY pair_id",
        COLUMNS.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let mut cells: Row = std::array::from_fn(|_| String::new());
            for i in 0..COLUMNS.len() {
                cells[i] = row.get(i)?;
            }
            Ok(cells)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub pairs: usize,
    pub absent_refs: usize,
    pub id_pairs: usize,
    pub sentinel_ids: usize,
    pub rows: usize,
    pub complete_rows: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let complete = COLUMNS
        .iter()
        .map(|c| format!("{} != '{}'", c, MISSING))
        .collect::<Vec<_>>()
        .join(" AND ");

    let pairs: usize = conn.query_row("SELECT COUNT(*) FROM link_pairs", [], |r| r.get(0))?;
    let absent_refs: usize = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM link_pairs WHERE original_ref = '{0}' OR remake_ref = '{0}'",
            MISSING
        ),
        [],
        |r| r.get(0),
    )?;
    let id_pairs: usize = conn.query_row("SELECT COUNT(*) FROM id_pairs", [], |r| r.get(0))?;
    let sentinel_ids: usize = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM id_pairs WHERE original_id = '{0}' OR remake_id = '{0}'",
            MISSING
        ),
        [],
        |r| r.get(0),
    )?;
    let rows: usize = conn.query_row("SELECT COUNT(*) FROM movie_rows", [], |r| r.get(0))?;
    let complete_rows: usize = conn.query_row(
        &format!("SELECT COUNT(*) FROM movie_rows WHERE {}", complete),
        [],
        |r| r.get(0),
    )?;

    Ok(Stats {
        pairs,
        absent_refs,
        id_pairs,
        sentinel_ids,
        rows,
        complete_rows,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::missing_row;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn complete_row() -> Row {
        std::array::from_fn(|i| format!("v{}", i))
    }

    fn sample_pairs() -> Vec<LinkPair> {
        vec![
            LinkPair {
                original_title: "The Parent Trap (1961 film)".into(),
                original_ref: "https://en.wikipedia.org/wiki/The_Parent_Trap_(1961_film)".into(),
                remake_title: "The Parent Trap (1998 film)".into(),
                remake_ref: "https://en.wikipedia.org/wiki/The_Parent_Trap_(1998_film)".into(),
            },
            LinkPair {
                original_title: "Solaris (1972 film)".into(),
                original_ref: "https://en.wikipedia.org/wiki/Solaris_(1972_film)".into(),
                remake_title: MISSING.into(),
                remake_ref: MISSING.into(),
            },
        ]
    }

    #[test]
    fn stage_tables_roundtrip() {
        let conn = test_conn();
        assert_eq!(replace_link_pairs(&conn, &sample_pairs()).unwrap(), 2);

        let stored = fetch_link_pairs(&conn, None).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].remake_ref, MISSING);

        let ids = vec![
            IdPairRow {
                pair_id: stored[0].id,
                original_id: "0055277".into(),
                remake_id: "0120338".into(),
            },
            IdPairRow {
                pair_id: stored[1].id,
                original_id: "0069293".into(),
                remake_id: MISSING.into(),
            },
        ];
        replace_id_pairs(&conn, &ids).unwrap();
        assert_eq!(fetch_id_pairs(&conn, None).unwrap(), ids);

        let rows = vec![(stored[0].id, complete_row()), (stored[1].id, missing_row())];
        replace_movie_rows(&conn, &rows).unwrap();
        let fetched = fetch_movie_rows(&conn).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0][0], "v0");
        assert_eq!(fetched[1][9], MISSING);

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.pairs, 2);
        assert_eq!(stats.absent_refs, 1);
        assert_eq!(stats.id_pairs, 2);
        assert_eq!(stats.sentinel_ids, 1);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.complete_rows, 1);
    }

    #[test]
    fn limit_caps_fetched_pairs() {
        let conn = test_conn();
        replace_link_pairs(&conn, &sample_pairs()).unwrap();
        assert_eq!(fetch_link_pairs(&conn, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn rediscovery_clears_downstream_stages() {
        let conn = test_conn();
        replace_link_pairs(&conn, &sample_pairs()).unwrap();
        let stored = fetch_link_pairs(&conn, None).unwrap();
        replace_id_pairs(
            &conn,
            &[IdPairRow {
                pair_id: stored[0].id,
                original_id: "0055277".into(),
                remake_id: "0120338".into(),
            }],
        )
        .unwrap();
        replace_movie_rows(&conn, &[(stored[0].id, complete_row())]).unwrap();

        replace_link_pairs(&conn, &sample_pairs()).unwrap();
        assert!(fetch_id_pairs(&conn, None).unwrap().is_empty());
        assert!(fetch_movie_rows(&conn).unwrap().is_empty());
    }
}
