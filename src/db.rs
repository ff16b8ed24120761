use std::path::Path;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::table::QaRecord;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id            INTEGER PRIMARY KEY,
            url           TEXT NOT NULL,
            mode          TEXT NOT NULL CHECK(mode IN ('static','dynamic')),
            status        TEXT NOT NULL DEFAULT 'running',
            record_count  INTEGER NOT NULL DEFAULT 0,
            skipped_count INTEGER NOT NULL DEFAULT 0,
            uploaded      BOOLEAN NOT NULL DEFAULT 0,
            error         TEXT,
            started_at    TEXT NOT NULL DEFAULT (datetime('now')),
            finished_at   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_runs_url ON runs(url);

        CREATE TABLE IF NOT EXISTS qa_records (
            id        INTEGER PRIMARY KEY,
            run_id    INTEGER NOT NULL REFERENCES runs(id),
            position  INTEGER NOT NULL,
            question  TEXT NOT NULL,
            answer    TEXT NOT NULL,
            UNIQUE(run_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_records_run ON qa_records(run_id);

        -- Next question index to scrape per URL (dynamic mode)
        CREATE TABLE IF NOT EXISTS checkpoints (
            url         TEXT PRIMARY KEY,
            next_index  INTEGER NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Runs ──

pub fn start_run(conn: &Connection, url: &str, mode: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO runs (url, mode) VALUES (?1, ?2)",
        rusqlite::params![url, mode],
    )?;
    Ok(conn.last_insert_rowid())
}

pub struct RunSummary {
    pub record_count: usize,
    pub skipped_count: usize,
    pub uploaded: bool,
    pub error: Option<String>,
}

pub fn finish_run(conn: &Connection, run_id: i64, summary: &RunSummary) -> Result<()> {
    let status = if summary.error.is_some() { "failed" } else { "done" };
    conn.execute(
        "UPDATE runs
         SET status = ?2, record_count = ?3, skipped_count = ?4, uploaded = ?5, error = ?6,
             finished_at = datetime('now')
         WHERE id = ?1",
        rusqlite::params![
            run_id,
            status,
            summary.record_count as i64,
            summary.skipped_count as i64,
            summary.uploaded,
            summary.error,
        ],
    )?;
    Ok(())
}

pub struct RunRow {
    pub id: i64,
    pub url: String,
    pub mode: String,
    pub status: String,
    pub record_count: i64,
    pub skipped_count: i64,
    pub uploaded: bool,
    pub started_at: String,
}

pub fn fetch_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, url, mode, status, record_count, skipped_count, uploaded, started_at
         FROM runs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(RunRow {
                id: row.get(0)?,
                url: row.get(1)?,
                mode: row.get(2)?,
                status: row.get(3)?,
                record_count: row.get(4)?,
                skipped_count: row.get(5)?,
                uploaded: row.get(6)?,
                started_at: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Records ──

pub fn save_record(
    conn: &Connection,
    run_id: i64,
    position: usize,
    record: &QaRecord,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO qa_records (run_id, position, question, answer)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![run_id, position as i64, record.question, record.answer],
    )?;
    Ok(())
}

pub fn save_records(conn: &Connection, run_id: i64, records: &[QaRecord]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO qa_records (run_id, position, question, answer)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (i, r) in records.iter().enumerate() {
            stmt.execute(rusqlite::params![run_id, i as i64, r.question, r.answer])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn fetch_records(conn: &Connection, run_id: i64) -> Result<Vec<QaRecord>> {
    let mut stmt = conn.prepare(
        "SELECT question, answer FROM qa_records WHERE run_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map([run_id], |row| {
            Ok(QaRecord::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Copy the records below `before` from the latest earlier dynamic run of
/// `url` into `run_id`, keeping their positions. Returns them in page order.
pub fn carry_over_records(
    conn: &Connection,
    url: &str,
    run_id: i64,
    before: usize,
) -> Result<Vec<QaRecord>> {
    let previous: Option<i64> = conn
        .query_row(
            "SELECT id FROM runs WHERE url = ?1 AND mode = 'dynamic' AND id < ?2
             ORDER BY id DESC LIMIT 1",
            rusqlite::params![url, run_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(previous) = previous else {
        return Ok(Vec::new());
    };

    let tx = conn.unchecked_transaction()?;
    let rows = {
        let mut stmt = tx.prepare(
            "SELECT position, question, answer FROM qa_records
             WHERE run_id = ?1 AND position < ?2 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![previous, before as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    QaRecord::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut insert = tx.prepare(
            "INSERT OR REPLACE INTO qa_records (run_id, position, question, answer)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (position, r) in &rows {
            insert.execute(rusqlite::params![run_id, position, r.question, r.answer])?;
        }
        rows
    };
    tx.commit()?;
    Ok(rows.into_iter().map(|(_, r)| r).collect())
}

// ── Checkpoints ──

pub fn save_checkpoint(conn: &Connection, url: &str, next_index: usize) -> Result<()> {
    conn.execute(
        "INSERT INTO checkpoints (url, next_index) VALUES (?1, ?2)
         ON CONFLICT(url) DO UPDATE
         SET next_index = excluded.next_index, updated_at = datetime('now')",
        rusqlite::params![url, next_index as i64],
    )?;
    Ok(())
}

pub fn load_checkpoint(conn: &Connection, url: &str) -> Result<Option<usize>> {
    let index: Option<i64> = conn
        .query_row(
            "SELECT next_index FROM checkpoints WHERE url = ?1",
            [url],
            |row| row.get(0),
        )
        .optional()?;
    Ok(index.map(|i| i as usize))
}

pub fn clear_checkpoint(conn: &Connection, url: &str) -> Result<()> {
    conn.execute("DELETE FROM checkpoints WHERE url = ?1", [url])?;
    Ok(())
}
