//! SQLite run store.
//!
//! One connection behind a mutex; item batches and the `completed` flip are
//! written in the same transaction.

use std::path::Path;
use std::sync::Arc;

use arb_engine::store::RunStore;
use chrono::{DateTime, SecondsFormat, Utc};
use common::{ArbitrageCandidate, Error, RunRecord, RunStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS arbitrage_runs (
    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    completed_at TEXT,
    num_candidates INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_runs_status_completed
    ON arbitrage_runs(status, completed_at DESC);

CREATE TABLE IF NOT EXISTS arbitrage_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES arbitrage_runs(run_id),
    item_id INTEGER NOT NULL,
    from_hub_id INTEGER NOT NULL,
    to_hub_id INTEGER NOT NULL,
    buy_price REAL NOT NULL,
    sell_price REAL NOT NULL,
    spread_pct REAL NOT NULL,
    fees_total REAL NOT NULL,
    liquidity_24h REAL NOT NULL,
    ev_isk REAL NOT NULL,
    net_margin_pct REAL NOT NULL,
    decay_score REAL NOT NULL,
    capital_required REAL NOT NULL,
    route_risk REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_run_ev
    ON arbitrage_items(run_id, ev_isk DESC);
"#;

const INSERT_ITEM_SQL: &str = "INSERT INTO arbitrage_items (
        run_id, item_id, from_hub_id, to_hub_id, buy_price, sell_price, spread_pct,
        fees_total, liquidity_24h, ev_isk, net_margin_pct, decay_score,
        capital_required, route_risk
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

const SELECT_RUN_SQL: &str =
    "SELECT run_id, status, created_at, completed_at, num_candidates FROM arbitrage_runs";

fn db_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

pub struct SqliteRunStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRunStore {
    pub fn open(path: &Path) -> Result<Self, Error> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        let store = Self::init(conn)?;
        info!("Run store opened at {}", path.display());
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch(SCHEMA_SQL).map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_by_id(conn: &Connection, run_id: i64) -> Result<RunRecord, Error> {
        let raw = conn
            .query_row(
                &format!("{} WHERE run_id = ?1", SELECT_RUN_SQL),
                params![run_id],
                RawRun::from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| Error::Storage(format!("run {} not found", run_id)))?;
        raw.into_record()
    }
}

/// Run row before status/timestamp parsing.
struct RawRun {
    run_id: i64,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    num_candidates: i64,
}

impl RawRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            status: row.get(1)?,
            created_at: row.get(2)?,
            completed_at: row.get(3)?,
            num_candidates: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<RunRecord, Error> {
        let status = RunStatus::parse(&self.status).ok_or_else(|| {
            Error::Storage(format!("run {}: unknown status {:?}", self.run_id, self.status))
        })?;
        Ok(RunRecord {
            run_id: self.run_id,
            status,
            created_at: parse_ts(&self.created_at)?,
            completed_at: self.completed_at.as_deref().map(parse_ts).transpose()?,
            num_candidates: self.num_candidates,
        })
    }
}

// Fixed width so TEXT ordering matches time ordering.
fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("bad timestamp {:?}: {}", raw, e)))
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ArbitrageCandidate> {
    Ok(ArbitrageCandidate {
        item_id: row.get(0)?,
        from_hub_id: row.get(1)?,
        to_hub_id: row.get(2)?,
        buy_price: row.get(3)?,
        sell_price: row.get(4)?,
        spread_pct: row.get(5)?,
        fees_total: row.get(6)?,
        liquidity_24h: row.get(7)?,
        ev_isk: row.get(8)?,
        net_margin_pct: row.get(9)?,
        decay_score: row.get(10)?,
        capital_required: row.get(11)?,
        route_risk: row.get(12)?,
    })
}

fn insert_batch(
    tx: &rusqlite::Transaction<'_>,
    run_id: i64,
    items: &[ArbitrageCandidate],
) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare_cached(INSERT_ITEM_SQL)?;
    for c in items {
        stmt.execute(params![
            run_id,
            c.item_id,
            c.from_hub_id,
            c.to_hub_id,
            c.buy_price,
            c.sell_price,
            c.spread_pct,
            c.fees_total,
            c.liquidity_24h,
            c.ev_isk,
            c.net_margin_pct,
            c.decay_score,
            c.capital_required,
            c.route_risk,
        ])?;
    }
    Ok(items.len())
}

fn mark_completed(
    conn: &Connection,
    run_id: i64,
    num_candidates: usize,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE arbitrage_runs SET status = ?1, completed_at = ?2, num_candidates = ?3
         WHERE run_id = ?4",
        params![
            RunStatus::Completed.as_str(),
            now_ts(),
            num_candidates as i64,
            run_id
        ],
    )
}

impl RunStore for SqliteRunStore {
    fn create_run(&self) -> Result<RunRecord, Error> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO arbitrage_runs (status, created_at, num_candidates) VALUES (?1, ?2, 0)",
            params![RunStatus::Running.as_str(), now_ts()],
        )
        .map_err(db_err)?;
        Self::run_by_id(&conn, conn.last_insert_rowid())
    }

    fn insert_items(&self, run_id: i64, items: &[ArbitrageCandidate]) -> Result<usize, Error> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let n = insert_batch(&tx, run_id, items).map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(n)
    }

    fn complete_run(&self, run_id: i64, num_candidates: usize) -> Result<RunRecord, Error> {
        let conn = self.conn.lock();
        let updated = mark_completed(&conn, run_id, num_candidates).map_err(db_err)?;
        if updated == 0 {
            return Err(Error::Storage(format!("run {} not found", run_id)));
        }
        Self::run_by_id(&conn, run_id)
    }

    fn fail_run(&self, run_id: i64) -> Result<(), Error> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE arbitrage_runs SET status = ?1, completed_at = ?2 WHERE run_id = ?3",
            params![RunStatus::Failed.as_str(), now_ts(), run_id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn delete_run_items(&self, run_id: i64) -> Result<usize, Error> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM arbitrage_items WHERE run_id = ?1",
            params![run_id],
        )
        .map_err(db_err)
    }

    fn latest_completed_run(&self) -> Result<Option<RunRecord>, Error> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!(
                    "{} WHERE status = ?1 ORDER BY completed_at DESC, run_id DESC LIMIT 1",
                    SELECT_RUN_SQL
                ),
                params![RunStatus::Completed.as_str()],
                RawRun::from_row,
            )
            .optional()
            .map_err(db_err)?;
        raw.map(RawRun::into_record).transpose()
    }

    fn items_for_run(
        &self,
        run_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<ArbitrageCandidate>, Error> {
        let conn = self.conn.lock();
        // SQLite treats a negative LIMIT as no limit.
        let limit = limit.map_or(-1, |n| n.min(i64::MAX as usize) as i64);
        let mut stmt = conn
            .prepare_cached(
                "SELECT item_id, from_hub_id, to_hub_id, buy_price, sell_price, spread_pct,
                        fees_total, liquidity_24h, ev_isk, net_margin_pct, decay_score,
                        capital_required, route_risk
                 FROM arbitrage_items
                 WHERE run_id = ?1
                 ORDER BY ev_isk DESC, id ASC
                 LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![run_id, limit], item_from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Items and the `completed` flip commit together or not at all.
    fn persist_run(&self, candidates: &[ArbitrageCandidate]) -> Result<RunRecord, Error> {
        let run = self.create_run()?;

        let written = {
            let mut conn = self.conn.lock();
            conn.transaction().and_then(|tx| {
                insert_batch(&tx, run.run_id, candidates)?;
                mark_completed(&tx, run.run_id, candidates.len())?;
                tx.commit()
            })
        };

        match written {
            Ok(()) => {
                let conn = self.conn.lock();
                Self::run_by_id(&conn, run.run_id)
            }
            Err(e) => {
                if let Err(mark) = self.fail_run(run.run_id) {
                    warn!("run {}: could not mark failed: {}", run.run_id, mark);
                }
                Err(db_err(e))
            }
        }
    }
}

/// A store whose database is unreachable: every write fails, reads find nothing.
#[cfg(test)]
pub struct UnavailableStore;

#[cfg(test)]
impl RunStore for UnavailableStore {
    fn create_run(&self) -> Result<RunRecord, Error> {
        Err(Error::Storage("db down".into()))
    }

    fn insert_items(&self, _run_id: i64, _items: &[ArbitrageCandidate]) -> Result<usize, Error> {
        Err(Error::Storage("db down".into()))
    }

    fn complete_run(&self, _run_id: i64, _num_candidates: usize) -> Result<RunRecord, Error> {
        Err(Error::Storage("db down".into()))
    }

    fn fail_run(&self, _run_id: i64) -> Result<(), Error> {
        Err(Error::Storage("db down".into()))
    }

    fn delete_run_items(&self, _run_id: i64) -> Result<usize, Error> {
        Ok(0)
    }

    fn latest_completed_run(&self) -> Result<Option<RunRecord>, Error> {
        Ok(None)
    }

    fn items_for_run(
        &self,
        _run_id: i64,
        _limit: Option<usize>,
    ) -> Result<Vec<ArbitrageCandidate>, Error> {
        Ok(Vec::new())
    }
}
