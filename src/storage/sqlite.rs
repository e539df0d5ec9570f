//! SQLite-backed store of scored windows. Rows are keyed by a digest of the
//! window bounds and actor, so re-running over the same input replaces rows
//! instead of duplicating them.

use super::FeatureSink;
use crate::error::SinkError;
use crate::pipeline::ScoredWindow;
use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS window_scores (
                row_id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                window_start INTEGER NOT NULL,
                window_end INTEGER NOT NULL,
                actor_ip TEXT,
                ensemble_anomaly INTEGER,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_window_scores_start ON window_scores(window_start);
            "#,
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hex SHA-256 of window start, window end and actor.
    pub fn row_id(row: &ScoredWindow) -> String {
        let fv = &row.features;
        let mut hasher = Sha256::new();
        hasher.update(fv.window_start.to_rfc3339_opts(SecondsFormat::Micros, true).as_bytes());
        hasher.update([0u8]);
        hasher.update(fv.window_end.to_rfc3339_opts(SecondsFormat::Micros, true).as_bytes());
        hasher.update([0u8]);
        hasher.update(fv.actor_ip.as_deref().unwrap_or("").as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn count(&self) -> Result<usize, SinkError> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM window_scores", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Stored row and the run that last wrote it.
    pub fn get(&self, row_id: &str) -> Result<Option<(String, ScoredWindow)>, SinkError> {
        let found: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT run_id, payload FROM window_scores WHERE row_id = ?1",
                params![row_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        match found {
            Some((run_id, payload)) => Ok(Some((run_id, serde_json::from_str(&payload)?))),
            None => Ok(None),
        }
    }

    /// Delete windows starting before `ts` (unix seconds).
    pub fn prune_before(&self, ts: i64) -> Result<usize, SinkError> {
        Ok(self
            .conn()
            .execute("DELETE FROM window_scores WHERE window_start < ?1", params![ts])?)
    }
}

impl FeatureSink for SqliteSink {
    fn insert(&self, run_id: &str, row: &ScoredWindow) -> Result<(), SinkError> {
        let payload = serde_json::to_string(row)?;
        let fv = &row.features;
        self.conn().execute(
            "INSERT OR REPLACE INTO window_scores \
             (row_id, run_id, window_start, window_end, actor_ip, ensemble_anomaly, payload) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Self::row_id(row),
                run_id,
                fv.window_start.timestamp(),
                fv.window_end.timestamp(),
                fv.actor_ip,
                row.ensemble.ensemble_anomaly,
                payload
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::EnsembleResult;
    use crate::features::FeatureVector;
    use chrono::{TimeZone, Utc};

    fn row(start_secs: i64, actor: Option<&str>) -> ScoredWindow {
        let start = Utc.timestamp_opt(start_secs, 0).unwrap();
        let end = Utc.timestamp_opt(start_secs + 60, 0).unwrap();
        ScoredWindow {
            features: FeatureVector {
                window_start: start,
                window_end: end,
                actor_ip: actor.map(str::to_string),
                event_count: 3,
                ..Default::default()
            },
            ensemble: EnsembleResult {
                window_start: start,
                window_end: end,
                actor_ip: actor.map(str::to_string),
                ensemble_anomaly: Some(0),
                voters: 0,
                verdicts: Vec::new(),
            },
        }
    }

    #[test]
    fn reinsert_replaces() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let r = row(1_700_000_000, None);
        sink.insert("a", &r).unwrap();
        sink.insert("b", &r).unwrap();
        assert_eq!(sink.count().unwrap(), 1);
        let (run, stored) = sink.get(&SqliteSink::row_id(&r)).unwrap().unwrap();
        assert_eq!(run, "b");
        assert_eq!(stored, r);
    }

    #[test]
    fn actor_distinguishes_rows() {
        let sink = SqliteSink::open_in_memory().unwrap();
        sink.insert("a", &row(0, Some("10.0.0.1"))).unwrap();
        sink.insert("a", &row(0, Some("10.0.0.2"))).unwrap();
        sink.insert("a", &row(0, None)).unwrap();
        assert_eq!(sink.count().unwrap(), 3);
    }

    #[test]
    fn prune_drops_old_windows() {
        let sink = SqliteSink::open_in_memory().unwrap();
        sink.insert("a", &row(0, None)).unwrap();
        sink.insert("a", &row(600, None)).unwrap();
        assert_eq!(sink.prune_before(300).unwrap(), 1);
        assert_eq!(sink.count().unwrap(), 1);
    }
}
