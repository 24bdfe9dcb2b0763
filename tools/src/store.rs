//! SQLite store for scored output.
//!
//! RULE: only store.rs talks to the database. The core never persists.

use anyhow::Result;
use merchant_risk_core::{alerting::AlertLabel, pipeline::OutputTable};
use rusqlite::{params, Connection};

pub struct OutputStore {
    conn: Connection,
}

impl OutputStore {
    /// Open (or create) the output database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_risk_output.sql"))?;
        Ok(())
    }

    pub fn insert_run(&self, run_id: &str, version: &str, policy: &str, config_json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, version, policy, config_json, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, version, policy, config_json, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Write every output row of one run in a single transaction.
    pub fn insert_rows(&self, run_id: &str, table: &OutputTable) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO risk_output
                 (run_id, merchant_id, year_month, sales_risk, customer_risk, market_risk,
                  risk_score, p_model, p_final, alert)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for row in &table.rows {
                stmt.execute(params![
                    run_id,
                    row.merchant_id,
                    row.year_month.to_string(),
                    row.sales_risk,
                    row.customer_risk,
                    row.market_risk,
                    row.risk_score,
                    row.p_model,
                    row.p_final,
                    row.alert.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("store: wrote {} rows for run {run_id}", table.len());
        Ok(table.len())
    }

    pub fn row_count(&self, run_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM risk_output WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?)
    }

    pub fn alert_count(&self, run_id: &str, label: AlertLabel) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM risk_output WHERE run_id = ?1 AND alert = ?2",
            params![run_id, label.as_str()],
            |row| row.get(0),
        )?)
    }
}
