//! Evidence Store
//!
//! Embedded store over the correlated-event tables using rusqlite with r2d2
//! connection pooling. Every query method checks a connection out of the pool
//! for exactly one call; the pooled connection is released when it drops, on
//! every exit path.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use triage_core::{CoreError, CoreResult};

/// Event tables holding granular technical failures, searched in order.
pub const TECHNICAL_EVENT_TABLES: [&str; 3] = ["checkout_failed", "api_error", "webhook_failed"];

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Store for evidence lookups against the correlated-event tables.
#[derive(Clone)]
pub struct EvidenceStore {
    pool: DbPool,
}

impl EvidenceStore {
    /// Create a store from an existing connection pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an in-memory store.
    ///
    /// Uses an in-memory SQLite database with the production schema. A single
    /// pooled connection keeps the in-memory database alive for the pool's
    /// lifetime. Used by integration tests and local runs without a data dir.
    pub fn new_in_memory() -> CoreResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| CoreError::internal(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Create a new store backed by a database file, with connection pooling.
    pub fn new(db_path: &std::path::Path) -> CoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| CoreError::internal(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Check a connection out of the pool for one call.
    fn checkout(&self) -> CoreResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| CoreError::internal(format!("Evidence store unreachable: {}", e)))
    }

    /// Initialize the evidence schema.
    fn init_schema(&self) -> CoreResult<()> {
        let conn = self.checkout()?;

        for table in TECHNICAL_EVENT_TABLES {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        event_id TEXT PRIMARY KEY,
                        merchant_id TEXT NOT NULL,
                        context TEXT NOT NULL,
                        technical_details TEXT NOT NULL,
                        timestamp TEXT DEFAULT CURRENT_TIMESTAMP
                    )",
                    table
                ),
                [],
            )
            .map_err(sql_err)?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS stage_update (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                merchant_id TEXT NOT NULL,
                technical_details TEXT NOT NULL,
                timestamp TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .map_err(sql_err)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ticket (
                event_id TEXT PRIMARY KEY,
                context TEXT NOT NULL,
                technical_details TEXT NOT NULL,
                timestamp TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .map_err(sql_err)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS api_docs (
                error_code TEXT PRIMARY KEY,
                cause TEXT NOT NULL,
                fix TEXT NOT NULL
            )",
            [],
        )
        .map_err(sql_err)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS resolution_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                error_code TEXT NOT NULL,
                incident TEXT NOT NULL,
                resolution TEXT NOT NULL,
                resolved_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .map_err(sql_err)?;

        Ok(())
    }

    /// Search the technical event tables for an event id.
    ///
    /// Returns a merged JSON view of the first hit (source table, context,
    /// technical details) or `None` when no table holds the event.
    pub fn find_technical_event(&self, event_id: &str) -> CoreResult<Option<String>> {
        let conn = self.checkout()?;

        for table in TECHNICAL_EVENT_TABLES {
            let row: Option<(String, String)> = conn
                .query_row(
                    &format!(
                        "SELECT context, technical_details FROM {} WHERE event_id = ?1",
                        table
                    ),
                    params![event_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map(Some)
                .or_else(ignore_no_rows)
                .map_err(sql_err)?;

            if let Some((context, technical_details)) = row {
                let merged = serde_json::json!({
                    "source_table": table,
                    "context": parse_or_text(&context),
                    "technical_details": parse_or_text(&technical_details),
                });
                return Ok(Some(serde_json::to_string_pretty(&merged)?));
            }
        }
        Ok(None)
    }

    /// Most recent migration stage update for a merchant.
    pub fn latest_stage_update(&self, merchant_id: &str) -> CoreResult<Option<String>> {
        let conn = self.checkout()?;

        conn.query_row(
            "SELECT technical_details FROM stage_update
             WHERE merchant_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT 1",
            params![merchant_id],
            |row| row.get::<_, String>(0),
        )
        .map(Some)
        .or_else(ignore_no_rows)
        .map_err(sql_err)
    }

    /// Documentation entries whose error code appears in the query.
    pub fn search_docs(&self, query: &str) -> CoreResult<Vec<String>> {
        let conn = self.checkout()?;

        let mut stmt = conn
            .prepare(
                "SELECT error_code, cause, fix FROM api_docs
                 WHERE instr(?1, error_code) > 0
                    OR lower(cause) LIKE '%' || lower(?1) || '%'
                 ORDER BY error_code",
            )
            .map_err(sql_err)?;

        let rows = stmt
            .query_map(params![query], |row| {
                let (code, cause, fix): (String, String, String) =
                    (row.get(0)?, row.get(1)?, row.get(2)?);
                Ok(format!("ERROR: {}\nCAUSE: {}\nFIX: {}", code, cause, fix))
            })
            .map_err(sql_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
    }

    /// Past resolutions matching an error code or free-text query.
    pub fn search_resolutions(&self, query: &str) -> CoreResult<Vec<String>> {
        let conn = self.checkout()?;

        let mut stmt = conn
            .prepare(
                "SELECT error_code, incident, resolution, resolved_at FROM resolution_history
                 WHERE instr(?1, error_code) > 0
                    OR lower(incident) LIKE '%' || lower(?1) || '%'
                 ORDER BY resolved_at DESC",
            )
            .map_err(sql_err)?;

        let rows = stmt
            .query_map(params![query], |row| {
                let (code, incident, resolution, resolved_at): (String, String, String, String) =
                    (row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?);
                Ok(format!(
                    "[{}] {} — {} (resolved {})",
                    code, incident, resolution, resolved_at
                ))
            })
            .map_err(sql_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
    }

    /// Ticket content for an event id.
    pub fn find_ticket(&self, event_id: &str) -> CoreResult<Option<String>> {
        let conn = self.checkout()?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT context, technical_details FROM ticket WHERE event_id = ?1",
                params![event_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(ignore_no_rows)
            .map_err(sql_err)?;

        match row {
            Some((context, technical_details)) => {
                let merged = serde_json::json!({
                    "source_table": "ticket",
                    "context": parse_or_text(&context),
                    "technical_details": parse_or_text(&technical_details),
                });
                Ok(Some(serde_json::to_string_pretty(&merged)?))
            }
            None => Ok(None),
        }
    }

    // ── Seed helpers (ops tooling and tests) ───────────────────────────

    /// Insert a technical event row into one of the event tables.
    pub fn insert_technical_event(
        &self,
        table: &str,
        event_id: &str,
        merchant_id: &str,
        context: &serde_json::Value,
        technical_details: &serde_json::Value,
    ) -> CoreResult<()> {
        if !TECHNICAL_EVENT_TABLES.contains(&table) {
            return Err(CoreError::validation(format!(
                "Unknown event table: {}",
                table
            )));
        }
        let conn = self.checkout()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (event_id, merchant_id, context, technical_details)
                 VALUES (?1, ?2, ?3, ?4)",
                table
            ),
            params![
                event_id,
                merchant_id,
                context.to_string(),
                technical_details.to_string()
            ],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    /// Insert a migration stage update for a merchant.
    pub fn insert_stage_update(
        &self,
        merchant_id: &str,
        technical_details: &serde_json::Value,
        timestamp: &str,
    ) -> CoreResult<()> {
        let conn = self.checkout()?;
        conn.execute(
            "INSERT INTO stage_update (merchant_id, technical_details, timestamp)
             VALUES (?1, ?2, ?3)",
            params![merchant_id, technical_details.to_string(), timestamp],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    /// Insert a documentation entry.
    pub fn insert_doc(&self, error_code: &str, cause: &str, fix: &str) -> CoreResult<()> {
        let conn = self.checkout()?;
        conn.execute(
            "INSERT OR REPLACE INTO api_docs (error_code, cause, fix) VALUES (?1, ?2, ?3)",
            params![error_code, cause, fix],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    /// Insert a past resolution.
    pub fn insert_resolution(
        &self,
        error_code: &str,
        incident: &str,
        resolution: &str,
        resolved_at: &str,
    ) -> CoreResult<()> {
        let conn = self.checkout()?;
        conn.execute(
            "INSERT INTO resolution_history (error_code, incident, resolution, resolved_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![error_code, incident, resolution, resolved_at],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    /// Insert a support ticket.
    pub fn insert_ticket(
        &self,
        event_id: &str,
        context: &serde_json::Value,
        technical_details: &serde_json::Value,
    ) -> CoreResult<()> {
        let conn = self.checkout()?;
        conn.execute(
            "INSERT OR REPLACE INTO ticket (event_id, context, technical_details)
             VALUES (?1, ?2, ?3)",
            params![
                event_id,
                context.to_string(),
                technical_details.to_string()
            ],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    /// Liveness probe used by the health endpoint.
    pub fn is_healthy(&self) -> bool {
        self.checkout()
            .and_then(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(sql_err)
            })
            .is_ok()
    }
}

/// JSON columns are stored as text; keep malformed rows readable as text.
fn parse_or_text(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn sql_err(e: rusqlite::Error) -> CoreError {
    CoreError::internal(format!("Evidence query failed: {}", e))
}

fn ignore_no_rows<T>(e: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}
