//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Full-text indexes are kept in
//! step with their content tables by AFTER INSERT triggers, so an observation
//! or summary is searchable in the same statement that stores it.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{
    Database, NewObservation, Observation, ObservationKind, Session, SessionHistoryEntry,
    SessionStatus, SharedFact, Summary,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    in_memory: bool,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            in_memory: false,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            in_memory: true,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp format. Fixed width so text ordering is time ordering.
fn now_str() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Turn free text into a safe FTS5 query. Every word is quoted so user input
/// is never parsed as query syntax; words are OR-ed and bm25 rank decides.
/// Returns `None` when nothing searchable is left.
fn fts_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

const SESSION_COLUMNS: &str = "id, job, plan, status, created_at, finished_at";

const OBSERVATION_COLUMNS: &str =
    "id, session_id, worker_id, kind, content, tool_name, tool_input, tool_output, created_at";

const SUMMARY_COLUMNS: &str = "id, worker_id, session_id, summary, volume_saved, created_at";

/// Column order matches SESSION_COLUMNS.
fn row_to_session(row: &libsql::Row) -> Result<Session, libsql::Error> {
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let finished_str: Option<String> = row.get(5).ok();

    Ok(Session {
        id: row.get(0)?,
        job: row.get(1)?,
        plan: row.get(2).ok(),
        status: SessionStatus::parse(&status_str).unwrap_or(SessionStatus::Pending),
        created_at: parse_datetime(&created_str),
        finished_at: parse_optional_datetime(&finished_str),
    })
}

/// Column order matches OBSERVATION_COLUMNS.
fn row_to_observation(row: &libsql::Row) -> Result<Observation, libsql::Error> {
    let kind_str: String = row.get(3)?;
    let created_str: String = row.get(8)?;

    Ok(Observation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        worker_id: row.get(2)?,
        kind: ObservationKind::parse(&kind_str).unwrap_or(ObservationKind::Decision),
        content: row.get(4)?,
        tool_name: row.get(5).ok(),
        tool_input: row.get(6).ok(),
        tool_output: row.get(7).ok(),
        created_at: parse_datetime(&created_str),
    })
}

/// Column order matches SUMMARY_COLUMNS.
fn row_to_summary(row: &libsql::Row) -> Result<Summary, libsql::Error> {
    let created_str: String = row.get(5)?;

    Ok(Summary {
        id: row.get(0)?,
        worker_id: row.get(1)?,
        session_id: row.get(2)?,
        summary: row.get(3)?,
        volume_saved: row.get(4)?,
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_fact(row: &libsql::Row) -> Result<SharedFact, libsql::Error> {
    let updated_str: String = row.get(3)?;

    Ok(SharedFact {
        key: row.get(0)?,
        value: row.get(1)?,
        source_worker: row.get(2)?,
        updated_at: parse_datetime(&updated_str),
    })
}

/// Drain a row stream through `map`, skipping rows that fail to decode.
async fn collect_rows<T>(
    mut rows: libsql::Rows,
    what: &str,
    map: fn(&libsql::Row) -> Result<T, libsql::Error>,
) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(Some(row)) = rows.next().await {
        match map(&row) {
            Ok(item) => out.push(item),
            Err(e) => tracing::warn!("Skipping {what} row: {e}"),
        }
    }
    out
}

/// Foreign-key failures mean the session does not exist.
fn insert_observation_error(obs: &NewObservation, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("FOREIGN KEY") {
        DatabaseError::Constraint(format!(
            "observation references unknown session {}",
            obs.session_id
        ))
    } else {
        DatabaseError::Query(format!("insert_observation: {msg}"))
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;

        if !self.in_memory {
            // journal_mode returns a row, so it has to go through query().
            conn.query("PRAGMA journal_mode = WAL", ())
                .await
                .map_err(|e| DatabaseError::Pool(format!("Failed to enable WAL: {e}")))?;
        }

        migrations::run_migrations(conn).await
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn create_session(&self, job: &str) -> Result<Session, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let created = now_str();

        self.conn()
            .execute(
                "INSERT INTO sessions (id, job, status, created_at) VALUES (?1, ?2, 'pending', ?3)",
                params![id.clone(), job, created.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_session: {e}")))?;

        debug!(session_id = %id, "Session created");
        Ok(Session {
            id,
            job: job.to_string(),
            plan: None,
            status: SessionStatus::Pending,
            created_at: parse_datetime(&created),
            finished_at: None,
        })
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_session(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Serialization(format!("get_session: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn set_session_plan(&self, id: &str, plan: &str) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE sessions SET plan = ?2 WHERE id = ?1",
                params![id, plan],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_session_plan: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "session".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<(), DatabaseError> {
        let allowed = SessionStatus::predecessors(status);
        if allowed.is_empty() {
            return Err(DatabaseError::Constraint(format!(
                "session {id} cannot move to {status}"
            )));
        }

        let placeholders: Vec<String> = (0..allowed.len()).map(|i| format!("?{}", i + 4)).collect();
        let sql = format!(
            "UPDATE sessions SET status = ?2, finished_at = COALESCE(?3, finished_at) \
             WHERE id = ?1 AND status IN ({})",
            placeholders.join(", ")
        );

        let finished = status.is_terminal().then(now_str);
        let mut values = vec![
            libsql::Value::Text(id.to_string()),
            libsql::Value::Text(status.as_str().to_string()),
            opt_text(finished.as_deref()),
        ];
        values.extend(
            allowed
                .iter()
                .map(|s| libsql::Value::Text(s.as_str().to_string())),
        );

        let affected = self
            .conn()
            .execute(&sql, values)
            .await
            .map_err(|e| DatabaseError::Query(format!("update_session_status: {e}")))?;

        if affected == 0 {
            return match self.get_session(id).await? {
                Some(current) => Err(DatabaseError::Constraint(format!(
                    "session {id} is {}, cannot move to {status}",
                    current.status
                ))),
                None => Err(DatabaseError::NotFound {
                    entity: "session".to_string(),
                    id: id.to_string(),
                }),
            };
        }

        debug!(session_id = %id, status = %status, "Session status updated");
        Ok(())
    }

    async fn session_history(
        &self,
        limit: usize,
    ) -> Result<Vec<SessionHistoryEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT s.id, s.job, s.plan, s.status, s.created_at, s.finished_at, COUNT(o.id)
                 FROM sessions s
                 LEFT JOIN observations o ON o.session_id = s.id
                 GROUP BY s.id
                 ORDER BY s.created_at DESC, s.rowid DESC
                 LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("session_history: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let session = match row_to_session(&row) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Skipping session row: {e}");
                    continue;
                }
            };
            entries.push(SessionHistoryEntry {
                session,
                observation_count: row.get(6).unwrap_or(0),
            });
        }
        Ok(entries)
    }

    // ── Observations ────────────────────────────────────────────────

    async fn insert_observation(&self, obs: &NewObservation) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO observations
                    (session_id, worker_id, kind, content, tool_name, tool_input, tool_output, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 RETURNING id",
                params![
                    obs.session_id.as_str(),
                    obs.worker_id.as_str(),
                    obs.kind.as_str(),
                    obs.content.as_str(),
                    opt_text(obs.tool_name.as_deref()),
                    opt_text(obs.tool_input.as_deref()),
                    opt_text(obs.tool_output.as_deref()),
                    now_str(),
                ],
            )
            .await
            .map_err(|e| insert_observation_error(obs, e))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Serialization(format!("insert_observation: {e}"))),
            Ok(None) => Err(DatabaseError::Query(
                "insert_observation: no id returned".to_string(),
            )),
            Err(e) => Err(insert_observation_error(obs, e)),
        }
    }

    async fn recent_observations(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<Observation>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {OBSERVATION_COLUMNS} FROM observations WHERE worker_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT ?2"
                ),
                params![worker_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_observations: {e}")))?;

        Ok(collect_rows(rows, "observation", row_to_observation).await)
    }

    async fn session_observations(
        &self,
        session_id: &str,
    ) -> Result<Vec<Observation>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {OBSERVATION_COLUMNS} FROM observations WHERE session_id = ?1 ORDER BY id ASC"
                ),
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("session_observations: {e}")))?;

        Ok(collect_rows(rows, "observation", row_to_observation).await)
    }

    async fn search_observations(
        &self,
        worker_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Observation>, DatabaseError> {
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let rows = self
            .conn()
            .query(
                "SELECT o.id, o.session_id, o.worker_id, o.kind, o.content,
                        o.tool_name, o.tool_input, o.tool_output, o.created_at
                 FROM observations_fts
                 JOIN observations o ON o.id = observations_fts.rowid
                 WHERE observations_fts MATCH ?1 AND observations_fts.worker_id = ?2
                 ORDER BY observations_fts.rank
                 LIMIT ?3",
                params![fts, worker_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("search_observations: {e}")))?;

        Ok(collect_rows(rows, "observation", row_to_observation).await)
    }

    // ── Summaries ───────────────────────────────────────────────────

    async fn insert_summary(
        &self,
        worker_id: &str,
        session_id: &str,
        summary: &str,
        volume_saved: i64,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "INSERT INTO summaries (worker_id, session_id, summary, volume_saved, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (worker_id, session_id) DO NOTHING",
                params![worker_id, session_id, summary, volume_saved, now_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_summary: {e}")))?;

        if affected == 0 {
            debug!(worker_id, session_id, "Summary already exists, keeping original");
        }
        Ok(affected > 0)
    }

    async fn recent_summaries(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<Summary>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SUMMARY_COLUMNS} FROM summaries WHERE worker_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT ?2"
                ),
                params![worker_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_summaries: {e}")))?;

        Ok(collect_rows(rows, "summary", row_to_summary).await)
    }

    async fn search_summaries(
        &self,
        worker_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Summary>, DatabaseError> {
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let rows = self
            .conn()
            .query(
                "SELECT s.id, s.worker_id, s.session_id, s.summary, s.volume_saved, s.created_at
                 FROM summaries_fts
                 JOIN summaries s ON s.id = summaries_fts.rowid
                 WHERE summaries_fts MATCH ?1 AND summaries_fts.worker_id = ?2
                 ORDER BY summaries_fts.rank
                 LIMIT ?3",
                params![fts, worker_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("search_summaries: {e}")))?;

        Ok(collect_rows(rows, "summary", row_to_summary).await)
    }

    // ── Shared facts ────────────────────────────────────────────────

    async fn set_shared_fact(
        &self,
        key: &str,
        value: &str,
        source_worker: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO shared_facts (key, value, source_worker, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (key) DO UPDATE SET
                    value = excluded.value,
                    source_worker = excluded.source_worker,
                    updated_at = excluded.updated_at",
                params![key, value, source_worker, now_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_shared_fact: {e}")))?;
        Ok(())
    }

    async fn get_shared_fact(&self, key: &str) -> Result<Option<SharedFact>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value, source_worker, updated_at FROM shared_facts WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_shared_fact: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_fact(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Serialization(format!("get_shared_fact: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_shared_fact: {e}"))),
        }
    }

    async fn list_shared_facts(&self) -> Result<Vec<SharedFact>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                "SELECT key, value, source_worker, updated_at FROM shared_facts ORDER BY key ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_shared_facts: {e}")))?;

        Ok(collect_rows(rows, "shared fact", row_to_fact).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    // ── Session tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn create_and_get_session() {
        let db = test_db().await;
        let session = db.create_session("summarize the news").await.unwrap();

        let fetched = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.job, "summarize the news");
        assert_eq!(fetched.status, SessionStatus::Pending);
        assert!(fetched.plan.is_none());
        assert!(fetched.finished_at.is_none());
    }

    #[tokio::test]
    async fn get_session_not_found() {
        let db = test_db().await;
        assert!(db.get_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_status_moves_forward() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();

        db.set_session_plan(&session.id, "{\"summary\":\"x\"}").await.unwrap();
        db.update_session_status(&session.id, SessionStatus::Running)
            .await
            .unwrap();
        db.update_session_status(&session.id, SessionStatus::Done)
            .await
            .unwrap();

        let fetched = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Done);
        assert_eq!(fetched.plan.as_deref(), Some("{\"summary\":\"x\"}"));
        assert!(fetched.finished_at.is_some());
    }

    #[tokio::test]
    async fn session_status_rejects_backward_move() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();
        db.update_session_status(&session.id, SessionStatus::Running)
            .await
            .unwrap();
        db.update_session_status(&session.id, SessionStatus::Done)
            .await
            .unwrap();

        let err = db
            .update_session_status(&session.id, SessionStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));

        let err = db
            .update_session_status(&session.id, SessionStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));

        let fetched = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Done);
    }

    #[tokio::test]
    async fn session_status_unknown_id() {
        let db = test_db().await;
        let err = db
            .update_session_status("nope", SessionStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn session_history_counts_observations() {
        let db = test_db().await;
        let first = db.create_session("first").await.unwrap();
        let second = db.create_session("second").await.unwrap();

        for text in ["a", "b", "c"] {
            db.insert_observation(&NewObservation::new(
                &first.id,
                "writer",
                ObservationKind::Decision,
                text,
            ))
            .await
            .unwrap();
        }

        let history = db.session_history(50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].session.id, second.id);
        assert_eq!(history[0].observation_count, 0);
        assert_eq!(history[1].session.id, first.id);
        assert_eq!(history[1].observation_count, 3);
    }

    // ── Observation tests ───────────────────────────────────────────

    #[tokio::test]
    async fn observation_requires_existing_session() {
        let db = test_db().await;
        let err = db
            .insert_observation(&NewObservation::new(
                "no-such-session",
                "writer",
                ObservationKind::Decision,
                "orphan",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
    }

    #[tokio::test]
    async fn tool_call_observation_is_searchable_immediately() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();

        let obs = NewObservation::new(
            &session.id,
            "researcher",
            ObservationKind::ToolCall,
            "Used tool \"web_search\". Input: rust async",
        )
        .with_tool("web_search", "{\"query\":\"rust async\"}", "[]");
        let id = db.insert_observation(&obs).await.unwrap();

        let by_name = db
            .search_observations("researcher", "web_search", 5)
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, id);
        assert_eq!(by_name[0].kind, ObservationKind::ToolCall);
        assert_eq!(by_name[0].tool_name.as_deref(), Some("web_search"));
    }

    #[tokio::test]
    async fn search_is_scoped_to_worker() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();
        db.insert_observation(&NewObservation::new(
            &session.id,
            "writer",
            ObservationKind::Result,
            "poem about lighthouses",
        ))
        .await
        .unwrap();

        assert_eq!(
            db.search_observations("writer", "lighthouses", 5)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(
            db.search_observations("analyst", "lighthouses", 5)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn search_limits_results() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();
        for i in 0..8 {
            db.insert_observation(&NewObservation::new(
                &session.id,
                "developer",
                ObservationKind::Decision,
                format!("compiled crate number {i}"),
            ))
            .await
            .unwrap();
        }

        let hits = db.search_observations("developer", "crate", 5).await.unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn search_tolerates_query_syntax() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();
        db.insert_observation(&NewObservation::new(
            &session.id,
            "analyst",
            ObservationKind::Decision,
            "read sales.csv totals",
        ))
        .await
        .unwrap();

        let hits = db
            .search_observations("analyst", "sales.csv AND (\"", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(db.search_observations("analyst", "  ()  ", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_observations_newest_first() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();
        for text in ["one", "two", "three"] {
            db.insert_observation(&NewObservation::new(
                &session.id,
                "writer",
                ObservationKind::Decision,
                text,
            ))
            .await
            .unwrap();
        }

        let recent = db.recent_observations("writer", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "three");
        assert_eq!(recent[1].content, "two");

        let all = db.session_observations(&session.id).await.unwrap();
        assert_eq!(all[0].content, "one");
    }

    // ── Summary tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn one_summary_per_worker_session() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();

        assert!(db.insert_summary("writer", &session.id, "first", 10).await.unwrap());
        assert!(!db.insert_summary("writer", &session.id, "second", 20).await.unwrap());
        assert!(db.insert_summary("analyst", &session.id, "other", 0).await.unwrap());

        let summaries = db.recent_summaries("writer", 8).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].summary, "first");
        assert_eq!(summaries[0].volume_saved, 10);
    }

    #[tokio::test]
    async fn summaries_searchable_and_ordered() {
        let db = test_db().await;
        let s1 = db.create_session("one").await.unwrap();
        let s2 = db.create_session("two").await.unwrap();
        db.insert_summary("writer", &s1.id, "wrote a sonnet about tides", 0)
            .await
            .unwrap();
        db.insert_summary("writer", &s2.id, "drafted release notes", 0)
            .await
            .unwrap();

        let recent = db.recent_summaries("writer", 8).await.unwrap();
        assert_eq!(recent[0].session_id, s2.id);
        assert_eq!(recent[1].session_id, s1.id);

        let hits = db.search_summaries("writer", "sonnet", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, s1.id);
        assert!(db.search_summaries("analyst", "sonnet", 5).await.unwrap().is_empty());
    }

    // ── Shared fact tests ───────────────────────────────────────────

    #[tokio::test]
    async fn shared_fact_last_write_wins() {
        let db = test_db().await;
        db.set_shared_fact("deploy_target", "staging", "developer")
            .await
            .unwrap();
        db.set_shared_fact("deploy_target", "production", "assistant")
            .await
            .unwrap();

        let fact = db.get_shared_fact("deploy_target").await.unwrap().unwrap();
        assert_eq!(fact.value, "production");
        assert_eq!(fact.source_worker, "assistant");
        assert_eq!(db.list_shared_facts().await.unwrap().len(), 1);
        assert!(db.get_shared_fact("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn worker_memory_view_combines_sources() {
        let db = test_db().await;
        let session = db.create_session("job").await.unwrap();
        db.insert_observation(&NewObservation::new(
            &session.id,
            "writer",
            ObservationKind::Result,
            "done",
        ))
        .await
        .unwrap();
        db.insert_summary("writer", &session.id, "summary", 0).await.unwrap();
        db.set_shared_fact("k", "v", "analyst").await.unwrap();

        let view = db.worker_memory("writer").await.unwrap();
        assert_eq!(view.summaries.len(), 1);
        assert_eq!(view.observations.len(), 1);
        assert_eq!(view.shared_facts.len(), 1);
    }

    // ── On-disk ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("office.db");

        let id = {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            let session = db.create_session("persist me").await.unwrap();
            db.set_shared_fact("k", "v", "writer").await.unwrap();
            session.id
        };

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(db.get_session(&id).await.unwrap().unwrap().job, "persist me");
        assert_eq!(db.get_shared_fact("k").await.unwrap().unwrap().value, "v");
    }

    #[test]
    fn fts_query_quotes_terms() {
        assert_eq!(
            fts_query("web_search rust").as_deref(),
            Some("\"web_search\" OR \"rust\"")
        );
        assert_eq!(
            fts_query("a\"b c*").as_deref(),
            Some("\"a\" OR \"b\" OR \"c\"")
        );
        assert_eq!(fts_query("  -- "), None);
    }
}
