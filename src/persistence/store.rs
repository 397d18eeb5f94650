//! SQLite-based run history store

use crate::core::{EventKind, RunStatus};
use crate::persistence::{PersistenceBackend, RunSummary};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, pipeline_name, event, branch, commit_sha, status, failed_step, \
     report, steps_succeeded, steps_failed, steps_skipped, started_at, finished_at FROM runs";

/// SQLite run store
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Create a new SQLite store
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);
        // Every connection to ":memory:" opens its own database
        let max_connections = if db_path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("buildgate");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        let db_path = db_dir.join("runs.db");
        Self::new(&db_path.to_string_lossy()).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                pipeline_name TEXT NOT NULL,
                event TEXT NOT NULL,
                branch TEXT NOT NULL,
                commit_sha TEXT,
                status TEXT NOT NULL,
                failed_step TEXT,
                report TEXT,
                steps_succeeded INTEGER NOT NULL DEFAULT 0,
                steps_failed INTEGER NOT NULL DEFAULT 0,
                steps_skipped INTEGER NOT NULL DEFAULT 0,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_runs_pipeline_name ON runs(pipeline_name);
            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn from_row(row: &SqliteRow) -> Result<RunSummary> {
        Ok(RunSummary {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            pipeline_name: row.get("pipeline_name"),
            event: row
                .get::<String, _>("event")
                .parse::<EventKind>()
                .map_err(|e| anyhow!(e))?,
            branch: row.get("branch"),
            commit: row.get("commit_sha"),
            status: row
                .get::<String, _>("status")
                .parse::<RunStatus>()
                .map_err(|e| anyhow!(e))?,
            failed_step: row.get("failed_step"),
            report: row.get("report"),
            steps_succeeded: row.get::<i64, _>("steps_succeeded") as usize,
            steps_failed: row.get::<i64, _>("steps_failed") as usize,
            steps_skipped: row.get::<i64, _>("steps_skipped") as usize,
            started_at: Self::from_naive(row.get("started_at")),
            finished_at: row
                .get::<Option<NaiveDateTime>, _>("finished_at")
                .map(Self::from_naive),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteRunStore {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (id, pipeline_name, event, branch, commit_sha, status, failed_step, report,
             steps_succeeded, steps_failed, steps_skipped, started_at, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(&run.pipeline_name)
        .bind(run.event.to_string())
        .bind(&run.branch)
        .bind(&run.commit)
        .bind(run.status.to_string())
        .bind(&run.failed_step)
        .bind(&run.report)
        .bind(run.steps_succeeded as i64)
        .bind(run.steps_failed as i64)
        .bind(run.steps_skipped as i64)
        .bind(Self::to_naive(run.started_at))
        .bind(run.finished_at.map(Self::to_naive))
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load run")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(&format!(
            "{} WHERE pipeline_name = ?1 ORDER BY started_at DESC",
            SELECT_COLUMNS
        ))
        .bind(pipeline_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT pipeline_name
            FROM runs
            ORDER BY pipeline_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pipelines")?;

        Ok(rows.iter().map(|row| row.get("pipeline_name")).collect())
    }
}
