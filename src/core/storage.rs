use crate::core::channel::Channel;
use crate::core::factcheck::{FactStatus, VerifiedFact};
use crate::core::youtube::VideoCandidate;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fs as std_fs;
use std::path::Path;
use std::str::FromStr;

const MEMORY_URL: &str = "sqlite::memory:";

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS processed_videos (
        video_id TEXT PRIMARY KEY NOT NULL,
        channel_id TEXT NOT NULL,
        title TEXT NOT NULL,
        view_count INTEGER NOT NULL,
        outcome TEXT NOT NULL,
        detail TEXT,
        processed_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS channels (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        subscribers INTEGER NOT NULL,
        refreshed_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS scripts (
        video_id TEXT PRIMARY KEY NOT NULL,
        topic TEXT NOT NULL,
        body TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS verified_facts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id TEXT NOT NULL,
        claim TEXT NOT NULL,
        category TEXT NOT NULL,
        status TEXT NOT NULL,
        source TEXT,
        claimed_value TEXT,
        verified_value TEXT,
        note TEXT,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_facts_video ON verified_facts(video_id)",
    "CREATE INDEX IF NOT EXISTS idx_processed_channel ON processed_videos(channel_id)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Outcome {
    #[display("completed")]
    Completed,
    #[display("skipped")]
    Skipped,
    #[display("failed")]
    Failed,
}

impl FromStr for Outcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "completed" => Ok(Outcome::Completed),
            "skipped" => Ok(Outcome::Skipped),
            "failed" => Ok(Outcome::Failed),
            other => Err(Error::custom(format!("unknown outcome {other:?}"))),
        }
    }
}

/// Review state of a generated script. New scripts start as drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ScriptStatus {
    #[display("draft")]
    Draft,
    #[display("approved")]
    Approved,
    #[display("rejected")]
    Rejected,
    #[display("produced")]
    Produced,
}

impl FromStr for ScriptStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ScriptStatus::Draft),
            "approved" => Ok(ScriptStatus::Approved),
            "rejected" => Ok(ScriptStatus::Rejected),
            "produced" => Ok(ScriptStatus::Produced),
            other => Err(Error::invalid(format!(
                "unknown script status {other:?} (draft, approved, rejected, produced)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredScript {
    pub video_id: String,
    pub topic: String,
    pub body: String,
    pub status: ScriptStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ScriptRow {
    video_id: String,
    topic: String,
    body: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ScriptRow> for StoredScript {
    type Error = Error;

    fn try_from(row: ScriptRow) -> Result<Self> {
        Ok(Self {
            video_id: row.video_id,
            topic: row.topic,
            body: row.body,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

/// A fact check as persisted for a video.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFact {
    pub claim: String,
    pub category: String,
    pub status: FactStatus,
    pub source: Option<String>,
    pub claimed_value: Option<String>,
    pub verified_value: Option<String>,
    pub note: Option<String>,
}

#[derive(sqlx::FromRow)]
struct FactRow {
    claim: String,
    category: String,
    status: String,
    source: Option<String>,
    claimed_value: Option<String>,
    verified_value: Option<String>,
    note: Option<String>,
}

impl TryFrom<FactRow> for StoredFact {
    type Error = Error;

    fn try_from(row: FactRow) -> Result<Self> {
        Ok(Self {
            claim: row.claim,
            category: row.category,
            status: row.status.parse()?,
            source: row.source,
            claimed_value: row.claimed_value,
            verified_value: row.verified_value,
            note: row.note,
        })
    }
}

/// Terminal record of one video's pass through the pipeline. Written once.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedVideoRecord {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub view_count: i64,
    pub outcome: Outcome,
    pub detail: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedVideoRecord {
    pub fn new(video: &VideoCandidate, outcome: Outcome, detail: Option<String>) -> Self {
        Self {
            video_id: video.video_id.clone(),
            channel_id: video.channel_id.clone(),
            title: video.title.clone(),
            view_count: video.view_count,
            outcome,
            detail,
            processed_at: Utc::now(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProcessedRow {
    video_id: String,
    channel_id: String,
    title: String,
    view_count: i64,
    outcome: String,
    detail: Option<String>,
    processed_at: DateTime<Utc>,
}

impl TryFrom<ProcessedRow> for ProcessedVideoRecord {
    type Error = Error;

    fn try_from(row: ProcessedRow) -> Result<Self> {
        Ok(Self {
            video_id: row.video_id,
            channel_id: row.channel_id,
            title: row.title,
            view_count: row.view_count,
            outcome: row.outcome.parse()?,
            detail: row.detail,
            processed_at: row.processed_at,
        })
    }
}

/// Persistence the pipeline depends on. The processed-video set is the single
/// source of truth for deduplication.
#[async_trait]
pub trait Store: Send + Sync {
    async fn is_processed(&self, video_id: &str) -> Result<bool>;

    /// Inserts the record unless the video is already present.
    /// Returns `false` when an earlier record exists; that record is left untouched.
    async fn record(&self, record: &ProcessedVideoRecord) -> Result<bool>;

    async fn cached_subscribers(&self, channel_id: &str) -> Result<Option<i64>>;

    async fn save_channel(&self, channel: &Channel) -> Result<()>;

    /// Stores a new script as a draft.
    async fn save_script(&self, video_id: &str, topic: &str, body: &str) -> Result<()>;

    async fn save_facts(&self, video_id: &str, facts: &[VerifiedFact]) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        if let Some(path) = database_file(database_url) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_directory(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // One connection serializes writes; it also keeps an in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect(MEMORY_URL).await
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Most recent records first.
    pub async fn list_records(&self, limit: i64) -> Result<Vec<ProcessedVideoRecord>> {
        let rows: Vec<ProcessedRow> = sqlx::query_as(
            r#"SELECT video_id, channel_id, title, view_count, outcome, detail, processed_at
               FROM processed_videos
               ORDER BY processed_at DESC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProcessedVideoRecord::try_from).collect()
    }

    pub async fn load_script(&self, video_id: &str) -> Result<Option<StoredScript>> {
        let row: Option<ScriptRow> = sqlx::query_as(
            "SELECT video_id, topic, body, status, created_at FROM scripts WHERE video_id = ?",
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(StoredScript::try_from).transpose()
    }

    /// Returns `false` when there is no script for the video.
    pub async fn set_script_status(&self, video_id: &str, status: ScriptStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE scripts SET status = ? WHERE video_id = ?")
            .bind(status.to_string())
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Facts in the order they were checked.
    pub async fn load_facts(&self, video_id: &str) -> Result<Vec<StoredFact>> {
        let rows: Vec<FactRow> = sqlx::query_as(
            r#"SELECT claim, category, status, source, claimed_value, verified_value, note
               FROM verified_facts
               WHERE video_id = ?
               ORDER BY id"#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredFact::try_from).collect()
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn is_processed(&self, video_id: &str) -> Result<bool> {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM processed_videos WHERE video_id = ?")
                .bind(video_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn record(&self, record: &ProcessedVideoRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"INSERT INTO processed_videos
                   (video_id, channel_id, title, view_count, outcome, detail, processed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(video_id) DO NOTHING"#,
        )
        .bind(&record.video_id)
        .bind(&record.channel_id)
        .bind(&record.title)
        .bind(record.view_count)
        .bind(record.outcome.to_string())
        .bind(&record.detail)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn cached_subscribers(&self, channel_id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT subscribers FROM channels WHERE id = ?")
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(subs,)| subs))
    }

    async fn save_channel(&self, channel: &Channel) -> Result<()> {
        let Some(subscribers) = channel.subscribers else {
            return Ok(());
        };
        sqlx::query(
            r#"INSERT INTO channels (id, name, subscribers, refreshed_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   subscribers = excluded.subscribers,
                   refreshed_at = excluded.refreshed_at"#,
        )
        .bind(&channel.id)
        .bind(&channel.name)
        .bind(subscribers)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_script(&self, video_id: &str, topic: &str, body: &str) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO scripts (video_id, topic, body, status, created_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(video_id) DO NOTHING"#,
        )
        .bind(video_id)
        .bind(topic)
        .bind(body)
        .bind(ScriptStatus::Draft.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_facts(&self, video_id: &str, facts: &[VerifiedFact]) -> Result<()> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;
        for fact in facts {
            sqlx::query(
                r#"INSERT INTO verified_facts
                       (video_id, claim, category, status, source,
                        claimed_value, verified_value, note, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(video_id)
            .bind(&fact.claim.text)
            .bind(fact.claim.category.to_string())
            .bind(fact.status.to_string())
            .bind(fact.source)
            .bind(&fact.claimed_value)
            .bind(&fact.verified_value)
            .bind(&fact.note)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// File path behind a `sqlite:` URL, if it names a file.
fn database_file(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(Path::new(path))
    }
}

/// Creates `path` owner-only. A directory that already exists is left as is.
fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    std_fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std_fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        if permissions.mode() & 0o777 != 0o700 {
            permissions.set_mode(0o700);
            std_fs::set_permissions(path, permissions)?;
        }
    }

    Ok(())
}
