//! Artifact persistence for the newsroom pipeline.
//!
//! Every stage output is saved as JSON under `(slug, kind)` and loaded back by
//! standalone stage invocations. [`Storage`] is the durable libSQL store used
//! by the CLI; [`MemoryStore`] backs tests and dry runs.
//!
//! Saves overwrite. There is no locking: one pipeline run is expected to own a
//! slug at a time.

mod memory;
mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use newsroom_shared::{ArtifactKind, NewsroomError, Result, RunId};

pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Persist stage outputs by article slug and kind tag.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Save (or overwrite) the JSON value for `slug`/`kind`.
    async fn save(&self, slug: &str, kind: ArtifactKind, json: &str) -> Result<()>;

    /// Load the JSON value for `kind`/`slug`, or [`NewsroomError::NotFound`].
    async fn load(&self, kind: ArtifactKind, slug: &str) -> Result<String>;

    /// Kinds saved so far for a slug.
    async fn kinds(&self, slug: &str) -> Result<Vec<ArtifactKind>>;

    /// Insert or update a run history row.
    async fn record_run(&self, run: &RunRecord) -> Result<()>;

    /// Most recent runs first.
    async fn list_runs(&self, limit: u32) -> Result<Vec<RunRecord>>;
}

/// Serialize and save a typed value.
pub async fn save_value<T: Serialize + Sync>(
    store: &dyn ArtifactStore,
    slug: &str,
    kind: ArtifactKind,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| NewsroomError::Storage(format!("serialize {kind}: {e}")))?;
    store.save(slug, kind, &json).await
}

/// Load and deserialize a typed value.
pub async fn load_value<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    kind: ArtifactKind,
    slug: &str,
) -> Result<T> {
    let json = store.load(kind, slug).await?;
    serde_json::from_str(&json)
        .map_err(|e| NewsroomError::Storage(format!("stored {kind} for '{slug}' is corrupt: {e}")))
}

/// One pipeline run, as shown by `newsroom list`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: RunId,
    pub idea: String,
    pub slug: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// "running", "approved", "rejected" or "failed".
    pub outcome: String,
    pub attempts: u32,
    pub notes: Vec<String>,
}

impl RunRecord {
    pub fn start(idea: &str) -> Self {
        Self {
            id: RunId::new(),
            idea: idea.to_string(),
            slug: None,
            started_at: Utc::now(),
            finished_at: None,
            outcome: "running".into(),
            attempts: 0,
            notes: Vec::new(),
        }
    }

    pub fn finish(&mut self, outcome: &str, attempts: u32, notes: Vec<String>) {
        self.finished_at = Some(Utc::now());
        self.outcome = outcome.to_string();
        self.attempts = attempts;
        self.notes = notes;
    }
}

// ---------------------------------------------------------------------------
// libSQL store
// ---------------------------------------------------------------------------

fn storage_err(e: impl std::fmt::Display) -> NewsroomError {
    NewsroomError::Storage(e.to_string())
}

/// Durable storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| NewsroomError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database for `show` / `list` without migrating or writing.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NewsroomError::Storage(format!(
                "database {} does not exist yet (run `newsroom run` first)",
                path.display()
            )));
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    NewsroomError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(NewsroomError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for Storage {
    async fn save(&self, slug: &str, kind: ArtifactKind, json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO artifacts (slug, kind, body_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(slug, kind) DO UPDATE SET
                   body_json = excluded.body_json,
                   updated_at = excluded.updated_at",
                params![slug, kind.as_str(), json, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        tracing::debug!(slug, kind = %kind, bytes = json.len(), "artifact saved");
        Ok(())
    }

    async fn load(&self, kind: ArtifactKind, slug: &str) -> Result<String> {
        let mut rows = self
            .conn
            .query(
                "SELECT body_json FROM artifacts WHERE slug = ?1 AND kind = ?2",
                params![slug, kind.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => row.get::<String>(0).map_err(storage_err),
            Ok(None) => Err(kind.not_found(slug)),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn kinds(&self, slug: &str) -> Result<Vec<ArtifactKind>> {
        let mut rows = self
            .conn
            .query(
                "SELECT kind FROM artifacts WHERE slug = ?1",
                params![slug],
            )
            .await
            .map_err(storage_err)?;

        let mut found = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let tag: String = row.get(0).map_err(storage_err)?;
            match tag.parse::<ArtifactKind>() {
                Ok(kind) => found.push(kind),
                Err(_) => tracing::warn!(slug, tag = %tag, "ignoring unknown artifact kind"),
            }
        }
        // Pipeline order rather than row order.
        found.sort_by_key(|k| ArtifactKind::ALL.iter().position(|a| a == k));
        Ok(found)
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        self.check_writable()?;
        let notes = serde_json::to_string(&run.notes).map_err(storage_err)?;
        let finished = run.finished_at.map(|t| t.to_rfc3339());
        self.conn
            .execute(
                "INSERT INTO runs (id, idea, slug, started_at, finished_at, outcome, attempts, notes_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   slug = excluded.slug,
                   finished_at = excluded.finished_at,
                   outcome = excluded.outcome,
                   attempts = excluded.attempts,
                   notes_json = excluded.notes_json",
                params![
                    run.id.to_string(),
                    run.idea.as_str(),
                    run.slug.as_deref(),
                    run.started_at.to_rfc3339(),
                    finished.as_deref(),
                    run.outcome.as_str(),
                    i64::from(run.attempts),
                    notes.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn list_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, idea, slug, started_at, finished_at, outcome, attempts, notes_json
                 FROM runs ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_run(&row)?);
        }
        Ok(results)
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NewsroomError::Storage(format!("invalid date: {e}")))
}

/// Convert a `runs` row to a [`RunRecord`].
fn row_to_run(row: &libsql::Row) -> Result<RunRecord> {
    let id: String = row.get(0).map_err(storage_err)?;
    let id = id
        .parse()
        .map(RunId)
        .map_err(|e| NewsroomError::Storage(format!("invalid run id: {e}")))?;
    let started: String = row.get(3).map_err(storage_err)?;
    let finished = row
        .get::<String>(4)
        .ok()
        .map(|s| parse_time(&s))
        .transpose()?;
    let notes: String = row.get(7).map_err(storage_err)?;

    Ok(RunRecord {
        id,
        idea: row.get(1).map_err(storage_err)?,
        slug: row.get::<String>(2).ok(),
        started_at: parse_time(&started)?,
        finished_at: finished,
        outcome: row.get(5).map_err(storage_err)?,
        attempts: row.get::<i64>(6).map_err(storage_err)? as u32,
        notes: serde_json::from_str(&notes).map_err(storage_err)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsroom_shared::{ApprovalDecision, EvidenceCollection};
    use uuid::Uuid;

    fn temp_db_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("newsroom_test_{}.db", Uuid::now_v7()))
    }

    async fn test_storage() -> Storage {
        Storage::open(&temp_db_path()).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = temp_db_path();
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn save_then_load_overwrites() {
        let storage = test_storage().await;
        storage
            .save("vents", ArtifactKind::Draft, r#"{"v":1}"#)
            .await
            .expect("save");
        storage
            .save("vents", ArtifactKind::Draft, r#"{"v":2}"#)
            .await
            .expect("overwrite");

        let json = storage.load(ArtifactKind::Draft, "vents").await.expect("load");
        assert_eq!(json, r#"{"v":2}"#);
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let storage = test_storage().await;
        let err = storage
            .load(ArtifactKind::Evidence, "nothing_here")
            .await
            .expect_err("missing");
        match err {
            NewsroomError::NotFound {
                kind, identifier, ..
            } => {
                assert_eq!(kind, "evidence");
                assert_eq!(identifier, "nothing_here");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn typed_helpers_roundtrip() {
        let storage = test_storage().await;
        let decision = ApprovalDecision {
            approved: false,
            notes: vec!["missing attribution in paragraph 2".into()],
        };
        save_value(&storage, "s", ArtifactKind::Approval, &decision)
            .await
            .expect("save");
        let back: ApprovalDecision = load_value(&storage, ArtifactKind::Approval, "s")
            .await
            .expect("load");
        assert_eq!(back, decision);
    }

    #[tokio::test]
    async fn corrupt_value_is_a_storage_error() {
        let storage = test_storage().await;
        storage
            .save("s", ArtifactKind::Evidence, "not json")
            .await
            .expect("save");
        let err = load_value::<EvidenceCollection>(&storage, ArtifactKind::Evidence, "s")
            .await
            .expect_err("corrupt");
        assert!(matches!(err, NewsroomError::Storage(_)));
    }

    #[tokio::test]
    async fn kinds_in_pipeline_order() {
        let storage = test_storage().await;
        storage.save("s", ArtifactKind::Approval, "{}").await.unwrap();
        storage.save("s", ArtifactKind::Assignment, "{}").await.unwrap();
        storage.save("other", ArtifactKind::Draft, "{}").await.unwrap();

        let kinds = storage.kinds("s").await.expect("kinds");
        assert_eq!(kinds, vec![ArtifactKind::Assignment, ArtifactKind::Approval]);
    }

    #[tokio::test]
    async fn run_history_upserts() {
        let storage = test_storage().await;
        let mut run = RunRecord::start("deep sea vents");
        storage.record_run(&run).await.expect("insert");

        run.slug = Some("deep_sea_vents".into());
        run.finish("rejected", 3, vec!["cite the 2019 survey".into()]);
        storage.record_run(&run).await.expect("update");

        let runs = storage.list_runs(10).await.expect("list");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome, "rejected");
        assert_eq!(runs[0].attempts, 3);
        assert_eq!(runs[0].slug.as_deref(), Some("deep_sea_vents"));
        assert_eq!(runs[0].notes, vec!["cite the 2019 survey".to_string()]);
        assert!(runs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn readonly_refuses_writes() {
        let tmp = temp_db_path();
        drop(Storage::open(&tmp).await.expect("create"));
        let ro = Storage::open_readonly(&tmp).await.expect("open ro");
        assert!(ro.save("s", ArtifactKind::Draft, "{}").await.is_err());
    }
}
