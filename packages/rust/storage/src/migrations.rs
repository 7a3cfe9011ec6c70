//! SQL migration definitions for the Newsroom database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: artifacts keyed by slug and kind",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One current value per (slug, kind); saves overwrite
CREATE TABLE IF NOT EXISTS artifacts (
    slug       TEXT NOT NULL,
    kind       TEXT NOT NULL,
    body_json  TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (slug, kind)
);

CREATE INDEX IF NOT EXISTS idx_artifacts_slug ON artifacts(slug);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Pipeline run history",
            sql: r#"
CREATE TABLE IF NOT EXISTS runs (
    id          TEXT PRIMARY KEY,
    idea        TEXT NOT NULL,
    slug        TEXT,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    outcome     TEXT NOT NULL,
    attempts    INTEGER NOT NULL DEFAULT 0,
    notes_json  TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_runs_slug ON runs(slug);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_ascend_and_record_themselves() {
        let all = all_migrations();
        for (i, m) in all.iter().enumerate() {
            assert_eq!(m.version as usize, i + 1);
            assert!(
                m.sql
                    .contains(&format!("INSERT INTO schema_migrations (version) VALUES ({})", m.version))
            );
        }
    }
}
