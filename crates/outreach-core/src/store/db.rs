//! Connection handling and schema for the job store.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};

/// Percent-encode a path for a sqlite:// URI so spaces and special chars survive.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Default database location: `~/.local/state/outreach/jobs.db`.
pub fn default_db_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("outreach")?;
    Ok(xdg_dirs.get_state_home().join("jobs.db"))
}

/// Handle to the SQLite job store. Cheap to clone.
#[derive(Clone)]
pub struct JobStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl JobStore {
    /// Open (or create) the store under the XDG state directory.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(default_db_path()?).await
    }

    /// Open (or create) the store at `path`, creating parent dirs as needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let store = JobStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store with no disk I/O; lives as long as the handle.
    pub async fn open_memory() -> Result<Self> {
        // One connection: every pooled connection would get its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = JobStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // `stats_json` holds the counter block; everything else is a column so
        // listings can be read without decoding.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                total_phones INTEGER NOT NULL,
                processed INTEGER NOT NULL DEFAULT 0,
                current_index INTEGER NOT NULL DEFAULT 0,
                current_phone TEXT,
                stats_json TEXT NOT NULL,
                retry_delay_ms INTEGER NOT NULL,
                paused_until INTEGER,
                pause_reason TEXT,
                warning TEXT,
                error TEXT,
                download_url TEXT,
                input_path TEXT NOT NULL,
                output_path TEXT NOT NULL,
                timeout_ms INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_escapes_special_chars() {
        let uri = path_to_sqlite_uri(Path::new("/tmp/my jobs#1.db"));
        assert_eq!(uri, "sqlite:///tmp/my%20jobs%231.db");
    }
}
