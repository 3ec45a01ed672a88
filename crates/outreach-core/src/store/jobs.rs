//! Job snapshot reads and writes.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::PathBuf;

use super::db::JobStore;
use crate::job::{Job, JobId, JobStats, JobStatus, PauseReason};

/// Run parameters stored next to the job so it can be continued later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredJob {
    pub job: Job,
    pub run: RunInfo,
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, status, total_phones, processed, current_index, current_phone,
        stats_json, retry_delay_ms, paused_until, pause_reason, warning, error,
        download_url, input_path, output_path, timeout_ms, created_at, updated_at
    FROM jobs
"#;

fn pause_reason_str(reason: PauseReason) -> &'static str {
    match reason {
        PauseReason::RateLimit => "rate_limit",
    }
}

fn parse_pause_reason(s: &str) -> Option<PauseReason> {
    match s {
        "rate_limit" => Some(PauseReason::RateLimit),
        _ => None,
    }
}

fn decode_row(row: &SqliteRow) -> Result<StoredJob> {
    let id: String = row.get("id");
    let id: JobId = id.parse().with_context(|| format!("bad job id {id:?} in store"))?;
    let status: String = row.get("status");
    let stats_json: String = row.get("stats_json");
    let stats: JobStats = serde_json::from_str(&stats_json)
        .with_context(|| format!("bad stats for job {id}"))?;
    let pause_reason: Option<String> = row.get("pause_reason");
    let input_path: String = row.get("input_path");
    let output_path: String = row.get("output_path");

    let job = Job {
        id,
        status: JobStatus::parse(&status),
        total_phones: row.get::<i64, _>("total_phones") as u64,
        processed: row.get::<i64, _>("processed") as u64,
        current_index: row.get::<i64, _>("current_index") as u64,
        current_phone: row.get("current_phone"),
        stats,
        retry_delay_ms: row.get::<i64, _>("retry_delay_ms") as u64,
        paused_until: row.get("paused_until"),
        pause_reason: pause_reason.as_deref().and_then(parse_pause_reason),
        warning: row.get("warning"),
        error: row.get("error"),
        download_url: row.get("download_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    };
    Ok(StoredJob {
        job,
        run: RunInfo {
            input_path: PathBuf::from(input_path),
            output_path: PathBuf::from(output_path),
            timeout_ms: row.get::<i64, _>("timeout_ms") as u64,
        },
    })
}

impl JobStore {
    /// Insert or replace the snapshot of `job`.
    pub async fn save_job(&self, job: &Job, run: &RunInfo) -> Result<()> {
        let stats_json = serde_json::to_string(&job.stats)?;
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, status, total_phones, processed, current_index, current_phone,
                stats_json, retry_delay_ms, paused_until, pause_reason, warning, error,
                download_url, input_path, output_path, timeout_ms, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                total_phones = excluded.total_phones,
                processed = excluded.processed,
                current_index = excluded.current_index,
                current_phone = excluded.current_phone,
                stats_json = excluded.stats_json,
                retry_delay_ms = excluded.retry_delay_ms,
                paused_until = excluded.paused_until,
                pause_reason = excluded.pause_reason,
                warning = excluded.warning,
                error = excluded.error,
                download_url = excluded.download_url,
                input_path = excluded.input_path,
                output_path = excluded.output_path,
                timeout_ms = excluded.timeout_ms,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.status.as_str())
        .bind(job.total_phones as i64)
        .bind(job.processed as i64)
        .bind(job.current_index as i64)
        .bind(&job.current_phone)
        .bind(stats_json)
        .bind(job.retry_delay_ms as i64)
        .bind(job.paused_until)
        .bind(job.pause_reason.map(pause_reason_str))
        .bind(&job.warning)
        .bind(&job.error)
        .bind(&job.download_url)
        .bind(run.input_path.to_string_lossy().into_owned())
        .bind(run.output_path.to_string_lossy().into_owned())
        .bind(run.timeout_ms as i64)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<StoredJob>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    /// All stored jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<StoredJob>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    /// Jobs left `running` or `pending` by a process that exited mid-run are
    /// marked `paused` with a warning so the operator can continue them.
    /// Returns how many were recovered.
    pub async fn recover_interrupted_jobs(&self) -> Result<u64> {
        let now = crate::unix_millis();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'paused',
                current_phone = NULL,
                paused_until = NULL,
                pause_reason = NULL,
                warning = 'Interrupted by shutdown; continue the job to resume.',
                updated_at = ?1
            WHERE status IN ('running', 'pending')
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        let n = result.rows_affected();
        if n > 0 {
            tracing::info!(jobs = n, "recovered interrupted jobs as paused");
        }
        Ok(n)
    }

    pub async fn remove_job(&self, id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
