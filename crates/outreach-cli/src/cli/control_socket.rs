//! Control socket: server (during `outreach run`/`continue`) and client (for
//! `outreach pause` and friends).
//!
//! Protocol: one request line per command, one JSON reply line per request.
//! Requests: `status [<id>]`, `pause <id>`, `resume <id>`, `cancel <id>`,
//! `set-retry-delay <id> <ms>`. Replies: `{"success", "message", "job", "jobs"}`.

use anyhow::{Context, Result};
use outreach_core::control::ControlSurface;
use outreach_core::job::{Job, JobId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Status(Option<JobId>),
    Pause(JobId),
    Resume(JobId),
    Cancel(JobId),
    SetRetryDelay(JobId, u64),
}

impl ControlRequest {
    /// Parse one request line.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or("empty request")?;
        let id = |w: Option<&str>| -> Result<JobId, String> {
            let w = w.ok_or_else(|| format!("{verb}: missing job id"))?;
            w.parse().map_err(|_| format!("{verb}: invalid job id {w:?}"))
        };
        let req = match verb {
            "status" => match words.next() {
                Some(w) => ControlRequest::Status(Some(id(Some(w))?)),
                None => ControlRequest::Status(None),
            },
            "pause" => ControlRequest::Pause(id(words.next())?),
            "resume" => ControlRequest::Resume(id(words.next())?),
            "cancel" => ControlRequest::Cancel(id(words.next())?),
            "set-retry-delay" => {
                let job = id(words.next())?;
                let ms = words
                    .next()
                    .and_then(|w| w.parse::<u64>().ok())
                    .ok_or("set-retry-delay: expected a delay in milliseconds")?;
                ControlRequest::SetRetryDelay(job, ms)
            }
            other => return Err(format!("unknown command {other:?}")),
        };
        if words.next().is_some() {
            return Err(format!("{verb}: unexpected trailing arguments"));
        }
        Ok(req)
    }

    pub fn to_line(self) -> String {
        match self {
            ControlRequest::Status(None) => "status".to_string(),
            ControlRequest::Status(Some(id)) => format!("status {id}"),
            ControlRequest::Pause(id) => format!("pause {id}"),
            ControlRequest::Resume(id) => format!("resume {id}"),
            ControlRequest::Cancel(id) => format!("cancel {id}"),
            ControlRequest::SetRetryDelay(id, ms) => format!("set-retry-delay {id} {ms}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReply {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub job: Option<Job>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<Job>,
}

impl ControlReply {
    fn ok(message: impl Into<String>, job: Job) -> Self {
        Self {
            success: true,
            message: message.into(),
            job: Some(job),
            jobs: Vec::new(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            job: None,
            jobs: Vec::new(),
        }
    }
}

/// Apply one request to the surface.
pub fn handle_request(surface: &ControlSurface, req: ControlRequest) -> ControlReply {
    let result = match req {
        ControlRequest::Status(None) => {
            let jobs = surface.list();
            return ControlReply {
                success: true,
                message: format!("{} job(s)", jobs.len()),
                job: None,
                jobs,
            };
        }
        ControlRequest::Status(Some(id)) => surface.get_status(id).map(|j| ("Job status", j)),
        ControlRequest::Pause(id) => surface.pause(id).map(|j| ("Pause requested", j)),
        ControlRequest::Resume(id) => surface.resume(id).map(|j| ("Resume requested", j)),
        ControlRequest::Cancel(id) => surface.cancel(id).map(|j| ("Cancel requested", j)),
        ControlRequest::SetRetryDelay(id, ms) => surface
            .set_retry_delay(id, ms)
            .map(|j| ("Retry delay updated", j)),
    };
    match result {
        Ok((message, job)) => {
            let message = format!("{message}; job is {}", job.status);
            ControlReply::ok(message, job)
        }
        Err(e) => ControlReply::failed(e.to_string()),
    }
}

/// Spawns a task that listens on `path` and answers each request line with a
/// JSON reply line. Malformed lines get a failure reply.
pub fn spawn_control_listener(
    surface: Arc<ControlSurface>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create control socket dir {}", parent.display()))?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let surface = Arc::clone(&surface);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&surface, stream).await {
                            tracing::debug!("control connection: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(surface: &ControlSurface, stream: UnixStream) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = match ControlRequest::parse(line) {
            Ok(req) => {
                tracing::debug!(request = %line, "control request");
                handle_request(surface, req)
            }
            Err(msg) => ControlReply::failed(msg),
        };
        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        write.write_all(&out).await?;
    }
    Ok(())
}

/// Sends one request and reads the reply. Ok(None) when no run is listening.
pub async fn send_request(socket_path: &Path, req: ControlRequest) -> Result<Option<ControlReply>> {
    if !socket_path.exists() {
        return Ok(None);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        // Stale socket left by a run that exited.
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(None),
        Err(e) => return Err(e).context("connect to control socket"),
    };
    let (read, mut write) = stream.into_split();
    let msg = format!("{}\n", req.to_line());
    write.write_all(msg.as_bytes()).await?;
    let line = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("control socket closed without reply")?;
    let reply = serde_json::from_str(&line).context("parse control reply")?;
    Ok(Some(reply))
}

/// Fails when a live run answers on `socket_path`. Starting a second run
/// would mark its job interrupted and take over its socket.
pub async fn ensure_no_active_run(socket_path: &Path) -> Result<()> {
    match send_request(socket_path, ControlRequest::Status(None)).await {
        Ok(None) => Ok(()),
        Ok(Some(reply)) => {
            let ids: Vec<String> = reply.jobs.iter().map(|j| j.id.to_string()).collect();
            anyhow::bail!(
                "another run is active (job {}); pause or cancel it, or wait for it to finish",
                if ids.is_empty() { "unknown".to_string() } else { ids.join(", ") }
            )
        }
        Err(e) => {
            tracing::debug!(path = %socket_path.display(), "control socket probe: {:#}", e);
            Ok(())
        }
    }
}
