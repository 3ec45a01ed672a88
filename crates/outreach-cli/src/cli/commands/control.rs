//! `outreach pause|resume|cancel|set-retry-delay <id>` – control the active run.

use anyhow::{bail, Result};
use outreach_core::control;
use outreach_core::store::JobStore;

use crate::cli::control_socket::{self, ControlRequest};

pub async fn run_control(store: &JobStore, req: ControlRequest) -> Result<()> {
    let path = control::default_control_socket_path()?;
    if let Some(reply) = control_socket::send_request(&path, req).await? {
        println!("{}", serde_json::to_string_pretty(&reply)?);
        if !reply.success {
            bail!("{}", reply.message);
        }
        return Ok(());
    }

    let id = match req {
        ControlRequest::Pause(id)
        | ControlRequest::Resume(id)
        | ControlRequest::Cancel(id)
        | ControlRequest::SetRetryDelay(id, _)
        | ControlRequest::Status(Some(id)) => id,
        ControlRequest::Status(None) => bail!("no active run"),
    };
    match store.get_job(id).await? {
        Some(stored) => bail!(
            "no active run for job {id} (stored as {}); use `outreach continue {id}`",
            stored.job.status
        ),
        None => bail!("job {id} not found"),
    }
}
