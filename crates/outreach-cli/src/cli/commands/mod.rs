//! CLI command handlers. Each command is in its own file.

mod continue_run;
mod control;
mod run;
mod status;

pub use continue_run::run_continue;
pub use control::run_control;
pub use run::{run_job, RunOptions};
pub use status::run_status;
