use std::sync::Arc;

use dcp_core::JobStatus;
use dcp_transport::{CoordinatorApi, HttpTransportClient};

use crate::cli::StatusArgs;

/// Prints a job's latest status, or blocks (per `--wait`) until it changes
/// (spec §4.4's `waitForStatusChange`/`waitForJobStatusChange`).
pub async fn run(args: StatusArgs) -> anyhow::Result<()> {
    let client: Arc<dyn CoordinatorApi> = Arc::new(HttpTransportClient::new(args.backend_url.clone()));

    let last_event_id: i64 = if args.wait { -1 } else { i64::MIN };
    let status = client
        .wait_for_job_status_change(args.job_id, last_event_id, if args.wait { args.timeout_ms } else { 0 })
        .await?;

    match status {
        Some(status) => print_status(&status),
        None => println!("no status yet for job {}", args.job_id),
    }
    Ok(())
}

fn print_status(status: &JobStatus) {
    let progress = match status.progress {
        dcp_core::Progress::Fraction(fraction) => format!("{:.1}%", fraction * 100.0),
        dcp_core::Progress::Indeterminate => "indeterminate".to_string(),
    };
    println!(
        "job {} [{}] {} ({}) — {}",
        status.job_id, status.state, progress, status.event_id, status.status_text
    );
}
