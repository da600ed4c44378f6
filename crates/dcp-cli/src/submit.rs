use std::sync::Arc;

use dcp_jobkit::JobDescriptor;
use dcp_transport::{CoordinatorApi, HttpTransportClient};

use crate::cli::SubmitArgs;

/// Creates a job, optionally overrides its helper class ("H"), and submits
/// a [`JobDescriptor`] naming the requested factory (spec §8 scenario 1/4).
pub async fn run(args: SubmitArgs) -> anyhow::Result<()> {
    let client: Arc<dyn CoordinatorApi> = Arc::new(HttpTransportClient::new(args.backend_url.clone()));

    let job_id = client.create_job(args.description.clone()).await?;

    if let Some(helper) = &args.helper {
        let bytes = serde_json::from_str::<serde_json::Value>(helper)
            .map_err(|err| anyhow::anyhow!("invalid --helper JSON: {err}"))?;
        client
            .set_job_class_definition(job_id, "H".to_string(), serde_json::to_vec(&bytes)?)
            .await?;
    }

    let params: serde_json::Value =
        serde_json::from_str(&args.params).map_err(|err| anyhow::anyhow!("invalid --params JSON: {err}"))?;
    let bytes = JobDescriptor::new(args.factory.clone(), params).to_bytes();
    client.submit_job_with_bytes(job_id, args.factory, bytes).await?;

    println!("{job_id}");
    Ok(())
}
