//! `stowage delete-job <id>` – cancel a job on the appliance.

use anyhow::Result;
use stowage_core::bulk::{self, BulkContext};
use stowage_core::recovery::JobId;

pub async fn run_delete_job(ctx: &BulkContext, id: JobId) -> Result<()> {
    let has_descriptor = bulk::cancel_job(ctx, id).await?;
    println!("Canceled job {id} on the appliance.");
    if has_descriptor {
        println!(
            "A local recovery descriptor remains; remove it with `stowage recover --delete --id {id}`."
        );
    }
    Ok(())
}
