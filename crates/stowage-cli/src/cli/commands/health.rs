//! `stowage health` – show outstanding appliance failures.

use anyhow::Result;
use stowage_core::bulk::BulkContext;
use stowage_core::health;

pub async fn run_health(ctx: &BulkContext) -> Result<()> {
    let reports = health::collect_failures(ctx.appliance.as_ref()).await?;
    let mut any = false;
    for report in reports.iter().filter(|r| !r.is_empty()) {
        any = true;
        println!("{}", health::render_report(report));
    }
    if !any {
        println!("No failures reported");
    }
    Ok(())
}
