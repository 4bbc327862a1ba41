//! Ctrl-C handling: flip the abort token so the running transfer stops
//! between objects and the orchestrator cancels the job on the appliance.

use stowage_core::control::AbortToken;
use tokio::task::JoinHandle;

/// Watches for Ctrl-C until dropped.
pub struct InterruptWatch(JoinHandle<()>);

impl Drop for InterruptWatch {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub fn watch(abort: AbortToken) -> InterruptWatch {
    InterruptWatch(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received; stopping after in-flight objects finish...");
            tracing::warn!("interrupt received; aborting transfer");
            abort.request_abort();
        }
    }))
}
