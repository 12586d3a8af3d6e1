//! Run a full sync.

use anyhow::{Context, Result};
use hearth_sync_client::{SyncOutcome, Vault};

/// Run the sync command.
pub async fn run(vault: &Vault) -> Result<()> {
    let outcome = vault.sync_all().await.context("Sync failed")?;

    let report = match outcome {
        SyncOutcome::Offline => {
            println!("Offline: no remote configured or no signed-in user.");
            println!("  Pending changes: {}", vault.state().pending_count);
            return Ok(());
        }
        SyncOutcome::Completed(report) => report,
    };

    println!("Sync complete");
    println!();
    println!(
        "  Queue: {} delivered, {} failed (of {})",
        report.drain.delivered, report.drain.failed, report.drain.attempted
    );
    for collection in &report.collections {
        println!(
            "  {:<9} {} item(s), {} local only, {} overridden, {} skipped",
            collection.kind.to_string(),
            collection.merged,
            collection.local_only,
            collection.overridden.len(),
            collection.skipped_rows
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_sync_client::{ClientConfig, MockRemote};
    use hearth_sync_core::SyncStatus;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sync_without_remote_reports_offline() {
        let dir = tempdir().unwrap();
        let vault = Vault::open(&ClientConfig::local(dir.path())).unwrap();

        run(&vault).await.unwrap();
        assert_eq!(vault.state().status, SyncStatus::Offline);
    }

    #[tokio::test]
    async fn sync_with_remote_succeeds() {
        let vault = Vault::in_memory(Arc::new(MockRemote::new())).unwrap();

        run(&vault).await.unwrap();
        assert_eq!(vault.state().status, SyncStatus::Success);
    }

    #[tokio::test]
    async fn failed_sync_is_an_error() {
        let remote = MockRemote::new();
        remote.set_unreachable(true);
        let vault = Vault::in_memory(Arc::new(remote)).unwrap();

        assert!(run(&vault).await.is_err());
        assert_eq!(vault.state().status, SyncStatus::Error);
    }
}
