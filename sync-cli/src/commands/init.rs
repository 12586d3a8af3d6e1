//! Create the vault and its device key.

use anyhow::{Context, Result};
use hearth_sync_client::{ClientConfig, Vault};

use crate::config::set_dir_permissions_0700;

/// Run the init command.
pub async fn run(config: &ClientConfig) -> Result<()> {
    let data_dir = &config.storage.data_dir;

    // Check if already initialized
    if Vault::key_file(config).exists() {
        anyhow::bail!(
            "Vault already initialized at {}. Delete it to start over.",
            data_dir.display()
        );
    }

    tokio::fs::create_dir_all(data_dir)
        .await
        .context("Failed to create data directory")?;
    set_dir_permissions_0700(data_dir).await?;

    let vault = Vault::open(config).context("Failed to create vault")?;

    println!("Vault initialized successfully!");
    println!();
    println!("  Data dir: {}", data_dir.display());
    println!("  Prefix:   {}", config.storage.key_prefix);
    println!(
        "  Remote:   {}",
        if config.remote.is_some() {
            "configured"
        } else {
            "none (local only)"
        }
    );
    println!("  Pending:  {}", vault.queue().len());
    println!();
    println!("Next steps:");
    println!("  1. Record a mood: hearth mood 4 --note \"...\"");
    println!("  2. Add a [remote] section to hearth.toml and run: hearth sync");

    Ok(())
}
