//! Show sync status.

use anyhow::Result;
use hearth_sync_client::{ClientConfig, Vault};
use hearth_sync_types::Category;

/// Run the status command.
pub async fn run(vault: &Vault, config: &ClientConfig) -> Result<()> {
    let state = vault.state();

    println!("=== hearth status ===");
    println!();

    println!("Vault:");
    println!("  Data dir: {}", config.storage.data_dir.display());
    for category in Category::ALL {
        let count = vault.list_keys(category)?.len();
        println!("  {:<9} {} record(s)", category.as_str(), count);
    }

    println!();

    println!("Remote:");
    match &config.remote {
        Some(remote) => {
            println!("  URL:       {}", remote.url);
            let ready = vault.coordinator().can_sync().await;
            println!(
                "  Signed in: {}",
                if ready { "yes" } else { "no (sync will stay offline)" }
            );
        }
        None => {
            println!("  NOT CONFIGURED (local only)");
        }
    }

    println!();

    println!("Sync:");
    println!("  Status:  {}", state.status);
    println!(
        "  Last:    {}",
        state
            .last_sync_at
            .map(format_timestamp)
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  Pending: {}", state.pending_count);
    if let Some(error) = &state.error {
        println!("  Error:   {}", error);
    }

    Ok(())
}

/// Format a Unix millisecond timestamp relative to now.
fn format_timestamp(ts_millis: i64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();

    let diff = now.saturating_sub(ts_millis / 1000).max(0);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_sync_client::RemoteConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_of_local_vault() {
        let dir = tempdir().unwrap();
        let config = ClientConfig::local(dir.path());
        let vault = Vault::open(&config).unwrap();
        vault.set_item(Category::Settings, "theme", "dark").unwrap();

        assert!(run(&vault, &config).await.is_ok());
    }

    #[tokio::test]
    async fn status_with_remote_but_no_user() {
        let dir = tempdir().unwrap();
        let mut config = ClientConfig::local(dir.path());
        config.remote = Some(RemoteConfig {
            url: "https://example.invalid".to_string(),
            api_key: "anon".to_string(),
            access_token: None,
            user_id: None,
            timeout_secs: 5,
        });
        let vault = Vault::open(&config).unwrap();

        assert!(run(&vault, &config).await.is_ok());
    }

    #[test]
    fn format_timestamp_works() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as i64;

        assert_eq!(format_timestamp(now), "just now");
        assert!(format_timestamp(now - 120_000).contains("minutes"));
        assert!(format_timestamp(now - 7_200_000).contains("hours"));
        assert!(format_timestamp(now - 172_800_000).contains("days"));
    }
}
