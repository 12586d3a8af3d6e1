//! Raw record access by category and key.

use anyhow::{Context, Result};
use hearth_sync_client::Vault;
use serde_json::Value;

use super::parse_category;

/// Store `value` (JSON text) at `category`/`key`.
pub fn set(vault: &Vault, category: &str, key: &str, value: &str) -> Result<()> {
    let category = parse_category(category)?;
    let value: Value = serde_json::from_str(value).context("Value must be valid JSON")?;

    vault
        .set_item(category, key, &value)
        .with_context(|| format!("Failed to store {category}/{key}"))?;

    println!("Stored {category}/{key}");
    Ok(())
}

/// Print the value at `category`/`key`.
pub fn get(vault: &Vault, category: &str, key: &str) -> Result<()> {
    let category = parse_category(category)?;
    match vault.get_item::<Value>(category, key) {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => anyhow::bail!("No readable record at {category}/{key}"),
    }
    Ok(())
}

/// Remove `category`/`key`.
pub fn rm(vault: &Vault, category: &str, key: &str) -> Result<()> {
    let category = parse_category(category)?;
    if vault.remove_item(category, key)? {
        println!("Removed {category}/{key}");
    } else {
        println!("Nothing stored at {category}/{key}");
    }
    Ok(())
}

/// List the keys in `category`.
pub fn ls(vault: &Vault, category: &str) -> Result<()> {
    let category = parse_category(category)?;
    for key in vault.list_keys(category)? {
        println!("{key}");
    }
    Ok(())
}

/// Clear one category, or everything when `category` is `None`.
pub fn clear(vault: &Vault, category: Option<&str>) -> Result<()> {
    let removed = match category {
        Some(name) => vault.clear_category(parse_category(name)?)?,
        None => vault.clear_all()?,
    };
    println!("Removed {removed} record(s)");
    Ok(())
}
