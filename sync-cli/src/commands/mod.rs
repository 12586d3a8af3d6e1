//! CLI command implementations.

pub mod entities;
pub mod init;
pub mod item;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};
use hearth_sync_types::Category;

/// Categories open to raw record commands. `sync` holds the pending queue.
fn raw_categories() -> impl Iterator<Item = Category> {
    Category::ALL.into_iter().filter(|c| *c != Category::Sync)
}

/// Parse a category name, listing the valid ones on failure.
pub fn parse_category(name: &str) -> Result<Category> {
    let valid = || {
        let names: Vec<&str> = raw_categories().map(|c| c.as_str()).collect();
        format!("Valid categories: {}", names.join(", "))
    };

    let category: Category = name.parse().with_context(valid)?;
    if category == Category::Sync {
        anyhow::bail!("Category 'sync' is reserved for the pending queue. {}", valid());
    }
    Ok(category)
}
