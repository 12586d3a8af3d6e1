//! Entity commands: record a mood, list a synced collection.

use anyhow::{Context, Result};
use hearth_sync_client::{SaveOutcome, Vault};
use hearth_sync_types::{Entity, EntityKind, Habit, JournalEntry, Mood, Reminder};

/// Save a mood check-in.
pub async fn record_mood(vault: &Vault, level: u8, note: Option<&str>) -> Result<()> {
    let mut mood = Mood::new(level);
    if let Some(note) = note {
        mood = mood.with_note(note);
    }
    let id = mood.id.clone();

    let outcome = vault
        .coordinator()
        .save_mood(mood)
        .await
        .context("Failed to save mood")?;

    match outcome {
        SaveOutcome::Synced => println!("Saved mood {id} (synced)"),
        SaveOutcome::Queued => println!(
            "Saved mood {id} (queued, {} pending)",
            vault.state().pending_count
        ),
    }
    Ok(())
}

/// Print the local collection of `kind`, one JSON object per line.
pub fn list(vault: &Vault, kind: &str) -> Result<()> {
    let kind: EntityKind = kind
        .parse()
        .context("Valid kinds: mood, journal, habit, reminder")?;

    for line in render(vault, kind)? {
        println!("{line}");
    }
    Ok(())
}

fn render(vault: &Vault, kind: EntityKind) -> Result<Vec<String>> {
    match kind {
        EntityKind::Mood => render_all::<Mood>(vault),
        EntityKind::Journal => render_all::<JournalEntry>(vault),
        EntityKind::Habit => render_all::<Habit>(vault),
        EntityKind::Reminder => render_all::<Reminder>(vault),
    }
}

fn render_all<E: Entity>(vault: &Vault) -> Result<Vec<String>> {
    vault
        .coordinator()
        .get_entities::<E>()
        .iter()
        .map(|entity| serde_json::to_string(entity).map_err(anyhow::Error::from))
        .collect()
}
