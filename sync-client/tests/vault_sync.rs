//! End-to-end tests: vaults over in-memory storage syncing through one
//! shared mock remote.

use std::sync::Arc;

use hearth_sync_client::{
    Identity, KeyManager, MemoryBackend, MemoryKeystore, MockRemote, RecordCodec, RecordStore,
    SaveOutcome, SyncOutcome, Vault, VaultError,
};
use hearth_sync_core::SyncStatus;
use hearth_sync_types::{
    Category, EntityKind, Habit, HabitFrequency, JournalEntry, Mood, Reminder,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MoodDraft {
    level: u8,
}

fn device(remote: &MockRemote) -> Vault {
    Vault::in_memory(Arc::new(remote.clone())).unwrap()
}

fn device_with_backend(remote: &MockRemote, backend: &MemoryBackend) -> Vault {
    Vault::from_parts(
        Arc::new(backend.clone()),
        MemoryKeystore::new(),
        "hearth",
        Arc::new(remote.clone()),
    )
    .unwrap()
}

// ===========================================
// Storage Scenario
// ===========================================

#[test]
fn corrupted_record_reads_as_missing_without_affecting_category() {
    let backend = MemoryBackend::new();
    let vault = device_with_backend(&MockRemote::unconfigured(), &backend);

    vault
        .set_item(Category::Mood, "m1", &MoodDraft { level: 3 })
        .unwrap();
    vault
        .set_item(Category::Mood, "m2", &MoodDraft { level: 4 })
        .unwrap();
    assert_eq!(
        vault.get_item::<MoodDraft>(Category::Mood, "m1"),
        Some(MoodDraft { level: 3 })
    );

    backend.corrupt(&vault.store().composite_key(Category::Mood, "m1"));

    assert_eq!(vault.get_item::<MoodDraft>(Category::Mood, "m1"), None);
    assert!(matches!(
        vault.store().try_get_item::<MoodDraft>(Category::Mood, "m1"),
        Err(VaultError::Decryption(_))
    ));
    assert_eq!(
        vault.list_keys(Category::Mood).unwrap(),
        vec!["m1".to_string(), "m2".to_string()]
    );
    assert_eq!(
        vault.get_item::<MoodDraft>(Category::Mood, "m2"),
        Some(MoodDraft { level: 4 })
    );

    let scan = vault
        .store()
        .scan_category::<MoodDraft>(Category::Mood)
        .unwrap();
    assert_eq!(scan.items.len(), 1);
    assert_eq!(scan.corrupted(), 1);
}

#[test]
fn other_key_cannot_read_records() {
    let backend = MemoryBackend::new();
    let vault = device_with_backend(&MockRemote::unconfigured(), &backend);
    vault.set_item(Category::Settings, "theme", "dark").unwrap();

    // Same bytes, different device key
    let keys = KeyManager::new(MemoryKeystore::new());
    keys.initialize().unwrap();
    let stranger = RecordStore::new(
        Arc::new(backend.clone()),
        RecordCodec::new(Arc::new(keys)),
        "hearth",
    );

    assert_eq!(stranger.get_item::<String>(Category::Settings, "theme"), None);
}

// ===========================================
// Two-device Sync Scenarios
// ===========================================

#[tokio::test]
async fn two_devices_converge() {
    let remote = MockRemote::new();
    let phone = device(&remote);
    let laptop = device(&remote);

    let mut mood = Mood::new(4);
    mood.timestamp = 100;
    let mut entry = JournalEntry::new("Walked by the river");
    entry.timestamp = 200;

    phone.coordinator().save_mood(mood.clone()).await.unwrap();
    laptop.coordinator().save_journal(entry.clone()).await.unwrap();

    phone.sync_all().await.unwrap();
    laptop.sync_all().await.unwrap();

    for vault in [&phone, &laptop] {
        assert_eq!(vault.coordinator().get_entities::<Mood>(), vec![mood.clone()]);
        assert_eq!(
            vault.coordinator().get_entities::<JournalEntry>(),
            vec![entry.clone()]
        );
    }
}

#[tokio::test]
async fn offline_edits_reach_the_remote_on_next_sync() {
    let remote = MockRemote::new();
    remote.set_unreachable(true);
    let phone = device(&remote);

    let habit = Habit::new("Stretch", HabitFrequency::Daily);
    let reminder = Reminder::new("Evening check-in", 21, 30);
    assert_eq!(
        phone.coordinator().save_habit(habit.clone()).await.unwrap(),
        SaveOutcome::Queued
    );
    assert_eq!(
        phone
            .coordinator()
            .save_reminder(reminder.clone())
            .await
            .unwrap(),
        SaveOutcome::Queued
    );
    assert_eq!(phone.state().pending_count, 2);

    // Still unreachable: the sync fails and the queue is kept
    assert!(phone.sync_all().await.is_err());
    assert_eq!(phone.state().status, SyncStatus::Error);
    assert_eq!(phone.queue().len(), 2);

    remote.set_unreachable(false);
    let outcome = phone.sync_all().await.unwrap();

    let SyncOutcome::Completed(report) = outcome else {
        panic!("expected a completed sync");
    };
    assert_eq!(report.drain.delivered, 2);
    assert_eq!(phone.state().pending_count, 0);

    let owner = Identity::new("test-user");
    assert_eq!(remote.rows(EntityKind::Habit, &owner).len(), 1);
    assert_eq!(remote.rows(EntityKind::Reminder, &owner).len(), 1);

    let laptop = device(&remote);
    laptop.sync_all().await.unwrap();
    assert_eq!(laptop.coordinator().get_entities::<Habit>(), vec![habit]);
    assert_eq!(laptop.coordinator().get_entities::<Reminder>(), vec![reminder]);
}

#[tokio::test]
async fn delete_propagates_to_other_device() {
    let remote = MockRemote::new();
    let phone = device(&remote);
    let laptop = device(&remote);

    let mood = Mood::new(2);
    phone.coordinator().save_mood(mood.clone()).await.unwrap();
    laptop.sync_all().await.unwrap();
    assert_eq!(laptop.coordinator().get_entities::<Mood>().len(), 1);

    laptop
        .coordinator()
        .delete_entity(EntityKind::Mood, &mood.id)
        .await
        .unwrap();
    phone.sync_all().await.unwrap();

    // Remote-wins keeps local-only entities, so the phone still has it
    assert_eq!(phone.coordinator().get_entities::<Mood>().len(), 1);
    assert!(laptop.coordinator().get_entities::<Mood>().is_empty());
    assert!(remote
        .rows(EntityKind::Mood, &Identity::new("test-user"))
        .is_empty());
}

#[tokio::test]
async fn concurrent_edits_resolve_remote_wins() {
    let remote = MockRemote::new();
    let phone = device(&remote);
    let laptop = device(&remote);

    let original = Mood::new(3);
    phone.coordinator().save_mood(original.clone()).await.unwrap();
    laptop.sync_all().await.unwrap();

    // Laptop edits while offline, phone edits online
    remote.set_unreachable(true);
    let mut laptop_edit = original.clone();
    laptop_edit.level = 1;
    laptop.coordinator().save_mood(laptop_edit).await.unwrap();
    remote.set_unreachable(false);

    let mut phone_edit = original.clone();
    phone_edit.level = 5;
    phone.coordinator().save_mood(phone_edit).await.unwrap();

    // The laptop's queued edit is delivered first, then pulled back
    laptop.sync_all().await.unwrap();
    phone.sync_all().await.unwrap();

    let laptop_moods = laptop.coordinator().get_entities::<Mood>();
    let phone_moods = phone.coordinator().get_entities::<Mood>();
    assert_eq!(laptop_moods, phone_moods);
    assert_eq!(laptop_moods[0].level, 1);
}

#[tokio::test]
async fn signed_out_device_stays_offline_and_queues() {
    let remote = MockRemote::new();
    remote.set_identity(None);
    let vault = device(&remote);

    let outcome = vault.coordinator().save_mood(Mood::new(3)).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Queued);
    assert_eq!(vault.sync_all().await.unwrap(), SyncOutcome::Offline);
    assert_eq!(vault.state().status, SyncStatus::Offline);
    assert_eq!(vault.state().pending_count, 1);
    assert_eq!(remote.call_count(), 0);
}
