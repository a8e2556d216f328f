//! Writer round trips against an in-memory SQLite database.

mod common;

use common::{account, count_rows, sqlite, Account};
use oxide_persist::{
    Connection, PatchMap, PersistConfig, PersistError, SqlValue, Statement, WriteOutcome, Writer,
};

async fn writer() -> Writer<Account, oxide_persist::SqliteConnection> {
    Writer::new(sqlite().await, "accounts").unwrap()
}

async fn writer_with(config: PersistConfig) -> Writer<Account, oxide_persist::SqliteConnection> {
    writer().await.with_config(config).unwrap()
}

#[tokio::test]
async fn test_insert_starts_version_at_one() {
    let accounts = writer().await;
    let mut ann = account(1, "ann");

    assert_eq!(accounts.insert(&mut ann).await.unwrap(), 1);
    assert_eq!(ann.version, 1);

    let stored = accounts.loader().load(1_i64).await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.owner, "ann");
    assert_eq!(stored.email, None);
    assert!(stored.active);
    assert!((stored.balance - 12.5).abs() < f64::EPSILON);
    assert_eq!(stored.note, "");
}

#[tokio::test]
async fn test_stale_update_is_a_conflict() {
    let accounts = writer().await;
    let mut ann = account(1, "ann");
    accounts.insert(&mut ann).await.unwrap();
    let mut stale = ann.clone();

    ann.owner = String::from("bea");
    let outcome = accounts.update(&mut ann).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Applied(1));
    assert_eq!(ann.version, 2);

    stale.owner = String::from("cy");
    let outcome = accounts.update(&mut stale).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Conflict);
    assert_eq!(outcome.rows_affected(), -1);
    assert_eq!(stale.version, 1);

    let stored = accounts.loader().load(1_i64).await.unwrap().unwrap();
    assert_eq!(stored.owner, "bea");
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn test_update_missing_row() {
    let accounts = writer().await;
    let mut ghost = account(42, "ghost");
    ghost.version = 1;

    let outcome = accounts.update(&mut ghost).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Missing);
    assert_eq!(outcome.rows_affected(), 0);
    assert_eq!(ghost.version, 1);
}

#[tokio::test]
async fn test_duplicate_insert_returns_zero() {
    let accounts = writer().await;
    accounts.insert(&mut account(1, "ann")).await.unwrap();

    let mut again = account(1, "other");
    assert_eq!(accounts.insert(&mut again).await.unwrap(), 0);
    assert_eq!(again.version, 0);
    assert_eq!(count_rows(accounts.loader().connection()).await, 1);
}

#[tokio::test]
async fn test_bool_tokens_are_stored_as_text() {
    let accounts = writer().await;
    let mut ann = account(1, "ann");
    ann.active = false;
    accounts.insert(&mut ann).await.unwrap();

    let rows = accounts
        .loader()
        .connection()
        .query(&Statement::raw("SELECT active FROM accounts WHERE id = 1"))
        .await
        .unwrap();
    assert_eq!(rows[0].get("ACTIVE"), Some(&SqlValue::Text("N".into())));

    let stored = accounts.loader().load(1_i64).await.unwrap().unwrap();
    assert!(!stored.active);
}

#[tokio::test]
async fn test_save_inserts_then_updates() {
    let accounts = writer().await;
    let mut ann = account(1, "ann");

    assert_eq!(
        accounts.save(&mut ann).await.unwrap(),
        WriteOutcome::Applied(1)
    );
    assert_eq!(ann.version, 1);

    ann.email = Some(String::from("ann@example.com"));
    assert_eq!(
        accounts.save(&mut ann).await.unwrap(),
        WriteOutcome::Applied(1)
    );
    assert_eq!(ann.version, 2);

    let stored = accounts.loader().load(1_i64).await.unwrap().unwrap();
    assert_eq!(stored.email.as_deref(), Some("ann@example.com"));
    assert_eq!(count_rows(accounts.loader().connection()).await, 1);
}

#[tokio::test]
async fn test_patch_with_and_without_version() {
    let accounts = writer().await;
    accounts.insert(&mut account(1, "ann")).await.unwrap();

    let guarded = PatchMap::new()
        .with("id", 1_i64)
        .with("owner", "bea")
        .with("version", 1_i64);
    assert_eq!(
        accounts.patch(&guarded).await.unwrap(),
        WriteOutcome::Applied(1)
    );

    let stale = PatchMap::new()
        .with("id", 1_i64)
        .with("owner", "cy")
        .with("version", 1_i64);
    assert_eq!(accounts.patch(&stale).await.unwrap(), WriteOutcome::Conflict);

    let unguarded = PatchMap::new()
        .with("id", 1_i64)
        .with("email", "bea@example.com")
        .with("nickname", "ignored");
    assert_eq!(
        accounts.patch(&unguarded).await.unwrap(),
        WriteOutcome::Applied(1)
    );

    let stored = accounts.loader().load(1_i64).await.unwrap().unwrap();
    assert_eq!(stored.owner, "bea");
    assert_eq!(stored.email.as_deref(), Some("bea@example.com"));
    assert_eq!(stored.version, 3);
}

#[tokio::test]
async fn test_patch_missing_row() {
    let accounts = writer().await;
    let patch = PatchMap::new().with("id", 9_i64).with("owner", "nobody");
    assert_eq!(accounts.patch(&patch).await.unwrap(), WriteOutcome::Missing);
}

#[tokio::test]
async fn test_delete() {
    let accounts = writer().await;
    accounts.insert(&mut account(1, "ann")).await.unwrap();

    assert_eq!(accounts.delete(1_i64).await.unwrap(), 1);
    assert!(!accounts.loader().exist(1_i64).await.unwrap());
    assert_eq!(accounts.delete(1_i64).await.unwrap(), 0);
}

#[tokio::test]
async fn test_insert_many_in_chunks_skipping_duplicates() {
    let accounts = writer_with(PersistConfig {
        batch_size: Some(2),
        skip_duplicate: true,
        ..PersistConfig::default()
    })
    .await;
    accounts.insert(&mut account(3, "existing")).await.unwrap();

    let rows: Vec<Account> = (1..=5).map(|id| account(id, "bulk")).collect();
    let outcome = accounts.insert_many(&rows).await.unwrap();

    assert_eq!(outcome.rows_affected, 4);
    assert_eq!(outcome.succeeded, vec![0, 1, 3, 4]);
    assert_eq!(outcome.failed, vec![2]);
    assert_eq!(count_rows(accounts.loader().connection()).await, 5);

    let existing = accounts.loader().load(3_i64).await.unwrap().unwrap();
    assert_eq!(existing.owner, "existing");
    let bulk = accounts.loader().load(5_i64).await.unwrap().unwrap();
    assert_eq!(bulk.version, 1);
}

#[tokio::test]
async fn test_insert_many_skips_keys_repeated_in_input() {
    let accounts = writer_with(PersistConfig {
        skip_duplicate: true,
        ..PersistConfig::default()
    })
    .await;

    let rows = vec![account(1, "first"), account(2, "b"), account(1, "second")];
    let outcome = accounts.insert_many(&rows).await.unwrap();

    assert_eq!(outcome.rows_affected, 2);
    assert_eq!(outcome.succeeded, vec![0, 1]);
    assert_eq!(outcome.failed, vec![2]);
    let first = accounts.loader().load(1_i64).await.unwrap().unwrap();
    assert_eq!(first.owner, "first");
}

#[tokio::test]
async fn test_insert_many_duplicate_rolls_back_everything() {
    let accounts = writer().await;
    accounts.insert(&mut account(2, "existing")).await.unwrap();

    let rows = vec![account(1, "a"), account(2, "b"), account(3, "c")];
    let outcome = accounts.insert_many(&rows).await.unwrap();

    assert_eq!(outcome.rows_affected, 0);
    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed, vec![0, 1, 2]);
    assert_eq!(count_rows(accounts.loader().connection()).await, 1);
}

#[tokio::test]
async fn test_insert_many_empty() {
    let accounts = writer().await;
    let outcome = accounts.insert_many(&[]).await.unwrap();
    assert_eq!(outcome.rows_affected, 0);
    assert!(outcome.succeeded.is_empty());
}

#[tokio::test]
async fn test_update_many_reports_stale_rows() {
    let accounts = writer().await;
    let mut ann = account(1, "ann");
    let mut bob = account(2, "bob");
    accounts.insert(&mut ann).await.unwrap();
    accounts.insert(&mut bob).await.unwrap();

    ann.owner = String::from("ann2");
    bob.owner = String::from("bob2");
    bob.version = 7;

    let outcome = accounts.update_many(&[ann, bob]).await.unwrap();
    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.succeeded, vec![0]);
    assert_eq!(outcome.failed, vec![1]);

    let bob = accounts.loader().load(2_i64).await.unwrap().unwrap();
    assert_eq!(bob.owner, "bob");
    assert_eq!(bob.version, 1);
}

#[tokio::test]
async fn test_patch_many_in_chunks() {
    let accounts = writer_with(PersistConfig {
        batch_size: Some(1),
        ..PersistConfig::default()
    })
    .await;
    accounts.insert(&mut account(1, "ann")).await.unwrap();
    accounts.insert(&mut account(2, "bob")).await.unwrap();

    let patches = vec![
        PatchMap::new().with("id", 1_i64).with("owner", "ann2"),
        PatchMap::new().with("id", 9_i64).with("owner", "nobody"),
        PatchMap::new().with("id", 2_i64).with("active", false),
    ];
    let outcome = accounts.patch_many(&patches).await.unwrap();
    assert_eq!(outcome.rows_affected, 2);
    assert_eq!(outcome.succeeded, vec![0, 2]);
    assert_eq!(outcome.failed, vec![1]);

    let bob = accounts.loader().load(2_i64).await.unwrap().unwrap();
    assert!(!bob.active);
    assert_eq!(bob.version, 2);
}

#[tokio::test]
async fn test_unknown_version_field_is_rejected() {
    let result = writer()
        .await
        .with_config(PersistConfig {
            version_field: Some(String::from("revision")),
            ..PersistConfig::default()
        });
    assert!(matches!(result, Err(PersistError::Schema(_))));
}
