//! # oxide-persist
//!
//! Writer and loader facades over sqlx with optimistic locking and
//! transactional batches.
//!
//! This crate provides:
//! - `#[derive(Entity)]` for mapping structs to table rows
//! - [`Loader`] for key lookups, full scans and paged searches
//! - [`Writer`] for insert, update, save, patch, delete and their batch forms
//! - Version checks reporting stale writes as conflicts (`-1`)
//! - A transaction executor with chunked execution
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_persist::{Entity, SqliteConnection, WriteOutcome, Writer};
//!
//! #[derive(Debug, Default, Entity)]
//! struct Account {
//!     #[column(primary_key)]
//!     id: i64,
//!     #[column(name = "owner_name", json = "owner")]
//!     owner: String,
//!     #[column(true_value = "Y", false_value = "N")]
//!     active: bool,
//!     #[column(version)]
//!     version: i64,
//! }
//!
//! async fn example(conn: SqliteConnection) -> oxide_persist::Result<()> {
//!     let accounts = Writer::<Account, _>::new(conn, "accounts")?;
//!
//!     let mut account = Account { id: 1, owner: "ann".into(), active: true, version: 0 };
//!     accounts.insert(&mut account).await?; // account.version == 1
//!
//!     let mut stale = accounts.loader().load(1).await?.unwrap();
//!     account.owner = "bob".into();
//!     accounts.update(&mut account).await?; // account.version == 2
//!
//!     stale.owner = "cy".into();
//!     assert_eq!(accounts.update(&mut stale).await?, WriteOutcome::Conflict);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod loader;
pub mod tx;
pub mod version;
pub mod writer;

pub use config::PersistConfig;
#[cfg(feature = "mysql")]
pub use connection::MySqlConnection;
#[cfg(feature = "postgres")]
pub use connection::PgConnection;
#[cfg(feature = "sqlite")]
pub use connection::SqliteConnection;
pub use connection::{identify, Connection, Transaction};
pub use error::{PersistError, Result};
pub use loader::{Loader, Search, SearchBuilder};
pub use tx::{
    execute_all, execute_batch, execute_with_batch_size, execute_with_lookups, BatchMode, TxReport,
};
pub use version::{resolve, WriteOutcome};
pub use writer::{BatchOutcome, Writer};

pub use oxide_persist_core::{
    builder, pager, Dialect, Entity, EntitySchema, FromSqlValue, Key, PatchMap, Row, SqlValue,
    Statement, ToSqlValue,
};
pub use oxide_persist_derive::Entity;
