//! # oxide-persist-core
//!
//! Dialect-aware statement building for relational entities, without I/O.
//!
//! This crate provides:
//! - An entity description model and the immutable [`EntitySchema`] built from it
//! - A [`Dialect`] registry covering Postgres, MySQL, SQL Server, Oracle and SQLite
//! - A value codec choosing between bound parameters and inline literals
//! - Statement builders for insert, update, patch, delete and their batch forms,
//!   with optimistic-lock version predicates
//! - Paging and count-query rewriting of arbitrary SELECT text
//! - A row scanner mapping driver-neutral rows back into entities
//!
//! ## Paging
//!
//! ```rust
//! use oxide_persist_core::{pager, Dialect};
//!
//! let base = "SELECT id, name FROM users ORDER BY name";
//! assert_eq!(
//!     pager::build_paged(base, 10, 20, Dialect::SqlServer),
//!     "SELECT id, name FROM users ORDER BY name OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
//! );
//! assert_eq!(pager::build_count(base), "SELECT COUNT(*) FROM users");
//! ```
//!
//! ## SQL Injection Prevention
//!
//! Entity values are bound as parameters, or embedded only after the codec
//! has escaped them:
//!
//! ```ignore
//! let user = User { id: 1, name: "'; DROP TABLE users; --".into(), ..Default::default() };
//! let stmt = build_insert("users", &schema, &user, Dialect::Sqlite, InsertOptions::default())?;
//! // stmt.sql    = "INSERT INTO users (id, name) VALUES (?, ?)"
//! // stmt.params = [Int(1), Text("'; DROP TABLE users; --")]
//! ```

pub mod builder;
pub mod codec;
pub mod dialect;
pub mod error;
pub mod pager;
pub mod scan;
pub mod schema;
pub mod value;

pub use builder::{Key, PatchMap, Statement};
pub use dialect::{Dialect, PagingStyle, SkipDuplicateStyle};
pub use error::{BuildError, ScanError, SchemaError, ValueError};
pub use scan::{scan_row, scan_rows, Row};
pub use schema::{
    ColumnDescriptor, Entity, EntityDescriptor, EntitySchema, FieldDescriptor, FieldKind, Shape,
};
pub use value::{FromSqlValue, SqlValue, ToSqlValue};
