//! SQL dialect support.
//!
//! Each supported engine differs in placeholder syntax, boolean literal
//! support, the text of its duplicate-key error, pagination and the syntax
//! used to skip duplicate rows in a multi-row insert. A [`Dialect`] is
//! identified once per connection and then passed explicitly into every
//! builder.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pagination syntax family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingStyle {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
}

/// How a multi-row insert skips rows whose key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDuplicateStyle {
    /// `INSERT ... ON CONFLICT DO NOTHING`
    OnConflictDoNothing,
    /// `INSERT OR IGNORE INTO ...`
    InsertOrIgnore,
    /// `INSERT ... ON DUPLICATE KEY UPDATE k = k`
    OnDuplicateKeyUpdate,
    /// No native syntax.
    Unsupported,
}

/// A relational engine and its syntax quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL and MariaDB.
    #[serde(rename = "mysql")]
    MySql,
    /// Microsoft SQL Server.
    #[serde(rename = "sqlserver")]
    SqlServer,
    /// Oracle Database.
    Oracle,
    /// SQLite.
    Sqlite,
    /// Any other engine: plain `?` placeholders, no dialect-specific syntax.
    Unsupported,
}

impl Dialect {
    /// Identifies a dialect from a driver name.
    ///
    /// Unknown names map to [`Dialect::Unsupported`].
    #[must_use]
    pub fn for_driver(driver: &str) -> Self {
        match driver.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" | "pg" => Self::Postgres,
            "mysql" | "mariadb" => Self::MySql,
            "sqlserver" | "mssql" => Self::SqlServer,
            "oracle" | "godror" | "goracle" => Self::Oracle,
            "sqlite" | "sqlite3" => Self::Sqlite,
            _ => Self::Unsupported,
        }
    }

    /// Returns the name of the dialect.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::SqlServer => "sqlserver",
            Self::Oracle => "oracle",
            Self::Sqlite => "sqlite",
            Self::Unsupported => "unsupported",
        }
    }

    /// Returns the placeholder for the `index`-th parameter (1-based).
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::SqlServer => format!("@p{index}"),
            Self::Oracle => format!(":{index}"),
            Self::MySql | Self::Sqlite | Self::Unsupported => String::from("?"),
        }
    }

    /// Returns whether boolean values may be embedded as `TRUE`/`FALSE`.
    #[must_use]
    pub const fn supports_bool(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Returns the substrings identifying a duplicate-key error.
    #[must_use]
    pub const fn duplicate_key_markers(self) -> &'static [&'static str] {
        match self {
            Self::Postgres => &["duplicate key value violates unique constraint"],
            Self::MySql => &["Duplicate entry"],
            Self::SqlServer => &[
                "Violation of PRIMARY KEY constraint",
                "Violation of UNIQUE KEY constraint",
            ],
            Self::Oracle => &["ORA-00001: unique constraint"],
            Self::Sqlite => &["UNIQUE constraint failed"],
            Self::Unsupported => &[],
        }
    }

    /// Returns whether a driver error message reports a duplicate key.
    #[must_use]
    pub fn is_duplicate_key(self, message: &str) -> bool {
        self.duplicate_key_markers()
            .iter()
            .any(|marker| message.contains(marker))
    }

    /// Returns the pagination syntax family.
    #[must_use]
    pub const fn paging_style(self) -> PagingStyle {
        match self {
            Self::SqlServer | Self::Oracle => PagingStyle::OffsetFetch,
            _ => PagingStyle::LimitOffset,
        }
    }

    /// Returns the multi-row insert syntax for skipping duplicate keys.
    #[must_use]
    pub const fn skip_duplicate_style(self) -> SkipDuplicateStyle {
        match self {
            Self::Postgres => SkipDuplicateStyle::OnConflictDoNothing,
            Self::Sqlite => SkipDuplicateStyle::InsertOrIgnore,
            Self::MySql => SkipDuplicateStyle::OnDuplicateKeyUpdate,
            Self::SqlServer | Self::Oracle | Self::Unsupported => SkipDuplicateStyle::Unsupported,
        }
    }

    /// Returns whether `VALUES (...), (...)` is accepted for multi-row inserts.
    #[must_use]
    pub const fn supports_multi_row_values(self) -> bool {
        !matches!(self, Self::Oracle)
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::Unsupported
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::MySql.placeholder(3), "?");
        assert_eq!(Dialect::SqlServer.placeholder(3), "@p3");
        assert_eq!(Dialect::Oracle.placeholder(3), ":3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
        assert_eq!(Dialect::Unsupported.placeholder(3), "?");
    }

    #[test]
    fn test_for_driver() {
        assert_eq!(Dialect::for_driver("PostgreSQL"), Dialect::Postgres);
        assert_eq!(Dialect::for_driver("mariadb"), Dialect::MySql);
        assert_eq!(Dialect::for_driver("mssql"), Dialect::SqlServer);
        assert_eq!(Dialect::for_driver("godror"), Dialect::Oracle);
        assert_eq!(Dialect::for_driver("sqlite3"), Dialect::Sqlite);
        assert_eq!(Dialect::for_driver("duckdb"), Dialect::Unsupported);
    }

    #[test]
    fn test_duplicate_key_detection() {
        assert!(Dialect::Postgres.is_duplicate_key(
            "error returned from database: duplicate key value violates unique constraint \"users_pkey\""
        ));
        assert!(Dialect::MySql.is_duplicate_key("Duplicate entry '1' for key 'PRIMARY'"));
        assert!(Dialect::Sqlite.is_duplicate_key("UNIQUE constraint failed: users.id"));
        assert!(Dialect::Oracle.is_duplicate_key("ORA-00001: unique constraint (X.PK) violated"));
        assert!(!Dialect::Sqlite.is_duplicate_key("no such table: users"));
        assert!(!Dialect::Unsupported.is_duplicate_key("UNIQUE constraint failed"));
    }

    #[test]
    fn test_capabilities() {
        assert!(Dialect::Postgres.supports_bool());
        assert!(!Dialect::MySql.supports_bool());
        assert_eq!(Dialect::Oracle.paging_style(), PagingStyle::OffsetFetch);
        assert_eq!(Dialect::Sqlite.paging_style(), PagingStyle::LimitOffset);
        assert_eq!(
            Dialect::SqlServer.skip_duplicate_style(),
            SkipDuplicateStyle::Unsupported
        );
        assert!(!Dialect::Oracle.supports_multi_row_values());
    }

    #[test]
    fn test_deserialize_from_config() {
        let dialect: Dialect = serde_json::from_str("\"sqlserver\"").unwrap();
        assert_eq!(dialect, Dialect::SqlServer);
    }
}
