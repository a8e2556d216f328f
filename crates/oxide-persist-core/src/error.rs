//! Error types for schema construction, statement building and scanning.

use thiserror::Error;

use crate::value::SqlValue;

/// A value could not be converted to or from a field type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The stored value has an incompatible kind.
    #[error("cannot convert {found} value into {target}")]
    Mismatch {
        /// Rust type that was requested.
        target: &'static str,
        /// Kind of the stored value.
        found: &'static str,
    },

    /// The stored value does not fit the field type.
    #[error("value {value} is out of range for {target}")]
    OutOfRange {
        /// Rust type that was requested.
        target: &'static str,
        /// Textual form of the offending value.
        value: String,
    },

    /// The field index is not part of the entity.
    #[error("entity has no field at index {0}")]
    UnknownField(usize),
}

impl ValueError {
    pub(crate) const fn mismatch(target: &'static str, found: &SqlValue) -> Self {
        Self::Mismatch {
            target,
            found: found.kind_name(),
        }
    }
}

/// The entity type cannot be mapped to a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The described type is not a record with named fields.
    #[error("type {type_name} is not a composite type")]
    NotComposite {
        /// Name of the described type.
        type_name: String,
    },

    /// A keyed operation was requested on a schema without key columns.
    #[error("type {type_name} has no key columns")]
    NoKeyColumns {
        /// Name of the described type.
        type_name: String,
    },

    /// Two fields map to the same column.
    #[error("column {column} is mapped more than once")]
    DuplicateColumn {
        /// The repeated column name.
        column: String,
    },

    /// Two columns share an external name.
    #[error("external name {external} is used by more than one column")]
    DuplicateExternalName {
        /// The repeated external name.
        external: String,
    },

    /// More than one field carries the version marker.
    #[error("type {type_name} declares more than one version column")]
    MultipleVersionColumns {
        /// Name of the described type.
        type_name: String,
    },

    /// The version field is missing, not a column, or not an integer.
    #[error("field {field} cannot be used as a version column")]
    InvalidVersionField {
        /// The offending field.
        field: String,
    },

    /// Boolean override tokens were declared on a non-boolean field.
    #[error("field {field} declares boolean tokens but is not a bool")]
    InvalidBoolTokens {
        /// The offending field.
        field: String,
    },

    /// A field name did not match any mapped column.
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// A statement could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Schema-level problem surfaced while building.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// No column is left to assign in the SET clause.
    #[error("nothing to update in table {table}")]
    EmptySet {
        /// Target table.
        table: String,
    },

    /// The insert has no column to write.
    #[error("nothing to insert into table {table}")]
    EmptyInsert {
        /// Target table.
        table: String,
    },

    /// A key column has no value.
    #[error("missing value for key column {0}")]
    MissingKey(String),

    /// A single key value was given for a composite key, or vice versa.
    #[error("expected {expected} key values, got {actual}")]
    KeyArity {
        /// Number of key columns.
        expected: usize,
        /// Number of supplied values.
        actual: usize,
    },

    /// A value cannot be bound or embedded.
    #[error("value of column {0} cannot be represented")]
    Unrepresentable(String),

    /// The dialect has no syntax for the requested operation.
    #[error("operation {operation} is not supported by dialect {dialect}")]
    Unsupported {
        /// Requested operation.
        operation: &'static str,
        /// Dialect name.
        dialect: &'static str,
    },
}

/// A result row could not be mapped back into an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The row shape is inconsistent.
    #[error("row has {columns} columns but {values} values")]
    RowShape {
        /// Number of column names.
        columns: usize,
        /// Number of values.
        values: usize,
    },

    /// A column value could not be converted into its field.
    #[error("column {column}: {source}")]
    Value {
        /// Column being scanned.
        column: String,
        /// Underlying conversion error.
        source: ValueError,
    },
}
