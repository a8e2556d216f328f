//! Entity descriptions and the table schema derived from them.
//!
//! An [`Entity`] describes its fields once through [`EntityDescriptor`]; the
//! `#[derive(Entity)]` macro generates that description from field
//! attributes. [`EntitySchema`] is computed from the descriptor a single time
//! and then shared read-only by every builder and the row scanner. Field
//! values are accessed positionally, never by name.

use std::collections::HashMap;

use crate::error::{SchemaError, ValueError};
use crate::value::SqlValue;

/// Kind of Rust value stored in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `bool`
    Bool,
    /// Signed or unsigned integer.
    Int,
    /// `f32` / `f64`
    Float,
    /// Text.
    Text,
    /// Timestamp.
    Timestamp,
    /// Raw bytes.
    Bytes,
    /// Anything else; converted through its own `ToSqlValue` impl.
    Other,
}

/// Shape of a described type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A struct with named fields.
    Record,
    /// A single value.
    Scalar,
    /// A list of values.
    Sequence,
}

/// Declared metadata of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name.
    pub name: String,
    /// Stored value kind.
    pub kind: FieldKind,
    /// Whether the field is optional.
    pub nullable: bool,
    /// Persisted column name; fields without one are not mapped.
    pub column: Option<String>,
    /// External (wire) name; defaults to the field name.
    pub external: Option<String>,
    /// Explicitly excluded from mapping.
    pub ignore: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Optimistic-lock version counter.
    pub version: bool,
    /// Written by inserts.
    pub insertable: bool,
    /// Written by updates.
    pub updatable: bool,
    /// Fixed number of decimals for floats.
    pub scale: Option<u32>,
    /// Stored tokens for `true` and `false`.
    pub bool_tokens: Option<(String, String)>,
}

impl FieldDescriptor {
    /// Creates a mapped field whose column has the same name as the field.
    #[must_use]
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: String::from(name),
            kind,
            nullable: false,
            column: Some(String::from(name)),
            external: None,
            ignore: false,
            primary_key: false,
            version: false,
            insertable: true,
            updatable: true,
            scale: None,
            bool_tokens: None,
        }
    }

    /// Creates a field without a column annotation.
    #[must_use]
    pub fn unmapped(name: &str, kind: FieldKind) -> Self {
        Self {
            column: None,
            ..Self::new(name, kind)
        }
    }

    /// Sets the persisted column name.
    #[must_use]
    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(String::from(column));
        self
    }

    /// Sets the external name.
    #[must_use]
    pub fn external(mut self, external: &str) -> Self {
        self.external = Some(String::from(external));
        self
    }

    /// Marks the field as part of the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the field as the version column.
    #[must_use]
    pub const fn version(mut self) -> Self {
        self.version = true;
        self
    }

    /// Marks the field as optional.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Excludes the field from mapping.
    #[must_use]
    pub const fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Excludes the column from inserts.
    #[must_use]
    pub const fn skip_insert(mut self) -> Self {
        self.insertable = false;
        self
    }

    /// Excludes the column from updates.
    #[must_use]
    pub const fn skip_update(mut self) -> Self {
        self.updatable = false;
        self
    }

    /// Sets the fixed number of decimals.
    #[must_use]
    pub const fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Stores booleans as the given tokens.
    #[must_use]
    pub fn bool_tokens(mut self, true_token: &str, false_token: &str) -> Self {
        self.bool_tokens = Some((String::from(true_token), String::from(false_token)));
        self
    }
}

/// Declared metadata of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Rust type name.
    pub type_name: String,
    /// Shape of the type.
    pub shape: Shape,
    /// Fields in declaration order; the position is the field index.
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    /// Creates a record descriptor.
    #[must_use]
    pub fn record(type_name: &str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            type_name: String::from(type_name),
            shape: Shape::Record,
            fields,
        }
    }
}

/// A type persisted as a table row.
///
/// Usually implemented with `#[derive(Entity)]`.
pub trait Entity: Default + Send + Sync + 'static {
    /// Describes the fields of this type.
    fn descriptor() -> EntityDescriptor;

    /// Returns the value of the field at `field` (descriptor position).
    fn field_value(&self, field: usize) -> SqlValue;

    /// Stores `value` into the field at `field` (descriptor position).
    fn set_field_value(&mut self, field: usize, value: SqlValue) -> Result<(), ValueError>;
}

/// A mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Field index in the entity descriptor.
    pub field: usize,
    /// Rust field name.
    pub name: String,
    /// Persisted column name.
    pub column: String,
    /// External (wire) name.
    pub external: String,
    /// Stored value kind.
    pub kind: FieldKind,
    /// Part of the primary key.
    pub is_key: bool,
    /// Written by updates.
    pub updatable: bool,
    /// Written by inserts.
    pub insertable: bool,
    /// Fixed number of decimals for floats.
    pub scale: Option<u32>,
    /// Stored tokens for `true` and `false`.
    pub bool_tokens: Option<(String, String)>,
}

/// Immutable column, key and version metadata of an entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    type_name: String,
    columns: Vec<ColumnDescriptor>,
    keys: Vec<usize>,
    version: Option<usize>,
    by_column: HashMap<String, usize>,
    by_external: HashMap<String, usize>,
}

impl EntitySchema {
    /// Builds the schema of `E`.
    pub fn introspect<E: Entity>() -> Result<Self, SchemaError> {
        Self::from_descriptor(&E::descriptor())
    }

    /// Builds a schema from a descriptor.
    ///
    /// A field becomes a column when it has a column name and is not ignored.
    pub fn from_descriptor(descriptor: &EntityDescriptor) -> Result<Self, SchemaError> {
        if descriptor.shape != Shape::Record {
            return Err(SchemaError::NotComposite {
                type_name: descriptor.type_name.clone(),
            });
        }

        let mut columns = Vec::new();
        let mut version = None;
        for (index, field) in descriptor.fields.iter().enumerate() {
            let Some(column) = field.column.as_ref().filter(|_| !field.ignore) else {
                continue;
            };
            if field.bool_tokens.is_some() && field.kind != FieldKind::Bool {
                return Err(SchemaError::InvalidBoolTokens {
                    field: field.name.clone(),
                });
            }
            if field.version {
                if version.is_some() {
                    return Err(SchemaError::MultipleVersionColumns {
                        type_name: descriptor.type_name.clone(),
                    });
                }
                if field.kind != FieldKind::Int || field.primary_key {
                    return Err(SchemaError::InvalidVersionField {
                        field: field.name.clone(),
                    });
                }
                version = Some(columns.len());
            }
            columns.push(ColumnDescriptor {
                field: index,
                name: field.name.clone(),
                column: column.clone(),
                external: field.external.clone().unwrap_or_else(|| field.name.clone()),
                kind: field.kind,
                is_key: field.primary_key,
                updatable: field.updatable && !field.primary_key,
                insertable: field.insertable,
                scale: field.scale,
                bool_tokens: field.bool_tokens.clone(),
            });
        }

        let mut by_column = HashMap::with_capacity(columns.len());
        let mut by_external = HashMap::with_capacity(columns.len());
        for (position, col) in columns.iter().enumerate() {
            if by_column
                .insert(col.column.to_lowercase(), position)
                .is_some()
            {
                return Err(SchemaError::DuplicateColumn {
                    column: col.column.clone(),
                });
            }
            if by_external.insert(col.external.clone(), position).is_some() {
                return Err(SchemaError::DuplicateExternalName {
                    external: col.external.clone(),
                });
            }
        }
        let keys = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_key)
            .map(|(position, _)| position)
            .collect();

        Ok(Self {
            type_name: descriptor.type_name.clone(),
            columns,
            keys,
            version,
            by_column,
            by_external,
        })
    }

    /// Designates the version column by field or external name.
    pub fn with_version_field(mut self, name: &str) -> Result<Self, SchemaError> {
        let position = self
            .columns
            .iter()
            .position(|c| c.name == name || c.external == name || c.column == name)
            .ok_or_else(|| SchemaError::UnknownField(String::from(name)))?;
        let col = &self.columns[position];
        if col.kind != FieldKind::Int || col.is_key {
            return Err(SchemaError::InvalidVersionField {
                field: String::from(name),
            });
        }
        self.version = Some(position);
        Ok(self)
    }

    /// Returns the described type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns all mapped columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Returns the key columns.
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.keys.iter().map(|&i| &self.columns[i])
    }

    /// Returns the number of key columns.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Fails when the schema has no key columns.
    pub fn require_keys(&self) -> Result<(), SchemaError> {
        if self.keys.is_empty() {
            return Err(SchemaError::NoKeyColumns {
                type_name: self.type_name.clone(),
            });
        }
        Ok(())
    }

    /// Returns the version column, if any.
    #[must_use]
    pub fn version_column(&self) -> Option<&ColumnDescriptor> {
        self.version.map(|i| &self.columns[i])
    }

    /// Returns the position of the version column, if any.
    #[must_use]
    pub const fn version_position(&self) -> Option<usize> {
        self.version
    }

    /// Finds a column by persisted name, ignoring case.
    #[must_use]
    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.by_column.get(&column.to_lowercase()).copied()
    }

    /// Finds a column by external name, falling back to the column name.
    #[must_use]
    pub fn external_position(&self, external: &str) -> Option<usize> {
        self.by_external
            .get(external)
            .copied()
            .or_else(|| self.column_position(external))
    }

    /// Returns the comma-separated list of column names.
    #[must_use]
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.column.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::value::{FromSqlValue, ToSqlValue};

    /// A user row with a boolean stored as `Y`/`N` and a version counter.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct User {
        pub id: String,
        pub name: String,
        pub email: Option<String>,
        pub active: bool,
        pub balance: f64,
        pub version: i32,
        pub cache: String,
    }

    impl Entity for User {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::record(
                "User",
                vec![
                    FieldDescriptor::new("id", FieldKind::Text).primary_key(),
                    FieldDescriptor::new("name", FieldKind::Text).column("user_name"),
                    FieldDescriptor::new("email", FieldKind::Text).nullable(),
                    FieldDescriptor::new("active", FieldKind::Bool).bool_tokens("Y", "N"),
                    FieldDescriptor::new("balance", FieldKind::Float).scale(2),
                    FieldDescriptor::new("version", FieldKind::Int).version(),
                    FieldDescriptor::unmapped("cache", FieldKind::Text),
                ],
            )
        }

        fn field_value(&self, field: usize) -> SqlValue {
            match field {
                0 => self.id.clone().to_sql_value(),
                1 => self.name.clone().to_sql_value(),
                2 => self.email.clone().to_sql_value(),
                3 => self.active.to_sql_value(),
                4 => self.balance.to_sql_value(),
                5 => self.version.to_sql_value(),
                _ => SqlValue::Null,
            }
        }

        fn set_field_value(&mut self, field: usize, value: SqlValue) -> Result<(), ValueError> {
            match field {
                0 => self.id = FromSqlValue::from_sql_value(value)?,
                1 => self.name = FromSqlValue::from_sql_value(value)?,
                2 => self.email = FromSqlValue::from_sql_value(value)?,
                3 => self.active = FromSqlValue::from_sql_value(value)?,
                4 => self.balance = FromSqlValue::from_sql_value(value)?,
                5 => self.version = FromSqlValue::from_sql_value(value)?,
                6 => {}
                other => return Err(ValueError::UnknownField(other)),
            }
            Ok(())
        }
    }

    /// A link table with a composite key and nothing else to update.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Membership {
        pub user_id: i64,
        pub group_id: i64,
    }

    impl Entity for Membership {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::record(
                "Membership",
                vec![
                    FieldDescriptor::new("user_id", FieldKind::Int)
                        .primary_key()
                        .external("userId"),
                    FieldDescriptor::new("group_id", FieldKind::Int)
                        .primary_key()
                        .external("groupId"),
                ],
            )
        }

        fn field_value(&self, field: usize) -> SqlValue {
            match field {
                0 => self.user_id.to_sql_value(),
                1 => self.group_id.to_sql_value(),
                _ => SqlValue::Null,
            }
        }

        fn set_field_value(&mut self, field: usize, value: SqlValue) -> Result<(), ValueError> {
            match field {
                0 => self.user_id = FromSqlValue::from_sql_value(value)?,
                1 => self.group_id = FromSqlValue::from_sql_value(value)?,
                other => return Err(ValueError::UnknownField(other)),
            }
            Ok(())
        }
    }

    pub fn user_schema() -> EntitySchema {
        EntitySchema::introspect::<User>().unwrap()
    }

    pub fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            email: None,
            active: true,
            balance: 10.5,
            version: 3,
            cache: String::new(),
        }
    }
}
