//! Partial UPDATE from a sparse field map.

use tracing::debug;

use super::{key_predicate, resolve_key, version_increment, Key, Params, Statement};
use crate::dialect::Dialect;
use crate::error::BuildError;
use crate::schema::{ColumnDescriptor, EntitySchema};
use crate::value::{SqlValue, ToSqlValue};

/// An ordered map of external field name to new value.
///
/// Must carry every key field; may carry the version field to guard the
/// patch with an optimistic-lock check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchMap {
    entries: Vec<(String, SqlValue)>,
}

impl PatchMap {
    /// Creates an empty patch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets a field, replacing an earlier value for the same name.
    pub fn insert<V: ToSqlValue>(&mut self, name: &str, value: V) {
        let value = value.to_sql_value();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((String::from(name), value)),
        }
    }

    /// Builder form of [`PatchMap::insert`].
    #[must_use]
    pub fn with<V: ToSqlValue>(mut self, name: &str, value: V) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value for a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the patch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a patch from a decoded JSON object.
    #[must_use]
    pub fn from_json(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .iter()
            .map(|(name, value)| (name.clone(), SqlValue::from_json(value)))
            .collect()
    }

    pub(crate) fn key(&self) -> Key {
        Key::Composite(self.entries.clone())
    }
}

impl FromIterator<(String, SqlValue)> for PatchMap {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        let mut patch = Self::new();
        for (name, value) in iter {
            patch.insert(&name, value);
        }
        patch
    }
}

/// Builds `UPDATE table SET ... WHERE keys [AND version = current]` from a patch.
///
/// Key fields form the WHERE clause and are never assigned. NULL values are
/// written inline as `col = NULL`. The version field, when present, is not
/// assigned from the patch: it guards the WHERE clause and is incremented.
/// Names without a mapped, updatable column are dropped.
pub fn build_patch(
    table: &str,
    schema: &EntitySchema,
    patch: &PatchMap,
    dialect: Dialect,
) -> Result<Statement, BuildError> {
    let keys = resolve_key(schema, &patch.key())?;
    let version = schema.version_position();
    let mut current_version = None;
    let mut set: Vec<(&ColumnDescriptor, &SqlValue)> = Vec::new();

    for (name, value) in patch.iter() {
        let Some(position) = schema.external_position(name) else {
            debug!(table = %table, field = %name, "Dropping unmapped patch field");
            continue;
        };
        let column = &schema.columns()[position];
        if column.is_key {
            continue;
        }
        if Some(position) == version {
            current_version = Some(value).filter(|v| !v.is_null());
            continue;
        }
        if !column.updatable {
            debug!(table = %table, column = %column.column, "Dropping read-only patch field");
            continue;
        }
        set.push((column, value));
    }

    if set.is_empty() {
        return Err(BuildError::EmptySet {
            table: String::from(table),
        });
    }

    let mut params = Params::new(dialect);
    let mut assignments = Vec::with_capacity(set.len() + 1);
    for (column, value) in set {
        if value.is_null() {
            assignments.push(format!("{} = NULL", column.column));
        } else {
            let placeholder = params.bind_column(column, value)?;
            assignments.push(format!("{} = {placeholder}", column.column));
        }
    }

    let mut predicate = key_predicate(&keys, &mut params)?;
    if let Some(column) = schema.version_column() {
        assignments.push(version_increment(column));
        if let Some(current) = current_version {
            let placeholder = params.bind_column(column, current)?;
            predicate.push_str(&format!(" AND {} = {placeholder}", column.column));
        }
    }

    let sql = format!(
        "UPDATE {table} SET {} WHERE {predicate}",
        assignments.join(", ")
    );
    Ok(params.finish(sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::user_schema;

    #[test]
    fn test_patch_with_null_and_version() {
        let schema = user_schema();
        let patch = PatchMap::new()
            .with("id", "u1")
            .with("name", "Bob")
            .with("email", SqlValue::Null)
            .with("version", 3_i32)
            .with("unknown", 1_i32);

        let stmt = build_patch("users", &schema, &patch, Dialect::Postgres).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE users SET user_name = $1, email = NULL, version = version + 1 \
             WHERE id = $2 AND version = $3"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("Bob".into()),
                SqlValue::Text("u1".into()),
                SqlValue::Int(3)
            ]
        );
    }

    #[test]
    fn test_patch_without_version_still_increments() {
        let schema = user_schema();
        let patch = PatchMap::new().with("id", "u1").with("active", false);
        let stmt = build_patch("users", &schema, &patch, Dialect::MySql).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE users SET active = ?, version = version + 1 WHERE id = ?"
        );
        assert_eq!(stmt.params[0], SqlValue::Text("N".into()));
    }

    #[test]
    fn test_patch_requires_keys() {
        let schema = user_schema();
        let patch = PatchMap::new().with("name", "Bob");
        assert_eq!(
            build_patch("users", &schema, &patch, Dialect::Sqlite).unwrap_err(),
            BuildError::MissingKey(String::from("id"))
        );
    }

    #[test]
    fn test_patch_with_only_keys_is_rejected() {
        let schema = user_schema();
        let patch = PatchMap::new().with("id", "u1").with("version", 1_i32);
        assert!(matches!(
            build_patch("users", &schema, &patch, Dialect::Sqlite),
            Err(BuildError::EmptySet { .. })
        ));
    }

    #[test]
    fn test_patch_from_json() {
        let object = serde_json::json!({"id": "u1", "name": "Bob", "email": null});
        let patch = PatchMap::from_json(object.as_object().unwrap());
        assert_eq!(patch.len(), 3);
        assert_eq!(patch.get("email"), Some(&SqlValue::Null));
        assert_eq!(patch.get("name"), Some(&SqlValue::Text("Bob".into())));
    }

    #[test]
    fn test_insert_replaces_existing_entry() {
        let mut patch = PatchMap::new().with("name", "a");
        patch.insert("name", "b");
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get("name"), Some(&SqlValue::Text("b".into())));
    }
}
