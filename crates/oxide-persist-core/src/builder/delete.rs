//! Key-addressed DELETE and SELECT statements.

use super::{key_predicate, resolve_key, Key, Params, Statement};
use crate::dialect::Dialect;
use crate::error::BuildError;
use crate::schema::EntitySchema;

/// Builds `DELETE FROM table WHERE keys`.
pub fn build_delete(
    table: &str,
    schema: &EntitySchema,
    key: &Key,
    dialect: Dialect,
) -> Result<Statement, BuildError> {
    keyed(table, schema, key, dialect, |table, predicate| {
        format!("DELETE FROM {table} WHERE {predicate}")
    })
}

/// Builds `SELECT 1 FROM table WHERE keys`.
pub fn build_exists(
    table: &str,
    schema: &EntitySchema,
    key: &Key,
    dialect: Dialect,
) -> Result<Statement, BuildError> {
    keyed(table, schema, key, dialect, |table, predicate| {
        format!("SELECT 1 FROM {table} WHERE {predicate}")
    })
}

/// Builds `SELECT columns FROM table WHERE keys`.
pub fn build_load(
    table: &str,
    schema: &EntitySchema,
    key: &Key,
    dialect: Dialect,
) -> Result<Statement, BuildError> {
    let columns = schema.select_list();
    keyed(table, schema, key, dialect, |table, predicate| {
        format!("SELECT {columns} FROM {table} WHERE {predicate}")
    })
}

/// Builds `SELECT columns FROM table`.
#[must_use]
pub fn build_select_all(table: &str, schema: &EntitySchema) -> Statement {
    Statement::raw(format!("SELECT {} FROM {table}", schema.select_list()))
}

fn keyed(
    table: &str,
    schema: &EntitySchema,
    key: &Key,
    dialect: Dialect,
    render: impl FnOnce(&str, &str) -> String,
) -> Result<Statement, BuildError> {
    let keys = resolve_key(schema, key)?;
    let mut params = Params::new(dialect);
    let predicate = key_predicate(&keys, &mut params)?;
    Ok(params.finish(render(table, &predicate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::{user_schema, Membership};
    use crate::value::SqlValue;

    #[test]
    fn test_delete_by_single_key() {
        let schema = user_schema();
        let stmt = build_delete("users", &schema, &Key::from("u1"), Dialect::Oracle).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM users WHERE id = :1");
        assert_eq!(stmt.params, vec![SqlValue::Text("u1".into())]);
    }

    #[test]
    fn test_delete_by_composite_key() {
        let schema = EntitySchema::introspect::<Membership>().unwrap();
        let key = Key::composite(&[("userId", 7_i64), ("groupId", 9_i64)]);
        let stmt = build_delete("memberships", &schema, &key, Dialect::Postgres).unwrap();
        assert_eq!(
            stmt.sql,
            "DELETE FROM memberships WHERE user_id = $1 AND group_id = $2"
        );
        assert_eq!(stmt.params, vec![SqlValue::Int(7), SqlValue::Int(9)]);
    }

    #[test]
    fn test_null_key_is_missing() {
        let schema = user_schema();
        assert_eq!(
            build_delete("users", &schema, &Key::from(SqlValue::Null), Dialect::Sqlite)
                .unwrap_err(),
            BuildError::MissingKey(String::from("id"))
        );
    }

    #[test]
    fn test_exists_and_load() {
        let schema = user_schema();
        let exists = build_exists("users", &schema, &Key::from("u1"), Dialect::MySql).unwrap();
        assert_eq!(exists.sql, "SELECT 1 FROM users WHERE id = ?");

        let load = build_load("users", &schema, &Key::from("u1"), Dialect::SqlServer).unwrap();
        assert_eq!(
            load.sql,
            "SELECT id, user_name, email, active, balance, version FROM users WHERE id = @p1"
        );
    }

    #[test]
    fn test_select_all() {
        let schema = EntitySchema::introspect::<Membership>().unwrap();
        let stmt = build_select_all("memberships", &schema);
        assert_eq!(stmt.sql, "SELECT user_id, group_id FROM memberships");
        assert!(stmt.params.is_empty());
    }
}
