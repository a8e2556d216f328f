//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use oxide_persist::{Connection, Entity, PersistError, Row, SqliteConnection, Statement, Transaction};
use sqlx::sqlite::SqlitePoolOptions;

/// An account row: composite features in one table.
#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Account {
    #[column(primary_key)]
    pub id: i64,
    #[column(name = "owner_name", json = "owner")]
    pub owner: String,
    #[column]
    pub email: Option<String>,
    #[column(true_value = "Y", false_value = "N")]
    pub active: bool,
    #[column(scale = 2)]
    pub balance: f64,
    #[column(version)]
    pub version: i64,
    pub note: String,
}

pub fn account(id: i64, owner: &str) -> Account {
    Account {
        id,
        owner: owner.to_string(),
        email: None,
        active: true,
        balance: 12.5,
        version: 0,
        note: String::from("not persisted"),
    }
}

const CREATE_ACCOUNTS: &str = "CREATE TABLE accounts (
    id INTEGER PRIMARY KEY,
    owner_name TEXT NOT NULL,
    email TEXT,
    active TEXT NOT NULL,
    balance REAL NOT NULL,
    version INTEGER NOT NULL
)";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Opens an in-memory database with the `accounts` table.
pub async fn sqlite() -> SqliteConnection {
    init_tracing();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    sqlx::query(CREATE_ACCOUNTS)
        .execute(&pool)
        .await
        .expect("Failed to create accounts table");
    SqliteConnection::new(pool)
}

pub async fn count_rows(conn: &SqliteConnection) -> i64 {
    let rows = conn
        .query(&Statement::raw("SELECT COUNT(*) FROM accounts"))
        .await
        .unwrap();
    oxide_persist::FromSqlValue::from_sql_value(rows[0].values[0].clone()).unwrap()
}

/// Scripted reply to an execute call.
#[derive(Debug, Clone)]
pub enum Reply {
    Affected(u64),
    Fail(&'static str),
}

#[derive(Default)]
struct State {
    log: Vec<String>,
    replies: VecDeque<Reply>,
    rows: VecDeque<Vec<Row>>,
    fail_rollback: bool,
}

/// A connection that records every call and answers from a script.
///
/// Executes without a scripted reply affect one row; queries without
/// scripted rows return nothing.
#[derive(Clone)]
pub struct MockConnection {
    driver: &'static str,
    state: Arc<Mutex<State>>,
}

impl MockConnection {
    pub fn new(driver: &'static str) -> Self {
        init_tracing();
        Self {
            driver,
            state: Arc::default(),
        }
    }

    pub fn reply(&self, reply: Reply) {
        self.state.lock().unwrap().replies.push_back(reply);
    }

    pub fn rows(&self, rows: Vec<Row>) {
        self.state.lock().unwrap().rows.push_back(rows);
    }

    pub fn fail_rollback(&self) {
        self.state.lock().unwrap().fail_rollback = true;
    }

    /// Every recorded call, including BEGIN/COMMIT/ROLLBACK markers.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Recorded SQL text only.
    pub fn statements(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|l| !matches!(l.as_str(), "BEGIN" | "COMMIT" | "ROLLBACK"))
            .collect()
    }

    fn record(&self, entry: &str) {
        self.state.lock().unwrap().log.push(entry.to_string());
    }

    fn next_reply(&self, statement: &Statement) -> oxide_persist::Result<u64> {
        self.record(&statement.sql);
        match self.state.lock().unwrap().replies.pop_front() {
            None => Ok(1),
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Fail(message)) => Err(PersistError::Database(sqlx::Error::Protocol(
                message.to_string(),
            ))),
        }
    }

    fn next_rows(&self, statement: &Statement) -> Vec<Row> {
        self.record(&statement.sql);
        self.state
            .lock()
            .unwrap()
            .rows
            .pop_front()
            .unwrap_or_default()
    }
}

impl Connection for MockConnection {
    type Transaction<'c> = MockTransaction;

    fn driver_name(&self) -> &str {
        self.driver
    }

    async fn execute(&self, statement: &Statement) -> oxide_persist::Result<u64> {
        self.next_reply(statement)
    }

    async fn query(&self, statement: &Statement) -> oxide_persist::Result<Vec<Row>> {
        Ok(self.next_rows(statement))
    }

    async fn begin(&self) -> oxide_persist::Result<MockTransaction> {
        self.record("BEGIN");
        Ok(MockTransaction { conn: self.clone() })
    }
}

pub struct MockTransaction {
    conn: MockConnection,
}

impl Transaction for MockTransaction {
    async fn execute(&mut self, statement: &Statement) -> oxide_persist::Result<u64> {
        self.conn.next_reply(statement)
    }

    async fn query(&mut self, statement: &Statement) -> oxide_persist::Result<Vec<Row>> {
        Ok(self.conn.next_rows(statement))
    }

    async fn commit(self) -> oxide_persist::Result<()> {
        self.conn.record("COMMIT");
        Ok(())
    }

    async fn rollback(self) -> oxide_persist::Result<()> {
        self.conn.record("ROLLBACK");
        if self.conn.state.lock().unwrap().fail_rollback {
            return Err(PersistError::UnexpectedResult(String::from(
                "connection lost during rollback",
            )));
        }
        Ok(())
    }
}

/// A single-column row, as returned by `SELECT 1` or `SELECT COUNT(*)`.
pub fn scalar_row(column: &str, value: oxide_persist::SqlValue) -> Row {
    Row::new(vec![column.to_string()], vec![value])
}
