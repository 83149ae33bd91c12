#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use respawn::db::{DbConnection, Row};
use rusqlite::Connection;

/// Acyclic schema: Shipments -> OrderLines (composite key) -> Orders -> Customers,
/// plus an unrelated Migrations table.
pub const SHOP_SCHEMA: &str = "
    CREATE TABLE Customers (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Name TEXT NOT NULL
    );
    CREATE TABLE Orders (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        CustomerId INTEGER NOT NULL REFERENCES Customers(Id)
    );
    CREATE TABLE OrderLines (
        OrderId INTEGER NOT NULL REFERENCES Orders(Id),
        LineNo INTEGER NOT NULL,
        PRIMARY KEY (OrderId, LineNo)
    );
    CREATE TABLE Shipments (
        Id INTEGER PRIMARY KEY,
        OrderId INTEGER NOT NULL,
        LineNo INTEGER NOT NULL,
        FOREIGN KEY (OrderId, LineNo) REFERENCES OrderLines(OrderId, LineNo)
    );
    CREATE TABLE Migrations (Version INTEGER PRIMARY KEY);
";

/// Cyclic schema: a self-referencing tree and a mutual reference pair.
pub const ORG_SCHEMA: &str = "
    CREATE TABLE Categories (
        Id INTEGER PRIMARY KEY,
        ParentId INTEGER REFERENCES Categories(Id)
    );
    CREATE TABLE Departments (
        Id INTEGER PRIMARY KEY,
        ManagerId INTEGER REFERENCES Employees(Id)
    );
    CREATE TABLE Employees (
        Id INTEGER PRIMARY KEY,
        DepartmentId INTEGER REFERENCES Departments(Id)
    );
";

/// Open a fresh in-memory database with foreign keys enforced and `schema` applied.
pub fn test_db(schema: &str) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    conn.execute_batch(schema).unwrap();
    conn
}

/// Create an on-disk database at `path` with `schema` applied.
pub fn file_db(path: &Path, schema: &str) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(schema).unwrap();
}

pub fn seed_shop(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO Customers (Name) VALUES ('Ada'), ('Grace');
         INSERT INTO Orders (CustomerId) VALUES (1), (2);
         INSERT INTO OrderLines VALUES (1, 1), (1, 2), (2, 1);
         INSERT INTO Shipments VALUES (1, 1, 1), (2, 1, 2);
         INSERT INTO Migrations VALUES (20240101);",
    )
    .unwrap();
}

pub fn seed_org(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO Categories VALUES (1, NULL), (2, 1), (3, 2);
         INSERT INTO Departments VALUES (1, NULL);
         INSERT INTO Employees VALUES (1, 1);
         UPDATE Departments SET ManagerId = 1 WHERE Id = 1;",
    )
    .unwrap();
}

pub fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
        .unwrap()
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ScriptError(pub String);

/// A fake connection for engines without a local driver.
///
/// Queries are answered from canned rows keyed by a substring of the SQL.
/// Every transaction is recorded, including ones made to fail.
#[derive(Debug, Default)]
pub struct ScriptedConnection {
    pub responses: Vec<(&'static str, Vec<Row>)>,
    pub fail_on: Vec<&'static str>,
    pub queries: Vec<String>,
    pub transactions: Vec<Vec<String>>,
    pub timeouts: Vec<Option<Duration>>,
}

impl ScriptedConnection {
    pub fn respond(mut self, needle: &'static str, rows: Vec<Vec<Option<&str>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.map(String::from)).collect())
            .collect();
        self.responses.push((needle, rows));
        self
    }

    pub fn fail_on(mut self, needle: &'static str) -> Self {
        self.fail_on.push(needle);
        self
    }

    /// Flattened text of every transaction, in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.transactions.iter().map(|tx| tx.concat()).collect()
    }
}

impl DbConnection for ScriptedConnection {
    type Error = ScriptError;

    fn query_rows(&mut self, sql: &str, timeout: Option<Duration>) -> Result<Vec<Row>, ScriptError> {
        self.queries.push(sql.to_string());
        self.timeouts.push(timeout);

        if let Some(needle) = self.fail_on.iter().find(|n| sql.contains(*n)) {
            return Err(ScriptError(format!("query failed on {needle}")));
        }

        Ok(self
            .responses
            .iter()
            .find(|(needle, _)| sql.contains(needle))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn execute_in_transaction(
        &mut self,
        scripts: &[&str],
        timeout: Option<Duration>,
    ) -> Result<(), ScriptError> {
        self.transactions
            .push(scripts.iter().map(|s| s.to_string()).collect());
        self.timeouts.push(timeout);

        for script in scripts {
            if let Some(needle) = self.fail_on.iter().find(|n| script.contains(*n)) {
                return Err(ScriptError(format!("rolled back: {needle}")));
            }
        }
        Ok(())
    }
}
