//! Read-only views of the store's current schema.

use rusqlite::{Connection, params};
use serde::Serialize;
use tradebase_common::Result;

use crate::schema::{ColumnDefinition, quote_ident};
use crate::store::store_error;

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

impl ColumnInfo {
    /// The column as a [`ColumnDefinition`], if its declared type is one this
    /// crate renders.
    pub fn definition(&self) -> Option<ColumnDefinition> {
        ColumnDefinition::from_declared(self.name.clone(), &self.declared_type)
    }
}

/// Table names are matched without regard to ASCII case, as SQLite resolves
/// them.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type='table' AND name = ?1 COLLATE NOCASE",
        params![name],
        |row| row.get(0),
    )
    .map_err(|e| store_error("failed to check table", e))
}

/// User tables in the store, sorted by name.
pub fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
             ORDER BY name",
        )
        .map_err(|e| store_error("failed to prepare query", e))?;

    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| store_error("failed to list tables", e))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| store_error("failed to read table row", e))
}

/// Columns of `name` in declaration order, or `None` when the table does not
/// exist.
pub fn describe_table(conn: &Connection, name: &str) -> Result<Option<Vec<ColumnInfo>>> {
    if !table_exists(conn, name)? {
        return Ok(None);
    }

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_ident(name)))
        .map_err(|e| store_error("failed to prepare table_info", e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                declared_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                primary_key: row.get::<_, i64>(5)? != 0,
            })
        })
        .map_err(|e| store_error("failed to query table_info", e))?;

    let columns = rows
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| store_error("failed to read column row", e))?;
    Ok(Some(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use crate::schema::ColumnKind;

    fn store_with_table() -> Store {
        let store = Store::in_memory().unwrap();
        store
            .with_connection(|conn| {
                conn.execute_batch(
                    "CREATE TABLE widgets (
                        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                        label varchar(40),
                        weight float
                    );
                    CREATE TABLE bins (id INTEGER PRIMARY KEY);",
                )
                .map_err(|e| store_error("setup failed", e))
            })
            .unwrap();
        store
    }

    #[test]
    fn lists_user_tables_sorted() {
        let store = store_with_table();
        let names = store.with_connection(table_names).unwrap();
        // AUTOINCREMENT creates sqlite_sequence, which is filtered out
        assert_eq!(names, vec!["bins".to_string(), "widgets".to_string()]);
    }

    #[test]
    fn describes_columns_in_order() {
        let store = store_with_table();
        let columns = store
            .with_connection(|conn| describe_table(conn, "widgets"))
            .unwrap()
            .unwrap();

        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "label", "weight"]);
        assert!(columns[0].primary_key);
        assert!(columns[0].not_null);
        assert!(!columns[1].not_null);
        assert_eq!(
            columns[1].definition(),
            Some(ColumnDefinition::string("label", 40))
        );
        assert_eq!(
            columns[2].definition().map(|c| c.kind),
            Some(ColumnKind::Float)
        );
    }

    #[test]
    fn describe_missing_table_is_none() {
        let store = Store::in_memory().unwrap();
        let columns = store
            .with_connection(|conn| describe_table(conn, "accounts"))
            .unwrap();
        assert!(columns.is_none());
        assert!(!store.with_connection(|conn| table_exists(conn, "accounts")).unwrap());
    }

    #[test]
    fn table_lookup_ignores_case() {
        let store = store_with_table();
        assert!(store.with_connection(|conn| table_exists(conn, "WIDGETS")).unwrap());
        let columns = store
            .with_connection(|conn| describe_table(conn, "Widgets"))
            .unwrap()
            .unwrap();
        assert_eq!(columns.len(), 3);
    }
}
