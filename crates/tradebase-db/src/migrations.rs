use rusqlite::Connection;
use tracing::{debug, info, warn};
use tradebase_common::{Error, LengthPolicy, Result};

use crate::inspect::table_exists;
use crate::schema::TableDefinition;
use crate::store::store_error;

/// A schema change unit: one versioned, reversible structural change.
///
/// Applying creates `table`; reverting drops it. The unit holds no state of
/// its own. Which units are applied is tracked by [`crate::MigrationRunner`]
/// in a ledger table, ordered by `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub table: TableDefinition,
}

impl Migration {
    pub fn create_table(version: u32, name: &'static str, table: TableDefinition) -> Self {
        Self {
            version,
            name,
            table,
        }
    }

    /// The statement [`Migration::apply`] issues.
    pub fn create_sql(&self, policy: LengthPolicy) -> String {
        self.table.create_sql(policy)
    }

    /// The statement [`Migration::revert`] issues.
    pub fn drop_sql(&self) -> String {
        self.table.drop_sql()
    }

    /// Create the table. Fails with [`Error::SchemaConflict`] if a table with
    /// the same name already exists, including on a second apply.
    pub fn apply(&self, conn: &Connection, policy: LengthPolicy) -> Result<()> {
        self.table.validate()?;
        let table = &self.table.name;

        if table_exists(conn, table)? {
            return Err(Error::SchemaConflict(format!(
                "table {table} already exists (migration {} {})",
                self.version, self.name
            )));
        }

        let sql = self.create_sql(policy);
        debug!("{sql}");
        conn.execute_batch(&sql).map_err(|e| {
            if e.to_string().contains("already exists") {
                Error::SchemaConflict(format!("table {table} already exists: {e}"))
            } else {
                store_error(&format!("failed to create table {table}"), e)
            }
        })?;

        info!(
            "applied migration {} {} (created table {table})",
            self.version, self.name
        );
        Ok(())
    }

    /// Drop the table. Fails with [`Error::SchemaNotFound`] if it does not
    /// exist.
    ///
    /// This destroys data. The schema change is reversible (apply recreates
    /// an empty table) but every row the table held is discarded and cannot be
    /// recovered.
    pub fn revert(&self, conn: &Connection) -> Result<()> {
        let table = &self.table.name;

        if !table_exists(conn, table)? {
            return Err(Error::SchemaNotFound(format!(
                "table {table} does not exist (migration {} {})",
                self.version, self.name
            )));
        }

        warn!("dropping table {table}; all of its rows will be discarded");
        let sql = self.drop_sql();
        debug!("{sql}");
        conn.execute_batch(&sql).map_err(|e| {
            if e.to_string().contains("no such table") {
                Error::SchemaNotFound(format!("table {table} does not exist: {e}"))
            } else {
                store_error(&format!("failed to drop table {table}"), e)
            }
        })?;

        info!(
            "reverted migration {} {} (dropped table {table})",
            self.version, self.name
        );
        Ok(())
    }
}

/// Every migration shipped with this crate, in ascending version order.
pub fn all() -> Vec<Migration> {
    vec![crate::accounts::create_accounts()]
}
