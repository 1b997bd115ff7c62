use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{info, warn};
use tradebase_common::{Error, LengthPolicy, Result, is_valid_identifier};

use crate::inspect::table_exists;
use crate::migrations::Migration;
use crate::schema::quote_ident;
use crate::store::{Store, store_error};

pub const DEFAULT_LEDGER_TABLE: &str = "_migrations";

/// A ledger row: one applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: u32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: u32,
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Versions applied by this run, ascending.
    pub applied: Vec<u32>,
    /// Migrations that were already applied.
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    /// Versions reverted by this run, descending.
    pub reverted: Vec<u32>,
}

/// Applies and reverts [`Migration`]s in version order, recording applied
/// versions in a ledger table so re-running is a no-op.
///
/// Each migration runs in its own transaction together with its ledger write.
/// The first failure stops the run; later migrations may depend on it.
pub struct MigrationRunner<'a> {
    store: &'a Store,
    migrations: Vec<Migration>,
    ledger: String,
    length_policy: LengthPolicy,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(store: &'a Store, mut migrations: Vec<Migration>) -> Result<Self> {
        migrations.sort_by_key(|m| m.version);

        let mut versions = HashSet::new();
        for migration in &migrations {
            if !versions.insert(migration.version) {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate migration version {}",
                    migration.version
                )));
            }
            migration.table.validate()?;
        }

        Ok(Self {
            store,
            migrations,
            ledger: DEFAULT_LEDGER_TABLE.to_string(),
            length_policy: LengthPolicy::default(),
        })
    }

    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_valid_identifier(&table) || table.to_ascii_lowercase().starts_with("sqlite_") {
            return Err(Error::Config(format!(
                "invalid migrations ledger table name: {table:?}"
            )));
        }
        if self
            .migrations
            .iter()
            .any(|m| m.table.name.eq_ignore_ascii_case(&table))
        {
            return Err(Error::Config(format!(
                "ledger table {table} collides with a migrated table"
            )));
        }
        self.ledger = table;
        Ok(self)
    }

    pub fn with_length_policy(mut self, policy: LengthPolicy) -> Self {
        self.length_policy = policy;
        self
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn ledger_table(&self) -> &str {
        &self.ledger
    }

    /// Applied migrations keyed by version. A store without a ledger has
    /// nothing applied; reading never creates the ledger.
    pub fn applied(&self) -> Result<BTreeMap<u32, AppliedMigration>> {
        self.store.with_connection(|conn| {
            if !table_exists(conn, &self.ledger)? {
                return Ok(BTreeMap::new());
            }
            self.read_ledger(conn)
        })
    }

    /// Every known migration with its applied timestamp, ascending.
    pub fn status(&self) -> Result<Vec<MigrationStatus>> {
        let applied = self.applied()?;
        for version in applied.keys() {
            if !self.migrations.iter().any(|m| m.version == *version) {
                warn!("ledger records unknown migration version {version}");
            }
        }

        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                version: m.version,
                name: m.name.to_string(),
                applied_at: applied.get(&m.version).map(|a| a.applied_at),
            })
            .collect())
    }

    /// Apply pending migrations in ascending order, up to and including
    /// `target` when given.
    pub fn migrate(&self, target: Option<u32>) -> Result<RunReport> {
        if let Some(target) = target {
            self.find(target)?;
        }

        let applied = self.applied()?;
        let mut report = RunReport::default();

        for migration in &self.migrations {
            if target.is_some_and(|t| migration.version > t) {
                break;
            }
            if applied.contains_key(&migration.version) {
                report.skipped += 1;
                continue;
            }

            self.store.transaction(|conn| {
                self.ensure_ledger(conn)?;
                migration.apply(conn, self.length_policy)?;
                conn.execute(
                    &format!(
                        "INSERT INTO {} (version, name, applied_at) VALUES (?1, ?2, ?3)",
                        quote_ident(&self.ledger)
                    ),
                    params![migration.version, migration.name, Utc::now().to_rfc3339()],
                )
                .map_err(|e| store_error("failed to record migration", e))?;
                Ok(())
            })?;
            report.applied.push(migration.version);
        }

        if report.applied.is_empty() {
            info!("no pending migrations");
        } else {
            info!("applied {} migration(s)", report.applied.len());
        }
        Ok(report)
    }

    /// Revert the `steps` highest applied versions, newest first.
    pub fn rollback(&self, steps: usize) -> Result<RollbackReport> {
        let applied = self.applied()?;
        let versions: Vec<u32> = applied.keys().rev().take(steps).copied().collect();
        self.revert_versions(&versions)
    }

    /// Revert every applied migration with a version greater than `target`.
    /// A `target` of 0 reverts everything.
    pub fn rollback_to(&self, target: u32) -> Result<RollbackReport> {
        if target != 0 {
            self.find(target)?;
        }
        let applied = self.applied()?;
        let versions: Vec<u32> = applied
            .keys()
            .rev()
            .take_while(|v| **v > target)
            .copied()
            .collect();
        self.revert_versions(&versions)
    }

    fn revert_versions(&self, versions: &[u32]) -> Result<RollbackReport> {
        let mut report = RollbackReport::default();

        for version in versions {
            let migration = self.find(*version).map_err(|_| {
                Error::Migration(format!(
                    "applied migration {version} is unknown; cannot revert it"
                ))
            })?;

            self.store.transaction(|conn| {
                migration.revert(conn)?;
                conn.execute(
                    &format!(
                        "DELETE FROM {} WHERE version = ?1",
                        quote_ident(&self.ledger)
                    ),
                    params![migration.version],
                )
                .map_err(|e| store_error("failed to remove migration record", e))?;
                Ok(())
            })?;
            report.reverted.push(migration.version);
        }

        if report.reverted.is_empty() {
            info!("nothing to roll back");
        } else {
            info!("rolled back {} migration(s)", report.reverted.len());
        }
        Ok(report)
    }

    fn find(&self, version: u32) -> Result<&Migration> {
        self.migrations
            .iter()
            .find(|m| m.version == version)
            .ok_or_else(|| Error::Migration(format!("unknown migration version {version}")))
    }

    fn ensure_ledger(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            quote_ident(&self.ledger)
        ))
        .map_err(|e| store_error("failed to create migrations ledger", e))
    }

    fn read_ledger(&self, conn: &Connection) -> Result<BTreeMap<u32, AppliedMigration>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT version, name, applied_at FROM {} ORDER BY version",
                quote_ident(&self.ledger)
            ))
            .map_err(|e| store_error("failed to prepare ledger query", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| store_error("failed to query ledger", e))?;

        let mut applied = BTreeMap::new();
        for row in rows {
            let (version, name, applied_at) =
                row.map_err(|e| store_error("failed to read ledger row", e))?;
            let applied_at = parse_datetime(&applied_at).ok_or_else(|| {
                Error::Migration(format!(
                    "ledger row for version {version} has malformed applied_at {applied_at:?}"
                ))
            })?;
            applied.insert(
                version,
                AppliedMigration {
                    version,
                    name,
                    applied_at,
                },
            );
        }
        Ok(applied)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // rows written by hand with datetime('now') use "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .ok()
}
