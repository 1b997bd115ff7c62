use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use tradebase_config::AppConfig;
use tradebase_db::inspect::describe_table;
use tradebase_db::{MigrationRunner, MigrationStatus, Store, migrations};

use crate::Command;

pub fn run(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Migrate { to } => migrate(config, to),
        Command::Rollback { steps, to } => rollback(config, steps, to),
        Command::Status { json } => status(config, json),
        Command::Describe { table } => describe(config, &table),
        Command::Sql { version, down } => print_sql(config, version, down),
        Command::Config => {
            let yaml = serde_yaml::to_string(config).context("failed to serialize config")?;
            print!("{yaml}");
            Ok(())
        }
    }
}

fn open_store(config: &AppConfig) -> Result<Store> {
    let path = &config.database.path;
    Store::open_with(path, Duration::from_millis(config.database.busy_timeout_ms))
        .with_context(|| format!("failed to open database {}", path.display()))
}

fn runner<'a>(store: &'a Store, config: &AppConfig) -> Result<MigrationRunner<'a>> {
    let runner = MigrationRunner::new(store, migrations::all())?
        .with_ledger_table(config.migrations.table.clone())?
        .with_length_policy(config.migrations.length_policy);
    Ok(runner)
}

fn migrate(config: &AppConfig, to: Option<u32>) -> Result<()> {
    let store = open_store(config)?;
    let report = runner(&store, config)?
        .migrate(to)
        .context("migration halted")?;

    if report.applied.is_empty() {
        println!("Database is up to date.");
    } else {
        for version in &report.applied {
            println!("Applied {version}");
        }
    }
    Ok(())
}

fn rollback(config: &AppConfig, steps: Option<usize>, to: Option<u32>) -> Result<()> {
    let store = open_store(config)?;
    let runner = runner(&store, config)?;
    let report = match to {
        Some(target) => runner.rollback_to(target),
        None => runner.rollback(steps.unwrap_or(1)),
    }
    .context("rollback halted")?;

    if report.reverted.is_empty() {
        println!("Nothing to roll back.");
    } else {
        for version in &report.reverted {
            println!("Reverted {version}");
        }
    }
    Ok(())
}

fn status(config: &AppConfig, json: bool) -> Result<()> {
    let path = &config.database.path;
    // opening would create the file, so a missing database is reported as-is
    let status = if path.exists() {
        let store = open_store(config)?;
        runner(&store, config)?.status()?
    } else {
        info!("database {} does not exist yet", path.display());
        migrations::all()
            .into_iter()
            .map(|m| MigrationStatus {
                version: m.version,
                name: m.name.to_string(),
                applied_at: None,
            })
            .collect()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{:<10} {:<24} APPLIED", "VERSION", "NAME");
    for entry in &status {
        let applied = entry
            .applied_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "pending".to_string());
        println!("{:<10} {:<24} {applied}", entry.version, entry.name);
    }
    Ok(())
}

fn describe(config: &AppConfig, table: &str) -> Result<()> {
    let store = open_store(config)?;
    let Some(columns) = store.with_connection(|conn| describe_table(conn, table))? else {
        bail!("table {table} does not exist");
    };

    println!("{:<28} {:<16} {:<9} KEY", "COLUMN", "TYPE", "NULLABLE");
    for column in &columns {
        println!(
            "{:<28} {:<16} {:<9} {}",
            column.name,
            column.declared_type,
            if column.not_null { "no" } else { "yes" },
            if column.primary_key { "primary" } else { "" }
        );
    }
    Ok(())
}

fn print_sql(config: &AppConfig, version: u32, down: bool) -> Result<()> {
    let all = migrations::all();
    let Some(migration) = all.iter().find(|m| m.version == version) else {
        bail!("unknown migration version {version}");
    };

    if down {
        warn!(
            "revert of {} drops the table and all of its rows",
            migration.name
        );
        println!("{};", migration.drop_sql());
    } else {
        println!("{};", migration.create_sql(config.migrations.length_policy));
    }
    Ok(())
}
