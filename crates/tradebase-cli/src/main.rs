mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tradebase_config::{AppConfig, ConfigLoader, LogFormat};

#[derive(Parser, Debug)]
#[command(
    name = "tradebase",
    version,
    about = "Apply and revert tradebase schema migrations"
)]
struct Cli {
    /// Config file (YAML or TOML). Defaults to the platform config directory.
    #[arg(long, global = true, env = "TRADEBASE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file, overriding `database.path`.
    #[arg(long, global = true, env = "TRADEBASE_DATABASE")]
    database: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Apply pending migrations in ascending version order
    Migrate {
        /// Stop after applying this version
        #[arg(long)]
        to: Option<u32>,
    },
    /// Revert applied migrations, newest first. Reverting drops tables and
    /// discards their rows.
    Rollback {
        /// Number of migrations to revert (default 1)
        #[arg(long, conflicts_with = "to")]
        steps: Option<usize>,
        /// Revert every migration above this version (0 reverts all)
        #[arg(long)]
        to: Option<u32>,
    },
    /// Show which migrations are applied
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Show the columns of a table in the database
    Describe { table: String },
    /// Print the DDL a migration issues without touching the database
    Sql {
        version: u32,
        /// Print the revert statement instead
        #[arg(long)]
        down: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);
    commands::run(cli.command, &config)
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConfigLoader::new()?.load()?,
    };

    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }
    if let Some(format) = cli.log_format {
        config.log.format = format.into();
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_migrate_with_target() {
        let cli = Cli::try_parse_from(["tradebase", "migrate", "--to", "4"]).unwrap();
        assert_eq!(cli.command, Command::Migrate { to: Some(4) });
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tradebase",
            "status",
            "--json",
            "--database",
            "/tmp/accounts.db",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::Status { json: true });
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/accounts.db")));
        assert_eq!(cli.log_format, Some(LogFormatArg::Json));
    }

    #[test]
    fn rollback_steps_and_to_conflict() {
        let result = Cli::try_parse_from(["tradebase", "rollback", "--steps", "2", "--to", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_sql_down() {
        let cli = Cli::try_parse_from(["tradebase", "sql", "4", "--down"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Sql {
                version: 4,
                down: true
            }
        );
    }

    #[test]
    fn database_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yml");
        std::fs::write(&config_path, "database:\n  path: from-config.db\n").unwrap();

        let cli = Cli::try_parse_from([
            "tradebase",
            "--config",
            config_path.to_str().unwrap(),
            "--database",
            "from-flag.db",
            "config",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.database.path, PathBuf::from("from-flag.db"));
    }
}
