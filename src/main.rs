use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pgscope::{ConnectionConfig, DEFAULT_ENV_PREFIX, PgDriver, PgScopeError, RowValues};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Probe and query PostgreSQL using PG_* environment settings")]
struct Args {
    /// Prefix of the connection environment variables
    #[arg(long, default_value = DEFAULT_ENV_PREFIX)]
    prefix: String,
    /// Load a `.env` file from the working directory first
    #[arg(long)]
    dotenv: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the database answers
    Ping,
    /// Run a query in an autocommit scope and print rows as JSON lines
    Query { sql: String, params: Vec<String> },
    /// Run a statement in a transaction and print the affected row count
    Exec { sql: String, params: Vec<String> },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode, PgScopeError> {
    let config = if args.dotenv {
        ConnectionConfig::from_env_with_dotenv(&args.prefix)?
    } else {
        ConnectionConfig::from_env(&args.prefix)?
    };
    tracing::debug!(?config, "resolved connection config");
    let driver = PgDriver::new(config);

    match args.command {
        Command::Ping => {
            if driver.ping() {
                println!("ok");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("unreachable");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Query { sql, params } => {
            let params = text_params(params);
            let rows = driver.with_connection(|conn| conn.fetch_all(&sql, &params))?;
            for row in rows {
                let line = serde_json::to_string(&row).map_err(|e| PgScopeError::QueryError {
                    message: format!("cannot render row: {e}"),
                    code: None,
                })?;
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Exec { sql, params } => {
            let params = text_params(params);
            let affected = driver.transaction(|tx| tx.execute(&sql, &params))?;
            println!("{affected}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn text_params(params: Vec<String>) -> Vec<RowValues> {
    params.into_iter().map(RowValues::Text).collect()
}
