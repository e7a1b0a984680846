use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flatdb::error::Error;
use flatdb::row::Row;
use flatdb::table::Table;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "flatdb", version = VERSION, about = "Tiny disk-backed key/value store.")]
struct Cli {
    /// Path to the database file. Created if it doesn't exist.
    #[arg(env = "FLATDB_FILE", default_value = "flatdb.db")]
    db_file: String,

    /// Where to write structured logs.
    #[arg(long, env = "FLATDB_LOG_FILE", default_value = "flatdb.log")]
    log_file: String,
}

fn main() {
    let cli = Cli::parse();

    let log_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&cli.log_file)
        .expect("failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(&cli.db_file) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("fatal: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(db_file: &str) -> Result<(), Error> {
    info!(db_file, "opening table");
    let mut table = Table::open(db_file)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        print!("flatdb> ");
        stdout.flush().ok();

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed == ".exit" {
            break;
        }

        match handle_command(&mut table, trimmed) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                warn!(error = %e, "fatal error, exiting");
                return Err(e);
            }
            Err(e) => {
                println!("Error: {}", e);
            }
        }
    }

    table.close()?;
    Ok(())
}

fn handle_command(table: &mut Table, line: &str) -> Result<(), Error> {
    let mut parts = line.splitn(4, ' ');
    match parts.next().unwrap_or("") {
        "select" => {
            table.select_all(|row| {
                println!("({}, {}, {})", row.id, row.username, row.email);
            })?;
            Ok(())
        }
        "insert" => {
            let id_str = parts.next().ok_or_else(|| Error::Syntax("expected: insert <id> <username> <email>".into()))?;
            let username = parts.next().ok_or_else(|| Error::Syntax("expected: insert <id> <username> <email>".into()))?;
            let email = parts.next().ok_or_else(|| Error::Syntax("expected: insert <id> <username> <email>".into()))?;

            let signed_id: i64 = id_str.parse().map_err(|_| Error::Syntax(format!("invalid id: {}", id_str)))?;
            if signed_id < 0 {
                return Err(Error::NegativeId(signed_id));
            }
            let row = Row::new(signed_id as u32, username, email)?;
            table.insert(&row)?;
            println!("Executed.");
            Ok(())
        }
        other => Err(Error::Syntax(format!("unrecognized command: {}", other))),
    }
}
