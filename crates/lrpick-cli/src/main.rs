//! `lrpick`: pick random strings from stdin, favouring the least recently
//! picked, with recency state kept in a RocksDB directory between runs.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lrpick::{PersistentPicker, Result};
use unicode_width::UnicodeWidthStr;

#[derive(Parser)]
#[command(name = "lrpick")]
#[command(about = "Selects random strings from stdin, favouring the least recently picked")]
struct Cli {
    /// Directory of the database holding persistent state between runs.
    #[arg(long, value_name = "DIR")]
    db: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,

    /// Number of strings to pick after ingesting stdin.
    #[arg(value_name = "N")]
    num: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Read strings from stdin and delete everything else from the database.
    Clean,
    /// Print every stored string with its generation.
    Dump,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let num = match (&cli.command, cli.num) {
        (None, None) => {
            eprintln!("lrpick: specify the number of strings to pick");
            return ExitCode::from(2);
        }
        (_, num) => num,
    };

    match run(&cli, num) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lrpick: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli, num: Option<usize>) -> Result<()> {
    let picker = PersistentPicker::open(&cli.db)?;

    match cli.command {
        Some(Command::Clean) => {
            ingest_stdin(&picker)?;
            picker.clean_db()?;
        }
        Some(Command::Dump) => {
            for line in render_dump(&picker.dump_db()?) {
                println!("{line}");
            }
        }
        None => {
            // Checked in main; the positional is present on this path.
            let num = num.unwrap_or_default();
            ingest_stdin(&picker)?;
            for key in picker.try_unique_n(num)? {
                println!("{key}");
            }
        }
    }

    picker.close()
}

/// Feeds every stdin line into the picker. Keys already known to the
/// database come back with their stored recency.
fn ingest_stdin(picker: &PersistentPicker) -> Result<()> {
    let mut keys = Vec::new();
    for line in io::stdin().lock().lines() {
        keys.push(line?);
    }
    picker.add_all(&keys)
}

/// Formats dump entries as `<key> | <generation>` with every key padded to
/// the widest key's display width.
fn render_dump(entries: &[(String, i64)]) -> Vec<String> {
    let width = entries
        .iter()
        .map(|(key, _)| UnicodeWidthStr::width(key.as_str()))
        .fold(1, usize::max);

    entries
        .iter()
        .map(|(key, generation)| {
            let padding = " ".repeat(width - UnicodeWidthStr::width(key.as_str()));
            format!("{key}{padding} | {generation}")
        })
        .collect()
}
