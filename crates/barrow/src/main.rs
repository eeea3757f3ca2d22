use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lloggs::LoggingArgs;
use tracing::debug;

use barrow::{Config, Db};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "barrow")]
#[command(about = "Deduplicating, encrypted, multi-destination backup engine")]
struct Args {
    /// Path to the metadata database (default: $BARROW_DB or ~/.barrow.db)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Cat(commands::cat::CatArgs),
    Paranoia(commands::paranoia::ParanoiaArgs),
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let _guard = args.logging.setup(|v| match v {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })?;

    let config = Config::resolve(args.db);
    debug!(db = ?config.database_path, "opening metadata database");
    let mut db = Db::open(&config.database_path)?;

    match args.command {
        Command::Cat(cat_args) => commands::cat::run(&mut db, cat_args),
        Command::Paranoia(paranoia_args) => commands::paranoia::run(&db, paranoia_args),
    }
}
