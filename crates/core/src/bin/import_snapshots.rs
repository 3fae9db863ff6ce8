//! Import snapshot JSON files from disk into the analytics database
//!
//! Scans `<root>/<player>/<timestamp>.json` archives produced by the
//! snapshot agent. Idempotent: snapshot ids already in the database are
//! skipped.

use std::path::PathBuf;

use clap::Parser;

use osrs_tracker_core::ingest::import_snapshot_dir;
use osrs_tracker_core::Database;

#[derive(Parser)]
#[command(about = "Import snapshot JSON files into the database")]
struct Args {
    /// Root directory of snapshot JSON files
    #[arg(long, default_value = "data/snapshots")]
    root: PathBuf,

    /// Path to the SQLite database
    #[arg(long, default_value = "data/analytics.db")]
    db_path: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut db = match Database::open(&args.db_path) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("Failed to open database {}: {}", args.db_path.display(), err);
            std::process::exit(1);
        }
    };

    match import_snapshot_dir(&mut db, &args.root) {
        Ok(stats) => {
            println!("Accounts added:   {}", stats.accounts);
            println!("Snapshots added:  {}", stats.snapshots);
            println!("Skills added:     {}", stats.skills);
            println!("Activities added: {}", stats.activities);
            println!("Skipped (existing/invalid): {}", stats.skipped);
        }
        Err(err) => {
            eprintln!("Import failed: {}", err);
            std::process::exit(1);
        }
    }
}
