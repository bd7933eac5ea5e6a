#![forbid(unsafe_code)]

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pairrank::{scan_items, Scheduler};

#[derive(Parser)]
#[command(name = "pairrank", version, about = "Pairwise image ranking scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the comparable images under a directory
    Scan {
        dir: PathBuf,
    },
    /// Run an interactive comparison session
    Rank {
        dir: PathBuf,
        /// Comparison history CSV to merge before starting
        #[arg(long)]
        import: Option<PathBuf>,
        /// Append the imported log instead of replacing current history
        #[arg(long, default_value_t = false)]
        append: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan { dir } => {
            let outcome = scan_items(&dir, &Default::default(), None);
            for item in &outcome.items {
                println!("{item}");
            }
            if !outcome.complete {
                eprintln!("(scan incomplete)");
            }
            eprintln!("{} image(s)", outcome.items.len());
        }
        Commands::Rank { dir, import, append } => {
            let scheduler: Scheduler = Scheduler::open(&dir)?;
            if let Some(path) = import {
                let log = std::fs::read_to_string(&path)?;
                scheduler.import_history(&log, append)?;
                eprintln!("imported {}", path.display());
            }
            run_session(&scheduler)?;
        }
    }
    Ok(())
}

fn run_session(scheduler: &Scheduler) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    eprintln!("commands: 1/2 pick winner, x1/x2 pick winner and exclude loser,");
    eprintln!("          s smart shuffle, r rankings, q quit");

    loop {
        let Some(drawn) = scheduler.next_pair()? else {
            eprintln!("all comparisons completed");
            break;
        };
        println!(
            "[{}/{}]\n  1: {}\n  2: {}",
            drawn.progress.completed, drawn.progress.total, drawn.first, drawn.second
        );
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        match line?.trim() {
            "1" => scheduler.record_outcome(&drawn.first, &drawn.second, false)?,
            "2" => scheduler.record_outcome(&drawn.second, &drawn.first, false)?,
            "x1" => scheduler.record_outcome(&drawn.first, &drawn.second, true)?,
            "x2" => scheduler.record_outcome(&drawn.second, &drawn.first, true)?,
            "s" => scheduler.reorder()?,
            "r" => print_rankings(scheduler)?,
            "q" => break,
            other => eprintln!("unrecognized input: {other}"),
        }
    }

    print_rankings(scheduler)?;
    let paths = scheduler.snapshot_now()?;
    eprintln!("saved {}", paths.ratings.display());
    eprintln!("saved {}", paths.history.display());
    Ok(())
}

fn print_rankings(scheduler: &Scheduler) -> Result<(), Box<dyn std::error::Error>> {
    for (rank, row) in scheduler.rankings()?.iter().enumerate() {
        let flag = if row.excluded { " (excluded)" } else { "" };
        println!(
            "{:>3}. {:<50} {:>7.2} ±{:>5.2}  {}▲ {}▼{}",
            rank + 1,
            row.item,
            row.mean,
            row.uncertainty,
            row.upvotes,
            row.downvotes,
            flag
        );
    }
    Ok(())
}
