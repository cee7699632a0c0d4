//! rf2-reconcile CLI: stated/inferred relationship reconciliation.

use std::io::BufRead;
use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};

use rf2_reconcile::engine::Reconciler;
use rf2_reconcile::relationship::SctId;
use rf2_reconcile::rf2;

#[derive(Parser)]
#[command(
    name = "rf2-reconcile",
    version,
    about = "Reconcile a stated SNOMED CT relationship file against the inferred view"
)]
struct Cli {
    /// Stated relationship file (RF2).
    stated: PathBuf,

    /// Inferred relationship file (RF2).
    inferred: PathBuf,

    /// Output file path (substitution mode; must contain an 8-digit
    /// effective date), or a concept SCTID (lookup mode).
    target: String,

    /// Enter an interactive lookup loop after processing.
    #[arg(short = 'i', long)]
    interactive: bool,

    /// RF2 description file, used to print concepts as `id|term|`.
    #[arg(long)]
    descriptions: Option<PathBuf>,

    /// Write a JSON run report to this path (substitution mode only).
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // A numeric third argument asks for a concept lookup; anything else is
    // an output path and triggers substitution.
    match cli.target.parse::<u64>().ok().and_then(SctId::new) {
        Some(concept) => {
            let reconciler =
                Reconciler::load(&cli.stated, &cli.inferred, cli.descriptions.as_deref())?;
            reconciler.lookup(concept);
            if cli.interactive {
                interactive(&reconciler)?;
            }
        }
        None => {
            // Fail on a bad output path before loading anything.
            let effective_time = rf2::extract_effective_time(&cli.target)?;
            let mut reconciler =
                Reconciler::load(&cli.stated, &cli.inferred, cli.descriptions.as_deref())?;
            let report =
                reconciler.substitute(std::path::Path::new(&cli.target), &effective_time)?;
            if let Some(path) = &cli.report {
                report.write_json(path)?;
                println!("wrote run report to {}", path.display());
            }
            if cli.interactive {
                interactive(&reconciler)?;
            }
        }
    }

    Ok(())
}

/// Read concept ids from stdin, dumping both views for each, until EOF or
/// "quit".
fn interactive(reconciler: &Reconciler) -> Result<()> {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        println!("Enter source concept sctid: ");
        line.clear();
        let read = stdin.lock().read_line(&mut line).into_diagnostic()?;
        if read == 0 {
            break;
        }
        let input = line.trim();
        if input == "quit" {
            break;
        }
        match input.parse::<u64>().ok().and_then(SctId::new) {
            Some(concept) => reconciler.lookup(concept),
            None => tracing::warn!("not a concept sctid: {input}"),
        }
    }
    Ok(())
}
