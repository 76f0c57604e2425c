//! imshelf - filesystem reference shelf
//!
//! Stores each bibliographic reference as a directory holding one
//! `reference.bib` plus its attachments. `import` merges an external
//! bibliography export into the store; `export` aggregates selected
//! references back into merged bibliography files.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use imshelf_core::{
    find, import_file, latest_in_watch_dir, place, run_export, run_exports, Config, ExportReport,
    ImportReport, RefPath, Store, TransferMode,
};

#[derive(Parser)]
#[command(name = "imshelf", about = "Filesystem reference shelf", version)]
struct Cli {
    /// Config and default store directory (default: ~/.imshelf)
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a bulk bibliography file into the store
    Import {
        /// Bibliography file with collection/file annotations
        file: PathBuf,
        /// Attachment transfer mode: ln, cp, or mv
        #[arg(long)]
        mode: Option<TransferMode>,
    },
    /// Run one named export, or all configured exports
    Export {
        /// Export name from the config; omit to run every export
        name: Option<String>,
    },
    /// Create a new reference from a record file
    New {
        /// Reference path, e.g. cs/ai_books/sutton_barto
        path: String,
        /// Record file to read; the interactive editor flow lives outside
        /// this binary
        #[arg(long = "from", value_name = "FILE")]
        from: PathBuf,
        /// Attachment file; with no value, the newest file in the watch
        /// directory is used
        #[arg(long, num_args = 0..=1, default_missing_value = "", value_name = "FILE")]
        attach: Option<String>,
    },
    /// Search record text for a query string
    Find { query: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_dir = cli.config_dir.unwrap_or_else(Config::default_dir);
    let config = Config::load(&config_dir)?;
    let store = Store::new(&config.store_root, &config.storage_format);

    match cli.command {
        Command::Import { file, mode } => {
            let mode = mode.unwrap_or(config.attachment_mode);
            let report = import_file(&store, &file, mode)?;
            print_import_report(&report);
            if !report.failures.is_empty() {
                return Err(format!("{} reference(s) failed", report.failures.len()).into());
            }
        }
        Command::Export { name } => {
            let failed = match name {
                Some(name) => {
                    let spec = config
                        .exports
                        .get(&name)
                        .ok_or_else(|| format!("no export named `{name}` in config"))?;
                    let report = run_export(&store, spec)?;
                    print_export_report(&name, &report);
                    0
                }
                None => {
                    let results = run_exports(&store, &config.exports);
                    let mut failed = 0;
                    for (name, result) in &results {
                        match result {
                            Ok(report) => print_export_report(name, report),
                            Err(err) => {
                                eprintln!("export {name} failed: {err}");
                                failed += 1;
                            }
                        }
                    }
                    failed
                }
            };
            if failed > 0 {
                return Err(format!("{failed} export(s) failed").into());
            }
        }
        Command::New { path, from, attach } => {
            let path = RefPath::new(&path)?;
            let text = fs::read_to_string(&from)
                .map_err(|e| format!("failed to read {}: {e}", from.display()))?;
            // Validate before anything lands in the store
            imshelf_bibtex::parse(&text)?;
            store.create(&path, &text)?;

            if let Some(attach) = attach {
                let source = if attach.is_empty() {
                    let latest = latest_in_watch_dir(&config.watch_dir())?;
                    println!("Attaching newest watched file: {}", latest.display());
                    latest
                } else {
                    PathBuf::from(attach)
                };
                let report = place(&[source], &store.dir(&path), config.attachment_mode);
                for failure in &report.failed {
                    eprintln!(
                        "failed to attach {}: {}",
                        failure.source.display(),
                        failure.error
                    );
                }
                if !report.is_clean() {
                    return Err("attachment failed".into());
                }
            }
            println!("Created reference: {path}");

            // Keep configured exports in step with the store
            for (name, result) in run_exports(&store, &config.exports) {
                if let Err(err) = result {
                    eprintln!("export {name} failed: {err}");
                }
            }
        }
        Command::Find { query } => {
            let results = find(&store, &query)?;
            if results.is_empty() {
                println!("No matches found");
            } else {
                for found in results {
                    println!("\nReference: {}", found.path);
                    println!("{}", "-".repeat(40));
                    println!("{}", found.content.trim_end());
                }
            }
        }
    }

    Ok(())
}

fn print_import_report(report: &ImportReport) {
    println!(
        "Imported {} reference(s), {} attachment(s)",
        report.written.len(),
        report.attachments
    );
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    for failure in &report.failures {
        println!("failed: {}: {}", failure.path, failure.error);
    }
}

fn print_export_report(name: &str, report: &ExportReport) {
    println!(
        "Export {name}: {} reference(s) -> {}",
        report.exported.len(),
        report.destination.display()
    );
    for (path, reason) in &report.skipped {
        println!("warning: skipped {path}: {reason}");
    }
}
