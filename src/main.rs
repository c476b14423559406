use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use crash_debugger::config::ErrorType;
use crash_debugger::dap;
use crash_debugger::logging::init_logging;
use crash_debugger::parser::{parse_crash, CrashInfo, Table, Value};

#[derive(Parser, Debug)]
#[command(author, version, about = "Debug adapter for WoW addon crash dumps")]
struct Args {
    /// Parse a crash file and print it instead of serving the debug adapter.
    #[arg(long, value_name = "FILE")]
    dump: Option<PathBuf>,

    /// Crash file layout used with --dump.
    #[arg(long, value_enum, default_value_t = ErrorType::Blizzard)]
    error_type: ErrorType,

    /// Write adapter logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level, args.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = match &args.dump {
        Some(path) => run_dump_mode(path, args.error_type),
        None => dap::run_dap_mode(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting with error");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_dump_mode(path: &Path, error_type: ErrorType) -> io::Result<()> {
    let text = fs::read_to_string(path)?;
    let crash = parse_crash(&text, error_type.interpreter().as_ref())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    print_crash(&crash);
    Ok(())
}

fn print_crash(crash: &CrashInfo) {
    println!("=== Error ===");
    println!("{}", crash.error_message);

    println!("\n=== Call Stack ({} frames) ===", crash.frames.len());
    for (i, frame) in crash.frames.iter().enumerate() {
        let location = match &frame.source_path {
            Some(path) if frame.line > 0 => format!("{path}:{}", frame.line),
            Some(path) => path.clone(),
            None => frame.raw_location_label.clone(),
        };
        println!("  #{i}: {} ({location})", frame.display_name);
        print_table(&frame.locals, 2);
    }

    if !crash.log_lines.is_empty() {
        println!("\n=== Debug Log ===");
        for line in &crash.log_lines {
            println!("  {line}");
        }
    }
}

fn print_table(table: &Table, depth: usize) {
    let indent = "  ".repeat(depth);
    for (key, value) in table.iter() {
        println!("{indent}{key} = {value}");
        if let Value::Table(child) = value {
            print_table(child, depth + 1);
        }
    }
}
