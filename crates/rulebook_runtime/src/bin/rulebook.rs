//! Rulebook CLI entry point.
//!
//! Inspects working-memory snapshots written by `rulebook_runtime`.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use rulebook_runtime::{Snapshot, read_file};

/// CLI configuration parsed from arguments.
#[derive(Default)]
struct CliConfig {
    command: Option<String>,
    files: Vec<PathBuf>,
    show_help: bool,
    show_version: bool,
    facts_only: bool,
    template: Option<String>,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut config = CliConfig::default();

    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "--facts" => config.facts_only = true,
            "--template" => {
                let name = args.next().ok_or("--template requires a value")?;
                config.template = Some(name);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}").into());
            }
            _ if config.command.is_none() => config.command = Some(arg),
            _ => config.files.push(PathBuf::from(arg)),
        }
    }

    Ok(config)
}

fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_args(args)?;

    if config.show_help {
        print_help();
        return Ok(());
    }

    if config.show_version {
        println!("rulebook {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match config.command.as_deref() {
        Some("inspect") => {
            if config.files.is_empty() {
                return Err("inspect requires at least one snapshot file".into());
            }
            for path in &config.files {
                let snapshot = read_file(path)?;
                println!(";; {}", path.display());
                print_snapshot(&snapshot, &config);
            }
            Ok(())
        }
        Some(other) => Err(format!("unknown command: {other}").into()),
        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_snapshot(snapshot: &Snapshot, config: &CliConfig) {
    if !config.facts_only {
        for template in &snapshot.templates {
            let slots: Vec<&str> = template.slots.iter().map(|s| s.name.as_ref()).collect();
            println!("(deftemplate {} {})", template.name, slots.join(" "));
        }
        for (name, value) in &snapshot.globals {
            println!("(defglobal ?*{name}* = {value})");
        }
    }

    let facts = snapshot.facts.iter().filter(|f| match &config.template {
        Some(name) => f.template.as_deref() == Some(name.as_str()),
        None => true,
    });
    let mut count = 0;
    for fact in facts {
        println!("{fact}");
        count += 1;
    }
    println!("For a total of {count} facts.");
}

fn print_help() {
    println!(
        "rulebook {}

USAGE:
    rulebook inspect [OPTIONS] <FILES>...

OPTIONS:
    --facts              Print facts only
    --template <NAME>    Only print facts of one template
    -h, --help           Print this help
    -V, --version        Print version",
        env!("CARGO_PKG_VERSION")
    );
}
