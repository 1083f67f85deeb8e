#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use examtally::{Engine, OutputFormat, RunConfig, RuntimeMode, run};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct CliArgs {
    config: RunConfig,
    ledger: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("examtally error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_cli() -> Result<(), String> {
    let args = parse_args()?;
    let report = run(&args.config).map_err(|error| error.to_string())?;
    print!("{}", report.output);

    if let Some(path) = args.ledger.as_deref() {
        let json = report
            .ledger
            .to_json_pretty()
            .map_err(|error| error.to_string())?;
        fs::write(path, json)
            .map_err(|error| format!("cannot write ledger {}: {error}", path.display()))?;
        tracing::info!(path = %path.display(), decisions = report.ledger.len(), "ledger written");
    }

    Ok(())
}

fn parse_args() -> Result<CliArgs, String> {
    let mut data_dir = PathBuf::from(".");
    let mut students = None;
    let mut subjects = None;
    let mut examinations = None;
    let mut engine = Engine::default();
    let mut format = OutputFormat::default();
    let mut mode = RuntimeMode::Strict;
    let mut max_cross_rows = None;
    let mut ledger = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data-dir" => data_dir = PathBuf::from(value(&mut args, "--data-dir", "a path")?),
            "--students" => {
                students = Some(PathBuf::from(value(&mut args, "--students", "a path")?));
            }
            "--subjects" => {
                subjects = Some(PathBuf::from(value(&mut args, "--subjects", "a path")?));
            }
            "--examinations" => {
                examinations = Some(PathBuf::from(value(&mut args, "--examinations", "a path")?));
            }
            "--engine" => {
                engine = value(&mut args, "--engine", "typed, frame or sql")?
                    .parse()
                    .map_err(|error: examtally::AggregateError| error.to_string())?;
            }
            "--format" => {
                format = value(&mut args, "--format", "table, csv or json")?
                    .parse()
                    .map_err(|error: examtally::AggregateError| error.to_string())?;
            }
            "--mode" => {
                mode = value(&mut args, "--mode", "strict or hardened")?
                    .parse()
                    .map_err(|error: et_runtime::RuntimeError| error.to_string())?;
            }
            "--max-cross-rows" => {
                let raw = value(&mut args, "--max-cross-rows", "a row count")?;
                let cap = raw
                    .parse::<usize>()
                    .map_err(|_| format!("--max-cross-rows expects a row count, got {raw:?}"))?;
                max_cross_rows = Some(cap);
            }
            "--ledger" => ledger = Some(PathBuf::from(value(&mut args, "--ledger", "a path")?)),
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    let mut config = RunConfig::with_data_dir(&data_dir);
    if let Some(path) = students {
        config.students = path;
    }
    if let Some(path) = subjects {
        config.subjects = path;
    }
    if let Some(path) = examinations {
        config.examinations = path;
    }
    config.engine = engine;
    config.format = format;
    config.policy.mode = mode;
    config.policy.max_cross_rows = max_cross_rows;

    Ok(CliArgs { config, ledger })
}

fn value(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
    what: &str,
) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{flag} requires {what}"))
}

fn print_help() {
    println!(
        "examtally\n\
         Usage:\n\
         \texamtally [--data-dir <dir>] [--engine typed|frame|sql] [--format table|csv|json]\n\
         \t          [--mode strict|hardened] [--max-cross-rows <n>] [--ledger <path>]\n\
         Options:\n\
         \t--data-dir <dir>         directory holding the three CSV tables (default: .)\n\
         \t--students <path>        students table, overrides the data dir\n\
         \t--subjects <path>        subjects table, overrides the data dir\n\
         \t--examinations <path>    examinations table, overrides the data dir\n\
         \t--engine <name>          typed (default), frame or sql\n\
         \t--format <name>          table (default), csv or json\n\
         \t--mode <mode>            strict (default) or hardened (keep first duplicate)\n\
         \t--max-cross-rows <n>     refuse cross products larger than n rows\n\
         \t--ledger <path>          write policy decisions as JSON\n\
         \t-h, --help               show this help\n\
         Logging is controlled by RUST_LOG (default: warn)."
    );
}
