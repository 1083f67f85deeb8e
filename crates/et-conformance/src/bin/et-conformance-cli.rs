#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use et_conformance::{HarnessConfig, SuiteOptions, enforce_green, run_suite};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("et-conformance-cli error: {error}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = HarnessConfig::default_paths();
    let mut options = SuiteOptions::default();
    let mut require_green = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fixture-root" => {
                let value = args.next().ok_or("--fixture-root requires a path")?;
                config.fixture_root = PathBuf::from(value);
            }
            "--case" => {
                let value = args.next().ok_or("--case requires a case id")?;
                options.case_filter = Some(value);
            }
            "--require-green" => {
                require_green = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }

    let report = run_suite(&config, &options)?;
    for result in &report.results {
        println!(
            "case={} engine={} mode={:?} status={:?} evidence={}{}",
            result.case_id,
            result.engine,
            result.mode,
            result.status,
            result.evidence_records,
            result
                .mismatch
                .as_deref()
                .map(|mismatch| format!(" mismatch={mismatch}"))
                .unwrap_or_default()
        );
    }
    println!(
        "suite={} fixtures={} passed={} failed={} green={}",
        report.suite,
        report.fixture_count,
        report.passed,
        report.failed,
        report.is_green()
    );

    if require_green {
        enforce_green(&report)?;
    }
    Ok(())
}

fn print_help() {
    println!(
        "et-conformance-cli\n\
         Usage:\n\
         \tet-conformance-cli [--fixture-root <dir>] [--case <case_id>] [--require-green]\n\
         Options:\n\
         \t--fixture-root <dir>  directory of JSON fixtures (default: crate fixtures/)\n\
         \t--case <case_id>      run only one fixture case\n\
         \t--require-green       fail with non-zero exit when any engine run mismatches\n\
         \t-h, --help            show this help"
    );
}
