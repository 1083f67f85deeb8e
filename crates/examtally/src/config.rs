use std::path::{Path, PathBuf};

use et_runtime::{EvidenceLedger, RuntimePolicy};

use crate::aggregate::aggregate_with_policy;
use crate::engine::Engine;
use crate::error::AggregateError;
use crate::model::AttendanceRecord;
use crate::render::{OutputFormat, render};
use crate::tables::{EXAMINATIONS_FILE, STUDENTS_FILE, SUBJECTS_FILE, Tables};

/// Everything one aggregation run needs: where the tables live, which engine
/// computes the report, how it is rendered and which policy vets the input.
///
/// The default reads the three CSV files from the working directory with the
/// typed engine, table output and the strict policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub students: PathBuf,
    pub subjects: PathBuf,
    pub examinations: PathBuf,
    pub engine: Engine,
    pub format: OutputFormat,
    pub policy: RuntimePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::with_data_dir(Path::new("."))
    }
}

impl RunConfig {
    #[must_use]
    pub fn with_data_dir(dir: &Path) -> Self {
        Self {
            students: dir.join(STUDENTS_FILE),
            subjects: dir.join(SUBJECTS_FILE),
            examinations: dir.join(EXAMINATIONS_FILE),
            engine: Engine::default(),
            format: OutputFormat::default(),
            policy: RuntimePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<AttendanceRecord>,
    pub output: String,
    pub ledger: EvidenceLedger,
}

/// Load, vet, aggregate and render. The ledger is returned even when it is
/// empty so callers can persist it unconditionally.
pub fn run(config: &RunConfig) -> Result<RunReport, AggregateError> {
    let tables = Tables::from_paths(&config.students, &config.subjects, &config.examinations)?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        students = tables.students.len(),
        subjects = tables.subjects.len(),
        examinations = tables.examinations.len(),
        engine = %config.engine,
        "tables loaded"
    );

    let mut ledger = EvidenceLedger::new();
    let records = aggregate_with_policy(&tables, config.engine, &config.policy, &mut ledger)?;
    let output = render(&records, config.format)?;
    Ok(RunReport {
        records,
        output,
        ledger,
    })
}
