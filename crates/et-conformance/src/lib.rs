#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use et_runtime::{DecisionAction, EvidenceLedger, RuntimeMode, RuntimePolicy};
use examtally::{
    AggregateError, AttendanceRecord, Engine, Examination, Student, Subject, Tables,
    aggregate_with_policy,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        Self {
            fixture_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[derive(Debug, Clone)]
pub struct SuiteOptions {
    pub case_filter: Option<String>,
    pub engines: Vec<Engine>,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            case_filter: None,
            engines: Engine::all().to_vec(),
        }
    }
}

/// Failure a fixture expects instead of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedError {
    DuplicateStudents,
    DuplicateSubjects,
    CrossProductTooLarge,
}

impl ExpectedError {
    fn matches(self, error: &AggregateError) -> bool {
        matches!(
            (self, error),
            (Self::DuplicateStudents, AggregateError::DuplicateStudents { .. })
                | (Self::DuplicateSubjects, AggregateError::DuplicateSubjects { .. })
                | (
                    Self::CrossProductTooLarge,
                    AggregateError::CrossProductTooLarge { .. }
                )
        )
    }
}

/// One conformance case. Exactly one of `expected` and `expected_error` is
/// set; `expected_actions` optionally pins the ledger contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceFixture {
    pub case_id: String,
    pub mode: RuntimeMode,
    #[serde(default)]
    pub max_cross_rows: Option<usize>,
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    pub examinations: Vec<Examination>,
    #[serde(default)]
    pub expected: Option<Vec<AttendanceRecord>>,
    #[serde(default)]
    pub expected_error: Option<ExpectedError>,
    #[serde(default)]
    pub expected_actions: Option<Vec<DecisionAction>>,
}

impl AttendanceFixture {
    #[must_use]
    pub fn policy(&self) -> RuntimePolicy {
        RuntimePolicy {
            mode: self.mode,
            max_cross_rows: self.max_cross_rows,
        }
    }

    #[must_use]
    pub fn tables(&self) -> Tables {
        Tables::new(
            self.students.clone(),
            self.subjects.clone(),
            self.examinations.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: String,
    pub engine: Engine,
    pub mode: RuntimeMode,
    pub status: CaseStatus,
    pub mismatch: Option<String>,
    pub evidence_records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParityReport {
    pub suite: String,
    pub fixture_count: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<CaseResult>,
}

impl ParityReport {
    #[must_use]
    pub fn is_green(&self) -> bool {
        self.failed == 0 && self.fixture_count > 0
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("fixture {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("fixture format error: {0}")]
    FixtureFormat(String),
    #[error("no fixture matches case filter {0:?}")]
    UnknownCase(String),
    #[error("parity suite is not green: {failed} of {total} engine runs failed")]
    NotGreen { failed: usize, total: usize },
}

/// Replay every fixture under the configured root through each engine.
pub fn run_suite(
    config: &HarnessConfig,
    options: &SuiteOptions,
) -> Result<ParityReport, HarnessError> {
    let fixtures = load_fixtures(&config.fixture_root, options.case_filter.as_deref())?;
    if let (Some(case), true) = (options.case_filter.as_deref(), fixtures.is_empty()) {
        return Err(HarnessError::UnknownCase(case.to_owned()));
    }

    let mut results = Vec::with_capacity(fixtures.len() * options.engines.len());
    for fixture in &fixtures {
        for engine in &options.engines {
            results.push(run_fixture(fixture, *engine));
        }
    }

    let failed = results
        .iter()
        .filter(|result| matches!(result.status, CaseStatus::Fail))
        .count();
    let passed = results.len().saturating_sub(failed);

    Ok(ParityReport {
        suite: options
            .case_filter
            .as_deref()
            .map_or_else(|| "attendance".to_owned(), |case| format!("attendance:{case}")),
        fixture_count: fixtures.len(),
        passed,
        failed,
        results,
    })
}

pub fn enforce_green(report: &ParityReport) -> Result<(), HarnessError> {
    if report.is_green() {
        Ok(())
    } else {
        Err(HarnessError::NotGreen {
            failed: report.failed,
            total: report.results.len(),
        })
    }
}

#[must_use]
pub fn run_fixture(fixture: &AttendanceFixture, engine: Engine) -> CaseResult {
    let mut ledger = EvidenceLedger::new();
    let actual = aggregate_with_policy(&fixture.tables(), engine, &fixture.policy(), &mut ledger);
    let mismatch = compare(fixture, actual, &ledger).err();

    CaseResult {
        case_id: fixture.case_id.clone(),
        engine,
        mode: fixture.mode,
        status: if mismatch.is_none() {
            CaseStatus::Pass
        } else {
            CaseStatus::Fail
        },
        mismatch,
        evidence_records: ledger.len(),
    }
}

fn compare(
    fixture: &AttendanceFixture,
    actual: Result<Vec<AttendanceRecord>, AggregateError>,
    ledger: &EvidenceLedger,
) -> Result<(), String> {
    match (&fixture.expected, fixture.expected_error, actual) {
        (Some(expected), None, Ok(records)) => compare_records(expected, &records)?,
        (None, Some(expected), Err(error)) if expected.matches(&error) => {}
        (None, Some(expected), Err(error)) => {
            return Err(format!("expected {expected:?} error, got: {error}"));
        }
        (None, Some(expected), Ok(records)) => {
            return Err(format!(
                "expected {expected:?} error, got {} records",
                records.len()
            ));
        }
        (Some(_), None, Err(error)) => return Err(format!("unexpected error: {error}")),
        _ => return Err("fixture must set exactly one of expected / expected_error".to_owned()),
    }

    if let Some(expected_actions) = &fixture.expected_actions {
        let actions = ledger
            .records()
            .iter()
            .map(|record| record.action)
            .collect::<Vec<_>>();
        if &actions != expected_actions {
            return Err(format!(
                "ledger actions mismatch: actual={actions:?}, expected={expected_actions:?}"
            ));
        }
    }
    Ok(())
}

fn compare_records(
    expected: &[AttendanceRecord],
    actual: &[AttendanceRecord],
) -> Result<(), String> {
    if expected.len() != actual.len() {
        return Err(format!(
            "row count mismatch: actual={}, expected={}",
            actual.len(),
            expected.len()
        ));
    }
    for (row, (want, got)) in expected.iter().zip(actual).enumerate() {
        if want != got {
            return Err(format!("row {row} mismatch: actual={got:?}, expected={want:?}"));
        }
    }
    Ok(())
}

pub fn load_fixtures(
    root: &Path,
    case_filter: Option<&str>,
) -> Result<Vec<AttendanceFixture>, HarnessError> {
    let mut fixtures = Vec::new();
    for path in list_fixture_files(root)? {
        let fixture = load_fixture(&path)?;
        if case_filter.is_none_or(|case| fixture.case_id == case) {
            fixtures.push(fixture);
        }
    }
    fixtures.sort_by(|a, b| a.case_id.cmp(&b.case_id));
    Ok(fixtures)
}

fn load_fixture(path: &Path) -> Result<AttendanceFixture, HarnessError> {
    let body = fs::read_to_string(path)?;
    let fixture: AttendanceFixture =
        serde_json::from_str(&body).map_err(|source| HarnessError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    if fixture.expected.is_some() == fixture.expected_error.is_some() {
        return Err(HarnessError::FixtureFormat(format!(
            "{}: set exactly one of expected / expected_error",
            fixture.case_id
        )));
    }
    Ok(fixture)
}

fn list_fixture_files(root: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use et_runtime::RuntimeMode;
    use examtally::{AttendanceRecord, Engine, Examination, Student, Subject};

    use super::{
        AttendanceFixture, CaseStatus, ExpectedError, HarnessConfig, HarnessError, SuiteOptions,
        enforce_green, load_fixtures, run_fixture, run_suite,
    };

    fn fixture(case_id: &str) -> AttendanceFixture {
        AttendanceFixture {
            case_id: case_id.to_owned(),
            mode: RuntimeMode::Strict,
            max_cross_rows: None,
            students: vec![Student::new(1, "Alice")],
            subjects: vec![Subject::new("Math")],
            examinations: vec![Examination::new(1, "Math")],
            expected: Some(vec![AttendanceRecord {
                student_id: 1,
                student_name: "Alice".to_owned(),
                subject_name: "Math".to_owned(),
                attended_exams: 1,
            }]),
            expected_error: None,
            expected_actions: None,
        }
    }

    #[test]
    fn bundled_fixtures_are_green_on_every_engine() {
        let report =
            run_suite(&HarnessConfig::default_paths(), &SuiteOptions::default()).expect("suite");
        assert!(report.fixture_count >= 5, "expected bundled fixtures");
        assert_eq!(
            report.results.len(),
            report.fixture_count * Engine::all().len()
        );
        assert!(report.is_green(), "expected green report: {report:?}");
        enforce_green(&report).expect("green");
    }

    #[test]
    fn case_filter_runs_one_fixture() {
        let options = SuiteOptions {
            case_filter: Some("reference_example".to_owned()),
            engines: vec![Engine::Typed],
        };
        let report = run_suite(&HarnessConfig::default_paths(), &options).expect("suite");
        assert_eq!(report.suite, "attendance:reference_example");
        assert_eq!(report.fixture_count, 1);
        assert_eq!(report.passed, 1);
    }

    #[test]
    fn unknown_case_filter_is_an_error() {
        let options = SuiteOptions {
            case_filter: Some("no_such_case".to_owned()),
            ..SuiteOptions::default()
        };
        assert!(matches!(
            run_suite(&HarnessConfig::default_paths(), &options),
            Err(HarnessError::UnknownCase(_))
        ));
    }

    #[test]
    fn wrong_count_is_reported_as_mismatch() {
        let mut case = fixture("wrong_count");
        case.examinations.push(Examination::new(1, "Math"));

        let result = run_fixture(&case, Engine::Frame);
        assert_eq!(result.status, CaseStatus::Fail);
        assert!(
            result
                .mismatch
                .as_deref()
                .is_some_and(|m| m.contains("row 0 mismatch"))
        );
    }

    #[test]
    fn expected_error_passes_only_for_matching_failure() {
        let mut case = fixture("duplicates");
        case.students.push(Student::new(1, "Alias"));
        case.expected = None;
        case.expected_error = Some(ExpectedError::DuplicateStudents);
        assert_eq!(run_fixture(&case, Engine::Typed).status, CaseStatus::Pass);

        case.expected_error = Some(ExpectedError::CrossProductTooLarge);
        let result = run_fixture(&case, Engine::Typed);
        assert_eq!(result.status, CaseStatus::Fail);
        assert_eq!(result.evidence_records, 1);
    }

    #[test]
    fn fixture_without_expectation_is_rejected_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut case = fixture("no_expectation");
        case.expected = None;
        fs::write(
            dir.path().join("case.json"),
            serde_json::to_string(&case).expect("json"),
        )
        .expect("write");

        assert!(matches!(
            load_fixtures(dir.path(), None),
            Err(HarnessError::FixtureFormat(_))
        ));
    }

    #[test]
    fn empty_root_is_not_green() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HarnessConfig {
            fixture_root: dir.path().to_path_buf(),
        };
        let report = run_suite(&config, &SuiteOptions::default()).expect("suite");
        assert_eq!(report.fixture_count, 0);
        assert!(!report.is_green());
        assert!(enforce_green(&report).is_err());
    }
}
