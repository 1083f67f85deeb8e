#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    Strict,
    Hardened,
}

impl FromStr for RuntimeMode {
    type Err = RuntimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "strict" => Ok(Self::Strict),
            "hardened" => Ok(Self::Hardened),
            other => Err(RuntimeError::UnknownMode(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Allow,
    Reject,
    Repair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MalformedInput,
    JoinCardinality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityIssue {
    pub kind: IssueKind,
    pub subject: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts_unix_ms: u64,
    pub mode: RuntimeMode,
    pub action: DecisionAction,
    pub issue: CompatibilityIssue,
}

impl fmt::Display for DecisionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {}::{:?} ({:?}): {}",
            self.mode, self.issue.subject, self.action, self.issue.kind, self.issue.detail
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLedger {
    records: Vec<DecisionRecord>,
}

impl EvidenceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: DecisionRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String, RuntimeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// How the execution layer reacts to malformed dimension tables and to
/// cross products that would exceed the row budget.
///
/// Strict mode fails closed on duplicate dimension keys; hardened mode repairs
/// them by keeping the first occurrence. The row cap applies in both modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePolicy {
    pub mode: RuntimeMode,
    pub max_cross_rows: Option<usize>,
}

impl RuntimePolicy {
    #[must_use]
    pub fn strict() -> Self {
        Self {
            mode: RuntimeMode::Strict,
            max_cross_rows: None,
        }
    }

    #[must_use]
    pub fn hardened(max_cross_rows: Option<usize>) -> Self {
        Self {
            mode: RuntimeMode::Hardened,
            max_cross_rows,
        }
    }

    #[must_use]
    pub fn with_max_cross_rows(mut self, max_cross_rows: Option<usize>) -> Self {
        self.max_cross_rows = max_cross_rows;
        self
    }

    pub fn decide_dimension_duplicates(
        &self,
        table: impl Into<String>,
        duplicate_keys: usize,
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        let action = match self.mode {
            RuntimeMode::Strict => DecisionAction::Reject,
            RuntimeMode::Hardened => DecisionAction::Repair,
        };
        let issue = CompatibilityIssue {
            kind: IssueKind::MalformedInput,
            subject: table.into(),
            detail: format!("duplicate_keys={duplicate_keys}"),
        };
        self.record(issue, action, ledger)
    }

    pub fn decide_cross_admission(
        &self,
        estimated_rows: usize,
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        let cap = self.max_cross_rows.unwrap_or(usize::MAX);
        let action = if estimated_rows <= cap {
            DecisionAction::Allow
        } else {
            DecisionAction::Reject
        };
        let issue = CompatibilityIssue {
            kind: IssueKind::JoinCardinality,
            subject: "cross_join".to_owned(),
            detail: match self.max_cross_rows {
                Some(cap) => format!("estimated_rows={estimated_rows} cap={cap}"),
                None => format!("estimated_rows={estimated_rows} cap=none"),
            },
        };
        self.record(issue, action, ledger)
    }

    fn record(
        &self,
        issue: CompatibilityIssue,
        action: DecisionAction,
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        ledger.push(DecisionRecord {
            ts_unix_ms: now_unix_ms().unwrap_or_default(),
            mode: self.mode,
            action,
            issue,
        });
        action
    }
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self::strict()
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("system clock is before UNIX_EPOCH")]
    ClockSkew,
    #[error("unknown runtime mode {0:?} (expected strict or hardened)")]
    UnknownMode(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn now_unix_ms() -> Result<u64, RuntimeError> {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| RuntimeError::ClockSkew)?
        .as_millis();
    Ok(u64::try_from(ms).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::{DecisionAction, EvidenceLedger, IssueKind, RuntimeMode, RuntimePolicy};

    #[test]
    fn strict_mode_rejects_duplicate_dimension_keys() {
        let mut ledger = EvidenceLedger::new();
        let action =
            RuntimePolicy::strict().decide_dimension_duplicates("students", 2, &mut ledger);

        assert_eq!(action, DecisionAction::Reject);
        assert_eq!(ledger.len(), 1);
        let record = &ledger.records()[0];
        assert_eq!(record.mode, RuntimeMode::Strict);
        assert_eq!(record.issue.kind, IssueKind::MalformedInput);
        assert_eq!(record.issue.detail, "duplicate_keys=2");
    }

    #[test]
    fn hardened_mode_repairs_duplicate_dimension_keys() {
        let mut ledger = EvidenceLedger::new();
        let action =
            RuntimePolicy::hardened(None).decide_dimension_duplicates("subjects", 1, &mut ledger);
        assert_eq!(action, DecisionAction::Repair);
    }

    #[test]
    fn cross_admission_respects_cap_in_every_mode() {
        let mut ledger = EvidenceLedger::new();
        let capped = RuntimePolicy::hardened(Some(10));

        assert_eq!(
            capped.decide_cross_admission(10, &mut ledger),
            DecisionAction::Allow
        );
        assert_eq!(
            capped.decide_cross_admission(11, &mut ledger),
            DecisionAction::Reject
        );
        assert_eq!(
            RuntimePolicy::strict()
                .with_max_cross_rows(Some(4))
                .decide_cross_admission(5, &mut ledger),
            DecisionAction::Reject
        );
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.records()[1].issue.detail, "estimated_rows=11 cap=10");
    }

    #[test]
    fn uncapped_policy_admits_everything() {
        let mut ledger = EvidenceLedger::new();
        let action = RuntimePolicy::default().decide_cross_admission(usize::MAX, &mut ledger);
        assert_eq!(action, DecisionAction::Allow);
        assert_eq!(
            ledger.records()[0].issue.detail,
            format!("estimated_rows={} cap=none", usize::MAX)
        );
    }

    #[test]
    fn mode_parses_from_cli_spelling() {
        assert_eq!("strict".parse::<RuntimeMode>().expect("strict"), RuntimeMode::Strict);
        assert_eq!(
            "hardened".parse::<RuntimeMode>().expect("hardened"),
            RuntimeMode::Hardened
        );
        assert!("lenient".parse::<RuntimeMode>().is_err());
    }

    #[test]
    fn ledger_serializes_to_json() {
        let mut ledger = EvidenceLedger::new();
        RuntimePolicy::strict().decide_cross_admission(4, &mut ledger);
        let json = ledger.to_json_pretty().expect("json");
        assert!(json.contains("\"join_cardinality\""));
        assert!(json.contains("\"allow\""));
    }
}
