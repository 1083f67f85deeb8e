use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use et_index::{Index, IndexLabel};
use et_runtime::{DecisionAction, EvidenceLedger, RuntimePolicy};

use crate::engine::Engine;
use crate::error::AggregateError;
use crate::model::{AttendanceRecord, Examination, Student, Subject};
use crate::tables::Tables;

/// Count exams for every (student, subject) pair, zero when there are none.
///
/// One pass tallies `examinations` by `(student_id, subject_name)`; the
/// students × subjects product is then enumerated and each pair looks up its
/// tally. Examination rows naming an unknown student or subject never match
/// a pair and are ignored. The result is ordered by `student_id` then
/// `subject_name` and has exactly `students.len() * subjects.len()` rows.
#[must_use]
pub fn aggregate(
    students: &[Student],
    subjects: &[Subject],
    examinations: &[Examination],
) -> Vec<AttendanceRecord> {
    let mut tally = HashMap::<(i64, &str), u64>::with_capacity(examinations.len());
    for exam in examinations {
        *tally
            .entry((exam.student_id, exam.subject_name.as_str()))
            .or_insert(0) += 1;
    }

    let mut records = Vec::with_capacity(students.len().saturating_mul(subjects.len()));
    for student in students {
        for subject in subjects {
            let attended = tally
                .get(&(student.student_id, subject.subject_name.as_str()))
                .copied()
                .unwrap_or(0);
            records.push(AttendanceRecord::new(student, subject, attended));
        }
    }

    records.sort_by(|left, right| {
        left.student_id
            .cmp(&right.student_id)
            .then_with(|| left.subject_name.cmp(&right.subject_name))
    });

    #[cfg(feature = "tracing")]
    tracing::debug!(
        students = students.len(),
        subjects = subjects.len(),
        examinations = examinations.len(),
        tally_keys = tally.len(),
        rows = records.len(),
        "aggregate"
    );

    records
}

/// Run `engine` over `tables` after the runtime policy has vetted them.
///
/// Duplicate dimension keys are rejected in strict mode and reduced to their
/// first occurrence in hardened mode. The cross product size is then checked
/// against the policy's row cap. Each decision is appended to `ledger`.
pub fn aggregate_with_policy(
    tables: &Tables,
    engine: Engine,
    policy: &RuntimePolicy,
    ledger: &mut EvidenceLedger,
) -> Result<Vec<AttendanceRecord>, AggregateError> {
    let students = admit_dimension(
        "students",
        &tables.students,
        |student| IndexLabel::Int64(student.student_id),
        policy,
        ledger,
    )
    .map_err(|labels| AggregateError::DuplicateStudents {
        ids: labels
            .into_iter()
            .filter_map(|label| match label {
                IndexLabel::Int64(id) => Some(id),
                IndexLabel::Utf8(_) => None,
            })
            .collect(),
    })?;

    let subjects = admit_dimension(
        "subjects",
        &tables.subjects,
        |subject| IndexLabel::Utf8(subject.subject_name.clone()),
        policy,
        ledger,
    )
    .map_err(|labels| AggregateError::DuplicateSubjects {
        names: labels.into_iter().map(|label| label.to_string()).collect(),
    })?;

    let rows = students
        .len()
        .checked_mul(subjects.len())
        .unwrap_or(usize::MAX);
    if policy.decide_cross_admission(rows, ledger) == DecisionAction::Reject {
        return Err(AggregateError::CrossProductTooLarge {
            rows,
            cap: policy.max_cross_rows.unwrap_or(usize::MAX),
        });
    }

    engine.run(&students, &subjects, &tables.examinations)
}

/// Returns the admitted rows, or the duplicate labels when the policy rejects.
fn admit_dimension<'a, T: Clone>(
    table: &str,
    rows: &'a [T],
    label: impl Fn(&T) -> IndexLabel,
    policy: &RuntimePolicy,
    ledger: &mut EvidenceLedger,
) -> Result<Cow<'a, [T]>, Vec<IndexLabel>> {
    let index = Index::new(rows.iter().map(&label).collect());
    let duplicates = index.duplicate_labels();
    if duplicates.is_empty() {
        return Ok(Cow::Borrowed(rows));
    }

    match policy.decide_dimension_duplicates(table, duplicates.len(), ledger) {
        DecisionAction::Reject => Err(duplicates),
        DecisionAction::Allow | DecisionAction::Repair => {
            let mut seen = HashSet::with_capacity(rows.len());
            let kept = rows
                .iter()
                .zip(index.labels())
                .filter(|(_, key)| seen.insert(*key))
                .map(|(row, _)| row.clone())
                .collect::<Vec<_>>();

            #[cfg(feature = "tracing")]
            tracing::warn!(
                table,
                duplicate_keys = duplicates.len(),
                dropped = rows.len() - kept.len(),
                "kept first occurrence of duplicate keys"
            );

            Ok(Cow::Owned(kept))
        }
    }
}
