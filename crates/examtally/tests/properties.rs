use std::collections::BTreeSet;

use examtally::{Engine, Examination, Student, Subject, aggregate};
use proptest::prelude::*;

type Tables = (Vec<Student>, Vec<Subject>, Vec<Examination>);

fn tables() -> impl Strategy<Value = Tables> {
    (
        prop::collection::btree_set(-5i64..15, 0..6),
        prop::collection::btree_set("[a-cA]{1,2}", 0..5),
        prop::collection::vec((-5i64..15, "[a-cA]{1,2}"), 0..30),
    )
        .prop_map(|(ids, names, exams)| {
            let students = ids
                .into_iter()
                .rev()
                .map(|id| Student::new(id, format!("student{id}")))
                .collect();
            let subjects = names.into_iter().rev().map(Subject::new).collect();
            let examinations = exams
                .into_iter()
                .map(|(id, name)| Examination::new(id, name))
                .collect();
            (students, subjects, examinations)
        })
}

/// Pairs the generated tables with an independently shuffled copy of each.
fn tables_and_shuffled() -> impl Strategy<Value = (Tables, Tables)> {
    tables().prop_flat_map(|(students, subjects, exams)| {
        let shuffled = (
            Just(students.clone()).prop_shuffle(),
            Just(subjects.clone()).prop_shuffle(),
            Just(exams.clone()).prop_shuffle(),
        );
        (Just((students, subjects, exams)), shuffled)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_pair_appears_once_with_its_count(
        (students, subjects, exams) in tables(),
    ) {
        let out = aggregate(&students, &subjects, &exams);
        prop_assert_eq!(out.len(), students.len() * subjects.len());

        let pairs = out
            .iter()
            .map(|r| (r.student_id, r.subject_name.clone()))
            .collect::<BTreeSet<_>>();
        prop_assert_eq!(pairs.len(), out.len());

        for record in &out {
            let expected = exams
                .iter()
                .filter(|e| {
                    e.student_id == record.student_id && e.subject_name == record.subject_name
                })
                .count() as u64;
            prop_assert_eq!(record.attended_exams, expected);
        }
    }

    #[test]
    fn prop_output_is_sorted_and_order_independent(
        ((students, subjects, exams), (students_mixed, subjects_mixed, exams_mixed))
            in tables_and_shuffled(),
    ) {
        let out = aggregate(&students, &subjects, &exams);
        prop_assert!(out.windows(2).all(|w|
            (w[0].student_id, &w[0].subject_name) < (w[1].student_id, &w[1].subject_name)
        ));

        prop_assert_eq!(aggregate(&students_mixed, &subjects_mixed, &exams_mixed), out);
    }

    #[test]
    fn prop_engines_agree(
        (students, subjects, exams) in tables(),
    ) {
        let expected = aggregate(&students, &subjects, &exams);
        for engine in Engine::all() {
            let out = engine.run(&students, &subjects, &exams).expect("engine run");
            prop_assert_eq!(&out, &expected, "engine {}", engine);
        }
    }
}
