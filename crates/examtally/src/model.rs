use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Student {
    pub student_id: i64,
    pub student_name: String,
}

impl Student {
    #[must_use]
    pub fn new(student_id: i64, student_name: impl Into<String>) -> Self {
        Self {
            student_id,
            student_name: student_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub subject_name: String,
}

impl Subject {
    #[must_use]
    pub fn new(subject_name: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
        }
    }
}

/// One exam attendance event. Neither side has to reference an existing
/// student or subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Examination {
    pub student_id: i64,
    pub subject_name: String,
}

impl Examination {
    #[must_use]
    pub fn new(student_id: i64, subject_name: impl Into<String>) -> Self {
        Self {
            student_id,
            subject_name: subject_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: i64,
    pub student_name: String,
    pub subject_name: String,
    pub attended_exams: u64,
}

impl AttendanceRecord {
    #[must_use]
    pub fn new(student: &Student, subject: &Subject, attended_exams: u64) -> Self {
        Self {
            student_id: student.student_id,
            student_name: student.student_name.clone(),
            subject_name: subject.subject_name.clone(),
            attended_exams,
        }
    }
}
