use std::str::FromStr;

use et_io::{write_csv_string, write_json_records};
use serde::{Deserialize, Serialize};

use crate::error::AggregateError;
use crate::model::AttendanceRecord;
use crate::tables::{ATTENDED_EXAMS, STUDENT_ID, STUDENT_NAME, SUBJECT_NAME, records_frame};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = AggregateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(AggregateError::UnknownFormat(other.to_owned())),
        }
    }
}

pub fn render(
    records: &[AttendanceRecord],
    format: OutputFormat,
) -> Result<String, AggregateError> {
    match format {
        OutputFormat::Table => Ok(render_table(records)),
        OutputFormat::Csv => Ok(write_csv_string(&records_frame(records)?)?),
        OutputFormat::Json => {
            let mut json = write_json_records(&records_frame(records)?)?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Plain-text table: a header, a rule, then one line per record. Text columns
/// are left-aligned and numeric columns right-aligned.
#[must_use]
pub fn render_table(records: &[AttendanceRecord]) -> String {
    let rows = records
        .iter()
        .map(|record| {
            [
                record.student_id.to_string(),
                record.student_name.clone(),
                record.subject_name.clone(),
                record.attended_exams.to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let header = [STUDENT_ID, STUDENT_NAME, SUBJECT_NAME, ATTENDED_EXAMS];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = format!(
        "{:<w0$} | {:<w1$} | {:<w2$} | {:<w3$}\n",
        header[0],
        header[1],
        header[2],
        header[3],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    );
    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join("-+-");
    out.push_str(&rule);
    out.push('\n');
    for row in &rows {
        out.push_str(&format!(
            "{:>w0$} | {:<w1$} | {:<w2$} | {:>w3$}\n",
            row[0],
            row[1],
            row[2],
            row[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{OutputFormat, render, render_table};
    use crate::model::AttendanceRecord;

    fn record(id: i64, name: &str, subject: &str, count: u64) -> AttendanceRecord {
        AttendanceRecord {
            student_id: id,
            student_name: name.to_owned(),
            subject_name: subject.to_owned(),
            attended_exams: count,
        }
    }

    #[test]
    fn table_aligns_columns_under_the_header() {
        let out = render_table(&[record(1, "Alice", "Math", 2), record(13, "Bo", "Physics", 0)]);
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "student_id | student_name | subject_name | attended_exams",
                "-----------+--------------+--------------+---------------",
                "         1 | Alice        | Math         |              2",
                "        13 | Bo           | Physics      |              0",
            ]
        );
    }

    #[test]
    fn csv_and_json_carry_the_four_columns() {
        let records = [record(1, "Alice", "Math", 2)];
        assert_eq!(
            render(&records, OutputFormat::Csv).expect("csv"),
            "student_id,student_name,subject_name,attended_exams\n1,Alice,Math,2\n"
        );

        let json = render(&records, OutputFormat::Json).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(
            value,
            serde_json::json!([{
                "student_id": 1,
                "student_name": "Alice",
                "subject_name": "Math",
                "attended_exams": 2
            }])
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!("json".parse::<OutputFormat>().expect("json"), OutputFormat::Json);
    }

    #[test]
    fn empty_report_keeps_the_header() {
        let out = render(&[], OutputFormat::Csv).expect("csv");
        assert_eq!(out, "student_id,student_name,subject_name,attended_exams\n");
    }
}
