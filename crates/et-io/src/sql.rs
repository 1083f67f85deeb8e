use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};

use et_columnar::Column;
use et_frame::DataFrame;
use et_types::{DType, Scalar};

use crate::IoError;

/// Create `table` and insert every row of `frame` in one transaction.
///
/// Matches `frame.to_sql(table, conn, if_exists="fail", index=False)`:
/// `Int64`/`Bool` columns map to `INTEGER`, `Utf8` and all-null columns to
/// `TEXT`.
pub fn write_sql(conn: &mut Connection, table: &str, frame: &DataFrame) -> Result<(), IoError> {
    let column_defs = frame
        .columns()
        .map(|(name, column)| format!("{} {}", quote_ident(name), sql_type(column.dtype())))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=frame.num_columns())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    tx.execute(
        &format!("CREATE TABLE {} ({column_defs})", quote_ident(table)),
        [],
    )?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({placeholders})",
            quote_ident(table)
        ))?;
        for row_idx in 0..frame.len() {
            let values = frame
                .columns()
                .map(|(_, column)| column.value(row_idx).map_or(SqlValue::Null, scalar_to_sql));
            stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Run `query` and collect the result set into a frame, columns named after
/// the statement's output columns.
///
/// Column dtypes are inferred from the returned values; `REAL` and `BLOB`
/// values are rejected.
pub fn read_sql(conn: &Connection, query: &str) -> Result<DataFrame, IoError> {
    let mut stmt = conn.prepare(query)?;
    let names = stmt
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect::<Vec<_>>();

    let mut values = vec![Vec::<Scalar>::new(); names.len()];
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for (idx, column_values) in values.iter_mut().enumerate() {
            let scalar = match row.get_ref(idx)? {
                ValueRef::Null => Scalar::Null,
                ValueRef::Integer(v) => Scalar::Int64(v),
                ValueRef::Text(bytes) => Scalar::Utf8(String::from_utf8(bytes.to_vec())?),
                ValueRef::Real(v) => {
                    return Err(IoError::UnsupportedSqlValue {
                        column: names[idx].clone(),
                        detail: format!("real {v}"),
                    });
                }
                ValueRef::Blob(bytes) => {
                    return Err(IoError::UnsupportedSqlValue {
                        column: names[idx].clone(),
                        detail: format!("blob of {} bytes", bytes.len()),
                    });
                }
            };
            column_values.push(scalar);
        }
    }

    let mut named = Vec::with_capacity(names.len());
    for (name, column_values) in names.into_iter().zip(values) {
        named.push((name, Column::from_values(column_values)?));
    }
    Ok(DataFrame::from_columns(named)?)
}

fn sql_type(dtype: DType) -> &'static str {
    match dtype {
        DType::Bool | DType::Int64 => "INTEGER",
        DType::Utf8 | DType::Null => "TEXT",
    }
}

fn scalar_to_sql(scalar: &Scalar) -> SqlValue {
    match scalar {
        Scalar::Null => SqlValue::Null,
        Scalar::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Scalar::Int64(v) => SqlValue::Integer(*v),
        Scalar::Utf8(v) => SqlValue::Text(v.clone()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use et_types::Scalar;

    use super::{read_sql, write_sql};
    use crate::{CsvReadOptions, read_csv_str};

    #[test]
    fn frame_round_trips_through_sqlite() {
        let frame = read_csv_str(
            "student_id,student_name\n1,Alice\n2,\n",
            &CsvReadOptions::default(),
        )
        .expect("read");
        let mut conn = Connection::open_in_memory().expect("sqlite");

        write_sql(&mut conn, "Students", &frame).expect("write");
        let back = read_sql(
            &conn,
            "SELECT student_id, student_name FROM Students ORDER BY student_id",
        )
        .expect("read back");

        assert_eq!(
            back.column("student_id").expect("id").values(),
            &[Scalar::Int64(1), Scalar::Int64(2)]
        );
        assert_eq!(
            back.column("student_name").expect("name").values(),
            &[Scalar::from("Alice"), Scalar::Null]
        );
    }

    #[test]
    fn aggregate_query_reads_counts_as_int64() {
        let frame = read_csv_str("k\na\na\nb\n", &CsvReadOptions::default()).expect("read");
        let mut conn = Connection::open_in_memory().expect("sqlite");
        write_sql(&mut conn, "T", &frame).expect("write");

        let out = read_sql(&conn, "SELECT k, COUNT(*) AS n FROM T GROUP BY k ORDER BY k")
            .expect("query");
        assert_eq!(
            out.column("n").expect("n").values(),
            &[Scalar::Int64(2), Scalar::Int64(1)]
        );
    }

    #[test]
    fn real_values_are_rejected() {
        let conn = Connection::open_in_memory().expect("sqlite");
        let err = read_sql(&conn, "SELECT 1.5 AS x").expect_err("real");
        assert!(err.to_string().contains("real 1.5"));
    }

    #[test]
    fn duplicate_table_fails() {
        let frame = read_csv_str("k\n1\n", &CsvReadOptions::default()).expect("read");
        let mut conn = Connection::open_in_memory().expect("sqlite");
        write_sql(&mut conn, "T", &frame).expect("first write");
        assert!(write_sql(&mut conn, "T", &frame).is_err());
    }
}
