use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    parse_optional_id, Campus, CampusId, Cohort, CohortId, Fields, Program, ProgramId, Student,
    StudentId,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Student list filter: equality on the keys that are set, and exclusion of
/// one status value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentQuery {
    pub cohort_id: Option<CohortId>,
    pub student_id: Option<StudentId>,
    pub exclude_status: Option<String>,
}

/// A student payload split into its column values and the opaque remainder.
/// Outer `None` means the key was absent from the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentColumns {
    pub cohort_id: Option<Option<CohortId>>,
    pub status: Option<Option<String>>,
    pub fields: Fields,
}

impl StudentColumns {
    pub fn from_fields(mut data: Fields) -> Result<Self> {
        data.remove("student_id");
        let cohort_id = match data.remove("cohort_id") {
            Some(value) => Some(
                parse_optional_id(&value)
                    .map_err(|e| anyhow!("invalid cohort_id: {e}"))?
                    .map(CohortId),
            ),
            None => None,
        };
        let status = data.remove("status").map(|value| match value {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        Ok(Self {
            cohort_id,
            status,
            fields: data,
        })
    }
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is a separate database,
        // so those pools are pinned to one long-lived connection.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_campus(&self, fields: Fields) -> Result<CampusId> {
        let fields = encode_fields(strip_keys(fields, &["campus_id"]))?;
        let rec = sqlx::query("INSERT INTO campuses (fields) VALUES (?) RETURNING campus_id")
            .bind(fields)
            .fetch_one(&self.pool)
            .await?;
        Ok(CampusId(rec.get::<i64, _>(0)))
    }

    pub async fn create_program(&self, campus_id: CampusId, fields: Fields) -> Result<ProgramId> {
        let fields = encode_fields(strip_keys(fields, &["program_id", "campus_id"]))?;
        let rec = sqlx::query(
            "INSERT INTO programs (campus_id, fields) VALUES (?, ?) RETURNING program_id",
        )
        .bind(campus_id.0)
        .bind(fields)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create program under campus {campus_id}"))?;
        Ok(ProgramId(rec.get::<i64, _>(0)))
    }

    pub async fn create_cohort(&self, program_id: ProgramId, fields: Fields) -> Result<CohortId> {
        let fields = encode_fields(strip_keys(fields, &["cohort_id", "program_id"]))?;
        let rec = sqlx::query(
            "INSERT INTO cohorts (program_id, fields) VALUES (?, ?) RETURNING cohort_id",
        )
        .bind(program_id.0)
        .bind(fields)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create cohort under program {program_id}"))?;
        Ok(CohortId(rec.get::<i64, _>(0)))
    }

    pub async fn list_campuses(&self) -> Result<Vec<Campus>> {
        let rows = sqlx::query("SELECT campus_id, fields FROM campuses ORDER BY campus_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<Campus> {
                Ok(Campus {
                    campus_id: CampusId(row.try_get("campus_id")?),
                    fields: decode_fields(row.try_get("fields")?)?,
                })
            })
            .collect()
    }

    pub async fn list_programs(&self, campus_id: CampusId) -> Result<Vec<Program>> {
        let rows = sqlx::query(
            "SELECT program_id, campus_id, fields FROM programs
             WHERE campus_id = ?
             ORDER BY program_id",
        )
        .bind(campus_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<Program> {
                Ok(Program {
                    program_id: ProgramId(row.try_get("program_id")?),
                    campus_id: CampusId(row.try_get("campus_id")?),
                    fields: decode_fields(row.try_get("fields")?)?,
                })
            })
            .collect()
    }

    pub async fn list_cohorts(&self, program_id: ProgramId) -> Result<Vec<Cohort>> {
        let rows = sqlx::query(
            "SELECT cohort_id, program_id, fields FROM cohorts
             WHERE program_id = ?
             ORDER BY cohort_id",
        )
        .bind(program_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<Cohort> {
                Ok(Cohort {
                    cohort_id: CohortId(row.try_get("cohort_id")?),
                    program_id: ProgramId(row.try_get("program_id")?),
                    fields: decode_fields(row.try_get("fields")?)?,
                })
            })
            .collect()
    }

    pub async fn list_students(&self, query: &StudentQuery) -> Result<Vec<Student>> {
        let rows = sqlx::query(
            "SELECT student_id, cohort_id, status, fields FROM students
             WHERE (?1 IS NULL OR cohort_id = ?1)
               AND (?2 IS NULL OR student_id = ?2)
               AND (?3 IS NULL OR status IS NULL OR status <> ?3)
             ORDER BY student_id",
        )
        .bind(query.cohort_id.map(|id| id.0))
        .bind(query.student_id.map(|id| id.0))
        .bind(query.exclude_status.as_deref())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(student_from_row).collect()
    }

    pub async fn cohort_exists(&self, cohort_id: CohortId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM cohorts WHERE cohort_id = ?")
            .bind(cohort_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn student_exists(&self, student_id: StudentId) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM students WHERE student_id = ?")
                .bind(student_id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Looks up a student whatever its status.
    pub async fn get_student(&self, student_id: StudentId) -> Result<Option<Student>> {
        let row = sqlx::query(
            "SELECT student_id, cohort_id, status, fields FROM students WHERE student_id = ?",
        )
        .bind(student_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(student_from_row).transpose()
    }

    pub async fn create_student(&self, data: Fields) -> Result<StudentId> {
        let columns = StudentColumns::from_fields(data)?;
        let mut conn = self.pool.acquire().await?;
        insert_student(&mut conn, columns).await
    }

    /// Inserts every record into `cohort_id` inside one transaction; any
    /// failure leaves the cohort untouched.
    pub async fn bulk_create_students(
        &self,
        cohort_id: CohortId,
        records: Vec<Fields>,
    ) -> Result<Vec<StudentId>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let mut columns = StudentColumns::from_fields(record)
                .with_context(|| format!("bulk record {index} is invalid"))?;
            columns.cohort_id = Some(Some(cohort_id));
            ids.push(insert_student(&mut tx, columns).await?);
        }
        tx.commit().await?;
        Ok(ids)
    }

    /// Merges `data` into the stored student. Keys present in `data`
    /// overwrite stored ones; absent keys are kept. Returns the number of
    /// students updated.
    pub async fn update_student(&self, student_id: StudentId, data: Fields) -> Result<u64> {
        let columns = StudentColumns::from_fields(data)?;
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query(
            "SELECT student_id, cohort_id, status, fields FROM students WHERE student_id = ?",
        )
        .bind(student_id.0)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(0);
        };

        let mut cohort_id = row.try_get::<Option<i64>, _>("cohort_id")?.map(CohortId);
        let mut status: Option<String> = row.try_get("status")?;
        let mut fields = decode_fields(row.try_get("fields")?)?;

        if let Some(next) = columns.cohort_id {
            cohort_id = next;
        }
        if let Some(next) = columns.status {
            status = next;
        }
        fields.extend(columns.fields);

        let result = sqlx::query(
            "UPDATE students SET cohort_id = ?, status = ?, fields = ? WHERE student_id = ?",
        )
        .bind(cohort_id.map(|id| id.0))
        .bind(status)
        .bind(encode_fields(fields)?)
        .bind(student_id.0)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

async fn insert_student(conn: &mut SqliteConnection, columns: StudentColumns) -> Result<StudentId> {
    let rec = sqlx::query(
        "INSERT INTO students (cohort_id, status, fields) VALUES (?, ?, ?) RETURNING student_id",
    )
    .bind(columns.cohort_id.flatten().map(|id| id.0))
    .bind(columns.status.flatten())
    .bind(encode_fields(columns.fields)?)
    .fetch_one(&mut *conn)
    .await
    .context("failed to insert student")?;
    Ok(StudentId(rec.get::<i64, _>(0)))
}

fn student_from_row(row: &SqliteRow) -> Result<Student> {
    let status: Option<String> = row.try_get("status")?;
    let mut fields = decode_fields(row.try_get("fields")?)?;
    fields.insert("status".into(), status.map(Value::String).unwrap_or(Value::Null));
    Ok(Student {
        student_id: StudentId(row.try_get("student_id")?),
        cohort_id: row.try_get::<Option<i64>, _>("cohort_id")?.map(CohortId),
        fields,
    })
}

fn strip_keys(mut fields: Fields, keys: &[&str]) -> Fields {
    for key in keys {
        fields.remove(*key);
    }
    fields
}

fn encode_fields(fields: Fields) -> Result<String> {
    serde_json::to_string(&fields).context("failed to encode record fields")
}

fn decode_fields(raw: &str) -> Result<Fields> {
    serde_json::from_str(raw).context("stored record fields are not a JSON object")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
