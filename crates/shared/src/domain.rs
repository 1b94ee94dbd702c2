use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(CampusId);
id_newtype!(ProgramId);
id_newtype!(CohortId);
id_newtype!(StudentId);

/// Opaque record fields, everything except the id and parent keys.
pub type Fields = Map<String, Value>;

/// Status value marking a soft-deleted student.
pub const STATUS_INACTIVE: &str = "INACTIVE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campus {
    pub campus_id: CampusId,
    #[serde(flatten)]
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub program_id: ProgramId,
    pub campus_id: CampusId,
    #[serde(flatten)]
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    pub cohort_id: CohortId,
    pub program_id: ProgramId,
    #[serde(flatten)]
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: StudentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_id: Option<CohortId>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Student {
    /// Replaces every null field with an empty string. Form inputs bound to
    /// these records cannot hold nulls.
    pub fn normalize_nulls(&mut self) {
        for value in self.fields.values_mut() {
            if value.is_null() {
                *value = Value::String(String::new());
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn status(&self) -> Option<&str> {
        self.fields.get("status").and_then(Value::as_str)
    }

    /// Applies a single field edit. Returns false when the edit was refused:
    /// the primary key is immutable and `cohort_id` must be an integer, an
    /// integer string, or empty.
    pub fn set_field(&mut self, field: &str, value: Value) -> bool {
        match field {
            "student_id" => false,
            "cohort_id" => match parse_optional_id(&value) {
                Ok(cohort_id) => {
                    self.cohort_id = cohort_id.map(CohortId);
                    true
                }
                Err(_) => false,
            },
            _ => {
                self.fields.insert(field.to_string(), value);
                true
            }
        }
    }

    /// Flattens the record back into the JSON object shape the REST API
    /// exchanges.
    pub fn to_fields(&self) -> Fields {
        let mut out = self.fields.clone();
        out.insert("student_id".into(), Value::from(self.student_id.0));
        if let Some(cohort_id) = self.cohort_id {
            out.insert("cohort_id".into(), Value::from(cohort_id.0));
        }
        out
    }
}

/// Reads a foreign key from a loosely typed form value. Null and blank
/// strings mean "unset".
pub fn parse_optional_id(value: &Value) -> Result<Option<i64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("{n} is not an integer id")),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("'{s}' is not an integer id")),
        other => Err(format!("{other} is not an integer id")),
    }
}
