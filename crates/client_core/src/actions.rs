//! Action creators. Every state transition of [`crate::state::AdminState`]
//! is described by one of these plain values.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{Campus, CampusId, Cohort, CohortId, Program, ProgramId, Student, StudentId},
    protocol::BulkUploadStatus,
};

use crate::{error::ClientError, state::EntityList};

/// Which hierarchy a campus/program/cohort list feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListMode {
    /// The main browsing hierarchy.
    #[serde(rename = "fetchAll")]
    FetchAll,
    /// The "move student to a cohort" pickers.
    #[serde(rename = "dropdown")]
    Dropdown,
}

impl fmt::Display for ListMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FetchAll => "fetchAll",
            Self::Dropdown => "dropdown",
        })
    }
}

impl FromStr for ListMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "fetchAll" | "fetch-all" => Ok(Self::FetchAll),
            "dropdown" => Ok(Self::Dropdown),
            other => Err(format!("unknown list mode '{other}'")),
        }
    }
}

/// What a dropdown cohort fetch does with the first cohort it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Move the current student into the cohort.
    Edit,
    /// Put the new-student draft into the cohort.
    Add,
    #[default]
    Noop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Edit => "edit",
            Self::Add => "add",
            Self::Noop => "noop",
        })
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "edit" => Ok(Self::Edit),
            "add" => Ok(Self::Add),
            "noop" => Ok(Self::Noop),
            other => Err(format!("unknown operation '{other}'")),
        }
    }
}

/// The thunk a `FETCH_ERROR` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThunkSource {
    #[serde(rename = "fetchCampusListThunk")]
    FetchCampusList,
    #[serde(rename = "fetchProgramListThunk")]
    FetchProgramList,
    #[serde(rename = "fetchCohortListThunk")]
    FetchCohortList,
    #[serde(rename = "fetchStudentListThunk")]
    FetchStudentList,
    #[serde(rename = "postCurrentStudentThunk")]
    PostCurrentStudent,
    #[serde(rename = "postNewStudentThunk")]
    PostNewStudent,
    #[serde(rename = "deleteStudentThunk")]
    DeleteStudent,
    #[serde(rename = "postStudentImageThunk")]
    PostStudentImage,
    #[serde(rename = "postBulkStudentsThunk")]
    PostBulkStudents,
}

impl ThunkSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchCampusList => "fetchCampusListThunk",
            Self::FetchProgramList => "fetchProgramListThunk",
            Self::FetchCohortList => "fetchCohortListThunk",
            Self::FetchStudentList => "fetchStudentListThunk",
            Self::PostCurrentStudent => "postCurrentStudentThunk",
            Self::PostNewStudent => "postNewStudentThunk",
            Self::DeleteStudent => "deleteStudentThunk",
            Self::PostStudentImage => "postStudentImageThunk",
            Self::PostBulkStudents => "postBulkStudentsThunk",
        }
    }
}

impl fmt::Display for ThunkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub source: ThunkSource,
    pub err: String,
    pub error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEdit {
    pub field: String,
    pub value: Value,
}

/// Every action serializes as `{ "type": ..., "payload": ... }`. Field
/// edits carry `{ field, value }` and failures `{ source, err, error }`
/// inside `payload`, so subscribers read one envelope shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    SetCampusList(EntityList<Campus>),
    SetCampusDropdownList(EntityList<Campus>),
    SetProgramList(EntityList<Program>),
    SetProgramDropdownList(EntityList<Program>),
    SetCohortList(EntityList<Cohort>),
    SetCohortDropdownList(EntityList<Cohort>),
    SetStudentList(EntityList<Student>),
    SetCurrentCampus { campus_id: CampusId, mode: ListMode },
    SetCurrentProgram { program_id: ProgramId, mode: ListMode },
    SetCurrentCohort { cohort_id: CohortId, mode: ListMode },
    SetCurrentStudent(StudentId),
    SetStudentData(FieldEdit),
    SetNewStudentData(FieldEdit),
    SetBulkUploadStatus(BulkUploadStatus),
    FetchError(FetchFailure),
}

impl Action {
    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetCampusList(_) => "SET_CAMPUS_LIST",
            Self::SetCampusDropdownList(_) => "SET_CAMPUS_DROPDOWN_LIST",
            Self::SetProgramList(_) => "SET_PROGRAM_LIST",
            Self::SetProgramDropdownList(_) => "SET_PROGRAM_DROPDOWN_LIST",
            Self::SetCohortList(_) => "SET_COHORT_LIST",
            Self::SetCohortDropdownList(_) => "SET_COHORT_DROPDOWN_LIST",
            Self::SetStudentList(_) => "SET_STUDENT_LIST",
            Self::SetCurrentCampus { .. } => "SET_CURRENT_CAMPUS",
            Self::SetCurrentProgram { .. } => "SET_CURRENT_PROGRAM",
            Self::SetCurrentCohort { .. } => "SET_CURRENT_COHORT",
            Self::SetCurrentStudent(_) => "SET_CURRENT_STUDENT",
            Self::SetStudentData(_) => "SET_STUDENT_DATA",
            Self::SetNewStudentData(_) => "SET_NEW_STUDENT_DATA",
            Self::SetBulkUploadStatus(_) => "SET_BULK_UPLOAD_STATUS",
            Self::FetchError(_) => "FETCH_ERROR",
        }
    }
}

pub fn set_campus_list(list: EntityList<Campus>, mode: ListMode) -> Action {
    match mode {
        ListMode::FetchAll => Action::SetCampusList(list),
        ListMode::Dropdown => Action::SetCampusDropdownList(list),
    }
}

pub fn set_program_list(list: EntityList<Program>, mode: ListMode) -> Action {
    match mode {
        ListMode::FetchAll => Action::SetProgramList(list),
        ListMode::Dropdown => Action::SetProgramDropdownList(list),
    }
}

pub fn set_cohort_list(list: EntityList<Cohort>, mode: ListMode) -> Action {
    match mode {
        ListMode::FetchAll => Action::SetCohortList(list),
        ListMode::Dropdown => Action::SetCohortDropdownList(list),
    }
}

pub fn set_student_list(list: EntityList<Student>) -> Action {
    Action::SetStudentList(list)
}

pub fn set_current_campus(campus_id: CampusId, mode: ListMode) -> Action {
    Action::SetCurrentCampus { campus_id, mode }
}

pub fn set_current_program(program_id: ProgramId, mode: ListMode) -> Action {
    Action::SetCurrentProgram { program_id, mode }
}

pub fn set_current_cohort(cohort_id: CohortId, mode: ListMode) -> Action {
    Action::SetCurrentCohort { cohort_id, mode }
}

pub fn set_current_student(student_id: StudentId) -> Action {
    Action::SetCurrentStudent(student_id)
}

pub fn update_current_student(field: impl Into<String>, value: impl Into<Value>) -> Action {
    Action::SetStudentData(FieldEdit {
        field: field.into(),
        value: value.into(),
    })
}

pub fn update_new_student(field: impl Into<String>, value: impl Into<Value>) -> Action {
    Action::SetNewStudentData(FieldEdit {
        field: field.into(),
        value: value.into(),
    })
}

pub fn set_bulk_upload_status(status: BulkUploadStatus) -> Action {
    Action::SetBulkUploadStatus(status)
}

pub fn fetch_error(err: &ClientError, source: ThunkSource) -> Action {
    Action::FetchError(FetchFailure {
        source,
        err: err.to_string(),
        error: true,
    })
}
