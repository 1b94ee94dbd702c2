use serde::{Deserialize, Serialize};
use crate::domain::{CampusId, CohortId, Fields, ProgramId, StudentId, STATUS_INACTIVE};

/// `{ eq: {...}, ne: {...} }` filter carried under the `where` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "E: Deserialize<'de>, N: Deserialize<'de>"))]
pub struct Where<E, N = NoCriteria> {
    pub eq: E,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<N>,
}

impl<E> Where<E> {
    pub fn eq(eq: E) -> Self {
        Self { eq, ne: None }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoCriteria {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampusCriteria {
    pub campus_id: CampusId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramCriteria {
    pub program_id: ProgramId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_id: Option<CohortId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCriteria {
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentKey {
    pub student_id: StudentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramListRequest {
    #[serde(rename = "where")]
    pub filter: Where<CampusCriteria>,
}

impl ProgramListRequest {
    pub fn for_campus(campus_id: CampusId) -> Self {
        Self {
            filter: Where::eq(CampusCriteria { campus_id }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortListRequest {
    #[serde(rename = "where")]
    pub filter: Where<ProgramCriteria>,
}

impl CohortListRequest {
    pub fn for_program(program_id: ProgramId) -> Self {
        Self {
            filter: Where::eq(ProgramCriteria { program_id }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentListRequest {
    #[serde(rename = "where")]
    pub filter: Where<StudentCriteria, StatusCriteria>,
}

impl StudentListRequest {
    /// Active students matching the optional cohort and student keys.
    pub fn active(cohort_id: Option<CohortId>, student_id: Option<StudentId>) -> Self {
        Self {
            filter: Where {
                eq: StudentCriteria {
                    cohort_id,
                    student_id,
                },
                ne: Some(StatusCriteria {
                    status: STATUS_INACTIVE.to_string(),
                }),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStudentRequest {
    pub data: Fields,
    #[serde(rename = "where")]
    pub filter: Where<StudentKey>,
}

impl UpdateStudentRequest {
    pub fn new(student_id: StudentId, data: Fields) -> Self {
        Self {
            data,
            filter: Where::eq(StudentKey { student_id }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStudentRequest {
    pub data: Fields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkStudentsUploadRequest {
    pub data: Vec<Fields>,
    pub cohort_id: CohortId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStudentResponse {
    pub updated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStudentResponse {
    pub student_id: StudentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUploadStatus {
    pub cohort_id: CohortId,
    pub inserted: usize,
    pub student_ids: Vec<StudentId>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub student_id: StudentId,
    pub image_type: String,
    pub name: String,
}

/// Multipart field names of an image upload.
pub mod image_form {
    pub const IMAGE: &str = "image";
    pub const NAME: &str = "name";
    pub const STUDENT_ID: &str = "student_id";
    pub const IMAGE_TYPE: &str = "image_type";
    pub const COHORT_ID: &str = "cohort_id";
}

/// Loose view of an error body; the client only needs `message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
