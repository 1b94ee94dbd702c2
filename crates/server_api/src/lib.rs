use std::path::{Path, PathBuf};

use serde_json::Value;
use shared::{
    domain::{parse_optional_id, Campus, Cohort, CohortId, Fields, Program, Student, StudentId},
    error::ApiError,
    protocol::{
        BulkStudentsUploadRequest, BulkUploadStatus, CohortListRequest, CreateStudentRequest,
        CreateStudentResponse, ImageUploadResponse, ProgramListRequest, StudentListRequest,
        UpdateStudentRequest, UpdateStudentResponse,
    },
};
use storage::{Storage, StudentQuery};
use tracing::{info, warn};

pub const MAX_IMAGE_NAME_BYTES: usize = 180;

/// Keys an image upload must never overwrite.
const RESERVED_STUDENT_FIELDS: [&str; 3] = ["student_id", "cohort_id", "status"];

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StudentImageUpload {
    pub student_id: StudentId,
    pub cohort_id: CohortId,
    pub image_type: String,
    pub name: String,
    pub bytes: Vec<u8>,
}

pub async fn list_campuses(ctx: &ApiContext) -> Result<Vec<Campus>, ApiError> {
    ctx.storage.list_campuses().await.map_err(internal)
}

pub async fn list_programs(
    ctx: &ApiContext,
    req: &ProgramListRequest,
) -> Result<Vec<Program>, ApiError> {
    ctx.storage
        .list_programs(req.filter.eq.campus_id)
        .await
        .map_err(internal)
}

pub async fn list_cohorts(
    ctx: &ApiContext,
    req: &CohortListRequest,
) -> Result<Vec<Cohort>, ApiError> {
    ctx.storage
        .list_cohorts(req.filter.eq.program_id)
        .await
        .map_err(internal)
}

pub async fn list_students(
    ctx: &ApiContext,
    req: &StudentListRequest,
) -> Result<Vec<Student>, ApiError> {
    let query = StudentQuery {
        cohort_id: req.filter.eq.cohort_id,
        student_id: req.filter.eq.student_id,
        exclude_status: req.filter.ne.as_ref().map(|ne| ne.status.clone()),
    };
    ctx.storage.list_students(&query).await.map_err(internal)
}

pub async fn update_student(
    ctx: &ApiContext,
    req: UpdateStudentRequest,
) -> Result<UpdateStudentResponse, ApiError> {
    let student_id = req.filter.eq.student_id;
    if let Some(cohort_id) = cohort_in(&req.data)? {
        ensure_cohort_exists(ctx, cohort_id).await?;
    }

    let updated = ctx
        .storage
        .update_student(student_id, req.data)
        .await
        .map_err(internal)?;
    if updated == 0 {
        return Err(ApiError::not_found(format!("student {student_id} not found")));
    }
    info!(%student_id, "student updated");
    Ok(UpdateStudentResponse { updated })
}

pub async fn create_student(
    ctx: &ApiContext,
    req: CreateStudentRequest,
) -> Result<CreateStudentResponse, ApiError> {
    if let Some(cohort_id) = cohort_in(&req.data)? {
        ensure_cohort_exists(ctx, cohort_id).await?;
    }

    let student_id = ctx
        .storage
        .create_student(req.data)
        .await
        .map_err(internal)?;
    info!(%student_id, "student created");
    Ok(CreateStudentResponse { student_id })
}

pub async fn bulk_upload_students(
    ctx: &ApiContext,
    req: BulkStudentsUploadRequest,
) -> Result<BulkUploadStatus, ApiError> {
    ensure_cohort_exists(ctx, req.cohort_id).await?;

    let student_ids = ctx
        .storage
        .bulk_create_students(req.cohort_id, req.data)
        .await
        .map_err(|e| ApiError::validation(format!("bulk upload rejected: {e:#}")))?;
    let inserted = student_ids.len();
    info!(cohort_id = %req.cohort_id, inserted, "bulk student upload stored");

    Ok(BulkUploadStatus {
        cohort_id: req.cohort_id,
        inserted,
        student_ids,
        message: format!("{inserted} students added to cohort {}", req.cohort_id),
    })
}

/// Writes the image under `upload_dir/cohort_<id>/` and points the student's
/// `image_type` field at the stored file name. The form's cohort must be the
/// student's own cohort.
pub async fn store_student_image(
    ctx: &ApiContext,
    upload: StudentImageUpload,
) -> Result<ImageUploadResponse, ApiError> {
    let name = validate_image_name(&upload.name)?;
    validate_image_type(&upload.image_type)?;
    if upload.bytes.is_empty() {
        return Err(ApiError::validation("image body cannot be empty"));
    }

    let student = ctx
        .storage
        .get_student(upload.student_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            ApiError::not_found(format!("student {} not found", upload.student_id))
        })?;
    if student.cohort_id != Some(upload.cohort_id) {
        return Err(ApiError::validation(format!(
            "student {} is not in cohort {}",
            upload.student_id, upload.cohort_id
        )));
    }

    let dir = cohort_upload_dir(&ctx.upload_dir, upload.cohort_id);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::internal(format!("failed to create {}: {e}", dir.display())))?;
    let path = dir.join(&name);
    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| ApiError::internal(format!("failed to write {}: {e}", path.display())))?;

    let mut data = Fields::new();
    data.insert(upload.image_type.clone(), Value::String(name.clone()));
    let updated = match ctx.storage.update_student(upload.student_id, data).await {
        Ok(updated) => updated,
        Err(err) => {
            discard_image(&path).await;
            return Err(internal(err));
        }
    };
    if updated == 0 {
        discard_image(&path).await;
        return Err(ApiError::not_found(format!(
            "student {} not found",
            upload.student_id
        )));
    }

    info!(
        student_id = %upload.student_id,
        image_type = %upload.image_type,
        bytes = upload.bytes.len(),
        "student image stored"
    );
    Ok(ImageUploadResponse {
        student_id: upload.student_id,
        image_type: upload.image_type,
        name,
    })
}

async fn discard_image(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), %error, "failed to remove unreferenced image");
    }
}

pub fn cohort_upload_dir(upload_dir: &Path, cohort_id: CohortId) -> PathBuf {
    upload_dir.join(format!("cohort_{cohort_id}"))
}

fn validate_image_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::validation("image name cannot be empty"));
    }
    if name.len() > MAX_IMAGE_NAME_BYTES {
        return Err(ApiError::validation("image name is too long"));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(ApiError::validation(
            "image name must not contain path separators",
        ));
    }
    if name == "." || name == ".." {
        return Err(ApiError::validation("image name is not a file name"));
    }
    Ok(name.to_string())
}

fn validate_image_type(image_type: &str) -> Result<(), ApiError> {
    let well_formed = !image_type.is_empty()
        && image_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        return Err(ApiError::validation(format!(
            "image_type '{image_type}' is not a field name"
        )));
    }
    if RESERVED_STUDENT_FIELDS.contains(&image_type) {
        return Err(ApiError::validation(format!(
            "image_type '{image_type}' is reserved"
        )));
    }
    Ok(())
}

fn cohort_in(data: &Fields) -> Result<Option<CohortId>, ApiError> {
    match data.get("cohort_id") {
        Some(value) => parse_optional_id(value)
            .map(|id| id.map(CohortId))
            .map_err(|e| ApiError::validation(format!("invalid cohort_id: {e}"))),
        None => Ok(None),
    }
}

async fn ensure_cohort_exists(ctx: &ApiContext, cohort_id: CohortId) -> Result<(), ApiError> {
    let exists = ctx
        .storage
        .cohort_exists(cohort_id)
        .await
        .map_err(internal)?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::validation(format!("cohort {cohort_id} does not exist")))
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(format!("{err:#}"))
}
