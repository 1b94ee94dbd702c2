use std::{net::SocketAddr, sync::Arc};

use axum::{
    async_trait,
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, FromRequest,
        Multipart, Request, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use server_api::{
    bulk_upload_students, create_student, list_campuses, list_cohorts, list_programs,
    list_students, store_student_image, update_student, ApiContext, StudentImageUpload,
};
use shared::{
    domain::{Campus, Cohort, CohortId, Program, Student, StudentId},
    error::{ApiError, ErrorCode},
    protocol::{
        image_form, BulkStudentsUploadRequest, BulkUploadStatus, CohortListRequest,
        CreateStudentRequest, CreateStudentResponse, ImageUploadResponse, ProgramListRequest,
        StudentListRequest, UpdateStudentRequest, UpdateStudentResponse,
    },
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, normalize_database_url};

type HandlerResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// `Json` whose rejections carry an [`ApiError`] body.
struct ApiJson<T>(T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(bad_json)?;
        Ok(Self(value))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext {
            storage,
            upload_dir: settings.upload_dir.clone(),
        },
        static_dir: settings.static_dir.clone(),
        max_upload_bytes: settings.max_upload_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(
        %addr,
        static_dir = %settings.static_dir.display(),
        upload_dir = %settings.upload_dir.display(),
        "server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn build_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/campusList", get(http_campus_list))
        .route("/programList", post(http_program_list))
        .route("/cohortList", post(http_cohort_list))
        .route("/studentList", post(http_student_list))
        .route("/updateStudent", post(http_update_student))
        .route("/createStudent", post(http_create_student))
        .route("/imageUpload", post(http_image_upload))
        .route("/bulkStudentsUpload", post(http_bulk_students_upload))
        .fallback_service(static_files)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state.api.storage.health_check().await.map_err(|e| {
        warn!(error = %e, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::internal(e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_campus_list(State(state): State<Arc<AppState>>) -> HandlerResult<Vec<Campus>> {
    let campuses = list_campuses(&state.api).await.map_err(reject)?;
    Ok(Json(campuses))
}

async fn http_program_list(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ProgramListRequest>,
) -> HandlerResult<Vec<Program>> {
    let programs = list_programs(&state.api, &req).await.map_err(reject)?;
    Ok(Json(programs))
}

async fn http_cohort_list(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CohortListRequest>,
) -> HandlerResult<Vec<Cohort>> {
    let cohorts = list_cohorts(&state.api, &req).await.map_err(reject)?;
    Ok(Json(cohorts))
}

async fn http_student_list(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<StudentListRequest>,
) -> HandlerResult<Vec<Student>> {
    let students = list_students(&state.api, &req).await.map_err(reject)?;
    Ok(Json(students))
}

async fn http_update_student(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UpdateStudentRequest>,
) -> HandlerResult<UpdateStudentResponse> {
    let response = update_student(&state.api, req).await.map_err(reject)?;
    Ok(Json(response))
}

async fn http_create_student(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateStudentRequest>,
) -> HandlerResult<CreateStudentResponse> {
    let response = create_student(&state.api, req).await.map_err(reject)?;
    Ok(Json(response))
}

async fn http_bulk_students_upload(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<BulkStudentsUploadRequest>,
) -> HandlerResult<BulkUploadStatus> {
    let status = bulk_upload_students(&state.api, req)
        .await
        .map_err(reject)?;
    Ok(Json(status))
}

async fn http_image_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> HandlerResult<ImageUploadResponse> {
    let mut bytes = None;
    let mut name = None;
    let mut student_id = None;
    let mut image_type = None;
    let mut cohort_id = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(field_name) = field.name().map(str::to_owned) else {
            continue;
        };
        match field_name.as_str() {
            image_form::IMAGE => {
                let file_name = field.file_name().map(str::to_owned);
                bytes = Some(field.bytes().await.map_err(bad_multipart)?.to_vec());
                if name.is_none() {
                    name = file_name;
                }
            }
            image_form::NAME => name = Some(field.text().await.map_err(bad_multipart)?),
            image_form::STUDENT_ID => {
                let raw = field.text().await.map_err(bad_multipart)?;
                student_id = Some(StudentId(parse_form_id(image_form::STUDENT_ID, &raw)?));
            }
            image_form::IMAGE_TYPE => {
                image_type = Some(field.text().await.map_err(bad_multipart)?)
            }
            image_form::COHORT_ID => {
                let raw = field.text().await.map_err(bad_multipart)?;
                cohort_id = Some(CohortId(parse_form_id(image_form::COHORT_ID, &raw)?));
            }
            other => warn!(field = other, "ignoring unexpected multipart field"),
        }
    }

    let upload = StudentImageUpload {
        bytes: bytes.ok_or_else(|| missing_form_field(image_form::IMAGE))?,
        name: name.ok_or_else(|| missing_form_field(image_form::NAME))?,
        student_id: student_id.ok_or_else(|| missing_form_field(image_form::STUDENT_ID))?,
        image_type: image_type.ok_or_else(|| missing_form_field(image_form::IMAGE_TYPE))?,
        cohort_id: cohort_id.ok_or_else(|| missing_form_field(image_form::COHORT_ID))?,
    };
    let response = store_student_image(&state.api, upload)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

fn parse_form_id(field: &str, raw: &str) -> Result<i64, (StatusCode, Json<ApiError>)> {
    raw.trim().parse::<i64>().map_err(|_| {
        reject(ApiError::validation(format!(
            "form field '{field}' must be an integer id"
        )))
    })
}

fn missing_form_field(field: &str) -> (StatusCode, Json<ApiError>) {
    reject(ApiError::validation(format!(
        "missing form field '{field}'"
    )))
}

fn bad_json(err: JsonRejection) -> (StatusCode, Json<ApiError>) {
    (
        err.status(),
        Json(ApiError::new(ErrorCode::Validation, err.body_text())),
    )
}

fn bad_multipart(err: MultipartError) -> (StatusCode, Json<ApiError>) {
    (
        err.status(),
        Json(ApiError::new(ErrorCode::Validation, err.body_text())),
    )
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => {
            error!(message = %err.message, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
