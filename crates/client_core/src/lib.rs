use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{Campus, CampusId, Cohort, CohortId, Fields, Program, ProgramId, Student, StudentId},
    protocol::{
        image_form, BulkStudentsUploadRequest, BulkUploadStatus, CohortListRequest,
        CreateStudentRequest, CreateStudentResponse, ImageUploadResponse, ProgramListRequest,
        StudentListRequest, UpdateStudentRequest, UpdateStudentResponse,
    },
};
use tracing::{debug, info, warn};
use url::Url;

pub mod actions;
pub mod error;
pub mod state;
pub mod store;
pub mod transport;

pub use actions::{Action, ListMode, Operation, ThunkSource};
pub use error::ClientError;
pub use state::{AdminState, EntityList};
pub use store::{Dispatcher, Store};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// An image picked for upload.
#[derive(Debug, Clone)]
pub struct StudentImage {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListLevel {
    Campus,
    Program,
    Cohort,
    Student,
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    slot: usize,
    generation: u64,
}

/// One counter per (level, mode). A fetch takes a ticket when it starts and
/// may only dispatch its result while no newer fetch for the same slot has
/// started.
#[derive(Default)]
struct FetchTickets {
    slots: [AtomicU64; 8],
}

impl FetchTickets {
    fn slot(level: ListLevel, mode: ListMode) -> usize {
        let level = match level {
            ListLevel::Campus => 0,
            ListLevel::Program => 1,
            ListLevel::Cohort => 2,
            ListLevel::Student => 3,
        };
        match mode {
            ListMode::FetchAll => level,
            ListMode::Dropdown => level + 4,
        }
    }

    fn issue(&self, level: ListLevel, mode: ListMode) -> Ticket {
        let slot = Self::slot(level, mode);
        let generation = self.slots[slot].fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { slot, generation }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.slots[ticket.slot].load(Ordering::SeqCst) == ticket.generation
    }
}

/// HTTP thunks for the Campus → Program → Cohort → Student admin screens.
///
/// Each thunk performs its request, dispatches the resulting actions, and
/// may chain into the next level. A failure dispatches exactly one
/// `FETCH_ERROR` naming the failing thunk and is also returned to the
/// caller.
pub struct AdminClient {
    http: Client,
    base_url: Url,
    dispatcher: Arc<dyn Dispatcher>,
    tickets: FetchTickets,
}

impl AdminClient {
    pub fn new(base_url: &str, dispatcher: Arc<dyn Dispatcher>) -> Result<Self, ClientError> {
        Self::with_http_client(Client::new(), base_url, dispatcher)
    }

    pub fn with_http_client(
        http: Client,
        base_url: &str,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            base_url: transport::parse_base_url(base_url)?,
            dispatcher,
            tickets: FetchTickets::default(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn set_current_campus_fetch_programs(
        &self,
        campus_id: CampusId,
        mode: ListMode,
        operation: Operation,
    ) -> Result<(), ClientError> {
        self.dispatch(actions::set_current_campus(campus_id, mode))
            .await;
        self.fetch_program_list(campus_id, mode, operation).await
    }

    pub async fn set_current_program_fetch_cohorts(
        &self,
        program_id: ProgramId,
        mode: ListMode,
        operation: Operation,
    ) -> Result<(), ClientError> {
        self.dispatch(actions::set_current_program(program_id, mode))
            .await;
        self.fetch_cohort_list(program_id, mode, operation).await
    }

    pub async fn set_current_cohort_fetch_students(
        &self,
        cohort_id: CohortId,
        mode: ListMode,
    ) -> Result<(), ClientError> {
        self.dispatch(actions::set_current_cohort(cohort_id, mode))
            .await;
        self.fetch_student_list(Some(cohort_id), None).await
    }

    pub async fn fetch_campus_list(
        &self,
        mode: ListMode,
        operation: Operation,
    ) -> Result<(), ClientError> {
        debug!(%mode, %operation, "fetching campus list");
        let ticket = self.tickets.issue(ListLevel::Campus, mode);
        let campuses: Vec<Campus> = self
            .reported(ThunkSource::FetchCampusList, async {
                let response = self.get(transport::CAMPUS_LIST).await?;
                transport::decode_json(response).await
            })
            .await?;
        if !self.tickets.is_current(ticket) {
            debug!(%mode, "dropping stale campus list");
            return Ok(());
        }

        let list = EntityList::from_records(campuses);
        let first = list.first();
        self.dispatch(actions::set_campus_list(list, mode)).await;
        match first {
            Some(campus_id) => {
                self.set_current_campus_fetch_programs(campus_id, mode, operation)
                    .await
            }
            None => Ok(()),
        }
    }

    pub async fn fetch_program_list(
        &self,
        campus_id: CampusId,
        mode: ListMode,
        operation: Operation,
    ) -> Result<(), ClientError> {
        debug!(%campus_id, %mode, %operation, "fetching program list");
        let ticket = self.tickets.issue(ListLevel::Program, mode);
        let programs: Vec<Program> = self
            .reported(ThunkSource::FetchProgramList, async {
                let response = self
                    .post(
                        transport::PROGRAM_LIST,
                        &ProgramListRequest::for_campus(campus_id),
                    )
                    .await?;
                transport::decode_json(response).await
            })
            .await?;
        if !self.tickets.is_current(ticket) {
            debug!(%campus_id, %mode, "dropping stale program list");
            return Ok(());
        }

        let list = EntityList::from_records(programs);
        let first = list.first();
        self.dispatch(actions::set_program_list(list, mode)).await;
        match first {
            Some(program_id) => {
                self.set_current_program_fetch_cohorts(program_id, mode, operation)
                    .await
            }
            None => Ok(()),
        }
    }

    pub async fn fetch_cohort_list(
        &self,
        program_id: ProgramId,
        mode: ListMode,
        operation: Operation,
    ) -> Result<(), ClientError> {
        debug!(%program_id, %mode, %operation, "fetching cohort list");
        let ticket = self.tickets.issue(ListLevel::Cohort, mode);
        let cohorts: Vec<Cohort> = self
            .reported(ThunkSource::FetchCohortList, async {
                let response = self
                    .post(
                        transport::COHORT_LIST,
                        &CohortListRequest::for_program(program_id),
                    )
                    .await?;
                transport::decode_json(response).await
            })
            .await?;
        if !self.tickets.is_current(ticket) {
            debug!(%program_id, %mode, "dropping stale cohort list");
            return Ok(());
        }

        let list = EntityList::from_records(cohorts);
        let first = list.first();
        self.dispatch(actions::set_cohort_list(list, mode)).await;
        let Some(cohort_id) = first else {
            return Ok(());
        };

        match (mode, operation) {
            (ListMode::FetchAll, _) => {
                self.set_current_cohort_fetch_students(cohort_id, mode)
                    .await
            }
            (ListMode::Dropdown, Operation::Edit) => {
                self.dispatch(actions::update_current_student("cohort_id", cohort_id.0))
                    .await;
                Ok(())
            }
            (ListMode::Dropdown, Operation::Add) => {
                self.dispatch(actions::update_new_student("cohort_id", cohort_id.0))
                    .await;
                Ok(())
            }
            (ListMode::Dropdown, Operation::Noop) => Ok(()),
        }
    }

    pub async fn fetch_student_list(
        &self,
        cohort_id: Option<CohortId>,
        student_id: Option<StudentId>,
    ) -> Result<(), ClientError> {
        debug!(?cohort_id, ?student_id, "fetching student list");
        let ticket = self.tickets.issue(ListLevel::Student, ListMode::FetchAll);
        let mut students: Vec<Student> = self
            .reported(ThunkSource::FetchStudentList, async {
                let response = self
                    .post(
                        transport::STUDENT_LIST,
                        &StudentListRequest::active(cohort_id, student_id),
                    )
                    .await?;
                transport::decode_json(response).await
            })
            .await?;
        if !self.tickets.is_current(ticket) {
            debug!(?cohort_id, ?student_id, "dropping stale student list");
            return Ok(());
        }

        students.iter_mut().for_each(Student::normalize_nulls);
        let list = EntityList::from_records(students);
        let first = list.first();
        self.dispatch(actions::set_student_list(list)).await;
        if let Some(student_id) = first {
            self.dispatch(actions::set_current_student(student_id))
                .await;
        }
        Ok(())
    }

    pub async fn post_current_student(&self, student: &Student) -> Result<(), ClientError> {
        debug!(student_id = %student.student_id, "posting current student");
        let request = UpdateStudentRequest::new(student.student_id, student.to_fields());
        let response: Option<UpdateStudentResponse> = self
            .reported(ThunkSource::PostCurrentStudent, async {
                let response = self.post(transport::UPDATE_STUDENT, &request).await?;
                transport::decode_lenient(response).await
            })
            .await?;
        info!(student_id = %student.student_id, updated = ?response.map(|r| r.updated), "student saved");
        Ok(())
    }

    pub async fn post_new_student(&self, student: &Fields) -> Result<(), ClientError> {
        debug!("posting new student");
        let request = CreateStudentRequest {
            data: student.clone(),
        };
        let response: Option<CreateStudentResponse> = self
            .reported(ThunkSource::PostNewStudent, async {
                let response = self.post(transport::CREATE_STUDENT, &request).await?;
                transport::decode_lenient(response).await
            })
            .await?;
        info!(student_id = ?response.map(|r| r.student_id.0), "student created");
        Ok(())
    }

    /// Soft delete: writes `status` and reloads the cohort's students.
    pub async fn delete_current_student(
        &self,
        status: &str,
        student_id: StudentId,
        cohort_id: CohortId,
    ) -> Result<(), ClientError> {
        debug!(%student_id, %cohort_id, status, "deleting student");
        let mut data = Fields::new();
        data.insert("status".into(), Value::String(status.to_string()));
        let request = UpdateStudentRequest::new(student_id, data);
        let _: Option<UpdateStudentResponse> = self
            .reported(ThunkSource::DeleteStudent, async {
                let response = self.post(transport::UPDATE_STUDENT, &request).await?;
                transport::decode_lenient(response).await
            })
            .await?;
        self.fetch_student_list(Some(cohort_id), None).await
    }

    pub async fn post_student_image(
        &self,
        image: StudentImage,
        image_type: &str,
        student_id: StudentId,
        cohort_id: CohortId,
    ) -> Result<(), ClientError> {
        debug!(%student_id, %cohort_id, image_type, name = %image.name, "uploading student image");
        let name = image.name.clone();
        let _: Option<ImageUploadResponse> = self
            .reported(ThunkSource::PostStudentImage, async {
                let mut part = Part::bytes(image.bytes).file_name(image.name.clone());
                if let Some(mime_type) = &image.mime_type {
                    part = part.mime_str(mime_type)?;
                }
                let form = Form::new()
                    .part(image_form::IMAGE, part)
                    .text(image_form::NAME, image.name.clone())
                    .text(image_form::STUDENT_ID, student_id.to_string())
                    .text(image_form::IMAGE_TYPE, image_type.to_string())
                    .text(image_form::COHORT_ID, cohort_id.to_string());
                let url = transport::endpoint_url(&self.base_url, transport::IMAGE_UPLOAD)?;
                let response = self.http.post(url).multipart(form).send().await?;
                let response = transport::check_status(response).await?;
                transport::decode_lenient(response).await
            })
            .await?;
        self.dispatch(actions::update_current_student(image_type, name))
            .await;
        Ok(())
    }

    pub async fn post_bulk_students(
        &self,
        data: Vec<Fields>,
        cohort_id: CohortId,
    ) -> Result<(), ClientError> {
        debug!(%cohort_id, count = data.len(), "posting bulk students");
        let request = BulkStudentsUploadRequest { data, cohort_id };
        let status: BulkUploadStatus = self
            .reported(ThunkSource::PostBulkStudents, async {
                let response = self
                    .post(transport::BULK_STUDENTS_UPLOAD, &request)
                    .await?;
                transport::decode_json(response).await
            })
            .await?;
        info!(%cohort_id, inserted = status.inserted, "bulk upload finished");
        self.dispatch(actions::set_bulk_upload_status(status))
            .await;
        Ok(())
    }

    async fn dispatch(&self, action: Action) {
        self.dispatcher.dispatch(action).await;
    }

    /// Runs one request, turning its failure into that thunk's single
    /// `FETCH_ERROR`.
    async fn reported<T>(
        &self,
        source: ThunkSource,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        match request.await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(%source, error = %err, "request failed");
                self.dispatch(actions::fetch_error(&err, source)).await;
                Err(err)
            }
        }
    }

    async fn get(&self, endpoint: &str) -> Result<Response, ClientError> {
        let url = transport::endpoint_url(&self.base_url, endpoint)?;
        let response = self.http.get(url).send().await?;
        transport::check_status(response).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Response, ClientError> {
        let url = transport::endpoint_url(&self.base_url, endpoint)?;
        let response = self.http.post(url).json(body).send().await?;
        transport::check_status(response).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
