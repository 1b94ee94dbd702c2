use super::*;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::{collections::HashMap, time::Duration};
use tokio::{
    net::TcpListener,
    sync::{broadcast, Mutex},
};

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    canned: Arc<Mutex<HashMap<&'static str, (StatusCode, String)>>>,
}

impl MockState {
    async fn with_canned(self, path: &'static str, status: StatusCode, body: &str) -> Self {
        self.canned
            .lock()
            .await
            .insert(path, (status, body.to_string()));
        self
    }

    async fn record(&self, path: &str, body: Value) -> Option<HttpResponse> {
        self.requests.lock().await.push((path.to_string(), body));
        self.canned
            .lock()
            .await
            .get(path)
            .map(|(status, body)| (*status, body.clone()).into_response())
    }

    async fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().await.clone()
    }

    async fn paths(&self) -> Vec<String> {
        self.requests().await.into_iter().map(|(path, _)| path).collect()
    }
}

async fn campus_list(State(state): State<MockState>) -> HttpResponse {
    if let Some(canned) = state.record("/campusList", Value::Null).await {
        return canned;
    }
    Json(json!([
        { "campus_id": 1, "name": "Los Angeles" },
        { "campus_id": 2, "name": "New York" }
    ]))
    .into_response()
}

async fn program_list(State(state): State<MockState>, Json(body): Json<Value>) -> HttpResponse {
    if let Some(canned) = state.record("/programList", body.clone()).await {
        return canned;
    }
    let programs = match body["where"]["eq"]["campus_id"].as_i64() {
        Some(1) => json!([
            { "program_id": 10, "campus_id": 1, "name": "Immersive" },
            { "program_id": 11, "campus_id": 1, "name": "Part time" }
        ]),
        Some(3) => {
            tokio::time::sleep(Duration::from_millis(200)).await;
            json!([{ "program_id": 30, "campus_id": 3 }])
        }
        _ => json!([]),
    };
    Json(programs).into_response()
}

async fn cohort_list(State(state): State<MockState>, Json(body): Json<Value>) -> HttpResponse {
    if let Some(canned) = state.record("/cohortList", body.clone()).await {
        return canned;
    }
    let cohorts = match body["where"]["eq"]["program_id"].as_i64() {
        Some(10) => json!([
            { "cohort_id": 100, "program_id": 10, "name": "LA-14" },
            { "cohort_id": 101, "program_id": 10, "name": "LA-15" }
        ]),
        Some(11) => json!([{ "cohort_id": 110, "program_id": 11 }]),
        Some(30) => json!([{ "cohort_id": 300, "program_id": 30 }]),
        _ => json!([]),
    };
    Json(cohorts).into_response()
}

async fn student_list(State(state): State<MockState>, Json(body): Json<Value>) -> HttpResponse {
    if let Some(canned) = state.record("/studentList", body.clone()).await {
        return canned;
    }
    let eq = &body["where"]["eq"];
    let students = match (eq["cohort_id"].as_i64(), eq["student_id"].as_i64()) {
        (Some(100), _) => json!([
            { "student_id": 1, "cohort_id": 100, "first_name": "Ada", "status": "ACTIVE" },
            { "student_id": 2, "cohort_id": 100, "first_name": null, "status": null }
        ]),
        (Some(5), _) => json!([{ "student_id": 1, "name": null }]),
        (_, Some(7)) => json!([{ "student_id": 7, "cohort_id": 100, "first_name": "Grace" }]),
        _ => json!([]),
    };
    Json(students).into_response()
}

async fn update_student(State(state): State<MockState>, Json(body): Json<Value>) -> HttpResponse {
    if let Some(canned) = state.record("/updateStudent", body).await {
        return canned;
    }
    Json(json!({ "updated": 1 })).into_response()
}

async fn create_student(State(state): State<MockState>, Json(body): Json<Value>) -> HttpResponse {
    if let Some(canned) = state.record("/createStudent", body).await {
        return canned;
    }
    Json(json!({ "student_id": 99 })).into_response()
}

async fn image_upload(State(state): State<MockState>, mut multipart: Multipart) -> HttpResponse {
    let mut fields = serde_json::Map::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await.unwrap_or_default();
        let value = match file_name {
            Some(file_name) => json!({ "file_name": file_name, "len": bytes.len() }),
            None => json!(String::from_utf8_lossy(&bytes)),
        };
        fields.insert(name, value);
    }
    let body = Value::Object(fields);
    if let Some(canned) = state.record("/imageUpload", body.clone()).await {
        return canned;
    }
    Json(json!({
        "student_id": body["student_id"].as_str().and_then(|s| s.parse::<i64>().ok()),
        "image_type": body["image_type"],
        "name": body["name"]
    }))
    .into_response()
}

async fn bulk_upload(State(state): State<MockState>, Json(body): Json<Value>) -> HttpResponse {
    if let Some(canned) = state.record("/bulkStudentsUpload", body.clone()).await {
        return canned;
    }
    let inserted = body["data"].as_array().map(Vec::len).unwrap_or_default();
    let cohort_id = body["cohort_id"].clone();
    Json(json!({
        "cohort_id": cohort_id,
        "inserted": inserted,
        "student_ids": (1..=inserted as i64).collect::<Vec<_>>(),
        "message": format!("{inserted} students added to cohort {cohort_id}")
    }))
    .into_response()
}

async fn spawn_mock_server(state: MockState) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/campusList", get(campus_list))
        .route("/programList", post(program_list))
        .route("/cohortList", post(cohort_list))
        .route("/studentList", post(student_list))
        .route("/updateStudent", post(update_student))
        .route("/createStudent", post(create_student))
        .route("/imageUpload", post(image_upload))
        .route("/bulkStudentsUpload", post(bulk_upload))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

struct Harness {
    client: AdminClient,
    store: Arc<Store>,
    actions: broadcast::Receiver<Action>,
    mock: MockState,
}

impl Harness {
    async fn start() -> Self {
        Self::with_mock(MockState::default()).await
    }

    async fn with_mock(mock: MockState) -> Self {
        let server_url = spawn_mock_server(mock.clone()).await;
        Self::connect(&server_url, mock)
    }

    fn connect(server_url: &str, mock: MockState) -> Self {
        let store = Arc::new(Store::new());
        let actions = store.subscribe();
        let client = AdminClient::new(server_url, store.clone()).expect("client");
        Self {
            client,
            store,
            actions,
            mock,
        }
    }

    fn drain(&mut self) -> Vec<Action> {
        let mut drained = Vec::new();
        while let Ok(action) = self.actions.try_recv() {
            drained.push(action);
        }
        drained
    }

    fn drain_kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(Action::kind).collect()
    }
}

fn fetch_errors(actions: &[Action]) -> Vec<&actions::FetchFailure> {
    actions
        .iter()
        .filter_map(|action| match action {
            Action::FetchError(failure) => Some(failure),
            _ => None,
        })
        .collect()
}

async fn failing(path: &'static str) -> Harness {
    let mock = MockState::default()
        .with_canned(path, StatusCode::INTERNAL_SERVER_ERROR, "")
        .await;
    Harness::with_mock(mock).await
}

fn assert_single_fetch_error(actions: &[Action], source: ThunkSource) {
    assert_eq!(actions.len(), 1, "unexpected actions: {actions:?}");
    let failures = fetch_errors(actions);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source, source);
    assert_eq!(failures[0].err, "Internal Server Error");
    assert!(failures[0].error);
}

fn student(value: Value) -> Student {
    serde_json::from_value(value).expect("student")
}

#[tokio::test]
async fn student_list_normalizes_nulls_and_selects_first() {
    let mut harness = Harness::start().await;
    harness
        .client
        .fetch_student_list(Some(CohortId(5)), None)
        .await
        .expect("fetch students");

    let requests = harness.mock.requests().await;
    assert_eq!(
        requests,
        vec![(
            "/studentList".to_string(),
            json!({ "where": { "eq": { "cohort_id": 5 }, "ne": { "status": "INACTIVE" } } })
        )]
    );

    let actions = harness.drain();
    assert_eq!(actions.len(), 2);
    assert_eq!(
        serde_json::to_value(&actions[0]).expect("json"),
        json!({
            "type": "SET_STUDENT_LIST",
            "payload": { "ids": [1], "byId": { "1": { "student_id": 1, "name": "" } } }
        })
    );
    assert_eq!(actions[1], actions::set_current_student(StudentId(1)));
}

#[tokio::test]
async fn campus_fetch_chains_down_to_students() {
    let mut harness = Harness::start().await;
    harness
        .client
        .fetch_campus_list(ListMode::FetchAll, Operation::Noop)
        .await
        .expect("fetch campuses");

    let requests = harness.mock.requests().await;
    let paths: Vec<_> = requests.iter().map(|(path, _)| path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["/campusList", "/programList", "/cohortList", "/studentList"]
    );
    assert_eq!(requests[1].1, json!({ "where": { "eq": { "campus_id": 1 } } }));
    assert_eq!(requests[2].1, json!({ "where": { "eq": { "program_id": 10 } } }));
    assert_eq!(requests[3].1["where"]["eq"], json!({ "cohort_id": 100 }));

    assert_eq!(
        harness.drain_kinds(),
        vec![
            "SET_CAMPUS_LIST",
            "SET_CURRENT_CAMPUS",
            "SET_PROGRAM_LIST",
            "SET_CURRENT_PROGRAM",
            "SET_COHORT_LIST",
            "SET_CURRENT_COHORT",
            "SET_STUDENT_LIST",
            "SET_CURRENT_STUDENT",
        ]
    );

    let state = harness.store.snapshot().await;
    assert_eq!(state.catalog.current_campus, Some(CampusId(1)));
    assert_eq!(state.catalog.current_program, Some(ProgramId(10)));
    assert_eq!(state.catalog.current_cohort, Some(CohortId(100)));
    assert_eq!(state.current_student_id, Some(StudentId(1)));
    assert_eq!(state.students.ids, vec![StudentId(1), StudentId(2)]);
    assert_eq!(
        state
            .students
            .get(StudentId(2))
            .and_then(|s| s.field("first_name")),
        Some(&json!(""))
    );
    assert!(state.dropdown.campuses.is_empty());
}

#[tokio::test]
async fn selecting_a_campus_fetches_only_its_programs() {
    let mut harness = Harness::start().await;
    harness
        .client
        .set_current_campus_fetch_programs(CampusId(2), ListMode::FetchAll, Operation::Noop)
        .await
        .expect("select campus");

    assert_eq!(
        harness.mock.requests().await,
        vec![(
            "/programList".to_string(),
            json!({ "where": { "eq": { "campus_id": 2 } } })
        )]
    );
    assert_eq!(
        harness.drain_kinds(),
        vec!["SET_CURRENT_CAMPUS", "SET_PROGRAM_LIST"]
    );
    assert!(harness.store.snapshot().await.catalog.programs.is_empty());
}

#[tokio::test]
async fn dropdown_edit_moves_current_student_to_first_cohort() {
    let harness = Harness::start().await;
    harness
        .client
        .fetch_student_list(None, Some(StudentId(7)))
        .await
        .expect("load student");

    harness
        .client
        .fetch_cohort_list(ProgramId(11), ListMode::Dropdown, Operation::Edit)
        .await
        .expect("dropdown cohorts");

    let state = harness.store.snapshot().await;
    assert_eq!(state.dropdown.cohorts.ids, vec![CohortId(110)]);
    assert!(state.catalog.cohorts.is_empty());
    let current = state.current_student.expect("current student");
    assert_eq!(current.cohort_id, Some(CohortId(110)));
    assert_eq!(
        state.students.get(StudentId(7)).and_then(|s| s.cohort_id),
        Some(CohortId(100))
    );
    assert_eq!(
        harness.mock.paths().await,
        vec!["/studentList", "/cohortList"]
    );
}

#[tokio::test]
async fn dropdown_add_writes_first_cohort_into_draft() {
    let mut harness = Harness::start().await;
    harness
        .client
        .fetch_program_list(CampusId(1), ListMode::Dropdown, Operation::Add)
        .await
        .expect("dropdown programs");

    let state = harness.store.snapshot().await;
    assert_eq!(state.dropdown.current_program, Some(ProgramId(10)));
    assert_eq!(state.new_student.get("cohort_id"), Some(&json!(100)));
    assert_eq!(state.catalog, state::Hierarchy::default());
    assert_eq!(harness.mock.paths().await, vec!["/programList", "/cohortList"]);
    assert_eq!(
        harness.drain_kinds(),
        vec![
            "SET_PROGRAM_DROPDOWN_LIST",
            "SET_CURRENT_PROGRAM",
            "SET_COHORT_DROPDOWN_LIST",
            "SET_NEW_STUDENT_DATA",
        ]
    );
}

#[tokio::test]
async fn dropdown_noop_only_sets_the_list() {
    let mut harness = Harness::start().await;
    harness
        .client
        .fetch_cohort_list(ProgramId(10), ListMode::Dropdown, Operation::Noop)
        .await
        .expect("dropdown cohorts");

    assert_eq!(harness.drain_kinds(), vec!["SET_COHORT_DROPDOWN_LIST"]);
    let state = harness.store.snapshot().await;
    assert!(state.new_student.is_empty());
    assert_eq!(state.dropdown.cohorts.len(), 2);
}

#[tokio::test]
async fn network_failure_dispatches_one_fetch_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut harness = Harness::connect(&format!("http://{addr}"), MockState::default());
    let err = harness
        .client
        .fetch_campus_list(ListMode::FetchAll, Operation::Noop)
        .await
        .expect_err("connection refused");
    assert!(matches!(err, ClientError::Transport(_)));

    let actions = harness.drain();
    assert_eq!(actions.len(), 1);
    let failures = fetch_errors(&actions);
    assert_eq!(failures[0].source, ThunkSource::FetchCampusList);
    assert!(failures[0].error);
}

#[tokio::test]
async fn child_failure_is_reported_once_by_the_child() {
    let mock = MockState::default()
        .with_canned("/programList", StatusCode::INTERNAL_SERVER_ERROR, "")
        .await;
    let mut harness = Harness::with_mock(mock).await;

    let err = harness
        .client
        .fetch_campus_list(ListMode::FetchAll, Operation::Noop)
        .await
        .expect_err("program list fails");
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));

    let actions = harness.drain();
    assert_eq!(
        actions.iter().map(Action::kind).collect::<Vec<_>>(),
        vec!["SET_CAMPUS_LIST", "SET_CURRENT_CAMPUS", "FETCH_ERROR"]
    );
    let failures = fetch_errors(&actions);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source, ThunkSource::FetchProgramList);
    assert_eq!(failures[0].err, "Internal Server Error");

    let state = harness.store.snapshot().await;
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.catalog.campuses.len(), 2);
}

#[tokio::test]
async fn server_error_message_is_surfaced() {
    let mock = MockState::default()
        .with_canned(
            "/updateStudent",
            StatusCode::NOT_FOUND,
            r#"{"code":"not_found","message":"student 404 not found"}"#,
        )
        .await;
    let mut harness = Harness::with_mock(mock).await;

    let ghost = student(json!({ "student_id": 404, "first_name": "ghost" }));
    let err = harness
        .client
        .post_current_student(&ghost)
        .await
        .expect_err("not found");
    assert_eq!(err.to_string(), "student 404 not found");

    let actions = harness.drain();
    let failures = fetch_errors(&actions);
    assert_eq!(actions.len(), 1);
    assert_eq!(failures[0].source, ThunkSource::PostCurrentStudent);
    assert_eq!(failures[0].err, "student 404 not found");
}

#[tokio::test]
async fn undecodable_list_body_is_a_fetch_error() {
    let mock = MockState::default()
        .with_canned("/campusList", StatusCode::OK, "not json")
        .await;
    let mut harness = Harness::with_mock(mock).await;

    let err = harness
        .client
        .fetch_campus_list(ListMode::Dropdown, Operation::Noop)
        .await
        .expect_err("decode failure");
    assert!(matches!(err, ClientError::Decode(_)));
    assert_eq!(harness.drain_kinds(), vec!["FETCH_ERROR"]);
}

#[tokio::test]
async fn post_current_student_sends_the_whole_record() {
    let mut harness = Harness::start().await;
    let grace = student(json!({ "student_id": 7, "cohort_id": 100, "first_name": "Grace" }));
    harness
        .client
        .post_current_student(&grace)
        .await
        .expect("update");

    assert_eq!(
        harness.mock.requests().await,
        vec![(
            "/updateStudent".to_string(),
            json!({
                "data": { "student_id": 7, "cohort_id": 100, "first_name": "Grace" },
                "where": { "eq": { "student_id": 7 } }
            })
        )]
    );
    assert!(harness.drain().is_empty());
}

#[tokio::test]
async fn new_student_accepts_empty_success_body() {
    let mock = MockState::default()
        .with_canned("/createStudent", StatusCode::OK, "")
        .await;
    let mut harness = Harness::with_mock(mock).await;

    let mut draft = Fields::new();
    draft.insert("first_name".into(), json!("Linus"));
    draft.insert("cohort_id".into(), json!(100));
    harness
        .client
        .post_new_student(&draft)
        .await
        .expect("create");

    assert_eq!(
        harness.mock.requests().await[0].1,
        json!({ "data": { "first_name": "Linus", "cohort_id": 100 } })
    );
    assert!(harness.drain().is_empty());
}

#[tokio::test]
async fn delete_soft_deletes_then_refetches_cohort() {
    let mut harness = Harness::start().await;
    harness
        .client
        .delete_current_student(shared::domain::STATUS_INACTIVE, StudentId(1), CohortId(100))
        .await
        .expect("delete");

    let requests = harness.mock.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0],
        (
            "/updateStudent".to_string(),
            json!({ "data": { "status": "INACTIVE" }, "where": { "eq": { "student_id": 1 } } })
        )
    );
    assert_eq!(requests[1].0, "/studentList");
    assert_eq!(requests[1].1["where"]["eq"], json!({ "cohort_id": 100 }));
    assert_eq!(
        harness.drain_kinds(),
        vec!["SET_STUDENT_LIST", "SET_CURRENT_STUDENT"]
    );
}

#[tokio::test]
async fn image_upload_posts_form_and_updates_current_student() {
    let mut harness = Harness::start().await;
    harness
        .client
        .fetch_student_list(Some(CohortId(100)), None)
        .await
        .expect("students");
    harness.drain();

    harness
        .client
        .post_student_image(
            StudentImage {
                name: "ada.png".into(),
                bytes: b"png-bytes".to_vec(),
                mime_type: Some("image/png".into()),
            },
            "bio_image",
            StudentId(1),
            CohortId(100),
        )
        .await
        .expect("upload");

    let requests = harness.mock.requests().await;
    let (path, form) = requests.last().expect("upload request");
    assert_eq!(path, "/imageUpload");
    assert_eq!(
        form,
        &json!({
            "image": { "file_name": "ada.png", "len": 9 },
            "name": "ada.png",
            "student_id": "1",
            "image_type": "bio_image",
            "cohort_id": "100"
        })
    );

    assert_eq!(
        harness.drain(),
        vec![actions::update_current_student("bio_image", "ada.png")]
    );
    let state = harness.store.snapshot().await;
    assert_eq!(
        state.current_student.and_then(|s| s.field("bio_image").cloned()),
        Some(json!("ada.png"))
    );
}

#[tokio::test]
async fn bulk_upload_status_lands_in_state() {
    let mut harness = Harness::start().await;
    let rows = vec![
        json!({ "first_name": "A" }).as_object().cloned().expect("row"),
        json!({ "first_name": "B" }).as_object().cloned().expect("row"),
    ];
    harness
        .client
        .post_bulk_students(rows, CohortId(100))
        .await
        .expect("bulk");

    assert_eq!(harness.drain_kinds(), vec!["SET_BULK_UPLOAD_STATUS"]);
    let status = harness
        .store
        .snapshot()
        .await
        .bulk_upload_status
        .expect("status");
    assert_eq!(status.cohort_id, CohortId(100));
    assert_eq!(status.inserted, 2);
    assert_eq!(status.student_ids, vec![StudentId(1), StudentId(2)]);
    assert_eq!(status.message, "2 students added to cohort 100");
}

#[tokio::test]
async fn stale_program_list_is_dropped() {
    let mut harness = Harness::start().await;
    let (slow, fast) = tokio::join!(
        harness
            .client
            .fetch_program_list(CampusId(3), ListMode::Dropdown, Operation::Noop),
        harness
            .client
            .fetch_program_list(CampusId(1), ListMode::Dropdown, Operation::Noop),
    );
    slow.expect("slow fetch");
    fast.expect("fast fetch");

    let state = harness.store.snapshot().await;
    assert_eq!(state.dropdown.programs.ids, vec![ProgramId(10), ProgramId(11)]);
    assert_eq!(state.dropdown.cohorts.ids, vec![CohortId(100), CohortId(101)]);

    let program_lists = harness
        .drain()
        .into_iter()
        .filter(|action| matches!(action, Action::SetProgramDropdownList(_)))
        .count();
    assert_eq!(program_lists, 1);

    let cohort_requests: Vec<_> = harness
        .mock
        .requests()
        .await
        .into_iter()
        .filter(|(path, _)| path == "/cohortList")
        .map(|(_, body)| body["where"]["eq"]["program_id"].clone())
        .collect();
    assert_eq!(cohort_requests, vec![json!(10)]);
}

#[tokio::test]
async fn selecting_a_campus_without_programs_clears_old_descendants() {
    let harness = Harness::start().await;
    harness
        .client
        .fetch_campus_list(ListMode::FetchAll, Operation::Noop)
        .await
        .expect("fetch campuses");
    harness
        .client
        .set_current_campus_fetch_programs(CampusId(2), ListMode::FetchAll, Operation::Noop)
        .await
        .expect("select campus 2");

    let state = harness.store.snapshot().await;
    assert_eq!(state.catalog.current_campus, Some(CampusId(2)));
    assert!(state.catalog.programs.is_empty());
    assert_eq!(state.catalog.current_program, None);
    assert!(state.catalog.cohorts.is_empty());
    assert_eq!(state.catalog.current_cohort, None);
    assert!(state.students.is_empty());
    assert_eq!(state.current_student_id, None);
    assert!(state.current_student.is_none());

    let last_request = harness.mock.requests().await.pop().expect("request");
    assert_eq!(last_request.0, "/programList");
}

#[tokio::test]
async fn cohort_list_failure_dispatches_only_fetch_error() {
    let mut harness = failing("/cohortList").await;
    harness
        .client
        .fetch_cohort_list(ProgramId(10), ListMode::FetchAll, Operation::Noop)
        .await
        .expect_err("cohort list fails");

    assert_single_fetch_error(&harness.drain(), ThunkSource::FetchCohortList);
    assert_eq!(harness.mock.paths().await, vec!["/cohortList"]);
    assert!(harness.store.snapshot().await.catalog.cohorts.is_empty());
}

#[tokio::test]
async fn student_list_failure_dispatches_only_fetch_error() {
    let mut harness = failing("/studentList").await;
    harness
        .client
        .fetch_student_list(Some(CohortId(100)), None)
        .await
        .expect_err("student list fails");

    assert_single_fetch_error(&harness.drain(), ThunkSource::FetchStudentList);
    let state = harness.store.snapshot().await;
    assert!(state.students.is_empty());
    assert_eq!(state.current_student_id, None);
}

#[tokio::test]
async fn new_student_failure_dispatches_only_fetch_error() {
    let mut harness = failing("/createStudent").await;
    let mut draft = Fields::new();
    draft.insert("first_name".into(), json!("Linus"));
    harness
        .client
        .post_new_student(&draft)
        .await
        .expect_err("create fails");

    assert_single_fetch_error(&harness.drain(), ThunkSource::PostNewStudent);
}

#[tokio::test]
async fn delete_failure_does_not_refetch_students() {
    let mut harness = failing("/updateStudent").await;
    harness
        .client
        .delete_current_student(shared::domain::STATUS_INACTIVE, StudentId(1), CohortId(100))
        .await
        .expect_err("delete fails");

    let actions = harness.drain();
    assert_single_fetch_error(&actions, ThunkSource::DeleteStudent);
    assert_eq!(
        serde_json::to_value(&actions[0]).expect("json")["payload"]["source"],
        json!("deleteStudentThunk")
    );
    assert_eq!(harness.mock.paths().await, vec!["/updateStudent"]);
}

#[tokio::test]
async fn image_upload_failure_leaves_current_student_untouched() {
    let mut harness = failing("/imageUpload").await;
    harness
        .client
        .fetch_student_list(Some(CohortId(100)), None)
        .await
        .expect("students");
    harness.drain();

    harness
        .client
        .post_student_image(
            StudentImage {
                name: "ada.png".into(),
                bytes: b"png-bytes".to_vec(),
                mime_type: None,
            },
            "bio_image",
            StudentId(1),
            CohortId(100),
        )
        .await
        .expect_err("upload fails");

    assert_single_fetch_error(&harness.drain(), ThunkSource::PostStudentImage);
    let current = harness
        .store
        .snapshot()
        .await
        .current_student
        .expect("current student");
    assert_eq!(current.field("bio_image"), None);
}

#[tokio::test]
async fn bulk_upload_failure_sets_no_status() {
    let mut harness = failing("/bulkStudentsUpload").await;
    let rows = vec![json!({ "first_name": "A" }).as_object().cloned().expect("row")];
    harness
        .client
        .post_bulk_students(rows, CohortId(100))
        .await
        .expect_err("bulk fails");

    assert_single_fetch_error(&harness.drain(), ThunkSource::PostBulkStudents);
    assert!(harness.store.snapshot().await.bulk_upload_status.is_none());
}
