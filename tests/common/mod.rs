#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use tcstore_cli::auth::Credentials;
use tcstore_cli::config::Settings;
use tcstore_cli::transfer::{TransferObserver, WorkflowState};

pub const TOKEN: &str = "test-token";
pub const TENANT: &str = "tenant-1";
pub const USER: &str = "alice";
pub const PASSWORD: &str = "s3cret";
pub const ACCOUNT: &str = "AUTH_test";
pub const CONTAINER: &str = "box";

//===========
// Fake Server
//===========
#[derive(Default)]
pub struct FakeState {
    pub objects: BTreeMap<String, Vec<u8>>,
    pub fail_puts: HashSet<String>,
    pub fail_deletes: HashSet<String>,
    /// Upper bound the server applies to every listing page, whatever
    /// `limit` the client asks for.
    pub page_cap: Option<usize>,
    /// Answer every listing page as if no marker had been sent.
    pub ignore_marker: bool,
    /// "METHOD /path?query" for every storage/identity request received.
    pub requests: Vec<String>,
}

type Shared = Arc<Mutex<FakeState>>;

/// In-process identity + object-storage server speaking the same
/// paths, headers and status codes as the real service.
#[derive(Clone)]
pub struct FakeStorage {
    pub state: Shared,
    pub base_url: String,
}

impl FakeStorage {
    pub async fn start() -> FakeStorage {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = Router::new()
            .route("/identity/v2.0/tokens", post(issue_token))
            .route("/v1/{account}/{container}", get(list_container))
            .route(
                "/v1/{account}/{container}/{*object}",
                put(put_object).delete(delete_object),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake server");
        let addr = listener.local_addr().expect("Failed to read local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake server crashed");
        });

        FakeStorage {
            state,
            base_url: format!("http://{addr}"),
        }
    }

    pub fn identity_url(&self) -> String {
        format!("{}/identity/v2.0/tokens", self.base_url)
    }

    pub fn storage_url(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    /// Settings pointing at this server, with a tiny page size so listing
    /// has to follow markers.
    pub fn settings(&self) -> Settings {
        Settings {
            tenant_name: TENANT.into(),
            user_name: USER.into(),
            account: ACCOUNT.into(),
            container_name: CONTAINER.into(),
            identity_endpoint: self.identity_url(),
            storage_endpoint: self.storage_url(),
            max_in_flight: 4,
            list_page_size: 2,
        }
    }

    pub fn insert(&self, name: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(name.to_string(), data.to_vec());
    }

    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(name).cloned()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    pub fn fail_put(&self, name: &str) {
        self.state.lock().unwrap().fail_puts.insert(name.to_string());
    }

    pub fn fail_delete(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_deletes
            .insert(name.to_string());
    }

    pub fn cap_pages(&self, cap: usize) {
        self.state.lock().unwrap().page_cap = Some(cap);
    }

    pub fn ignore_marker(&self) {
        self.state.lock().unwrap().ignore_marker = true;
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_with_method(&self, method: &str) -> usize {
        let prefix = format!("{method} ");
        self.requests()
            .iter()
            .filter(|r| r.starts_with(&prefix))
            .count()
    }
}

pub fn credentials() -> Credentials {
    Credentials::new(TENANT, USER, PASSWORD)
}

fn record(state: &Shared, line: String) {
    state.lock().unwrap().requests.push(line);
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-auth-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == TOKEN)
        .unwrap_or(false)
}

async fn issue_token(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    record(&state, "POST /identity/v2.0/tokens".into());
    let auth = &body["auth"];
    let ok = auth["tenantName"] == TENANT
        && auth["passwordCredentials"]["username"] == USER
        && auth["passwordCredentials"]["password"] == PASSWORD;
    if ok {
        (
            StatusCode::OK,
            Json(json!({ "access": { "token": { "id": TOKEN, "expires": "2099-01-01T00:00:00Z" } } })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "code": 401, "message": "Unauthorized" } })),
        )
    }
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    marker: Option<String>,
}

async fn list_container(
    State(state): State<Shared>,
    Path((account, container)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let mut line = format!("GET /v1/{account}/{container}");
    if let Some(limit) = query.limit {
        line.push_str(&format!("?limit={limit}"));
    }
    if let Some(marker) = &query.marker {
        line.push_str(&format!("&marker={marker}"));
    }
    record(&state, line);

    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, String::new());
    }
    if account != ACCOUNT || container != CONTAINER {
        return (StatusCode::NOT_FOUND, String::new());
    }

    let guard = state.lock().unwrap();
    let marker = if guard.ignore_marker {
        None
    } else {
        query.marker.as_ref()
    };
    let limit = query
        .limit
        .unwrap_or(usize::MAX)
        .min(guard.page_cap.unwrap_or(usize::MAX));
    let names: Vec<&String> = guard
        .objects
        .keys()
        .filter(|k| marker.map(|m| *k > m).unwrap_or(true))
        .take(limit)
        .collect();

    // Paged requests get 204 once nothing is left; a bare GET is the
    // container check and always answers 200.
    if names.is_empty() && query.limit.is_some() {
        return (StatusCode::NO_CONTENT, String::new());
    }
    let mut body = String::new();
    for name in names {
        body.push_str(name);
        body.push('\n');
    }
    (StatusCode::OK, body)
}

async fn put_object(
    State(state): State<Shared>,
    Path((account, container, object)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    record(&state, format!("PUT /v1/{account}/{container}/{object}"));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    if account != ACCOUNT || container != CONTAINER {
        return StatusCode::NOT_FOUND;
    }
    let mut guard = state.lock().unwrap();
    if guard.fail_puts.contains(&object) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    guard.objects.insert(object, body.to_vec());
    StatusCode::CREATED
}

async fn delete_object(
    State(state): State<Shared>,
    Path((account, container, object)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> StatusCode {
    record(&state, format!("DELETE /v1/{account}/{container}/{object}"));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let mut guard = state.lock().unwrap();
    if guard.fail_deletes.contains(&object) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    match guard.objects.remove(&object) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

//=================
// Observer
//=================
#[derive(Default, Debug)]
pub struct Recorder {
    pub states: Vec<WorkflowState>,
    pub progress: Vec<f64>,
}

impl TransferObserver for Recorder {
    fn on_state(&mut self, state: &WorkflowState) {
        self.states.push(state.clone());
    }

    fn on_progress(&mut self, fraction: f64) {
        self.progress.push(fraction);
    }
}
