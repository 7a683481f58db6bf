// Transfer workflows. Every workflow follows the same path:
// `Idle -> Authenticating -> ContainerCheck -> InFlight -> Completed`.
// A missing token or container ends the workflow before anything is
// submitted to storage; once in flight, per-object failures are counted
// but never stop the rest of the batch.

use futures::FutureExt;
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthClient, AuthToken, Credentials, TokenSource};
use crate::config::{Settings, DEFAULT_MAX_IN_FLIGHT};
use crate::error::{Result, TransferError};
use crate::progress::{BatchOutcome, BatchProgressTracker, TransferTask};
use crate::storage::{ContainerRef, ObjectStore, StorageClient};
use crate::walk::{self, UploadEntry};

pub const TRACING_TARGET: &str = "tcstore_cli::transfer";

/// Timeout applied to each HTTP request, uploads included.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowKind {
    UploadFiles,
    UploadDirectory,
    DeleteAll,
    ListFiles,
}

impl WorkflowKind {
    /// Verb phrase used in user-facing reports.
    pub fn action(&self) -> &'static str {
        match self {
            WorkflowKind::UploadFiles | WorkflowKind::UploadDirectory => "upload files",
            WorkflowKind::DeleteAll => "delete files",
            WorkflowKind::ListFiles => "list files",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowState {
    /// Workflow accepted, nothing sent yet.
    Idle,
    Authenticating,
    ContainerCheck,
    /// Fraction of the batch completed so far.
    InFlight(f64),
    Completed { success: bool },
}

/// Receives state transitions and batch progress. Both methods default to
/// doing nothing.
pub trait TransferObserver: Send {
    fn on_state(&mut self, _state: &WorkflowState) {}
    fn on_progress(&mut self, _fraction: f64) {}
}

impl TransferObserver for () {}

/// What a finished workflow hands back to the user-facing surface.
#[derive(Debug)]
pub struct TransferReport {
    pub kind: WorkflowKind,
    pub result: Result<BatchOutcome>,
    pub elapsed: Duration,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.is_success())
    }

    pub fn outcome(&self) -> Option<&BatchOutcome> {
        self.result.as_ref().ok()
    }

    /// Human-readable summary, e.g.
    /// `"Success to upload files.\nElapsed time is 120 ms"`.
    pub fn message(&self) -> String {
        let elapsed = format!("Elapsed time is {} ms", self.elapsed.as_millis());
        match &self.result {
            Err(TransferError::Authentication) => "Failed to get a token".to_string(),
            Err(TransferError::ContainerNotFound { container }) => {
                format!("Invalid [{container}] container")
            }
            Err(e) => format!("Fail to {}: {e}", self.kind.action()),
            Ok(outcome) if outcome.cancelled > 0 => format!(
                "Cancelled after {} of {} objects.\n{elapsed}",
                outcome.completed(),
                outcome.total
            ),
            Ok(outcome) => format!(
                "{} to {}.\n{elapsed}",
                if outcome.is_success() { "Success" } else { "Fail" },
                self.kind.action()
            ),
        }
    }
}

fn http_client() -> Result<Client> {
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("tcstore/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Composes a token source and an object store into the user workflows.
pub struct TransferOrchestrator<A, S> {
    auth: A,
    store: Arc<S>,
    container: ContainerRef,
    max_in_flight: usize,
    cancel: CancellationToken,
}

impl TransferOrchestrator<AuthClient, StorageClient> {
    /// Builds the HTTP-backed orchestrator for the account and container
    /// named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = http_client()?;
        let auth = AuthClient::new(http.clone(), &settings.identity_endpoint)?;
        let store = StorageClient::new(
            http,
            &settings.storage_endpoint,
            settings.effective_list_page_size(),
        )?;
        let container = ContainerRef::new(&settings.account, &settings.container_name);
        Ok(TransferOrchestrator::new(auth, store, container)
            .with_max_in_flight(settings.effective_max_in_flight()))
    }
}

impl<A, S> TransferOrchestrator<A, S>
where
    A: TokenSource,
    S: ObjectStore,
{
    pub fn new(auth: A, store: S, container: ContainerRef) -> Self {
        TransferOrchestrator {
            auth,
            store: Arc::new(store),
            container,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Replaces the token that cancels the next batch. A cancelled token
    /// stays cancelled, so install a fresh one per workflow.
    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub fn container(&self) -> &ContainerRef {
        &self.container
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Uploads each path under its bare file name.
    pub async fn upload_files(
        &self,
        credentials: &Credentials,
        paths: &[PathBuf],
        observer: &mut dyn TransferObserver,
    ) -> TransferReport {
        let started = Instant::now();
        observer.on_state(&WorkflowState::Idle);
        let entries = async { Ok(walk::file_entries(paths)) };
        let result = self.upload(credentials, entries, observer).await;
        self.finish(WorkflowKind::UploadFiles, result, started, observer)
    }

    /// Uploads every file under `root`, keyed by its path relative to `root`.
    pub async fn upload_directory(
        &self,
        credentials: &Credentials,
        root: &Path,
        observer: &mut dyn TransferObserver,
    ) -> TransferReport {
        let started = Instant::now();
        observer.on_state(&WorkflowState::Idle);
        let entries = walk::walk_directory(root.to_path_buf());
        let result = self.upload(credentials, entries, observer).await;
        self.finish(WorkflowKind::UploadDirectory, result, started, observer)
    }

    /// Deletes every object the container lists.
    pub async fn delete_all(
        &self,
        credentials: &Credentials,
        observer: &mut dyn TransferObserver,
    ) -> TransferReport {
        let started = Instant::now();
        observer.on_state(&WorkflowState::Idle);
        let result = self.delete_listed(credentials, observer).await;
        self.finish(WorkflowKind::DeleteAll, result, started, observer)
    }

    /// Lists object names after the usual auth and container checks.
    pub async fn list_files(
        &self,
        credentials: &Credentials,
        observer: &mut dyn TransferObserver,
    ) -> Result<Vec<String>> {
        observer.on_state(&WorkflowState::Idle);
        let result = match self.prepare(credentials, observer).await {
            Ok(token) => self.list(&token).await,
            Err(e) => Err(e),
        };
        observer.on_state(&WorkflowState::Completed {
            success: result.is_ok(),
        });
        result
    }

    async fn prepare(
        &self,
        credentials: &Credentials,
        observer: &mut dyn TransferObserver,
    ) -> Result<AuthToken> {
        observer.on_state(&WorkflowState::Authenticating);
        let token = self
            .auth
            .request_token(credentials)
            .await
            .ok_or(TransferError::Authentication)?;

        observer.on_state(&WorkflowState::ContainerCheck);
        if !self.store.container_exists(&token, &self.container).await {
            return Err(TransferError::ContainerNotFound {
                container: self.container.container.clone(),
            });
        }
        Ok(token)
    }

    async fn list(&self, token: &AuthToken) -> Result<Vec<String>> {
        self.store
            .list_objects(token, &self.container)
            .await
            .ok_or_else(|| TransferError::Listing {
                container: self.container.container.clone(),
            })
    }

    /// `entries` is only polled once the container check has passed.
    async fn upload<E>(
        &self,
        credentials: &Credentials,
        entries: E,
        observer: &mut dyn TransferObserver,
    ) -> Result<BatchOutcome>
    where
        E: Future<Output = Result<Vec<UploadEntry>>>,
    {
        let token = self.prepare(credentials, observer).await?;
        let entries = entries.await?;
        let tasks: Vec<TransferTask> = entries
            .into_iter()
            .map(|entry| self.upload_task(token.clone(), entry))
            .collect();
        Ok(self.run_batch(tasks, observer).await)
    }

    async fn delete_listed(
        &self,
        credentials: &Credentials,
        observer: &mut dyn TransferObserver,
    ) -> Result<BatchOutcome> {
        let token = self.prepare(credentials, observer).await?;
        let names = self.list(&token).await?;
        let tasks: Vec<TransferTask> = names
            .into_iter()
            .map(|name| self.delete_task(token.clone(), name))
            .collect();
        Ok(self.run_batch(tasks, observer).await)
    }

    /// Reads the file and PUTs it. A read error counts as a failed task.
    fn upload_task(&self, token: AuthToken, entry: UploadEntry) -> TransferTask {
        let store = Arc::clone(&self.store);
        let object = self.container.object(entry.object_name);
        async move {
            let body = match tokio::fs::read(&entry.path).await {
                Ok(body) => body,
                Err(e) => {
                    let err = TransferError::io(&entry.path, e);
                    tracing::warn!(target: TRACING_TARGET, object = %object.name, error = %err, "Skipping upload");
                    return false;
                }
            };
            store.upload_object(&token, &object, body).await
        }
        .boxed()
    }

    fn delete_task(&self, token: AuthToken, name: String) -> TransferTask {
        let store = Arc::clone(&self.store);
        let object = self.container.object(name);
        async move { store.delete_object(&token, &object).await }.boxed()
    }

    async fn run_batch(
        &self,
        tasks: Vec<TransferTask>,
        observer: &mut dyn TransferObserver,
    ) -> BatchOutcome {
        observer.on_state(&WorkflowState::InFlight(0.0));
        let tracker = BatchProgressTracker::with_cancellation(self.max_in_flight, self.cancel.clone());
        tracker
            .run(tasks, |fraction| {
                observer.on_state(&WorkflowState::InFlight(fraction));
                observer.on_progress(fraction);
            })
            .await
    }

    fn finish(
        &self,
        kind: WorkflowKind,
        result: Result<BatchOutcome>,
        started: Instant,
        observer: &mut dyn TransferObserver,
    ) -> TransferReport {
        let report = TransferReport {
            kind,
            result,
            elapsed: started.elapsed(),
        };
        match &report.result {
            Ok(outcome) => tracing::info!(
                target: TRACING_TARGET,
                workflow = ?kind,
                container = %self.container,
                total = outcome.total,
                succeeded = outcome.succeeded,
                failed = outcome.failed,
                cancelled = outcome.cancelled,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Workflow finished"
            ),
            Err(e) => tracing::warn!(
                target: TRACING_TARGET,
                workflow = ?kind,
                container = %self.container,
                error = %e,
                "Workflow aborted"
            ),
        }
        observer.on_state(&WorkflowState::Completed {
            success: report.is_success(),
        });
        report
    }
}
