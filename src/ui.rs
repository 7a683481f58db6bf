// UI layer: an interactive menu built on `dialoguer`, with `indicatif`
// drawing batch progress. This is the "alert surface" of the client:
// confirmations are yes/no prompts and workflow reports are printed.
// All storage work is delegated to `transfer::TransferOrchestrator`.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthClient, Credentials};
use crate::config::Settings;
use crate::error::TransferError;
use crate::storage::StorageClient;
use crate::transfer::{TransferObserver, TransferOrchestrator, TransferReport, WorkflowState};

/// Above this many files the confirmation shows a count instead of paths.
pub const MAX_LISTED_PATHS: usize = 10;

/// Scale of the progress bar; fractions are mapped onto 0..=PROGRESS_SCALE.
const PROGRESS_SCALE: u64 = 1000;

type HttpOrchestrator = TransferOrchestrator<AuthClient, StorageClient>;

/// Main interactive menu. Runs until the user picks "Exit".
pub async fn main_menu(mut settings: Settings, settings_path: PathBuf) -> Result<()> {
    // Kept in memory for the session only.
    let mut password: Option<String> = None;

    loop {
        let items = vec![
            "Upload files",
            "Upload directory",
            "List files",
            "Delete all files",
            "Settings",
            "Exit",
        ];
        let selection = Select::new().items(&items).default(0).interact()?;
        match selection {
            0 => handle_upload_files(&settings, &mut password).await?,
            1 => handle_upload_directory(&settings, &mut password).await?,
            2 => handle_list_files(&settings, &mut password).await?,
            3 => handle_delete_all(&settings, &mut password).await?,
            4 => {
                handle_settings(&mut settings, &settings_path)?;
                // New user or tenant means the cached password is stale.
                password = None;
            }
            5 => break,
            _ => {}
        }
    }
    Ok(())
}

/// Confirmation text for an upload: every path when there are few,
/// otherwise just the count.
pub fn upload_prompt(paths: &[PathBuf]) -> String {
    if paths.len() <= MAX_LISTED_PATHS {
        paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        format!("Upload {} files", paths.len())
    }
}

async fn handle_upload_files(settings: &Settings, password: &mut Option<String>) -> Result<()> {
    let paths = prompt_paths()?;
    if paths.is_empty() {
        return Ok(());
    }
    println!("{}", upload_prompt(&paths));
    if !Confirm::new().with_prompt("Upload these files?").interact()? {
        return Ok(());
    }
    let Some(credentials) = session_credentials(settings, password)? else {
        return Ok(());
    };

    let mut orchestrator = build_orchestrator(settings)?;
    let mut bar = BarObserver::new()?;
    let cancel = watch_ctrl_c(&mut orchestrator);
    let report = orchestrator
        .upload_files(&credentials, &paths, &mut bar)
        .await;
    cancel.cancel();
    show_report(&report);
    forget_rejected_password(password, report.result.as_ref().err());
    Ok(())
}

async fn handle_upload_directory(settings: &Settings, password: &mut Option<String>) -> Result<()> {
    let input: String = Input::new()
        .with_prompt("Directory path")
        .allow_empty(true)
        .interact_text()?;
    let input = input.trim();
    if input.is_empty() {
        return Ok(());
    }
    let root = Path::new(input);
    if !root.is_dir() {
        println!("{} is not a directory.", root.display());
        return Ok(());
    }
    let Some(credentials) = session_credentials(settings, password)? else {
        return Ok(());
    };

    let mut orchestrator = build_orchestrator(settings)?;
    let mut bar = BarObserver::new()?;
    let cancel = watch_ctrl_c(&mut orchestrator);
    let report = orchestrator
        .upload_directory(&credentials, root, &mut bar)
        .await;
    cancel.cancel();
    show_report(&report);
    forget_rejected_password(password, report.result.as_ref().err());
    Ok(())
}

async fn handle_list_files(settings: &Settings, password: &mut Option<String>) -> Result<()> {
    let Some(credentials) = session_credentials(settings, password)? else {
        return Ok(());
    };
    let mut orchestrator = build_orchestrator(settings)?;
    let mut bar = BarObserver::new()?;
    let cancel = watch_ctrl_c(&mut orchestrator);
    // Listing has no batch to cancel, so Ctrl-C abandons the whole call.
    let listed = until_cancelled(&cancel, orchestrator.list_files(&credentials, &mut bar)).await;
    cancel.cancel();
    match listed {
        None => {
            bar.bar.finish_and_clear();
            println!("Cancelled.");
        }
        Some(Ok(names)) if names.is_empty() => println!("Container is empty."),
        Some(Ok(names)) => {
            for name in &names {
                println!("{name}");
            }
            println!("{} objects", names.len());
        }
        Some(Err(e)) => {
            println!("List failed: {e}");
            forget_rejected_password(password, Some(&e));
        }
    }
    Ok(())
}

async fn handle_delete_all(settings: &Settings, password: &mut Option<String>) -> Result<()> {
    let prompt = format!("Delete every object in [{}]?", settings.container_name);
    if !Confirm::new().with_prompt(prompt).default(false).interact()? {
        return Ok(());
    }
    let Some(credentials) = session_credentials(settings, password)? else {
        return Ok(());
    };

    let mut orchestrator = build_orchestrator(settings)?;
    let mut bar = BarObserver::new()?;
    let cancel = watch_ctrl_c(&mut orchestrator);
    let report = orchestrator.delete_all(&credentials, &mut bar).await;
    cancel.cancel();
    show_report(&report);
    forget_rejected_password(password, report.result.as_ref().err());
    Ok(())
}

/// Edit the persisted strings and write them out.
fn handle_settings(settings: &mut Settings, path: &Path) -> Result<()> {
    settings.tenant_name = prompt_with_default("Tenant name", &settings.tenant_name)?;
    settings.account = prompt_with_default("Account", &settings.account)?;
    settings.user_name = prompt_with_default("User name", &settings.user_name)?;
    settings.container_name = prompt_with_default("Container name", &settings.container_name)?;
    settings
        .save(path)
        .with_context(|| format!("Saving settings to {}", path.display()))?;
    println!("Settings saved to {}", path.display());
    Ok(())
}

fn prompt_with_default(prompt: &str, current: &str) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .allow_empty(true)
        .interact_text()?;
    Ok(value.trim().to_string())
}

/// Collect file paths one per prompt until an empty line.
fn prompt_paths() -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    loop {
        let input: String = Input::new()
            .with_prompt("File path (empty to finish)")
            .allow_empty(true)
            .interact_text()?;
        let input = input.trim();
        if input.is_empty() {
            break;
        }
        let path = PathBuf::from(input);
        if path.is_file() {
            paths.push(path);
        } else {
            println!("{} is not a file, skipped.", path.display());
        }
    }
    Ok(paths)
}

/// Credentials for this session, asking for the password once. `None`
/// when the settings are incomplete.
fn session_credentials(settings: &Settings, password: &mut Option<String>) -> Result<Option<Credentials>> {
    let missing = settings.missing_fields();
    if !missing.is_empty() {
        println!("Missing settings: {}. Open Settings first.", missing.join(", "));
        return Ok(None);
    }
    if password.is_none() {
        *password = Some(Password::new().with_prompt("Password").interact()?);
    }
    Ok(Some(Credentials::new(
        &settings.tenant_name,
        &settings.user_name,
        password.clone().unwrap_or_default(),
    )))
}

/// A rejected password is dropped so the next workflow asks again.
fn forget_rejected_password(password: &mut Option<String>, error: Option<&TransferError>) {
    if matches!(error, Some(TransferError::Authentication)) {
        *password = None;
    }
}

fn build_orchestrator(settings: &Settings) -> Result<HttpOrchestrator> {
    TransferOrchestrator::from_settings(settings).context("Failed to set up storage client")
}

/// Installs a fresh cancellation token on the orchestrator and cancels it
/// on Ctrl-C. Cancel the returned token once the workflow is done so the
/// watcher task exits.
fn watch_ctrl_c(orchestrator: &mut HttpOrchestrator) -> CancellationToken {
    let cancel = CancellationToken::new();
    orchestrator.set_cancellation(cancel.clone());
    let watcher = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = watcher.cancelled() => {}
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    watcher.cancel();
                }
            }
        }
    });
    cancel
}

/// Runs `fut` unless `cancel` fires first, in which case `fut` is dropped.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

fn show_report(report: &TransferReport) {
    println!("{}", report.message());
    if let Some(outcome) = report.outcome() {
        if outcome.failed > 0 {
            println!("{} of {} objects failed.", outcome.failed, outcome.total);
        }
    }
}

/// Drives an indicatif bar from workflow callbacks.
struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(PROGRESS_SCALE);
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{bar:40}] {percent}%")?
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Ok(BarObserver { bar })
    }
}

impl TransferObserver for BarObserver {
    fn on_state(&mut self, state: &WorkflowState) {
        match state {
            WorkflowState::Idle => {}
            WorkflowState::Authenticating => self.bar.set_message("Authenticating..."),
            WorkflowState::ContainerCheck => self.bar.set_message("Checking container..."),
            WorkflowState::InFlight(_) => self.bar.set_message("Transferring"),
            WorkflowState::Completed { .. } => self.bar.finish_and_clear(),
        }
    }

    fn on_progress(&mut self, fraction: f64) {
        self.bar
            .set_position((fraction * PROGRESS_SCALE as f64).round() as u64);
    }
}
