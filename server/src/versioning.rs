//! Best-effort git versioning of collection files.
//!
//! The file store only knows an `mpsc::Sender<ChangeEvent>`. A detached
//! worker task drains the queue and commits each changed file into the
//! configured repository, optionally pushing afterwards. Failures are logged
//! and dropped; they never reach the request that caused the change.

use std::path::{Path, PathBuf};
use std::process::Output;

use content::ResourceKind;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Queue depth between writers and the versioning worker.
pub const CHANGE_QUEUE_CAPACITY: usize = 64;

/// A collection file was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ResourceKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersioningConfig {
    /// Working tree of the repository the collection files live in.
    pub repo: PathBuf,
    /// Run `git push` after every commit.
    pub push: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum VersioningError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("git {step} failed: {stderr}")]
    Git { step: &'static str, stderr: String },
    #[error("cannot resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    Unchanged,
}

/// Spawn the worker and return the sender the file stores write into.
pub fn spawn_versioning_worker(
    config: VersioningConfig,
) -> (mpsc::Sender<ChangeEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANGE_QUEUE_CAPACITY);
    let handle = tokio::spawn(run_versioning_worker(rx, config));
    (tx, handle)
}

/// Long-lived worker. Exits when every sender has been dropped.
pub async fn run_versioning_worker(mut rx: mpsc::Receiver<ChangeEvent>, config: VersioningConfig) {
    tracing::info!(repo = %config.repo.display(), push = config.push, "Versioning worker started");

    while let Some(event) = rx.recv().await {
        match record_change(&config, &event).await {
            Ok(CommitOutcome::Committed) => {
                tracing::info!(kind = %event.kind, path = %event.path.display(), "Committed collection change");
            }
            Ok(CommitOutcome::Unchanged) => {
                tracing::debug!(kind = %event.kind, "Collection unchanged, nothing to commit");
            }
            Err(e) => {
                tracing::warn!(kind = %event.kind, path = %event.path.display(), "Versioning failed: {}", e);
            }
        }
    }

    tracing::info!("Change queue closed, versioning worker exiting");
}

/// Stage, commit and optionally push one changed collection file.
///
/// A relative event path is taken relative to the process working
/// directory, not to the repository.
pub async fn record_change(
    config: &VersioningConfig,
    event: &ChangeEvent,
) -> Result<CommitOutcome, VersioningError> {
    let path = std::path::absolute(&event.path).map_err(|source| VersioningError::Resolve {
        path: event.path.clone(),
        source,
    })?;
    let path = path.as_os_str();

    let add = git(&config.repo, "add", &["add", "--"], Some(path)).await?;
    check("add", &add)?;

    // Exit 0 means the staged file matches HEAD.
    let diff = git(
        &config.repo,
        "diff",
        &["diff", "--cached", "--quiet", "--"],
        Some(path),
    )
    .await?;
    match diff.status.code() {
        Some(0) => return Ok(CommitOutcome::Unchanged),
        Some(1) => {}
        _ => check("diff", &diff)?,
    }

    let message = format!("Update {}", event.kind);
    let commit = git(
        &config.repo,
        "commit",
        &["commit", "-m", message.as_str(), "--"],
        Some(path),
    )
    .await?;
    check("commit", &commit)?;

    if config.push {
        let push = git(&config.repo, "push", &["push"], None).await?;
        check("push", &push)?;
    }

    Ok(CommitOutcome::Committed)
}

/// `git -C <repo>` with untranslated messages.
fn git_command(repo: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.env("LC_ALL", "C").arg("-C").arg(repo);
    cmd
}

async fn git(
    repo: &Path,
    step: &'static str,
    args: &[&str],
    path: Option<&std::ffi::OsStr>,
) -> Result<Output, VersioningError> {
    let mut cmd = git_command(repo);
    cmd.args(args);
    if let Some(path) = path {
        cmd.arg(path);
    }
    tracing::debug!(step, repo = %repo.display(), "Running git");
    Ok(cmd.output().await?)
}

fn check(step: &'static str, output: &Output) -> Result<(), VersioningError> {
    if output.status.success() {
        return Ok(());
    }
    Err(VersioningError::Git {
        step,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
