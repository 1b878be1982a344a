use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crate::download::{self, DownloadError};
use crate::remote;
use crate::scan::{self, ScanOutcome};

const USER_AGENT: &str = concat!("template-image-fetcher/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub remote_base: Url,
    pub files: Vec<PlannedFile>,
}

#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub local: PathBuf,
    pub url: Url,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub failed: usize,
    pub total: usize,
}

/// Progress messages sent from the worker thread to the window.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Started { total: usize },
    FileDone { index: usize, url: String, path: PathBuf },
    FileFailed { index: usize, url: String, reason: String },
    Finished { summary: FetchSummary },
    /// The pass never got going: bad root, bad URL, or nothing to fetch.
    Aborted { reason: String },
}

/// Pair every file that needs fetching with its remote URL.
pub fn build_plan(outcome: &ScanOutcome, base: &Url, all_files: bool) -> Result<FetchPlan> {
    let mut files = Vec::new();
    for file in &outcome.files {
        if !all_files && !file.needs_fetch() {
            continue;
        }
        let url = remote::remote_url_for(base, &file.relative)
            .with_context(|| format!("cannot build URL for {}", file.relative.display()))?;
        files.push(PlannedFile {
            local: file.path.clone(),
            url,
        });
    }
    Ok(FetchPlan {
        remote_base: base.clone(),
        files,
    })
}

/// Execute a plan sequentially, emitting one event per file.
///
/// Failures never abort the pass. The cancellation flag is checked between
/// files, so a stop request finishes the in-flight transfer first.
pub fn run(
    plan: &FetchPlan,
    client: &Client,
    tx: &Sender<FetchEvent>,
    cancel: &AtomicBool,
) -> FetchSummary {
    let total = plan.files.len();
    let mut summary = FetchSummary {
        total,
        ..FetchSummary::default()
    };
    let _ = tx.send(FetchEvent::Started { total });

    for (index, file) in plan.files.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            log::info!("Download pass cancelled after {} of {} files", index, total);
            break;
        }
        match download::fetch_image(client, &file.url, &file.local) {
            Ok(_) => {
                summary.downloaded += 1;
                let _ = tx.send(FetchEvent::FileDone {
                    index,
                    url: file.url.to_string(),
                    path: file.local.clone(),
                });
            }
            Err(err) => {
                summary.failed += 1;
                log::warn!("Download of {} failed: {}", file.url, err);
                let _ = tx.send(FetchEvent::FileFailed {
                    index,
                    url: file.url.to_string(),
                    reason: failure_reason(&err),
                });
            }
        }
    }

    let _ = tx.send(FetchEvent::Finished { summary });
    summary
}

fn failure_reason(err: &DownloadError) -> String {
    match err {
        DownloadError::Status(status) => format!("status {}", status),
        other => other.to_string(),
    }
}

/// Entry point for the background thread spawned by the window.
pub fn fetch_worker(
    root: PathBuf,
    base_text: String,
    all_files: bool,
    tx: Sender<FetchEvent>,
    cancel: Arc<AtomicBool>,
) {
    if let Err(err) = run_pass(&root, &base_text, all_files, &tx, &cancel) {
        let reason = format!("{:#}", err);
        log::error!("Fetch pass aborted: {}", reason);
        let _ = tx.send(FetchEvent::Aborted { reason });
    }
}

fn run_pass(
    root: &std::path::Path,
    base_text: &str,
    all_files: bool,
    tx: &Sender<FetchEvent>,
    cancel: &AtomicBool,
) -> Result<()> {
    let base = remote::validate_base(base_text)?;
    let outcome = scan::scan_template_root(root)?;

    let plan = build_plan(&outcome, &base, all_files)?;
    if plan.files.is_empty() {
        if outcome.files.is_empty() {
            bail!("no image files found under {}", root.display());
        }
        bail!(
            "all {} image file(s) look populated; check 'Refetch all image files' to force a pass",
            outcome.files.len()
        );
    }

    log::info!(
        "Fetching {} file(s) from {}",
        plan.files.len(),
        plan.remote_base
    );

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    run(&plan, &client, tx, cancel);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{FileState, ScannedFile};
    use std::sync::mpsc;

    fn outcome_with(states: &[(&str, FileState)]) -> ScanOutcome {
        ScanOutcome {
            files: states
                .iter()
                .map(|(rel, state)| ScannedFile {
                    path: PathBuf::from("/tmp/root").join(rel),
                    relative: PathBuf::from(rel),
                    len: 4,
                    state: *state,
                })
                .collect(),
            skipped: 0,
        }
    }

    #[test]
    fn plan_keeps_only_files_needing_a_fetch_by_default() {
        let outcome = outcome_with(&[
            ("img/empty.png", FileState::Empty),
            ("img/stub.jpg", FileState::Placeholder),
            ("img/real.jpg", FileState::Populated),
        ]);
        let base = remote::validate_base("http://demo.example.com").unwrap();

        let plan = build_plan(&outcome, &base, false).unwrap();
        assert_eq!(plan.files.len(), 2);
        assert_eq!(
            plan.files[0].url.as_str(),
            "http://demo.example.com/img/empty.png"
        );
        assert_eq!(
            plan.files[1].url.as_str(),
            "http://demo.example.com/img/stub.jpg"
        );
    }

    #[test]
    fn plan_keeps_everything_when_all_files_is_set() {
        let outcome = outcome_with(&[
            ("img/stub.jpg", FileState::Placeholder),
            ("img/real.jpg", FileState::Populated),
        ]);
        let base = remote::validate_base("http://demo.example.com").unwrap();

        let plan = build_plan(&outcome, &base, true).unwrap();
        assert_eq!(plan.files.len(), 2);
    }

    #[test]
    fn cancelled_run_reports_started_and_finished_only() {
        let base = remote::validate_base("http://demo.example.com").unwrap();
        let plan = FetchPlan {
            remote_base: base.clone(),
            files: vec![PlannedFile {
                local: PathBuf::from("/tmp/root/img/a.png"),
                url: base.join("img/a.png").unwrap(),
            }],
        };
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(true);
        let client = Client::new();

        let summary = run(&plan, &client, &tx, &cancel);

        assert_eq!(summary, FetchSummary { downloaded: 0, failed: 0, total: 1 });
        assert!(matches!(rx.try_recv(), Ok(FetchEvent::Started { total: 1 })));
        assert!(matches!(
            rx.try_recv(),
            Ok(FetchEvent::Finished { summary }) if summary.total == 1
        ));
        assert!(rx.try_recv().is_err());
    }
}
