use eframe::egui;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use crate::fetch::{self, FetchEvent, FetchSummary};
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
enum RunState {
    Idle,
    Downloading,
    Done(FetchSummary),
    Failed(String),
}

pub struct FetcherApp {
    template_root: String,
    remote_url: String,
    refetch_all: bool,
    state: RunState,
    done_files: usize,
    failed_files: usize,
    total_files: usize,
    log_lines: Vec<String>,
    events: Option<Receiver<FetchEvent>>,
    cancel: Arc<AtomicBool>,
    settings_dir: Option<PathBuf>,
}

impl FetcherApp {
    pub fn new(settings_dir: Option<PathBuf>) -> Self {
        let settings = match &settings_dir {
            Some(dir) => Settings::load(dir),
            None => Settings::default(),
        };
        Self {
            template_root: settings.template_root,
            remote_url: settings.remote_url,
            refetch_all: settings.refetch_all,
            state: RunState::Idle,
            done_files: 0,
            failed_files: 0,
            total_files: 0,
            log_lines: Vec::new(),
            events: None,
            cancel: Arc::new(AtomicBool::new(false)),
            settings_dir,
        }
    }

    fn push_log(&mut self, line: impl Into<String>) {
        self.log_lines.push(line.into());
    }

    fn save_settings(&self) {
        let Some(dir) = &self.settings_dir else {
            return;
        };
        let settings = Settings {
            template_root: self.template_root.clone(),
            remote_url: self.remote_url.clone(),
            refetch_all: self.refetch_all,
        };
        if let Err(err) = settings.store(dir) {
            log::warn!("Could not save settings: {:#}", err);
        }
    }

    fn start_download(&mut self) {
        let root = self.template_root.trim().to_string();
        let base = self.remote_url.trim().to_string();
        if root.is_empty() || base.is_empty() {
            self.push_log("Please specify both the local root and remote URL.");
            return;
        }

        self.save_settings();
        self.done_files = 0;
        self.failed_files = 0;
        self.total_files = 0;
        self.cancel = Arc::new(AtomicBool::new(false));
        self.state = RunState::Downloading;

        let (tx, rx) = mpsc::channel();
        self.events = Some(rx);
        let cancel = Arc::clone(&self.cancel);
        let all_files = self.refetch_all;
        thread::spawn(move || {
            fetch::fetch_worker(PathBuf::from(root), base, all_files, tx, cancel)
        });
    }

    fn request_stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.push_log("Stopping after the current file...");
    }

    fn poll_events(&mut self) {
        let Some(events) = self.events.take() else {
            return;
        };
        let mut disconnected = false;
        loop {
            match events.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            if self.state == RunState::Downloading {
                let reason = "worker thread stopped unexpectedly".to_string();
                self.push_log(reason.clone());
                self.state = RunState::Failed(reason);
            }
        } else {
            self.events = Some(events);
        }
    }

    fn apply_event(&mut self, event: FetchEvent) {
        match event {
            FetchEvent::Started { total } => {
                self.total_files = total;
                self.push_log(format!("Found {} file(s) to download.", total));
            }
            FetchEvent::FileDone { url, path, .. } => {
                self.done_files += 1;
                self.push_log(format!("Downloaded: {} -> {}", url, path.display()));
            }
            FetchEvent::FileFailed { url, reason, .. } => {
                self.failed_files += 1;
                self.push_log(format!("Failed: {} ({})", url, reason));
            }
            FetchEvent::Finished { summary } => {
                self.push_log(format!(
                    "Finished: {} downloaded, {} failed, {} total.",
                    summary.downloaded, summary.failed, summary.total
                ));
                self.state = RunState::Done(summary);
            }
            FetchEvent::Aborted { reason } => {
                self.push_log(reason.clone());
                self.state = RunState::Failed(reason);
            }
        }
    }

    fn progress_fraction(&self) -> f32 {
        if self.total_files == 0 {
            return 0.0;
        }
        (self.done_files + self.failed_files) as f32 / self.total_files as f32
    }

    fn status_text(&self) -> String {
        match &self.state {
            RunState::Idle => "Idle".to_string(),
            RunState::Downloading => format!(
                "Downloading {}/{}",
                self.done_files + self.failed_files,
                self.total_files
            ),
            RunState::Done(summary) => format!(
                "Done: {} downloaded, {} failed",
                summary.downloaded, summary.failed
            ),
            RunState::Failed(reason) => format!("Error: {}", reason),
        }
    }
}

impl eframe::App for FetcherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.label("Local Root Path:");
            ui.horizontal(|ui| {
                let width = (ui.available_width() - 80.0).max(120.0);
                ui.add_sized(
                    [width, 20.0],
                    egui::TextEdit::singleline(&mut self.template_root)
                        .hint_text("Folder containing the template files"),
                );
                if ui.button("Browse").clicked() {
                    if let Some(folder) = rfd::FileDialog::new()
                        .set_title("Select Local Root Folder")
                        .pick_folder()
                    {
                        self.template_root = folder.display().to_string();
                        self.save_settings();
                    }
                }
            });

            ui.add_space(6.0);
            ui.label("Remote Root URL:");
            ui.add(
                egui::TextEdit::singleline(&mut self.remote_url)
                    .hint_text("https://demo.example.com/template")
                    .desired_width(f32::INFINITY),
            );

            ui.add_space(6.0);
            if ui
                .checkbox(&mut self.refetch_all, "Refetch all image files")
                .on_hover_text("Download every image, not just empty or stub files")
                .changed()
            {
                self.save_settings();
            }

            ui.add_space(6.0);
            let running = self.state == RunState::Downloading;
            ui.horizontal(|ui| {
                if running {
                    if ui.button("Stop").clicked() {
                        self.request_stop();
                    }
                    ui.spinner();
                } else if ui.button("Start Download").clicked() {
                    self.start_download();
                }
                ui.label(self.status_text());
            });

            ui.add_space(6.0);
            let fraction = self.progress_fraction();
            ui.add(egui::ProgressBar::new(fraction));
            ui.vertical_centered(|ui| {
                ui.label(format!("{}%", (fraction * 100.0).round() as u32));
            });

            ui.add_space(6.0);
            ui.separator();
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    for line in &self.log_lines {
                        ui.label(line);
                    }
                });
        });

        if self.state == RunState::Downloading {
            ctx.request_repaint();
        }
    }
}
