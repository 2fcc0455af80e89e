//! indicatif bars for the import pipeline and the chat status spinner.

use crate::usecases::SyncProgress;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.yellow} {msg}";

pub fn status_spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Renders `SyncProgress` events. The bar is created once the file count is known.
pub struct SyncProgressBar {
    bar: Option<ProgressBar>,
}

impl SyncProgressBar {
    pub fn new() -> Self {
        Self { bar: None }
    }

    pub fn update(&mut self, event: SyncProgress) {
        match event {
            SyncProgress::Classified { files } => {
                let pb = ProgressBar::new(files as u64);
                pb.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                pb.set_message("downloading");
                self.bar = Some(pb);
            }
            SyncProgress::Downloaded { name, done, .. } => {
                if let Some(pb) = &self.bar {
                    pb.set_position(done as u64);
                    pb.set_message(name);
                }
            }
            SyncProgress::Uploading { files } => {
                if let Some(pb) = &self.bar {
                    pb.set_message(format!("uploading {} files", files));
                    pb.enable_steady_tick(Duration::from_millis(100));
                }
            }
            SyncProgress::Saved => self.finish(),
        }
    }

    pub fn finish(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

impl Default for SyncProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SyncProgressBar {
    fn drop(&mut self) {
        self.finish();
    }
}
