//! Terminal progress indicators for downloads and completion monitoring

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::runtime::ExperimentState;

/// Draw only when a person is watching
pub fn interactive() -> bool {
    std::io::stderr().is_terminal()
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or(fallback)
}

// ─────────────────────────────────────────────────────────────────
// File transfers
// ─────────────────────────────────────────────────────────────────

/// Bar over the files of one task's working directory
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    pub fn new(task: &str, total_files: usize, enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_files as u64);
        bar.set_style(
            style(
                "{prefix:.bold} {bar:30.cyan/blue} {pos}/{len} {wide_msg}",
                ProgressStyle::default_bar(),
            )
            .progress_chars("█▓░"),
        );
        bar.set_prefix(task.to_string());
        Self { bar }
    }

    pub fn start_file(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    pub fn file_done(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

// ─────────────────────────────────────────────────────────────────
// Completion monitor
// ─────────────────────────────────────────────────────────────────

/// One line per task showing its latest status
pub struct StatusBoard {
    _multi: MultiProgress,
    bars: Vec<ProgressBar>,
    names: Vec<String>,
}

impl StatusBoard {
    pub fn new(names: Vec<String>, enabled: bool) -> Self {
        let multi = MultiProgress::new();
        let bars = names
            .iter()
            .map(|name| {
                if !enabled {
                    return ProgressBar::hidden();
                }
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style("  {spinner:.green} {msg}", ProgressStyle::default_spinner()));
                bar.set_message(format!("{} waiting", name));
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            })
            .collect();

        Self {
            _multi: multi,
            bars,
            names,
        }
    }

    /// Record the latest status of task `index`
    pub fn update(&self, index: usize, remote_ref: &str, state: ExperimentState) {
        let (Some(bar), Some(name)) = (self.bars.get(index), self.names.get(index)) else {
            return;
        };
        let line = format!("{} [{}] {}", name, remote_ref, state);
        if state.is_terminal() {
            bar.finish_with_message(line);
        } else {
            bar.set_message(line);
        }
    }

    /// Leave the final lines on screen
    pub fn finish(&self) {
        for bar in &self.bars {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}
