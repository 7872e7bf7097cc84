//! Output formatting and progress reporting

use std::sync::{Mutex, MutexGuard, PoisonError};

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use listsweep::{Item, Notice, NoticeLevel, SelectionView, UiSink};

/// Progress reporter for deletion jobs and notices.
///
/// Shared between the coordinator (job progress) and the automation (notices),
/// so every method takes `&self`.
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Mutex<Option<ProgressBar>>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: Mutex::new(None),
            use_color,
            quiet,
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.progress_bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a progress bar over `total` items
    pub fn start_progress(&self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        *self.bar() = Some(pb);
    }

    /// Move the bar to `current` of `total`
    pub fn set_position(&self, current: u64, total: u64) {
        if let Some(ref pb) = *self.bar() {
            pb.set_length(total);
            pb.set_position(current);
        }
    }

    /// Whether a bar is showing
    #[must_use]
    pub fn has_progress(&self) -> bool {
        self.bar().is_some()
    }

    /// Remove the bar
    pub fn clear_progress(&self) {
        if let Some(pb) = self.bar().take() {
            pb.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        let bar = self.bar();
        match *bar {
            Some(ref pb) => pb.println(text),
            None => {
                let _ = self.term.write_line(text);
            }
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, message: &str, paint: fn(&str) -> String) {
        let prefix = if self.use_color {
            paint(symbol)
        } else {
            plain.to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.prefixed("✓", "OK", message, |s| style(s).green().bold().to_string());
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        self.prefixed("✗", "ERROR", message, |s| style(s).red().bold().to_string());
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.prefixed("⚠", "WARN", message, |s| style(s).yellow().bold().to_string());
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.prefixed("ℹ", "INFO", message, |s| style(s).blue().bold().to_string());
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.line("");
        self.line(&styled);
    }

    /// Ask a yes/no question on the terminal; anything but `y`/`yes` is a no
    pub fn confirm(&self, question: &str) -> std::io::Result<bool> {
        self.term.write_str(&format!("{question} [y/N] "))?;
        let answer = self.term.read_line()?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

impl UiSink for ProgressReporter {
    fn refresh(&self, view: SelectionView) {
        tracing::debug!(count = view.count, can_delete = view.can_delete, "selection view");
    }

    fn notice(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => self.success(&notice.text),
            NoticeLevel::Info => self.info(&notice.text),
            NoticeLevel::Warning => self.warning(&notice.text),
            NoticeLevel::Error => self.failure(&notice.text),
        }
    }
}

/// One `list` row: marker, identifier, title
#[must_use]
pub fn item_row(item: &Item, selected: bool) -> String {
    let marker = if selected { "[x]" } else { "[ ]" };
    let title = if item.title.is_empty() {
        "(untitled)"
    } else {
        item.title.as_str()
    };
    format!("{marker} {:<16} {title}", item.id.as_str())
}
