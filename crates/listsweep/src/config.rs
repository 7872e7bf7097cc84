//! YAML configuration.
//!
//! Every field is optional; an empty document yields the defaults.
//!
//! ```yaml
//! page_url: https://www.youtube.com/playlist?list=WL
//! timings:
//!   pacing_ms: 2000
//!   menu_wait: { attempts: 30, interval_ms: 100 }
//! selectors:
//!   menu_trigger: ["#my-menu-button"]
//! phrases: ["aus „Später ansehen“ entfernen"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::locator::{Role, SelectorTable};
use crate::result::{SweepError, SweepResult};
use crate::wait::PollOptions;

/// Default list page
pub const DEFAULT_PAGE_URL: &str = "https://www.youtube.com/playlist?list=WL";

/// Delays and polling budgets, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Settle after scrolling the menu trigger into view
    pub trigger_scroll_settle_ms: u64,
    /// Settle after focusing any control
    pub focus_settle_ms: u64,
    /// Waiting for the action menu to render
    pub menu_wait: PollOptions,
    /// Searching the open menu for a remove option
    pub option_match: PollOptions,
    /// Settle after dismissing a menu with no remove option
    pub dismiss_settle_ms: u64,
    /// Settle after scrolling the remove option into view
    pub option_scroll_settle_ms: u64,
    /// Settle before looking for a confirmation dialog
    pub confirm_settle_ms: u64,
    /// Waiting for a confirmation control
    pub confirm_wait: PollOptions,
    /// Settle after the last interaction of an item
    pub verify_settle_ms: u64,
    /// Pause between two items of a job
    pub pacing_ms: u64,
    /// Waiting for the list page to render
    pub page_ready: PollOptions,
    /// Pause before retrying select-all after enabling the mode
    pub select_all_retry_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            trigger_scroll_settle_ms: 500,
            focus_settle_ms: 100,
            menu_wait: PollOptions::new(20, 100),
            option_match: PollOptions::new(10, 300),
            dismiss_settle_ms: 300,
            option_scroll_settle_ms: 200,
            confirm_settle_ms: 800,
            confirm_wait: PollOptions::new(20, 100),
            verify_settle_ms: 1000,
            pacing_ms: 1500,
            page_ready: PollOptions::new(20, 500),
            select_all_retry_ms: 500,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// List page to open
    pub page_url: String,
    /// Delays and budgets
    pub timings: Timings,
    /// Extra queries per role, tried after the built-in ones
    pub selectors: BTreeMap<Role, Vec<String>>,
    /// Extra remove phrases, matched after the built-in ones
    pub phrases: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            page_url: DEFAULT_PAGE_URL.to_string(),
            timings: Timings::default(),
            selectors: BTreeMap::new(),
            phrases: Vec::new(),
        }
    }
}

impl SweepConfig {
    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> SweepResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn load(path: &Path) -> SweepResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    fn validate(&self) -> SweepResult<()> {
        let polls = [
            ("menu_wait", self.timings.menu_wait),
            ("option_match", self.timings.option_match),
            ("confirm_wait", self.timings.confirm_wait),
            ("page_ready", self.timings.page_ready),
        ];
        if let Some((name, _)) = polls.iter().find(|(_, poll)| poll.attempts == 0) {
            return Err(SweepError::Config {
                message: format!("timings.{name}.attempts must be at least 1"),
            });
        }
        if self.page_url.trim().is_empty() {
            return Err(SweepError::Config {
                message: "page_url must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Built-in selector table extended with the configured extras
    #[must_use]
    pub fn selector_table(&self) -> SelectorTable {
        self.selectors
            .iter()
            .fold(SelectorTable::default(), |table, (role, extra)| {
                table.with_extra_queries(*role, extra.iter().cloned())
            })
            .with_extra_phrases(self.phrases.iter().cloned())
    }
}
