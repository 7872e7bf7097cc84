//! Automation core: the command surface over one list page.
//!
//! [`Automation`] owns the driver, the mode flag, the selection and the
//! deletion queue. Hosts talk to it through typed methods or through the
//! JSON request protocol in [`crate::message`].
//!
//! # Example
//!
//! ```no_run
//! use listsweep::automation::Automation;
//! use listsweep::config::SweepConfig;
//! use listsweep::mock::MockPage;
//!
//! # async fn demo() {
//! let page = MockPage::builder().ready().items(3).build();
//! let mut automation = Automation::builder(page)
//!     .with_config(&SweepConfig::default())
//!     .build();
//! automation.attach().await;
//! automation.select_all().await;
//! let report = automation.delete_selected().await;
//! # }
//! ```

use std::sync::Arc;

use crate::config::{SweepConfig, Timings};
use crate::driver::PageDriver;
use crate::filter;
use crate::identity::{self, Item, ItemId};
use crate::locator::{Role, SelectorTable};
use crate::machine::ItemDeleter;
use crate::message::{
    Coordinator, LogSink, Notice, NullCoordinator, Request, Response, StatusReport, UiSink,
};
use crate::queue::{CancelHandle, DeletionQueue, JobReport};
use crate::result::SweepResult;
use crate::selection::{SelectAllReport, SelectionManager};
use crate::storage::{self, MemoryStore, Store, KEY_ENABLED};
use crate::wait::{poll, settle};

// =============================================================================
// BUILDER
// =============================================================================

/// Builder for [`Automation`]
pub struct AutomationBuilder<D> {
    driver: D,
    table: SelectorTable,
    timings: Timings,
    store: Arc<dyn Store>,
    ui: Arc<dyn UiSink>,
    coordinator: Arc<dyn Coordinator>,
}

impl<D> std::fmt::Debug for AutomationBuilder<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationBuilder")
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl<D: PageDriver> AutomationBuilder<D> {
    /// Take selectors, phrases and timings from a configuration
    #[must_use]
    pub fn with_config(mut self, config: &SweepConfig) -> Self {
        self.table = config.selector_table();
        self.timings = config.timings;
        self
    }

    /// Use a custom selector table
    #[must_use]
    pub fn with_table(mut self, table: SelectorTable) -> Self {
        self.table = table;
        self
    }

    /// Use custom timings
    #[must_use]
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Persist mode and selection in `store`
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = store;
        self
    }

    /// Render selection changes and notices to `ui`
    #[must_use]
    pub fn with_ui(mut self, ui: Arc<dyn UiSink>) -> Self {
        self.ui = ui;
        self
    }

    /// Send job notifications to `coordinator`
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<dyn Coordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Build the automation (mode off, selection empty until [`Automation::attach`])
    #[must_use]
    pub fn build(self) -> Automation<D> {
        let deleter = ItemDeleter::new(self.table.clone(), self.timings);
        Automation {
            driver: self.driver,
            queue: DeletionQueue::new(deleter, self.timings.pacing_ms),
            selection: SelectionManager::new(self.store.clone(), self.ui.clone()),
            table: self.table,
            timings: self.timings,
            store: self.store,
            ui: self.ui,
            coordinator: self.coordinator,
            enabled: false,
        }
    }
}

// =============================================================================
// AUTOMATION
// =============================================================================

/// Command surface over one list page
pub struct Automation<D> {
    driver: D,
    table: SelectorTable,
    timings: Timings,
    store: Arc<dyn Store>,
    ui: Arc<dyn UiSink>,
    coordinator: Arc<dyn Coordinator>,
    selection: SelectionManager,
    queue: DeletionQueue,
    enabled: bool,
}

impl<D> std::fmt::Debug for Automation<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Automation")
            .field("enabled", &self.enabled)
            .field("selection", &self.selection)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<D: PageDriver> Automation<D> {
    /// Start building an automation over `driver`
    #[must_use]
    pub fn builder(driver: D) -> AutomationBuilder<D> {
        AutomationBuilder {
            driver,
            table: SelectorTable::default(),
            timings: Timings::default(),
            store: Arc::new(MemoryStore::new()),
            ui: Arc::new(LogSink),
            coordinator: Arc::new(NullCoordinator),
        }
    }

    /// The page driver
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Wait for the list page to render, then restore persisted state.
    ///
    /// Returns whether the page-ready marker was seen; on timeout the
    /// automation carries on regardless.
    pub async fn attach(&mut self) -> bool {
        let table = &self.table;
        let driver = &self.driver;
        let ready = poll(self.timings.page_ready, |_| async move {
            table.resolve(driver, Role::PageReady, None).await
        })
        .await;

        let seen = ready.is_success();
        if seen {
            tracing::info!(attempts = ready.attempts, "list page ready");
        } else {
            tracing::warn!(
                waited_ms = ready.elapsed.as_millis(),
                "page-ready marker not found, continuing anyway"
            );
        }

        self.restore();
        seen
    }

    fn restore(&mut self) {
        self.enabled = match storage::load::<bool>(self.store.as_ref(), KEY_ENABLED) {
            Ok(enabled) => enabled.unwrap_or(false),
            Err(err) => {
                tracing::warn!(error = %err, "could not restore mode");
                false
            }
        };
        self.selection.restore();
        tracing::debug!(enabled = self.enabled, selected = self.selection.size(), "state restored");
    }

    /// Scan the page for entries
    pub async fn scan_items(&self) -> Vec<Item> {
        identity::scan(&self.driver, &self.table).await
    }

    /// Whether automation mode is on
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The selection
    #[must_use]
    pub const fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.selection.clear();
        }
        if let Err(err) = storage::save(self.store.as_ref(), KEY_ENABLED, &enabled) {
            tracing::warn!(error = %err, "could not persist mode");
        }
        tracing::info!(enabled, "automation mode changed");
    }

    /// Flip automation mode; turning it off also clears the selection
    pub fn toggle_mode(&mut self) -> bool {
        let enabled = !self.enabled;
        self.set_enabled(enabled);
        self.ui.notice(if enabled {
            Notice::info("Bulk delete mode enabled")
        } else {
            Notice::info("Bulk delete mode disabled")
        });
        enabled
    }

    fn require_enabled(&self) -> bool {
        if !self.enabled {
            self.ui.notice(Notice::warning("Enable bulk delete mode first"));
        }
        self.enabled
    }

    /// Select one entry (mode must be on)
    pub fn select(&mut self, id: impl Into<ItemId>) -> bool {
        if !self.require_enabled() {
            return false;
        }
        self.selection.select(id.into());
        true
    }

    /// Deselect one entry (mode must be on)
    pub fn deselect(&mut self, id: impl Into<ItemId>) -> bool {
        if !self.require_enabled() {
            return false;
        }
        self.selection.deselect(&id.into());
        true
    }

    /// Select every entry on the page, enabling the mode first if needed
    pub async fn select_all(&mut self) -> Option<SelectAllReport> {
        if !self.enabled {
            tracing::info!("enabling mode before select-all");
            self.set_enabled(true);
            settle(self.timings.select_all_retry_ms).await;
        }

        let items = self.scan_items().await;
        if items.is_empty() {
            self.ui.notice(Notice::warning("No items found on this page"));
            return None;
        }

        let report = self.selection.select_all(items.into_iter().map(|item| item.id));
        self.ui.notice(if report.newly_selected == 0 {
            Notice::info(format!("All {} items were already selected", report.already_selected))
        } else if report.already_selected == 0 {
            Notice::success(format!("Selected {} items", report.newly_selected))
        } else {
            Notice::success(format!(
                "Selected {} more items ({} already selected)",
                report.newly_selected, report.already_selected
            ))
        });
        Some(report)
    }

    /// Empty the selection; returns how many were deselected
    pub fn deselect_all(&mut self) -> usize {
        let count = self.selection.deselect_all();
        self.ui.notice(if count == 0 {
            Notice::info("Nothing was selected")
        } else {
            Notice::success(format!("Deselected {count} items"))
        });
        count
    }

    fn reject_if_running(&self) -> bool {
        let running = self.queue.is_running();
        if running {
            self.ui.notice(Notice::warning("A deletion is already running"));
        }
        running
    }

    /// Delete the selected entries that are on the page
    pub async fn delete_selected(&mut self) -> Option<JobReport> {
        if self.reject_if_running() {
            return None;
        }
        if self.selection.size() == 0 {
            self.ui.notice(Notice::warning("No items selected"));
            return None;
        }

        let items: Vec<Item> = self
            .scan_items()
            .await
            .into_iter()
            .filter(|item| self.selection.contains(&item.id))
            .collect();
        if items.is_empty() {
            self.ui
                .notice(Notice::warning("None of the selected items are on this page"));
            return None;
        }
        Some(self.run_job(items).await)
    }

    /// Delete every entry on the page, ignoring any filter
    pub async fn delete_all(&mut self) -> Option<JobReport> {
        if self.reject_if_running() {
            return None;
        }
        let items = self.scan_items().await;
        if items.is_empty() {
            self.ui.notice(Notice::warning("No items found on this page"));
            return None;
        }
        Some(self.run_job(items).await)
    }

    async fn run_job(&mut self, items: Vec<Item>) -> JobReport {
        let report = self
            .queue
            .run(&self.driver, items, self.coordinator.as_ref(), &mut self.selection)
            .await;

        let failed = report.failed();
        self.ui.notice(if report.cancelled {
            Notice::info(format!(
                "Cancelled: removed {} of {} items",
                report.completed, report.total
            ))
        } else if failed > 0 {
            Notice::warning(format!(
                "Removed {} of {} items ({failed} failed)",
                report.completed, report.total
            ))
        } else {
            Notice::success(format!("Removed {} items", report.completed))
        });
        report
    }

    /// Show only entries whose title contains `term`; returns the visible count
    pub async fn filter(&self, term: &str) -> usize {
        let items = self.scan_items().await;
        filter::apply(&self.driver, &items, term).await
    }

    /// Handle that cancels the running job
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.queue.cancel_handle()
    }

    /// Current status
    pub async fn status(&self) -> StatusReport {
        StatusReport {
            enabled: self.enabled,
            selected_count: self.selection.size(),
            total_items: self
                .table
                .resolve_all(&self.driver, Role::ItemContainer, None)
                .await
                .len(),
            is_deleting: self.queue.is_running(),
        }
    }

    /// Answer one request
    pub async fn handle(&mut self, request: Request) -> Response {
        tracing::debug!(?request, "request");
        match request {
            Request::GetStatus => Response::Status(self.status().await),
            Request::ToggleMode => {
                self.toggle_mode();
                Response::Toggled { success: true }
            }
        }
    }

    /// Answer one JSON-encoded request with a JSON-encoded response
    pub async fn handle_json(&mut self, request: &str) -> SweepResult<String> {
        let response = match serde_json::from_str::<Request>(request) {
            Ok(request) => self.handle(request).await,
            Err(err) => {
                tracing::debug!(error = %err, "undecodable request");
                Response::unknown()
            }
        };
        Ok(serde_json::to_string(&response)?)
    }
}
