//! Per-item deletion state machine.
//!
//! Drives one entry from "selected" to a terminal [`DeletionOutcome`]:
//!
//! ```text
//! Locating -> MenuOpening -> MenuWaiting -> OptionMatching -> OptionActivating
//!          -> ConfirmWaiting -> [ConfirmActivating] -> Verifying -> Succeeded
//! ```
//!
//! Every state is bounded by a fixed delay or a polling budget from
//! [`Timings`]. Any state may end in `Failed`; failures are values, never
//! errors, and the machine keeps no state between calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Instrument;

use crate::config::Timings;
use crate::driver::{activate, ElementHandle, PageDriver};
use crate::identity::{self, Item};
use crate::locator::{Role, SelectorTable};
use crate::wait::{poll, settle};

/// States of one deletion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionState {
    /// Finding the entry's menu trigger
    Locating,
    /// Activating the trigger
    MenuOpening,
    /// Waiting for menu options to render
    MenuWaiting,
    /// Searching options for a remove phrase
    OptionMatching,
    /// Activating the remove option
    OptionActivating,
    /// Looking for a confirmation dialog
    ConfirmWaiting,
    /// Activating the confirmation control
    ConfirmActivating,
    /// Letting the page settle
    Verifying,
}

impl fmt::Display for DeletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why an attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// State the attempt failed in
    pub state: DeletionState,
    /// Human-readable reason
    pub reason: String,
}

impl Failure {
    fn new(state: DeletionState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.state, self.reason)
    }
}

/// Terminal result for one item of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionOutcome {
    /// The remove flow ran to the end
    Succeeded,
    /// Some state gave up; the job carries on
    Failed(Failure),
    /// The job was cancelled before this item started
    Skipped,
}

impl DeletionOutcome {
    /// Whether this outcome counts as a removal
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Whether the item was attempted at all
    #[must_use]
    pub const fn was_attempted(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// Runs the removal flow for single items
#[derive(Debug, Clone)]
pub struct ItemDeleter {
    table: SelectorTable,
    timings: Timings,
}

impl ItemDeleter {
    /// Create a deleter
    #[must_use]
    pub const fn new(table: SelectorTable, timings: Timings) -> Self {
        Self { table, timings }
    }

    /// Selector table in use
    #[must_use]
    pub const fn table(&self) -> &SelectorTable {
        &self.table
    }

    /// Run the full flow for one item
    pub async fn delete<D: PageDriver + ?Sized>(&self, driver: &D, item: &Item) -> DeletionOutcome {
        let span = tracing::info_span!("delete_item", id = %item.id);
        async {
            match self.run(driver, item).await {
                Ok(()) => {
                    tracing::info!("item removed");
                    DeletionOutcome::Succeeded
                }
                Err(failure) => {
                    tracing::warn!(state = %failure.state, reason = %failure.reason, "item failed");
                    DeletionOutcome::Failed(failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run<D: PageDriver + ?Sized>(&self, driver: &D, item: &Item) -> Result<(), Failure> {
        let trigger = self.locate_trigger(driver, item).await?;
        self.open_menu(driver, &trigger).await;
        self.wait_for_menu(driver).await?;
        self.choose_remove_option(driver).await?;
        self.confirm(driver).await?;

        tracing::debug!(state = %DeletionState::Verifying, "settling");
        settle(self.timings.verify_settle_ms).await;
        Ok(())
    }

    async fn locate_trigger<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        item: &Item,
    ) -> Result<ElementHandle, Failure> {
        let scope = if item.id.is_synthetic() {
            item.handle.clone()
        } else {
            identity::locate(driver, &self.table, &item.id)
                .await
                .unwrap_or_else(|| item.handle.clone())
        };

        self.table
            .resolve(driver, Role::MenuTrigger, Some(&scope))
            .await
            .ok_or_else(|| Failure::new(DeletionState::Locating, "menu trigger not found"))
    }

    async fn open_menu<D: PageDriver + ?Sized>(&self, driver: &D, trigger: &ElementHandle) {
        tracing::debug!(state = %DeletionState::MenuOpening, %trigger);
        if let Err(err) = driver.scroll_into_view(trigger).await {
            tracing::debug!(error = %err, "scroll failed");
        }
        settle(self.timings.trigger_scroll_settle_ms).await;
        if let Err(err) = driver.focus(trigger).await {
            tracing::debug!(error = %err, "focus failed");
        }
        settle(self.timings.focus_settle_ms).await;

        if let Err(err) = activate(driver, trigger).await {
            tracing::warn!(error = %err, "menu trigger rejected both activations");
        }
    }

    async fn wait_for_menu<D: PageDriver + ?Sized>(&self, driver: &D) -> Result<(), Failure> {
        let table = &self.table;
        let shown = poll(self.timings.menu_wait, |_| async move {
            (!table.resolve_all(driver, Role::MenuOption, None).await.is_empty()).then_some(())
        })
        .await;

        if shown.is_success() {
            tracing::debug!(attempts = shown.attempts, "menu rendered");
            Ok(())
        } else {
            Err(Failure::new(
                DeletionState::MenuWaiting,
                format!("menu did not render within {}ms", shown.elapsed.as_millis()),
            ))
        }
    }

    async fn choose_remove_option<D: PageDriver + ?Sized>(&self, driver: &D) -> Result<(), Failure> {
        let rejected = AtomicBool::new(false);
        let rejected_ref = &rejected;
        let this = self;
        let chosen = poll(self.timings.option_match, |attempt| async move {
            let option = this.find_remove_option(driver).await?;
            tracing::debug!(attempt, %option, state = %DeletionState::OptionActivating);
            if this.activate_option(driver, &option).await {
                Some(option)
            } else {
                rejected_ref.store(true, Ordering::Relaxed);
                None
            }
        })
        .await;

        if chosen.is_success() {
            return Ok(());
        }

        if let Err(err) = driver.click_outside().await {
            tracing::debug!(error = %err, "menu dismissal failed");
        }
        settle(self.timings.dismiss_settle_ms).await;

        Err(if rejected.load(Ordering::Relaxed) {
            Failure::new(DeletionState::OptionActivating, "remove option rejected activation")
        } else {
            Failure::new(DeletionState::OptionMatching, "no remove option in menu")
        })
    }

    async fn find_remove_option<D: PageDriver + ?Sized>(&self, driver: &D) -> Option<ElementHandle> {
        for option in self.table.resolve_all(driver, Role::MenuOption, None).await {
            let text = driver.text_content(&option).await.unwrap_or_default();
            if self.table.matches_remove_phrase(&text) {
                tracing::debug!(text = %text.trim(), "remove option matched");
                return Some(option);
            }
        }
        None
    }

    async fn activate_option<D: PageDriver + ?Sized>(&self, driver: &D, option: &ElementHandle) -> bool {
        if let Err(err) = driver.scroll_into_view(option).await {
            tracing::debug!(error = %err, "scroll failed");
        }
        settle(self.timings.option_scroll_settle_ms).await;
        if let Err(err) = driver.focus(option).await {
            tracing::debug!(error = %err, "focus failed");
        }
        settle(self.timings.focus_settle_ms).await;

        match activate(driver, option).await {
            Ok(how) => {
                tracing::debug!(?how, "remove option activated");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "remove option rejected both activations");
                false
            }
        }
    }

    async fn confirm<D: PageDriver + ?Sized>(&self, driver: &D) -> Result<(), Failure> {
        settle(self.timings.confirm_settle_ms).await;
        let table = &self.table;
        let found = poll(self.timings.confirm_wait, |_| async move {
            table.resolve(driver, Role::ConfirmControl, None).await
        })
        .await;

        let Some(control) = found.into_value() else {
            tracing::debug!("no confirmation needed");
            return Ok(());
        };

        tracing::debug!(state = %DeletionState::ConfirmActivating, %control);
        if let Err(err) = driver.focus(&control).await {
            tracing::debug!(error = %err, "focus failed");
        }
        settle(self.timings.focus_settle_ms).await;
        activate(driver, &control)
            .await
            .map(|_| ())
            .map_err(|err| Failure::new(DeletionState::ConfirmActivating, err.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::identity::{scan, ItemId};
    use crate::mock::{MockItem, MockPage};
    use tokio::time::Instant;

    fn deleter() -> ItemDeleter {
        ItemDeleter::new(SelectorTable::default(), Timings::default())
    }

    async fn only_item(page: &MockPage) -> Item {
        scan(page, &SelectorTable::default()).await.remove(0)
    }

    fn failed_in(outcome: &DeletionOutcome) -> Option<DeletionState> {
        match outcome {
            DeletionOutcome::Failed(failure) => Some(failure.state),
            _ => None,
        }
    }

    mod success_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_plain_removal() {
            let page = MockPage::builder().item(MockItem::new("a")).build();
            let item = only_item(&page).await;

            let outcome = deleter().delete(&page, &item).await;
            assert_eq!(outcome, DeletionOutcome::Succeeded);
            assert_eq!(page.deleted(), vec!["a".to_string()]);
            assert!(!page.was_called("click_outside"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_removal_with_confirmation() {
            let page = MockPage::builder()
                .item(MockItem::new("a").confirm_after_ms(400))
                .build();
            let item = only_item(&page).await;

            let outcome = deleter().delete(&page, &item).await;
            assert!(outcome.is_success());
            assert_eq!(page.deleted(), vec!["a".to_string()]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_confirm_control_fallback_query() {
            let page = MockPage::builder()
                .item(
                    MockItem::new("a")
                        .confirm_after_ms(0)
                        .confirm_selector(r#"button[aria-label*="Yes"]"#),
                )
                .build();
            let item = only_item(&page).await;

            assert!(deleter().delete(&page, &item).await.is_success());
            assert_eq!(page.deleted().len(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_synthetic_click_on_trigger() {
            let page = MockPage::builder()
                .item(MockItem::new("a").direct_click_fails())
                .build();
            let item = only_item(&page).await;

            assert!(deleter().delete(&page, &item).await.is_success());
            assert!(page.was_called("dispatch_click"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_synthetic_click_on_option() {
            let page = MockPage::builder()
                .item(MockItem::new("a").option_click_fails())
                .build();
            let item = only_item(&page).await;

            assert!(deleter().delete(&page, &item).await.is_success());
            assert_eq!(page.deleted(), vec!["a".to_string()]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_late_remove_option_is_found_by_repolling() {
            let page = MockPage::builder()
                .item(MockItem::new("a").remove_option_delay_ms(1200))
                .build();
            let item = only_item(&page).await;

            assert!(deleter().delete(&page, &item).await.is_success());
        }

        #[tokio::test(start_paused = true)]
        async fn test_japanese_menu() {
            let page = MockPage::builder()
                .item(MockItem::new("a").options(&["キューに追加", "「後で見る」から削除"]))
                .build();
            let item = only_item(&page).await;

            assert!(deleter().delete(&page, &item).await.is_success());
        }

        #[tokio::test(start_paused = true)]
        async fn test_relocates_after_rerender() {
            let page = MockPage::builder().items(2).build();
            let items = scan(&page, &SelectorTable::default()).await;
            page.rerender();

            let outcome = deleter().delete(&page, &items[1]).await;
            assert!(outcome.is_success());
            assert_eq!(page.deleted(), vec!["v2".to_string()]);
        }
    }

    mod failure_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_no_trigger_fails_in_locating() {
            let page = MockPage::builder().item(MockItem::new("a").no_trigger()).build();
            let item = only_item(&page).await;

            let outcome = deleter().delete(&page, &item).await;
            assert_eq!(failed_in(&outcome), Some(DeletionState::Locating));
            assert!(page.deleted().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_menu_never_opens_fails_after_budget() {
            let page = MockPage::builder()
                .item(MockItem::new("a").menu_never_opens())
                .build();
            let item = only_item(&page).await;
            let timings = Timings::default();

            let start = Instant::now();
            let outcome = deleter().delete(&page, &item).await;
            assert_eq!(failed_in(&outcome), Some(DeletionState::MenuWaiting));

            let expected = timings.trigger_scroll_settle_ms
                + timings.focus_settle_ms
                + timings.menu_wait.budget_ms();
            assert_eq!(start.elapsed().as_millis(), u128::from(expected));
        }

        #[tokio::test(start_paused = true)]
        async fn test_unclickable_trigger_is_not_immediately_fatal() {
            let page = MockPage::builder()
                .item(MockItem::new("a").trigger_unclickable())
                .build();
            let item = only_item(&page).await;

            let outcome = deleter().delete(&page, &item).await;
            assert_eq!(failed_in(&outcome), Some(DeletionState::MenuWaiting));
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_remove_option_dismisses_menu() {
            let page = MockPage::builder()
                .item(MockItem::new("a").options(&["Add to queue", "Share"]))
                .build();
            let item = only_item(&page).await;

            let outcome = deleter().delete(&page, &item).await;
            assert_eq!(failed_in(&outcome), Some(DeletionState::OptionMatching));
            assert!(page.was_called("click_outside"));
            assert!(page.deleted().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_stale_synthetic_item_fails() {
            let page = MockPage::builder().item(MockItem::new("a").link(None)).build();
            let item = only_item(&page).await;
            assert!(item.id.is_synthetic());
            page.rerender();

            let outcome = deleter().delete(&page, &item).await;
            assert_eq!(failed_in(&outcome), Some(DeletionState::Locating));
        }

        #[tokio::test(start_paused = true)]
        async fn test_item_gone_from_page() {
            let page = MockPage::builder().items(1).build();
            let item = Item {
                id: ItemId::new("not-on-page"),
                handle: crate::driver::ElementHandle::new("missing"),
                title: String::new(),
            };

            let outcome = deleter().delete(&page, &item).await;
            assert_eq!(failed_in(&outcome), Some(DeletionState::Locating));
            assert!(page.deleted().is_empty());
        }
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_outcome_predicates() {
            assert!(DeletionOutcome::Succeeded.is_success());
            assert!(!DeletionOutcome::Skipped.was_attempted());
            let failed = DeletionOutcome::Failed(Failure::new(DeletionState::MenuWaiting, "x"));
            assert!(failed.was_attempted());
            assert!(!failed.is_success());
        }

        #[test]
        fn test_failure_display() {
            let failure = Failure::new(DeletionState::OptionMatching, "no remove option in menu");
            assert_eq!(failure.to_string(), "OptionMatching: no remove option in menu");
        }
    }
}
