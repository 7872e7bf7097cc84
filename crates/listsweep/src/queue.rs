//! Deletion queue processor.
//!
//! Runs the per-item state machine over an ordered item list, one item at a
//! time, with a fixed pause between items. Cancellation is cooperative: the
//! flag is checked only at the top of the loop, so the item in flight always
//! reaches its own terminal state first.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::driver::PageDriver;
use crate::identity::{Item, ItemId};
use crate::machine::{DeletionOutcome, ItemDeleter};
use crate::message::{send, Coordinator, Notification};
use crate::selection::SelectionManager;
use crate::wait::settle;

// =============================================================================
// CANCELLATION
// =============================================================================

#[derive(Debug, Default)]
struct Flags {
    running: AtomicBool,
    cancelled: AtomicBool,
}

/// Shared running/cancelled flags of the current job
///
/// Clones share state, so a handle given to a signal handler can stop a job
/// that another task is driving.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flags: Arc<Flags>,
}

impl CancelHandle {
    /// Ask the running job to stop after the current item.
    ///
    /// Returns false when no job was running.
    pub fn cancel(&self) -> bool {
        let was_running = self.flags.running.swap(false, Ordering::SeqCst);
        if was_running {
            self.flags.cancelled.store(true, Ordering::SeqCst);
            tracing::info!("cancellation requested");
        }
        was_running
    }

    /// Whether a job is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    /// Whether the current (or last) job was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.flags.cancelled.store(false, Ordering::SeqCst);
        self.flags.running.store(true, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.flags.running.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// JOB
// =============================================================================

/// Counters of one run
#[derive(Debug, Clone)]
pub struct DeletionJob {
    items: Vec<Item>,
    total: usize,
    completed: usize,
    cancelled: bool,
    running: bool,
}

impl DeletionJob {
    /// Job over `items`, not yet started
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            total: items.len(),
            items,
            completed: 0,
            cancelled: false,
            running: false,
        }
    }

    /// Items in the job
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Items removed so far
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    /// Whether the job was cancelled
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether the job is running
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Count one terminal outcome
    pub fn record(&mut self, outcome: &DeletionOutcome) {
        if outcome.is_success() && self.completed < self.total {
            self.completed += 1;
        }
    }

    /// Mark cancelled; never reset afterwards
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.running = false;
    }
}

/// Outcome of one item in a [`JobReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Item identifier
    pub id: ItemId,
    /// Item title at scan time
    pub title: String,
    /// What happened
    pub outcome: DeletionOutcome,
}

/// Summary of a finished job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// Items in the job
    pub total: usize,
    /// Items removed
    pub completed: usize,
    /// Whether the job was cancelled
    pub cancelled: bool,
    /// One entry per input item, in item order
    pub outcomes: Vec<ItemOutcome>,
}

impl JobReport {
    /// Items that reached a terminal state (succeeded or failed)
    #[must_use]
    pub fn processed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.was_attempted())
            .count()
    }

    /// Items that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, DeletionOutcome::Failed(_)))
            .count()
    }

    /// Items never attempted
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.total - self.processed()
    }
}

// =============================================================================
// PROCESSOR
// =============================================================================

/// Sequential, pausable driver of the state machine
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    deleter: ItemDeleter,
    pacing_ms: u64,
    handle: CancelHandle,
}

impl DeletionQueue {
    /// Create a queue
    #[must_use]
    pub fn new(deleter: ItemDeleter, pacing_ms: u64) -> Self {
        Self {
            deleter,
            pacing_ms,
            handle: CancelHandle::default(),
        }
    }

    /// Handle that cancels this queue's jobs
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Whether a job is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Process `items` in order.
    ///
    /// The selection is cleared when the job ends, however it ends.
    pub async fn run<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        items: Vec<Item>,
        coordinator: &dyn Coordinator,
        selection: &mut SelectionManager,
    ) -> JobReport {
        let mut job = DeletionJob::new(items);
        job.running = true;
        self.handle.start();
        let total = job.total();
        tracing::info!(total, "deletion job started");
        send(coordinator, Notification::DeleteStarted { count: total }).await;

        let mut outcomes = Vec::with_capacity(total);
        for index in 0..total {
            if !self.handle.is_running() {
                break;
            }
            let item = job.items[index].clone();
            let outcome = self.deleter.delete(driver, &item).await;
            job.record(&outcome);
            outcomes.push(ItemOutcome {
                id: item.id,
                title: item.title,
                outcome,
            });
            send(
                coordinator,
                Notification::DeleteProgress {
                    current: outcomes.len(),
                    total,
                },
            )
            .await;
            settle(self.pacing_ms).await;
        }

        if self.handle.is_cancelled() {
            job.cancel();
        }
        self.handle.finish();
        job.running = false;

        for item in job.items.iter().skip(outcomes.len()) {
            outcomes.push(ItemOutcome {
                id: item.id.clone(),
                title: item.title.clone(),
                outcome: DeletionOutcome::Skipped,
            });
        }

        let completed = job.completed();
        if job.is_cancelled() {
            tracing::info!(completed, total, "deletion job cancelled");
            send(
                coordinator,
                Notification::DeleteCancelled {
                    deleted_count: completed,
                },
            )
            .await;
        } else {
            tracing::info!(completed, total, "deletion job completed");
            send(coordinator, Notification::DeleteCompleted { count: completed }).await;
        }
        selection.clear();

        JobReport {
            total,
            completed,
            cancelled: job.is_cancelled(),
            outcomes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Timings;
    use crate::identity::scan;
    use crate::locator::SelectorTable;
    use crate::machine::{DeletionState, Failure};
    use crate::mock::{MockItem, MockPage, RecordingCoordinator, RecordingSink};
    use crate::storage::MemoryStore;
    use proptest::prelude::*;

    fn queue() -> DeletionQueue {
        let timings = Timings::default();
        DeletionQueue::new(
            ItemDeleter::new(SelectorTable::default(), timings),
            timings.pacing_ms,
        )
    }

    fn selection() -> SelectionManager {
        SelectionManager::new(Arc::new(MemoryStore::new()), Arc::new(RecordingSink::default()))
    }

    mod cancel_handle_tests {
        use super::*;

        #[test]
        fn test_cancel_without_job_is_noop() {
            let handle = CancelHandle::default();
            assert!(!handle.cancel());
            assert!(!handle.is_cancelled());
        }

        #[test]
        fn test_clones_share_state() {
            let handle = CancelHandle::default();
            let other = handle.clone();
            handle.start();
            assert!(other.is_running());
            assert!(other.cancel());
            assert!(!handle.is_running());
            assert!(handle.is_cancelled());
        }

        #[test]
        fn test_start_resets_cancelled() {
            let handle = CancelHandle::default();
            handle.start();
            handle.cancel();
            handle.start();
            assert!(!handle.is_cancelled());
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_all_items_succeed() {
            let page = MockPage::builder().items(3).build();
            let items = scan(&page, &SelectorTable::default()).await;
            let coordinator = RecordingCoordinator::default();
            let mut sel = selection();
            sel.select_all(items.iter().map(|i| i.id.clone()));

            let report = queue().run(&page, items, &coordinator, &mut sel).await;

            assert_eq!(report.total, 3);
            assert_eq!(report.completed, 3);
            assert!(!report.cancelled);
            assert_eq!(sel.size(), 0);
            assert_eq!(page.remaining(), Vec::<String>::new());

            let received = coordinator.received();
            assert_eq!(received.first(), Some(&Notification::DeleteStarted { count: 3 }));
            assert_eq!(received.last(), Some(&Notification::DeleteCompleted { count: 3 }));
            assert_eq!(received.len(), 5);
        }

        #[tokio::test(start_paused = true)]
        async fn test_empty_job() {
            let page = MockPage::builder().build();
            let coordinator = RecordingCoordinator::default();
            let mut sel = selection();

            let report = queue().run(&page, Vec::new(), &coordinator, &mut sel).await;
            assert_eq!(report.total, 0);
            assert_eq!(
                coordinator.received(),
                vec![
                    Notification::DeleteStarted { count: 0 },
                    Notification::DeleteCompleted { count: 0 }
                ]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_progress_counts_failures_too() {
            let page = MockPage::builder()
                .item(MockItem::new("a").no_trigger())
                .item(MockItem::new("b"))
                .build();
            let items = scan(&page, &SelectorTable::default()).await;
            let coordinator = RecordingCoordinator::default();

            let report = queue().run(&page, items, &coordinator, &mut selection()).await;

            assert_eq!(report.completed, 1);
            assert_eq!(report.failed(), 1);
            let progress: Vec<_> = coordinator
                .received()
                .into_iter()
                .filter(|n| matches!(n, Notification::DeleteProgress { .. }))
                .collect();
            assert_eq!(
                progress,
                vec![
                    Notification::DeleteProgress { current: 1, total: 2 },
                    Notification::DeleteProgress { current: 2, total: 2 }
                ]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_cancel_mid_job() {
            let page = MockPage::builder().items(5).build();
            let items = scan(&page, &SelectorTable::default()).await;
            let coordinator = RecordingCoordinator::default();
            let queue = queue();
            let handle = queue.cancel_handle();
            page.on_menu_activation(move |key| {
                if key == "v2" {
                    handle.cancel();
                }
            });

            let report = queue.run(&page, items, &coordinator, &mut selection()).await;

            assert!(report.cancelled);
            assert_eq!(report.processed(), 2);
            assert_eq!(report.skipped(), 3);
            assert_eq!(report.completed, 2);
            assert_eq!(report.outcomes[2].outcome, DeletionOutcome::Skipped);
            assert_eq!(
                coordinator.received().last(),
                Some(&Notification::DeleteCancelled { deleted_count: 2 })
            );
            assert!(!queue.is_running());
        }
    }

    mod property_tests {
        use super::*;

        fn outcome() -> impl Strategy<Value = DeletionOutcome> {
            prop_oneof![
                Just(DeletionOutcome::Succeeded),
                Just(DeletionOutcome::Failed(Failure {
                    state: DeletionState::MenuWaiting,
                    reason: "timeout".to_string(),
                })),
            ]
        }

        proptest! {
            #[test]
            fn prop_completed_never_exceeds_total(
                total in 0usize..20,
                outcomes in prop::collection::vec(outcome(), 0..40),
            ) {
                let items = (0..total)
                    .map(|i| Item {
                        id: ItemId::new(format!("v{i}")),
                        handle: crate::driver::ElementHandle::new(format!("n{i}")),
                        title: String::new(),
                    })
                    .collect();
                let mut job = DeletionJob::new(items);
                for outcome in &outcomes {
                    job.record(outcome);
                    prop_assert!(job.completed() <= job.total());
                }
            }

            #[test]
            fn prop_cancelled_is_sticky(records in 0usize..10) {
                let mut job = DeletionJob::new(Vec::new());
                job.cancel();
                for _ in 0..records {
                    job.record(&DeletionOutcome::Succeeded);
                }
                prop_assert!(job.is_cancelled());
                prop_assert!(!job.is_running());
            }
        }
    }
}
