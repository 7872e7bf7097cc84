//! Selection set manager.
//!
//! The single owner of the set of selected identifiers. Every mutation
//! persists the full set under [`KEY_SELECTED_IDS`] and pushes a fresh
//! [`SelectionView`] to the UI sink. Membership is identifier-based, so ids
//! of entries no longer on the page stay selected until cleared.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::identity::ItemId;
use crate::message::UiSink;
use crate::storage::{self, Store, KEY_SELECTED_IDS};

/// What the UI renders from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionView {
    /// Number of selected identifiers
    pub count: usize,
    /// Delete affordance enabled
    pub can_delete: bool,
}

/// Outcome of [`SelectionManager::select_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectAllReport {
    /// Identifiers that were not selected before
    pub newly_selected: usize,
    /// Identifiers that already were
    pub already_selected: usize,
}

impl SelectAllReport {
    /// Size of the resulting selection
    #[must_use]
    pub const fn total(&self) -> usize {
        self.newly_selected + self.already_selected
    }
}

/// Owner of the selected-identifier set
pub struct SelectionManager {
    selected: BTreeSet<ItemId>,
    store: Arc<dyn Store>,
    ui: Arc<dyn UiSink>,
}

impl std::fmt::Debug for SelectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionManager")
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl SelectionManager {
    /// Empty selection
    #[must_use]
    pub fn new(store: Arc<dyn Store>, ui: Arc<dyn UiSink>) -> Self {
        Self {
            selected: BTreeSet::new(),
            store,
            ui,
        }
    }

    /// Reload the persisted selection, replacing the in-memory set
    pub fn restore(&mut self) {
        match storage::load::<Vec<ItemId>>(self.store.as_ref(), KEY_SELECTED_IDS) {
            Ok(ids) => self.selected = ids.unwrap_or_default().into_iter().collect(),
            Err(err) => tracing::warn!(error = %err, "could not restore selection"),
        }
        tracing::debug!(count = self.selected.len(), "selection restored");
        self.ui.refresh(self.view());
    }

    /// Select one identifier
    pub fn select(&mut self, id: ItemId) {
        if self.selected.insert(id) {
            self.changed();
        }
    }

    /// Deselect one identifier
    pub fn deselect(&mut self, id: &ItemId) {
        if self.selected.remove(id) {
            self.changed();
        }
    }

    /// Replace the selection with exactly `ids`
    pub fn select_all<I>(&mut self, ids: I) -> SelectAllReport
    where
        I: IntoIterator<Item = ItemId>,
    {
        let next: BTreeSet<ItemId> = ids.into_iter().collect();
        let already_selected = next.intersection(&self.selected).count();
        let report = SelectAllReport {
            newly_selected: next.len() - already_selected,
            already_selected,
        };
        self.selected = next;
        self.changed();
        report
    }

    /// Empty the selection; returns how many were deselected
    pub fn deselect_all(&mut self) -> usize {
        let count = self.selected.len();
        self.selected.clear();
        self.changed();
        count
    }

    /// Empty the selection
    pub fn clear(&mut self) {
        self.selected.clear();
        self.changed();
    }

    /// Number of selected identifiers
    #[must_use]
    pub fn size(&self) -> usize {
        self.selected.len()
    }

    /// Whether `id` is selected
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.selected.contains(id)
    }

    /// Selected identifiers in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.selected.iter()
    }

    /// Current view
    #[must_use]
    pub fn view(&self) -> SelectionView {
        SelectionView {
            count: self.selected.len(),
            can_delete: !self.selected.is_empty(),
        }
    }

    fn changed(&self) {
        let ids: Vec<&ItemId> = self.selected.iter().collect();
        if let Err(err) = storage::save(self.store.as_ref(), KEY_SELECTED_IDS, &ids) {
            tracing::warn!(error = %err, "could not persist selection");
        }
        self.ui.refresh(self.view());
    }
}
