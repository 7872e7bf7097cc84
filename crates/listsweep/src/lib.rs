//! Listsweep: bulk removal from a "Watch later" style list page
//!
//! Listsweep drives the page's own per-item controls (action menu, remove
//! option, optional confirmation) instead of calling any backing API. The
//! page gives no stable structure, timing or wording, so every step is a
//! best-effort match with bounded waits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       LISTSWEEP Architecture                     │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  request ──► Automation ──► SelectionManager ──► Store           │
//! │                  │                                               │
//! │                  ▼                                               │
//! │            DeletionQueue ──► ItemDeleter ──► SelectorTable       │
//! │                  │               │                               │
//! │                  ▼               ▼                               │
//! │            Coordinator       PageDriver (CDP tab | MockPage)     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Automation core: mode, selection and jobs behind one command surface
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod automation;

/// Chromium control over the `DevTools` protocol
pub mod browser;

/// YAML configuration
pub mod config;

/// Abstract page driver
pub mod driver;

/// Title filter over the item list
pub mod filter;

/// Item identity extraction
pub mod identity;

/// Selector resolution by logical role
pub mod locator;

/// Per-item deletion state machine
#[allow(clippy::missing_const_for_fn)]
pub mod machine;

/// Message protocol and peer traits
pub mod message;

/// Scripted in-memory page for tests
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::return_self_not_must_use
)]
pub mod mock;

/// Cancellable deletion queue
pub mod queue;

mod result;

/// Selection set manager
pub mod selection;

/// Flat key-value persistence
#[allow(clippy::missing_errors_doc)]
pub mod storage;

/// Bounded polling and settle delays
pub mod wait;

pub use automation::{Automation, AutomationBuilder};
#[cfg(feature = "browser")]
pub use browser::{Browser, CdpDriver};
pub use browser::BrowserConfig;
pub use config::{SweepConfig, Timings};
pub use driver::{ElementHandle, PageDriver};
pub use identity::{Item, ItemId};
pub use machine::{DeletionOutcome, DeletionState, Failure, ItemDeleter};
pub use message::{Coordinator, Notice, NoticeLevel, Notification, Request, Response, UiSink};
pub use queue::{CancelHandle, DeletionQueue, JobReport};
pub use result::{SweepError, SweepResult};
pub use selection::{SelectAllReport, SelectionManager, SelectionView};
pub use storage::{JsonFileStore, MemoryStore, Store};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::automation::*;
    pub use super::browser::*;
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::identity::*;
    pub use super::locator::*;
    pub use super::machine::*;
    pub use super::message::*;
    pub use super::queue::*;
    pub use super::result::*;
    pub use super::selection::*;
    pub use super::storage::*;
}
