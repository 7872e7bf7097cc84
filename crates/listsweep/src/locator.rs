//! Selector resolution by logical role.
//!
//! The list page gives no stable structure, so every element the automation
//! needs is described by a [`Role`] backed by an ordered list of structural
//! queries. Resolution tries the queries in order and stops at the first one
//! that matches anything; later entries are pure fallbacks.
//!
//! # Example
//!
//! ```
//! use listsweep::locator::{Role, SelectorTable};
//!
//! let table = SelectorTable::default();
//! assert_eq!(table.queries(Role::ItemContainer)[0], "ytd-playlist-video-renderer");
//! assert!(table.matches_remove_phrase("Remove from Watch later"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::driver::{ElementHandle, PageDriver};

/// Logical element roles on the list page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// One list entry
    ItemContainer,
    /// Primary link inside an entry
    ItemLink,
    /// Control that opens an entry's action menu
    MenuTrigger,
    /// One option of an open action menu
    MenuOption,
    /// Control that confirms a removal dialog
    ConfirmControl,
    /// Marker present once the list page has rendered
    PageReady,
}

impl Role {
    /// All roles
    pub const ALL: [Self; 6] = [
        Self::ItemContainer,
        Self::ItemLink,
        Self::MenuTrigger,
        Self::MenuOption,
        Self::ConfirmControl,
        Self::PageReady,
    ];

    /// Built-in query list, most specific first
    #[must_use]
    pub const fn default_queries(self) -> &'static [&'static str] {
        match self {
            Self::ItemContainer => ITEM_CONTAINER,
            Self::ItemLink => ITEM_LINK,
            Self::MenuTrigger => MENU_TRIGGER,
            Self::MenuOption => MENU_OPTION,
            Self::ConfirmControl => CONFIRM_CONTROL,
            Self::PageReady => PAGE_READY,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ItemContainer => "item container",
            Self::ItemLink => "item link",
            Self::MenuTrigger => "menu trigger",
            Self::MenuOption => "menu option",
            Self::ConfirmControl => "confirm control",
            Self::PageReady => "page ready",
        };
        f.write_str(name)
    }
}

// =============================================================================
// BUILT-IN TABLES
// =============================================================================

const ITEM_CONTAINER: &[&str] = &[
    "ytd-playlist-video-renderer",
    "ytd-playlist-panel-video-renderer",
];

const ITEM_LINK: &[&str] = &["#video-title", r#"h3 a[href*="/watch"]"#, r#"a[href*="/watch"]"#];

const MENU_TRIGGER: &[&str] = &[
    r#"button[aria-label*="その他"]"#,
    r#"button[aria-label*="More"]"#,
    r#"button[aria-label*="アクション"]"#,
    r#"button[aria-label*="Action"]"#,
    "ytd-menu-renderer button",
    r#"yt-icon-button[aria-label*="その他"]"#,
    r#"yt-icon-button[aria-label*="More"]"#,
    r#"[role="button"][aria-label*="その他"]"#,
    r#"[role="button"][aria-label*="More"]"#,
];

const MENU_OPTION: &[&str] = &[
    "ytd-menu-service-item-renderer",
    r#"[role="menuitem"]"#,
    "tp-yt-paper-item",
    "ytd-menu-navigation-item-renderer",
    ".ytd-menu-service-item-renderer",
];

const CONFIRM_CONTROL: &[&str] = &[
    r#"button[aria-label*="削除"]"#,
    r#"button[aria-label*="Delete"]"#,
    r#"button[aria-label*="確認"]"#,
    r#"button[aria-label*="Confirm"]"#,
    r#"button[aria-label*="OK"]"#,
    r#"button[aria-label*="はい"]"#,
    r#"button[aria-label*="Yes"]"#,
    r#"[role="button"][aria-label*="削除"]"#,
    r#"ytd-button-renderer button[aria-label*="削除"]"#,
    r#"tp-yt-paper-button[aria-label*="削除"]"#,
];

const PAGE_READY: &[&str] = &[
    r#"ytd-browse[page-subtype="playlist"]"#,
    "ytd-playlist-header-renderer",
    r#"[role="main"] ytd-playlist-video-list-renderer"#,
];

/// Menu-option texts that mean "remove this entry", most specific first
pub const REMOVE_PHRASES: &[&str] = &[
    "「後で見る」から削除",
    "後で見るから削除",
    "watch later から削除",
    "remove from watch later",
    "リストから削除",
    "remove from list",
    "削除",
    "remove",
    "delete",
];

// =============================================================================
// SELECTOR TABLE
// =============================================================================

/// Role → ordered queries, plus the remove-phrase list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorTable {
    queries: BTreeMap<Role, Vec<String>>,
    phrases: Vec<String>,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            queries: Role::ALL
                .iter()
                .map(|role| {
                    let list = role.default_queries().iter().map(|s| (*s).to_string()).collect();
                    (*role, list)
                })
                .collect(),
            phrases: REMOVE_PHRASES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl SelectorTable {
    /// Append extra queries for a role; they are tried after the existing ones
    #[must_use]
    pub fn with_extra_queries<I, S>(mut self, role: Role, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.queries.entry(role).or_default();
        for query in extra {
            let query = query.into();
            if !list.contains(&query) {
                list.push(query);
            }
        }
        self
    }

    /// Append extra remove phrases after the built-in ones
    #[must_use]
    pub fn with_extra_phrases<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for phrase in extra {
            let phrase = phrase.into();
            if !phrase.is_empty() && !self.phrases.contains(&phrase) {
                self.phrases.push(phrase);
            }
        }
        self
    }

    /// Ordered queries for a role
    #[must_use]
    pub fn queries(&self, role: Role) -> &[String] {
        self.queries.get(&role).map(Vec::as_slice).unwrap_or_default()
    }

    /// Remove phrases in match order
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Case-insensitive: does `text` contain any remove phrase?
    #[must_use]
    pub fn matches_remove_phrase(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.phrases
            .iter()
            .any(|phrase| haystack.contains(&phrase.to_lowercase()))
    }

    /// First element for `role` within `scope`, or `None`
    pub async fn resolve<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        role: Role,
        scope: Option<&ElementHandle>,
    ) -> Option<ElementHandle> {
        self.resolve_all(driver, role, scope).await.into_iter().next()
    }

    /// Every element matched by the first query for `role` that matches anything
    pub async fn resolve_all<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        role: Role,
        scope: Option<&ElementHandle>,
    ) -> Vec<ElementHandle> {
        for query in self.queries(role) {
            match driver.query_all(scope, query).await {
                Ok(found) if !found.is_empty() => {
                    tracing::debug!(%role, query = %query, count = found.len(), "selector hit");
                    return found;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(%role, query = %query, error = %err, "query rejected");
                }
            }
        }
        Vec::new()
    }
}
