//! Item identity extraction.
//!
//! An entry's identifier comes from, in order:
//!
//! 1. the `v=` token of its primary link target,
//! 2. a locally attached id attribute (`data-video-id`, then `data-ytid`),
//! 3. a synthetic `video-<millis>-<random>` value.
//!
//! Synthetic identifiers are regenerated on every scan, so an entry that only
//! ever gets one cannot stay selected across re-scans.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::driver::{ElementHandle, PageDriver};
use crate::locator::{Role, SelectorTable};

/// Attributes consulted when the link carries no token
pub const ID_ATTRIBUTES: &[&str] = &["data-video-id", "data-ytid"];

const SYNTHETIC_PREFIX: &str = "video-";

#[allow(clippy::expect_used)]
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[?&]v=([^&]+)").expect("literal pattern"))
}

#[allow(clippy::expect_used)]
fn synthetic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^video-\d+-[0-9a-f]+$").expect("literal pattern"))
}

/// Identifier of one list entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap an identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh synthetic identifier
    #[must_use]
    pub fn synthetic() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{SYNTHETIC_PREFIX}{millis}-{}", &random[..9]))
    }

    /// Whether this identifier was synthesized rather than read from the page
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        synthetic_pattern().is_match(&self.0)
    }

    /// The identifier string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Extract the `v=` token from a link target
#[must_use]
pub fn token_from_href(href: &str) -> Option<&str> {
    token_pattern()
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|token| !token.is_empty())
}

/// One entry found by a scan: identifier plus its scan-time element
///
/// The handle is only good until the page re-renders; never keep it past
/// the operation that scanned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Identifier
    pub id: ItemId,
    /// Scan-time container element
    pub handle: ElementHandle,
    /// Best-effort title text
    pub title: String,
}

/// Derive the identifier of an entry container
pub async fn identify<D: PageDriver + ?Sized>(
    driver: &D,
    table: &SelectorTable,
    container: &ElementHandle,
) -> ItemId {
    if let Some(link) = table.resolve(driver, Role::ItemLink, Some(container)).await {
        if let Ok(Some(href)) = driver.attribute(&link, "href").await {
            if let Some(token) = token_from_href(&href) {
                return ItemId::new(token);
            }
        }
    }

    for name in ID_ATTRIBUTES {
        if let Ok(Some(value)) = driver.attribute(container, name).await {
            let value = value.trim();
            if !value.is_empty() {
                return ItemId::new(value);
            }
        }
    }

    let id = ItemId::synthetic();
    tracing::debug!(%container, %id, "no stable identifier, synthesized one");
    id
}

/// Title text of an entry container
pub async fn title_of<D: PageDriver + ?Sized>(
    driver: &D,
    table: &SelectorTable,
    container: &ElementHandle,
) -> String {
    let source = table
        .resolve(driver, Role::ItemLink, Some(container))
        .await
        .unwrap_or_else(|| container.clone());
    driver
        .text_content(&source)
        .await
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// Scan the page: every entry container, identified, in document order
pub async fn scan<D: PageDriver + ?Sized>(driver: &D, table: &SelectorTable) -> Vec<Item> {
    let containers = table.resolve_all(driver, Role::ItemContainer, None).await;
    let mut items = Vec::with_capacity(containers.len());
    for handle in containers {
        let id = identify(driver, table, &handle).await;
        let title = title_of(driver, table, &handle).await;
        items.push(Item { id, handle, title });
    }
    tracing::debug!(count = items.len(), "scanned items");
    items
}

/// Find the live container of a stable identifier
pub async fn locate<D: PageDriver + ?Sized>(
    driver: &D,
    table: &SelectorTable,
    id: &ItemId,
) -> Option<ElementHandle> {
    for container in table.resolve_all(driver, Role::ItemContainer, None).await {
        if &identify(driver, table, &container).await == id {
            return Some(container);
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockItem, MockPage};

    mod token_tests {
        use super::*;

        #[test]
        fn test_token_first_param() {
            assert_eq!(token_from_href("/watch?v=abc123&list=WL"), Some("abc123"));
        }

        #[test]
        fn test_token_later_param() {
            assert_eq!(
                token_from_href("https://www.youtube.com/watch?list=WL&v=XyZ_-9&index=3"),
                Some("XyZ_-9")
            );
        }

        #[test]
        fn test_no_token() {
            assert_eq!(token_from_href("/playlist?list=WL"), None);
            assert_eq!(token_from_href("/watch?v=&list=WL"), None);
            assert_eq!(token_from_href(""), None);
        }
    }

    mod item_id_tests {
        use super::*;

        #[test]
        fn test_synthetic_shape() {
            let id = ItemId::synthetic();
            assert!(id.as_str().starts_with("video-"));
            assert!(id.is_synthetic());
        }

        #[test]
        fn test_synthetic_ids_differ() {
            assert_ne!(ItemId::synthetic(), ItemId::synthetic());
        }

        #[test]
        fn test_real_id_not_synthetic() {
            assert!(!ItemId::new("dQw4w9WgXcQ").is_synthetic());
            assert!(!ItemId::new("video-intro").is_synthetic());
        }

        #[test]
        fn test_serializes_as_plain_string() {
            let json = serde_json::to_string(&ItemId::new("abc")).unwrap();
            assert_eq!(json, "\"abc\"");
        }
    }

    mod identify_tests {
        use super::*;

        #[tokio::test]
        async fn test_identify_from_link() {
            let page = MockPage::builder().item(MockItem::new("abc123")).build();
            let table = SelectorTable::default();
            let container = page.container_of("abc123").unwrap();

            assert_eq!(identify(&page, &table, &container).await, ItemId::new("abc123"));
        }

        #[tokio::test]
        async fn test_identify_from_attribute() {
            let page = MockPage::builder()
                .item(MockItem::new("k").link(Some("/shorts/xyz")).attribute("data-ytid", "attr-id"))
                .build();
            let table = SelectorTable::default();
            let container = page.container_of("k").unwrap();

            assert_eq!(identify(&page, &table, &container).await, ItemId::new("attr-id"));
        }

        #[tokio::test]
        async fn test_video_id_attribute_preferred() {
            let page = MockPage::builder()
                .item(
                    MockItem::new("k")
                        .link(None)
                        .attribute("data-ytid", "second")
                        .attribute("data-video-id", "first"),
                )
                .build();
            let table = SelectorTable::default();
            let container = page.container_of("k").unwrap();

            assert_eq!(identify(&page, &table, &container).await, ItemId::new("first"));
        }

        #[tokio::test]
        async fn test_identify_synthetic_fallback() {
            let page = MockPage::builder().item(MockItem::new("k").link(None)).build();
            let table = SelectorTable::default();
            let container = page.container_of("k").unwrap();

            let id = identify(&page, &table, &container).await;
            assert!(id.is_synthetic());
        }
    }

    mod scan_tests {
        use super::*;

        #[tokio::test]
        async fn test_scan_in_document_order() {
            let page = MockPage::builder()
                .item(MockItem::new("a").title("  First  "))
                .item(MockItem::new("b").title("Second"))
                .build();
            let items = scan(&page, &SelectorTable::default()).await;

            let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
            assert_eq!(ids, vec!["a", "b"]);
            assert_eq!(items[0].title, "First");
        }

        #[tokio::test]
        async fn test_scan_empty_page() {
            let page = MockPage::builder().build();
            assert!(scan(&page, &SelectorTable::default()).await.is_empty());
        }

        #[tokio::test]
        async fn test_locate_after_rerender() {
            let page = MockPage::builder().items(3).build();
            let table = SelectorTable::default();
            let before = page.container_of("v2").unwrap();
            page.rerender();

            let found = locate(&page, &table, &ItemId::new("v2")).await.unwrap();
            assert_ne!(found, before);
            assert_eq!(Some(found), page.container_of("v2"));
        }
    }
}
