//! Title filter over the item list.
//!
//! Hides entries whose title does not contain the term. Purely a view: the
//! deletion queue always works on the full scan, never on what is visible.

use crate::driver::PageDriver;
use crate::identity::Item;

/// Case-insensitive substring match; an empty term matches everything
#[must_use]
pub fn matches(title: &str, term: &str) -> bool {
    let term = term.trim();
    term.is_empty() || title.to_lowercase().contains(&term.to_lowercase())
}

/// Show matching items, hide the rest; returns how many remain visible
pub async fn apply<D: PageDriver + ?Sized>(driver: &D, items: &[Item], term: &str) -> usize {
    let mut visible = 0;
    for item in items {
        let show = matches(&item.title, term);
        if let Err(err) = driver.set_visible(&item.handle, show).await {
            tracing::debug!(id = %item.id, error = %err, "could not toggle visibility");
            continue;
        }
        if show {
            visible += 1;
        }
    }
    tracing::debug!(term, visible, total = items.len(), "filter applied");
    visible
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::identity::scan;
    use crate::locator::SelectorTable;
    use crate::mock::{MockItem, MockPage};

    #[test]
    fn test_matches() {
        assert!(matches("Rust in Production", "rust"));
        assert!(matches("Rust in Production", "  PRODUCTION "));
        assert!(matches("anything", ""));
        assert!(!matches("Cooking with Gas", "rust"));
    }

    #[tokio::test]
    async fn test_apply_hides_non_matching() {
        let page = MockPage::builder()
            .item(MockItem::new("a").title("Learning Rust"))
            .item(MockItem::new("b").title("Baking bread"))
            .item(MockItem::new("c").title("rust belt history"))
            .build();
        let items = scan(&page, &SelectorTable::default()).await;

        assert_eq!(apply(&page, &items, "RUST").await, 2);
        assert!(page.is_visible("a"));
        assert!(!page.is_visible("b"));

        assert_eq!(apply(&page, &items, "").await, 3);
        assert!(page.is_visible("b"));
    }

    #[tokio::test]
    async fn test_apply_skips_stale_items() {
        let page = MockPage::builder().items(2).build();
        let items = scan(&page, &SelectorTable::default()).await;
        page.rerender();

        assert_eq!(apply(&page, &items, "").await, 0);
    }
}
