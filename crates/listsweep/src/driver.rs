//! PageDriver - Abstract Page Automation Trait
//!
//! Every read of, and every interaction with, the list page goes through
//! [`PageDriver`]. The automation never holds a live DOM node: it holds an
//! [`ElementHandle`], an opaque reference that the driver re-resolves on
//! every call and reports as stale once the page has re-rendered it away.
//!
//! # Implementations
//!
//! - `CdpDriver` - real Chromium tab over the DevTools protocol (feature `browser`)
//! - [`crate::mock::MockPage`] - scripted in-memory page for tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::SweepResult;

/// Opaque, transient reference to an element on the page
///
/// Handles are only valid until the host page re-renders the element. They
/// are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    reference: String,
}

impl ElementHandle {
    /// Wrap a driver-specific reference
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// The driver-specific reference
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.reference)
    }
}

/// Abstract driver for the list page
///
/// Queries take an optional scope: `None` searches the whole document,
/// `Some(handle)` searches that element's subtree. A selector that matches
/// nothing is `Ok(vec![])`, not an error.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// All elements matching `selector` within `scope`, in document order
    async fn query_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> SweepResult<Vec<ElementHandle>>;

    /// Text content of the element
    async fn text_content(&self, element: &ElementHandle) -> SweepResult<String>;

    /// Attribute value, `None` when absent
    async fn attribute(&self, element: &ElementHandle, name: &str)
        -> SweepResult<Option<String>>;

    /// Whether the element is still attached to the document
    async fn is_attached(&self, element: &ElementHandle) -> SweepResult<bool>;

    /// Scroll the element to the centre of the viewport
    async fn scroll_into_view(&self, element: &ElementHandle) -> SweepResult<()>;

    /// Give the element keyboard focus
    async fn focus(&self, element: &ElementHandle) -> SweepResult<()>;

    /// Direct activation (the element's own `click()`)
    async fn click(&self, element: &ElementHandle) -> SweepResult<()>;

    /// Dispatch a synthetic, bubbling click event on the element
    async fn dispatch_click(&self, element: &ElementHandle) -> SweepResult<()>;

    /// Activate the page outside any open overlay (dismisses menus)
    async fn click_outside(&self) -> SweepResult<()>;

    /// Show or hide the element without removing it
    async fn set_visible(&self, element: &ElementHandle, visible: bool) -> SweepResult<()>;
}

#[async_trait]
impl<D: PageDriver + ?Sized> PageDriver for std::sync::Arc<D> {
    async fn query_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> SweepResult<Vec<ElementHandle>> {
        (**self).query_all(scope, selector).await
    }

    async fn text_content(&self, element: &ElementHandle) -> SweepResult<String> {
        (**self).text_content(element).await
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> SweepResult<Option<String>> {
        (**self).attribute(element, name).await
    }

    async fn is_attached(&self, element: &ElementHandle) -> SweepResult<bool> {
        (**self).is_attached(element).await
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> SweepResult<()> {
        (**self).scroll_into_view(element).await
    }

    async fn focus(&self, element: &ElementHandle) -> SweepResult<()> {
        (**self).focus(element).await
    }

    async fn click(&self, element: &ElementHandle) -> SweepResult<()> {
        (**self).click(element).await
    }

    async fn dispatch_click(&self, element: &ElementHandle) -> SweepResult<()> {
        (**self).dispatch_click(element).await
    }

    async fn click_outside(&self) -> SweepResult<()> {
        (**self).click_outside().await
    }

    async fn set_visible(&self, element: &ElementHandle, visible: bool) -> SweepResult<()> {
        (**self).set_visible(element, visible).await
    }
}

/// How an activation finally went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The element's own click worked
    Direct,
    /// Direct click raised; the synthetic event went through
    Synthetic,
}

/// Activate an element: direct click first, synthetic event only if that raises.
///
/// Returns the error of the synthetic attempt when both paths fail.
pub async fn activate<D: PageDriver + ?Sized>(
    driver: &D,
    element: &ElementHandle,
) -> SweepResult<Activation> {
    match driver.click(element).await {
        Ok(()) => Ok(Activation::Direct),
        Err(direct) => {
            tracing::debug!(%element, error = %direct, "direct click failed, dispatching synthetic click");
            driver.dispatch_click(element).await?;
            Ok(Activation::Synthetic)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockItem, MockPage};

    mod element_handle_tests {
        use super::*;

        #[test]
        fn test_handle_reference() {
            let handle = ElementHandle::new("42");
            assert_eq!(handle.reference(), "42");
            assert_eq!(handle.to_string(), "#42");
        }

        #[test]
        fn test_handle_equality() {
            assert_eq!(ElementHandle::new("1"), ElementHandle::new("1"));
            assert_ne!(ElementHandle::new("1"), ElementHandle::new("2"));
        }
    }

    mod activate_tests {
        use super::*;

        #[tokio::test]
        async fn test_direct_activation() {
            let page = MockPage::builder().item(MockItem::new("a1")).build();
            let trigger = page.trigger_of("a1").unwrap();

            let how = activate(&page, &trigger).await.unwrap();
            assert_eq!(how, Activation::Direct);
        }

        #[tokio::test]
        async fn test_synthetic_fallback() {
            let page = MockPage::builder()
                .item(MockItem::new("a1").direct_click_fails())
                .build();
            let trigger = page.trigger_of("a1").unwrap();

            let how = activate(&page, &trigger).await.unwrap();
            assert_eq!(how, Activation::Synthetic);
            assert!(page.was_called("dispatch_click"));
        }

        #[tokio::test]
        async fn test_both_paths_fail() {
            let page = MockPage::builder()
                .item(MockItem::new("a1").trigger_unclickable())
                .build();
            let trigger = page.trigger_of("a1").unwrap();

            assert!(activate(&page, &trigger).await.is_err());
        }

        #[tokio::test]
        async fn test_arc_driver_delegates() {
            let page = std::sync::Arc::new(MockPage::builder().item(MockItem::new("a1")).build());
            let handles = page.query_all(None, "ytd-playlist-video-renderer").await.unwrap();
            assert_eq!(handles.len(), 1);
        }
    }
}
