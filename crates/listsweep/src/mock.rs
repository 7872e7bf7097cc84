//! Scripted in-memory list page for tests.
//!
//! [`MockPage`] implements [`PageDriver`] over a tiny node arena. Nodes do
//! not parse CSS: each node lists the exact selector strings it answers to,
//! which lets a test decide which entry of a fallback table matches.
//!
//! Timing is scripted against the tokio clock, so tests that run with
//! `start_paused = true` see menus and dialogs appear after exact virtual
//! delays.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::{ElementHandle, PageDriver};
use crate::message::{Coordinator, Notice, Notification, UiSink};
use crate::result::{SweepError, SweepResult};
use crate::selection::SelectionView;

/// Container selector used by default for mock items
pub const MOCK_CONTAINER: &str = "ytd-playlist-video-renderer";
/// Link selector used by default for mock items
pub const MOCK_LINK: &str = "#video-title";
/// Trigger selector used by default for mock items
pub const MOCK_TRIGGER: &str = r#"button[aria-label*="More"]"#;
/// Menu option selector used by default
pub const MOCK_OPTION: &str = "ytd-menu-service-item-renderer";
/// Confirmation control selector used by default
pub const MOCK_CONFIRM: &str = r#"button[aria-label*="Delete"]"#;
/// Page-ready marker selector
pub const MOCK_READY: &str = r#"ytd-browse[page-subtype="playlist"]"#;

type ActivationHook = Box<dyn Fn(&str) + Send + Sync>;

// =============================================================================
// ITEM SCRIPT
// =============================================================================

/// Script for one list entry and its action menu
#[derive(Debug, Clone)]
pub struct MockItem {
    key: String,
    title: String,
    container_selector: String,
    link: Option<String>,
    attributes: Vec<(String, String)>,
    trigger_selector: Option<String>,
    direct_click_fails: bool,
    trigger_unclickable: bool,
    menu_opens: bool,
    menu_delay_ms: u64,
    options: Vec<String>,
    remove_option_delay_ms: u64,
    option_click_fails: bool,
    confirm_delay_ms: Option<u64>,
    confirm_selector: String,
}

impl MockItem {
    /// An item whose link carries `?v=<key>`, with a well-behaved menu
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            title: format!("Video {key}"),
            link: Some(format!("/watch?v={key}&list=WL&index=1")),
            key,
            container_selector: MOCK_CONTAINER.to_string(),
            attributes: Vec::new(),
            trigger_selector: Some(MOCK_TRIGGER.to_string()),
            direct_click_fails: false,
            trigger_unclickable: false,
            menu_opens: true,
            menu_delay_ms: 300,
            options: vec![
                "Add to queue".to_string(),
                "Save to playlist".to_string(),
                "Remove from Watch later".to_string(),
            ],
            remove_option_delay_ms: 0,
            option_click_fails: false,
            confirm_delay_ms: None,
            confirm_selector: MOCK_CONFIRM.to_string(),
        }
    }

    /// Set the title text
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the link target (or remove it)
    #[must_use]
    pub fn link(mut self, href: Option<&str>) -> Self {
        self.link = href.map(str::to_string);
        self
    }

    /// Attach an attribute to the container
    #[must_use]
    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Use a different container selector
    #[must_use]
    pub fn container(mut self, selector: &str) -> Self {
        self.container_selector = selector.to_string();
        self
    }

    /// Use a different trigger selector
    #[must_use]
    pub fn trigger(mut self, selector: &str) -> Self {
        self.trigger_selector = Some(selector.to_string());
        self
    }

    /// Render no action-menu trigger at all
    #[must_use]
    pub fn no_trigger(mut self) -> Self {
        self.trigger_selector = None;
        self
    }

    /// Direct click on the trigger raises; synthetic click works
    #[must_use]
    pub fn direct_click_fails(mut self) -> Self {
        self.direct_click_fails = true;
        self
    }

    /// Both direct and synthetic clicks on the trigger raise
    #[must_use]
    pub fn trigger_unclickable(mut self) -> Self {
        self.trigger_unclickable = true;
        self
    }

    /// Activating the trigger never renders a menu
    #[must_use]
    pub fn menu_never_opens(mut self) -> Self {
        self.menu_opens = false;
        self
    }

    /// Delay between activation and the menu rendering
    #[must_use]
    pub fn menu_delay_ms(mut self, ms: u64) -> Self {
        self.menu_delay_ms = ms;
        self
    }

    /// Replace the menu option texts
    #[must_use]
    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Extra delay before the remove option renders after the others
    #[must_use]
    pub fn remove_option_delay_ms(mut self, ms: u64) -> Self {
        self.remove_option_delay_ms = ms;
        self
    }

    /// Direct click on menu options raises; synthetic click works
    #[must_use]
    pub fn option_click_fails(mut self) -> Self {
        self.option_click_fails = true;
        self
    }

    /// Removing asks for confirmation, rendered after `delay_ms`
    #[must_use]
    pub fn confirm_after_ms(mut self, delay_ms: u64) -> Self {
        self.confirm_delay_ms = Some(delay_ms);
        self
    }

    /// Selector the confirmation control answers to
    #[must_use]
    pub fn confirm_selector(mut self, selector: &str) -> Self {
        self.confirm_selector = selector.to_string();
        self
    }

    /// Key the test uses to refer to this item
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

// =============================================================================
// NODE ARENA
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Container,
    Link,
    Trigger,
    MenuOption { removes: bool },
    Confirm,
    Marker,
}

#[derive(Debug, Clone)]
struct Node {
    reference: String,
    item: Option<String>,
    parent: Option<usize>,
    selectors: Vec<String>,
    text: String,
    attributes: BTreeMap<String, String>,
    attached: bool,
    visible: bool,
    appears_at: Option<Instant>,
    kind: NodeKind,
}

#[derive(Debug, Default)]
struct MockDom {
    nodes: Vec<Node>,
    scripts: BTreeMap<String, MockItem>,
    order: Vec<String>,
    deleted: Vec<String>,
    next_ref: u64,
}

impl MockDom {
    fn push(&mut self, mut node: Node) -> usize {
        self.next_ref += 1;
        node.reference = format!("n{}", self.next_ref);
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn node(&self, handle: &ElementHandle) -> SweepResult<usize> {
        self.nodes
            .iter()
            .position(|n| n.reference == handle.reference() && n.attached)
            .ok_or_else(|| SweepError::StaleElement {
                reference: handle.reference().to_string(),
            })
    }

    fn is_within(&self, mut index: usize, ancestor: usize) -> bool {
        while let Some(parent) = self.nodes[index].parent {
            if parent == ancestor {
                return true;
            }
            index = parent;
        }
        false
    }

    fn render_item(&mut self, script: &MockItem) {
        let mut attributes: BTreeMap<String, String> = script.attributes.iter().cloned().collect();
        attributes.insert("data-mock-key".to_string(), script.key.clone());
        let container = self.push(Node {
            reference: String::new(),
            item: Some(script.key.clone()),
            parent: None,
            selectors: vec![script.container_selector.clone()],
            text: script.title.clone(),
            attributes,
            attached: true,
            visible: true,
            appears_at: None,
            kind: NodeKind::Container,
        });

        let mut link_attrs = BTreeMap::new();
        if let Some(ref href) = script.link {
            link_attrs.insert("href".to_string(), href.clone());
        }
        self.push(Node {
            reference: String::new(),
            item: Some(script.key.clone()),
            parent: Some(container),
            selectors: vec![MOCK_LINK.to_string()],
            text: script.title.clone(),
            attributes: link_attrs,
            attached: true,
            visible: true,
            appears_at: None,
            kind: NodeKind::Link,
        });

        if let Some(ref selector) = script.trigger_selector {
            self.push(Node {
                reference: String::new(),
                item: Some(script.key.clone()),
                parent: Some(container),
                selectors: vec![selector.clone()],
                text: String::new(),
                attributes: BTreeMap::new(),
                attached: true,
                visible: true,
                appears_at: None,
                kind: NodeKind::Trigger,
            });
        }
    }

    fn close_menu(&mut self) {
        for node in &mut self.nodes {
            if matches!(node.kind, NodeKind::MenuOption { .. }) {
                node.attached = false;
            }
        }
    }

    fn open_menu(&mut self, key: &str) {
        self.close_menu();
        let Some(script) = self.scripts.get(key).cloned() else {
            return;
        };
        if !script.menu_opens {
            return;
        }
        let now = Instant::now();
        let shown = now + Duration::from_millis(script.menu_delay_ms);
        for text in &script.options {
            let removes = text.to_lowercase().contains("remove") || text.contains("削除");
            let appears_at = if removes {
                shown + Duration::from_millis(script.remove_option_delay_ms)
            } else {
                shown
            };
            self.push(Node {
                reference: String::new(),
                item: Some(key.to_string()),
                parent: None,
                selectors: vec![MOCK_OPTION.to_string()],
                text: text.clone(),
                attributes: BTreeMap::new(),
                attached: true,
                visible: true,
                appears_at: Some(appears_at),
                kind: NodeKind::MenuOption { removes },
            });
        }
    }

    fn remove_item(&mut self, key: &str) {
        let containers: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Container && n.item.as_deref() == Some(key))
            .map(|(i, _)| i)
            .collect();
        for index in 0..self.nodes.len() {
            if containers
                .iter()
                .any(|&c| index == c || self.is_within(index, c))
            {
                self.nodes[index].attached = false;
            }
        }
        if !self.deleted.iter().any(|d| d == key) {
            self.deleted.push(key.to_string());
        }
    }

    fn choose_option(&mut self, index: usize) {
        let node = self.nodes[index].clone();
        self.close_menu();
        let (NodeKind::MenuOption { removes: true }, Some(key)) = (node.kind, node.item) else {
            return;
        };
        let Some(script) = self.scripts.get(&key).cloned() else {
            return;
        };
        match script.confirm_delay_ms {
            Some(delay) => {
                self.push(Node {
                    reference: String::new(),
                    item: Some(key),
                    parent: None,
                    selectors: vec![script.confirm_selector.clone()],
                    text: "Delete".to_string(),
                    attributes: BTreeMap::new(),
                    attached: true,
                    visible: true,
                    appears_at: Some(Instant::now() + Duration::from_millis(delay)),
                    kind: NodeKind::Confirm,
                });
            }
            None => self.remove_item(&key),
        }
    }
}

// =============================================================================
// MOCK PAGE
// =============================================================================

/// Builder for [`MockPage`]
#[derive(Debug, Default)]
pub struct MockPageBuilder {
    items: Vec<MockItem>,
    ready: bool,
}

impl MockPageBuilder {
    /// Add an item to the list
    #[must_use]
    pub fn item(mut self, item: MockItem) -> Self {
        self.items.push(item);
        self
    }

    /// Add `count` well-behaved items keyed `v1..=vN`
    #[must_use]
    pub fn items(mut self, count: usize) -> Self {
        for i in 1..=count {
            self.items.push(MockItem::new(format!("v{i}")));
        }
        self
    }

    /// Render the page-ready marker
    #[must_use]
    pub fn ready(mut self) -> Self {
        self.ready = true;
        self
    }

    /// Build the page
    #[must_use]
    pub fn build(self) -> MockPage {
        let mut dom = MockDom::default();
        if self.ready {
            dom.push(Node {
                reference: String::new(),
                item: None,
                parent: None,
                selectors: vec![MOCK_READY.to_string()],
                text: String::new(),
                attributes: BTreeMap::new(),
                attached: true,
                visible: true,
                appears_at: None,
                kind: NodeKind::Marker,
            });
        }
        for item in self.items {
            dom.render_item(&item);
            dom.order.push(item.key.clone());
            dom.scripts.insert(item.key.clone(), item);
        }
        MockPage {
            dom: Mutex::new(dom),
            calls: Mutex::new(Vec::new()),
            hook: Mutex::new(None),
        }
    }
}

/// Scripted in-memory page
pub struct MockPage {
    dom: Mutex<MockDom>,
    calls: Mutex<Vec<String>>,
    hook: Mutex<Option<ActivationHook>>,
}

impl std::fmt::Debug for MockPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPage")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl MockPage {
    /// Start building a page
    #[must_use]
    pub fn builder() -> MockPageBuilder {
        MockPageBuilder::default()
    }

    fn dom(&self) -> MutexGuard<'_, MockDom> {
        self.dom.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Run `hook(item_key)` whenever an item's menu trigger is activated
    pub fn on_menu_activation(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Recorded driver calls, `"method:reference"`
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a call starting with `method` was recorded
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(method))
    }

    /// Keys of removed items, in removal order
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.dom().deleted.clone()
    }

    /// Keys of items still on the page, in list order
    #[must_use]
    pub fn remaining(&self) -> Vec<String> {
        let dom = self.dom();
        dom.order
            .iter()
            .filter(|k| !dom.deleted.contains(k))
            .cloned()
            .collect()
    }

    fn find(&self, key: &str, kind: &NodeKind) -> Option<ElementHandle> {
        let dom = self.dom();
        dom.nodes
            .iter()
            .find(|n| n.attached && &n.kind == kind && n.item.as_deref() == Some(key))
            .map(|n| ElementHandle::new(n.reference.clone()))
    }

    /// Current container handle of an item
    #[must_use]
    pub fn container_of(&self, key: &str) -> Option<ElementHandle> {
        self.find(key, &NodeKind::Container)
    }

    /// Current trigger handle of an item
    #[must_use]
    pub fn trigger_of(&self, key: &str) -> Option<ElementHandle> {
        self.find(key, &NodeKind::Trigger)
    }

    /// Whether an item's container is currently shown
    #[must_use]
    pub fn is_visible(&self, key: &str) -> bool {
        let dom = self.dom();
        dom.nodes
            .iter()
            .any(|n| n.attached && n.kind == NodeKind::Container && n.visible && n.item.as_deref() == Some(key))
    }

    /// Re-render every remaining item: all previously issued handles go stale
    pub fn rerender(&self) {
        let mut dom = self.dom();
        for node in &mut dom.nodes {
            if node.kind != NodeKind::Marker {
                node.attached = false;
            }
        }
        let remaining: Vec<MockItem> = dom
            .order
            .iter()
            .filter(|k| !dom.deleted.contains(k))
            .filter_map(|k| dom.scripts.get(k).cloned())
            .collect();
        for script in &remaining {
            dom.render_item(script);
        }
    }

    fn activate(&self, element: &ElementHandle, synthetic: bool) -> SweepResult<()> {
        let opened = {
            let mut dom = self.dom();
            let index = dom.node(element)?;
            let node = dom.nodes[index].clone();
            let script = node.item.as_ref().and_then(|k| dom.scripts.get(k)).cloned();
            match node.kind {
                NodeKind::Trigger => {
                    let script = script.ok_or_else(|| SweepError::page("orphan trigger"))?;
                    if script.trigger_unclickable || (script.direct_click_fails && !synthetic) {
                        return Err(SweepError::activation("trigger is not clickable"));
                    }
                    dom.open_menu(&script.key);
                    Some(script.key)
                }
                NodeKind::MenuOption { .. } => {
                    if !synthetic && script.is_some_and(|s| s.option_click_fails) {
                        return Err(SweepError::activation("option click intercepted"));
                    }
                    dom.choose_option(index);
                    None
                }
                NodeKind::Confirm => {
                    dom.nodes[index].attached = false;
                    if let Some(key) = node.item {
                        dom.remove_item(&key);
                    }
                    None
                }
                NodeKind::Container | NodeKind::Link | NodeKind::Marker => None,
            }
        };

        if let Some(key) = opened {
            if let Some(hook) = self
                .hook
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
            {
                hook(&key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn query_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> SweepResult<Vec<ElementHandle>> {
        let dom = self.dom();
        let root = match scope {
            Some(handle) => Some(dom.node(handle)?),
            None => None,
        };
        let now = Instant::now();
        Ok(dom
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.attached && n.appears_at.map_or(true, |at| at <= now))
            .filter(|(_, n)| n.selectors.iter().any(|s| s == selector))
            .filter(|(i, _)| root.map_or(true, |r| dom.is_within(*i, r)))
            .map(|(_, n)| ElementHandle::new(n.reference.clone()))
            .collect())
    }

    async fn text_content(&self, element: &ElementHandle) -> SweepResult<String> {
        let dom = self.dom();
        let index = dom.node(element)?;
        Ok(dom.nodes[index].text.clone())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> SweepResult<Option<String>> {
        let dom = self.dom();
        let index = dom.node(element)?;
        Ok(dom.nodes[index].attributes.get(name).cloned())
    }

    async fn is_attached(&self, element: &ElementHandle) -> SweepResult<bool> {
        Ok(self.dom().node(element).is_ok())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> SweepResult<()> {
        self.record(format!("scroll_into_view:{}", element.reference()));
        self.dom().node(element).map(|_| ())
    }

    async fn focus(&self, element: &ElementHandle) -> SweepResult<()> {
        self.record(format!("focus:{}", element.reference()));
        self.dom().node(element).map(|_| ())
    }

    async fn click(&self, element: &ElementHandle) -> SweepResult<()> {
        self.record(format!("click:{}", element.reference()));
        self.activate(element, false)
    }

    async fn dispatch_click(&self, element: &ElementHandle) -> SweepResult<()> {
        self.record(format!("dispatch_click:{}", element.reference()));
        self.activate(element, true)
    }

    async fn click_outside(&self) -> SweepResult<()> {
        self.record("click_outside".to_string());
        self.dom().close_menu();
        Ok(())
    }

    async fn set_visible(&self, element: &ElementHandle, visible: bool) -> SweepResult<()> {
        let mut dom = self.dom();
        let index = dom.node(element)?;
        dom.nodes[index].visible = visible;
        Ok(())
    }
}

// =============================================================================
// RECORDING PEERS
// =============================================================================

/// UI sink that records everything it is shown
#[derive(Debug, Default)]
pub struct RecordingSink {
    views: Mutex<Vec<SelectionView>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    /// Selection views, oldest first
    #[must_use]
    pub fn views(&self) -> Vec<SelectionView> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Notices, oldest first
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent notice
    #[must_use]
    pub fn last_notice(&self) -> Option<Notice> {
        self.notices().pop()
    }
}

impl UiSink for RecordingSink {
    fn refresh(&self, view: SelectionView) {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(view);
    }

    fn notice(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

/// Coordinator that records every notification
#[derive(Debug, Default)]
pub struct RecordingCoordinator {
    received: Mutex<Vec<Notification>>,
}

impl RecordingCoordinator {
    /// Notifications, oldest first
    #[must_use]
    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Coordinator for RecordingCoordinator {
    async fn notify(&self, notification: Notification) -> SweepResult<()> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_menu_renders_after_delay() {
        let page = MockPage::builder()
            .item(MockItem::new("a").menu_delay_ms(300))
            .build();
        let trigger = page.trigger_of("a").unwrap();
        page.click(&trigger).await.unwrap();

        assert!(page.query_all(None, MOCK_OPTION).await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(page.query_all(None, MOCK_OPTION).await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_option_deletes_item() {
        let page = MockPage::builder().item(MockItem::new("a").menu_delay_ms(0)).build();
        page.click(&page.trigger_of("a").unwrap()).await.unwrap();

        let options = page.query_all(None, MOCK_OPTION).await.unwrap();
        page.click(&options[2]).await.unwrap();

        assert_eq!(page.deleted(), vec!["a".to_string()]);
        assert!(page.container_of("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scoped_query_on_stale_scope_errors() {
        let page = MockPage::builder().items(2).build();
        let container = page.container_of("v1").unwrap();
        page.rerender();

        let err = page.query_all(Some(&container), MOCK_TRIGGER).await.unwrap_err();
        assert!(err.is_stale());
        assert!(page.container_of("v1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_hook_fires() {
        let page = MockPage::builder().items(1).build();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        page.on_menu_activation(move |key| sink.lock().unwrap().push(key.to_string()));

        page.click(&page.trigger_of("v1").unwrap()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["v1".to_string()]);
    }
}
