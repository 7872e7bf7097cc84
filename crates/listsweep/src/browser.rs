//! Chromium control over the `DevTools` protocol.
//!
//! With the `browser` feature, [`Browser`] launches (or attaches to) a
//! Chromium instance through chromiumoxide and [`CdpDriver`] implements
//! [`crate::driver::PageDriver`] for one of its tabs.
//!
//! Element handles are realized by tagging every element a query returns
//! with a `data-listsweep-ref` attribute. Later calls look the element up by
//! that attribute, so an element the page has re-rendered away reports as
//! stale instead of acting on a detached node.

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Profile directory, so a signed-in session survives restarts
    pub user_data_dir: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// `DevTools` endpoint of an already running browser
    pub connect: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 900,
            chromium_path: None,
            user_data_dir: None,
            sandbox: true,
            connect: None,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set the profile directory
    #[must_use]
    pub fn with_user_data_dir(mut self, dir: impl Into<String>) -> Self {
        self.user_data_dir = Some(dir.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Attach to a running browser instead of launching one
    #[must_use]
    pub fn with_connect(mut self, endpoint: impl Into<String>) -> Self {
        self.connect = Some(endpoint.into());
        self
    }
}

// ============================================================================
// Page-side scripts
// ============================================================================

/// Helpers every script starts with
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
const PRELUDE: &str = r#"
const REF = 'data-listsweep-ref';
const byRef = (r) => {
  const el = document.querySelector('[' + REF + '="' + r + '"]');
  return el && el.isConnected ? el : null;
};
const tag = (el) => {
  let r = el.getAttribute(REF);
  if (!r) {
    window.__listsweepSeq = (window.__listsweepSeq || 0) + 1;
    r = String(window.__listsweepSeq);
    el.setAttribute(REF, r);
  }
  return r;
};
"#;

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
mod scripts {
    pub const QUERY_ALL: &str = r"
const scope = args.scope === null ? document : byRef(args.scope);
if (!scope) return { stale: true };
return { value: Array.from(scope.querySelectorAll(args.selector), tag) };
";

    pub const TEXT: &str = r"
const el = byRef(args.ref);
if (!el) return { stale: true };
return { value: el.textContent || '' };
";

    pub const ATTRIBUTE: &str = r"
const el = byRef(args.ref);
if (!el) return { stale: true };
return { value: el.getAttribute(args.name) };
";

    pub const ATTACHED: &str = r"
return { value: byRef(args.ref) !== null };
";

    pub const SCROLL: &str = r"
const el = byRef(args.ref);
if (!el) return { stale: true };
el.scrollIntoView({ behavior: 'instant', block: 'center' });
return { value: true };
";

    pub const FOCUS: &str = r"
const el = byRef(args.ref);
if (!el) return { stale: true };
el.focus();
return { value: true };
";

    pub const CLICK: &str = r"
const el = byRef(args.ref);
if (!el) return { stale: true };
el.click();
return { value: true };
";

    pub const DISPATCH_CLICK: &str = r"
const el = byRef(args.ref);
if (!el) return { stale: true };
el.dispatchEvent(new MouseEvent('click', { view: window, bubbles: true, cancelable: true }));
return { value: true };
";

    pub const CLICK_OUTSIDE: &str = r"
document.body.click();
return { value: true };
";

    pub const SET_VISIBLE: &str = r"
const el = byRef(args.ref);
if (!el) return { stale: true };
el.style.display = args.visible ? '' : 'none';
return { value: true };
";
}

/// Wrap a script body into a self-invoking expression over `args`
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn wrap(body: &str, args: &serde_json::Value) -> String {
    format!("((args) => {{{PRELUDE}{body}}})({args})")
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::significant_drop_tightening)]
mod cdp {
    use super::{scripts, wrap, BrowserConfig};
    use crate::driver::{ElementHandle, PageDriver};
    use crate::result::{SweepError, SweepResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Browser instance with a live CDP connection
    #[derive(Debug)]
    pub struct Browser {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        #[allow(dead_code)]
        handle: tokio::task::JoinHandle<()>,
    }

    impl Browser {
        /// Launch a browser, or attach to one when `config.connect` is set
        pub async fn start(config: BrowserConfig) -> SweepResult<Self> {
            let (browser, mut handler) = if let Some(ref endpoint) = config.connect {
                tracing::info!(%endpoint, "connecting to running browser");
                CdpBrowser::connect(endpoint.as_str())
                    .await
                    .map_err(|e| SweepError::ConnectionFailed {
                        message: e.to_string(),
                    })?
            } else {
                let mut builder = CdpConfig::builder()
                    .window_size(config.viewport_width, config.viewport_height);
                if !config.headless {
                    builder = builder.with_head();
                }
                if !config.sandbox {
                    builder = builder.no_sandbox();
                }
                if let Some(ref path) = config.chromium_path {
                    builder = builder.chrome_executable(path);
                }
                if let Some(ref dir) = config.user_data_dir {
                    builder = builder.user_data_dir(dir);
                }
                let cdp_config = builder
                    .build()
                    .map_err(|message| SweepError::BrowserLaunchError { message })?;

                tracing::info!(headless = config.headless, "launching browser");
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| SweepError::BrowserLaunchError {
                        message: e.to_string(),
                    })?
            };

            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(err) = event {
                        tracing::debug!(error = %err, "CDP handler stopped");
                        break;
                    }
                }
            });

            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Open `url`, reusing an existing tab already showing it
        pub async fn open(&self, url: &str) -> SweepResult<CdpDriver> {
            let browser = self.inner.lock().await;

            if self.config.connect.is_some() {
                let pages = browser.pages().await.map_err(|e| SweepError::page(e.to_string()))?;
                for page in pages {
                    if let Ok(Some(current)) = page.url().await {
                        if current.starts_with(url) {
                            tracing::info!(%current, "reusing open tab");
                            return Ok(CdpDriver::new(page));
                        }
                    }
                }
            }

            let page = browser
                .new_page(url)
                .await
                .map_err(|e| SweepError::NavigationError {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            page.wait_for_navigation()
                .await
                .map_err(|e| SweepError::NavigationError {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            tracing::info!(%url, "page opened");
            Ok(CdpDriver::new(page))
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close a launched browser; an attached one is left running
        pub async fn close(self) -> SweepResult<()> {
            if self.config.connect.is_some() {
                return Ok(());
            }
            let mut browser = self.inner.lock().await;
            browser
                .close()
                .await
                .map_err(|e| SweepError::BrowserLaunchError {
                    message: e.to_string(),
                })?;
            Ok(())
        }
    }

    /// [`PageDriver`] over one Chromium tab
    #[derive(Debug, Clone)]
    pub struct CdpDriver {
        page: CdpPage,
    }

    impl CdpDriver {
        /// Drive `page`
        #[must_use]
        pub const fn new(page: CdpPage) -> Self {
            Self { page }
        }

        async fn call(&self, body: &str, args: Value) -> SweepResult<Value> {
            let reference = args
                .get("ref")
                .and_then(Value::as_str)
                .or_else(|| args.get("scope").and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();
            let reply: Value = self
                .page
                .evaluate(wrap(body, &args))
                .await
                .map_err(|e| SweepError::script(e.to_string()))?
                .into_value()
                .map_err(|e| SweepError::script(e.to_string()))?;

            if reply.get("stale").and_then(Value::as_bool) == Some(true) {
                return Err(SweepError::StaleElement { reference });
            }
            Ok(reply.get("value").cloned().unwrap_or(Value::Null))
        }

        async fn act(&self, body: &str, element: &ElementHandle) -> SweepResult<()> {
            self.call(body, json!({ "ref": element.reference() }))
                .await
                .map(|_| ())
        }
    }

    #[async_trait]
    impl PageDriver for CdpDriver {
        async fn query_all(
            &self,
            scope: Option<&ElementHandle>,
            selector: &str,
        ) -> SweepResult<Vec<ElementHandle>> {
            let args = json!({
                "scope": scope.map(ElementHandle::reference),
                "selector": selector,
            });
            let refs: Vec<String> = serde_json::from_value(self.call(scripts::QUERY_ALL, args).await?)?;
            Ok(refs.into_iter().map(ElementHandle::new).collect())
        }

        async fn text_content(&self, element: &ElementHandle) -> SweepResult<String> {
            let value = self
                .call(scripts::TEXT, json!({ "ref": element.reference() }))
                .await?;
            Ok(value.as_str().unwrap_or_default().to_string())
        }

        async fn attribute(
            &self,
            element: &ElementHandle,
            name: &str,
        ) -> SweepResult<Option<String>> {
            let value = self
                .call(
                    scripts::ATTRIBUTE,
                    json!({ "ref": element.reference(), "name": name }),
                )
                .await?;
            Ok(value.as_str().map(str::to_string))
        }

        async fn is_attached(&self, element: &ElementHandle) -> SweepResult<bool> {
            let value = self
                .call(scripts::ATTACHED, json!({ "ref": element.reference() }))
                .await?;
            Ok(value.as_bool().unwrap_or(false))
        }

        async fn scroll_into_view(&self, element: &ElementHandle) -> SweepResult<()> {
            self.act(scripts::SCROLL, element).await
        }

        async fn focus(&self, element: &ElementHandle) -> SweepResult<()> {
            self.act(scripts::FOCUS, element).await
        }

        async fn click(&self, element: &ElementHandle) -> SweepResult<()> {
            self.act(scripts::CLICK, element).await.map_err(|err| match err {
                SweepError::ScriptError { message } => SweepError::activation(message),
                other => other,
            })
        }

        async fn dispatch_click(&self, element: &ElementHandle) -> SweepResult<()> {
            self.act(scripts::DISPATCH_CLICK, element)
                .await
                .map_err(|err| match err {
                    SweepError::ScriptError { message } => SweepError::activation(message),
                    other => other,
                })
        }

        async fn click_outside(&self) -> SweepResult<()> {
            self.call(scripts::CLICK_OUTSIDE, json!({})).await.map(|_| ())
        }

        async fn set_visible(&self, element: &ElementHandle, visible: bool) -> SweepResult<()> {
            self.call(
                scripts::SET_VISIBLE,
                json!({ "ref": element.reference(), "visible": visible }),
            )
            .await
            .map(|_| ())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{Browser, CdpDriver};
