//! The user-facing handle: a cancellable scope that lazily allocates a
//! browser and attaches a target on first use, runs actions against that
//! target, and on cancellation detaches/closes its tab (or the whole
//! browser, if it is the context that caused the allocation).

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Either};
use futures::lock::Mutex;
use futures::{FutureExt, StreamExt};
use futures_timer::Delay;

use crate::allocator::Allocator;
use crate::browser::{Browser, BrowserConfig};
use crate::cdp::browser_protocol::browser::BrowserContextId;
use crate::cdp::browser_protocol::network::Response as NetworkResponse;
use crate::cdp::events::CdpEvent;
use crate::element::Element;
use crate::error::{CdpError, Result};
use crate::handler::Handler;
use crate::page::Page;
use crate::query::{self, Predicate, Selector};

cfg_if::cfg_if! {
    if #[cfg(feature = "async-std-runtime")] {
        fn spawn_handler(handler: Handler) -> BoxFuture<'static, ()> {
            async_std::task::spawn(handler.for_each(|res| async move {
                if let Err(err) = res {
                    tracing::error!(%err, "browser connection ended");
                }
            }))
            .boxed()
        }
    } else if #[cfg(feature = "tokio-runtime")] {
        fn spawn_handler(handler: Handler) -> BoxFuture<'static, ()> {
            tokio::spawn(handler.for_each(|res| async move {
                if let Err(err) = res {
                    tracing::error!(%err, "browser connection ended");
                }
            }))
            .map(|_| ())
            .boxed()
        }
    }
}

/// State shared by a context chain: the allocator always, the browser (and
/// its handler-completion future) once the first `run`/`query`/`wait_for`
/// call on any member of the chain allocates one.
struct Shared {
    browser: Option<Browser>,
    handler_done: Option<BoxFuture<'static, ()>>,
}

/// A cancellable scope owning (at most) one attached `Page`.
///
/// Cloning an `Allocator` handle across `Context`s is cheap (`Arc`); the
/// `Browser`, once allocated, is shared the same way. Each `Context` still
/// gets its own `Page`: calling `run`/`query` on a child opens a fresh tab
/// rather than reusing the parent's.
pub struct Context {
    allocator: Arc<dyn Allocator>,
    config: BrowserConfig,
    shared: Arc<Mutex<Shared>>,
    page: Arc<Mutex<Option<Page>>>,
    /// `true` iff this context caused the browser allocation: cancelling it
    /// closes the whole browser rather than just this context's tab.
    first: bool,
    /// `Some` iff this context created an isolated browser context and must
    /// dispose it on teardown.
    browser_context: Option<BrowserContextId>,
}

impl Context {
    /// Creates a root context. The browser is not allocated until the first
    /// `run`/`query`/`wait_for`/`run_response` call.
    pub fn new(allocator: Arc<dyn Allocator>, config: BrowserConfig) -> Self {
        Self {
            allocator,
            config,
            shared: Arc::new(Mutex::new(Shared {
                browser: None,
                handler_done: None,
            })),
            page: Arc::new(Mutex::new(None)),
            first: true,
            browser_context: None,
        }
    }

    /// Creates a child context sharing this context's allocator and (once
    /// allocated) browser, but with its own tab.
    pub fn new_child(&self) -> Self {
        Self {
            allocator: self.allocator.clone(),
            config: self.config.clone(),
            shared: self.shared.clone(),
            page: Arc::new(Mutex::new(None)),
            first: false,
            browser_context: None,
        }
    }

    /// Creates a child context whose tab lives in a fresh isolated browser
    /// context (no shared cookies/cache with siblings). Allocates the
    /// browser eagerly, since creating the browser context requires one.
    pub async fn new_isolated_child(&self) -> Result<Self> {
        let browser = self.ensure_browser().await?;
        let browser_context_id = browser.create_browser_context().await?;
        Ok(Self {
            allocator: self.allocator.clone(),
            config: self.config.clone(),
            shared: self.shared.clone(),
            page: Arc::new(Mutex::new(None)),
            first: false,
            browser_context: Some(browser_context_id),
        })
    }

    async fn ensure_browser(&self) -> Result<Browser> {
        let mut shared = self.shared.lock().await;
        if let Some(browser) = &shared.browser {
            return Ok(browser.clone());
        }
        let (browser, handler) = self.allocator.allocate(self.config.clone()).await?;
        shared.handler_done = Some(spawn_handler(handler));
        shared.browser = Some(browser.clone());
        Ok(browser)
    }

    async fn ensure_page(&self) -> Result<Page> {
        let mut slot = self.page.lock().await;
        if let Some(page) = &*slot {
            return Ok(page.clone());
        }
        let browser = self.ensure_browser().await?;
        let page = if let Some(browser_context_id) = self.browser_context.clone() {
            browser
                .new_page_in_context("about:blank", browser_context_id)
                .await?
        } else if self.first {
            Self::pick_initial_page(&browser).await?
        } else {
            browser.new_page("about:blank").await?
        };
        *slot = Some(page.clone());
        Ok(page)
    }

    /// Prefers an already-open `about:blank` tab (the one Chrome starts
    /// with); otherwise waits for the first `page` target to become ready
    /// (Chrome's own startup tab attaches shortly after the connection comes
    /// up, so racing to open a fresh tab here would leave two open).
    async fn pick_initial_page(browser: &Browser) -> Result<Page> {
        for page in browser.pages().await? {
            if page.current_url().await.unwrap_or_default() == "about:blank" {
                return Ok(page);
            }
        }
        browser.wait_for_next_page().await
    }

    /// The attached page, allocating a browser and tab if this is the first
    /// call on this context.
    pub async fn page(&self) -> Result<Page> {
        self.ensure_page().await
    }

    /// Runs a single action against this context's page.
    pub async fn run(&self, action: &dyn Action) -> Result<()> {
        let page = self.ensure_page().await?;
        action.run(&page).await
    }

    /// Runs a sequence of actions in order, stopping at the first error.
    pub async fn run_all(&self, actions: &[Box<dyn Action>]) -> Result<()> {
        let page = self.ensure_page().await?;
        for action in actions {
            action.run(&page).await?;
        }
        Ok(())
    }

    /// Resolves `selector` and checks `predicate` once, with no retry.
    pub async fn query(&self, selector: impl Into<Selector>, predicate: Predicate) -> Result<Vec<Element>> {
        let page = self.ensure_page().await?;
        query::query(&page, selector.into(), predicate).await
    }

    /// Polls `selector`/`predicate` until it holds or `timeout` elapses.
    pub async fn wait_for(
        &self,
        selector: impl Into<Selector>,
        predicate: Predicate,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Vec<Element>> {
        let page = self.ensure_page().await?;
        query::wait_for(&page, selector.into(), predicate, poll_interval, timeout).await
    }

    /// Runs `action` (expected to trigger navigation) and reports the
    /// top-level document's response, locking onto the navigation's
    /// `loaderId` via the first `init` lifecycle event.
    pub async fn run_response(&self, action: &dyn Action, timeout: Duration) -> Result<RunResponse> {
        let page = self.ensure_page().await?;
        let mut events = page.subscribe_events().await?;

        action.run(&page).await?;

        let deadline = Instant::now() + timeout;
        let mut loader_id: Option<String> = None;
        let mut request_id = None;
        let mut response = None;

        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(CdpError::DeadlineExceeded)?;
            let next = events.next();
            let timer = Delay::new(remaining);
            futures::pin_mut!(next);
            futures::pin_mut!(timer);

            let event = match futures::future::select(next, timer).await {
                Either::Left((Some(event), _)) => event,
                Either::Left((None, _)) => return Err(CdpError::BrowserClosed),
                Either::Right(_) => return Err(CdpError::DeadlineExceeded),
            };

            match &event.params {
                CdpEvent::PageLifecycleEvent(ev) if loader_id.is_none() && ev.name == "init" => {
                    loader_id = Some(ev.loader_id.to_string());
                }
                CdpEvent::NetworkRequestWillBeSent(ev) if request_id.is_none() => {
                    let matches = loader_id
                        .as_ref()
                        .map(|id| ev.loader_id.to_string() == *id)
                        .unwrap_or(false);
                    if matches {
                        request_id = Some(ev.request_id.clone());
                    }
                }
                CdpEvent::NetworkResponseReceived(ev) => {
                    if request_id.as_ref() == Some(&ev.request_id) {
                        response = Some(ev.response.clone());
                    }
                }
                CdpEvent::NetworkLoadingFailed(ev) => {
                    if request_id.as_ref() == Some(&ev.request_id) {
                        return Err(CdpError::ChromeMessage(ev.error_text.clone()));
                    }
                }
                CdpEvent::PageLoadEventFired(_) | CdpEvent::PageNavigatedWithinDocument(_) => {
                    return Ok(RunResponse {
                        request_id,
                        response,
                        url: page.current_url().await.unwrap_or_default(),
                    });
                }
                _ => {}
            }
        }
    }

    /// Graceful scope cancellation: a first context closes the whole
    /// browser; a non-first context detaches and closes only its tab
    /// (bounded by a 1s timeout, since the browser may already be gone).
    pub async fn cancel(self) -> Result<()> {
        let page = self.page.lock().await.take();

        if self.first {
            let browser = self.shared.lock().await.browser.take();
            if let Some(browser) = browser {
                let _ = browser.close().await;
            }
        } else {
            if let Some(page) = page {
                let _ = with_timeout(Duration::from_secs(1), page.close()).await;
            }
            if let Some(browser_context_id) = self.browser_context {
                if let Some(browser) = self.shared.lock().await.browser.clone() {
                    let _ = browser.dispose_browser_context(browser_context_id).await;
                }
            }
        }

        let handler_done = self.shared.lock().await.handler_done.take();
        if let Some(handler_done) = handler_done {
            if self.first {
                handler_done.await;
            }
        }
        Ok(())
    }
}

/// The result of [`Context::run_response`].
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub request_id: Option<crate::cdp::browser_protocol::network::RequestId>,
    pub response: Option<NetworkResponse>,
    pub url: String,
}

async fn with_timeout<F: std::future::Future>(dur: Duration, fut: F) -> Option<F::Output> {
    futures::pin_mut!(fut);
    let timer = Delay::new(dur);
    futures::pin_mut!(timer);
    match futures::future::select(fut, timer).await {
        Either::Left((out, _)) => Some(out),
        Either::Right(_) => None,
    }
}

/// A user-composable unit of behavior run against a `Page` by
/// [`Context::run`]/[`Context::run_all`]/[`Context::run_response`].
pub trait Action: Send + Sync {
    fn run<'a>(&'a self, page: &'a Page) -> BoxFuture<'a, Result<()>>;
}

impl<F> Action for F
where
    F: for<'a> Fn(&'a Page) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    fn run<'a>(&'a self, page: &'a Page) -> BoxFuture<'a, Result<()>> {
        (self)(page)
    }
}
