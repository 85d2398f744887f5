use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::Sender;
use futures::channel::oneshot;
use futures::SinkExt;

use cdpdrive_types::{Command, CommandResponse};

use crate::allocator::{Allocator, ExecAllocator};
use crate::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use crate::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use crate::error::{CdpError, Result};
use crate::handler::{execute, Handler, HandlerMessage};
use crate::page::Page;

/// A connected browser endpoint. Cheaply `Clone`-able: every clone shares
/// the same background `Handler` and id counter.
///
/// Dropping every `Browser` clone for a given connection does not itself
/// close it; the `Handler` (returned alongside from `connect`/`launch`) must
/// be polled to completion, and keeps running for as long as it is polled.
#[derive(Clone)]
pub struct Browser {
    sender: Sender<HandlerMessage>,
    next_id: Arc<AtomicUsize>,
}

impl Browser {
    pub(crate) fn from_sender(sender: Sender<HandlerMessage>) -> Self {
        Self {
            sender,
            next_id: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Connects directly to an already-running browser's debugging
    /// websocket. The returned `Handler` must be spawned/polled for the
    /// connection to make progress.
    pub async fn connect(debug_ws_url: impl AsRef<str>) -> Result<(Self, Handler)> {
        crate::allocator::RemoteAllocator::new(debug_ws_url.as_ref().to_string())
            .allocate(BrowserConfig::default())
            .await
    }

    /// Launches a fresh local browser process per `config` and connects to
    /// it. The returned `Handler` must be spawned/polled for the connection
    /// to make progress, and owns the child process: dropping it kills the
    /// browser and removes its scratch profile directory.
    pub async fn launch(config: BrowserConfig) -> Result<(Self, Handler)> {
        ExecAllocator::new().allocate(config).await
    }

    /// A monotonically increasing id, useful for correlating this runtime's
    /// own bookkeeping (e.g. per-`Context` ids) across a session.
    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Sends a browser-scoped (no session) command and awaits its response.
    pub async fn execute<T: Command>(&self, cmd: T) -> Result<CommandResponse<T::Response>> {
        execute(cmd, self.sender.clone(), None).await
    }

    /// Opens a new page/tab.
    pub async fn new_page(&self, params: impl Into<CreateTargetParams>) -> Result<Page> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .clone()
            .send(HandlerMessage::CreatePage(params.into(), tx))
            .await?;
        rx.await?
    }

    /// Opens a new page/tab within an isolated browser context.
    pub async fn new_page_in_context(
        &self,
        url: impl Into<String>,
        browser_context_id: BrowserContextId,
    ) -> Result<Page> {
        let params = CreateTargetParams::builder()
            .url(url.into())
            .browser_context_id(browser_context_id)
            .build()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        self.new_page(params).await
    }

    /// Creates a fresh isolated browser context (akin to an incognito
    /// profile). The caller is responsible for disposing it via
    /// `dispose_browser_context` once done.
    pub async fn create_browser_context(&self) -> Result<BrowserContextId> {
        Ok(self
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id)
    }

    /// Disposes a browser context created via `create_browser_context`,
    /// closing every page still open within it.
    pub async fn dispose_browser_context(&self, id: BrowserContextId) -> Result<()> {
        self.execute(DisposeBrowserContextParams::new(id)).await?;
        Ok(())
    }

    /// All currently attached, initialized pages.
    pub async fn pages(&self) -> Result<Vec<Page>> {
        let (tx, rx) = oneshot::channel();
        self.sender.clone().send(HandlerMessage::GetPages(tx)).await?;
        Ok(rx.await?)
    }

    /// Resolves with the first `page`-typed target to become ready: an
    /// already-ready one if there is already one, otherwise the next
    /// `Target.targetCreated`/attach/init sequence to complete for one.
    pub async fn wait_for_next_page(&self) -> Result<Page> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .clone()
            .send(HandlerMessage::WaitForNextPage(tx))
            .await?;
        Ok(rx.await?)
    }

    /// Gracefully closes the browser: issues `Browser.close`, then tells the
    /// handler that the ensuing transport EOF is expected rather than an
    /// error. Does not itself wait for the process to exit; await the
    /// `Handler` future (or drop it) to do that.
    pub async fn close(&self) -> Result<()> {
        let _ = self.execute(CloseParams::default()).await;
        let (tx, rx) = oneshot::channel();
        self.sender.clone().send(HandlerMessage::Close(tx)).await?;
        let _ = rx.await;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Determines whether to run headless version of the browser. Defaults
    /// to true.
    pub headless: bool,
    /// Determines whether to run the browser with a sandbox.
    pub sandbox: bool,
    /// Launch the browser with a specific window width and height.
    pub window_size: Option<(u32, u32)>,
    /// Launch the browser with a specific debugging port. Only meaningful
    /// as a hint; `ExecAllocator` always requests port 0 and discovers the
    /// real one from the process's announcement.
    pub port: Option<u16>,
    /// Path for Chrome or Chromium.
    ///
    /// If unspecified, the crate will try to automatically detect a
    /// suitable binary via [`default_executable`].
    pub path: Option<std::path::PathBuf>,

    /// A list of Chrome extensions to load.
    ///
    /// An extension should be a path to a folder containing the extension
    /// code. CRX files cannot be used directly and must be first extracted.
    ///
    /// Note that Chrome does not support loading extensions in
    /// headless-mode. See
    /// https://bugs.chromium.org/p/chromium/issues/detail?id=706008#c5
    pub extensions: Vec<String>,

    /// How long to keep the WebSocket to the browser for after not
    /// receiving any events from it. Defaults to 30 seconds.
    pub idle_browser_timeout: Duration,

    /// Environment variables to set for the Chromium process. Passes value
    /// through to `std::process::Command::envs`.
    pub process_envs: Option<HashMap<String, String>>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            window_size: None,
            port: None,
            path: None,
            extensions: vec![],
            idle_browser_timeout: Duration::from_secs(30),
            process_envs: None,
        }
    }
}

/// Returns the path to Chrome's executable.
///
/// If the `CHROME` environment variable is set, `default_executable` will
/// use it as the default path. Otherwise, the filenames
/// `google-chrome-stable`, `chromium`, `chromium-browser`, `chrome` and
/// `chrome-browser` are searched for in standard places. If that fails,
/// `/Applications/Google Chrome.app/...` (on macOS) or the registry (on
/// Windows) is consulted. If all of the above fail, an error is returned.
pub fn default_executable() -> std::result::Result<std::path::PathBuf, String> {
    if let Ok(path) = std::env::var("CHROME") {
        if std::path::Path::new(&path).exists() {
            return Ok(path.into());
        }
    }

    for app in &[
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
        "chrome-browser",
    ] {
        if let Ok(path) = which::which(app) {
            return Ok(path);
        }
    }

    #[cfg(target_os = "macos")]
    {
        let default_paths = &["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"][..];
        for path in default_paths {
            if std::path::Path::new(path).exists() {
                return Ok(path.into());
            }
        }
    }

    #[cfg(windows)]
    {
        if let Some(path) = winreg_chrome_path() {
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err("Could not auto detect a chrome executable".to_string())
}

#[cfg(windows)]
fn winreg_chrome_path() -> Option<std::path::PathBuf> {
    use winreg::enums::HKEY_LOCAL_MACHINE;
    use winreg::RegKey;

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let key = hklm
        .open_subkey(r"SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\chrome.exe")
        .ok()?;
    let path: String = key.get_value("").ok()?;
    Some(std::path::PathBuf::from(path))
}
