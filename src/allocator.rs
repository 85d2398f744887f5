//! Produces a connected [`Browser`] either by spawning a fresh local process
//! or by dialing one that is already running.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Either};
use futures::io::{AsyncBufReadExt, BufReader};
use futures::FutureExt;
use futures_timer::Delay;

use crate::async_process::{Child, Command as ProcessCommand, Stdio};
use crate::browser::{default_executable, Browser, BrowserConfig};
use crate::conn::Connection;
use crate::error::{CdpError, Result};
use crate::handler::{ExecGuard, Handler};

static NEXT_PROFILE: AtomicUsize = AtomicUsize::new(0);

const DEFAULT_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-hang-monitor",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-sync",
    "--disable-translate",
    "--metrics-recording-only",
    "--no-first-run",
    "--safebrowsing-disable-auto-update",
    "--enable-automation",
    "--password-store=basic",
    "--use-mock-keychain",
];

/// Brings up a browser endpoint from a [`BrowserConfig`]. `ExecAllocator`
/// spawns a fresh local process per call; `RemoteAllocator` dials (or
/// resolves, then dials) an endpoint that already exists.
pub trait Allocator: std::fmt::Debug + Send + Sync {
    /// Returns the connected `Browser` handle and its background `Handler`;
    /// the caller must poll the handler to completion (typically via a
    /// spawned task) for anything to actually happen on the connection.
    fn allocate(&self, config: BrowserConfig) -> BoxFuture<'static, Result<(Browser, Handler)>>;
}

/// Spawns the browser binary named by `config.path` (or the
/// platform-default one) with a scratch user-data directory, discovers its
/// debugging websocket by scanning stderr, and dials it.
#[derive(Debug, Clone)]
pub struct ExecAllocator {
    launch_timeout: Duration,
}

impl ExecAllocator {
    pub fn new() -> Self {
        Self {
            launch_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }
}

impl Default for ExecAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for ExecAllocator {
    fn allocate(&self, config: BrowserConfig) -> BoxFuture<'static, Result<(Browser, Handler)>> {
        let launch_timeout = self.launch_timeout;
        async move { exec_launch(config, launch_timeout).await }.boxed()
    }
}

async fn exec_launch(config: BrowserConfig, launch_timeout: Duration) -> Result<(Browser, Handler)> {
    let user_data_dir = std::env::temp_dir().join(format!(
        "cdpdrive-profile-{}-{}",
        std::process::id(),
        NEXT_PROFILE.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&user_data_dir)?;

    match try_launch(&config, &user_data_dir, launch_timeout).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            let _ = std::fs::remove_dir_all(&user_data_dir);
            Err(err)
        }
    }
}

async fn try_launch(
    config: &BrowserConfig,
    user_data_dir: &std::path::Path,
    launch_timeout: Duration,
) -> Result<(Browser, Handler)> {
    let path = match &config.path {
        Some(path) => path.clone(),
        None => default_executable().map_err(CdpError::AllocationFailed)?,
    };

    let mut cmd = ProcessCommand::new(&path);
    cmd.args(DEFAULT_ARGS);
    cmd.arg("--remote-debugging-port=0");
    cmd.arg(format!("--user-data-dir={}", user_data_dir.display()));

    if !config.sandbox {
        cmd.arg("--no-sandbox");
    }
    if config.headless {
        cmd.arg("--headless=new");
    }
    if let Some((width, height)) = config.window_size {
        cmd.arg(format!("--window-size={},{}", width, height));
    }
    if !config.extensions.is_empty() {
        cmd.arg(format!("--load-extension={}", config.extensions.join(",")));
    }
    if let Some(envs) = &config.process_envs {
        cmd.envs(envs.clone());
    }
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let stderr = child.stderr.take().ok_or(CdpError::NoWsUrl)?;

    let ws_url = read_ws_url(stderr, launch_timeout).await?;
    let ws_url = rewrite_host_to_ip(&ws_url)?;

    let conn = match Connection::connect(&ws_url).await {
        Ok(conn) => conn,
        Err(err) => {
            let _ = child.kill().await;
            return Err(err);
        }
    };

    let (tx, rx) = futures::channel::mpsc::channel(32);
    let guard = ExecGuard::new(child, user_data_dir.to_path_buf());
    let handler = Handler::new(conn, rx, tx.clone(), Some(guard));
    let browser = Browser::from_sender(tx);
    Ok((browser, handler))
}

/// Watches `stderr` for Chrome's `DevTools listening on ws://...` line.
async fn read_ws_url(
    stderr: crate::async_process::ChildStderr,
    timeout: Duration,
) -> Result<String> {
    let mut lines = BufReader::new(stderr).lines();
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or(CdpError::NoWsUrl)?;

        let next_line = lines.next();
        let timer = Delay::new(remaining);
        futures::pin_mut!(next_line);
        futures::pin_mut!(timer);

        match futures::future::select(next_line, timer).await {
            Either::Left((Some(Ok(line)), _)) => {
                if let Some(url) = parse_ws_url(&line) {
                    return Ok(url);
                }
            }
            Either::Left((Some(Err(err)), _)) => return Err(err.into()),
            Either::Left((None, _)) => return Err(CdpError::NoWsUrl),
            Either::Right(_) => return Err(CdpError::NoWsUrl),
        }
    }
}

fn parse_ws_url(line: &str) -> Option<String> {
    let idx = line.find("ws://")?;
    Some(line[idx..].trim().to_string())
}

/// Rewrites the websocket URL's host to an IP literal, sidestepping
/// IPv4/IPv6 resolution races on `localhost`.
fn rewrite_host_to_ip(ws_url: &str) -> Result<String> {
    let mut url = url::Url::parse(ws_url)?;
    url.set_host(Some("127.0.0.1"))
        .map_err(|_| CdpError::NoWsUrl)?;
    Ok(url.into())
}

/// Dials a browser that is already running, never spawning or killing a
/// process.
#[derive(Debug, Clone)]
pub struct RemoteAllocator {
    url: String,
}

impl RemoteAllocator {
    /// `url` may be a `ws://`/`wss://` debugging endpoint, or an `http(s)://`
    /// endpoint to resolve via `/json/version` first.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Allocator for RemoteAllocator {
    fn allocate(&self, _config: BrowserConfig) -> BoxFuture<'static, Result<(Browser, Handler)>> {
        let url = self.url.clone();
        async move {
            let ws_url = if url.starts_with("http://") || url.starts_with("https://") {
                resolve_ws_url(&url).await?
            } else {
                url
            };
            let conn = Connection::connect(&ws_url).await?;
            let (tx, rx) = futures::channel::mpsc::channel(32);
            let handler = Handler::new(conn, rx, tx.clone(), None);
            let browser = Browser::from_sender(tx);
            Ok((browser, handler))
        }
        .boxed()
    }
}

async fn resolve_ws_url(http_url: &str) -> Result<String> {
    let endpoint = format!("{}/json/version", http_url.trim_end_matches('/'));
    let resp = reqwest::get(&endpoint)
        .await
        .map_err(|err| CdpError::AllocationFailed(err.to_string()))?;
    let body: serde_json::Value = resp
        .json()
        .await
        .map_err(|err| CdpError::AllocationFailed(err.to_string()))?;
    body.get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| CdpError::AllocationFailed("no webSocketDebuggerUrl in /json/version".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ws_url_out_of_a_stderr_line() {
        let line = "DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc-123";
        assert_eq!(
            parse_ws_url(line),
            Some("ws://127.0.0.1:9222/devtools/browser/abc-123".to_string())
        );
    }

    #[test]
    fn lines_without_a_ws_url_are_ignored() {
        assert_eq!(parse_ws_url("Starting Chrome..."), None);
    }

    #[test]
    fn rewrites_localhost_to_loopback_ip() {
        let rewritten =
            rewrite_host_to_ip("ws://localhost:9222/devtools/browser/abc-123").unwrap();
        assert!(rewritten.starts_with("ws://127.0.0.1:9222/"));
    }
}
