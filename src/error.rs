use std::io;
use std::time::Instant;

use async_tungstenite::tungstenite;
use futures::channel::mpsc::SendError;
use futures::channel::oneshot::Canceled;
use thiserror::Error;

pub type Result<T, E = CdpError> = std::result::Result<T, E>;

/// Every error kind the runtime surfaces, per spec §7.
///
/// State-maintenance (the Target's stateUpdater) never produces one of
/// these: it logs via `tracing` and carries on, per the propagation policy
/// in spec §7.
#[derive(Debug, Error)]
pub enum CdpError {
    #[error("{0}")]
    Ws(#[from] tungstenite::Error),
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Url(#[from] url::ParseError),
    /// An error frame from the browser's response envelope.
    #[error("{0}")]
    Chrome(#[from] cdpdrive_types::Error),
    /// A command's `errorText` field was populated (CDP's "soft" error
    /// convention used by e.g. `Page.navigate`).
    #[error("{0}")]
    ChromeMessage(String),
    #[error("received no response from the chromium instance")]
    NoResponse,
    #[error("{0}")]
    ChannelSendError(#[from] ChannelError),
    /// A handle (`Page`, `Context`) was used that did not originate from
    /// this runtime's `Allocator`/`Browser`.
    #[error("handle was not produced by this allocator")]
    InvalidContext,
    /// The browser process could not be started or dialed.
    #[error("could not allocate a browser: {0}")]
    AllocationFailed(String),
    /// `ExecAllocator` launched the process but no `ws://` announcement
    /// was found on stderr within the allotted time.
    #[error("timed out waiting for the browser to announce its debugging websocket")]
    NoWsUrl,
    /// The Browser's Transport terminated while a command was pending.
    #[error("the browser connection was closed")]
    BrowserClosed,
    /// The Browser's background handler task is gone.
    #[error("the browser's handler channel was closed")]
    ChannelClosed,
    /// The calling scope was cancelled before a response arrived.
    #[error("operation was cancelled")]
    Cancelled,
    /// A deadline attached to the calling scope elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// A `waitVisible`/`waitReady`-style predicate did not converge before
    /// its deadline.
    #[error("selector did not become ready before the timeout")]
    SelectorTimeout,
    /// An action referenced a node id no longer present in the DOM cache.
    #[error("node {0} is not present in the document")]
    MissingNode(String),
    /// An action referenced a node handle whose document has since been
    /// replaced (its `invalidated` signal fired).
    #[error("node {0} was invalidated by a document update")]
    StaleNode(String),
    #[error("box model is not available for this node")]
    InvalidBoxModel,
    #[error("node has invalid or zero dimensions")]
    InvalidDimensions,
    #[error("selector matched no nodes")]
    NoResults,
    #[error("selector matched nodes but none were expected")]
    HasResults,
    #[error("node is not visible")]
    NotVisible,
    #[error("node is visible")]
    Visible,
    #[error("node is disabled")]
    Disabled,
    #[error("node is not selected")]
    NotSelected,
}

impl CdpError {
    pub fn msg(msg: impl Into<String>) -> Self {
        CdpError::ChromeMessage(msg.into())
    }

    /// `true` for the predicate-violation variants that a query-engine
    /// retry loop should treat as "not ready yet" rather than fatal.
    pub fn is_retryable_predicate(&self) -> bool {
        matches!(
            self,
            CdpError::NoResults
                | CdpError::HasResults
                | CdpError::NotVisible
                | CdpError::Visible
                | CdpError::Disabled
                | CdpError::NotSelected
                | CdpError::MissingNode(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{0}")]
    Send(#[from] SendError),
    #[error("{0}")]
    Canceled(#[from] Canceled),
}

impl From<Canceled> for CdpError {
    fn from(err: Canceled) -> Self {
        ChannelError::from(err).into()
    }
}

impl From<SendError> for CdpError {
    fn from(err: SendError) -> Self {
        ChannelError::from(err).into()
    }
}

/// An error where `now > deadline`, used by `CommandChain` to time out a
/// stalled domain-initialization sequence.
#[derive(Debug, Clone)]
pub struct DeadlineExceeded {
    pub deadline: Instant,
    pub now: Instant,
}

impl DeadlineExceeded {
    /// # Panics
    /// Panics if `now` is not after `deadline`.
    pub fn new(now: Instant, deadline: Instant) -> Self {
        assert!(now > deadline);
        Self { now, deadline }
    }
}

impl From<DeadlineExceeded> for CdpError {
    fn from(_: DeadlineExceeded) -> Self {
        CdpError::DeadlineExceeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_violations_are_retryable() {
        assert!(CdpError::NoResults.is_retryable_predicate());
        assert!(CdpError::HasResults.is_retryable_predicate());
        assert!(CdpError::NotVisible.is_retryable_predicate());
        assert!(CdpError::Visible.is_retryable_predicate());
        assert!(CdpError::Disabled.is_retryable_predicate());
        assert!(CdpError::NotSelected.is_retryable_predicate());
        assert!(CdpError::MissingNode("1".into()).is_retryable_predicate());
    }

    #[test]
    fn transport_errors_are_not_retryable() {
        assert!(!CdpError::BrowserClosed.is_retryable_predicate());
        assert!(!CdpError::NoResponse.is_retryable_predicate());
        assert!(!CdpError::SelectorTimeout.is_retryable_predicate());
        assert!(!CdpError::DeadlineExceeded.is_retryable_predicate());
    }

    #[test]
    fn msg_constructs_chrome_message() {
        match CdpError::msg("navigate failed") {
            CdpError::ChromeMessage(m) => assert_eq!(m, "navigate failed"),
            other => panic!("expected ChromeMessage, got {other:?}"),
        }
    }
}
