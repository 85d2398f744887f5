use std::borrow::Cow;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;

use async_tungstenite::WebSocketStream;
use futures::stream::Stream;
use futures::task::{Context, Poll};
use futures::Sink;

use cdpdrive_types::{CallId, Event, Message, MethodCall};

use crate::error::{CdpError, Result};
use cdpdrive_cdp::cdp::browser_protocol::target::SessionId;

cfg_if::cfg_if! {
    if #[cfg(feature = "async-std-runtime")] {
        type ConnectStream = async_tungstenite::async_std::ConnectStream;

        async fn dial(url: &str) -> Result<WebSocketStream<ConnectStream>> {
            let (ws, _) = async_tungstenite::async_std::connect_async(url).await?;
            Ok(ws)
        }
    } else if #[cfg(feature = "tokio-runtime")] {
        type ConnectStream = async_tungstenite::tokio::ConnectStream;

        async fn dial(url: &str) -> Result<WebSocketStream<ConnectStream>> {
            let (ws, _) = async_tungstenite::tokio::connect_async(url).await?;
            Ok(ws)
        }
    }
}

/// The single full-duplex WebSocket carrying length-framed JSON messages
/// to/from one browser process (spec §4.1).
///
/// Frames are JSON; this layer never inspects them beyond the envelope
/// needed to route responses vs. events (`Message<T>`). Not safe for
/// concurrent writers or readers — exactly one owner drives this stream,
/// matching spec §5's "exactly one writer/reader task per Transport".
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct Connection<T: Event> {
    /// Commands queued to send, in FIFO order.
    pending_commands: VecDeque<MethodCall>,
    ws: WebSocketStream<ConnectStream>,
    next_id: u64,
    needs_flush: bool,
    /// The message currently being flushed to the socket.
    pending_flush: Option<MethodCall>,
    _marker: PhantomData<T>,
}

impl<T: Event + Unpin> Connection<T> {
    pub async fn connect(debug_ws_url: impl AsRef<str>) -> Result<Self> {
        let ws = dial(debug_ws_url.as_ref()).await?;
        Ok(Self {
            pending_commands: Default::default(),
            ws,
            next_id: 0,
            needs_flush: false,
            pending_flush: None,
            _marker: Default::default(),
        })
    }
}

impl<T: Event> Connection<T> {
    fn next_call_id(&mut self) -> CallId {
        let id = CallId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Queues a command to send over the socket, returning the id assigned
    /// to it. Per spec §8 law 1, ids are unique and strictly increasing for
    /// the lifetime of this connection.
    pub fn submit_command(
        &mut self,
        method: Cow<'static, str>,
        session_id: Option<SessionId>,
        params: serde_json::Value,
    ) -> serde_json::Result<CallId> {
        let id = self.next_call_id();
        tracing::debug!(%id, %method, "submit command");
        let call = MethodCall {
            id,
            method,
            session_id: session_id.map(Into::into),
            params,
        };
        self.pending_commands.push_back(call);
        Ok(id)
    }

    /// Flushes any in-flight message and starts sending the next queued
    /// command, preserving FIFO order across the socket.
    fn start_send_next(&mut self, cx: &mut Context<'_>) -> Result<()> {
        if self.needs_flush {
            if let Poll::Ready(Ok(())) = Sink::poll_flush(Pin::new(&mut self.ws), cx) {
                self.needs_flush = false;
            }
        }
        if self.pending_flush.is_none() && !self.needs_flush {
            if let Some(cmd) = self.pending_commands.pop_front() {
                let msg = serde_json::to_string(&cmd)?;
                Sink::start_send(Pin::new(&mut self.ws), msg.into())?;
                self.pending_flush = Some(cmd);
            }
        }
        Ok(())
    }

    /// Closes the underlying socket. Errors here are not propagated; a
    /// best-effort close is all the contract requires.
    pub async fn close(&mut self) {
        use futures::SinkExt;
        let _ = Sink::close(Pin::new(&mut self.ws)).await;
    }
}

impl<T: Event + Unpin> Stream for Connection<T> {
    type Item = Result<Message<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();

        if let Err(err) = pin.start_send_next(cx) {
            return Poll::Ready(Some(Err(err)));
        }

        if let Some(call) = pin.pending_flush.take() {
            if Sink::poll_ready(Pin::new(&mut pin.ws), cx).is_ready() {
                pin.needs_flush = true;
            } else {
                pin.pending_flush = Some(call);
            }
        }

        match Stream::poll_next(Pin::new(&mut pin.ws), cx) {
            Poll::Ready(Some(Ok(msg))) => {
                let data = msg.into_data();
                match serde_json::from_slice::<Message<T>>(&data) {
                    Ok(msg) => Poll::Ready(Some(Ok(msg))),
                    Err(err) => {
                        tracing::error!(error = %err, "failed to decode inbound frame");
                        Poll::Ready(Some(Err(err.into())))
                    }
                }
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(CdpError::Ws(err)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
