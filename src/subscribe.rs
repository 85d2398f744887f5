use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::mpsc::{Sender, UnboundedReceiver};
use futures::Stream;

use crate::cdp::browser_protocol::target::TargetId;
use crate::cdp::events::CdpEventMessage;
use crate::handler::listener::ListenerId;
use crate::handler::HandlerMessage;

/// A live subscription to a page's raw CDP event stream, as obtained from
/// [`crate::page::Page::subscribe_events`].
///
/// Scope-bound: dropping it unregisters the listener by the next broadcast
/// attempt, so a cancelled `Context`/`Action` never keeps a dangling
/// subscription alive.
pub struct EventStream {
    id: ListenerId,
    target_id: TargetId,
    receiver: UnboundedReceiver<Arc<CdpEventMessage>>,
    sender: Sender<HandlerMessage>,
}

impl EventStream {
    pub(crate) fn new(
        id: ListenerId,
        receiver: UnboundedReceiver<Arc<CdpEventMessage>>,
        target_id: TargetId,
        sender: Sender<HandlerMessage>,
    ) -> Self {
        Self {
            id,
            target_id,
            receiver,
            sender,
        }
    }
}

impl Stream for EventStream {
    type Item = Arc<CdpEventMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        let _ = self
            .sender
            .try_send(HandlerMessage::Unsubscribe(self.target_id.clone(), self.id));
    }
}
