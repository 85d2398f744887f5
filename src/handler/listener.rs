use std::sync::Arc;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

use cdpdrive_cdp::cdp::events::CdpEventMessage;

/// Handle to a registered subscription. Cancelling it (dropping the
/// `UnboundedReceiver` returned alongside it) is enough: the next broadcast
/// attempt notices the closed channel and drops the entry, so nothing needs
/// to be done eagerly here beyond giving the scope something to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Per-target (or per-browser) registry of event listeners.
///
/// A listener is scope-bound: a `Context`/`Page` action registers one while
/// it runs and lets it drop when the scope ends. Broadcasting is a single
/// pass that evicts listeners whose receiver has gone, so a cancelled scope
/// never keeps its slot alive past the next event.
#[derive(Debug, Default)]
pub struct ListenerStore {
    next_id: u64,
    listeners: Vec<(u64, UnboundedSender<Arc<CdpEventMessage>>)>,
}

impl ListenerStore {
    pub fn register(&mut self) -> (ListenerId, UnboundedReceiver<Arc<CdpEventMessage>>) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let (tx, rx) = unbounded();
        self.listeners.push((id, tx));
        (ListenerId(id), rx)
    }

    pub fn cancel(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id.0);
    }

    pub fn broadcast(&mut self, event: &Arc<CdpEventMessage>) {
        self.listeners
            .retain(|(_, tx)| tx.unbounded_send(event.clone()).is_ok());
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_distinct_ids() {
        let mut store = ListenerStore::default();
        let (a, _rx_a) = store.register();
        let (b, _rx_b) = store.register();
        assert_ne!(a, b);
        assert!(!store.is_empty());
    }

    #[test]
    fn cancel_removes_only_that_listener() {
        let mut store = ListenerStore::default();
        let (a, _rx_a) = store.register();
        let (_b, _rx_b) = store.register();
        store.cancel(a);
        assert_eq!(store.listeners.len(), 1);
    }

    #[test]
    fn cancel_of_last_listener_empties_the_store() {
        let mut store = ListenerStore::default();
        let (a, _rx_a) = store.register();
        store.cancel(a);
        assert!(store.is_empty());
    }
}
