use crate::cdp::browser_protocol::browser::BrowserContextId;

/// An isolated browser context (akin to an incognito profile): pages opened
/// within it share no cookies/cache/storage with the default context or
/// with other browser contexts. Tracked by the `Handler` purely so future
/// bookkeeping (e.g. per-context target enumeration) has somewhere to live;
/// disposal is driven by whichever `Context` created it
/// (`Context::browser_context_owner`).
#[derive(Debug)]
pub struct BrowserContext {
    id: BrowserContextId,
}

impl BrowserContext {
    pub fn new(id: BrowserContextId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &BrowserContextId {
        &self.id
    }
}
