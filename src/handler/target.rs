use std::borrow::Cow;
use std::time::Instant;

use futures::channel::oneshot::Sender;
use futures::task::Poll;

use cdpdrive_types::Response;

use crate::cdp::browser_protocol::browser::BrowserContextId;
use crate::cdp::browser_protocol::page::{FrameId, GetFrameTreeReturns};
use crate::cdp::browser_protocol::target::{SessionId, TargetId, TargetInfo};
use crate::cdp::events::{CdpEvent, CdpEventMessage};
use crate::error::Result;
use crate::handler::cmd::CommandChain;
use crate::handler::emulation::EmulationManager;
use crate::handler::execution::ExecutionContext;
use crate::handler::frame::FrameManager;
use crate::handler::listener::{ListenerId, ListenerStore};
use crate::handler::network::NetworkManager;
use crate::handler::node::{Invalidated, NodeStore};
use crate::handler::viewport::Viewport;
use crate::page::Page;
use futures::channel::mpsc::UnboundedReceiver;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-target state: the protocol session attached to one `TargetId`, its
/// frame tree, DOM node cache and listener registry.
///
/// Owned exclusively by the `Handler`'s single poll loop — there is never a
/// second writer, so a `Page`/`Element` reading through its channel always
/// observes a state that was consistent at some point on the event stream,
/// never a half-applied update.
#[derive(Debug)]
pub struct Target {
    info: TargetInfo,
    is_closed: bool,
    frame_manager: FrameManager,
    network_manager: NetworkManager,
    emulation_manager: EmulationManager,
    viewport: Viewport,
    nodes: NodeStore,
    listeners: ListenerStore,
    /// frameID -> the frame's default execution context, per §4.4's
    /// `executionContextCreated`/`Destroyed`/`Cleared` handling.
    exec_contexts: HashMap<FrameId, ExecutionContext>,
    session_id: Option<SessionId>,
    state: TargetState,
    /// The sender that created this target via `Target.createTarget`,
    /// resolved once initialization reaches `Ready`.
    initiator: Option<Sender<Result<Page>>>,
    /// A `DOM.getDocument` round-trip queued by `documentUpdated`, drained by
    /// `Handler`'s poll loop the same way `poll_init`'s commands are.
    pending_document_fetch: Option<(Cow<'static, str>, serde_json::Value)>,
}

impl Target {
    /// Create a new target instance from `TargetInfo`, choosing the
    /// initialization sequence appropriate for its type: the full
    /// frame/network/emulation sequence for page-like targets, or a reduced
    /// `Log`+`Runtime`-only sequence for workers (which have no frame tree
    /// or viewport to speak of).
    pub fn new(info: TargetInfo) -> Self {
        let state = if Self::is_page_type(&info.r#type) {
            TargetState::InitializingFrame(FrameManager::init_commands())
        } else {
            TargetState::InitializingWorker(Self::worker_init_commands())
        };
        Self {
            info,
            is_closed: false,
            frame_manager: Default::default(),
            network_manager: Default::default(),
            emulation_manager: Default::default(),
            viewport: Default::default(),
            nodes: Default::default(),
            listeners: Default::default(),
            exec_contexts: Default::default(),
            session_id: None,
            state,
            initiator: None,
            pending_document_fetch: None,
        }
    }

    fn is_page_type(ty: &str) -> bool {
        matches!(ty, "page" | "background_page")
    }

    pub fn is_page(&self) -> bool {
        Self::is_page_type(&self.info.r#type)
    }

    pub fn is_worker(&self) -> bool {
        !self.is_page()
    }

    fn worker_init_commands() -> CommandChain {
        use crate::cdp::browser_protocol::log;
        use crate::cdp::js_protocol::runtime;
        use cdpdrive_types::Method;

        let enable_log = log::EnableParams::default();
        let enable_runtime = runtime::EnableParams::default();
        CommandChain::new(vec![
            (
                enable_log.identifier(),
                serde_json::to_value(enable_log).unwrap(),
            ),
            (
                enable_runtime.identifier(),
                serde_json::to_value(enable_runtime).unwrap(),
            ),
        ])
    }

    pub fn set_session_id(&mut self, id: SessionId) {
        self.session_id = Some(id)
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn take_session_id(&mut self) -> Option<SessionId> {
        self.session_id.take()
    }

    pub fn target_id(&self) -> &TargetId {
        &self.info.target_id
    }

    pub fn browser_context_id(&self) -> Option<&BrowserContextId> {
        self.info.browser_context_id.as_ref()
    }

    pub fn info(&self) -> &TargetInfo {
        &self.info
    }

    pub fn opener(&self) -> Option<&TargetId> {
        self.info.opener_id.as_ref()
    }

    pub fn frame_manager(&self) -> &FrameManager {
        &self.frame_manager
    }

    pub fn frame_manager_mut(&mut self) -> &mut FrameManager {
        &mut self.frame_manager
    }

    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeStore {
        &mut self.nodes
    }

    pub fn nodes_invalidated(&self) -> Invalidated {
        self.nodes.invalidated()
    }

    /// Takes the pending `DOM.getDocument` request queued by `on_event`'s
    /// `documentUpdated` handling, if any, for `Handler` to submit.
    pub fn take_document_fetch_request(&mut self) -> Option<(Cow<'static, str>, serde_json::Value)> {
        self.pending_document_fetch.take()
    }

    /// Response to the `DOM.getDocument` `Handler` submitted on our behalf;
    /// walks the returned tree into the node cache.
    pub fn on_document_fetched(&mut self, root: crate::cdp::browser_protocol::dom::Node) {
        self.nodes.populate_from_root(root);
    }

    fn queue_document_fetch(&mut self) {
        use crate::cdp::browser_protocol::dom::GetDocumentParams;
        use cdpdrive_types::Method;

        let cmd = match GetDocumentParams::builder().depth(-1).pierce(true).build() {
            Ok(cmd) => cmd,
            Err(err) => {
                tracing::warn!(target_id = %self.info.target_id, %err, "failed to build DOM.getDocument");
                return;
            }
        };
        match serde_json::to_value(&cmd) {
            Ok(params) => self.pending_document_fetch = Some((cmd.identifier(), params)),
            Err(err) => {
                tracing::warn!(target_id = %self.info.target_id, %err, "failed to serialize DOM.getDocument")
            }
        }
    }

    /// The default execution context for `frame_id`, if one has been
    /// observed via `Runtime.executionContextCreated`.
    pub fn execution_context(&self, frame_id: &FrameId) -> Option<&ExecutionContext> {
        self.exec_contexts.get(frame_id)
    }

    pub fn subscribe(&mut self) -> (ListenerId, UnboundedReceiver<Arc<CdpEventMessage>>) {
        self.listeners.register()
    }

    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.cancel(id)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, TargetState::Ready)
    }

    pub fn set_initiator(&mut self, tx: Sender<Result<Page>>) {
        self.initiator = Some(tx)
    }

    pub fn take_initiator(&mut self) -> Option<Sender<Result<Page>>> {
        self.initiator.take()
    }

    pub fn close(&mut self) {
        self.is_closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// Advances target initialization, returning the next command to submit
    /// (over this target's session) or `Poll::Pending` if we're waiting on a
    /// response, or `Poll::Ready(None)` once `Ready`.
    pub fn poll_init(
        &mut self,
        now: Instant,
    ) -> Poll<Option<(Cow<'static, str>, serde_json::Value)>> {
        loop {
            let chain = match &mut self.state {
                TargetState::InitializingFrame(c)
                | TargetState::InitializingNetwork(c)
                | TargetState::InitializingEmulation(c)
                | TargetState::InitializingWorker(c) => c,
                TargetState::Ready => return Poll::Ready(None),
            };
            match chain.poll(now) {
                Poll::Ready(Some(Ok(cmd))) => return Poll::Ready(Some(cmd)),
                Poll::Ready(Some(Err(err))) => {
                    tracing::warn!(target_id = %self.info.target_id, error = %err, "target init step timed out");
                    self.advance_init_state();
                }
                Poll::Ready(None) => self.advance_init_state(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn advance_init_state(&mut self) {
        self.state = match std::mem::replace(&mut self.state, TargetState::Ready) {
            TargetState::InitializingFrame(_) => {
                TargetState::InitializingNetwork(self.network_manager.init_commands())
            }
            TargetState::InitializingNetwork(_) => TargetState::InitializingEmulation(
                self.emulation_manager.init_commands(&self.viewport),
            ),
            TargetState::InitializingEmulation(_) | TargetState::InitializingWorker(_) => {
                TargetState::Ready
            }
            TargetState::Ready => TargetState::Ready,
        };
    }

    /// Received a response to a command this target's init sequence issued.
    pub fn on_init_response(&mut self, resp: Response) {
        let method = match &self.state {
            TargetState::InitializingFrame(c)
            | TargetState::InitializingNetwork(c)
            | TargetState::InitializingEmulation(c)
            | TargetState::InitializingWorker(c) => c.waiting_method().map(|m| m.to_string()),
            TargetState::Ready => None,
        };
        let Some(method) = method else { return };

        if method == "Page.getFrameTree" {
            if let Some(result) = resp.result.clone() {
                if let Ok(parsed) = serde_json::from_value::<GetFrameTreeReturns>(result) {
                    self.frame_manager.set_main_frame_tree(parsed.frame_tree);
                }
            }
        }

        match &mut self.state {
            TargetState::InitializingFrame(c)
            | TargetState::InitializingNetwork(c)
            | TargetState::InitializingEmulation(c)
            | TargetState::InitializingWorker(c) => {
                c.received_response(&method);
            }
            TargetState::Ready => {}
        }
    }

    /// Applies an event targeting this session to the cached frame/DOM
    /// state, then broadcasts it to every registered listener regardless of
    /// whether it was recognized (listeners may be interested in any event).
    pub fn on_event(&mut self, event: CdpEventMessage) {
        let event = Arc::new(event);
        self.listeners.broadcast(&event);
        match &event.params {
            CdpEvent::PageFrameAttached(ev) => self.frame_manager.on_frame_attached(ev),
            CdpEvent::PageFrameNavigated(ev) => self.frame_manager.on_frame_navigated(ev),
            CdpEvent::PageFrameDetached(ev) => self.frame_manager.on_frame_detached(ev),
            CdpEvent::PageNavigatedWithinDocument(ev) => {
                self.frame_manager.on_frame_navigated_within_document(ev)
            }
            CdpEvent::PageFrameStoppedLoading(ev) => {
                self.frame_manager.on_frame_stopped_loading(ev)
            }
            CdpEvent::PageLifecycleEvent(ev) => self.frame_manager.on_page_lifecycle_event(ev),
            CdpEvent::DomDocumentUpdated(_) => {
                self.nodes.on_document_updated();
                self.queue_document_fetch();
            }
            CdpEvent::DomSetChildNodes(ev) => {
                self.nodes.set_children(ev.parent_id, ev.nodes.clone());
            }
            CdpEvent::DomChildNodeInserted(ev) => {
                self.nodes
                    .insert_child(ev.parent_node_id, ev.previous_node_id, ev.node.clone());
            }
            CdpEvent::DomChildNodeRemoved(ev) => {
                self.nodes.remove_child(ev.parent_node_id, ev.node_id);
            }
            CdpEvent::DomShadowRootPushed(ev) => {
                self.nodes.push_shadow_root(ev.host_id, ev.root.clone());
            }
            CdpEvent::DomShadowRootPopped(ev) => {
                self.nodes.pop_shadow_root(ev.host_id, ev.root_id);
            }
            CdpEvent::DomPseudoElementAdded(ev) => {
                self.nodes
                    .add_pseudo_element(ev.parent_id, ev.pseudo_element.clone());
            }
            CdpEvent::DomPseudoElementRemoved(ev) => {
                self.nodes
                    .remove_pseudo_element(ev.parent_id, ev.pseudo_element_id);
            }
            CdpEvent::DomDistributedNodesUpdated(ev) => {
                let backend_ids = ev
                    .distributed_nodes
                    .iter()
                    .map(|n| n.backend_node_id)
                    .collect();
                self.nodes
                    .set_distributed_nodes(ev.insertion_point_id, backend_ids);
            }
            CdpEvent::DomAttributeModified(ev) => {
                self.nodes
                    .set_attribute(ev.node_id, ev.name.clone(), ev.value.clone());
            }
            CdpEvent::DomAttributeRemoved(ev) => {
                self.nodes.remove_attribute(ev.node_id, &ev.name);
            }
            CdpEvent::DomCharacterDataModified(ev) => {
                self.nodes
                    .set_character_data(ev.node_id, ev.character_data.clone());
            }
            CdpEvent::DomChildNodeCountUpdated(ev) => {
                self.nodes
                    .set_child_node_count(ev.node_id, ev.child_node_count);
            }
            CdpEvent::DomInlineStyleInvalidated(ev) => {
                self.nodes.mark_style_invalidated(&ev.node_ids);
            }
            CdpEvent::RuntimeExecutionContextCreated(ev) => {
                let frame_id = ev
                    .context
                    .aux_data
                    .as_ref()
                    .and_then(|data| data.get("frameId"))
                    .and_then(|v| v.as_str());
                if let Some(frame_id) = frame_id {
                    self.exec_contexts.insert(
                        FrameId::from(frame_id.to_string()),
                        ExecutionContext::new(ev.context.id.clone()),
                    );
                }
            }
            CdpEvent::RuntimeExecutionContextDestroyed(ev) => {
                self.exec_contexts
                    .retain(|_, ctx| ctx.context_id() != &ev.execution_context_id);
            }
            CdpEvent::RuntimeExecutionContextsCleared(_) => {
                self.exec_contexts.clear();
            }
            _ => {}
        }
    }
}

#[derive(Debug)]
pub enum TargetState {
    InitializingFrame(CommandChain),
    InitializingNetwork(CommandChain),
    InitializingEmulation(CommandChain),
    InitializingWorker(CommandChain),
    Ready,
}
