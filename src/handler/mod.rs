use std::borrow::Cow;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use futures::channel::mpsc::{Receiver, Sender};
use futures::channel::oneshot::Sender as OneshotSender;
use futures::stream::{Fuse, Stream};
use futures::task::{Context, Poll};
use futures::{SinkExt, StreamExt};

use cdpdrive_types::{
    CallId, Command, CommandResponse, Event, Message, Method, MethodId, Response,
};

use crate::cdp::browser_protocol::browser::BrowserContextId;
use crate::cdp::browser_protocol::dom::GetDocumentParams;
use crate::cdp::browser_protocol::target::{
    AttachToTargetParams, CreateTargetParams, EventAttachedToTarget, EventDetachedFromTarget,
    EventTargetCreated, EventTargetDestroyed, SessionId, SetDiscoverTargetsParams, TargetId,
};
use crate::cdp::events::{CdpEvent, CdpEventMessage};
use crate::conn::Connection;
use crate::error::CdpError;
use crate::handler::browser::BrowserContext;
use crate::handler::job::PeriodicJob;
use crate::handler::listener::ListenerId;
use crate::handler::target::Target;
use crate::page::Page;

pub(crate) mod browser;
pub(crate) mod cmd;
pub(crate) mod emulation;
pub(crate) mod execution;
pub(crate) mod frame;
pub(crate) mod job;
pub(crate) mod listener;
pub(crate) mod network;
pub(crate) mod node;
pub(crate) mod target;
pub(crate) mod viewport;

/// Standard timeout for a command awaiting a response, in ms.
pub const REQUEST_TIMEOUT: u64 = 30_000;

/// Owns a locally-spawned browser process: killed and its scratch
/// user-data-dir removed on drop. Only ever held by the `Handler` of a
/// `Browser` produced by `ExecAllocator` — a `RemoteAllocator`-produced
/// `Handler` never kills what it didn't spawn.
pub(crate) struct ExecGuard {
    child: crate::async_process::Child,
    user_data_dir: std::path::PathBuf,
}

impl ExecGuard {
    pub(crate) fn new(child: crate::async_process::Child, user_data_dir: std::path::PathBuf) -> Self {
        Self { child, user_data_dir }
    }
}

impl Drop for ExecGuard {
    fn drop(&mut self) {
        let _ = self.child.kill_sync();
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
    }
}

/// Background actor owning the single `Connection` to the browser. Spawned
/// once per `Browser`; `Browser`/`Page` handles only ever talk to it through
/// `HandlerMessage`s, never touching the socket directly.
pub struct Handler {
    pending_commands: FnvHashMap<CallId, (PendingRequest, Instant)>,
    from_browser: Fuse<Receiver<HandlerMessage>>,
    handler_tx: Sender<HandlerMessage>,
    contexts: HashMap<BrowserContextId, BrowserContext>,
    targets: HashMap<TargetId, Target>,
    sessions: HashMap<SessionId, TargetId>,
    /// Targets that have been requested via `Target.createTarget` but whose
    /// `Target.targetCreated` event hasn't arrived yet.
    pending_initiators: HashMap<TargetId, OneshotSender<Result<Page, CdpError>>>,
    /// Callers waiting on the first `page`-typed target to become ready, per
    /// `HandlerMessage::WaitForNextPage` (used by `Context::pick_initial_page`
    /// when no already-open tab is found).
    page_waiters: Vec<OneshotSender<Page>>,
    conn: Connection<CdpEventMessage>,
    evict_command_timeout: PeriodicJob,
    /// `true` once a graceful `Browser.close` was requested: the connection
    /// ending afterwards is expected, not an error.
    closing_gracefully: bool,
    /// `Some` iff this browser was spawned by an `ExecAllocator`.
    exec_guard: Option<ExecGuard>,
}

impl Handler {
    pub(crate) fn new(
        mut conn: Connection<CdpEventMessage>,
        rx: Receiver<HandlerMessage>,
        handler_tx: Sender<HandlerMessage>,
        exec_guard: Option<ExecGuard>,
    ) -> Self {
        let discover = SetDiscoverTargetsParams::new(true);
        let _ = conn.submit_command(
            discover.identifier(),
            None,
            serde_json::to_value(discover).unwrap(),
        );

        Self {
            pending_commands: Default::default(),
            from_browser: rx.fuse(),
            handler_tx,
            contexts: Default::default(),
            targets: Default::default(),
            sessions: Default::default(),
            pending_initiators: Default::default(),
            page_waiters: Default::default(),
            conn,
            evict_command_timeout: Default::default(),
            closing_gracefully: false,
            exec_guard,
        }
    }

    fn on_response(&mut self, resp: Response) {
        let Some((req, _)) = self.pending_commands.remove(&resp.id) else {
            return;
        };
        match req {
            PendingRequest::CreateTarget(tx) => {
                match to_command_response::<CreateTargetParams>(resp, "Target.createTarget".into())
                {
                    Ok(resp) => {
                        let target_id = resp.result.target_id.clone();
                        if let Some(target) = self.targets.get_mut(&target_id) {
                            target.set_initiator(tx);
                            self.maybe_resolve_initiator(&target_id);
                        } else {
                            self.pending_initiators.insert(target_id, tx);
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err));
                    }
                }
            }
            PendingRequest::Attach(target_id) => {
                match to_command_response::<AttachToTargetParams>(
                    resp,
                    "Target.attachToTarget".into(),
                ) {
                    Ok(resp) => {
                        let session_id = resp.result.session_id.clone();
                        if let Some(target) = self.targets.get_mut(&target_id) {
                            target.set_session_id(session_id.clone());
                        }
                        self.sessions.insert(session_id, target_id);
                    }
                    Err(err) => {
                        tracing::warn!(%target_id, %err, "failed to attach to target");
                    }
                }
            }
            PendingRequest::ExternalCommand(tx) => {
                let _ = tx.send(Ok(resp));
            }
            PendingRequest::Init(target_id) => {
                if let Some(target) = self.targets.get_mut(&target_id) {
                    target.on_init_response(resp);
                }
                self.maybe_resolve_initiator(&target_id);
            }
            PendingRequest::DocumentFetch(target_id) => {
                match to_command_response::<GetDocumentParams>(resp, "DOM.getDocument".into()) {
                    Ok(resp) => {
                        if let Some(target) = self.targets.get_mut(&target_id) {
                            target.on_document_fetched(resp.result.root);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%target_id, %err, "DOM.getDocument failed");
                    }
                }
            }
        }
    }

    fn maybe_resolve_initiator(&mut self, target_id: &TargetId) {
        let Some(target) = self.targets.get_mut(target_id) else {
            return;
        };
        if !target.is_ready() {
            return;
        }
        let Some(session_id) = target.session_id().cloned() else {
            return;
        };
        if let Some(tx) = target.take_initiator() {
            let page = Page::from_parts(target_id.clone(), session_id, self.handler_tx.clone());
            let _ = tx.send(Ok(page));
        }
    }

    pub(crate) fn submit_command(&mut self, msg: CommandMessage) -> Result<(), CdpError> {
        let call_id = self
            .conn
            .submit_command(msg.method, msg.session_id, msg.params)?;
        self.pending_commands.insert(
            call_id,
            (PendingRequest::ExternalCommand(msg.sender), Instant::now()),
        );
        Ok(())
    }

    fn create_page(
        &mut self,
        params: CreateTargetParams,
        tx: OneshotSender<Result<Page, CdpError>>,
    ) {
        let method = params.identifier();
        match serde_json::to_value(&params) {
            Ok(params) => match self.conn.submit_command(method, None, params) {
                Ok(call_id) => {
                    self.pending_commands
                        .insert(call_id, (PendingRequest::CreateTarget(tx), Instant::now()));
                }
                Err(err) => {
                    let _ = tx.send(Err(err.into()));
                }
            },
            Err(err) => {
                let _ = tx.send(Err(err.into()));
            }
        }
    }

    /// Resolves `tx` with the first `page`-typed target that is currently
    /// ready, or queues it to be resolved by the next one to become ready.
    fn wait_for_next_page(&mut self, tx: OneshotSender<Page>) {
        if let Some(page) = self.pages().into_iter().next() {
            let _ = tx.send(page);
            return;
        }
        self.page_waiters.push(tx);
    }

    fn pages(&self) -> Vec<Page> {
        self.targets
            .values()
            .filter(|t| t.is_page() && t.is_ready())
            .filter_map(|t| {
                let session_id = t.session_id()?.clone();
                Some(Page::from_parts(
                    t.target_id().clone(),
                    session_id,
                    self.handler_tx.clone(),
                ))
            })
            .collect()
    }

    fn on_event(&mut self, event: CdpEventMessage) {
        if let Some(session_id) = event.session_id.clone().map(SessionId::from) {
            if let Some(target_id) = self.sessions.get(&session_id) {
                if let Some(target) = self.targets.get_mut(target_id) {
                    target.on_event(event);
                    return;
                }
            }
        }
        match &event.params {
            CdpEvent::TargetTargetCreated(ev) => self.on_target_created(ev.clone()),
            CdpEvent::TargetAttachedToTarget(ev) => self.on_attached_to_target(ev),
            CdpEvent::TargetDetachedFromTarget(ev) => self.on_detached_from_target(ev),
            CdpEvent::TargetTargetDestroyed(ev) => self.on_target_destroyed(ev),
            _ => {}
        }
    }

    fn on_target_created(&mut self, event: EventTargetCreated) {
        let target_id = event.target_info.target_id.clone();
        if self.targets.contains_key(&target_id) {
            return;
        }
        let target = Target::new(event.target_info);
        self.targets.insert(target_id.clone(), target);

        if let Some(tx) = self.pending_initiators.remove(&target_id) {
            self.targets.get_mut(&target_id).unwrap().set_initiator(tx);
        }

        let attach = match AttachToTargetParams::builder()
            .target_id(target_id.clone())
            .flatten(true)
            .build()
        {
            Ok(attach) => attach,
            Err(err) => {
                tracing::warn!(%err, "failed to build attachToTarget");
                return;
            }
        };
        match serde_json::to_value(&attach) {
            Ok(params) => match self.conn.submit_command(attach.identifier(), None, params) {
                Ok(call_id) => {
                    self.pending_commands.insert(
                        call_id,
                        (PendingRequest::Attach(target_id), Instant::now()),
                    );
                }
                Err(err) => tracing::warn!(%err, "failed to submit attachToTarget"),
            },
            Err(err) => tracing::warn!(%err, "failed to serialize attachToTarget"),
        }
    }

    /// Covers targets (typically workers) that get auto-attached by Chrome
    /// itself without us having issued `Target.attachToTarget`.
    fn on_attached_to_target(&mut self, event: &EventAttachedToTarget) {
        let target_id = event.target_info.target_id.clone();
        if !self.targets.contains_key(&target_id) {
            self.targets
                .insert(target_id.clone(), Target::new(event.target_info.clone()));
        }
        if let Some(target) = self.targets.get_mut(&target_id) {
            target.set_session_id(event.session_id.clone());
        }
        self.sessions.insert(event.session_id.clone(), target_id);
    }

    /// A session can be detached multiple times if multiple sessions were
    /// attached to the same target.
    fn on_detached_from_target(&mut self, event: &EventDetachedFromTarget) {
        if let Some(target_id) = self.sessions.remove(&event.session_id) {
            if let Some(target) = self.targets.get_mut(&target_id) {
                target.take_session_id();
            }
        }
    }

    fn on_target_destroyed(&mut self, event: &EventTargetDestroyed) {
        if let Some(mut target) = self.targets.remove(&event.target_id) {
            target.close();
            if let Some(session_id) = target.take_session_id() {
                self.sessions.remove(&session_id);
            }
        }
    }

    fn evict_stale_commands(&mut self) {
        let deadline = Duration::from_millis(REQUEST_TIMEOUT);
        let now = Instant::now();
        let stale: Vec<CallId> = self
            .pending_commands
            .iter()
            .filter(|(_, (_, issued))| now.duration_since(*issued) > deadline)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some((req, _)) = self.pending_commands.remove(&id) {
                match req {
                    PendingRequest::ExternalCommand(tx) => {
                        let _ = tx.send(Err(CdpError::NoResponse));
                    }
                    PendingRequest::CreateTarget(tx) => {
                        let _ = tx.send(Err(CdpError::NoResponse));
                    }
                    PendingRequest::Attach(target_id) => {
                        tracing::warn!(%target_id, "attachToTarget timed out");
                    }
                    PendingRequest::Init(target_id) => {
                        tracing::warn!(%target_id, "target init command timed out");
                    }
                    PendingRequest::DocumentFetch(target_id) => {
                        tracing::warn!(%target_id, "DOM.getDocument timed out");
                    }
                }
            }
        }
    }

    /// Drops pending-command slots whose caller has already gone away (the
    /// `execute` future awaiting the response was cancelled/dropped), so a
    /// cancelled call frees its slot immediately instead of waiting out the
    /// 30s `evict_stale_commands` sweep. Mirrors `ListenerStore::broadcast`'s
    /// retain-if-still-connected idiom, just checked proactively instead of
    /// on the next send.
    fn evict_canceled_commands(&mut self) {
        self.pending_commands.retain(|_, (req, _)| match req {
            PendingRequest::ExternalCommand(tx) => !tx.is_canceled(),
            PendingRequest::CreateTarget(tx) => !tx.is_canceled(),
            _ => true,
        });
    }

    fn fail_all_pending(&mut self) {
        for (_, (req, _)) in self.pending_commands.drain() {
            match req {
                PendingRequest::ExternalCommand(tx) => {
                    let _ = tx.send(Err(CdpError::BrowserClosed));
                }
                PendingRequest::CreateTarget(tx) => {
                    let _ = tx.send(Err(CdpError::BrowserClosed));
                }
                _ => {}
            }
        }
    }
}

impl Stream for Handler {
    type Item = Result<CdpEventMessage, CdpError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();

        while let Poll::Ready(Some(msg)) = Pin::new(&mut pin.from_browser).poll_next(cx) {
            match msg {
                HandlerMessage::Command(cmd) => {
                    if let Err(err) = pin.submit_command(cmd) {
                        tracing::warn!(%err, "failed to submit command");
                    }
                }
                HandlerMessage::CreatePage(params, tx) => pin.create_page(params, tx),
                HandlerMessage::GetPages(tx) => {
                    let _ = tx.send(pin.pages());
                }
                HandlerMessage::WaitForNextPage(tx) => pin.wait_for_next_page(tx),
                HandlerMessage::Subscribe(target_id, tx) => {
                    let reg = pin
                        .targets
                        .get_mut(&target_id)
                        .map(|t| t.subscribe());
                    let _ = tx.send(reg);
                }
                HandlerMessage::Unsubscribe(target_id, id) => {
                    if let Some(target) = pin.targets.get_mut(&target_id) {
                        target.unsubscribe(id);
                    }
                }
                HandlerMessage::Close(tx) => {
                    pin.closing_gracefully = true;
                    let _ = tx.send(());
                }
            }
        }

        pin.evict_canceled_commands();

        let target_ids: Vec<TargetId> = pin.targets.keys().cloned().collect();
        for target_id in target_ids {
            let Some(target) = pin.targets.get_mut(&target_id) else {
                continue;
            };
            let Some(session_id) = target.session_id().cloned() else {
                continue;
            };
            if let Poll::Ready(Some((method, params))) = target.poll_init(Instant::now()) {
                match pin.conn.submit_command(method, Some(session_id.clone()), params) {
                    Ok(call_id) => {
                        pin.pending_commands.insert(
                            call_id,
                            (PendingRequest::Init(target_id.clone()), Instant::now()),
                        );
                    }
                    Err(err) => tracing::warn!(%err, "failed to submit target init command"),
                }
            }
            if let Some((method, params)) = target.take_document_fetch_request() {
                match pin.conn.submit_command(method, Some(session_id), params) {
                    Ok(call_id) => {
                        pin.pending_commands.insert(
                            call_id,
                            (PendingRequest::DocumentFetch(target_id.clone()), Instant::now()),
                        );
                    }
                    Err(err) => tracing::warn!(%err, "failed to submit DOM.getDocument"),
                }
            }
            pin.maybe_resolve_initiator(&target_id);

            if !pin.page_waiters.is_empty() {
                if let Some(target) = pin.targets.get(&target_id) {
                    if target.is_page() && target.is_ready() {
                        if let Some(session_id) = target.session_id().cloned() {
                            let page = Page::from_parts(
                                target_id.clone(),
                                session_id,
                                pin.handler_tx.clone(),
                            );
                            for tx in pin.page_waiters.drain(..) {
                                let _ = tx.send(page.clone());
                            }
                        }
                    }
                }
            }
        }

        if pin.evict_command_timeout.is_ready(cx) {
            pin.evict_stale_commands();
        }

        while let Poll::Ready(Some(ev)) = Pin::new(&mut pin.conn).poll_next(cx) {
            match ev {
                Ok(Message::Response(resp)) => pin.on_response(resp),
                Ok(Message::Event(ev)) => pin.on_event(ev),
                Err(err) => {
                    if !pin.closing_gracefully {
                        pin.fail_all_pending();
                        return Poll::Ready(Some(Err(err)));
                    }
                    return Poll::Ready(None);
                }
            }
        }

        Poll::Pending
    }
}

/// Messages `Browser`/`Page` handles send to the background `Handler`.
pub(crate) enum HandlerMessage {
    Command(CommandMessage),
    CreatePage(CreateTargetParams, OneshotSender<Result<Page, CdpError>>),
    GetPages(OneshotSender<Vec<Page>>),
    WaitForNextPage(OneshotSender<Page>),
    Subscribe(
        TargetId,
        OneshotSender<Option<(ListenerId, futures::channel::mpsc::UnboundedReceiver<Arc<CdpEventMessage>>)>>,
    ),
    Unsubscribe(TargetId, ListenerId),
    Close(OneshotSender<()>),
}

#[derive(Debug)]
enum PendingRequest {
    CreateTarget(OneshotSender<Result<Page, CdpError>>),
    Attach(TargetId),
    ExternalCommand(OneshotSender<Result<Response, CdpError>>),
    Init(TargetId),
    DocumentFetch(TargetId),
}

/// A queued command plus the channel its response (or a client-side error)
/// is delivered on.
pub(crate) struct CommandMessage {
    pub method: Cow<'static, str>,
    pub session_id: Option<SessionId>,
    pub params: serde_json::Value,
    pub sender: OneshotSender<Result<Response, CdpError>>,
}

impl CommandMessage {
    pub fn new<C: Command>(
        cmd: C,
        sender: OneshotSender<Result<Response, CdpError>>,
    ) -> serde_json::Result<Self> {
        Self::with_session(cmd, sender, None)
    }

    pub fn with_session<C: Command>(
        cmd: C,
        sender: OneshotSender<Result<Response, CdpError>>,
        session_id: Option<SessionId>,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            method: cmd.identifier(),
            session_id,
            params: serde_json::to_value(cmd)?,
            sender,
        })
    }
}

pub(crate) fn to_command_response<T: Command>(
    resp: Response,
    method: MethodId,
) -> Result<CommandResponse<T::Response>, CdpError> {
    if let Some(res) = resp.result {
        let result = serde_json::from_value(res)?;
        Ok(CommandResponse {
            id: resp.id,
            result,
            method,
        })
    } else if let Some(err) = resp.error {
        Err(err.into())
    } else {
        Err(CdpError::NoResponse)
    }
}

/// Sends a command to the `Handler` over `sender` and awaits its response.
/// Shared by `Browser::execute` (no session) and `Page::execute`
/// (session-scoped).
pub(crate) async fn execute<T: Command>(
    cmd: T,
    mut sender: Sender<HandlerMessage>,
    session_id: Option<SessionId>,
) -> Result<CommandResponse<T::Response>, CdpError> {
    let (tx, rx) = futures::channel::oneshot::channel();
    let method = cmd.identifier();
    let msg = CommandMessage::with_session(cmd, tx, session_id)?;

    sender.send(HandlerMessage::Command(msg)).await?;
    let resp = rx.await??;
    to_command_response::<T>(resp, method)
}
