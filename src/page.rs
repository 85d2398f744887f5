use std::path::Path;

use base64::Engine;
use futures::channel::mpsc::Sender;
use futures::SinkExt;

use cdpdrive_types::{Command, CommandResponse};

use crate::cdp::browser_protocol;
use crate::cdp::browser_protocol::dom::{
    DescribeNodeParams, GetAttributesParams, GetBoxModelParams, GetDocumentParams,
    GetSearchResultsParams, Node, NodeId, PerformSearchParams, QuerySelectorAllParams,
    QuerySelectorParams,
};
use crate::cdp::browser_protocol::network::{Cookie, GetCookiesParams, SetUserAgentOverrideParams};
use crate::cdp::browser_protocol::page::{FrameId, NavigateParams, PrintToPdfParams};
use crate::cdp::browser_protocol::target::{
    ActivateTargetParams, CloseTargetParams, SessionId, TargetId,
};
use crate::cdp::js_protocol;
use crate::cdp::js_protocol::debugger::GetScriptSourceParams;
use crate::cdp::js_protocol::runtime::{EvaluateParams, ScriptId};
use crate::js::EvaluationResult;
use crate::element::Element;
use crate::error::{CdpError, Result};
use crate::handler::listener::ListenerId;
use crate::handler::{execute, HandlerMessage};
use crate::subscribe::EventStream;

/// A handle to a single attached page/tab. Cheap to clone: every clone
/// shares the same session and talks to the same background `Handler`.
#[derive(Debug, Clone)]
pub struct Page {
    target_id: TargetId,
    session_id: SessionId,
    sender: Sender<HandlerMessage>,
}

impl Page {
    pub(crate) fn from_parts(
        target_id: TargetId,
        session_id: SessionId,
        sender: Sender<HandlerMessage>,
    ) -> Self {
        Self {
            target_id,
            session_id,
            sender,
        }
    }

    /// Sends a command over this page's session and awaits its response.
    pub async fn execute<T: Command>(&self, cmd: T) -> Result<CommandResponse<T::Response>> {
        execute(cmd, self.sender.clone(), Some(self.session_id.clone())).await
    }

    async fn execute_browser_scoped<T: Command>(
        &self,
        cmd: T,
    ) -> Result<CommandResponse<T::Response>> {
        execute(cmd, self.sender.clone(), None).await
    }

    /// Navigate directly to the given URL.
    pub async fn goto(&self, params: impl Into<NavigateParams>) -> Result<FrameId> {
        let res = self.execute(params.into()).await?;
        if let Some(err) = res.result.error_text {
            return Err(CdpError::ChromeMessage(err));
        }
        Ok(res.result.frame_id)
    }

    /// The identifier of the `Target` this page belongs to.
    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    /// The identifier of the session this page is attached through.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns the current url of the page.
    pub async fn current_url(&self) -> Result<String> {
        let root = self.get_document().await?;
        Ok(root.base_url.unwrap_or_default())
    }

    /// Allows overriding user agent with the given string.
    pub async fn set_user_agent(&self, params: impl Into<SetUserAgentOverrideParams>) -> Result<&Self> {
        self.execute(params.into()).await?;
        Ok(self)
    }

    pub async fn get_document(&self) -> Result<Node> {
        let resp = self.execute(GetDocumentParams::default()).await?;
        Ok(resp.result.root)
    }

    /// Node id of the current document root, as used by selector
    /// resolution.
    pub(crate) async fn document_root(&self) -> Result<NodeId> {
        Ok(self.get_document().await?.node_id)
    }

    pub(crate) async fn query_selector_under(
        &self,
        selector: impl Into<String>,
        root: NodeId,
    ) -> Result<NodeId> {
        Ok(self
            .execute(QuerySelectorParams::new(root, selector))
            .await?
            .node_id)
    }

    pub(crate) async fn query_selector_all_under(
        &self,
        selector: impl Into<String>,
        root: NodeId,
    ) -> Result<Vec<NodeId>> {
        Ok(self
            .execute(QuerySelectorAllParams::new(root, selector))
            .await?
            .node_ids)
    }

    /// Resolves an XPath expression against the whole document via
    /// `DOM.performSearch`.
    pub(crate) async fn xpath_search(&self, expr: impl Into<String>) -> Result<Vec<NodeId>> {
        let perform = PerformSearchParams::builder()
            .query(expr.into())
            .build()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        let search = self.execute(perform).await?;
        if search.result_count == 0 {
            let _ = self
                .execute_browser_scoped_discard(&search.search_id)
                .await;
            return Ok(vec![]);
        }
        let get_results = GetSearchResultsParams::builder()
            .search_id(search.search_id.clone())
            .from_index(0)
            .to_index(search.result_count)
            .build()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        let results = self.execute(get_results).await?;
        let _ = self.execute_browser_scoped_discard(&search.search_id).await;
        Ok(results.node_ids)
    }

    async fn execute_browser_scoped_discard(&self, search_id: &str) -> Result<()> {
        use crate::cdp::browser_protocol::dom::DiscardSearchResultsParams;
        self.execute(DiscardSearchResultsParams::new(search_id.to_string()))
            .await?;
        Ok(())
    }

    /// The box model's width/height for `node_id`, used by visibility
    /// predicates. Fails with `InvalidBoxModel` if the node has none (e.g.
    /// `display: none`).
    pub(crate) async fn box_model(&self, node_id: NodeId) -> Result<(f64, f64)> {
        let cmd = GetBoxModelParams::builder()
            .node_id(node_id)
            .build()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        let resp = self.execute(cmd).await.map_err(|_| CdpError::InvalidBoxModel)?;
        let model = resp.result.model;
        Ok((model.width as f64, model.height as f64))
    }

    /// The value of `name` on `node_id`, if present.
    pub(crate) async fn node_attribute(
        &self,
        node_id: NodeId,
        name: &str,
    ) -> Result<Option<String>> {
        let cmd = GetAttributesParams::builder()
            .node_id(node_id)
            .build()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        let resp = self.execute(cmd).await?;
        let attrs = resp.result.attributes;
        Ok(attrs
            .chunks(2)
            .find(|pair| pair.first().map(|s| s.as_str()) == Some(name))
            .and_then(|pair| pair.get(1))
            .cloned())
    }

    pub async fn find_element(&self, selector: impl Into<String>) -> Result<Element> {
        let root = self.document_root().await?;
        let node_id = self.query_selector_under(selector, root).await?;
        Element::new(self.clone(), node_id).await
    }

    pub async fn find_elements(&self, selector: impl Into<String>) -> Result<Vec<Element>> {
        let root = self.document_root().await?;
        let ids = self.query_selector_all_under(selector, root).await?;
        Element::from_nodes(self, &ids).await
    }

    pub async fn describe_node(&self, node_id: NodeId) -> Result<Node> {
        let cmd = DescribeNodeParams::builder()
            .node_id(node_id)
            .depth(100)
            .build()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        let resp = self.execute(cmd).await?;
        Ok(resp.result.node)
    }

    /// Detaches and closes this page's target.
    pub async fn close(&self) -> Result<()> {
        self.execute_browser_scoped(CloseTargetParams::new(self.target_id.clone()))
            .await?;
        Ok(())
    }

    /// Print the current page as pdf.
    pub async fn pdf(&self, opts: PrintToPdfParams) -> Result<Vec<u8>> {
        let res = self.execute(opts).await?;
        let data: String = res.result.data.into();
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|err| CdpError::msg(err.to_string()))
    }

    /// Save the current page as pdf as file.
    pub async fn save_pdf(&self, opts: PrintToPdfParams, output: impl AsRef<Path>) -> Result<Vec<u8>> {
        let pdf = self.pdf(opts).await?;
        crate::utils::write(output.as_ref(), &pdf).await?;
        Ok(pdf)
    }

    /// Enables log domain.
    ///
    /// Sends the entries collected so far to the client by means of the
    /// entryAdded notification.
    pub async fn enable_log(&self) -> Result<&Self> {
        self.execute(browser_protocol::log::EnableParams::default())
            .await?;
        Ok(self)
    }

    /// Disables log domain.
    pub async fn disable_log(&self) -> Result<&Self> {
        self.execute(browser_protocol::log::DisableParams::default())
            .await?;
        Ok(self)
    }

    /// Enables runtime domain.
    pub async fn enable_runtime(&self) -> Result<&Self> {
        self.execute(js_protocol::runtime::EnableParams::default())
            .await?;
        Ok(self)
    }

    /// Disables runtime domain.
    pub async fn disable_runtime(&self) -> Result<&Self> {
        self.execute(js_protocol::runtime::DisableParams::default())
            .await?;
        Ok(self)
    }

    /// Enables Debugger.
    pub async fn enable_debugger(&self) -> Result<&Self> {
        self.execute(js_protocol::debugger::EnableParams::default())
            .await?;
        Ok(self)
    }

    /// Disables Debugger.
    pub async fn disable_debugger(&self) -> Result<&Self> {
        self.execute(js_protocol::debugger::DisableParams::default())
            .await?;
        Ok(self)
    }

    /// Activates (focuses) the target.
    pub async fn activate(&self) -> Result<&Self> {
        self.execute_browser_scoped(ActivateTargetParams::new(self.target_id.clone()))
            .await?;
        Ok(self)
    }

    /// Returns all cookies that match the tab's current URL.
    pub async fn get_cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.execute(GetCookiesParams::default()).await?.result.cookies)
    }

    /// Returns the title of the document.
    pub async fn get_title(&self) -> Result<Option<String>> {
        let title: String = self
            .evaluate("document.title")
            .await?
            .into_value()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        if title.is_empty() {
            Ok(None)
        } else {
            Ok(Some(title))
        }
    }

    /// Evaluates expression on global object.
    pub async fn evaluate(&self, evaluate: impl Into<EvaluateParams>) -> Result<EvaluationResult> {
        let remote_object = self.execute(evaluate.into()).await?.result.result;
        Ok(EvaluationResult::new(remote_object))
    }

    /// Returns source for the script with given id.
    ///
    /// Debugger must be enabled.
    pub async fn get_script_source(&self, script_id: impl Into<String>) -> Result<String> {
        Ok(self
            .execute(GetScriptSourceParams::new(ScriptId::from(script_id.into())))
            .await?
            .result
            .script_source)
    }

    /// Subscribes to every CDP event this page's target observes. Dropping
    /// the returned stream unregisters the subscription by the next
    /// broadcast.
    pub async fn subscribe_events(&self) -> Result<EventStream> {
        let (tx, rx) = futures::channel::oneshot::channel();
        self.sender
            .clone()
            .send(HandlerMessage::Subscribe(self.target_id.clone(), tx))
            .await?;
        let (id, events) = rx.await?.ok_or(CdpError::InvalidContext)?;
        Ok(EventStream::new(
            id,
            events,
            self.target_id.clone(),
            self.sender.clone(),
        ))
    }

    pub(crate) async fn unsubscribe(&self, id: ListenerId) {
        let _ = self
            .sender
            .clone()
            .send(HandlerMessage::Unsubscribe(self.target_id.clone(), id))
            .await;
    }
}

