use futures::future;

use crate::cdp::browser_protocol::dom::{BackendNodeId, DescribeNodeParams, NodeId, ResolveNodeParams};
use crate::cdp::js_protocol::runtime::RemoteObjectId;
use crate::error::{CdpError, Result};
use crate::page::Page;

/// A handle to a [DOM Element](https://developer.mozilla.org/en-US/docs/Web/API/Element).
///
/// Cheap to clone along with the `Page` it came from; holds no cache of its
/// own beyond the ids resolved at construction time, so a stale node (one
/// whose document has since been replaced) surfaces as a command error on
/// next use rather than silently.
#[derive(Debug, Clone)]
pub struct Element {
    /// The unique object identifier.
    pub remote_object_id: RemoteObjectId,
    pub backend_node_id: BackendNodeId,
    pub node_id: NodeId,
    page: Page,
}

impl Element {
    pub(crate) async fn new(page: Page, node_id: NodeId) -> Result<Self> {
        let describe = DescribeNodeParams::builder()
            .node_id(node_id)
            .depth(100)
            .build()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        let backend_node_id = page.execute(describe).await?.result.node.backend_node_id;

        let resolve = ResolveNodeParams::builder()
            .backend_node_id(backend_node_id)
            .build()
            .map_err(|err| CdpError::msg(err.to_string()))?;
        let resp = page.execute(resolve).await?;

        let remote_object_id = resp
            .result
            .object
            .object_id
            .ok_or_else(|| CdpError::msg(format!("no object id for node {:?}", node_id)))?;

        Ok(Self {
            remote_object_id,
            backend_node_id,
            node_id,
            page,
        })
    }

    /// Resolves a slice of `NodeId`s into `Element`s in parallel.
    pub(crate) async fn from_nodes(page: &Page, node_ids: &[NodeId]) -> Result<Vec<Self>> {
        future::join_all(node_ids.iter().copied().map(|id| Element::new(page.clone(), id)))
            .await
            .into_iter()
            .collect()
    }

    /// The page this element belongs to.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Finds the first descendant matching `selector`.
    pub async fn find_element(&self, selector: impl Into<String>) -> Result<Self> {
        let node_id = self.page.query_selector_under(selector, self.node_id).await?;
        Element::new(self.page.clone(), node_id).await
    }

    /// Finds every descendant matching `selector`.
    pub async fn find_elements(&self, selector: impl Into<String>) -> Result<Vec<Self>> {
        let ids = self
            .page
            .query_selector_all_under(selector, self.node_id)
            .await?;
        Element::from_nodes(&self.page, &ids).await
    }

    /// `Err(CdpError::NotVisible)` unless the node has a non-empty box
    /// model, i.e. isn't `display: none` or detached from the layout tree.
    pub async fn is_visible(&self) -> Result<()> {
        let (width, height) = self.page.box_model(self.node_id).await?;
        if width == 0.0 || height == 0.0 {
            Err(CdpError::NotVisible)
        } else {
            Ok(())
        }
    }

    /// `Err(CdpError::Disabled)` if the node carries a `disabled` attribute.
    pub async fn is_enabled(&self) -> Result<()> {
        if self.page.node_attribute(self.node_id, "disabled").await?.is_some() {
            Err(CdpError::Disabled)
        } else {
            Ok(())
        }
    }

    /// `Err(CdpError::NotSelected)` unless the node carries a `selected`
    /// attribute.
    pub async fn is_selected(&self) -> Result<()> {
        if self.page.node_attribute(self.node_id, "selected").await?.is_some() {
            Ok(())
        } else {
            Err(CdpError::NotSelected)
        }
    }
}
