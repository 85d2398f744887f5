use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cdpdrive_cdp::cdp::browser_protocol::dom::{BackendNodeId, Node, NodeId};
use cdpdrive_cdp::cdp::browser_protocol::page::FrameId;

/// A cancellation flag shared between the `NodeStore` and every `Element`
/// handle it produced. Fired once on `DOM.documentUpdated`; handles that
/// observe it return `CdpError::StaleNode` instead of operating on a node id
/// that belongs to a document that no longer exists.
#[derive(Debug, Clone, Default)]
pub struct Invalidated(Arc<AtomicBool>);

impl Invalidated {
    fn fire(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_invalidated(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CachedNode {
    pub node_id: NodeId,
    pub backend_node_id: BackendNodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub frame_id: Option<FrameId>,
    pub shadow_roots: Vec<NodeId>,
    pub pseudo_elements: Vec<NodeId>,
    pub distributed_nodes: Vec<BackendNodeId>,
    pub attributes: HashMap<String, String>,
    pub text_content: String,
    pub child_node_count: Option<i64>,
    pub style_invalidated: bool,
}

impl CachedNode {
    fn from_node(node: &Node, parent: Option<NodeId>) -> Self {
        Self {
            node_id: node.node_id,
            backend_node_id: node.backend_node_id,
            parent,
            children: Vec::new(),
            frame_id: node.frame_id.clone(),
            shadow_roots: Vec::new(),
            pseudo_elements: Vec::new(),
            distributed_nodes: Vec::new(),
            attributes: attributes_to_map(node.attributes.as_deref()),
            text_content: node.node_value.clone(),
            child_node_count: node.child_node_count,
            style_invalidated: false,
        }
    }
}

/// `Node.attributes` is a flat `[name1, value1, name2, value2, ...]` array;
/// the rest of this module works with it as a map.
fn attributes_to_map(flat: Option<&[String]>) -> HashMap<String, String> {
    let Some(flat) = flat else {
        return HashMap::new();
    };
    flat.chunks(2)
        .filter_map(|pair| Some((pair.first()?.clone(), pair.get(1)?.clone())))
        .collect()
}

/// Arena of DOM nodes known to a `Target`, keyed by `NodeId`.
///
/// `NodeId`s are only valid for the document that produced them. A full
/// document replacement (`DOM.documentUpdated`) invalidates every id at
/// once rather than attempting to patch the tree, mirroring what the
/// protocol itself guarantees: after that event every previously known
/// node id is meaningless.
#[derive(Debug, Default)]
pub struct NodeStore {
    nodes: HashMap<NodeId, CachedNode>,
    invalidated: Invalidated,
}

impl NodeStore {
    pub fn insert(&mut self, node: CachedNode) {
        if let Some(parent_id) = node.parent {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                if !parent.children.contains(&node.node_id) {
                    parent.children.push(node.node_id);
                }
            }
        }
        self.nodes.insert(node.node_id, node);
    }

    pub fn get(&self, id: NodeId) -> Option<&CachedNode> {
        self.nodes.get(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<CachedNode> {
        self.nodes.remove(&id)
    }

    /// A cloned handle to this store's current invalidation flag. Stays
    /// meaningful even after the store itself moves on to a new document,
    /// since `on_document_updated` swaps in a fresh flag and fires the old
    /// one first.
    pub fn invalidated(&self) -> Invalidated {
        self.invalidated.clone()
    }

    pub fn on_document_updated(&mut self) {
        self.invalidated.fire();
        self.invalidated = Invalidated::default();
        self.nodes.clear();
    }

    /// Rebuilds the arena from a `DOM.getDocument` response, walking
    /// children, shadow roots and pseudo elements recursively.
    pub fn populate_from_root(&mut self, root: Node) {
        self.insert_tree(&root, None);
    }

    fn insert_tree(&mut self, node: &Node, parent: Option<NodeId>) {
        let node_id = node.node_id;
        let mut cached = CachedNode::from_node(node, parent);

        if let Some(children) = node.children.as_ref() {
            cached.children = children.iter().map(|c| c.node_id).collect();
        }
        if let Some(shadow_roots) = node.shadow_roots.as_ref() {
            cached.shadow_roots = shadow_roots.iter().map(|c| c.node_id).collect();
        }
        if let Some(pseudo_elements) = node.pseudo_elements.as_ref() {
            cached.pseudo_elements = pseudo_elements.iter().map(|c| c.node_id).collect();
        }

        self.nodes.insert(node_id, cached);

        for child in node.children.iter().flatten() {
            self.insert_tree(child, Some(node_id));
        }
        for root in node.shadow_roots.iter().flatten() {
            self.insert_tree(root, Some(node_id));
        }
        for pseudo in node.pseudo_elements.iter().flatten() {
            self.insert_tree(pseudo, Some(node_id));
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
            for root in node.shadow_roots {
                self.remove_subtree(root);
            }
            for pseudo in node.pseudo_elements {
                self.remove_subtree(pseudo);
            }
        }
    }

    /// `DOM.setChildNodes`: replaces `parent_id`'s full child list.
    pub fn set_children(&mut self, parent_id: NodeId, nodes: Vec<Node>) {
        let existing = self
            .nodes
            .get(&parent_id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in existing {
            self.remove_subtree(child);
        }
        let mut children = Vec::with_capacity(nodes.len());
        for node in &nodes {
            children.push(node.node_id);
            self.insert_tree(node, Some(parent_id));
        }
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children = children;
        }
    }

    /// `DOM.childNodeInserted`: `previous_node_id` is the sentinel "no
    /// previous sibling" id when it doesn't match any existing child, in
    /// which case the new node becomes the first child.
    pub fn insert_child(&mut self, parent_id: NodeId, previous_node_id: NodeId, node: Node) {
        let node_id = node.node_id;
        self.insert_tree(&node, Some(parent_id));
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            let pos = parent
                .children
                .iter()
                .position(|&id| id == previous_node_id)
                .map(|p| p + 1)
                .unwrap_or(0);
            if !parent.children.contains(&node_id) {
                parent.children.insert(pos.min(parent.children.len()), node_id);
            }
        }
    }

    /// `DOM.childNodeRemoved`.
    pub fn remove_child(&mut self, parent_id: NodeId, node_id: NodeId) {
        self.remove_subtree(node_id);
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.retain(|&id| id != node_id);
        }
    }

    /// `DOM.shadowRootPushed`.
    pub fn push_shadow_root(&mut self, host_id: NodeId, root: Node) {
        let root_id = root.node_id;
        self.insert_tree(&root, Some(host_id));
        if let Some(host) = self.nodes.get_mut(&host_id) {
            if !host.shadow_roots.contains(&root_id) {
                host.shadow_roots.push(root_id);
            }
        }
    }

    /// `DOM.shadowRootPopped`.
    pub fn pop_shadow_root(&mut self, host_id: NodeId, root_id: NodeId) {
        self.remove_subtree(root_id);
        if let Some(host) = self.nodes.get_mut(&host_id) {
            host.shadow_roots.retain(|&id| id != root_id);
        }
    }

    /// `DOM.pseudoElementAdded`.
    pub fn add_pseudo_element(&mut self, parent_id: NodeId, pseudo_element: Node) {
        let pseudo_id = pseudo_element.node_id;
        self.insert_tree(&pseudo_element, Some(parent_id));
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            if !parent.pseudo_elements.contains(&pseudo_id) {
                parent.pseudo_elements.push(pseudo_id);
            }
        }
    }

    /// `DOM.pseudoElementRemoved`.
    pub fn remove_pseudo_element(&mut self, parent_id: NodeId, pseudo_element_id: NodeId) {
        self.remove_subtree(pseudo_element_id);
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.pseudo_elements.retain(|&id| id != pseudo_element_id);
        }
    }

    /// `DOM.distributedNodesUpdated`.
    pub fn set_distributed_nodes(&mut self, insertion_point_id: NodeId, nodes: Vec<BackendNodeId>) {
        if let Some(node) = self.nodes.get_mut(&insertion_point_id) {
            node.distributed_nodes = nodes;
        }
    }

    /// `DOM.attributeModified`.
    pub fn set_attribute(&mut self, node_id: NodeId, name: String, value: String) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.attributes.insert(name, value);
        }
    }

    /// `DOM.attributeRemoved`.
    pub fn remove_attribute(&mut self, node_id: NodeId, name: &str) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.attributes.remove(name);
        }
    }

    /// `DOM.characterDataModified`.
    pub fn set_character_data(&mut self, node_id: NodeId, data: String) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.text_content = data;
        }
    }

    /// `DOM.childNodeCountUpdated`.
    pub fn set_child_node_count(&mut self, node_id: NodeId, count: i64) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.child_node_count = Some(count);
        }
    }

    /// `DOM.inlineStyleInvalidated`.
    pub fn mark_style_invalidated(&mut self, node_ids: &[NodeId]) {
        for id in node_ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.style_invalidated = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `NodeId` has no public constructor; the wire format represents it as
    /// a bare integer, so round-tripping through serde is the only way to
    /// build one outside `cdpdrive_cdp`.
    fn nid(n: i64) -> NodeId {
        serde_json::from_value(serde_json::json!(n)).unwrap()
    }

    fn node(id: i64, parent: Option<NodeId>) -> CachedNode {
        CachedNode {
            node_id: nid(id),
            parent,
            ..Default::default()
        }
    }

    #[test]
    fn insert_links_into_parents_children() {
        let mut store = NodeStore::default();
        store.insert(node(1, None));
        store.insert(node(2, Some(nid(1))));
        assert_eq!(store.get(nid(1)).unwrap().children, vec![nid(2)]);
    }

    #[test]
    fn remove_child_drops_the_subtree() {
        let mut store = NodeStore::default();
        store.insert(node(1, None));
        store.insert(node(2, Some(nid(1))));
        store.remove_child(nid(1), nid(2));
        assert!(store.get(nid(2)).is_none());
        assert!(store.get(nid(1)).unwrap().children.is_empty());
    }

    #[test]
    fn document_updated_fires_and_replaces_the_invalidation_flag() {
        let mut store = NodeStore::default();
        store.insert(node(1, None));
        let old = store.invalidated();
        store.on_document_updated();
        assert!(old.is_invalidated());
        assert!(!store.invalidated().is_invalidated());
        assert!(store.get(nid(1)).is_none());
    }

    #[test]
    fn attribute_modified_then_removed() {
        let mut store = NodeStore::default();
        store.insert(node(1, None));
        store.set_attribute(nid(1), "id".into(), "main".into());
        assert_eq!(store.get(nid(1)).unwrap().attributes.get("id"), Some(&"main".to_string()));
        store.remove_attribute(nid(1), "id");
        assert!(store.get(nid(1)).unwrap().attributes.get("id").is_none());
    }

    #[test]
    fn attributes_to_map_pairs_up_the_flat_array() {
        let map = attributes_to_map(Some(&["id".to_string(), "main".to_string()]));
        assert_eq!(map.get("id"), Some(&"main".to_string()));
    }
}
