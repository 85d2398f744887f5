use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use cdpdrive_types::Method;

use crate::cdp::browser_protocol::dom;
use crate::cdp::browser_protocol::network::LoaderId;
use crate::cdp::browser_protocol::page::{
    self, EventFrameAttached, EventFrameDetached, EventFrameNavigated, EventFrameStoppedLoading,
    EventLifecycleEvent, EventNavigatedWithinDocument, FrameId, FrameTree,
};
use crate::cdp::browser_protocol::target::EventAttachedToTarget;
use crate::cdp::js_protocol::runtime;
use crate::handler::cmd::CommandChain;

/// A single frame in a target's frame tree. Per-target, not shared: a frame
/// that moves to another target (an out-of-process iframe swap) is detached
/// here and picked up fresh by whichever target now owns it.
#[derive(Debug)]
pub struct Frame {
    pub parent_frame: Option<FrameId>,
    pub id: FrameId,
    pub loader_id: Option<LoaderId>,
    pub url: Option<String>,
    pub child_frames: HashSet<FrameId>,
    pub name: Option<String>,
    pub lifecycle_events: HashSet<Cow<'static, str>>,
}

impl Frame {
    pub fn new(id: FrameId) -> Self {
        Self {
            parent_frame: None,
            id,
            loader_id: None,
            url: None,
            child_frames: Default::default(),
            name: None,
            lifecycle_events: Default::default(),
        }
    }

    pub fn with_parent(id: FrameId, parent: &mut Frame) -> Self {
        parent.child_frames.insert(id.clone());
        Self {
            parent_frame: Some(parent.id.clone()),
            id,
            loader_id: None,
            url: None,
            child_frames: Default::default(),
            name: None,
            lifecycle_events: Default::default(),
        }
    }

    fn navigated(&mut self, frame: &page::Frame) {
        self.name = frame.name.clone();
        let url = if let Some(ref fragment) = frame.url_fragment {
            format!("{}{}", frame.url, fragment)
        } else {
            frame.url.clone()
        };
        self.url = Some(url);
    }

    fn navigated_within_url(&mut self, url: String) {
        self.url = Some(url)
    }

    fn on_loading_stopped(&mut self) {
        self.lifecycle_events.insert("DOMContentLoaded".into());
        self.lifecycle_events.insert("load".into());
    }

    /// `true` once every event in `expected` has been observed since the
    /// last `init` lifecycle event (i.e. since the current navigation
    /// started).
    pub fn has_lifecycle_events<'a, I: IntoIterator<Item = &'a str>>(&self, expected: I) -> bool {
        expected
            .into_iter()
            .all(|ev| self.lifecycle_events.contains(ev))
    }
}

/// Maintains the frame tree of a target and keeps it consistent as
/// `Page`/`Runtime` domain events arrive, in arrival order.
#[derive(Debug, Default)]
pub struct FrameManager {
    main_frame: Option<FrameId>,
    frames: HashMap<FrameId, Frame>,
}

impl FrameManager {
    /// Commands to run in order to initialize frame tracking for a target.
    pub fn init_commands() -> CommandChain {
        let enable = page::EnableParams::default();
        let get_tree = page::GetFrameTreeParams::default();
        let set_lifecycle = page::SetLifecycleEventsEnabledParams::new(true);
        let enable_runtime = runtime::EnableParams::default();
        let enable_dom = dom::EnableParams::default();
        CommandChain::new(vec![
            (enable.identifier(), serde_json::to_value(enable).unwrap()),
            (
                get_tree.identifier(),
                serde_json::to_value(get_tree).unwrap(),
            ),
            (
                set_lifecycle.identifier(),
                serde_json::to_value(set_lifecycle).unwrap(),
            ),
            (
                enable_runtime.identifier(),
                serde_json::to_value(enable_runtime).unwrap(),
            ),
            (
                enable_dom.identifier(),
                serde_json::to_value(enable_dom).unwrap(),
            ),
        ])
    }

    pub fn main_frame(&self) -> Option<&Frame> {
        self.main_frame.as_ref().and_then(|id| self.frames.get(id))
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> + '_ {
        self.frames.values()
    }

    pub fn frame(&self, id: &FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    /// Seeds the frame tree from `Page.getFrameTree`'s response, issued
    /// during target initialization.
    pub fn set_main_frame_tree(&mut self, tree: FrameTree) {
        let mut frame = Frame::new(tree.frame.id.clone());
        frame.navigated(&tree.frame);
        self.main_frame = Some(frame.id.clone());
        self.frames.insert(frame.id.clone(), frame);
        for child in tree.child_frames.into_iter().flatten() {
            self.insert_tree(child);
        }
    }

    fn insert_tree(&mut self, tree: FrameTree) {
        if let Some(parent_id) = tree.frame.parent_id.clone() {
            if let Some(parent) = self.frames.get_mut(&parent_id) {
                let mut frame = Frame::with_parent(tree.frame.id.clone(), parent);
                frame.navigated(&tree.frame);
                self.frames.insert(frame.id.clone(), frame);
            }
        }
        for child in tree.child_frames.into_iter().flatten() {
            self.insert_tree(child);
        }
    }

    /// Fired when a frame moved to another session (attached in flattened
    /// mode alongside its own target).
    pub fn on_attached_to_target(&mut self, _event: &EventAttachedToTarget) {}

    pub fn on_frame_attached(&mut self, event: &EventFrameAttached) {
        if self.frames.contains_key(&event.frame_id) {
            return;
        }
        if let Some(parent_frame) = self.frames.get_mut(&event.parent_frame_id) {
            let frame = Frame::with_parent(event.frame_id.clone(), parent_frame);
            self.frames.insert(event.frame_id.clone(), frame);
        }
    }

    pub fn on_frame_detached(&mut self, event: &EventFrameDetached) {
        self.remove_frames_recursively(&event.frame_id);
    }

    pub fn on_frame_navigated(&mut self, event: &EventFrameNavigated) {
        if event.frame.parent_id.is_some() {
            if let Some((id, mut frame)) = self.frames.remove_entry(&event.frame.id) {
                let children: Vec<_> = frame.child_frames.drain().collect();
                for child in &children {
                    self.remove_frames_recursively(child);
                }
                frame.navigated(&event.frame);
                self.frames.insert(id, frame);
            }
        } else {
            let mut frame = if let Some(main) = self.main_frame.take() {
                let mut main_frame = self.frames.remove(&main).expect("main frame is tracked");
                let children: Vec<_> = main_frame.child_frames.drain().collect();
                for child in &children {
                    self.remove_frames_recursively(child);
                }
                main_frame.id = event.frame.id.clone();
                main_frame
            } else {
                Frame::new(event.frame.id.clone())
            };
            frame.navigated(&event.frame);
            self.main_frame = Some(frame.id.clone());
            self.frames.insert(frame.id.clone(), frame);
        }
    }

    pub fn on_frame_navigated_within_document(&mut self, event: &EventNavigatedWithinDocument) {
        if let Some(frame) = self.frames.get_mut(&event.frame_id) {
            frame.navigated_within_url(event.url.clone());
        }
    }

    pub fn on_frame_stopped_loading(&mut self, event: &EventFrameStoppedLoading) {
        if let Some(frame) = self.frames.get_mut(&event.frame_id) {
            frame.on_loading_stopped();
        }
    }

    pub fn on_page_lifecycle_event(&mut self, event: &EventLifecycleEvent) {
        if let Some(frame) = self.frames.get_mut(&event.frame_id) {
            if event.name == "init" {
                frame.loader_id = Some(event.loader_id.clone());
                frame.lifecycle_events.clear();
            }
            frame.lifecycle_events.insert(event.name.clone().into());
        }
    }

    fn remove_frames_recursively(&mut self, id: &FrameId) -> Option<Frame> {
        let mut frame = self.frames.remove(id)?;
        let children: Vec<_> = frame.child_frames.drain().collect();
        for child in &children {
            self.remove_frames_recursively(child);
        }
        if let Some(parent_id) = frame.parent_frame.take() {
            if let Some(parent) = self.frames.get_mut(&parent_id) {
                parent.child_frames.remove(&frame.id);
            }
        }
        Some(frame)
    }
}
