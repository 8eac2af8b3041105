//! In-process tree of execution contexts.
//!
//! [`FrameTree`] models a page: a process-wide global context plus a tree of
//! frames, each with an origin, an optional name, key-path exports and a
//! delivery point. A [`FrameView`] is the tree as seen from one frame and is
//! what clients receive as their [`Host`].
//!
//! # Cross-Origin Reads
//!
//! Hosts disagree on what an inaccessible read does. [`CrossOriginReads`]
//! selects the behavior:
//!
//! | Mode | `hostname` | other properties |
//! |------|------------|------------------|
//! | `SilentUndefined` | undefined | undefined |
//! | `Throwing` | access error | access error |
//! | `LegacyProbe` | defined | access error |
//!
//! # Example
//!
//! ```
//! use omid_bridge::host::{FrameTree, Host};
//!
//! let tree = FrameTree::new();
//! let top = tree.add_root("https://publisher.example");
//! let creative = tree.add_frame(top, "https://ads.example");
//!
//! let host = tree.view(creative);
//! assert_eq!(host.top(creative), Some(top));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::ContextId;

use super::{AccessDenied, Capability, Envelope, Export, Host, KeyPath, PropertyRead, Timers};

// ============================================================================
// Constants
// ============================================================================

/// Property that every window exposes to same-origin readers.
const HOSTNAME_PROPERTY: &str = "hostname";

// ============================================================================
// CrossOriginReads
// ============================================================================

/// Behavior of property reads across an origin boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CrossOriginReads {
    /// Reads quietly produce undefined.
    SilentUndefined,
    /// Reads raise an access error.
    #[default]
    Throwing,
    /// `hostname` reads succeed, any other read raises.
    LegacyProbe,
}

// ============================================================================
// Frame
// ============================================================================

/// One execution context in the tree.
#[derive(Debug)]
struct Frame {
    /// Embedding frame. `None` for roots and the global context.
    parent: Option<ContextId>,
    /// Origin string compared for boundary checks.
    origin: String,
    /// Name visible to the parent.
    name: Option<String>,
    /// `false` for the global context, which has no window chain.
    is_window: bool,
    /// Exported values by key path.
    exports: FxHashMap<KeyPath, Export>,
}

/// Mutable tree contents.
#[derive(Debug, Default)]
struct TreeState {
    frames: FxHashMap<ContextId, Frame>,
    listeners: FxHashMap<ContextId, Vec<mpsc::UnboundedSender<Envelope>>>,
}

// ============================================================================
// FrameTree
// ============================================================================

/// In-process host made of nested frames.
pub struct FrameTree {
    /// Process-wide fallback context.
    global: ContextId,
    /// Cross-origin read behavior.
    reads: CrossOriginReads,
    /// Host timers, if any.
    timers: Option<Arc<dyn Timers>>,
    /// Frames and listeners.
    state: Mutex<TreeState>,
}

impl FrameTree {
    /// Creates a tree with only the global context, throwing on
    /// cross-origin reads and without timers.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_options(CrossOriginReads::default(), None)
    }

    /// Creates a tree with the given read behavior and timers.
    #[must_use]
    pub fn with_options(reads: CrossOriginReads, timers: Option<Arc<dyn Timers>>) -> Arc<Self> {
        let global = ContextId::next();
        let mut state = TreeState::default();
        state.frames.insert(
            global,
            Frame {
                parent: None,
                origin: String::new(),
                name: None,
                is_window: false,
                exports: FxHashMap::default(),
            },
        );

        Arc::new(Self {
            global,
            reads,
            timers,
            state: Mutex::new(state),
        })
    }

    /// Returns the global context.
    #[inline]
    #[must_use]
    pub fn global(&self) -> ContextId {
        self.global
    }

    /// Adds an outermost window.
    pub fn add_root(&self, origin: impl Into<String>) -> ContextId {
        self.insert(None, origin.into(), None)
    }

    /// Adds an unnamed frame embedded in `parent`.
    pub fn add_frame(&self, parent: ContextId, origin: impl Into<String>) -> ContextId {
        self.insert(Some(parent), origin.into(), None)
    }

    /// Adds a named frame embedded in `parent`.
    pub fn add_named_frame(
        &self,
        parent: ContextId,
        origin: impl Into<String>,
        name: impl Into<String>,
    ) -> ContextId {
        self.insert(Some(parent), origin.into(), Some(name.into()))
    }

    /// Removes a frame and its descendants. Their delivery points close.
    pub fn remove_frame(&self, context: ContextId) {
        let mut state = self.state.lock();
        let mut doomed = vec![context];
        while let Some(id) = doomed.pop() {
            state.frames.remove(&id);
            state.listeners.remove(&id);
            doomed.extend(
                state
                    .frames
                    .iter()
                    .filter(|(_, frame)| frame.parent == Some(id))
                    .map(|(child, _)| *child),
            );
        }
        trace!(%context, "Frame removed");
    }

    /// Exports `value` from `context` under `key_path`.
    pub fn export(&self, context: ContextId, key_path: KeyPath, value: Export) {
        if let Some(frame) = self.state.lock().frames.get_mut(&context) {
            frame.exports.insert(key_path, value);
        }
    }

    /// Removes an export.
    pub fn unexport(&self, context: ContextId, key_path: KeyPath) {
        if let Some(frame) = self.state.lock().frames.get_mut(&context) {
            frame.exports.remove(&key_path);
        }
    }

    /// Returns the tree as seen from `context`.
    #[must_use]
    pub fn view(self: &Arc<Self>, context: ContextId) -> FrameView {
        FrameView {
            tree: Arc::clone(self),
            current: Some(context),
        }
    }

    /// Returns the tree as seen from a headless script.
    #[must_use]
    pub fn headless_view(self: &Arc<Self>) -> FrameView {
        FrameView {
            tree: Arc::clone(self),
            current: None,
        }
    }

    fn insert(&self, parent: Option<ContextId>, origin: String, name: Option<String>) -> ContextId {
        let id = ContextId::next();
        self.state.lock().frames.insert(
            id,
            Frame {
                parent,
                origin,
                name,
                is_window: true,
                exports: FxHashMap::default(),
            },
        );
        id
    }

    /// Returns `true` if `from` can read `peer` directly.
    fn same_origin(state: &TreeState, from: ContextId, peer: ContextId) -> bool {
        if from == peer {
            return true;
        }
        match (state.frames.get(&from), state.frames.get(&peer)) {
            (Some(a), Some(b)) => a.origin == b.origin,
            _ => false,
        }
    }
}

// ============================================================================
// Host Implementation
// ============================================================================

impl Host for FrameTree {
    fn current(&self) -> Option<ContextId> {
        None
    }

    fn fallback(&self) -> ContextId {
        self.global
    }

    fn top(&self, context: ContextId) -> Option<ContextId> {
        let state = self.state.lock();
        let mut frame = state.frames.get(&context)?;
        if !frame.is_window {
            return None;
        }
        let mut top = context;
        while let Some(parent) = frame.parent {
            frame = state.frames.get(&parent)?;
            top = parent;
        }
        Some(top)
    }

    fn read_property(&self, from: ContextId, peer: ContextId, name: &str) -> PropertyRead {
        let state = self.state.lock();
        let Some(frame) = state.frames.get(&peer) else {
            return PropertyRead::Denied;
        };

        if Self::same_origin(&state, from, peer) {
            return match (name, frame.is_window) {
                (HOSTNAME_PROPERTY, true) => PropertyRead::Defined,
                (HOSTNAME_PROPERTY, false) => PropertyRead::Denied,
                _ => PropertyRead::Undefined,
            };
        }

        match (self.reads, name) {
            (CrossOriginReads::SilentUndefined, _) => PropertyRead::Undefined,
            (CrossOriginReads::LegacyProbe, HOSTNAME_PROPERTY) => PropertyRead::Defined,
            _ => PropertyRead::Denied,
        }
    }

    fn lookup(&self, from: ContextId, capability: &Capability) -> Result<Option<Export>, AccessDenied> {
        let state = self.state.lock();
        let Some(frame) = state.frames.get(&capability.peer) else {
            return Ok(None);
        };
        if !Self::same_origin(&state, from, capability.peer) {
            return Err(AccessDenied {
                peer: capability.peer,
            });
        }
        Ok(frame.exports.get(&capability.key_path).cloned())
    }

    fn child_named(&self, peer: ContextId, name: &str) -> Option<ContextId> {
        self.state
            .lock()
            .frames
            .iter()
            .find(|(_, frame)| frame.parent == Some(peer) && frame.name.as_deref() == Some(name))
            .map(|(id, _)| *id)
    }

    fn post_message(&self, target: ContextId, data: String, source: ContextId) {
        let mut state = self.state.lock();
        let Some(listeners) = state.listeners.get_mut(&target) else {
            trace!(%target, "No listener at delivery point");
            return;
        };
        listeners.retain(|tx| {
            tx.send(Envelope {
                data: data.clone(),
                source,
            })
            .is_ok()
        });
    }

    fn listen(&self, context: ContextId) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if state.frames.contains_key(&context) {
            state.listeners.entry(context).or_default().push(tx);
        }
        rx
    }

    fn timers(&self) -> Option<Arc<dyn Timers>> {
        self.timers.clone()
    }
}

// ============================================================================
// FrameView
// ============================================================================

/// A [`FrameTree`] seen from one context.
#[derive(Clone)]
pub struct FrameView {
    tree: Arc<FrameTree>,
    current: Option<ContextId>,
}

impl FrameView {
    /// Returns the underlying tree.
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &Arc<FrameTree> {
        &self.tree
    }
}

impl Host for FrameView {
    fn current(&self) -> Option<ContextId> {
        self.current
    }

    fn fallback(&self) -> ContextId {
        self.tree.fallback()
    }

    fn top(&self, context: ContextId) -> Option<ContextId> {
        self.tree.top(context)
    }

    fn read_property(&self, from: ContextId, peer: ContextId, name: &str) -> PropertyRead {
        self.tree.read_property(from, peer, name)
    }

    fn lookup(&self, from: ContextId, capability: &Capability) -> Result<Option<Export>, AccessDenied> {
        self.tree.lookup(from, capability)
    }

    fn child_named(&self, peer: ContextId, name: &str) -> Option<ContextId> {
        self.tree.child_named(peer, name)
    }

    fn post_message(&self, target: ContextId, data: String, source: ContextId) {
        self.tree.post_message(target, data, source);
    }

    fn listen(&self, context: ContextId) -> mpsc::UnboundedReceiver<Envelope> {
        self.tree.listen(context)
    }

    fn timers(&self) -> Option<Arc<dyn Timers>> {
        self.tree.timers()
    }
}

// ============================================================================
// Tests
// ============================================================================
