//! Per-tab layout state and change notifications.
//!
//! One [`TabLayout`] per tab that has been split at least once, keyed by
//! the tab's root session id. Unsplit tabs deliberately have no entry;
//! their single pane is the tab itself, handled by the surrounding UI.
//! Every mutation is atomic and followed by a snapshot broadcast to
//! observers (pane renderer, hotkey router).

use crate::pane_tree::{NavigateDirection, PaneId, PaneNode, ResizeOutcome, SplitDirection};
use collections::FxHashMap;
use parking_lot::Mutex;
use session::SessionId;
use std::sync::Arc;

/// The split state of one tab.
#[derive(Clone, Debug, PartialEq)]
pub struct TabLayout {
    pub root: PaneNode,
    pub focused: PaneId,
}

/// Result of closing a pane through the store.
#[derive(Clone, Debug, PartialEq)]
pub enum CloseOutcome {
    /// The pane was removed; its sibling subtree took its place.
    Closed {
        released: SessionId,
        focused: PaneId,
    },
    /// The closed pane was the last one: the layout is gone and the
    /// owning tab should close too.
    TabClosed { released: SessionId },
    /// Unknown tab, unknown pane, or a split node id.
    NotFound,
}

type Observer = Arc<dyn Fn(&SessionId, Option<&TabLayout>) + Send + Sync>;

/// Holds every tab's pane tree and focus pointer.
pub struct LayoutStore {
    layouts: Mutex<FxHashMap<SessionId, TabLayout>>,
    observers: Mutex<Vec<Observer>>,
}

impl Default for LayoutStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutStore {
    pub fn new() -> Self {
        Self {
            layouts: Mutex::new(FxHashMap::default()),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Register a snapshot observer. Called after every layout change
    /// with the new state, or `None` when the layout was removed.
    pub fn observe(&self, observer: impl Fn(&SessionId, Option<&TabLayout>) + Send + Sync + 'static) {
        self.observers.lock().push(Arc::new(observer));
    }

    /// Split a pane in `tab`, binding the fresh leaf to `new_session`.
    ///
    /// On a tab with no layout yet, the implicit single pane (the tab's
    /// own session) is promoted to a terminal root and split; `target`
    /// is irrelevant because there is only one pane. On an existing
    /// layout, `target` defaults to the focused pane.
    ///
    /// Returns the new focused pane id, or `None` when the split was
    /// rejected (depth limit, unknown target); the caller then owns the
    /// already-provisioned `new_session`.
    pub fn split(
        &self,
        tab: &SessionId,
        target: Option<PaneId>,
        direction: SplitDirection,
        new_session: SessionId,
    ) -> Option<PaneId> {
        let snapshot;
        let new_focus;
        {
            let mut layouts = self.layouts.lock();
            match layouts.get_mut(tab) {
                None => {
                    let mut root = PaneNode::new_terminal(tab.clone());
                    let implicit = root.id();
                    let Some(focus) = root.split(implicit, direction, new_session) else {
                        util::debug_panic!("splitting a fresh single-pane layout failed");
                        return None;
                    };
                    new_focus = focus;
                    let layout = TabLayout {
                        root,
                        focused: new_focus,
                    };
                    snapshot = layout.clone();
                    layouts.insert(tab.clone(), layout);
                }
                Some(layout) => {
                    let target = target.unwrap_or(layout.focused);
                    new_focus = layout.root.split(target, direction, new_session)?;
                    layout.focused = new_focus;
                    snapshot = layout.clone();
                }
            }
        }
        self.notify(tab, Some(&snapshot));
        Some(new_focus)
    }

    /// Close a pane. Closing the last pane removes the layout entirely
    /// and reports [`CloseOutcome::TabClosed`]; in both outcomes the
    /// released session id is returned so the caller can terminate the
    /// backend process.
    pub fn close(&self, tab: &SessionId, pane: PaneId) -> CloseOutcome {
        let mut layouts = self.layouts.lock();
        let Some(layout) = layouts.get_mut(tab) else {
            return CloseOutcome::NotFound;
        };

        // Sole remaining pane: the layout itself disappears
        let root_session = match &layout.root {
            PaneNode::Terminal { id, session } if *id == pane => Some(session.clone()),
            _ => None,
        };
        if let Some(released) = root_session {
            layouts.remove(tab);
            drop(layouts);
            self.notify(tab, None);
            return CloseOutcome::TabClosed { released };
        }

        match layout.root.remove(pane) {
            Some((released, focused)) => {
                layout.focused = focused;
                let snapshot = layout.clone();
                drop(layouts);
                self.notify(tab, Some(&snapshot));
                CloseOutcome::Closed { released, focused }
            }
            None => CloseOutcome::NotFound,
        }
    }

    /// Resize a split. Jitter-tolerance no-ops are accepted silently
    /// (no notification); only real changes broadcast.
    pub fn resize(&self, tab: &SessionId, split: PaneId, sizes: [f64; 2]) -> bool {
        let snapshot = {
            let mut layouts = self.layouts.lock();
            let Some(layout) = layouts.get_mut(tab) else {
                return false;
            };
            match layout.root.resize(split, sizes) {
                ResizeOutcome::Applied => layout.clone(),
                ResizeOutcome::Unchanged => return true,
                ResizeOutcome::Rejected => return false,
            }
        };
        self.notify(tab, Some(&snapshot));
        true
    }

    /// Move focus one pane along `direction`. At the grid edge focus is
    /// unchanged and no notification fires.
    pub fn navigate(&self, tab: &SessionId, direction: NavigateDirection) -> Option<PaneId> {
        let (snapshot, new_focus) = {
            let mut layouts = self.layouts.lock();
            let layout = layouts.get_mut(tab)?;
            let next = layout.root.navigate(layout.focused, direction)?;
            if next == layout.focused {
                return Some(next);
            }
            layout.focused = next;
            (layout.clone(), next)
        };
        self.notify(tab, Some(&snapshot));
        Some(new_focus)
    }

    /// Explicitly focus a terminal pane (click-to-focus).
    pub fn focus(&self, tab: &SessionId, pane: PaneId) -> bool {
        let snapshot = {
            let mut layouts = self.layouts.lock();
            let Some(layout) = layouts.get_mut(tab) else {
                return false;
            };
            if layout.focused == pane {
                return true;
            }
            match layout.root.find(pane) {
                Some(PaneNode::Terminal { .. }) => {}
                _ => return false,
            }
            layout.focused = pane;
            layout.clone()
        };
        self.notify(tab, Some(&snapshot));
        true
    }

    pub fn snapshot(&self, tab: &SessionId) -> Option<TabLayout> {
        self.layouts.lock().get(tab).cloned()
    }

    pub fn has_layout(&self, tab: &SessionId) -> bool {
        self.layouts.lock().contains_key(tab)
    }

    /// Drop a tab's layout without closing panes one by one (the UI
    /// closed the whole tab).
    pub fn remove_tab(&self, tab: &SessionId) -> bool {
        let removed = self.layouts.lock().remove(tab).is_some();
        if removed {
            self.notify(tab, None);
        }
        removed
    }

    /// Union of every terminal leaf's session across all tabs, added to
    /// `out`. The caller adds unsplit active tabs itself.
    pub fn collect_sessions(&self, out: &mut collections::FxHashSet<SessionId>) {
        for layout in self.layouts.lock().values() {
            layout.root.sessions(out);
        }
    }

    pub fn tabs(&self) -> Vec<SessionId> {
        self.layouts.lock().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.lock().is_empty()
    }

    /// Teardown: drop all layouts, notifying removal for each tab.
    pub fn clear(&self) {
        let removed: Vec<SessionId> = {
            let mut layouts = self.layouts.lock();
            layouts.drain().map(|(tab, _)| tab).collect()
        };
        for tab in &removed {
            self.notify(tab, None);
        }
    }

    fn notify(&self, tab: &SessionId, layout: Option<&TabLayout>) {
        // Clone the observer list first so a callback can re-enter the
        // store without deadlocking
        let observers: Vec<Observer> = self.observers.lock().clone();
        for observer in observers {
            observer(tab, layout);
        }
    }
}
