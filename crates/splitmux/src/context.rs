//! The top-level handle tying layouts to terminal sessions.

use collections::FxHashSet;
use layout::{CloseOutcome, LayoutStore, NavigateDirection, PaneId, SplitDirection, TabLayout};
use parking_lot::Mutex;
use session::{
    Container, ContainerId, OutputChannel, RendererFactory, SessionBackend, SessionId,
    SessionNotice, TermSize, TerminalEntry, TerminalRegistry,
};
use settings::Config;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// One multiplexer instance: a layout store, a terminal registry, and
/// the notice stream connecting the core to the surrounding UI.
///
/// All methods take `&self`; the context is meant to be shared behind an
/// `Arc` between the UI thread and async tasks.
pub struct MuxContext {
    backend: Arc<dyn SessionBackend>,
    registry: TerminalRegistry,
    layouts: LayoutStore,
    notices: Mutex<Option<UnboundedReceiver<SessionNotice>>>,
}

impl MuxContext {
    /// Must run inside a tokio runtime; session creation spawns the
    /// output subscription task.
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        output: Arc<dyn OutputChannel>,
        factory: Arc<dyn RendererFactory>,
        config: Config,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend: backend.clone(),
            registry: TerminalRegistry::new(backend, output, factory, config, tx),
            layouts: LayoutStore::new(),
            notices: Mutex::new(Some(rx)),
        }
    }

    pub fn registry(&self) -> &TerminalRegistry {
        &self.registry
    }

    pub fn layouts(&self) -> &LayoutStore {
        &self.layouts
    }

    /// Hand the notice stream to the UI dispatcher. Single consumer;
    /// returns `None` once taken.
    pub fn take_notices(&self) -> Option<UnboundedReceiver<SessionNotice>> {
        self.notices.lock().take()
    }

    // --- Layout operations ---------------------------------------------

    /// Split a pane of `tab` and bind `new_session` (already spawned by
    /// the backend) to the fresh leaf. When the layout rejects the split
    /// the orphaned session is terminated here rather than leaking.
    pub fn split_pane(
        &self,
        tab: &SessionId,
        target: Option<PaneId>,
        direction: SplitDirection,
        new_session: SessionId,
    ) -> Option<PaneId> {
        match self.layouts.split(tab, target, direction, new_session.clone()) {
            Some(focused) => {
                self.registry.get_or_create(&new_session);
                Some(focused)
            }
            None => {
                tracing::debug!(%tab, %new_session, "split rejected, terminating orphaned session");
                self.registry.dispose(&new_session);
                self.backend.terminate(&new_session);
                None
            }
        }
    }

    /// Close a pane, terminating the session it released. Closing the
    /// last pane reports [`CloseOutcome::TabClosed`] so the caller can
    /// close the owning tab.
    pub fn close_pane(&self, tab: &SessionId, pane: PaneId) -> CloseOutcome {
        let outcome = self.layouts.close(tab, pane);
        let released = match &outcome {
            CloseOutcome::Closed { released, .. } => Some(released.clone()),
            CloseOutcome::TabClosed { released } => Some(released.clone()),
            CloseOutcome::NotFound => None,
        };
        if let Some(session) = released {
            self.registry.dispose(&session);
            self.backend.terminate(&session);
        }
        outcome
    }

    pub fn resize_split(&self, tab: &SessionId, split: PaneId, sizes: [f64; 2]) -> bool {
        self.layouts.resize(tab, split, sizes)
    }

    pub fn navigate(&self, tab: &SessionId, direction: NavigateDirection) -> Option<PaneId> {
        self.layouts.navigate(tab, direction)
    }

    pub fn focus_pane(&self, tab: &SessionId, pane: PaneId) -> bool {
        self.layouts.focus(tab, pane)
    }

    pub fn snapshot(&self, tab: &SessionId) -> Option<TabLayout> {
        self.layouts.snapshot(tab)
    }

    // --- Session operations --------------------------------------------

    pub fn attach(&self, session: &SessionId, container: Arc<dyn Container>) -> Arc<TerminalEntry> {
        self.registry.attach(session, container)
    }

    pub fn detach(&self, session: &SessionId, container: Option<ContainerId>) {
        self.registry.detach(session, container)
    }

    pub fn write_input(&self, session: &SessionId, bytes: &[u8]) {
        self.registry.write_input(session, bytes)
    }

    pub fn resize_pane(&self, session: &SessionId, size: TermSize) {
        if let Some(entry) = self.registry.get(session) {
            entry.resize(size);
        }
    }

    /// Dispose the session's terminal and terminate its process, outside
    /// of any layout (tab-level close of an unsplit tab).
    pub fn dispose_session(&self, session: &SessionId) {
        self.registry.dispose(session);
        self.backend.terminate(session);
    }

    /// Dispose every registry entry whose session is referenced neither
    /// by a layout nor by `unsplit_tabs` (open tabs that were never
    /// split still own one session each).
    pub fn reconcile(&self, unsplit_tabs: impl IntoIterator<Item = SessionId>) {
        let mut alive: FxHashSet<SessionId> = unsplit_tabs.into_iter().collect();
        self.layouts.collect_sessions(&mut alive);
        self.registry.reconcile(&alive);
    }

    pub fn apply_settings(&self, config: &Config) {
        self.registry.apply_settings(config);
    }

    /// Full teardown: every terminal disposed, every layout dropped.
    /// Backend processes are left to the backend's own shutdown path.
    pub fn teardown(&self) {
        self.registry.dispose_all();
        self.layouts.clear();
    }
}
