//! Per-session terminal ownership and lifecycle.
//!
//! One [`TerminalEntry`] per backend session owns the emulator instance,
//! its renderer binding, and its output batcher. Entries survive UI
//! attach/detach cycles (panes are torn down and recreated freely while
//! the shell keeps running) and die only through explicit disposal or
//! reconciliation against the set of sessions still referenced by a
//! layout.

use crate::batcher::{OutputBatcher, WriteSink};
use crate::renderer::{CapabilityAddon, RendererBinding, RendererFactory, RendererMode};
use crate::types::{
    ContainerId, OutputChannel, SessionBackend, SessionId, SessionNotice, TermSize,
};
use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::term::{Config as TermConfig, Term};
use alacritty_terminal::vte::ansi::Processor;
use collections::FxHashSet;
use parking_lot::Mutex;
use settings::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Minimum interval between Activity notices for one session.
/// Keeps a flood from turning into a notice storm; the UI only needs
/// "something happened recently".
const ACTIVITY_NOTIFY_INTERVAL: Duration = Duration::from_millis(100);

/// A mount target provided by the UI layer.
///
/// A container holds at most one render surface at a time; the registry
/// detaches a previous occupant before mounting a new one.
pub trait Container: Send + Sync {
    fn container_id(&self) -> ContainerId;

    /// Place the surface into this container. Re-mounting an already
    /// mounted surface elsewhere must move it, not copy it.
    fn mount(&self, surface: RenderSurface);

    /// Remove whatever this container currently shows.
    fn clear(&self);
}

/// Cloneable read handle onto one session's terminal state.
///
/// The UI borrows the emulator only for the duration of a render pass;
/// ownership stays with the registry entry.
#[derive(Clone)]
pub struct RenderSurface {
    session: SessionId,
    term: Arc<Mutex<Term<EventProxy>>>,
}

impl RenderSurface {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Run `f` with the terminal locked. Keep the closure short; output
    /// parsing blocks on the same lock.
    pub fn with_term<R>(&self, f: impl FnOnce(&Term<EventProxy>) -> R) -> R {
        f(&self.term.lock())
    }
}

/// Forwards emulator events outward as one-way notices.
///
/// Handlers must not mutate the owning entry: they run inside
/// `Processor::advance` while the terminal lock is held.
pub struct EventProxy {
    session: SessionId,
    notices: UnboundedSender<SessionNotice>,
    backend: Arc<dyn SessionBackend>,
    config: Arc<Mutex<Config>>,
}

impl EventListener for EventProxy {
    fn send_event(&self, event: Event) {
        match event {
            Event::Title(title) => {
                let _ = self.notices.send(SessionNotice::TitleChanged {
                    session: self.session.clone(),
                    title,
                });
            }
            Event::ResetTitle => {
                let _ = self.notices.send(SessionNotice::TitleReset {
                    session: self.session.clone(),
                });
            }
            Event::Bell => {
                let mode = self.config.lock().bell;
                let _ = self.notices.send(SessionNotice::Bell {
                    session: self.session.clone(),
                    mode,
                });
            }
            Event::PtyWrite(text) => {
                // Query responses (cursor position reports, color
                // queries) go straight back to the shell
                if let Err(error) = self.backend.write(&self.session, text.as_bytes()) {
                    tracing::warn!(session = %self.session, %error, "query response write failed");
                }
            }
            _ => {}
        }
    }
}

/// Writes coalesced output into the terminal emulator.
struct TermSink {
    session: SessionId,
    term: Arc<Mutex<Term<EventProxy>>>,
    processor: Processor,
    disposed: Arc<AtomicBool>,
    last_activity: Arc<Mutex<Instant>>,
    last_notice: Instant,
    notices: UnboundedSender<SessionNotice>,
}

impl WriteSink for TermSink {
    fn write(&mut self, bytes: &[u8]) {
        // A flush can land after disposal; the write target is gone
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut term = self.term.lock();
            self.processor.advance(&mut *term, bytes);
        }
        let now = Instant::now();
        *self.last_activity.lock() = now;
        if now.duration_since(self.last_notice) >= ACTIVITY_NOTIFY_INTERVAL {
            self.last_notice = now;
            let _ = self.notices.send(SessionNotice::Activity {
                session: self.session.clone(),
            });
        }
    }
}

/// The registry's owned bundle for one session: emulator, renderer,
/// batcher, container binding.
pub struct TerminalEntry {
    session: SessionId,
    term: Arc<Mutex<Term<EventProxy>>>,
    batcher: OutputBatcher,
    renderer: Mutex<RendererBinding>,
    capabilities: Mutex<Vec<Box<dyn CapabilityAddon>>>,
    bound: Mutex<Option<Arc<dyn Container>>>,
    ever_mounted: AtomicBool,
    disposed: Arc<AtomicBool>,
    last_activity: Arc<Mutex<Instant>>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalEntry {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn surface(&self) -> RenderSurface {
        RenderSurface {
            session: self.session.clone(),
            term: self.term.clone(),
        }
    }

    pub fn batcher(&self) -> &OutputBatcher {
        &self.batcher
    }

    pub fn renderer_mode(&self) -> RendererMode {
        self.renderer.lock().mode()
    }

    /// Runtime context-loss signal from the active renderer.
    pub fn handle_context_loss(&self) {
        if self.is_disposed() {
            return;
        }
        self.renderer.lock().on_context_loss();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn attached_container(&self) -> Option<ContainerId> {
        self.bound.lock().as_ref().map(|c| c.container_id())
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// Resize the terminal grid. Callers invoke this after container
    /// layout has settled (post-paint), not mid-layout.
    pub fn resize(&self, size: TermSize) {
        if self.is_disposed() {
            return;
        }
        self.term.lock().resize(size);
    }

    fn bind(&self, container: Arc<dyn Container>) {
        {
            let mut bound = self.bound.lock();
            if let Some(previous) = bound.take() {
                // Re-parent: the surface moves, the emulator survives
                previous.clear();
            }
            container.mount(self.surface());
            *bound = Some(container);
        }
        self.attach_capabilities_once();
    }

    fn unbind(&self, container: Option<ContainerId>) {
        let mut bound = self.bound.lock();
        let matches = match (&*bound, container) {
            (Some(current), Some(id)) => current.container_id() == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            if let Some(current) = bound.take() {
                current.clear();
            }
        }
    }

    /// First real mount lazily attaches capability addons; each failure
    /// is logged and skipped without affecting the rest of the entry.
    fn attach_capabilities_once(&self) {
        if self.ever_mounted.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut attached = self.capabilities.lock();
        attached.retain_mut(|addon| match addon.attach() {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    session = %self.session,
                    addon = addon.name(),
                    %error,
                    "capability addon failed to attach"
                );
                false
            }
        });
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.subscription.lock().take() {
            // Cancels a still-pending subscribe as well as a live stream
            task.abort();
        }
        {
            let mut capabilities = self.capabilities.lock();
            for addon in capabilities.iter_mut() {
                addon.dispose();
            }
            capabilities.clear();
        }
        self.renderer.lock().dispose();
        if let Some(container) = self.bound.lock().take() {
            container.clear();
        }
        tracing::debug!(session = %self.session, "terminal entry disposed");
    }
}

/// All live terminal entries, keyed by session id.
///
/// Methods that create entries must run inside a tokio runtime; the
/// output subscription is registered on a spawned task.
pub struct TerminalRegistry {
    entries: Mutex<collections::FxHashMap<SessionId, Arc<TerminalEntry>>>,
    backend: Arc<dyn SessionBackend>,
    output: Arc<dyn OutputChannel>,
    factory: Arc<dyn RendererFactory>,
    config: Arc<Mutex<Config>>,
    notices: UnboundedSender<SessionNotice>,
}

impl TerminalRegistry {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        output: Arc<dyn OutputChannel>,
        factory: Arc<dyn RendererFactory>,
        config: Config,
        notices: UnboundedSender<SessionNotice>,
    ) -> Self {
        Self {
            entries: Mutex::new(collections::FxHashMap::default()),
            backend,
            output,
            factory,
            config: Arc::new(Mutex::new(config)),
            notices,
        }
    }

    /// The only place a terminal instance for a session is created.
    /// Idempotent: a live entry is returned unchanged.
    pub fn get_or_create(&self, session: &SessionId) -> Arc<TerminalEntry> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(session) {
            if !existing.is_disposed() {
                return existing.clone();
            }
        }

        let entry = self.create_entry(session);
        entries.insert(session.clone(), entry.clone());
        entry
    }

    pub fn get(&self, session: &SessionId) -> Option<Arc<TerminalEntry>> {
        self.entries.lock().get(session).cloned()
    }

    /// Bind the session's render surface into `container`, creating the
    /// entry if needed. Idempotent per container; moving to a new
    /// container preserves scrollback, cursor, and renderer state.
    pub fn attach(
        &self,
        session: &SessionId,
        container: Arc<dyn Container>,
    ) -> Arc<TerminalEntry> {
        let entry = self.get_or_create(session);
        let target = container.container_id();
        if entry.attached_container() == Some(target) {
            return entry;
        }

        // One entry per container: evict any other occupant first
        let conflicting: Vec<Arc<TerminalEntry>> = {
            let entries = self.entries.lock();
            entries
                .values()
                .filter(|other| {
                    other.session != *session && other.attached_container() == Some(target)
                })
                .cloned()
                .collect()
        };
        for other in conflicting {
            other.unbind(Some(target));
        }

        entry.bind(container);
        entry
    }

    /// Unbind the entry from its container (when `container` matches, or
    /// unconditionally when omitted). The entry and its session survive.
    pub fn detach(&self, session: &SessionId, container: Option<ContainerId>) {
        if let Some(entry) = self.get(session) {
            entry.unbind(container);
        }
    }

    /// Tear down the session's entry. Idempotent, and safe even if the
    /// entry was never attached.
    pub fn dispose(&self, session: &SessionId) {
        let removed = self.entries.lock().remove(session);
        if let Some(entry) = removed {
            entry.dispose();
        }
    }

    /// Dispose every entry whose session is not in `alive`. Detached or
    /// invisible entries inside `alive` are left untouched; their
    /// backend processes keep running in the background.
    pub fn reconcile(&self, alive: &FxHashSet<SessionId>) {
        let stale: Vec<Arc<TerminalEntry>> = {
            let mut entries = self.entries.lock();
            let stale_ids: Vec<SessionId> = entries
                .keys()
                .filter(|id| !alive.contains(*id))
                .cloned()
                .collect();
            stale_ids
                .iter()
                .filter_map(|id| entries.remove(id))
                .collect()
        };
        for entry in &stale {
            entry.dispose();
        }
        if !stale.is_empty() {
            tracing::debug!(disposed = stale.len(), "reconciled terminal registry");
        }
    }

    /// Forward input bytes to the backend. Failures are logged and
    /// swallowed: a lost keystroke is visible and re-typeable, and a
    /// broken backend reports itself through its own channels.
    pub fn write_input(&self, session: &SessionId, bytes: &[u8]) {
        if let Err(error) = self.backend.write(session, bytes) {
            tracing::warn!(session = %session, %error, "input write failed");
        }
    }

    /// Re-apply a changed configuration to all live entries.
    pub fn apply_settings(&self, config: &Config) {
        *self.config.lock() = config.clone();
        let entries: Vec<Arc<TerminalEntry>> = self.entries.lock().values().cloned().collect();
        let options = term_options(config);
        for entry in entries {
            if entry.is_disposed() {
                continue;
            }
            entry.term.lock().set_options(options.clone());
        }
        tracing::debug!("settings re-applied to {} entries", self.len());
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Teardown: dispose everything.
    pub fn dispose_all(&self) {
        let all: Vec<Arc<TerminalEntry>> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        for entry in all {
            entry.dispose();
        }
    }

    fn create_entry(&self, session: &SessionId) -> Arc<TerminalEntry> {
        let config = self.config.lock().clone();

        let proxy = EventProxy {
            session: session.clone(),
            notices: self.notices.clone(),
            backend: self.backend.clone(),
            config: self.config.clone(),
        };
        let term = Arc::new(Mutex::new(Term::new(
            term_options(&config),
            &TermSize::default(),
            proxy,
        )));

        let disposed = Arc::new(AtomicBool::new(false));
        let last_activity = Arc::new(Mutex::new(Instant::now()));

        let sink = TermSink {
            session: session.clone(),
            term: term.clone(),
            processor: Processor::new(),
            disposed: disposed.clone(),
            last_activity: last_activity.clone(),
            last_notice: Instant::now() - ACTIVITY_NOTIFY_INTERVAL,
            notices: self.notices.clone(),
        };
        let batcher = OutputBatcher::new(Box::new(sink));

        let renderer = RendererBinding::new(
            config.renderer,
            config.background_is_opaque(),
            self.factory.clone(),
        );

        let entry = Arc::new(TerminalEntry {
            session: session.clone(),
            term,
            batcher: batcher.clone(),
            renderer: Mutex::new(renderer),
            capabilities: Mutex::new(self.factory.capability_addons()),
            bound: Mutex::new(None),
            ever_mounted: AtomicBool::new(false),
            disposed: disposed.clone(),
            last_activity,
            subscription: Mutex::new(None),
        });

        // Subscribe asynchronously; every resumption re-checks disposal
        // because the entry may die while the registration is in flight
        let output = self.output.clone();
        let id = session.clone();
        let task = tokio::spawn(async move {
            let subscription = match output.subscribe(&id).await {
                Ok(subscription) => subscription,
                Err(error) => {
                    tracing::warn!(session = %id, %error, "output subscription failed");
                    return;
                }
            };
            if disposed.load(Ordering::Acquire) {
                // Resolved after disposal: cancel by dropping
                return;
            }
            let mut chunks = subscription.chunks;
            while let Some(chunk) = chunks.recv().await {
                if disposed.load(Ordering::Acquire) {
                    break;
                }
                batcher.push(chunk);
            }
        });
        entry.subscription.lock().replace(task);

        tracing::debug!(session = %session, renderer = ?entry.renderer_mode(), "terminal entry created");
        entry
    }
}

fn term_options(config: &Config) -> TermConfig {
    let mut options = TermConfig::default();
    options.scrolling_history = config.scrollback_lines;
    options
}
