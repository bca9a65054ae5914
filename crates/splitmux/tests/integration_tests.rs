//! End-to-end tests driving the multiplexer through its public surface:
//! a mock backend, a mock output channel, and mock containers stand in
//! for the embedding application.

use anyhow::Result;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use splitmux::{
    CloseOutcome, Config, Container, ContainerId, MuxContext, NavigateDirection,
    NullRendererFactory, OutputChannel, OutputSubscription, PaneNode, RenderSurface,
    SessionBackend, SessionId, SessionNotice, SplitDirection, SubscribeFuture,
};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct MockBackend {
    writes: Mutex<Vec<(SessionId, Vec<u8>)>>,
    terminated: Mutex<Vec<SessionId>>,
}

impl SessionBackend for MockBackend {
    fn write(&self, session: &SessionId, bytes: &[u8]) -> Result<()> {
        self.writes.lock().push((session.clone(), bytes.to_vec()));
        Ok(())
    }

    fn terminate(&self, session: &SessionId) {
        self.terminated.lock().push(session.clone());
    }
}

#[derive(Default)]
struct MockChannel {
    senders: Mutex<collections::FxHashMap<SessionId, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl MockChannel {
    fn emit(&self, session: &SessionId, bytes: &[u8]) {
        if let Some(sender) = self.senders.lock().get(session) {
            let _ = sender.send(bytes.to_vec());
        }
    }
}

impl OutputChannel for MockChannel {
    fn subscribe(&self, session: &SessionId) -> SubscribeFuture {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().insert(session.clone(), tx);
        Box::pin(async move { Ok(OutputSubscription { chunks: rx }) })
    }
}

struct MockContainer {
    id: ContainerId,
    mounted: Mutex<Option<SessionId>>,
}

impl MockContainer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ContainerId::new(),
            mounted: Mutex::new(None),
        })
    }

    fn mounted_session(&self) -> Option<SessionId> {
        self.mounted.lock().clone()
    }
}

impl Container for MockContainer {
    fn container_id(&self) -> ContainerId {
        self.id
    }

    fn mount(&self, surface: RenderSurface) {
        *self.mounted.lock() = Some(surface.session().clone());
    }

    fn clear(&self) {
        *self.mounted.lock() = None;
    }
}

struct Harness {
    mux: MuxContext,
    backend: Arc<MockBackend>,
    channel: Arc<MockChannel>,
}

fn harness() -> Harness {
    let backend = Arc::new(MockBackend::default());
    let channel = Arc::new(MockChannel::default());
    let mux = MuxContext::new(
        backend.clone(),
        channel.clone(),
        Arc::new(NullRendererFactory),
        Config::default(),
    );
    Harness {
        mux,
        backend,
        channel,
    }
}

async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

fn tab() -> SessionId {
    "tab-1".into()
}

#[tokio::test]
async fn first_split_builds_a_half_half_layout() {
    let h = harness();
    let focused = h
        .mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .expect("split should succeed");

    let layout = h.mux.snapshot(&tab()).unwrap();
    assert_eq!(layout.focused, focused);
    let PaneNode::Split {
        direction,
        children,
        sizes,
        ..
    } = &layout.root
    else {
        panic!("root should be a split");
    };
    assert_eq!(*direction, SplitDirection::Horizontal);
    assert_eq!(*sizes, [50.0, 50.0]);
    let PaneNode::Terminal { session, .. } = &children[0] else {
        panic!("first child should carry the tab's own session");
    };
    assert_eq!(session, &tab());

    // The fresh session got a live terminal entry
    assert!(h.mux.registry().get(&"b".into()).is_some());
}

#[tokio::test]
async fn nested_split_lands_at_depth_two() {
    let h = harness();
    let b = h
        .mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .unwrap();
    let c = h
        .mux
        .split_pane(&tab(), Some(b), SplitDirection::Vertical, "c".into())
        .unwrap();

    let layout = h.mux.snapshot(&tab()).unwrap();
    assert_eq!(layout.focused, c);
    assert_eq!(layout.root.depth_of(c), Some(2));
    assert_eq!(layout.root.terminal_count(), 3);
}

#[tokio::test]
async fn rejected_split_terminates_the_orphaned_session() {
    let h = harness();
    h.mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .unwrap();

    // Target id that exists in no layout
    let bogus = splitmux::PaneId::new();
    let result = h
        .mux
        .split_pane(&tab(), Some(bogus), SplitDirection::Vertical, "orphan".into());

    assert_eq!(result, None);
    assert_eq!(h.backend.terminated.lock().as_slice(), &["orphan".into()]);
    assert!(h.mux.registry().get(&"orphan".into()).is_none());
}

#[tokio::test]
async fn closing_a_pane_promotes_its_sibling_and_kills_the_session() {
    let h = harness();
    // [a | [b / c]]
    let b = h
        .mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .unwrap();
    h.mux
        .split_pane(&tab(), Some(b), SplitDirection::Vertical, "c".into())
        .unwrap();

    let layout = h.mux.snapshot(&tab()).unwrap();
    let a = layout.root.first_terminal();
    let outcome = h.mux.close_pane(&tab(), a);

    let CloseOutcome::Closed { released, focused } = outcome else {
        panic!("expected Closed, got {outcome:?}");
    };
    assert_eq!(released, tab());
    assert_eq!(focused, b, "focus lands on the promoted subtree's first terminal");
    assert_eq!(h.backend.terminated.lock().as_slice(), &[tab()]);

    // The promoted vertical split is now the root
    let layout = h.mux.snapshot(&tab()).unwrap();
    let PaneNode::Split { direction, .. } = &layout.root else {
        panic!("promoted subtree should be a split");
    };
    assert_eq!(*direction, SplitDirection::Vertical);
}

#[tokio::test]
async fn closing_the_last_pane_closes_the_tab() {
    let h = harness();
    let b = h
        .mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .unwrap();
    h.mux.close_pane(&tab(), b);

    let last = h.mux.snapshot(&tab()).unwrap().root.id();
    let outcome = h.mux.close_pane(&tab(), last);
    assert_eq!(outcome, CloseOutcome::TabClosed { released: tab() });
    assert_eq!(h.mux.snapshot(&tab()), None);
    assert_eq!(
        h.backend.terminated.lock().as_slice(),
        &["b".into(), tab()]
    );
}

#[tokio::test]
async fn navigation_at_the_edge_keeps_focus() {
    let h = harness();
    let b = h
        .mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .unwrap();

    assert_eq!(h.mux.navigate(&tab(), NavigateDirection::Right), Some(b));
    assert_eq!(h.mux.navigate(&tab(), NavigateDirection::Up), Some(b));

    let a = h.mux.snapshot(&tab()).unwrap().root.first_terminal();
    assert_eq!(h.mux.navigate(&tab(), NavigateDirection::Left), Some(a));
    assert_eq!(h.mux.snapshot(&tab()).unwrap().focused, a);
}

#[tokio::test]
async fn reconcile_disposes_sessions_no_layout_references() {
    let h = harness();
    h.mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .unwrap();
    // A session created outside any layout (stale leftover)
    h.mux.registry().get_or_create(&"stale".into());
    // An unsplit tab with its own session
    let plain: SessionId = "tab-2".into();
    h.mux.registry().get_or_create(&plain);

    h.mux.reconcile([plain.clone()]);

    let mut alive = h.mux.registry().sessions();
    alive.sort();
    assert_eq!(alive, vec!["b".into(), plain, tab()]);
}

#[tokio::test]
async fn output_reaches_an_attached_pane() {
    let h = harness();
    h.mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .unwrap();
    let home = MockContainer::new();
    let entry = h.mux.attach(&"b".into(), home.clone());
    settle().await;

    assert_eq!(home.mounted_session(), Some("b".into()));

    h.channel.emit(&"b".into(), b"hi");
    settle().await;

    let text = entry.surface().with_term(|term| {
        use session::alacritty_terminal::index::{Column, Line};
        let grid = term.grid();
        [grid[Line(0)][Column(0)].c, grid[Line(0)][Column(1)].c]
    });
    assert_eq!(text, ['h', 'i']);
}

#[tokio::test]
async fn burst_output_arrives_in_order() {
    let h = harness();
    let id: SessionId = "s".into();
    h.mux.registry().get_or_create(&id);
    settle().await;

    // Small chunk takes the immediate path, the rest coalesce behind it
    h.channel.emit(&id, b"ab");
    let big = vec![b'x'; 10_000];
    h.channel.emit(&id, &big);
    h.channel.emit(&id, b"cd");
    settle().await;

    let entry = h.mux.registry().get(&id).unwrap();
    let (first, second) = entry.surface().with_term(|term| {
        use session::alacritty_terminal::index::{Column, Line};
        let grid = term.grid();
        (grid[Line(0)][Column(0)].c, grid[Line(0)][Column(1)].c)
    });
    assert_eq!((first, second), ('a', 'b'));
}

#[tokio::test]
async fn title_changes_flow_out_as_notices() {
    let h = harness();
    let mut notices = h.mux.take_notices().expect("first take yields the stream");
    assert!(h.mux.take_notices().is_none(), "single consumer");

    let id: SessionId = "s".into();
    h.mux.registry().get_or_create(&id);
    settle().await;

    h.channel.emit(&id, b"\x1b]2;build ok\x07");
    settle().await;

    let mut seen_title = false;
    while let Ok(notice) = notices.try_recv() {
        if let SessionNotice::TitleChanged { session, title } = notice {
            assert_eq!(session, id);
            assert_eq!(title, "build ok");
            seen_title = true;
        }
    }
    assert!(seen_title, "expected a TitleChanged notice");
}

#[tokio::test]
async fn input_and_settings_round_through_the_context() {
    let h = harness();
    let id: SessionId = "s".into();
    h.mux.registry().get_or_create(&id);

    h.mux.write_input(&id, b"ls\n");
    assert_eq!(
        h.backend.writes.lock().as_slice(),
        &[(id.clone(), b"ls\n".to_vec())]
    );

    let mut config = Config::default();
    config.scrollback_lines = 2_000;
    h.mux.apply_settings(&config);
    assert!(!h.mux.registry().get(&id).unwrap().is_disposed());
}

#[tokio::test]
async fn settings_load_from_disk_and_apply() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "font-size = 18\nscrollback-lines = 5000\nbell = \"system\"\n",
    )
    .unwrap();

    let config = settings::file::load_config_from(&path);
    assert_eq!(config.font_size, 18.0);
    assert_eq!(config.scrollback_lines, 5000);

    h.mux.apply_settings(&config);
}

#[tokio::test]
async fn teardown_disposes_everything() {
    let h = harness();
    h.mux
        .split_pane(&tab(), None, SplitDirection::Horizontal, "b".into())
        .unwrap();
    let entry = h.mux.registry().get(&"b".into()).unwrap();

    h.mux.teardown();

    assert!(h.mux.registry().is_empty());
    assert!(entry.is_disposed());
    assert_eq!(h.mux.snapshot(&tab()), None);
}
