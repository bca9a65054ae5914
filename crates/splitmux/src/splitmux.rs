//! splitmux: terminal session multiplexing core.
//!
//! Ties the split-pane layout engine to the terminal session registry:
//! layouts say which sessions should exist and where they render,
//! the registry owns the emulator state behind each of them. The
//! embedding application supplies a [`SessionBackend`], an
//! [`OutputChannel`], containers to mount surfaces into, and a renderer
//! factory; everything else lives here.
//!
//! [`SessionBackend`]: session::SessionBackend
//! [`OutputChannel`]: session::OutputChannel

mod context;

pub use context::MuxContext;
pub use layout::{
    CloseOutcome, LayoutStore, NavigateDirection, PaneId, PaneNode, ResizeOutcome,
    SplitDirection, TabLayout,
};
pub use session::{
    Container, ContainerId, NullRendererFactory, OutputBatcher, OutputChannel,
    OutputSubscription, RenderSurface, RendererFactory, RendererMode, SessionBackend, SessionId,
    SessionNotice, SubscribeFuture, TermSize, TerminalEntry, TerminalRegistry,
};
pub use settings::{BellMode, Config, CursorStyle, RendererPreference};

/// Install the default tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("splitmux=info,warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .try_init();
}
