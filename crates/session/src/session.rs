//! Terminal session registry core.
//!
//! Owns one terminal emulator instance per backend session, couples it to
//! the session's asynchronous output stream, and keeps it alive across UI
//! attach/detach cycles. This crate contains no rendering or PTY-spawning
//! code; backends and mount targets are traits implemented by the
//! surrounding application.

pub use alacritty_terminal;

mod batcher;
mod registry;
mod renderer;
pub mod types;

pub use batcher::{OutputBatcher, WriteSink};
pub use registry::{Container, EventProxy, RenderSurface, TerminalEntry, TerminalRegistry};
pub use renderer::{
    next_fallback, CapabilityAddon, NullRendererFactory, ProbeCache, RendererAddon,
    RendererBinding, RendererFactory, RendererMode,
};
pub use types::*;
