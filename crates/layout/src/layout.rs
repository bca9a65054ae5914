//! Split-pane layout engine for splitmux.
//!
//! A binary tree of panes per tab, plus the store that owns one tree and
//! focus pointer per tab and broadcasts snapshots on every change. Pure
//! data structure logic; no rendering, no terminal state.

mod pane_tree;
mod store;

pub use pane_tree::{
    NavigateDirection, PaneId, PaneNode, ResizeOutcome, SplitDirection,
};
pub use store::{CloseOutcome, LayoutStore, TabLayout};
