//! Binary pane tree and its mutation algorithms.
//!
//! Leaves host one terminal session each; internal nodes split their
//! area between exactly two ordered children. Mutations replace nodes
//! structurally (find by id, rewrite in place) so every operation is
//! atomic from the caller's perspective; no half-updated tree is ever
//! observable.
//!
//! ```text
//! Split (Horizontal)
//! ├── Terminal (session A)
//! └── Split (Vertical)
//!     ├── Terminal (session B)
//!     └── Terminal (session C)
//! ```

use collections::FxHashSet;
use session::SessionId;
use settings::constants::split::{DEFAULT_HALF, MAX_SPLIT_DEPTH, RESIZE_EPSILON, SIZE_TOTAL};
use std::fmt;
use uuid::Uuid;

/// Identifier for a position in a layout tree. Lives in its own
/// namespace: a pane id never collides with a session id, and split
/// nodes draw from the same id space as leaves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneId(Uuid);

impl PaneId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaneId({})", self.0)
    }
}

/// Direction of a split between two panes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitDirection {
    /// Side-by-side (left | right)
    Horizontal,
    /// Stacked (top / bottom)
    Vertical,
}

/// Direction of a focus movement request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigateDirection {
    Left,
    Right,
    Up,
    Down,
}

impl NavigateDirection {
    /// The split axis this movement crosses.
    fn axis(self) -> SplitDirection {
        match self {
            Self::Left | Self::Right => SplitDirection::Horizontal,
            Self::Up | Self::Down => SplitDirection::Vertical,
        }
    }

    /// True for movements toward the second child (right/down).
    fn forward(self) -> bool {
        matches!(self, Self::Right | Self::Down)
    }
}

/// Result of a resize request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Sizes were updated.
    Applied,
    /// The request was within jitter tolerance of the current sizes;
    /// the tree is untouched so observers see no churn mid-drag.
    Unchanged,
    /// Unknown split id or sizes that don't sum to 100.
    Rejected,
}

/// A pane tree node; either a terminal leaf or a split with exactly
/// two children whose percentage sizes always sum to 100.
#[derive(Clone, Debug, PartialEq)]
pub enum PaneNode {
    Terminal {
        id: PaneId,
        session: SessionId,
    },
    Split {
        id: PaneId,
        direction: SplitDirection,
        children: Box<[PaneNode; 2]>,
        sizes: [f64; 2],
    },
}

impl PaneNode {
    /// A fresh leaf bound to `session` for its lifetime.
    pub fn new_terminal(session: SessionId) -> Self {
        Self::Terminal {
            id: PaneId::new(),
            session,
        }
    }

    pub fn id(&self) -> PaneId {
        match self {
            Self::Terminal { id, .. } | Self::Split { id, .. } => *id,
        }
    }

    /// Replace the leaf `target` with a 50/50 split of it and a fresh
    /// leaf bound to `session`; the new leaf takes focus.
    ///
    /// Rejected (`None`, tree unchanged) when `target` is missing, is a
    /// split node, or already sits at the maximum depth. Callers that
    /// provisioned `session` up front own its disposal on rejection.
    pub fn split(
        &mut self,
        target: PaneId,
        direction: SplitDirection,
        session: SessionId,
    ) -> Option<PaneId> {
        match self.depth_of(target) {
            Some(depth) if depth < MAX_SPLIT_DEPTH => {}
            Some(_) => {
                tracing::debug!(?target, "split rejected: pane at maximum depth");
                return None;
            }
            None => return None,
        }
        self.replace_with_split(target, direction, session)
    }

    fn replace_with_split(
        &mut self,
        target: PaneId,
        direction: SplitDirection,
        session: SessionId,
    ) -> Option<PaneId> {
        match self {
            Self::Terminal { id, session: existing } if *id == target => {
                let kept = Self::Terminal {
                    id: *id,
                    session: existing.clone(),
                };
                let new_id = PaneId::new();
                let added = Self::Terminal {
                    id: new_id,
                    session,
                };
                *self = Self::Split {
                    id: PaneId::new(),
                    direction,
                    children: Box::new([kept, added]),
                    sizes: [DEFAULT_HALF, DEFAULT_HALF],
                };
                Some(new_id)
            }
            Self::Terminal { .. } => None,
            Self::Split { children, .. } => {
                let [first, second] = children.as_mut();
                first
                    .replace_with_split(target, direction, session.clone())
                    .or_else(|| second.replace_with_split(target, direction, session))
            }
        }
    }

    /// Remove the leaf `target`, promoting its sibling subtree into the
    /// parent's place. Returns the released session and the new focus
    /// (first-terminal descent of the promoted subtree).
    ///
    /// The sole root leaf cannot be removed here; [`TabLayout`] handles
    /// that case by dropping the whole layout.
    ///
    /// [`TabLayout`]: crate::store::TabLayout
    pub(crate) fn remove(&mut self, target: PaneId) -> Option<(SessionId, PaneId)> {
        match self {
            Self::Terminal { .. } => None,
            Self::Split { children, .. } => {
                for index in 0..2 {
                    if let Self::Terminal { id, session } = &children[index] {
                        if *id == target {
                            let released = session.clone();
                            let promoted = children[1 - index].clone();
                            let focus = promoted.first_terminal();
                            *self = promoted;
                            return Some((released, focus));
                        }
                    }
                }
                let [first, second] = children.as_mut();
                first.remove(target).or_else(|| second.remove(target))
            }
        }
    }

    /// Update a split's child sizes. Shape and ids never change.
    pub fn resize(&mut self, target: PaneId, new_sizes: [f64; 2]) -> ResizeOutcome {
        if (new_sizes[0] + new_sizes[1] - SIZE_TOTAL).abs() > RESIZE_EPSILON {
            tracing::debug!(?target, ?new_sizes, "resize rejected: sizes don't sum to 100");
            return ResizeOutcome::Rejected;
        }
        match self {
            Self::Terminal { .. } => ResizeOutcome::Rejected,
            Self::Split { id, sizes, children, .. } => {
                if *id == target {
                    let jitter = (new_sizes[0] - sizes[0]).abs() < RESIZE_EPSILON
                        && (new_sizes[1] - sizes[1]).abs() < RESIZE_EPSILON;
                    if jitter {
                        return ResizeOutcome::Unchanged;
                    }
                    *sizes = new_sizes;
                    return ResizeOutcome::Applied;
                }
                let [first, second] = children.as_mut();
                match first.resize(target, new_sizes) {
                    ResizeOutcome::Rejected => second.resize(target, new_sizes),
                    outcome => outcome,
                }
            }
        }
    }

    /// Move focus from `focused` one pane along `direction`.
    ///
    /// Walks the ancestor path innermost-first: the nearest split on the
    /// right axis that was entered from the near side decides, so moving
    /// "right" lands in the visually adjacent pane rather than jumping
    /// across unrelated splits. Returns the focused id itself at a grid
    /// edge (a normal boundary, not an error) and `None` for ids that
    /// don't resolve to a leaf.
    pub fn navigate(&self, focused: PaneId, direction: NavigateDirection) -> Option<PaneId> {
        let mut path = Vec::new();
        if !self.collect_path(focused, &mut path) {
            return None;
        }
        let axis = direction.axis();
        let target_index = usize::from(direction.forward());

        for (node, entered_via) in path.iter().rev() {
            if let Self::Split {
                direction: split_direction,
                children,
                ..
            } = node
            {
                if *split_direction == axis && *entered_via != target_index {
                    let sibling = &children[target_index];
                    let landing = if direction.forward() {
                        sibling.first_terminal()
                    } else {
                        sibling.last_terminal()
                    };
                    return Some(landing);
                }
            }
        }
        Some(focused)
    }

    /// Root-to-leaf ancestor path as (split node, child index descended
    /// into). True when `target` is a terminal leaf of this subtree.
    fn collect_path<'a>(
        &'a self,
        target: PaneId,
        path: &mut Vec<(&'a PaneNode, usize)>,
    ) -> bool {
        match self {
            Self::Terminal { id, .. } => *id == target,
            Self::Split { children, .. } => {
                for index in 0..2 {
                    path.push((self, index));
                    if children[index].collect_path(target, path) {
                        return true;
                    }
                    path.pop();
                }
                false
            }
        }
    }

    /// Leftmost/topmost leaf: always descend into child 0.
    pub fn first_terminal(&self) -> PaneId {
        match self {
            Self::Terminal { id, .. } => *id,
            Self::Split { children, .. } => children[0].first_terminal(),
        }
    }

    /// Rightmost/bottommost leaf: always descend into child 1.
    pub fn last_terminal(&self) -> PaneId {
        match self {
            Self::Terminal { id, .. } => *id,
            Self::Split { children, .. } => children[1].last_terminal(),
        }
    }

    pub fn find(&self, target: PaneId) -> Option<&PaneNode> {
        match self {
            Self::Terminal { id, .. } if *id == target => Some(self),
            Self::Terminal { .. } => None,
            Self::Split { id, children, .. } => {
                if *id == target {
                    return Some(self);
                }
                children[0].find(target).or_else(|| children[1].find(target))
            }
        }
    }

    /// Depth of the node `target` (root = 0).
    pub fn depth_of(&self, target: PaneId) -> Option<usize> {
        self.depth_from(target, 0)
    }

    fn depth_from(&self, target: PaneId, depth: usize) -> Option<usize> {
        if self.id() == target {
            return Some(depth);
        }
        match self {
            Self::Terminal { .. } => None,
            Self::Split { children, .. } => children[0]
                .depth_from(target, depth + 1)
                .or_else(|| children[1].depth_from(target, depth + 1)),
        }
    }

    /// Collect every leaf's session into `out`.
    pub fn sessions(&self, out: &mut FxHashSet<SessionId>) {
        match self {
            Self::Terminal { session, .. } => {
                out.insert(session.clone());
            }
            Self::Split { children, .. } => {
                children[0].sessions(out);
                children[1].sessions(out);
            }
        }
    }

    pub fn terminal_count(&self) -> usize {
        match self {
            Self::Terminal { .. } => 1,
            Self::Split { children, .. } => {
                children[0].terminal_count() + children[1].terminal_count()
            }
        }
    }

    pub fn split_count(&self) -> usize {
        match self {
            Self::Terminal { .. } => 0,
            Self::Split { children, .. } => {
                1 + children[0].split_count() + children[1].split_count()
            }
        }
    }
}
