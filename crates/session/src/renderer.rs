//! Renderer selection with runtime fallback.
//!
//! Each terminal entry carries a binding that starts as high in the
//! GPU → software → baseline chain as the platform probe, the user
//! preference, and the background opacity allow, and only ever moves
//! down the chain; a lost GPU context degrades visual performance,
//! never functionality.

use anyhow::Result;
use once_cell::sync::OnceCell;
use settings::RendererPreference;
use std::sync::Arc;

/// Active rendering path for one terminal instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererMode {
    /// GPU-accelerated addon.
    Gpu,
    /// Software-accelerated addon.
    Software,
    /// The terminal's built-in un-accelerated path; always available.
    Baseline,
}

/// The one-directional degradation step. Baseline is terminal.
pub fn next_fallback(mode: RendererMode) -> RendererMode {
    match mode {
        RendererMode::Gpu => RendererMode::Software,
        RendererMode::Software | RendererMode::Baseline => RendererMode::Baseline,
    }
}

/// Process-lifetime cache for the GPU capability probe.
///
/// Context creation is expensive and its outcome doesn't change while
/// the process runs, so factories probe once and remember.
pub struct ProbeCache {
    cell: OnceCell<bool>,
}

impl ProbeCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_probe(&self, probe: impl FnOnce() -> bool) -> bool {
        *self.cell.get_or_init(probe)
    }
}

impl Default for ProbeCache {
    fn default() -> Self {
        Self::new()
    }
}

/// An accelerated renderer attached to one terminal instance.
pub trait RendererAddon: Send {
    /// Release the addon's resources. Called at fallback and disposal.
    fn dispose(&mut self);
}

/// Optional capability addon (image rendering, ligature shaping).
///
/// Attached lazily on an entry's first real mount; each one is
/// independently fallible and a failure never affects the others.
pub trait CapabilityAddon: Send {
    fn name(&self) -> &str;
    fn attach(&mut self) -> Result<()>;
    fn dispose(&mut self);
}

/// Constructs renderer and capability addons for the host platform.
pub trait RendererFactory: Send + Sync {
    /// Whether a GPU context can be created at all. Implementations
    /// should cache the answer for the process lifetime (see
    /// [`ProbeCache`]).
    fn probe_gpu(&self) -> bool;

    /// Build the addon for `mode`. `Ok(None)` means the mode needs no
    /// addon (baseline). An `Err` moves the binding down the chain.
    fn create(&self, mode: RendererMode) -> Result<Option<Box<dyn RendererAddon>>>;

    /// Capability addons to try on first mount.
    fn capability_addons(&self) -> Vec<Box<dyn CapabilityAddon>> {
        Vec::new()
    }
}

/// Factory for headless use and tests: no GPU, no addons, baseline only.
pub struct NullRendererFactory;

impl RendererFactory for NullRendererFactory {
    fn probe_gpu(&self) -> bool {
        false
    }

    fn create(&self, _mode: RendererMode) -> Result<Option<Box<dyn RendererAddon>>> {
        Ok(None)
    }
}

/// The renderer state of one terminal entry.
pub struct RendererBinding {
    mode: RendererMode,
    addon: Option<Box<dyn RendererAddon>>,
    factory: Arc<dyn RendererFactory>,
}

impl RendererBinding {
    /// Pick the starting mode and construct its addon, falling back on
    /// construction failure.
    pub fn new(
        preference: RendererPreference,
        background_opaque: bool,
        factory: Arc<dyn RendererFactory>,
    ) -> Self {
        let start = initial_mode(preference, factory.probe_gpu(), background_opaque);
        let mut binding = Self {
            mode: RendererMode::Baseline,
            addon: None,
            factory,
        };
        binding.establish(start);
        binding
    }

    pub fn mode(&self) -> RendererMode {
        self.mode
    }

    /// React to a runtime context-loss event from the active renderer:
    /// tear it down and move one step down the chain.
    pub fn on_context_loss(&mut self) {
        if let Some(mut addon) = self.addon.take() {
            addon.dispose();
        }
        if self.mode == RendererMode::Baseline {
            return;
        }
        let next = next_fallback(self.mode);
        tracing::warn!(from = ?self.mode, to = ?next, "renderer context lost, degrading");
        self.establish(next);
    }

    /// Release the active addon. The binding stays usable as baseline.
    pub fn dispose(&mut self) {
        if let Some(mut addon) = self.addon.take() {
            addon.dispose();
        }
        self.mode = RendererMode::Baseline;
    }

    fn establish(&mut self, mut mode: RendererMode) {
        loop {
            match self.factory.create(mode) {
                Ok(addon) => {
                    self.mode = mode;
                    self.addon = addon;
                    return;
                }
                Err(error) => {
                    if mode == RendererMode::Baseline {
                        // Baseline needs no addon; a factory failing here
                        // is a bug in the factory.
                        util::debug_panic!("baseline renderer construction failed: {error}");
                        self.mode = RendererMode::Baseline;
                        self.addon = None;
                        return;
                    }
                    let next = next_fallback(mode);
                    tracing::warn!(
                        from = ?mode,
                        to = ?next,
                        %error,
                        "renderer construction failed, falling back"
                    );
                    mode = next;
                }
            }
        }
    }
}

fn initial_mode(
    preference: RendererPreference,
    gpu_available: bool,
    background_opaque: bool,
) -> RendererMode {
    match preference {
        RendererPreference::Baseline => RendererMode::Baseline,
        RendererPreference::Software => RendererMode::Software,
        RendererPreference::Auto | RendererPreference::Gpu => {
            if gpu_available && background_opaque {
                RendererMode::Gpu
            } else {
                RendererMode::Software
            }
        }
    }
}
