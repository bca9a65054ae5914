//! Centralized configuration constants for splitmux.
//!
//! Compile-time constants for the multiplexing core, organized by
//! component for maintainability.

/// Terminal configuration.
pub mod terminal {
    /// Default font size in points.
    pub const DEFAULT_FONT_SIZE: f32 = 14.0;
    /// Minimum allowed font size.
    pub const MIN_FONT_SIZE: f32 = 8.0;
    /// Maximum allowed font size.
    pub const MAX_FONT_SIZE: f32 = 32.0;

    /// Default monospace font family (macOS).
    /// Menlo is built-in on all macOS versions since 10.6.
    #[cfg(target_os = "macos")]
    pub const FONT_FAMILY: &str = "Menlo";

    /// Default monospace font family (Windows).
    /// Consolas is built-in on all Windows versions since Vista.
    #[cfg(target_os = "windows")]
    pub const FONT_FAMILY: &str = "Consolas";

    /// Default monospace font family (Linux and others).
    /// "monospace" is the generic family that always resolves to something.
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    pub const FONT_FAMILY: &str = "monospace";

    /// Default terminal grid width in columns.
    pub const DEFAULT_COLUMNS: usize = 80;
    /// Default terminal grid height in rows.
    pub const DEFAULT_ROWS: usize = 24;
}

/// Split-pane layout configuration.
pub mod split {
    /// Maximum depth of a terminal leaf in the pane tree (root = 0).
    /// Enforced at split time only.
    pub const MAX_SPLIT_DEPTH: usize = 4;

    /// Size assigned to each half of a fresh split, in percent.
    pub const DEFAULT_HALF: f64 = 50.0;

    /// The two children of a split always sum to this, in percent.
    pub const SIZE_TOTAL: f64 = 100.0;

    /// Resize deltas below this are ignored to avoid tree churn from
    /// floating-point jitter during continuous drag gestures.
    pub const RESIZE_EPSILON: f64 = 0.1;
}

/// Output coalescing configuration.
pub mod batcher {
    /// Chunks below this size are written straight through when nothing
    /// is queued, keeping single-keystroke echo latency-free.
    pub const IMMEDIATE_WRITE_LIMIT: usize = 4096;

    /// Initial capacity for a merged flush buffer (64KB covers most
    /// burst scenarios).
    pub const FLUSH_BUFFER_CAPACITY: usize = 65536;
}

/// Scrollback buffer configuration.
pub mod scrollback {
    /// Default scrollback buffer size in lines.
    pub const DEFAULT_LINES: usize = 10_000;
    /// Maximum allowed scrollback buffer size in lines.
    pub const MAX_LINES: usize = 100_000;
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    /// Settings files should be tiny; anything larger is suspicious.
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// Maximum length for string fields (theme name, font family).
    pub const MAX_STRING_LENGTH: usize = 256;
}
