//! TOML config file support with live reload.
//!
//! Config location: `~/.config/splitmux/config.toml`

use crate::constants;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Cursor shape drawn by the terminal.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CursorStyle {
    #[default]
    Block,
    Bar,
    Underline,
}

/// How the terminal bell is surfaced.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BellMode {
    /// Bell events are dropped.
    None,
    /// Flash the pane (handled by the UI layer).
    #[default]
    Visual,
    /// Forward to the platform notification sound.
    System,
}

/// Preferred starting point in the renderer fallback chain.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RendererPreference {
    /// GPU when the probe allows it, otherwise fall through.
    #[default]
    Auto,
    Gpu,
    Software,
    Baseline,
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Terminal font family.
    pub font_family: String,
    /// Terminal font size in points.
    pub font_size: f32,
    /// Maximum number of scrollback lines.
    pub scrollback_lines: usize,
    /// Cursor shape.
    pub cursor_style: CursorStyle,
    /// Bell behavior.
    pub bell: BellMode,
    /// Renderer fallback chain entry point.
    pub renderer: RendererPreference,
    /// Background opacity (0.0–1.0). GPU rendering requires a fully
    /// opaque background.
    pub background_opacity: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_family: constants::terminal::FONT_FAMILY.to_string(),
            font_size: constants::terminal::DEFAULT_FONT_SIZE,
            scrollback_lines: constants::scrollback::DEFAULT_LINES,
            cursor_style: CursorStyle::default(),
            bell: BellMode::default(),
            renderer: RendererPreference::default(),
            background_opacity: 1.0,
        }
    }
}

impl Config {
    /// True when the configured background lets the GPU renderer run
    /// (transparency forces the software path).
    pub fn background_is_opaque(&self) -> bool {
        self.background_opacity >= 1.0
    }

    /// Clamp out-of-range values rather than rejecting the whole file.
    fn sanitize(mut self) -> Self {
        let font_range =
            constants::terminal::MIN_FONT_SIZE..=constants::terminal::MAX_FONT_SIZE;
        if !font_range.contains(&self.font_size) {
            tracing::warn!(size = self.font_size, "font-size out of range, clamping");
            self.font_size = self
                .font_size
                .clamp(*font_range.start(), *font_range.end());
        }
        if self.scrollback_lines > constants::scrollback::MAX_LINES {
            tracing::warn!(
                lines = self.scrollback_lines,
                "scrollback-lines above maximum, clamping"
            );
            self.scrollback_lines = constants::scrollback::MAX_LINES;
        }
        if self.font_family.len() > constants::settings::MAX_STRING_LENGTH {
            tracing::warn!("font-family name too long, using default");
            self.font_family = constants::terminal::FONT_FAMILY.to_string();
        }
        self.background_opacity = self.background_opacity.clamp(0.0, 1.0);
        self
    }
}

/// Default config file content with comments (generated on first launch).
const DEFAULT_CONFIG: &str = r#"# splitmux configuration
# Changes are applied live; just save this file.

# Terminal font family (any monospace font installed on your system)
font-family = "FONT_PLACEHOLDER"

# Terminal font size in points
font-size = 14

# Maximum scrollback buffer size (lines)
scrollback-lines = 10000

# Cursor shape: "block", "bar", or "underline"
cursor-style = "block"

# Bell behavior: "none", "visual", or "system"
bell = "visual"

# Renderer: "auto", "gpu", "software", or "baseline"
renderer = "auto"

# Background opacity (anything below 1.0 disables the GPU renderer)
background-opacity = 1.0
"#;

/// Path to the config file (`~/.config/splitmux/config.toml`).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("splitmux").join("config.toml"))
}

/// Write the commented default config if no file exists yet.
pub fn ensure_config_file() -> Option<PathBuf> {
    let path = config_path()?;
    if path.exists() {
        return Some(path);
    }
    if let Some(parent) = path.parent() {
        if let Err(error) = std::fs::create_dir_all(parent) {
            tracing::warn!(?parent, %error, "could not create config directory");
            return None;
        }
    }
    let contents =
        DEFAULT_CONFIG.replace("FONT_PLACEHOLDER", constants::terminal::FONT_FAMILY);
    if let Err(error) = std::fs::write(&path, contents) {
        tracing::warn!(?path, %error, "could not write default config");
        return None;
    }
    tracing::info!(?path, "wrote default config");
    Some(path)
}

/// Load the config file, falling back to defaults on any problem.
///
/// A malformed or oversized file never prevents startup; it logs a
/// warning and yields `Config::default()`.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    load_config_from(&path)
}

/// Load a config from an explicit path (used by tests).
pub fn load_config_from(path: &std::path::Path) -> Config {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > constants::settings::MAX_FILE_SIZE => {
            tracing::warn!(?path, size = meta.len(), "config file too large, ignoring");
            return Config::default();
        }
        Err(_) => return Config::default(),
        _ => {}
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            tracing::warn!(?path, %error, "could not read config file");
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&contents) {
        Ok(config) => config.sanitize(),
        Err(error) => {
            tracing::warn!(?path, %error, "config file is not valid TOML, using defaults");
            Config::default()
        }
    }
}

/// Watch the config file and invoke `on_apply` with the reloaded config
/// after each debounced change.
///
/// Returns the debouncer; dropping it stops the watch. Returns `None`
/// when the config path cannot be resolved or the watcher cannot start.
pub fn watch_config(
    on_apply: impl Fn(&Config) + Send + 'static,
) -> Option<notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>> {
    let path = ensure_config_file()?;
    let watched = path.clone();

    let mut debouncer = notify_debouncer_mini::new_debouncer(
        Duration::from_millis(250),
        move |result: notify_debouncer_mini::DebounceEventResult| match result {
            Ok(_events) => {
                let config = load_config_from(&watched);
                tracing::debug!("config reloaded");
                on_apply(&config);
            }
            Err(error) => tracing::warn!(%error, "config watch error"),
        },
    )
    .map_err(|error| tracing::warn!(%error, "could not start config watcher"))
    .ok()?;

    debouncer
        .watcher()
        .watch(&path, notify::RecursiveMode::NonRecursive)
        .map_err(|error| tracing::warn!(?path, %error, "could not watch config file"))
        .ok()?;

    Some(debouncer)
}
