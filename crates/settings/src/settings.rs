//! Configuration system for splitmux.
//!
//! Provides compile-time constants and TOML config file support.

pub mod constants;
pub mod file;

pub use file::{
    config_path, ensure_config_file, load_config, watch_config, BellMode, Config, CursorStyle,
    RendererPreference,
};
