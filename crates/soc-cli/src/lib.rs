//! Host-side support for the `socsim` runner: configuration, program and
//! image loaders plus report formatting.

use env_logger as _;

/// TOML configuration presets and overlays.
pub mod config;
/// Load error types.
pub mod errors;
/// Hex program and memory image listings.
pub mod hexfile;
/// Register, diagnostics and listing output.
pub mod report;

pub use config::{load_config, parse_config, Preset};
pub use errors::{LoadError, SyntaxError, SyntaxErrorKind};
pub use hexfile::{load_image, load_program, parse_image, parse_program};

#[cfg(test)]
use tempfile as _;
