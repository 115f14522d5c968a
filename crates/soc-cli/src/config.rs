//! TOML run configuration.
//!
//! A file names a preset and overrides any subset of its fields:
//!
//! ```toml
//! preset = "compact"
//! strict_decode = true
//!
//! [timing]
//! refresh_interval_cycles = 0
//! ```
//!
//! Tables merge key by key into the preset; arrays such as
//! `address_map.regions` replace the preset's array whole.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use soc_core::SimConfig;
use toml::{Table, Value};

use crate::errors::LoadError;

/// Starting point a configuration file is overlaid on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// 1024x768 display with the full-size address map.
    #[default]
    Xga,
    /// 16x8 display with a small address map.
    Compact,
}

impl Preset {
    /// Configuration this preset expands to.
    #[must_use]
    pub fn config(self) -> SimConfig {
        match self {
            Self::Xga => SimConfig::default(),
            Self::Compact => SimConfig::compact(),
        }
    }
}

fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => merge_tables(base, overlay),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Parses configuration text, overlays it on its preset (or `fallback`
/// when it names none) and validates the result.
///
/// # Errors
///
/// Returns [`LoadError::Toml`] for malformed text or unknown field types and
/// [`LoadError::Config`] when the merged configuration is inconsistent.
pub fn parse_config(text: &str, fallback: Preset) -> Result<SimConfig, LoadError> {
    let mut overlay: Table = toml::from_str(text)?;
    let preset = match overlay.remove("preset") {
        Some(value) => value.try_into::<Preset>()?,
        None => fallback,
    };
    let mut merged = match Value::try_from(preset.config())? {
        Value::Table(table) => table,
        _ => Table::new(),
    };
    merge_tables(&mut merged, overlay);
    let config: SimConfig = Value::Table(merged).try_into()?;
    config.validate()?;
    log::debug!("configuration resolved from {preset:?} preset");
    Ok(config)
}

/// Reads and resolves a configuration file.
///
/// # Errors
///
/// Returns [`LoadError::Io`] when the file cannot be read, otherwise as
/// [`parse_config`].
pub fn load_config(path: &Path, fallback: Preset) -> Result<SimConfig, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text, fallback)
}

#[cfg(test)]
mod tests {
    use super::{parse_config, Preset};
    use crate::errors::LoadError;
    use soc_core::{ConfigError, MemoryRegion, SimConfig};

    #[test]
    fn empty_file_is_the_fallback_preset() {
        assert_eq!(
            parse_config("", Preset::Compact).expect("valid"),
            SimConfig::compact()
        );
        assert_eq!(
            parse_config("", Preset::Xga).expect("valid"),
            SimConfig::default()
        );
    }

    #[test]
    fn nested_fields_override_preset_values() {
        let config = parse_config(
            "preset = \"compact\"\nstrict_decode = true\n[timing]\nrefresh_interval_cycles = 0\n",
            Preset::Xga,
        )
        .expect("valid");
        assert!(config.strict_decode);
        assert_eq!(config.timing.refresh_interval_cycles, 0);
        assert_eq!(
            config.timing.refresh_cycles,
            SimConfig::compact().timing.refresh_cycles
        );
        assert_eq!(config.display, SimConfig::compact().display);
    }

    #[test]
    fn region_table_replaces_preset_regions() {
        let config = parse_config(
            r#"
preset = "compact"

[[address_map.regions]]
region = "Diagnostic"
start = 0
end = 0xFF

[[address_map.regions]]
region = "Stack"
start = 0x200
end = 0x2FF

[[address_map.regions]]
region = { FrameBuffer = "Zero" }
start = 0x400
end = 0x4FF

[[address_map.regions]]
region = { FrameBuffer = "One" }
start = 0x600
end = 0x6FF
"#,
            Preset::Xga,
        )
        .expect("valid");
        let stack = config
            .address_map
            .region(MemoryRegion::Stack)
            .expect("stack");
        assert_eq!((stack.start, stack.end), (0x200, 0x2FF));
    }

    #[test]
    fn inconsistent_geometry_is_rejected() {
        let error = parse_config(
            "preset = \"compact\"\n[display]\nblock_words = 3\n",
            Preset::Xga,
        )
        .expect_err("blocks do not tile the line");
        assert!(matches!(
            error,
            LoadError::Config(ConfigError::BlockGeometry { .. })
        ));
    }

    #[test]
    fn unknown_preset_is_a_toml_error() {
        let error = parse_config("preset = \"vga\"\n", Preset::Xga).expect_err("unknown");
        assert!(matches!(error, LoadError::Toml(_)));
    }
}
