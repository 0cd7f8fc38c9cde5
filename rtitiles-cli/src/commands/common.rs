//! Common types and utilities shared across CLI commands.

use std::path::Path;

use rtitiles::{ContentDescription, PyramidConfig, PyramidLayout, DEFAULT_SCENE_SCALE};
use serde::Deserialize;

use crate::error::CliError;

/// An image description file: the tiling configuration plus what the tiles
/// contain.
///
/// ```json
/// {
///   "config": { "maxWidth": 4096, "maxHeight": 4096, ... },
///   "content": { "variant": "LRGB_PTM", "geometry": "PLANE" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDescription {
    pub config: PyramidConfig,
    pub content: ContentDescription,
}

impl ImageDescription {
    /// Read and validate a description file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let description: ImageDescription =
            serde_json::from_str(&text).map_err(|e| CliError::Description {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        description.config.validate(&description.content)?;
        tracing::debug!(path = %path.display(), "loaded image description");
        Ok(description)
    }

    /// Lay out the pyramid without fetching anything.
    pub fn layout(&self) -> Result<PyramidLayout, CliError> {
        Ok(PyramidLayout::build(
            &self.config,
            &self.content,
            DEFAULT_SCENE_SCALE,
        )?)
    }
}

/// Check that `level` exists in `layout`.
pub fn check_level(layout: &PyramidLayout, level: usize) -> Result<(), CliError> {
    if level >= layout.level_count() {
        return Err(CliError::InvalidArgument(format!(
            "level {} out of range, pyramid has levels 0..={}",
            level,
            layout.level_count() - 1
        )));
    }
    Ok(())
}

/// Format a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
