//! Resource identifiers for tile layers.
//!
//! Every layer of every tile is a separate image resource. The
//! [`AddressScheme`] turns `(node index, layer)` into the identifier handed to
//! the fetcher, following one of two conventions chosen once per image:
//!
//! # Indexed
//!
//! `{prefix}{index + 1}_{layer + 1}.{format}`, e.g. `tiles/L1/6_2.jpg`.
//!
//! # Region (IIIF image API)
//!
//! `{prefix}/{x},{y},{w},{h}/{edge},{edge}/0/default.{format}`, where the
//! region is the tile's absolute rectangle in base-image pixels and the size
//! is the tile edge.

use std::fmt;

use crate::config::{PyramidConfig, TilingStrategy};

/// Axis-aligned rectangle in base-image pixels.
///
/// Coordinates are fractional because halving a base dimension that is not a
/// power of two does not land on pixel boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRegion {
    /// Create a new region.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl fmt::Display for PixelRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            format_coordinate(self.x),
            format_coordinate(self.y),
            format_coordinate(self.width),
            format_coordinate(self.height)
        )
    }
}

/// Formats a pixel coordinate without a trailing `.0` for whole numbers.
fn format_coordinate(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Maps node indices and layers to resource identifiers.
#[derive(Debug, Clone)]
pub struct AddressScheme {
    strategy: TilingStrategy,
    format: String,
    prefixes: Vec<String>,
    tile_edge: u32,
    /// Per-node regions; empty for the indexed strategy.
    regions: Vec<PixelRegion>,
}

impl AddressScheme {
    /// Address scheme for indexed filenames.
    pub fn indexed(prefixes: Vec<String>, format: impl Into<String>) -> Self {
        Self {
            strategy: TilingStrategy::Indexed,
            format: format.into(),
            prefixes,
            tile_edge: 0,
            regions: Vec::new(),
        }
    }

    /// Address scheme for region requests.
    ///
    /// `regions[i]` must be the pixel rectangle of node `i`.
    pub fn region(
        prefixes: Vec<String>,
        format: impl Into<String>,
        tile_edge: u32,
        regions: Vec<PixelRegion>,
    ) -> Self {
        Self {
            strategy: TilingStrategy::Region,
            format: format.into(),
            prefixes,
            tile_edge,
            regions,
        }
    }

    /// Build the scheme selected by `config`, taking node regions from
    /// `regions` when the region strategy is in use.
    pub fn from_config(config: &PyramidConfig, regions: Vec<PixelRegion>) -> Self {
        match config.tiling_strategy {
            TilingStrategy::Indexed => Self::indexed(
                config.resource_prefixes.clone(),
                config.image_format.clone(),
            ),
            TilingStrategy::Region => Self::region(
                config.resource_prefixes.clone(),
                config.image_format.clone(),
                config.tile_edge,
                regions,
            ),
        }
    }

    /// The strategy in use.
    pub fn strategy(&self) -> TilingStrategy {
        self.strategy
    }

    /// Pixel region of a node, if the region strategy is in use.
    pub fn node_region(&self, index: usize) -> Option<&PixelRegion> {
        self.regions.get(index)
    }

    /// Resource identifier for one layer of one node.
    ///
    /// `None` if `layer` has no prefix, or if the region strategy is in use
    /// and `index` has no region.
    pub fn resource_id(&self, index: usize, layer: usize) -> Option<String> {
        let prefix = self.prefixes.get(layer)?;
        let id = match self.strategy {
            TilingStrategy::Indexed => {
                format!("{}{}_{}.{}", prefix, index + 1, layer + 1, self.format)
            }
            TilingStrategy::Region => format!(
                "{}/{}/{},{}/0/default.{}",
                prefix,
                self.regions.get(index)?,
                self.tile_edge,
                self.tile_edge,
                self.format
            ),
        };
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec![
            "http://tiles/L1/".to_string(),
            "http://tiles/L2/".to_string(),
            "http://tiles/L3/".to_string(),
        ]
    }

    #[test]
    fn test_indexed_root() {
        let scheme = AddressScheme::indexed(prefixes(), "jpg");
        assert_eq!(scheme.resource_id(0, 0).as_deref(), Some("http://tiles/L1/1_1.jpg"));
        assert_eq!(scheme.resource_id(0, 2).as_deref(), Some("http://tiles/L3/1_3.jpg"));
    }

    #[test]
    fn test_indexed_is_one_based() {
        let scheme = AddressScheme::indexed(prefixes(), "png");
        assert_eq!(scheme.resource_id(5, 1).as_deref(), Some("http://tiles/L2/6_2.png"));
        assert!(scheme.node_region(5).is_none());
    }

    #[test]
    fn test_region_url() {
        let regions = vec![
            PixelRegion::new(0.0, 0.0, 1024.0, 768.0),
            PixelRegion::new(0.0, 0.0, 512.0, 384.0),
        ];
        let scheme = AddressScheme::region(
            vec!["http://iiif/img1".to_string(); 3],
            "jpg",
            256,
            regions,
        );
        assert_eq!(
            scheme.resource_id(0, 0).as_deref(),
            Some("http://iiif/img1/0,0,1024,768/256,256/0/default.jpg")
        );
        assert_eq!(
            scheme.resource_id(1, 2).as_deref(),
            Some("http://iiif/img1/0,0,512,384/256,256/0/default.jpg")
        );
    }

    #[test]
    fn test_unknown_layer_or_region_has_no_id() {
        let indexed = AddressScheme::indexed(prefixes(), "jpg");
        assert_eq!(indexed.resource_id(0, 3), None);

        let region = AddressScheme::region(
            prefixes(),
            "jpg",
            256,
            vec![PixelRegion::new(0.0, 0.0, 256.0, 256.0)],
        );
        assert!(region.resource_id(0, 0).is_some());
        assert_eq!(region.resource_id(1, 0), None);
        assert_eq!(region.resource_id(0, 7), None);
    }

    #[test]
    fn test_region_display_keeps_fractions() {
        let region = PixelRegion::new(250.5, 0.0, 250.5, 125.25);
        assert_eq!(region.to_string(), "250.5,0,250.5,125.25");
    }

    #[test]
    fn test_strategy_accessor() {
        assert_eq!(
            AddressScheme::indexed(prefixes(), "jpg").strategy(),
            TilingStrategy::Indexed
        );
        assert_eq!(
            AddressScheme::region(prefixes(), "jpg", 256, Vec::new()).strategy(),
            TilingStrategy::Region
        );
    }
}
