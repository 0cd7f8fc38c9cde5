//! Image description and pyramid construction options.
//!
//! [`PyramidConfig`] and [`ContentDescription`] are what the image-description
//! collaborator hands over; they deserialize from the wire names used in
//! image description files. [`PyramidOptions`] holds the knobs that belong to
//! the viewer rather than to the image (scene scale, debug drawing, LOD
//! overflow policy).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::PixelRegion;
use crate::error::PyramidError;

/// Default edge length of the root plane in scene units.
pub const DEFAULT_SCENE_SCALE: f32 = 7.5;

/// How resource identifiers for tiles are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TilingStrategy {
    /// `{prefix}{index+1}_{layer+1}.{format}`
    #[serde(rename = "INDEXED")]
    Indexed,
    /// IIIF-style region request: `{prefix}/{x},{y},{w},{h}/{edge},{edge}/0/default.{format}`
    #[serde(rename = "IIIF")]
    Region,
}

/// Reflectance image variant, which fixes the number of data layers per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageVariant {
    /// Luminance PTM with RGB color: three coefficient layers.
    #[serde(rename = "LRGB_PTM")]
    Lrgb,
    /// Luminance PTM with RGB color and specular layer: four layers.
    #[serde(rename = "LRGBG_PTM")]
    Lrgbg,
}

impl ImageVariant {
    /// Number of texture layers fetched for every tile.
    pub fn layer_count(&self) -> usize {
        match self {
            ImageVariant::Lrgb => 3,
            ImageVariant::Lrgbg => 4,
        }
    }
}

/// Shape of the surface the image is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    #[serde(rename = "PLANE")]
    Plane,
    #[serde(rename = "HALFDOME")]
    HalfDome,
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryType::Plane => write!(f, "PLANE"),
            GeometryType::HalfDome => write!(f, "HALFDOME"),
        }
    }
}

/// Per-image description of the content carried by the tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescription {
    pub variant: ImageVariant,
    pub geometry: GeometryType,
}

impl ContentDescription {
    /// Create a new content description.
    pub fn new(variant: ImageVariant, geometry: GeometryType) -> Self {
        Self { variant, geometry }
    }

    /// Number of texture layers per tile.
    pub fn layer_count(&self) -> usize {
        self.variant.layer_count()
    }
}

/// Immutable description of a tiled image.
///
/// The content region is the centered `content_width × content_height`
/// rectangle of the `max_width × max_height` base image; the rest of the base
/// image is padding that never needs to be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidConfig {
    /// Base image width in pixels.
    pub max_width: u32,
    /// Base image height in pixels.
    pub max_height: u32,
    /// Width of the region that carries data.
    pub content_width: u32,
    /// Height of the region that carries data.
    pub content_height: u32,
    /// Edge of a (square) tile in pixels.
    pub tile_edge: u32,
    /// Number of texture layers per tile.
    pub layer_count: usize,
    pub tiling_strategy: TilingStrategy,
    /// File extension of the layer images, without the dot.
    pub image_format: String,
    /// One resource prefix per layer.
    pub resource_prefixes: Vec<String>,
}

impl PyramidConfig {
    /// Content rectangle in base-image pixels, centered in the base image.
    pub fn content_rect(&self) -> PixelRegion {
        let half_width = self.max_width as f64 / 2.0;
        let half_height = self.max_height as f64 / 2.0;
        let half_content_width = self.content_width as f64 / 2.0;
        let half_content_height = self.content_height as f64 / 2.0;
        PixelRegion::new(
            half_width - half_content_width,
            half_height - half_content_height,
            self.content_width as f64,
            self.content_height as f64,
        )
    }

    /// Check that the description is internally consistent and matches the
    /// content description it will be paired with.
    pub fn validate(&self, content: &ContentDescription) -> Result<(), PyramidError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(PyramidError::InvalidConfig(format!(
                "base resolution must be positive, got {}×{}",
                self.max_width, self.max_height
            )));
        }
        if self.tile_edge == 0 {
            return Err(PyramidError::InvalidConfig(
                "tile edge must be positive".to_string(),
            ));
        }
        if self.content_width > self.max_width || self.content_height > self.max_height {
            return Err(PyramidError::InvalidConfig(format!(
                "content region {}×{} exceeds base resolution {}×{}",
                self.content_width, self.content_height, self.max_width, self.max_height
            )));
        }
        if self.layer_count != content.layer_count() {
            return Err(PyramidError::InvalidConfig(format!(
                "{:?} images have {} layers, configuration declares {}",
                content.variant,
                content.layer_count(),
                self.layer_count
            )));
        }
        if self.resource_prefixes.len() < self.layer_count {
            return Err(PyramidError::InvalidConfig(format!(
                "{} resource prefixes for {} layers",
                self.resource_prefixes.len(),
                self.layer_count
            )));
        }
        Ok(())
    }
}

/// What to do when even the finest level is coarser than the viewport needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LodOverflow {
    /// Fall back to level 0.
    #[default]
    Coarsest,
    /// Stay on the highest-resolution level.
    Finest,
}

/// Viewer-side options for building a pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidOptions {
    /// Edge length of the root plane in scene units.
    pub scale: f32,
    /// Attach bounding spheres to returned tiles for debug drawing.
    pub show_bounding_spheres: bool,
    pub overflow: LodOverflow,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCENE_SCALE,
            show_bounding_spheres: false,
            overflow: LodOverflow::default(),
        }
    }
}

impl PyramidOptions {
    /// Set the scene scale.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Enable or disable bounding-sphere debug output.
    pub fn with_bounding_spheres(mut self, enabled: bool) -> Self {
        self.show_bounding_spheres = enabled;
        self
    }

    /// Set the LOD overflow policy.
    pub fn with_overflow(mut self, overflow: LodOverflow) -> Self {
        self.overflow = overflow;
        self
    }
}
