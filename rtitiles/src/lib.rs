//! rtitiles - Streamed multiresolution tiles for reflectance images
//!
//! This library renders very large multi-layer reflectance images (PTMs) by
//! streaming only the resolution and region currently in view. An image is a
//! quadtree of progressively finer tilings; every tile carries one texture per
//! data layer, fetched asynchronously, and the renderer draws whatever level
//! is fully available while finer tiles are still in flight.
//!
//! # Overview
//!
//! - [`PyramidConfig`] / [`ContentDescription`]: what the image description
//!   says about the tiling.
//! - [`TilePyramid`]: node arena, LOD selection, frustum culling and loading.
//! - [`PyramidController`]: the per-image driver a viewer embeds.
//! - [`fetch`]: the fetch capability, an HTTP implementation and a shared
//!   texture cache.

pub mod address;
pub mod bounds;
pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod node;
pub mod pyramid;

pub use address::{AddressScheme, PixelRegion};
pub use bounds::{BoundingSphere, Frustum};
pub use camera::{Camera, OrthographicCamera, PerspectiveCamera};
pub use config::{
    ContentDescription, GeometryType, ImageVariant, LodOverflow, PyramidConfig, PyramidOptions,
    TilingStrategy, DEFAULT_SCENE_SCALE,
};
pub use controller::{LoadListener, PyramidController};
pub use error::{FetchError, PyramidError};
pub use fetch::{CachedFetcher, ReqwestFetcher, TextureCache, TileFetcher};
pub use node::{ClipRange, ClipRect, LoadState, Placement, TileLoadEvent, TileNode, TileSurface};
pub use pyramid::{LevelInfo, PyramidLayout, TileHandle, TilePyramid};

/// Library version, from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
