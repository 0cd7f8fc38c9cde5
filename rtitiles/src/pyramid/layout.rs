//! Quadtree layout of the tile pyramid.
//!
//! Level `i` holds `4^i` tiles stored contiguously from index `(4^i - 1) / 3`,
//! so the whole pyramid is a flat arena of `(4^n - 1) / 3` nodes. Parent and
//! child links are pure index arithmetic:
//!
//! ```text
//! parent(k)       = ceil(k / 4) - 1          (k > 0)
//! child(k, slot)  = 4k + 1 + (slot + 2) % 4
//! ```
//!
//! Because every parent precedes its children, geometry, clip ranges and
//! pixel regions are all filled in a single forward pass over the arena.

use std::ops::Range;

use glam::{UVec2, Vec2, Vec3};

use crate::address::{AddressScheme, PixelRegion};
use crate::config::{ContentDescription, GeometryType, PyramidConfig, TilingStrategy};
use crate::error::PyramidError;
use crate::node::{ClipRange, ClipRect, Placement, Quadrant, TileNode};

/// Deepest pyramid accepted. 11 levels is ~1.4M nodes; one more level
/// quadruples that.
pub const MAX_LEVELS: usize = 11;

/// Metadata of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    /// Pixel resolution of the whole image at this level.
    pub resolution: UVec2,
    /// Index of the first node of the level.
    pub first_index: usize,
    /// Number of nodes on the level (`4^level`).
    pub node_count: usize,
}

impl LevelInfo {
    /// Node index range of the level.
    pub fn indices(&self) -> Range<usize> {
        self.first_index..self.first_index + self.node_count
    }
}

/// Number of levels needed for `tile_edge`-sized tiles to reach `max_width`.
///
/// Smallest `n` with `tile_edge * 2^(n-1) >= max_width`; at least one.
pub fn level_count(tile_edge: u32, max_width: u32) -> usize {
    let mut levels = 1;
    let mut width = tile_edge.max(1) as u64;
    while width < max_width as u64 {
        width *= 2;
        levels += 1;
    }
    levels
}

/// Total number of nodes in a pyramid of `levels` levels.
pub fn total_node_count(levels: usize) -> usize {
    level_start(levels)
}

/// Index of the first node of `level`.
pub fn level_start(level: usize) -> usize {
    ((1usize << (2 * level)) - 1) / 3
}

/// Level a node index belongs to.
pub fn level_of(index: usize) -> usize {
    let mut level = 0;
    while level_start(level + 1) <= index {
        level += 1;
    }
    level
}

/// Parent of node `index`; `None` for the root.
pub fn parent_index(index: usize) -> Option<usize> {
    if index == 0 {
        None
    } else {
        Some((index - 1) / 4)
    }
}

/// Children of node `index` in slot order.
pub fn child_indices(index: usize) -> [usize; 4] {
    [0, 1, 2, 3].map(|slot| index * 4 + 1 + (slot + 2) % 4)
}

/// Node topology, plane geometry, content clipping and resource addressing
/// for one image.
///
/// Building the layout does no I/O; a [`crate::TilePyramid`] takes ownership
/// of it and starts loading.
#[derive(Debug)]
pub struct PyramidLayout {
    pub(crate) levels: Vec<LevelInfo>,
    pub(crate) nodes: Vec<TileNode>,
    pub(crate) addresses: AddressScheme,
    root: Placement,
    layer_count: usize,
}

impl PyramidLayout {
    /// Lay out the pyramid described by `config` on a plane of edge `scale`.
    ///
    /// # Errors
    ///
    /// Returns [`PyramidError::InvalidConfig`] if the description is
    /// inconsistent or too deep, and [`PyramidError::UnsupportedGeometry`]
    /// for anything but a plane.
    pub fn build(
        config: &PyramidConfig,
        content: &ContentDescription,
        scale: f32,
    ) -> Result<Self, PyramidError> {
        config.validate(content)?;
        if content.geometry != GeometryType::Plane {
            return Err(PyramidError::UnsupportedGeometry(content.geometry));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(PyramidError::InvalidConfig(format!(
                "scene scale must be positive, got {}",
                scale
            )));
        }

        let level_count = level_count(config.tile_edge, config.max_width);
        if level_count > MAX_LEVELS {
            return Err(PyramidError::InvalidConfig(format!(
                "{} levels needed for {}px tiles over {}px, at most {} supported",
                level_count, config.tile_edge, config.max_width, MAX_LEVELS
            )));
        }

        let levels = level_table(level_count, config.tile_edge);
        let mut nodes = node_skeleton(level_count, config.layer_count);
        let root = lay_out_plane(&mut nodes, scale);
        assign_content_limits(&mut nodes, config);

        let regions = match config.tiling_strategy {
            TilingStrategy::Region => node_regions(level_count, config),
            TilingStrategy::Indexed => Vec::new(),
        };
        let addresses = AddressScheme::from_config(config, regions);

        tracing::debug!(
            levels = level_count,
            nodes = nodes.len(),
            tile_edge = config.tile_edge,
            "pyramid layout built"
        );

        Ok(Self {
            levels,
            nodes,
            addresses,
            root,
            layer_count: config.layer_count,
        })
    }

    pub fn levels(&self) -> &[LevelInfo] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> Option<&LevelInfo> {
        self.levels.get(level)
    }

    pub fn nodes(&self) -> &[TileNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&TileNode> {
        self.nodes.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Placement of the root plane.
    pub fn root_placement(&self) -> Placement {
        self.root
    }

    /// Upper-left and lower-right corners of the root plane, the points
    /// projected to estimate the on-screen footprint.
    pub fn reference_corners(&self) -> (Vec3, Vec3) {
        let half = self.root.size / 2.0;
        let center = self.root.center;
        (
            center + Vec3::new(-half.x, half.y, 0.0),
            center + Vec3::new(half.x, -half.y, 0.0),
        )
    }

    pub fn addresses(&self) -> &AddressScheme {
        &self.addresses
    }

    /// One resource identifier per layer of node `index`; empty when the
    /// index is out of range.
    pub fn resource_ids(&self, index: usize) -> Vec<String> {
        if index >= total_node_count(self.levels.len()) {
            return Vec::new();
        }
        (0..self.layer_count)
            .filter_map(|layer| self.addresses.resource_id(index, layer))
            .collect()
    }

    /// Number of nodes on `level` that lie entirely outside the content region.
    pub fn content_free_count(&self, level: usize) -> usize {
        self.levels
            .get(level)
            .map(|info| {
                self.nodes[info.indices()]
                    .iter()
                    .filter(|node| !node.has_content())
                    .count()
            })
            .unwrap_or(0)
    }
}

fn level_table(level_count: usize, tile_edge: u32) -> Vec<LevelInfo> {
    (0..level_count)
        .map(|level| LevelInfo {
            resolution: UVec2::splat(tile_edge.saturating_mul(1 << level)),
            first_index: level_start(level),
            node_count: 1 << (2 * level),
        })
        .collect()
}

fn node_skeleton(level_count: usize, layer_count: usize) -> Vec<TileNode> {
    let mut nodes = Vec::with_capacity(total_node_count(level_count));
    for level in 0..level_count {
        let is_leaf_level = level + 1 == level_count;
        for index in level_start(level)..level_start(level + 1) {
            let children = (!is_leaf_level).then(|| child_indices(index));
            nodes.push(TileNode::new(
                index,
                level,
                parent_index(index),
                children,
                layer_count,
            ));
        }
    }
    nodes
}

/// Place the root at the origin with edge `scale`, and every child in its
/// quadrant at half the parent's edge. Returns the root placement.
fn lay_out_plane(nodes: &mut [TileNode], scale: f32) -> Placement {
    let root = Placement {
        center: Vec3::ZERO,
        size: Vec2::splat(scale),
    };
    nodes[0].set_placement(root);

    for index in 1..nodes.len() {
        let (Some(parent), Some(quadrant)) = (parent_index(index), Quadrant::of_index(index)) else {
            continue;
        };
        let parent = *nodes[parent].placement();
        let offset = quadrant.plane_direction() * parent.size / 4.0;
        nodes[index].set_placement(Placement {
            center: parent.center + offset.extend(0.0),
            size: parent.size / 2.0,
        });
    }
    root
}

/// Propagate the content region from the root down, doubling and shifting
/// the parent's clamped range per quadrant.
fn assign_content_limits(nodes: &mut [TileNode], config: &PyramidConfig) {
    let content = config.content_rect();
    let max_width = config.max_width as f64;
    let max_height = config.max_height as f64;
    let root = ClipRect::new(
        ClipRange::new(
            (content.x / max_width) as f32,
            ((content.x + content.width) / max_width) as f32,
        ),
        ClipRange::new(
            (content.y / max_height) as f32,
            ((content.y + content.height) / max_height) as f32,
        ),
    );
    nodes[0].set_clip(root, true);

    for index in 1..nodes.len() {
        let (Some(parent), Some(quadrant)) = (parent_index(index), Quadrant::of_index(index)) else {
            continue;
        };
        let unclamped = nodes[parent].clip().child(quadrant);
        let has_content = !unclamped.is_outside_unit();
        nodes[index].set_clip(unclamped.clamped(), has_content);
    }
}

/// Absolute pixel rectangle of every node, by quadrant subdivision of the
/// base image.
fn node_regions(level_count: usize, config: &PyramidConfig) -> Vec<PixelRegion> {
    let max_width = config.max_width as f64;
    let max_height = config.max_height as f64;
    let mut regions = Vec::with_capacity(total_node_count(level_count));
    regions.push(PixelRegion::new(0.0, 0.0, max_width, max_height));

    for level in 1..level_count {
        let factor = (1u64 << level) as f64;
        let (width, height) = (max_width / factor, max_height / factor);
        for index in level_start(level)..level_start(level + 1) {
            let (Some(parent), Some(quadrant)) = (parent_index(index), Quadrant::of_index(index))
            else {
                continue;
            };
            let origin = regions[parent];
            let (dx, dy) = quadrant.region_offset();
            regions.push(PixelRegion::new(
                origin.x + dx * width,
                origin.y + dy * height,
                width,
                height,
            ));
        }
    }
    regions
}
