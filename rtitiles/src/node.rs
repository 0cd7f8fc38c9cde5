//! A single tile of the pyramid and its load state machine.
//!
//! # State Machine
//!
//! ```text
//! Init --[begin_request, has content]--> Requested
//! Init --[begin_request, no content]---> Loaded (no fetches)
//! Requested --[last layer settled]-----> Loaded (load_error if any layer failed)
//! ```
//!
//! Nodes never go back to `Init`; a failed node stays errored until the
//! image is reloaded.

use std::sync::Arc;

use bytes::Bytes;
use glam::{Mat4, Vec2, Vec3};

use crate::bounds::BoundingSphere;
use crate::error::FetchError;

/// Position of a child inside its parent.
///
/// The quadrant of node `k > 0` is fixed by `k % 4`, and child slot `c` of
/// node `k` lives at index `4k + 1 + (c + 2) % 4`. Plane offsets, clip shifts
/// and pixel-region offsets below all follow this numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UpperLeft,
        Quadrant::UpperRight,
        Quadrant::LowerLeft,
        Quadrant::LowerRight,
    ];

    /// Quadrant occupied by node `index`; `None` for the root.
    pub fn of_index(index: usize) -> Option<Quadrant> {
        if index == 0 {
            return None;
        }
        Some(match index % 4 {
            1 => Quadrant::UpperLeft,
            2 => Quadrant::UpperRight,
            3 => Quadrant::LowerLeft,
            _ => Quadrant::LowerRight,
        })
    }

    /// Direction of the child center from the parent center in the scene
    /// (+Y up).
    pub fn plane_direction(&self) -> Vec2 {
        match self {
            Quadrant::UpperLeft => Vec2::new(-1.0, 1.0),
            Quadrant::UpperRight => Vec2::new(1.0, 1.0),
            Quadrant::LowerLeft => Vec2::new(-1.0, -1.0),
            Quadrant::LowerRight => Vec2::new(1.0, -1.0),
        }
    }

    /// Shift subtracted from the doubled parent clip range, per axis.
    ///
    /// Clip space has +Y up, so the upper quadrants take the upper half.
    fn clip_shift(&self) -> Vec2 {
        match self {
            Quadrant::UpperLeft => Vec2::new(0.0, 1.0),
            Quadrant::UpperRight => Vec2::new(1.0, 1.0),
            Quadrant::LowerLeft => Vec2::new(0.0, 0.0),
            Quadrant::LowerRight => Vec2::new(1.0, 0.0),
        }
    }

    /// Offset of the child region from the parent's top-left corner, in units
    /// of the child size. Pixel space has +Y down.
    pub fn region_offset(&self) -> (f64, f64) {
        match self {
            Quadrant::UpperLeft => (0.0, 0.0),
            Quadrant::UpperRight => (1.0, 0.0),
            Quadrant::LowerLeft => (0.0, 1.0),
            Quadrant::LowerRight => (1.0, 1.0),
        }
    }
}

/// Normalized `[min, max]` range along one axis of a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRange {
    pub min: f32,
    pub max: f32,
}

impl ClipRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Whether the range lies entirely outside `[0, 1]`.
    pub fn is_outside_unit(&self) -> bool {
        self.min >= 1.0 || self.max <= 0.0
    }

    /// Range clamped to `[0, 1]`.
    pub fn clamped(&self) -> Self {
        Self::new(self.min.clamp(0.0, 1.0), self.max.clamp(0.0, 1.0))
    }
}

/// Portion of a tile covered by real content, in the tile's own `[0, 1]²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: ClipRange,
    pub y: ClipRange,
}

impl ClipRect {
    pub fn new(x: ClipRange, y: ClipRange) -> Self {
        Self { x, y }
    }

    /// The unclamped range of the child in `quadrant`.
    pub fn child(&self, quadrant: Quadrant) -> ClipRect {
        let shift = quadrant.clip_shift();
        ClipRect::new(
            ClipRange::new(self.x.min * 2.0 - shift.x, self.x.max * 2.0 - shift.x),
            ClipRange::new(self.y.min * 2.0 - shift.y, self.y.max * 2.0 - shift.y),
        )
    }

    /// Inverse of [`ClipRect::child`]: the parent range a child range came from.
    pub fn parent_from_child(&self, quadrant: Quadrant) -> ClipRect {
        let shift = quadrant.clip_shift();
        ClipRect::new(
            ClipRange::new((self.x.min + shift.x) / 2.0, (self.x.max + shift.x) / 2.0),
            ClipRange::new((self.y.min + shift.y) / 2.0, (self.y.max + shift.y) / 2.0),
        )
    }

    /// Whether the rect lies entirely outside the unit square.
    pub fn is_outside_unit(&self) -> bool {
        self.x.is_outside_unit() || self.y.is_outside_unit()
    }

    /// Rect clamped to the unit square.
    pub fn clamped(&self) -> ClipRect {
        ClipRect::new(self.x.clamped(), self.y.clamped())
    }
}

/// Where a tile's plane sits in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub center: Vec3,
    pub size: Vec2,
}

impl Placement {
    /// Transform taking a unit plane centered at the origin to this tile.
    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.center) * Mat4::from_scale(self.size.extend(1.0))
    }

    /// Bounding sphere through the plane's corners.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.center, (self.size / 2.0).length())
    }
}

/// Progress of a tile's texture load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing requested yet.
    Init,
    /// Fetches issued, not all layers settled.
    Requested,
    /// Every layer settled, or the tile has no content.
    Loaded,
}

/// The assembled, renderable texture set of a tile.
#[derive(Debug, Clone)]
pub struct TileSurface {
    pub node_index: usize,
    /// One payload per layer, in layer order.
    pub layers: Vec<Bytes>,
    pub clip: ClipRect,
}

/// Emitted once per node when its last layer settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLoadEvent {
    pub index: usize,
    pub success: bool,
}

/// Outcome of asking a node to start loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The node went to `Requested`; one fetch per layer must be issued.
    Issue,
    /// The node has no content and went straight to `Loaded`.
    Empty,
    /// The node was already requested or loaded.
    AlreadyRequested,
}

/// One tile of the pyramid.
#[derive(Debug)]
pub struct TileNode {
    index: usize,
    level: usize,
    parent: Option<usize>,
    children: Option<[usize; 4]>,
    placement: Placement,
    bounds: BoundingSphere,
    clip: ClipRect,
    has_content: bool,
    textures: Vec<Option<Bytes>>,
    layer_settled: Vec<bool>,
    settled_layers: usize,
    state: LoadState,
    load_error: bool,
    surface: Option<Arc<TileSurface>>,
    disposed: bool,
}

impl TileNode {
    /// Create a node in the `Init` state.
    pub fn new(
        index: usize,
        level: usize,
        parent: Option<usize>,
        children: Option<[usize; 4]>,
        layer_count: usize,
    ) -> Self {
        let placement = Placement {
            center: Vec3::ZERO,
            size: Vec2::ZERO,
        };
        Self {
            index,
            level,
            parent,
            children,
            placement,
            bounds: placement.bounding_sphere(),
            clip: ClipRect::new(ClipRange::new(0.0, 1.0), ClipRange::new(0.0, 1.0)),
            has_content: true,
            textures: vec![None; layer_count],
            layer_settled: vec![false; layer_count],
            settled_layers: 0,
            state: LoadState::Init,
            load_error: false,
            surface: None,
            disposed: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Child indices in slot order; `None` for leaves.
    pub fn children(&self) -> Option<[usize; 4]> {
        self.children
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn bounds(&self) -> &BoundingSphere {
        &self.bounds
    }

    /// Clamped clip rect of the tile.
    pub fn clip(&self) -> &ClipRect {
        &self.clip
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn load_error(&self) -> bool {
        self.load_error
    }

    pub fn layer_count(&self) -> usize {
        self.textures.len()
    }

    /// Payload of one layer, once it has loaded successfully.
    pub fn texture(&self, layer: usize) -> Option<&Bytes> {
        self.textures.get(layer).and_then(|t| t.as_ref())
    }

    pub fn surface(&self) -> Option<&Arc<TileSurface>> {
        self.surface.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Every layer has settled (or there is nothing to load).
    pub fn is_settled(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// Settled, carrying content and free of load errors.
    pub fn is_renderable(&self) -> bool {
        self.is_settled() && self.has_content && !self.load_error
    }

    pub(crate) fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
        self.bounds = placement.bounding_sphere();
    }

    pub(crate) fn set_clip(&mut self, clip: ClipRect, has_content: bool) {
        self.clip = clip;
        self.has_content = has_content;
    }

    /// Move out of `Init`.
    ///
    /// Returns [`RequestOutcome::Issue`] exactly once per node; the caller is
    /// then responsible for fetching every layer and reporting each result
    /// through [`TileNode::settle_layer`].
    pub fn begin_request(&mut self) -> RequestOutcome {
        if self.disposed || self.state != LoadState::Init {
            return RequestOutcome::AlreadyRequested;
        }

        if !self.has_content {
            self.state = LoadState::Loaded;
            tracing::trace!(node = self.index, "tile outside content region, nothing to fetch");
            return RequestOutcome::Empty;
        }

        self.state = LoadState::Requested;
        self.settled_layers = 0;
        self.load_error = false;
        self.layer_settled.iter_mut().for_each(|s| *s = false);
        RequestOutcome::Issue
    }

    /// Record the result of one layer fetch.
    ///
    /// Returns the load event when this was the last outstanding layer.
    /// Results for a disposed node, a node that is not `Requested`, or a layer
    /// that already settled are discarded.
    pub fn settle_layer(
        &mut self,
        layer: usize,
        result: Result<Bytes, FetchError>,
    ) -> Option<TileLoadEvent> {
        if self.disposed || self.state != LoadState::Requested {
            tracing::trace!(node = self.index, layer, "discarding stale layer result");
            return None;
        }
        match self.layer_settled.get(layer) {
            Some(false) => {}
            _ => {
                tracing::trace!(node = self.index, layer, "discarding duplicate layer result");
                return None;
            }
        }

        self.layer_settled[layer] = true;
        self.settled_layers += 1;
        match result {
            Ok(data) => {
                tracing::trace!(node = self.index, layer, bytes = data.len(), "layer loaded");
                self.textures[layer] = Some(data);
            }
            Err(e) => {
                tracing::warn!(node = self.index, layer, error = %e, "unable to load tile layer");
                self.load_error = true;
            }
        }

        if self.settled_layers < self.layer_count() {
            return None;
        }

        self.state = LoadState::Loaded;
        if self.load_error {
            tracing::debug!(node = self.index, "tile loaded with errors, leaving it out of rendering");
        } else {
            self.assemble_surface();
            tracing::debug!(node = self.index, "all tile layers loaded");
        }

        Some(TileLoadEvent {
            index: self.index,
            success: !self.load_error,
        })
    }

    /// Re-create the surface from the stored layers.
    ///
    /// Returns `false` when the node has nothing renderable.
    pub fn rebuild_surface(&mut self) -> bool {
        if self.disposed || !self.is_renderable() {
            return false;
        }
        self.assemble_surface();
        true
    }

    fn assemble_surface(&mut self) {
        let layers = self.textures.iter().flatten().cloned().collect();
        self.surface = Some(Arc::new(TileSurface {
            node_index: self.index,
            layers,
            clip: self.clip,
        }));
    }

    /// Release textures and the surface. Safe in any state; later layer
    /// results are discarded.
    pub fn dispose(&mut self) {
        self.textures.iter_mut().for_each(|t| *t = None);
        self.surface = None;
        self.disposed = true;
    }
}
