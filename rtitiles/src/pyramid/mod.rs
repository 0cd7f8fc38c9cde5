//! The multiresolution tile pyramid.
//!
//! [`TilePyramid`] owns the node arena of one image and drives texture
//! loading. It is meant to live on a single control task; fetches run as
//! background Tokio tasks and report back through an unbounded channel that
//! the owner drains with [`TilePyramid::pump_completions`] (once per frame) or
//! awaits with [`TilePyramid::next_load_event`].
//!
//! # Rendering fallback
//!
//! [`TilePyramid::available_tiles`] walks from the required level towards the
//! root and serves the first level whose visible nodes have all settled, so a
//! coarse approximation stays on screen while finer tiles stream in.
//!
//! ```ignore
//! let mut pyramid = TilePyramid::new(config, content, PyramidOptions::default(), fetcher)?;
//! pyramid.request_textures(screen, &camera);
//! // every frame:
//! pyramid.pump_completions();
//! let tiles = pyramid.available_tiles(screen, &camera);
//! ```

pub mod layout;
pub mod lod;

pub use layout::{
    child_indices, level_count, level_of, level_start, parent_index, total_node_count, LevelInfo,
    PyramidLayout, MAX_LEVELS,
};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use glam::{Mat4, Vec2, Vec3};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::bounds::{BoundingSphere, Frustum};
use crate::camera::Camera;
use crate::config::{ContentDescription, PyramidConfig, PyramidOptions};
use crate::error::{FetchError, PyramidError};
use crate::fetch::TileFetcher;
use crate::node::{ClipRect, Placement, RequestOutcome, TileLoadEvent, TileNode, TileSurface};

/// Result of one layer fetch, sent from a fetch task to the pyramid owner.
#[derive(Debug)]
struct LayerCompletion {
    index: usize,
    layer: usize,
    result: Result<Bytes, FetchError>,
}

/// A tile chosen for rendering.
#[derive(Debug, Clone)]
pub struct TileHandle {
    pub index: usize,
    pub level: usize,
    /// Layer textures and clip rect; `None` for a tile outside the content
    /// region, which renders nothing.
    pub surface: Option<Arc<TileSurface>>,
    pub placement: Placement,
    pub clip: ClipRect,
    /// Set when bounding-sphere debug drawing is enabled.
    pub debug_bounds: Option<BoundingSphere>,
}

impl TileHandle {
    fn from_node(node: &TileNode, show_bounds: bool) -> Self {
        Self {
            index: node.index(),
            level: node.level(),
            surface: node.surface().cloned(),
            placement: *node.placement(),
            clip: *node.clip(),
            debug_bounds: show_bounds.then(|| *node.bounds()),
        }
    }

    /// Model transform for a unit plane.
    pub fn transform(&self) -> Mat4 {
        self.placement.transform()
    }

    pub fn has_content(&self) -> bool {
        self.surface.is_some()
    }
}

/// Quadtree of progressively finer tilings of one image.
pub struct TilePyramid {
    config: PyramidConfig,
    options: PyramidOptions,
    layout: PyramidLayout,
    fetcher: Arc<dyn TileFetcher>,
    runtime: Handle,
    tx: mpsc::UnboundedSender<LayerCompletion>,
    rx: mpsc::UnboundedReceiver<LayerCompletion>,
    in_flight: usize,
    disposed: bool,
}

impl TilePyramid {
    /// Build the pyramid and start loading the root tile.
    ///
    /// Must be called from within a Tokio runtime; fetch tasks are spawned on
    /// it for the lifetime of the pyramid.
    ///
    /// # Errors
    ///
    /// Fails without side effects if the description is invalid, the geometry
    /// is not a plane, or no runtime is available.
    pub fn new(
        config: PyramidConfig,
        content: ContentDescription,
        options: PyramidOptions,
        fetcher: Arc<dyn TileFetcher>,
    ) -> Result<Self, PyramidError> {
        let layout = PyramidLayout::build(&config, &content, options.scale)?;
        let runtime = Handle::try_current().map_err(|e| PyramidError::NoRuntime(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut pyramid = Self {
            config,
            options,
            layout,
            fetcher,
            runtime,
            tx,
            rx,
            in_flight: 0,
            disposed: false,
        };

        tracing::info!(
            levels = pyramid.level_count(),
            nodes = pyramid.node_count(),
            layers = pyramid.layer_count(),
            strategy = ?pyramid.config.tiling_strategy,
            "tile pyramid created"
        );
        pyramid.request_node(0);
        Ok(pyramid)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Request every visible node of the level the viewport needs.
    ///
    /// Never blocks. Returns the number of nodes that started fetching;
    /// nodes already requested or loaded are skipped.
    pub fn request_textures<C: Camera + ?Sized>(&mut self, screen: Vec2, camera: &C) -> usize {
        if self.disposed {
            tracing::warn!("request_textures called on a disposed pyramid");
            return 0;
        }
        let level = self.required_level(screen, camera);
        let visible = self.visible_at(level, &camera.frustum());
        let issued = visible.into_iter().filter(|&index| self.request_node(index)).count();
        if issued > 0 {
            tracing::debug!(level, issued, in_flight = self.in_flight, "requested tile textures");
        }
        issued
    }

    /// Request every node of `level`, visible or not.
    pub fn request_level(&mut self, level: usize) -> usize {
        if self.disposed {
            tracing::warn!("request_level called on a disposed pyramid");
            return 0;
        }
        let Some(info) = self.layout.level(level).copied() else {
            tracing::warn!(level, levels = self.level_count(), "no such pyramid level");
            return 0;
        };
        info.indices().filter(|&index| self.request_node(index)).count()
    }

    /// Move a node out of `Init` and spawn its layer fetches.
    ///
    /// Returns `true` when fetches were issued.
    fn request_node(&mut self, index: usize) -> bool {
        let Some(node) = self.layout.nodes.get_mut(index) else {
            return false;
        };
        match node.begin_request() {
            RequestOutcome::Issue => {}
            RequestOutcome::Empty | RequestOutcome::AlreadyRequested => return false,
        }

        for layer in 0..self.layout.layer_count() {
            let Some(url) = self.layout.addresses.resource_id(index, layer) else {
                tracing::error!(node = index, layer, "no resource id for tile layer");
                let result = Err(FetchError::Http(format!("no resource id for layer {}", layer)));
                let _ = self.tx.send(LayerCompletion { index, layer, result });
                continue;
            };
            let fetcher = Arc::clone(&self.fetcher);
            let tx = self.tx.clone();
            tracing::trace!(node = index, layer, url = %url, "requesting tile layer");

            self.runtime.spawn(async move {
                // A panicking fetcher must still settle its layer.
                let result = match AssertUnwindSafe(fetcher.fetch(&url)).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!(node = index, layer, url = %url, "tile fetcher panicked");
                        Err(FetchError::Http("fetch task panicked".to_string()))
                    }
                };
                if tx.send(LayerCompletion { index, layer, result }).is_err() {
                    tracing::trace!(node = index, layer, url = %url, "pyramid gone, dropping layer result");
                }
            });
        }
        self.in_flight += 1;
        true
    }

    /// Number of nodes whose layers have not all settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Apply every completion that has already arrived, without waiting.
    ///
    /// Returns the load events of the nodes that settled.
    pub fn pump_completions(&mut self) -> Vec<TileLoadEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(event) = self.apply(completion) {
                events.push(event);
            }
        }
        events
    }

    /// Wait for the next node to settle.
    ///
    /// Returns `None` once nothing is in flight, or after disposal.
    pub async fn next_load_event(&mut self) -> Option<TileLoadEvent> {
        while self.in_flight > 0 {
            let completion = self.rx.recv().await?;
            if let Some(event) = self.apply(completion) {
                return Some(event);
            }
        }
        None
    }

    fn apply(&mut self, completion: LayerCompletion) -> Option<TileLoadEvent> {
        let LayerCompletion { index, layer, result } = completion;
        let event = self.layout.nodes.get_mut(index)?.settle_layer(layer, result)?;
        self.in_flight = self.in_flight.saturating_sub(1);

        if index == 0 && !event.success {
            let urls = self.resource_ids(0).join("\n");
            tracing::error!(node = index, "unable to load image data for the root tile, urls:\n{}", urls);
        }
        Some(event)
    }

    // =========================================================================
    // Level selection and visibility
    // =========================================================================

    /// Level whose resolution matches the image's on-screen footprint.
    pub fn required_level<C: Camera + ?Sized>(&self, screen: Vec2, camera: &C) -> usize {
        let required = lod::required_resolution(camera, screen, self.layout.reference_corners());
        let level = lod::select_level(self.layout.levels(), required, self.options.overflow);
        tracing::trace!(level, required_x = required.x, required_y = required.y, "required level");
        level
    }

    /// Indices of the nodes of `level` whose bounding sphere intersects the
    /// camera frustum.
    pub fn visible_nodes<C: Camera + ?Sized>(&self, level: usize, camera: &C) -> Vec<usize> {
        self.visible_at(level, &camera.frustum())
    }

    fn visible_at(&self, level: usize, frustum: &Frustum) -> Vec<usize> {
        let Some(info) = self.layout.level(level) else {
            return Vec::new();
        };
        info.indices()
            .filter(|&index| {
                self.layout
                    .nodes
                    .get(index)
                    .is_some_and(|node| frustum.intersects_sphere(node.bounds()))
            })
            .collect()
    }

    /// Best currently available approximation of the visible area.
    ///
    /// Serves the finest level at or below the required one whose visible
    /// nodes have all settled. Errored nodes are replaced by their nearest
    /// error-free ancestor, which is listed first. Tiles outside the content
    /// region are included with no surface. Never fetches.
    pub fn available_tiles<C: Camera + ?Sized>(&self, screen: Vec2, camera: &C) -> Vec<TileHandle> {
        if self.disposed {
            tracing::warn!("available_tiles called on a disposed pyramid");
            return Vec::new();
        }
        let frustum = camera.frustum();
        let required = self.required_level(screen, camera);

        for level in (0..=required).rev() {
            let visible = self.visible_at(level, &frustum);
            if visible.iter().all(|&index| self.layout.nodes[index].is_settled()) {
                if level < required {
                    tracing::trace!(required, served = level, "falling back to coarser level");
                }
                return self.collect_tiles(&visible);
            }
        }
        Vec::new()
    }

    fn collect_tiles(&self, visible: &[usize]) -> Vec<TileHandle> {
        let show_bounds = self.options.show_bounding_spheres;
        let mut substitutes: Vec<usize> = Vec::new();
        let mut tiles = Vec::with_capacity(visible.len());

        for &index in visible {
            let node = &self.layout.nodes[index];
            if node.load_error() {
                if let Some(ancestor) = self.renderable_ancestor(index) {
                    if !substitutes.contains(&ancestor) {
                        substitutes.push(ancestor);
                    }
                }
                continue;
            }
            tiles.push(TileHandle::from_node(node, show_bounds));
        }

        substitutes
            .into_iter()
            .map(|index| TileHandle::from_node(&self.layout.nodes[index], show_bounds))
            .chain(tiles)
            .collect()
    }

    fn renderable_ancestor(&self, index: usize) -> Option<usize> {
        let mut current = parent_index(index);
        while let Some(candidate) = current {
            if self.layout.nodes[candidate].is_renderable() {
                return Some(candidate);
            }
            current = parent_index(candidate);
        }
        None
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Re-assemble the surface of every loaded, error-free node, e.g. after
    /// the shading pipeline changed. Clears the texture cache.
    pub fn rebuild_surfaces(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        let rebuilt = self
            .layout
            .nodes
            .iter_mut()
            .map(TileNode::rebuild_surface)
            .filter(|&rebuilt| rebuilt)
            .count();
        self.fetcher.clear_cache();
        tracing::debug!(rebuilt, "tile surfaces rebuilt");
        rebuilt
    }

    /// Release every node and stop accepting completions.
    ///
    /// Fetches still running are not cancelled; their results are discarded
    /// when they arrive. Calling this more than once has no effect.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for node in &mut self.layout.nodes {
            node.dispose();
        }
        self.layout.nodes.clear();
        self.rx.close();
        self.in_flight = 0;
        self.fetcher.clear_cache();
        self.disposed = true;
        tracing::debug!("tile pyramid disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    pub fn options(&self) -> &PyramidOptions {
        &self.options
    }

    pub fn levels(&self) -> &[LevelInfo] {
        self.layout.levels()
    }

    pub fn level_count(&self) -> usize {
        self.layout.level_count()
    }

    /// Node by index; `None` out of range or after disposal.
    pub fn node(&self, index: usize) -> Option<&TileNode> {
        self.layout.node(index)
    }

    pub fn nodes(&self) -> &[TileNode] {
        self.layout.nodes()
    }

    pub fn node_count(&self) -> usize {
        self.layout.node_count()
    }

    pub fn layer_count(&self) -> usize {
        self.layout.layer_count()
    }

    /// Placement of the root plane, for picking and camera framing.
    pub fn root_placement(&self) -> Placement {
        self.layout.root_placement()
    }

    /// Center of the image in the scene.
    pub fn center(&self) -> Vec3 {
        self.layout.root_placement().center
    }

    /// Resource identifiers of every layer of node `index`.
    pub fn resource_ids(&self, index: usize) -> Vec<String> {
        self.layout.resource_ids(index)
    }
}

impl std::fmt::Debug for TilePyramid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TilePyramid")
            .field("levels", &self.level_count())
            .field("nodes", &self.node_count())
            .field("in_flight", &self.in_flight)
            .field("disposed", &self.disposed)
            .finish()
    }
}
