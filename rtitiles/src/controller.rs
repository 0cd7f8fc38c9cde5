//! Per-image driver for a [`TilePyramid`].
//!
//! The controller is what an image object embeds. It owns at most one pyramid,
//! forwards viewport changes to [`TilePyramid::request_textures`], and once
//! per frame pumps fetch completions and refreshes the active tile set.

use std::sync::Arc;

use glam::Vec2;

use crate::camera::Camera;
use crate::config::{ContentDescription, PyramidConfig, PyramidOptions};
use crate::error::PyramidError;
use crate::fetch::TileFetcher;
use crate::node::TileLoadEvent;
use crate::pyramid::{TileHandle, TilePyramid};

/// Callback invoked for every node that settles.
pub type LoadListener = Box<dyn FnMut(TileLoadEvent) + Send>;

/// Owns the pyramid of the currently loaded image.
pub struct PyramidController {
    fetcher: Arc<dyn TileFetcher>,
    options: PyramidOptions,
    pyramid: Option<TilePyramid>,
    active: Vec<TileHandle>,
    listener: Option<LoadListener>,
}

impl PyramidController {
    /// Create a controller with no image loaded.
    pub fn new(fetcher: Arc<dyn TileFetcher>, options: PyramidOptions) -> Self {
        Self {
            fetcher,
            options,
            pyramid: None,
            active: Vec::new(),
            listener: None,
        }
    }

    /// Set the load listener.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: FnMut(TileLoadEvent) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn set_listener(&mut self, listener: Option<LoadListener>) {
        self.listener = listener;
    }

    /// Replace the current image.
    ///
    /// The previous pyramid is disposed first, even if building the new one
    /// fails.
    pub fn load(
        &mut self,
        config: PyramidConfig,
        content: ContentDescription,
    ) -> Result<(), PyramidError> {
        self.unload();
        let pyramid = TilePyramid::new(
            config,
            content,
            self.options.clone(),
            Arc::clone(&self.fetcher),
        )?;
        self.pyramid = Some(pyramid);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.pyramid.is_some()
    }

    pub fn pyramid(&self) -> Option<&TilePyramid> {
        self.pyramid.as_ref()
    }

    /// Camera or viewport changed: request what the new view needs.
    pub fn view_changed<C: Camera + ?Sized>(&mut self, screen: Vec2, camera: &C) -> usize {
        match self.pyramid.as_mut() {
            Some(pyramid) => pyramid.request_textures(screen, camera),
            None => 0,
        }
    }

    /// Per-frame update: apply finished fetches, notify the listener and
    /// recompute the tiles to draw.
    pub fn update_frame<C: Camera + ?Sized>(&mut self, screen: Vec2, camera: &C) -> &[TileHandle] {
        let Some(pyramid) = self.pyramid.as_mut() else {
            self.active.clear();
            return &self.active;
        };

        let events = pyramid.pump_completions();
        if let Some(listener) = self.listener.as_mut() {
            for event in events {
                listener(event);
            }
        }
        self.active = pyramid.available_tiles(screen, camera);
        &self.active
    }

    /// Tiles selected by the last [`PyramidController::update_frame`].
    pub fn active_tiles(&self) -> &[TileHandle] {
        &self.active
    }

    /// Rebuild every tile surface after a change in the shading pipeline.
    pub fn rebuild_materials(&mut self) -> usize {
        let rebuilt = self
            .pyramid
            .as_mut()
            .map(TilePyramid::rebuild_surfaces)
            .unwrap_or(0);
        // Handles keep the old surfaces alive until the next frame.
        self.active.clear();
        rebuilt
    }

    /// Dispose the current pyramid, if any.
    pub fn unload(&mut self) {
        self.active.clear();
        if let Some(mut pyramid) = self.pyramid.take() {
            pyramid.dispose();
        }
    }
}

impl Drop for PyramidController {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::Vec3;
    use parking_lot::Mutex;

    use super::*;
    use crate::camera::OrthographicCamera;
    use crate::config::{GeometryType, ImageVariant, TilingStrategy};
    use crate::fetch::MockFetcher;

    fn config() -> PyramidConfig {
        PyramidConfig {
            max_width: 512,
            max_height: 512,
            content_width: 512,
            content_height: 512,
            tile_edge: 256,
            layer_count: 4,
            tiling_strategy: TilingStrategy::Indexed,
            image_format: "png".to_string(),
            resource_prefixes: (0..4).map(|l| format!("img/l{}/", l)).collect(),
        }
    }

    fn content() -> ContentDescription {
        ContentDescription::new(ImageVariant::Lrgbg, GeometryType::Plane)
    }

    fn camera() -> OrthographicCamera {
        OrthographicCamera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 3.75, 3.75)
    }

    async fn frames_until<F>(controller: &mut PyramidController, mut done: F)
    where
        F: FnMut(&[TileHandle]) -> bool,
    {
        let screen = Vec2::new(512.0, 512.0);
        let camera = camera();
        for _ in 0..200 {
            if done(controller.update_frame(screen, &camera)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("frames never reached the expected state");
    }

    #[tokio::test]
    async fn test_update_frame_without_image() {
        let mut controller = PyramidController::new(Arc::new(MockFetcher::new()), PyramidOptions::default());
        assert!(!controller.is_loaded());
        assert!(controller.update_frame(Vec2::new(512.0, 512.0), &camera()).is_empty());
        assert_eq!(controller.view_changed(Vec2::new(512.0, 512.0), &camera()), 0);
        assert_eq!(controller.rebuild_materials(), 0);
    }

    #[tokio::test]
    async fn test_streams_to_required_level_and_notifies_listener() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut controller =
            PyramidController::new(Arc::new(MockFetcher::new()), PyramidOptions::default())
                .with_listener(move |event| sink.lock().push(event));

        controller.load(config(), content()).unwrap();
        frames_until(&mut controller, |tiles| tiles.len() == 1).await;
        assert_eq!(controller.active_tiles()[0].index, 0);

        assert_eq!(controller.view_changed(Vec2::new(512.0, 512.0), &camera()), 4);
        frames_until(&mut controller, |tiles| tiles.len() == 4).await;
        assert!(controller.active_tiles().iter().all(|t| t.level == 1));
        assert_eq!(events.lock().len(), 5);
        assert!(events.lock().iter().all(|e| e.success));
    }

    #[tokio::test]
    async fn test_load_replaces_and_disposes_previous() {
        let mock = MockFetcher::new();
        let mut controller = PyramidController::new(Arc::new(mock.clone()), PyramidOptions::default());

        controller.load(config(), content()).unwrap();
        controller.load(config(), content()).unwrap();
        assert_eq!(mock.cache_clears(), 1);
        assert!(controller.is_loaded());

        let halfdome = ContentDescription::new(ImageVariant::Lrgbg, GeometryType::HalfDome);
        assert!(controller.load(config(), halfdome).is_err());
        assert!(!controller.is_loaded());
        assert_eq!(mock.cache_clears(), 2);
    }

    #[tokio::test]
    async fn test_rebuild_materials_clears_active_tiles() {
        let mock = MockFetcher::new();
        let mut controller = PyramidController::new(Arc::new(mock.clone()), PyramidOptions::default());
        controller.load(config(), content()).unwrap();
        frames_until(&mut controller, |tiles| !tiles.is_empty()).await;

        assert_eq!(controller.rebuild_materials(), 1);
        assert!(controller.active_tiles().is_empty());
        assert_eq!(mock.cache_clears(), 1);
    }

    #[tokio::test]
    async fn test_drop_disposes_pyramid() {
        let mock = MockFetcher::new();
        {
            let mut controller =
                PyramidController::new(Arc::new(mock.clone()), PyramidOptions::default());
            controller.load(config(), content()).unwrap();
        }
        assert_eq!(mock.cache_clears(), 1);
    }
}
