//! Integration tests for the tile pyramid.
//!
//! These tests drive the public API end to end:
//! - construction → root load → viewport requests → available tiles
//! - fallback while finer tiles are pending or errored
//! - region (IIIF) addressing through a real pyramid
//! - the shared texture cache in front of a fetcher
//!
//! Run with: `cargo test --test pyramid_integration`

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use glam::{Vec2, Vec3};
use parking_lot::Mutex;

use rtitiles::fetch::BoxFuture;
use rtitiles::{
    CachedFetcher, ContentDescription, FetchError, GeometryType, ImageVariant, LoadState,
    OrthographicCamera, PerspectiveCamera, PyramidConfig, PyramidOptions, TextureCache,
    TileFetcher, TileHandle, TileLoadEvent, TilePyramid, TilingStrategy,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// Fetcher that records requests and fails URLs containing any given pattern.
#[derive(Clone, Default)]
struct RecordingFetcher {
    requests: Arc<Mutex<Vec<String>>>,
    failing: Arc<Vec<String>>,
}

impl RecordingFetcher {
    fn failing(patterns: &[&str]) -> Self {
        Self {
            requests: Arc::default(),
            failing: Arc::new(patterns.iter().map(|p| p.to_string()).collect()),
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl TileFetcher for RecordingFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            self.requests.lock().push(url.to_string());
            tokio::task::yield_now().await;
            if self.failing.iter().any(|p| url.contains(p.as_str())) {
                return Err(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                });
            }
            Ok(Bytes::from(url.to_string()))
        })
    }
}

fn config(strategy: TilingStrategy) -> PyramidConfig {
    PyramidConfig {
        max_width: 1024,
        max_height: 1024,
        content_width: 1024,
        content_height: 1024,
        tile_edge: 256,
        layer_count: 4,
        tiling_strategy: strategy,
        image_format: "jpg".to_string(),
        resource_prefixes: (0..4).map(|l| format!("http://tiles/l{}/", l)).collect(),
    }
}

fn content() -> ContentDescription {
    ContentDescription::new(ImageVariant::Lrgbg, GeometryType::Plane)
}

fn build(fetcher: Arc<dyn TileFetcher>) -> TilePyramid {
    TilePyramid::new(
        config(TilingStrategy::Indexed),
        content(),
        PyramidOptions::default(),
        fetcher,
    )
    .expect("valid pyramid")
}

/// Camera whose view exactly contains the plane; at 1024×1024 this needs the
/// finest level.
fn full_view() -> OrthographicCamera {
    OrthographicCamera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 3.75, 3.75)
}

const SCREEN: Vec2 = Vec2::new(1024.0, 1024.0);

/// Wait until every in-flight node has settled.
async fn drain(pyramid: &mut TilePyramid) -> Vec<TileLoadEvent> {
    let mut events = Vec::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), pyramid.next_load_event())
            .await
            .expect("load events stalled");
        match next {
            Some(event) => events.push(event),
            None => return events,
        }
    }
}

fn levels_of(tiles: &[TileHandle]) -> Vec<usize> {
    tiles.iter().map(|t| t.level).collect()
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_streams_from_root_to_finest_level() {
    let fetcher = RecordingFetcher::default();
    let mut pyramid = build(Arc::new(fetcher.clone()));
    let camera = full_view();

    drain(&mut pyramid).await;
    assert_eq!(levels_of(&pyramid.available_tiles(SCREEN, &camera)), vec![0]);

    assert_eq!(pyramid.required_level(SCREEN, &camera), 2);
    assert_eq!(pyramid.request_textures(SCREEN, &camera), 16);

    // Level 2 is not settled yet and level 1 was never requested.
    assert_eq!(levels_of(&pyramid.available_tiles(SCREEN, &camera)), vec![0]);

    let events = drain(&mut pyramid).await;
    assert_eq!(events.len(), 16);
    let tiles = pyramid.available_tiles(SCREEN, &camera);
    assert_eq!(tiles.len(), 16);
    assert!(tiles.iter().all(|t| t.level == 2 && t.has_content()));

    // Root plus sixteen tiles, four layers each.
    assert_eq!(fetcher.requests().len(), 68);
}

#[tokio::test]
async fn test_every_returned_tile_is_loaded() {
    let fetcher = RecordingFetcher::default();
    let mut pyramid = build(Arc::new(fetcher));
    let camera =
        PerspectiveCamera::new(Vec3::new(1.0, -1.0, 6.0), Vec3::new(1.0, -1.0, 0.0), 0.9, 1.5);
    let screen = Vec2::new(1200.0, 800.0);

    for _ in 0..3 {
        pyramid.request_textures(screen, &camera);
        for tile in pyramid.available_tiles(screen, &camera) {
            let node = pyramid.node(tile.index).unwrap();
            assert_eq!(node.state(), LoadState::Loaded);
        }
        tokio::task::yield_now().await;
        pyramid.pump_completions();
    }
}

#[tokio::test]
async fn test_zooming_in_requests_only_visible_tiles() {
    let fetcher = RecordingFetcher::default();
    let mut pyramid = build(Arc::new(fetcher.clone()));
    drain(&mut pyramid).await;

    // Close-up on the lower-left corner.
    let camera = OrthographicCamera::new(
        Vec3::new(-3.0, -3.0, 10.0),
        Vec3::new(-3.0, -3.0, 0.0),
        1.2,
        1.2,
    );
    let screen = Vec2::new(256.0, 256.0);
    assert_eq!(pyramid.required_level(screen, &camera), 2);

    let issued = pyramid.request_textures(screen, &camera);
    assert!(issued < 16, "issued {}", issued);
    drain(&mut pyramid).await;

    let tiles = pyramid.available_tiles(screen, &camera);
    assert_eq!(tiles.len(), issued);
    for tile in &tiles {
        assert!(tile.placement.center.x < 0.0 && tile.placement.center.y < 0.0);
    }
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test]
async fn test_errored_siblings_share_one_fallback_ancestor() {
    // Nodes 5 and 6, both children of node 1.
    let fetcher = RecordingFetcher::failing(&["/6_", "/7_"]);
    let mut pyramid = build(Arc::new(fetcher));

    pyramid.request_level(1);
    pyramid.request_level(2);
    let events = drain(&mut pyramid).await;
    assert_eq!(events.iter().filter(|e| !e.success).count(), 2);

    let tiles = pyramid.available_tiles(SCREEN, &full_view());
    assert_eq!(tiles.len(), 15);
    assert_eq!(tiles[0].index, 1);
    assert_eq!(tiles[0].level, 1);
    assert!(tiles[1..].iter().all(|t| t.level == 2));
    assert!(!tiles.iter().any(|t| t.index == 5 || t.index == 6));
}

#[tokio::test]
async fn test_fallback_skips_errored_ancestors() {
    // Node 1 and its child node 5 both fail; the root stands in.
    let fetcher = RecordingFetcher::failing(&["/2_", "/6_"]);
    let mut pyramid = build(Arc::new(fetcher));

    pyramid.request_level(1);
    pyramid.request_level(2);
    drain(&mut pyramid).await;

    let tiles = pyramid.available_tiles(SCREEN, &full_view());
    assert_eq!(tiles[0].index, 0);
    assert_eq!(tiles.len(), 16);
}

#[tokio::test]
async fn test_no_retries_after_failure() {
    let fetcher = RecordingFetcher::failing(&["/3_"]);
    let mut pyramid = build(Arc::new(fetcher.clone()));

    pyramid.request_level(1);
    drain(&mut pyramid).await;
    let before = fetcher.requests().len();

    pyramid.request_level(1);
    pyramid.request_textures(SCREEN, &full_view());
    drain(&mut pyramid).await;
    let retried = fetcher.requests()[before..]
        .iter()
        .filter(|url| url.contains("/3_"))
        .count();
    assert_eq!(retried, 0);
    assert!(pyramid.node(2).unwrap().load_error());
}

// ============================================================================
// Addressing and Caching
// ============================================================================

#[tokio::test]
async fn test_region_strategy_urls() {
    let fetcher = RecordingFetcher::default();
    let mut pyramid = TilePyramid::new(
        config(TilingStrategy::Region),
        content(),
        PyramidOptions::default(),
        Arc::new(fetcher.clone()),
    )
    .unwrap();
    pyramid.request_level(1);
    drain(&mut pyramid).await;

    let requests = fetcher.requests();
    assert!(requests.contains(&"http://tiles/l0//0,0,1024,1024/256,256/0/default.jpg".to_string()));
    assert!(requests.contains(&"http://tiles/l3//512,512,512,512/256,256/0/default.jpg".to_string()));
    assert_eq!(requests.len(), 20);
}

#[tokio::test]
async fn test_shared_texture_cache_serves_second_pyramid() {
    let inner = RecordingFetcher::default();
    let cache = TextureCache::new(16 * 1024 * 1024);
    let fetcher: Arc<dyn TileFetcher> = Arc::new(CachedFetcher::new(inner.clone(), cache.clone()));

    let mut first = build(Arc::clone(&fetcher));
    drain(&mut first).await;
    assert_eq!(inner.requests().len(), 4);

    let mut second = build(Arc::clone(&fetcher));
    drain(&mut second).await;
    assert_eq!(inner.requests().len(), 4);
    assert_eq!(cache.stats().hits, 4);

    let root = second.node(0).unwrap().surface().unwrap();
    assert_eq!(root.layers[2], Bytes::from_static(b"http://tiles/l2/1_3.jpg"));

    first.dispose();
    assert!(!cache.contains("http://tiles/l0/1_1.jpg"));
}
