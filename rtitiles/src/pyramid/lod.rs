//! Level-of-detail selection.
//!
//! The on-screen footprint of the image is estimated by projecting the two
//! reference corners of the root plane to normalized device coordinates. Half
//! the absolute NDC difference, times the screen resolution, is the number of
//! pixels the image covers; the first level whose resolution reaches that in
//! both axes is the one to show.

use glam::{Vec2, Vec3};

use super::layout::LevelInfo;
use crate::camera::Camera;
use crate::config::LodOverflow;

/// Pixel resolution needed to show the surface spanned by `corners` without
/// magnification.
pub fn required_resolution<C: Camera + ?Sized>(
    camera: &C,
    screen: Vec2,
    corners: (Vec3, Vec3),
) -> Vec2 {
    let upper_left = camera.project(corners.0);
    let lower_right = camera.project(corners.1);
    let extent = (lower_right - upper_left).truncate().abs();
    screen * extent / 2.0
}

/// First level whose resolution is at least `required` in both axes.
///
/// When no level is fine enough, `overflow` decides between the coarsest and
/// the finest level. A non-finite requirement (camera inside the plane) is
/// treated the same way.
pub fn select_level(levels: &[LevelInfo], required: Vec2, overflow: LodOverflow) -> usize {
    let found = levels.iter().position(|level| {
        let resolution = level.resolution.as_vec2();
        resolution.x >= required.x && resolution.y >= required.y
    });

    match found {
        Some(level) => level,
        None => match overflow {
            LodOverflow::Coarsest => 0,
            LodOverflow::Finest => levels.len().saturating_sub(1),
        },
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;
    use crate::camera::{OrthographicCamera, PerspectiveCamera};

    fn levels(resolutions: &[u32]) -> Vec<LevelInfo> {
        resolutions
            .iter()
            .enumerate()
            .map(|(i, &r)| LevelInfo {
                resolution: UVec2::splat(r),
                first_index: (4usize.pow(i as u32) - 1) / 3,
                node_count: 4usize.pow(i as u32),
            })
            .collect()
    }

    fn corners(scale: f32) -> (Vec3, Vec3) {
        (
            Vec3::new(-scale / 2.0, scale / 2.0, 0.0),
            Vec3::new(scale / 2.0, -scale / 2.0, 0.0),
        )
    }

    #[test]
    fn test_half_viewport_selects_middle_level() {
        // The plane spans half the view volume in both axes.
        let camera = OrthographicCamera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 7.5, 7.5);
        let required = required_resolution(&camera, Vec2::new(800.0, 600.0), corners(7.5));
        assert!((required.x - 400.0).abs() < 1e-3);
        assert!((required.y - 300.0).abs() < 1e-3);

        let level = select_level(&levels(&[256, 512, 1024]), required, LodOverflow::Coarsest);
        assert_eq!(level, 1);
    }

    #[test]
    fn test_exact_match_is_accepted() {
        let level = select_level(
            &levels(&[256, 512, 1024]),
            Vec2::new(512.0, 100.0),
            LodOverflow::Coarsest,
        );
        assert_eq!(level, 1);
    }

    #[test]
    fn test_both_axes_must_fit() {
        let level = select_level(
            &levels(&[256, 512, 1024]),
            Vec2::new(100.0, 600.0),
            LodOverflow::Coarsest,
        );
        assert_eq!(level, 2);
    }

    #[test]
    fn test_overflow_policy() {
        let levels = levels(&[256, 512, 1024]);
        let required = Vec2::new(4000.0, 3000.0);
        assert_eq!(select_level(&levels, required, LodOverflow::Coarsest), 0);
        assert_eq!(select_level(&levels, required, LodOverflow::Finest), 2);
    }

    #[test]
    fn test_non_finite_requirement_overflows() {
        let levels = levels(&[256, 512]);
        assert_eq!(select_level(&levels, Vec2::splat(f32::NAN), LodOverflow::Coarsest), 0);
        assert_eq!(select_level(&levels, Vec2::splat(f32::NAN), LodOverflow::Finest), 1);
    }

    #[test]
    fn test_closer_camera_needs_finer_level() {
        let levels = levels(&[256, 512, 1024, 2048]);
        let screen = Vec2::new(1024.0, 1024.0);
        let far = PerspectiveCamera::new(Vec3::new(0.0, 0.0, 40.0), Vec3::ZERO, 0.8, 1.0);
        let near = PerspectiveCamera::new(Vec3::new(0.0, 0.0, 6.0), Vec3::ZERO, 0.8, 1.0);

        let far_level = select_level(
            &levels,
            required_resolution(&far, screen, corners(7.5)),
            LodOverflow::Coarsest,
        );
        let near_level = select_level(
            &levels,
            required_resolution(&near, screen, corners(7.5)),
            LodOverflow::Coarsest,
        );
        assert!(near_level > far_level, "near {} far {}", near_level, far_level);
    }
}
