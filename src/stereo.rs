//! Head-mounted display geometry
//!
//! [`StereoProfile::compute`] derives everything the stereo pipeline needs
//! from an [`HmdInfo`] descriptor: the oversized render-target size, per-eye
//! viewports and projections, and the lens-distortion shader parameters.
//! It is a pure function; a profile is recomputed only on a mode change.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::backend::Viewport;

/// Render-target oversampling so the distortion pass keeps peripheral detail
pub const OVERSAMPLING: f32 = 1.25;

/// Scale applied to the interpupillary distance to get the view-space eye separation
pub const VIEW_IPD_SCALE: f32 = 0.1;

/// Physical description of a head-mounted display. Lengths are in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmdInfo {
    pub h_resolution: u32,
    pub v_resolution: u32,
    pub h_screen_size: f32,
    pub v_screen_size: f32,
    pub eye_to_screen_distance: f32,
    pub lens_separation_distance: f32,
    pub interpupillary_distance: f32,
    /// Barrel distortion polynomial coefficients
    pub distortion_k: [f32; 4],
    /// Chromatic aberration correction coefficients
    pub chroma_ab_correction: [f32; 4],
}

impl HmdInfo {
    /// Oculus Rift development kit 1
    pub fn rift_dk1() -> Self {
        Self {
            h_resolution: 1280,
            v_resolution: 800,
            h_screen_size: 0.14976,
            v_screen_size: 0.0936,
            eye_to_screen_distance: 0.041,
            lens_separation_distance: 0.0635,
            interpupillary_distance: 0.064,
            distortion_k: [1.0, 0.22, 0.24, 0.0],
            chroma_ab_correction: [0.996, -0.004, 1.014, 0.0],
        }
    }
}

/// Left/right pair of a per-eye value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyePair<T> {
    pub left: T,
    pub right: T,
}

impl EyePair<Vec2> {
    /// Left in `xy`, right in `zw`, the layout the distortion shader expects
    pub fn packed(&self) -> Vec4 {
        Vec4::new(self.left.x, self.left.y, self.right.x, self.right.y)
    }
}

/// Stereo rendering parameters derived from an [`HmdInfo`]
#[derive(Debug, Clone, PartialEq)]
pub struct StereoProfile {
    /// Size of the combined stereo render target
    pub target_width: u32,
    pub target_height: u32,
    pub viewports: EyePair<Viewport>,
    pub projections: EyePair<Mat4>,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Per-eye aspect ratio
    pub aspect: f32,
    /// Horizontal clip-space shift applied to each eye's projection
    pub projection_offset: f32,
    pub lens_centers: EyePair<Vec2>,
    pub screen_centers: EyePair<Vec2>,
    pub scale_in: Vec2,
    pub scale_out: Vec2,
    pub distortion_k: Vec4,
    pub chroma_ab: Vec4,
    /// Eye separation used for view matrices
    pub view_ipd: f32,
}

impl StereoProfile {
    pub fn compute(hmd: &HmdInfo, near: f32, far: f32) -> Self {
        let target_width = (hmd.h_resolution as f32 * OVERSAMPLING) as u32;
        let target_height = (hmd.v_resolution as f32 * OVERSAMPLING) as u32;

        // Normalized layout of one eye inside the full panel
        let screen_width = 0.5;
        let screen_height = 1.0;
        let right_x = 0.5;

        let fov = 2.0 * (hmd.v_screen_size / (2.0 * hmd.eye_to_screen_distance)).atan();
        let lens_shift = hmd.h_screen_size * 0.25 - hmd.lens_separation_distance * 0.5;
        let projection_offset = 4.0 * lens_shift / hmd.h_screen_size;
        let aspect = hmd.h_resolution as f32 / (2.0 * hmd.v_resolution as f32);
        let scale_factor = 1.0 / OVERSAMPLING;
        let x_center = 1.0 - 2.0 * hmd.lens_separation_distance / hmd.h_screen_size;

        let lens_centers = EyePair {
            left: Vec2::new((screen_width + x_center * 0.5) * 0.5, screen_height * 0.5),
            right: Vec2::new(
                right_x + (screen_width - x_center * 0.5) * 0.5,
                screen_height * 0.5,
            ),
        };
        let screen_centers = EyePair {
            left: Vec2::new(screen_width * 0.5, screen_height * 0.5),
            right: Vec2::new(right_x + screen_width * 0.5, screen_height * 0.5),
        };
        let scale_out = Vec2::new(
            screen_width / 2.0 * scale_factor,
            screen_height / 2.0 * scale_factor * aspect,
        );
        let scale_in = Vec2::new(2.0 / screen_width, 2.0 / screen_height / aspect);

        let half_width = target_width / 2;
        let viewports = EyePair {
            left: Viewport::new(0, 0, half_width, target_height),
            right: Viewport::new(half_width as i32, 0, half_width, target_height),
        };

        let base = Mat4::perspective_rh_gl(fov, aspect, near, far);
        let projections = EyePair {
            left: Mat4::from_translation(Vec3::new(projection_offset, 0.0, 0.0)) * base,
            right: Mat4::from_translation(Vec3::new(-projection_offset, 0.0, 0.0)) * base,
        };

        Self {
            target_width,
            target_height,
            viewports,
            projections,
            fov,
            aspect,
            projection_offset,
            lens_centers,
            screen_centers,
            scale_in,
            scale_out,
            distortion_k: Vec4::from_array(hmd.distortion_k),
            chroma_ab: Vec4::from_array(hmd.chroma_ab_correction),
            view_ipd: hmd.interpupillary_distance * VIEW_IPD_SCALE,
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    #[test]
    fn test_dk1_target_size() {
        let profile = StereoProfile::compute(&HmdInfo::rift_dk1(), 0.1, 10000.0);
        assert_eq!(profile.target_size(), (1600, 1000));
        assert_eq!(profile.viewports.left, Viewport::new(0, 0, 800, 1000));
        assert_eq!(profile.viewports.right, Viewport::new(800, 0, 800, 1000));
    }

    #[test]
    fn test_dk1_projections_differ_only_in_offset_sign() {
        let profile = StereoProfile::compute(&HmdInfo::rift_dk1(), 0.1, 10000.0);
        let left = profile.projections.left;
        let right = profile.projections.right;

        assert_ne!(left, right);
        assert_eq!(left.x_axis, right.x_axis);
        assert_eq!(left.y_axis, right.y_axis);
        assert_eq!(left.w_axis, right.w_axis);
        assert_eq!(left.z_axis.yzw(), right.z_axis.yzw());
        assert_eq!(left.z_axis.x, -right.z_axis.x);
        assert!((left.z_axis.x.abs() - profile.projection_offset).abs() < 1e-6);
    }

    #[test]
    fn test_dk1_lens_geometry() {
        let profile = StereoProfile::compute(&HmdInfo::rift_dk1(), 0.1, 10000.0);

        // Lens shift = 0.03744 - 0.03175
        assert!((profile.projection_offset - 4.0 * 0.00569 / 0.14976).abs() < 1e-4);
        assert!((profile.aspect - 0.8).abs() < 1e-6);
        assert!((profile.fov - 2.0 * (0.0936f32 / 0.082).atan()).abs() < 1e-6);
        assert_eq!(profile.screen_centers.packed(), Vec4::new(0.25, 0.5, 0.75, 0.5));

        // Lens centers mirror around the panel middle
        let l = profile.lens_centers.left.x;
        let r = profile.lens_centers.right.x;
        assert!((l + r - 1.0).abs() < 1e-6);
        assert!(l > 0.25);

        assert!((profile.scale_in - Vec2::new(4.0, 2.5)).length() < 1e-5);
        assert!((profile.scale_out - Vec2::new(0.2, 0.32)).length() < 1e-5);
        assert!((profile.view_ipd - 0.0064).abs() < 1e-7);
    }
}
