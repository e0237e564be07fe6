//! View frustum for light culling

use glam::{Mat4, Vec3, Vec4};

/// Six clip planes extracted from a view-projection matrix.
///
/// Plane normals point inwards; `xyz` is unit length so `dot + w` is a
/// signed distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        let planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r3 + r2, // near
            r3 - r2, // far
        ]
        .map(|plane| {
            let length = plane.truncate().length();
            if length > 0.0 {
                plane / length
            } else {
                plane
            }
        });

        Self { planes }
    }

    /// False only when the sphere lies entirely outside one plane.
    ///
    /// Spheres straddling a corner outside the frustum may still pass.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.intersects_sphere(point, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_frustum() -> Frustum {
        let proj = Mat4::perspective_rh_gl(45f32.to_radians(), 4.0 / 3.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, -Vec3::Z, Vec3::Y);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_sphere_inside() {
        let frustum = camera_frustum();
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0));
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -50.0)));
    }

    #[test]
    fn test_sphere_behind_camera_culled() {
        let frustum = camera_frustum();
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn test_sphere_straddling_plane_kept() {
        let frustum = camera_frustum();
        // Center just behind the near plane, radius reaches into the frustum
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, 1.0), 2.0));
        // Far to the side but large enough to reach in
        assert!(frustum.intersects_sphere(Vec3::new(30.0, 0.0, -10.0), 30.0));
        assert!(!frustum.intersects_sphere(Vec3::new(30.0, 0.0, -10.0), 1.0));
    }

    #[test]
    fn test_beyond_far_plane_culled() {
        let frustum = camera_frustum();
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, -200.0), 10.0));
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -105.0), 10.0));
    }
}
