//! Light types for the scene
//!
//! Position (and for spot lights, direction) comes from the `Transform` on
//! the same entity.

use bevy_ecs::prelude::*;
use glam::Vec4;

/// Point light component
#[derive(Component, Debug, Clone, PartialEq)]
pub struct PointLight {
    /// RGBA color
    pub color: Vec4,
    pub intensity: f32,
    /// Radius of the bounding sphere used for culling and attenuation
    pub radius: f32,
    pub falloff: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            intensity: 1.0,
            radius: 1.0,
            falloff: 2.0,
        }
    }
}

impl PointLight {
    pub fn new(color: Vec4, intensity: f32, radius: f32) -> Self {
        Self {
            color,
            intensity,
            radius,
            ..Default::default()
        }
    }
}

/// Spot light component.
///
/// The cone angles are only reachable through setters so the cosines used
/// by the lighting shader are computed once, when an angle changes.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct SpotLight {
    pub color: Vec4,
    pub intensity: f32,
    pub enabled: bool,
    /// Reach of the cone for culling; 0 means unbounded
    pub range: f32,
    inner_angle: f32,
    outer_angle: f32,
    cos_inner: f32,
    cos_outer: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self::new(Vec4::ONE, 1.0, std::f32::consts::FRAC_PI_6, std::f32::consts::FRAC_PI_4)
    }
}

impl SpotLight {
    /// Angles in radians, measured from the cone axis
    pub fn new(color: Vec4, intensity: f32, inner_angle: f32, outer_angle: f32) -> Self {
        Self {
            color,
            intensity,
            enabled: true,
            range: 0.0,
            inner_angle,
            outer_angle,
            cos_inner: inner_angle.cos(),
            cos_outer: outer_angle.cos(),
        }
    }

    pub fn inner_angle(&self) -> f32 {
        self.inner_angle
    }

    pub fn outer_angle(&self) -> f32 {
        self.outer_angle
    }

    pub fn set_inner_angle(&mut self, radians: f32) {
        self.inner_angle = radians;
        self.cos_inner = radians.cos();
    }

    pub fn set_outer_angle(&mut self, radians: f32) {
        self.outer_angle = radians;
        self.cos_outer = radians.cos();
    }

    pub fn cos_inner_angle(&self) -> f32 {
        self.cos_inner
    }

    pub fn cos_outer_angle(&self) -> f32 {
        self.cos_outer
    }

    /// Whether the light has a finite reach that can be tested against a frustum
    pub fn is_bounded(&self) -> bool {
        self.range > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_light_defaults() {
        let light = PointLight::default();
        assert_eq!(light.color, Vec4::ONE);
        assert_eq!(light.intensity, 1.0);
    }

    #[test]
    fn test_spot_light_caches_cosines() {
        let mut light = SpotLight::default();
        light.set_inner_angle(0.0);
        light.set_outer_angle(std::f32::consts::FRAC_PI_2);

        assert_eq!(light.cos_inner_angle(), 1.0);
        assert!(light.cos_outer_angle().abs() < 1e-6);
        assert_eq!(light.outer_angle(), std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_spot_light_unbounded_by_default() {
        let light = SpotLight::default();
        assert!(light.enabled);
        assert!(!light.is_bounded());
    }
}
