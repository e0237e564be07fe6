//! Views and the view stack
//!
//! A view turns a pose into a view matrix. Three variants exist:
//! - First-person: yaw/pitch camera that walks on the ground plane
//! - Six-DOF: free quaternion orientation, moves along its local axes
//! - Stereo: head-mounted display, head orientation fed by an external tracker
//!
//! All of them honor the same [`EyeSelection`] semantics so the pipeline can
//! ask any view for per-eye, head-locked or translation-free matrices.

mod frustum;

pub use frustum::*;

use glam::{Mat4, Quat, Vec3};

use crate::scene::{EntityId, Transform};

/// Pitch limit for first-person views
const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// Which matrix a view should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EyeSelection {
    Left,
    Right,
    Center,
    /// Head-locked left eye: eye shift only
    FixedLeft,
    /// Head-locked right eye: eye shift only
    FixedRight,
    /// Rotation only, for geometry at infinite distance
    Infinite,
}

impl EyeSelection {
    /// Lateral eye offset in view space for an interocular distance
    pub fn eye_shift(self, ipd: f32) -> f32 {
        match self {
            EyeSelection::Left | EyeSelection::FixedLeft => ipd * 0.5,
            EyeSelection::Right | EyeSelection::FixedRight => ipd * -0.5,
            EyeSelection::Center | EyeSelection::Infinite => 0.0,
        }
    }

    pub fn is_fixed(self) -> bool {
        matches!(self, EyeSelection::FixedLeft | EyeSelection::FixedRight)
    }

    pub fn includes_translation(self) -> bool {
        !self.is_fixed() && self != EyeSelection::Infinite
    }
}

/// Build a view matrix from a pose according to `selection`
fn compose_view_matrix(position: Vec3, orientation: Quat, selection: EyeSelection, ipd: f32) -> Mat4 {
    let mut view = Mat4::from_translation(Vec3::new(selection.eye_shift(ipd), 0.0, 0.0));
    if !selection.is_fixed() {
        view *= Mat4::from_quat(orientation.inverse());
    }
    if selection.includes_translation() {
        view *= Mat4::from_translation(-position);
    }
    view
}

/// Yaw/pitch camera
#[derive(Debug, Clone, PartialEq)]
pub struct FirstPersonView {
    pub entity: EntityId,
    pub position: Vec3,
    /// Radians around +Y
    yaw: f32,
    /// Radians around local +X, clamped to ±89°
    pitch: f32,
}

impl FirstPersonView {
    pub fn new(entity: EntityId, position: Vec3) -> Self {
        Self {
            entity,
            position,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }

    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        self.yaw += yaw;
        self.pitch = (self.pitch + pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Move relative to the heading; forward movement stays on the ground plane
    pub fn move_by(&mut self, right: f32, up: f32, forward: f32) {
        let heading = Quat::from_rotation_y(self.yaw);
        self.position += heading * Vec3::X * right + Vec3::Y * up + heading * -Vec3::Z * forward;
    }
}

/// Free-flying camera
#[derive(Debug, Clone, PartialEq)]
pub struct SixDofView {
    pub entity: EntityId,
    pub position: Vec3,
    pub orientation: Quat,
}

impl SixDofView {
    pub fn new(entity: EntityId, position: Vec3) -> Self {
        Self {
            entity,
            position,
            orientation: Quat::IDENTITY,
        }
    }

    /// Rotate around the view's local axes (radians)
    pub fn rotate(&mut self, pitch: f32, yaw: f32, roll: f32) {
        let delta = Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, roll);
        self.orientation = (self.orientation * delta).normalize();
    }

    pub fn move_by(&mut self, right: f32, up: f32, forward: f32) {
        self.position += self.orientation * Vec3::new(right, up, -forward);
    }
}

/// Head-mounted display camera
#[derive(Debug, Clone, PartialEq)]
pub struct StereoView {
    pub entity: EntityId,
    pub position: Vec3,
    /// Body heading in radians around +Y
    pub body_yaw: f32,
    /// Latest orientation reported by the head tracker
    pub head_orientation: Quat,
}

impl StereoView {
    pub fn new(entity: EntityId, position: Vec3) -> Self {
        Self {
            entity,
            position,
            body_yaw: 0.0,
            head_orientation: Quat::IDENTITY,
        }
    }

    pub fn set_head_orientation(&mut self, orientation: Quat) {
        self.head_orientation = orientation.normalize();
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.body_yaw) * self.head_orientation
    }

    /// Walk along the body heading, independent of where the head looks
    pub fn move_by(&mut self, right: f32, up: f32, forward: f32) {
        let heading = Quat::from_rotation_y(self.body_yaw);
        self.position += heading * Vec3::new(right, up, -forward);
    }
}

/// A camera on the view stack
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    FirstPerson(FirstPersonView),
    SixDof(SixDofView),
    Stereo(StereoView),
}

impl View {
    /// Build a view for a factory type name, `None` for names that are not views
    pub fn for_type_name(type_name: &str, entity: EntityId, position: Vec3, rotation_degrees: Vec3) -> Option<Self> {
        let radians = Vec3::new(
            rotation_degrees.x.to_radians(),
            rotation_degrees.y.to_radians(),
            rotation_degrees.z.to_radians(),
        );
        let view = match type_name {
            "FPSCamera" => {
                let mut view = FirstPersonView::new(entity, position);
                view.rotate(radians.y, radians.x);
                View::FirstPerson(view)
            }
            "GLSixDOFView" => {
                let mut view = SixDofView::new(entity, position);
                view.orientation = crate::scene::euler_degrees(rotation_degrees);
                View::SixDof(view)
            }
            "RiftCamera" => {
                let mut view = StereoView::new(entity, position);
                view.body_yaw = radians.y;
                View::Stereo(view)
            }
            _ => return None,
        };
        Some(view)
    }

    /// Type name this view is registered under in the factory
    pub fn mode_name(&self) -> &'static str {
        match self {
            View::FirstPerson(_) => "FPSCamera",
            View::SixDof(_) => "GLSixDOFView",
            View::Stereo(_) => "RiftCamera",
        }
    }

    pub fn entity(&self) -> EntityId {
        match self {
            View::FirstPerson(v) => v.entity,
            View::SixDof(v) => v.entity,
            View::Stereo(v) => v.entity,
        }
    }

    pub fn position(&self) -> Vec3 {
        match self {
            View::FirstPerson(v) => v.position,
            View::SixDof(v) => v.position,
            View::Stereo(v) => v.position,
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        match self {
            View::FirstPerson(v) => v.position = position,
            View::SixDof(v) => v.position = position,
            View::Stereo(v) => v.position = position,
        }
    }

    pub fn orientation(&self) -> Quat {
        match self {
            View::FirstPerson(v) => v.orientation(),
            View::SixDof(v) => v.orientation,
            View::Stereo(v) => v.orientation(),
        }
    }

    /// Move in the view's own frame
    pub fn move_by(&mut self, right: f32, up: f32, forward: f32) {
        match self {
            View::FirstPerson(v) => v.move_by(right, up, forward),
            View::SixDof(v) => v.move_by(right, up, forward),
            View::Stereo(v) => v.move_by(right, up, forward),
        }
    }

    /// World-space pose of the viewer
    pub fn transform(&self) -> Transform {
        Transform::from_position_rotation(self.position(), self.orientation())
    }

    /// View matrix for an eye selection and interocular distance.
    ///
    /// Pure: identical state and arguments give bit-identical results.
    pub fn view_matrix(&self, selection: EyeSelection, ipd: f32) -> Mat4 {
        compose_view_matrix(self.position(), self.orientation(), selection, ipd)
    }

    /// Mono view matrix
    pub fn center_matrix(&self) -> Mat4 {
        self.view_matrix(EyeSelection::Center, 0.0)
    }
}

/// Ordered views; the last pushed is the active one
#[derive(Debug, Clone, Default)]
pub struct ViewStack {
    views: Vec<View>,
}

impl ViewStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, view: View) {
        log::debug!("Pushed {} view for entity {}", view.mode_name(), view.entity());
        self.views.push(view);
    }

    /// Remove and drop the active view. Returns false when the stack was empty.
    pub fn pop(&mut self) -> bool {
        self.views.pop().is_some()
    }

    /// View at `index` counted from the bottom, `None` when out of range
    pub fn get(&self, index: usize) -> Option<&View> {
        self.views.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut View> {
        self.views.get_mut(index)
    }

    pub fn top(&self) -> Option<&View> {
        self.views.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut View> {
        self.views.last_mut()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn clear(&mut self) {
        self.views.clear();
    }
}
