//! Screen-space overlays (quads and cursors)
//!
//! Overlays are positioned in normalized screen units with the origin at the
//! top-left corner and are drawn after all 3D passes. They are kept in their
//! own ordered list rather than the entity registry.

use glam::Vec2;

use crate::backend::{ShaderHandle, TextureHandle};
use crate::resources::GpuGeometry;

use super::EntityId;

/// Pointer state of a cursor overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    /// Hotspot in texture space (0..1)
    pub hotspot: Vec2,
    pub visible: bool,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            hotspot: Vec2::ZERO,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSpaceComponent {
    pub entity: EntityId,
    /// Top-left corner, 0..1 across and down the screen
    pub position: Vec2,
    pub size: Vec2,
    pub texture: Option<TextureHandle>,
    pub shader: Option<ShaderHandle>,
    pub geometry: Option<GpuGeometry>,
    /// Present for cursors, `None` for plain quads
    pub cursor: Option<CursorState>,
}

impl ScreenSpaceComponent {
    pub fn quad(entity: EntityId, position: Vec2, size: Vec2) -> Self {
        Self {
            entity,
            position,
            size,
            texture: None,
            shader: None,
            geometry: None,
            cursor: None,
        }
    }

    pub fn cursor(entity: EntityId, position: Vec2, size: Vec2, hotspot: Vec2) -> Self {
        Self {
            cursor: Some(CursorState {
                hotspot,
                visible: true,
            }),
            ..Self::quad(entity, position, size)
        }
    }

    pub fn is_cursor(&self) -> bool {
        self.cursor.is_some()
    }

    /// Follow the pointer
    pub fn move_to(&mut self, position: Vec2) {
        self.position = position;
    }

    /// Show or hide a cursor. Plain quads are always shown.
    pub fn set_visible(&mut self, visible: bool) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.visible = visible;
        }
    }

    /// Clip-space offset of the top-left corner
    pub fn clip_offset(&self) -> Vec2 {
        Vec2::new(self.position.x * 2.0, self.position.y * -2.0)
    }

    /// Hotspot scaled to the overlay's size; zero for quads
    pub fn scaled_hotspot(&self) -> Vec2 {
        self.cursor
            .map(|c| self.size * c.hotspot)
            .unwrap_or(Vec2::ZERO)
    }

    /// Cursors without a texture or hidden ones are not drawn
    pub fn should_draw(&self) -> bool {
        let visible = self.cursor.map_or(true, |c| c.visible);
        let has_texture = self.texture.is_some() || !self.is_cursor();
        visible
            && has_texture
            && self.shader.is_some()
            && self.geometry.is_some_and(|g| g.element_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_offset_flips_y() {
        let quad = ScreenSpaceComponent::quad(1, Vec2::new(0.25, 0.5), Vec2::splat(0.1));
        assert_eq!(quad.clip_offset(), Vec2::new(0.5, -1.0));
    }

    #[test]
    fn test_cursor_hotspot_scaled_by_size() {
        let cursor = ScreenSpaceComponent::cursor(2, Vec2::ZERO, Vec2::new(0.1, 0.2), Vec2::splat(0.5));
        assert!(cursor.scaled_hotspot().abs_diff_eq(Vec2::new(0.05, 0.1), 1e-6));
    }

    #[test]
    fn test_hidden_cursor_not_drawn() {
        let mut cursor = ScreenSpaceComponent::cursor(3, Vec2::ZERO, Vec2::ONE, Vec2::ZERO);
        // No shader, geometry or texture yet
        assert!(!cursor.should_draw());

        cursor.set_visible(false);
        assert_eq!(cursor.cursor.map(|c| c.visible), Some(false));

        let mut quad = ScreenSpaceComponent::quad(4, Vec2::ZERO, Vec2::ONE);
        quad.set_visible(false);
        assert!(quad.cursor.is_none());
    }
}
