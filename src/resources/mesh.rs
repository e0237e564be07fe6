//! Mesh data structures, generation and the named mesh library

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::backend::*;

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    /// Empty for non-indexed meshes
    pub indices: Vec<u32>,
    pub topology: PrimitiveTopology,
    pub name: String,
}

/// Uploaded mesh ready to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuGeometry {
    pub handle: GeometryHandle,
    pub element_count: u32,
    pub topology: PrimitiveTopology,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        match self.topology {
            PrimitiveTopology::TriangleList => self.descriptor().element_count() as usize / 3,
            PrimitiveTopology::TriangleStrip => {
                (self.descriptor().element_count() as usize).saturating_sub(2)
            }
        }
    }

    pub fn descriptor(&self) -> GeometryDescriptor<'_> {
        GeometryDescriptor {
            label: Some(&self.name),
            vertices: &self.vertices,
            indices: &self.indices,
            topology: self.topology,
        }
    }

    /// Upload vertex and index data
    pub fn upload<B: GraphicsBackend + ?Sized>(&self, backend: &mut B) -> BackendResult<GpuGeometry> {
        let desc = self.descriptor();
        let handle = backend.create_geometry(&desc)?;
        Ok(GpuGeometry {
            handle,
            element_count: desc.element_count(),
            topology: self.topology,
        })
    }

    /// Icosahedron refined `subdivisions` times and projected onto a unit-diameter sphere
    pub fn icosphere(subdivisions: u32) -> Self {
        let mut mesh = Mesh::new("icosphere");

        let t = (1.0 + 5.0f32.sqrt()) / 2.0;
        let mut positions: Vec<Vec3> = [
            (-1.0, t, 0.0),
            (1.0, t, 0.0),
            (-1.0, -t, 0.0),
            (1.0, -t, 0.0),
            (0.0, -1.0, t),
            (0.0, 1.0, t),
            (0.0, -1.0, -t),
            (0.0, 1.0, -t),
            (t, 0.0, -1.0),
            (t, 0.0, 1.0),
            (-t, 0.0, -1.0),
            (-t, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
        .collect();

        let mut faces: Vec<[u32; 3]> = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
            let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Vec3>| -> u32 {
                let key = (a.min(b), a.max(b));
                *midpoints.entry(key).or_insert_with(|| {
                    let mid = ((positions[a as usize] + positions[b as usize]) * 0.5).normalize();
                    positions.push(mid);
                    positions.len() as u32 - 1
                })
            };

            let mut refined = Vec::with_capacity(faces.len() * 4);
            for [a, b, c] in faces {
                let ab = midpoint(a, b, &mut positions);
                let bc = midpoint(b, c, &mut positions);
                let ca = midpoint(c, a, &mut positions);
                refined.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
            }
            faces = refined;
        }

        for normal in positions {
            let uv = Vec2::new(
                0.5 + normal.z.atan2(normal.x) / std::f32::consts::TAU,
                0.5 - normal.y.asin() / std::f32::consts::PI,
            );
            mesh.vertices.push(Vertex::new(normal * 0.5, normal, uv));
        }
        mesh.indices = faces.into_iter().flatten().collect();

        mesh
    }

    /// Cube whose faces are subdivided into grids and pushed out onto a
    /// unit-diameter sphere. Each level doubles the grid resolution.
    pub fn cube_sphere(subdivisions: u32) -> Self {
        let mut mesh = Mesh::new("cube_sphere");
        let segments = 2u32 << subdivisions.min(8);

        // (normal, u axis, v axis) per face
        let faces = [
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
        ];

        for (normal, u_axis, v_axis) in faces {
            let base = mesh.vertices.len() as u32;
            for y in 0..=segments {
                for x in 0..=segments {
                    let u = x as f32 / segments as f32;
                    let v = y as f32 / segments as f32;
                    let on_cube = normal + u_axis * (u * 2.0 - 1.0) + v_axis * (v * 2.0 - 1.0);
                    let direction = on_cube.normalize();
                    mesh.vertices
                        .push(Vertex::new(direction * 0.5, direction, Vec2::new(u, 1.0 - v)));
                }
            }

            for y in 0..segments {
                for x in 0..segments {
                    let current = base + y * (segments + 1) + x;
                    let next = current + segments + 1;
                    mesh.indices.extend_from_slice(&[
                        current,
                        current + 1,
                        next,
                        next,
                        current + 1,
                        next + 1,
                    ]);
                }
            }
        }

        mesh
    }

    /// Unit quad in the XY plane facing +Z
    pub fn sprite() -> Self {
        let mut mesh = Mesh::new("sprite");
        let corners = [
            (Vec3::new(-0.5, -0.5, 0.0), Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.0), Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, 0.0), Vec2::new(0.0, 0.0)),
        ];
        for (position, uv) in corners {
            mesh.vertices.push(Vertex::new(position, Vec3::Z, uv));
        }
        mesh.indices = vec![0, 1, 2, 0, 2, 3];
        mesh
    }

    /// Quad anchored at the top-left corner of clip space, `size` in
    /// normalized screen units (1.0 = full width or height).
    pub fn screen_quad(size: Vec2) -> Self {
        let mut mesh = Mesh::new("screen_quad");
        let (w, h) = (size.x * 2.0, size.y * 2.0);
        let corners = [
            (Vec3::new(-1.0, 1.0 - h, 0.0), Vec2::new(0.0, 1.0)),
            (Vec3::new(-1.0 + w, 1.0 - h, 0.0), Vec2::new(1.0, 1.0)),
            (Vec3::new(-1.0 + w, 1.0, 0.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(-1.0, 1.0, 0.0), Vec2::new(0.0, 0.0)),
        ];
        for (position, uv) in corners {
            mesh.vertices.push(Vertex::new(position, Vec3::Z, uv));
        }
        mesh.indices = vec![0, 1, 2, 0, 2, 3];
        mesh
    }

    /// Two triangles covering clip space, used by the light passes
    pub fn fullscreen_quad() -> Self {
        let mut mesh = Self::screen_quad(Vec2::ONE);
        mesh.name = "fullscreen_quad".to_string();
        mesh
    }

    /// Four-vertex strip covering clip space, used by the distortion pass
    pub fn fullscreen_strip() -> Self {
        let mut mesh = Mesh::new("fullscreen_strip");
        mesh.topology = PrimitiveTopology::TriangleStrip;
        let corners = [
            (Vec3::new(-1.0, -1.0, 0.0), Vec2::new(0.0, 0.0)),
            (Vec3::new(1.0, -1.0, 0.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(-1.0, 1.0, 0.0), Vec2::new(0.0, 1.0)),
            (Vec3::new(1.0, 1.0, 0.0), Vec2::new(1.0, 1.0)),
        ];
        for (position, uv) in corners {
            mesh.vertices.push(Vertex::new(position, Vec3::Z, uv));
        }
        mesh
    }
}

/// Named meshes and their uploaded geometry.
///
/// The host registers meshes under a name (what `meshFile` properties refer
/// to); each is uploaded the first time it is requested and reused afterwards.
#[derive(Debug, Default)]
pub struct MeshLibrary {
    meshes: HashMap<String, Mesh>,
    uploaded: HashMap<String, GpuGeometry>,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a mesh available under `name`. Replaces CPU data only; an already
    /// uploaded geometry keeps being reused.
    pub fn register(&mut self, name: &str, mesh: Mesh) {
        self.meshes.insert(name.to_string(), mesh);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.meshes.contains_key(name) || self.uploaded.contains_key(name)
    }

    /// Geometry for a registered mesh, uploading it on first use
    pub fn upload_or_reuse<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
    ) -> Option<GpuGeometry> {
        if let Some(geometry) = self.uploaded.get(name) {
            return Some(*geometry);
        }
        let Some(mesh) = self.meshes.get(name) else {
            log::warn!("Mesh '{}' is not registered", name);
            return None;
        };
        let result = mesh.upload(backend);
        self.store_upload(name, result)
    }

    /// Geometry cached under `key`, generating and uploading it with `build` on first use
    pub fn get_or_upload_with<B, F>(&mut self, backend: &mut B, key: &str, build: F) -> Option<GpuGeometry>
    where
        B: GraphicsBackend + ?Sized,
        F: FnOnce() -> Mesh,
    {
        if let Some(geometry) = self.uploaded.get(key) {
            return Some(*geometry);
        }
        let result = build().upload(backend);
        self.store_upload(key, result)
    }

    fn store_upload(&mut self, key: &str, result: BackendResult<GpuGeometry>) -> Option<GpuGeometry> {
        match result {
            Ok(geometry) => {
                log::debug!("Uploaded mesh '{}' ({} elements)", key, geometry.element_count);
                self.uploaded.insert(key.to_string(), geometry);
                Some(geometry)
            }
            Err(err) => {
                log::warn!("Failed to upload mesh '{}': {}", key, err);
                None
            }
        }
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded.len()
    }

    pub fn release_all<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        for (_, geometry) in self.uploaded.drain() {
            backend.destroy_geometry(geometry.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icosphere_counts() {
        let base = Mesh::icosphere(0);
        assert_eq!(base.vertex_count(), 12);
        assert_eq!(base.triangle_count(), 20);

        let refined = Mesh::icosphere(2);
        assert_eq!(refined.triangle_count(), 320);
        assert_eq!(refined.vertex_count(), 162);
        for v in &refined.vertices {
            assert!((v.position.length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cube_sphere_on_sphere() {
        let mesh = Mesh::cube_sphere(1);
        // 4x4 grid per face
        assert_eq!(mesh.triangle_count(), 6 * 4 * 4 * 2);
        for v in &mesh.vertices {
            assert!((v.position.length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_fullscreen_strip() {
        let mesh = Mesh::fullscreen_strip();
        assert_eq!(mesh.topology, PrimitiveTopology::TriangleStrip);
        assert_eq!(mesh.descriptor().element_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_screen_quad_anchored_top_left() {
        let mesh = Mesh::screen_quad(Vec2::new(0.25, 0.5));
        let min_x = mesh.vertices.iter().map(|v| v.position.x).fold(f32::MAX, f32::min);
        let max_x = mesh.vertices.iter().map(|v| v.position.x).fold(f32::MIN, f32::max);
        let min_y = mesh.vertices.iter().map(|v| v.position.y).fold(f32::MAX, f32::min);
        assert_eq!(min_x, -1.0);
        assert!((max_x - -0.5).abs() < 1e-6);
        assert!((min_y - 0.0).abs() < 1e-6);
    }

    #[cfg(feature = "recording")]
    #[test]
    fn test_library_uploads_once() {
        use crate::backend::recording::RecordingBackend;

        let mut backend = RecordingBackend::new();
        let mut library = MeshLibrary::new();
        library.register("crate.obj", Mesh::sprite());

        let a = library.upload_or_reuse(&mut backend, "crate.obj").unwrap();
        let b = library.upload_or_reuse(&mut backend, "crate.obj").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.element_count, 6);
        assert!(library.upload_or_reuse(&mut backend, "missing.obj").is_none());

        library.release_all(&mut backend);
        assert_eq!(backend.live_geometry_count(), 0);
    }
}
