//! Procedural geometry: spheres, icosahedra, rings and wireframe edges

use std::collections::{HashMap, HashSet};

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

/// Vertex for every lit or unlit mesh
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// CPU-side triangle mesh
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds, or None for an empty mesh
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.vertices.iter().map(|v| Vec3::from_array(v.position));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    /// Apply an affine transform to positions and normals in place
    pub fn transform(&mut self, matrix: Mat4) {
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();
        for v in &mut self.vertices {
            v.position = matrix.transform_point3(Vec3::from_array(v.position)).to_array();
            v.normal = (normal_matrix * Vec3::from_array(v.normal))
                .normalize_or_zero()
                .to_array();
        }
    }
}

/// Generate a UV sphere
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> MeshData {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for seg in 0..=segments {
            let theta = 2.0 * std::f32::consts::PI * seg as f32 / segments as f32;
            // u grows eastwards when seen from outside
            let x = -ring_radius * theta.cos();
            let z = ring_radius * theta.sin();

            let normal = Vec3::new(x, y, z).normalize_or_zero();

            // Equirectangular UV
            let u = seg as f32 / segments as f32;
            let v = ring as f32 / rings as f32;

            vertices.push(MeshVertex {
                position: (normal * radius).to_array(),
                normal: normal.to_array(),
                uv: [u, v],
            });
        }
    }

    for ring in 0..rings {
        for seg in 0..segments {
            let current = ring * (segments + 1) + seg;
            let next = current + segments + 1;

            indices.extend_from_slice(&[current, next, current + 1]);
            indices.extend_from_slice(&[current + 1, next, next + 1]);
        }
    }

    MeshData { vertices, indices }
}

/// Generate a flat-faced icosahedron
///
/// Each of the 20 base faces is split into `(detail + 1)²` triangles and the
/// new vertices are pushed out onto the sphere. Vertices are not shared
/// between faces so every face carries its own normal.
pub fn icosahedron(radius: f32, detail: u32) -> MeshData {
    let t = (1.0 + 5.0f32.sqrt()) / 2.0;
    let corners = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];
    const FACES: [[usize; 3]; 20] = [
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

    let mut mesh = MeshData::default();
    let cols = detail + 1;

    for face in FACES {
        let (a, b, c) = (corners[face[0]], corners[face[1]], corners[face[2]]);

        // grid[i][j]: row i runs from the a-b edge towards c
        let grid: Vec<Vec<Vec3>> = (0..=cols)
            .map(|i| {
                let start = a.lerp(c, i as f32 / cols as f32);
                let end = b.lerp(c, i as f32 / cols as f32);
                let rows = cols - i;
                (0..=rows)
                    .map(|j| {
                        if rows == 0 {
                            start
                        } else {
                            start.lerp(end, j as f32 / rows as f32)
                        }
                    })
                    .collect()
            })
            .collect();

        for i in 0..cols as usize {
            let steps = 2 * (cols as usize - i) - 1;
            for j in 0..steps {
                let k = j / 2;
                let tri = if j % 2 == 0 {
                    [grid[i][k + 1], grid[i + 1][k], grid[i][k]]
                } else {
                    [grid[i][k + 1], grid[i + 1][k + 1], grid[i + 1][k]]
                };
                push_flat_triangle(&mut mesh, tri.map(|p| p.normalize() * radius));
            }
        }
    }

    mesh
}

fn push_flat_triangle(mesh: &mut MeshData, mut tri: [Vec3; 3]) {
    let mut normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]).normalize_or_zero();
    let centroid = (tri[0] + tri[1] + tri[2]) / 3.0;
    if normal.dot(centroid) < 0.0 {
        tri.swap(1, 2);
        normal = -normal;
    }

    let base = mesh.vertices.len() as u32;
    for p in tri {
        let dir = p.normalize_or_zero();
        let u = 0.5 + dir.z.atan2(dir.x) / (2.0 * std::f32::consts::PI);
        let v = 0.5 - dir.y.clamp(-1.0, 1.0).asin() / std::f32::consts::PI;
        mesh.vertices.push(MeshVertex {
            position: p.to_array(),
            normal: normal.to_array(),
            uv: [u, v],
        });
    }
    mesh.indices.extend_from_slice(&[base, base + 1, base + 2]);
}

/// Generate a flat annulus lying in the XZ plane, facing +Y
pub fn ring(inner_radius: f32, outer_radius: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let mut vertices = Vec::with_capacity(2 * (segments as usize + 1));
    let mut indices = Vec::with_capacity(6 * segments as usize);

    for (band, radius) in [inner_radius, outer_radius].into_iter().enumerate() {
        for seg in 0..=segments {
            let theta = 2.0 * std::f32::consts::PI * seg as f32 / segments as f32;
            vertices.push(MeshVertex {
                position: [radius * theta.cos(), 0.0, -radius * theta.sin()],
                normal: [0.0, 1.0, 0.0],
                uv: [seg as f32 / segments as f32, band as f32],
            });
        }
    }

    let stride = segments + 1;
    for seg in 0..segments {
        let inner = seg;
        let outer = seg + stride;
        indices.extend_from_slice(&[inner, outer, inner + 1]);
        indices.extend_from_slice(&[inner + 1, outer, outer + 1]);
    }

    MeshData { vertices, indices }
}

/// Line-list indices covering every triangle edge exactly once
///
/// Vertices that share a position are treated as one, so meshes built
/// from unshared per-face vertices still produce a single line per edge.
pub fn wireframe_indices(mesh: &MeshData) -> Vec<u32> {
    const WELD_DISTANCE: f32 = 1e-4;

    // Spatial hash with neighbour lookup so points straddling a cell boundary still weld
    let cell = |p: Vec3| (p / WELD_DISTANCE).floor().as_ivec3();
    let mut grid: HashMap<glam::IVec3, Vec<u32>> = HashMap::new();
    let mut remap = Vec::with_capacity(mesh.vertices.len());

    for (idx, v) in mesh.vertices.iter().enumerate() {
        let p = Vec3::from_array(v.position);
        let home = cell(p);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = home + glam::IVec3::new(dx, dy, dz);
                    if let Some(candidates) = grid.get(&key) {
                        for &c in candidates {
                            let q = Vec3::from_array(mesh.vertices[c as usize].position);
                            if p.distance(q) <= WELD_DISTANCE {
                                found = Some(c);
                                break 'search;
                            }
                        }
                    }
                }
            }
        }
        let canonical = found.unwrap_or_else(|| {
            grid.entry(home).or_default().push(idx as u32);
            idx as u32
        });
        remap.push(canonical);
    }

    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for tri in mesh.indices.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let (a, b) = (remap[a as usize], remap[b as usize]);
            if a == b {
                continue;
            }
            if seen.insert((a.min(b), a.max(b))) {
                lines.push(a);
                lines.push(b);
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icosahedron_face_count() {
        assert_eq!(icosahedron(1.0, 0).triangle_count(), 20);
        assert_eq!(icosahedron(1.0, 1).triangle_count(), 80);
        assert_eq!(icosahedron(1.0, 2).triangle_count(), 180);
    }

    #[test]
    fn test_icosahedron_vertices_on_sphere_with_outward_normals() {
        let mesh = icosahedron(2.0, 2);
        for v in &mesh.vertices {
            let p = Vec3::from_array(v.position);
            assert!((p.length() - 2.0).abs() < 1e-4);
            assert!(Vec3::from_array(v.normal).dot(p) > 0.0);
        }
    }

    #[test]
    fn test_wireframe_edges_of_icosahedron() {
        // Closed triangle mesh: E = 3F / 2
        let base = icosahedron(1.0, 0);
        assert_eq!(wireframe_indices(&base).len() / 2, 30);

        let detailed = icosahedron(1.0, 2);
        assert_eq!(wireframe_indices(&detailed).len() / 2, 270);
    }

    #[test]
    fn test_sphere_layout() {
        let mesh = uv_sphere(0.5, 32, 16);
        assert_eq!(mesh.vertices.len(), 33 * 17);
        assert_eq!(mesh.triangle_count(), 32 * 16 * 2);
        for v in &mesh.vertices {
            assert!((Vec3::from_array(v.position).length() - 0.5).abs() < 1e-5);
        }
        let max_index = *mesh.indices.iter().max().unwrap() as usize;
        assert!(max_index < mesh.vertices.len());
    }

    fn face_normals(mesh: &MeshData) -> Vec<(Vec3, Vec3)> {
        mesh.indices
            .chunks_exact(3)
            .map(|tri| {
                let p = [tri[0], tri[1], tri[2]]
                    .map(|i| Vec3::from_array(mesh.vertices[i as usize].position));
                let normal = (p[1] - p[0]).cross(p[2] - p[0]);
                (normal, (p[0] + p[1] + p[2]) / 3.0)
            })
            .collect()
    }

    #[test]
    fn test_sphere_winding_is_counter_clockwise_from_outside() {
        let mesh = uv_sphere(1.0, 16, 8);
        for (normal, centroid) in face_normals(&mesh) {
            // Pole triangles collapse to zero area
            if normal.length() > 1e-6 {
                assert!(normal.dot(centroid) > 0.0);
            }
        }
    }

    #[test]
    fn test_ring_is_flat_between_radii() {
        let mesh = ring(3.0, 3.02, 64);
        assert_eq!(mesh.triangle_count(), 128);
        for v in &mesh.vertices {
            let p = Vec3::from_array(v.position);
            assert_eq!(p.y, 0.0);
            let r = p.length();
            assert!(r >= 3.0 - 1e-4 && r <= 3.02 + 1e-4, "radius {}", r);
        }
        for (normal, _) in face_normals(&mesh) {
            assert!(normal.y > 0.0);
        }
    }

    #[test]
    fn test_bounds_and_transform() {
        let mut mesh = uv_sphere(1.0, 8, 4);
        mesh.transform(Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::IDENTITY,
            Vec3::new(1.0, 0.0, 0.0),
        ));
        let (min, max) = mesh.bounds().unwrap();
        assert!((max.y - 2.0).abs() < 1e-5);
        assert!((min.y + 2.0).abs() < 1e-5);
        assert!((max.x - 3.0).abs() < 1e-5);
        assert!(MeshData::default().bounds().is_none());
    }
}
