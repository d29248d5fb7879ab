use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Aabb;

/// Mesh as produced by scene ingest. Faces may have any arity.
#[derive(Debug, Clone, Default)]
pub struct SceneMesh {
    pub name: String,
    pub vertex_positions: Vec<Vec3>,
    pub vertex_normals: Vec<Vec3>,
    pub vertex_tex_coords: Vec<Vec2>,
    pub faces: Vec<Vec<u32>>,
    pub material_index: u32,
}

impl SceneMesh {
    pub fn has_normals(&self) -> bool {
        !self.vertex_normals.is_empty()
    }

    pub fn has_tex_coords(&self) -> bool {
        !self.vertex_tex_coords.is_empty()
    }

    /// Area weighted smooth normals, only triangles contribute.
    pub fn generate_normals(&mut self) {
        appearance_profiling::profile_function!();

        self.vertex_normals = generate_smooth_normals(
            &self.vertex_positions,
            self.faces
                .iter()
                .filter(|face| face.len() == 3)
                .map(|face| [face[0], face[1], face[2]]),
        );
    }
}

/// Accumulates face normals per vertex. Vertices without a valid face get +Y.
pub fn generate_smooth_normals(
    vertex_positions: &[Vec3],
    triangles: impl IntoIterator<Item = [u32; 3]>,
) -> Vec<Vec3> {
    let mut vertex_normals = vec![Vec3::ZERO; vertex_positions.len()];

    for [i0, i1, i2] in triangles {
        let (i0, i1, i2) = (i0 as usize, i1 as usize, i2 as usize);
        if i0 >= vertex_positions.len()
            || i1 >= vertex_positions.len()
            || i2 >= vertex_positions.len()
        {
            continue;
        }

        let p0 = vertex_positions[i0];
        let p1 = vertex_positions[i1];
        let p2 = vertex_positions[i2];
        let n = (p1 - p0).cross(p2 - p0);

        vertex_normals[i0] += n;
        vertex_normals[i1] += n;
        vertex_normals[i2] += n;
    }

    for normal in &mut vertex_normals {
        *normal = normal.try_normalize().unwrap_or(Vec3::Y);
    }
    vertex_normals
}

/// Interleaved layout of [`SubMesh::vertices`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    pub const NUM_FLOATS: usize = 8;

    pub fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
            tex_coord: tex_coord.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubMesh {
    pub name: String,
    /// Position, normal and uv interleaved, [`Vertex::NUM_FLOATS`] floats per vertex.
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub material_slot: u32,
    /// Node this sub-mesh was flattened from.
    pub node_name: String,
    pub bounds_center: Vec3,
}

impl SubMesh {
    pub fn new(
        name: String,
        node_name: String,
        vertices: &[Vertex],
        indices: Vec<u32>,
        material_slot: u32,
    ) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position)));

        Self {
            name,
            vertices: bytemuck::cast_slice(vertices).to_vec(),
            indices,
            material_slot,
            node_name,
            bounds_center: bounds.center(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / Vertex::NUM_FLOATS
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex(&self, index: usize) -> Vertex {
        let start = index * Vertex::NUM_FLOATS;
        bytemuck::pod_read_unaligned(bytemuck::cast_slice(
            &self.vertices[start..start + Vertex::NUM_FLOATS],
        ))
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(Vertex::NUM_FLOATS)
            .map(|v| Vec3::new(v[0], v[1], v[2]))
    }

    pub fn normals(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(Vertex::NUM_FLOATS)
            .map(|v| Vec3::new(v[3], v[4], v[5]))
    }

    pub fn tex_coords(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.vertices
            .chunks_exact(Vertex::NUM_FLOATS)
            .map(|v| Vec2::new(v[6], v[7]))
    }

    /// Whole vertices, triangle list and every index in range.
    pub fn is_valid(&self) -> bool {
        let vertex_count = self.vertex_count();
        self.vertices.len() % Vertex::NUM_FLOATS == 0
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < vertex_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshAsset {
    pub uuid: Uuid,
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
    pub bounds: Aabb,
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Index aligned with the source model's material list.
    pub material_slots: Vec<Option<Uuid>>,
    /// Copied source model, relative to the assets root.
    pub source_path: String,
}

impl MeshAsset {
    pub fn new(name: &str, sub_meshes: Vec<SubMesh>, num_material_slots: usize) -> Self {
        let mut mesh = Self {
            uuid: Uuid::nil(),
            name: name.to_owned(),
            sub_meshes,
            bounds: Aabb::EMPTY,
            vertex_count: 0,
            triangle_count: 0,
            material_slots: vec![None; num_material_slots],
            source_path: String::new(),
        };
        mesh.recalculate_totals();
        mesh
    }

    /// Recomputes bounds and counts by scanning the interleaved buffers.
    pub fn recalculate_totals(&mut self) {
        appearance_profiling::profile_function!();

        let mut bounds = Aabb::EMPTY;
        for sub_mesh in &self.sub_meshes {
            for position in sub_mesh.positions() {
                bounds.grow(position);
            }
        }

        self.bounds = bounds;
        self.vertex_count = self.sub_meshes.iter().map(SubMesh::vertex_count).sum();
        self.triangle_count = self.sub_meshes.iter().map(SubMesh::triangle_count).sum();
    }

    pub fn is_empty(&self) -> bool {
        self.sub_meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_sub_mesh() -> SubMesh {
        let vertices = [
            Vertex::new(Vec3::new(0.0, 0.0, 0.0), Vec3::Z, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(2.0, 0.0, 0.0), Vec3::Z, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(2.0, 2.0, 0.0), Vec3::Z, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(0.0, 2.0, 0.0), Vec3::Z, Vec2::new(0.0, 1.0)),
        ];
        SubMesh::new(
            "Quad".to_owned(),
            "Root".to_owned(),
            &vertices,
            vec![0, 1, 2, 0, 2, 3],
            0,
        )
    }

    #[test]
    fn sub_mesh_interleaves_eight_floats() {
        let sub_mesh = quad_sub_mesh();
        assert_eq!(sub_mesh.vertices.len(), 32);
        assert_eq!(sub_mesh.vertex_count(), 4);
        assert_eq!(sub_mesh.triangle_count(), 2);
        assert_eq!(sub_mesh.vertex(2).position, [2.0, 2.0, 0.0]);
        assert_eq!(sub_mesh.vertex(3).tex_coord, [0.0, 1.0]);
        assert_eq!(sub_mesh.bounds_center, Vec3::new(1.0, 1.0, 0.0));
        assert!(sub_mesh.is_valid());
    }

    #[test]
    fn out_of_range_index_is_invalid() {
        let mut sub_mesh = quad_sub_mesh();
        sub_mesh.indices[5] = 4;
        assert!(!sub_mesh.is_valid());
    }

    #[test]
    fn mesh_asset_totals() {
        let mesh = MeshAsset::new("Quad", vec![quad_sub_mesh(), quad_sub_mesh()], 2);
        assert_eq!(mesh.vertex_count, 8);
        assert_eq!(mesh.triangle_count, 4);
        assert_eq!(mesh.material_slots, vec![None, None]);
        assert_eq!(mesh.bounds, Aabb::new(Vec3::ZERO, Vec3::new(2.0, 2.0, 0.0)));
    }

    #[test]
    fn generated_normals_face_triangle_winding() {
        let mut mesh = SceneMesh {
            name: "Tri".to_owned(),
            vertex_positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(5.0, 5.0, 5.0)],
            faces: vec![vec![0, 1, 2]],
            ..Default::default()
        };
        mesh.generate_normals();
        assert_eq!(mesh.vertex_normals.len(), 4);
        assert!((mesh.vertex_normals[0] - Vec3::Z).length() < 1e-6);
        assert_eq!(mesh.vertex_normals[3], Vec3::Y);
    }
}
