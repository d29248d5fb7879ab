use std::path::Path;

use appearance_model::{
    mesh::{generate_smooth_normals, SceneMesh, Vertex},
    Aabb, MeshAsset, Scene, SubMesh,
};
use glam::{Mat3, Mat4, Vec2, Vec3};

use crate::{error::ImportError, settings::is_gltf_extension};

/// Axis fix-up applied on top of the already baked vertex data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateCorrection {
    None,
    /// Mirrors Z and reverses the winding so front faces stay front faces.
    FlipZ,
}

impl CoordinateCorrection {
    pub fn for_extension(extension: &str) -> Self {
        if is_gltf_extension(extension) {
            Self::FlipZ
        } else {
            Self::None
        }
    }

    pub fn matrix(self) -> Mat4 {
        match self {
            Self::None => Mat4::IDENTITY,
            Self::FlipZ => Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0)),
        }
    }

    fn triangle(self, [i0, i1, i2]: [u32; 3]) -> [u32; 3] {
        match self {
            Self::None => [i0, i1, i2],
            Self::FlipZ => [i0, i2, i1],
        }
    }
}

/// Flattens the node hierarchy into one sub-mesh per mesh instance.
pub fn convert_scene(
    scene: &Scene,
    model_name: &str,
    source_path: &Path,
    correction: CoordinateCorrection,
) -> Result<MeshAsset, ImportError> {
    appearance_profiling::profile_function!();

    if !scene.has_meshes() {
        return Err(ImportError::NoMeshes(source_path.to_path_buf()));
    }

    let mut sub_meshes = vec![];
    let mut visited = vec![false; scene.nodes.len()];
    let mut stack: Vec<u32> = scene.root_nodes.iter().rev().copied().collect();

    while let Some(node_idx) = stack.pop() {
        let Some(node) = scene.nodes.get(node_idx as usize) else {
            log::warn!("Skipping missing node {}.", node_idx);
            continue;
        };
        if std::mem::replace(&mut visited[node_idx as usize], true) {
            continue;
        }

        match convert_node(scene, node_idx, correction) {
            Ok(mut node_sub_meshes) => sub_meshes.append(&mut node_sub_meshes),
            Err(err) if err.is_recoverable() => {
                log::warn!("Skipping meshes of node {}: {}", node.name, err);
            }
            Err(err) => return Err(err),
        }

        stack.extend(node.children.iter().rev());
    }

    if sub_meshes.is_empty() {
        return Err(ImportError::NoMeshes(source_path.to_path_buf()));
    }

    let mesh = MeshAsset::new(model_name, sub_meshes, scene.materials.len());
    log::info!(
        "Converted {} sub-mesh(es), {} vertices, {} triangles.",
        mesh.sub_meshes.len(),
        mesh.vertex_count,
        mesh.triangle_count
    );
    Ok(mesh)
}

fn convert_node(
    scene: &Scene,
    node_idx: u32,
    correction: CoordinateCorrection,
) -> Result<Vec<SubMesh>, ImportError> {
    let node = &scene.nodes[node_idx as usize];

    // Resolve every reference first so a bad one skips the whole node.
    let meshes = node
        .meshes
        .iter()
        .map(|mesh_idx| {
            scene
                .meshes
                .get(*mesh_idx as usize)
                .ok_or_else(|| ImportError::InvalidMeshReference {
                    node: node.name.clone(),
                    index: *mesh_idx,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    meshes
        .into_iter()
        .enumerate()
        .map(|(i, mesh)| {
            let name = if mesh.name.is_empty() {
                format!("{}_Mesh{}", node.name, i)
            } else {
                mesh.name.clone()
            };
            convert_mesh(mesh, name, &node.name, correction)
        })
        .collect()
}

pub fn convert_mesh(
    mesh: &SceneMesh,
    name: String,
    node_name: &str,
    correction: CoordinateCorrection,
) -> Result<SubMesh, ImportError> {
    appearance_profiling::profile_function!();

    if mesh.vertex_positions.is_empty() || mesh.faces.is_empty() {
        return Err(ImportError::EmptyGeometry { mesh: name });
    }

    let vertex_count = mesh.vertex_positions.len();
    let mut indices = Vec::with_capacity(mesh.faces.len() * 3);
    let mut skipped = 0;
    for face in &mesh.faces {
        let [i0, i1, i2] = match face.as_slice() {
            [i0, i1, i2] => [*i0, *i1, *i2],
            _ => {
                skipped += 1;
                continue;
            }
        };
        if [i0, i1, i2].iter().any(|i| *i as usize >= vertex_count) {
            skipped += 1;
            continue;
        }
        indices.extend(correction.triangle([i0, i1, i2]));
    }

    if skipped > 0 {
        log::warn!("Skipped {} non-triangular or invalid face(s) in {}.", skipped, name);
    }
    if indices.is_empty() {
        return Err(ImportError::NoValidTriangles {
            mesh: name,
            skipped,
        });
    }

    let matrix = correction.matrix();
    let positions: Vec<Vec3> = mesh
        .vertex_positions
        .iter()
        .map(|position| matrix.transform_point3(*position))
        .collect();

    let normals = if mesh.has_normals() {
        let rotation = Mat3::from_mat4(matrix);
        mesh.vertex_normals
            .iter()
            .map(|normal| (rotation * *normal).normalize_or_zero())
            .collect()
    } else {
        generate_smooth_normals(
            &positions,
            indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]),
        )
    };

    let tex_coords = if mesh.has_tex_coords() {
        mesh.vertex_tex_coords.clone()
    } else {
        planar_tex_coords(&positions)
    };

    if normals.len() != positions.len() || tex_coords.len() != positions.len() {
        return Err(ImportError::AttributeCountMismatch {
            mesh: name,
            positions: positions.len(),
            normals: normals.len(),
            tex_coords: tex_coords.len(),
        });
    }

    let vertices: Vec<Vertex> = positions
        .iter()
        .zip(&normals)
        .zip(&tex_coords)
        .map(|((position, normal), tex_coord)| Vertex::new(*position, *normal, *tex_coord))
        .collect();

    Ok(SubMesh::new(
        name,
        node_name.to_owned(),
        &vertices,
        indices,
        mesh.material_index,
    ))
}

/// Projects onto XZ when the mesh is at least as wide or deep as it is tall, onto XY otherwise.
pub fn planar_tex_coords(positions: &[Vec3]) -> Vec<Vec2> {
    let bounds = Aabb::from_points(positions.iter().copied());
    let extent = bounds.extent();
    let max_extent = extent.max_element();
    let scale = if max_extent > 0.0 { 1.0 / max_extent } else { 1.0 };

    let project_xz = extent.x >= extent.y || extent.z >= extent.y;
    positions
        .iter()
        .map(|position| {
            let local = *position - bounds.min;
            if project_xz {
                Vec2::new(local.x, local.z) * scale
            } else {
                Vec2::new(local.x, local.y) * scale
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use appearance_model::SceneNode;

    use super::*;

    fn triangle_mesh() -> SceneMesh {
        SceneMesh {
            name: "Tri".to_owned(),
            vertex_positions: vec![
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 2.0),
                Vec3::new(0.0, 1.0, 3.0),
            ],
            vertex_normals: vec![Vec3::Z, Vec3::Z, Vec3::new(0.0, 0.0, 2.0)],
            vertex_tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            faces: vec![vec![0, 1, 2]],
            material_index: 0,
        }
    }

    fn single_node_scene(mesh: SceneMesh) -> Scene {
        let mut node = SceneNode::new("Root");
        node.meshes = vec![0];
        Scene {
            root_nodes: vec![0],
            nodes: vec![node],
            meshes: vec![mesh],
            ..Default::default()
        }
    }

    #[test]
    fn flip_z_negates_and_rewinds() {
        let sub_mesh = convert_mesh(&triangle_mesh(), "Tri".to_owned(), "Root", CoordinateCorrection::FlipZ)
            .unwrap();

        assert_eq!(sub_mesh.indices, vec![0, 2, 1]);
        let positions: Vec<Vec3> = sub_mesh.positions().collect();
        assert_eq!(positions[1], Vec3::new(1.0, 0.0, -2.0));
        let normals: Vec<Vec3> = sub_mesh.normals().collect();
        assert_eq!(normals[0], Vec3::NEG_Z);
        assert_eq!(normals[2], Vec3::NEG_Z);
    }

    #[test]
    fn no_correction_keeps_data() {
        let sub_mesh = convert_mesh(&triangle_mesh(), "Tri".to_owned(), "Root", CoordinateCorrection::None)
            .unwrap();
        assert_eq!(sub_mesh.indices, vec![0, 1, 2]);
        assert_eq!(sub_mesh.vertex(2).position, [0.0, 1.0, 3.0]);
        assert_eq!(sub_mesh.node_name, "Root");
    }

    #[test]
    fn correction_follows_extension() {
        assert_eq!(CoordinateCorrection::for_extension("glb"), CoordinateCorrection::FlipZ);
        assert_eq!(CoordinateCorrection::for_extension("GLTF"), CoordinateCorrection::FlipZ);
        assert_eq!(CoordinateCorrection::for_extension("fbx"), CoordinateCorrection::None);
    }

    #[test]
    fn bad_faces_are_skipped() {
        let mut mesh = triangle_mesh();
        mesh.faces = vec![vec![0, 1], vec![0, 1, 2], vec![0, 1, 2, 0], vec![0, 1, 7]];

        let sub_mesh = convert_mesh(&mesh, "Tri".to_owned(), "Root", CoordinateCorrection::None).unwrap();
        assert_eq!(sub_mesh.triangle_count(), 1);
        assert!(sub_mesh.is_valid());
    }

    #[test]
    fn fatal_geometry_errors() {
        let mut lines = triangle_mesh();
        lines.faces = vec![vec![0, 1], vec![1, 2]];
        assert!(matches!(
            convert_mesh(&lines, "Lines".to_owned(), "Root", CoordinateCorrection::None),
            Err(ImportError::NoValidTriangles { skipped: 2, .. })
        ));

        let mut empty = triangle_mesh();
        empty.vertex_positions.clear();
        assert!(matches!(
            convert_mesh(&empty, "Empty".to_owned(), "Root", CoordinateCorrection::None),
            Err(ImportError::EmptyGeometry { .. })
        ));

        let mut mismatched = triangle_mesh();
        mismatched.vertex_tex_coords.pop();
        assert!(matches!(
            convert_mesh(&mismatched, "Uv".to_owned(), "Root", CoordinateCorrection::None),
            Err(ImportError::AttributeCountMismatch { tex_coords: 2, .. })
        ));
    }

    #[test]
    fn missing_normals_are_generated() {
        let mut mesh = triangle_mesh();
        mesh.vertex_positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        mesh.vertex_normals.clear();

        let sub_mesh = convert_mesh(&mesh, "Tri".to_owned(), "Root", CoordinateCorrection::None).unwrap();
        for normal in sub_mesh.normals() {
            assert!((normal - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn flat_meshes_project_onto_xz() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.5, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
        ];
        let tex_coords = planar_tex_coords(&positions);
        assert_eq!(tex_coords[1], Vec2::new(1.0, 0.0));
        assert_eq!(tex_coords[2], Vec2::new(0.0, 0.5));

        let tall = [Vec3::ZERO, Vec3::new(1.0, 4.0, 0.5)];
        assert_eq!(planar_tex_coords(&tall)[1], Vec2::new(0.25, 1.0));
    }

    #[test]
    fn invalid_mesh_reference_skips_node() {
        let mut scene = single_node_scene(triangle_mesh());
        let mut broken = SceneNode::new("Broken");
        broken.meshes = vec![0, 5];
        scene.nodes[0].children.push(1);
        scene.nodes.push(broken);

        let mesh = convert_scene(&scene, "model", Path::new("model.obj"), CoordinateCorrection::None)
            .unwrap();
        assert_eq!(mesh.sub_meshes.len(), 1);
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.triangle_count, 1);
    }

    #[test]
    fn unnamed_meshes_take_the_node_name() {
        let mut mesh = triangle_mesh();
        mesh.name.clear();
        let mut scene = single_node_scene(mesh);
        scene.nodes[0].meshes = vec![0, 0];

        let mesh = convert_scene(&scene, "model", Path::new("model.obj"), CoordinateCorrection::None)
            .unwrap();
        assert_eq!(mesh.sub_meshes[0].name, "Root_Mesh0");
        assert_eq!(mesh.sub_meshes[1].name, "Root_Mesh1");
        assert!(mesh.bounds.contains(Vec3::new(1.0, 0.0, 2.0)));
    }

    #[test]
    fn scenes_without_meshes_fail() {
        let scene = Scene {
            root_nodes: vec![0],
            nodes: vec![SceneNode::new("Empty")],
            ..Default::default()
        };
        assert!(matches!(
            convert_scene(&scene, "model", Path::new("model.obj"), CoordinateCorrection::None),
            Err(ImportError::NoMeshes(_))
        ));
    }
}
