use std::path::Path;

use anyhow::Result;
use appearance_model::Scene;
use glam::{Mat3, Mat4, Vec2};

use crate::settings::{extension_of, PostProcess};

mod gltf;
mod obj;

/// Parses a model file into a scene graph and runs the requested post-processing.
pub trait SceneIngest {
    /// `Ok(None)` means the file parsed but produced no scene at all.
    fn ingest(&self, path: &Path, post_process: PostProcess) -> Result<Option<Scene>>;
}

/// Built-in ingest for glTF/GLB and OBJ/MTL.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSceneIngest;

impl DefaultSceneIngest {
    pub const SUPPORTED_EXTENSIONS: &'static [&'static str] = &["gltf", "glb", "obj"];

    pub fn supports(path: &Path) -> bool {
        Self::SUPPORTED_EXTENSIONS.contains(&extension_of(path).as_str())
    }
}

impl SceneIngest for DefaultSceneIngest {
    fn ingest(&self, path: &Path, post_process: PostProcess) -> Result<Option<Scene>> {
        appearance_profiling::profile_function!();

        let extension = extension_of(path);
        let mut scene = match extension.as_str() {
            "gltf" | "glb" => gltf::ingest(path)?,
            "obj" => obj::ingest(path, post_process)?,
            _ => anyhow::bail!(
                "No built-in ingest for .{} files, provide a SceneIngest that supports them",
                extension
            ),
        };

        if scene.nodes.is_empty() && scene.meshes.is_empty() {
            return Ok(None);
        }

        apply_post_process(&mut scene, post_process);
        Ok(Some(scene))
    }
}

/// Post-processing shared by every built-in format.
pub fn apply_post_process(scene: &mut Scene, post_process: PostProcess) {
    appearance_profiling::profile_function!();

    if post_process.contains(PostProcess::PRE_TRANSFORM_VERTICES) {
        pre_transform_vertices(scene);
    }

    for mesh in &mut scene.meshes {
        if post_process.contains(PostProcess::FIND_DEGENERATES) {
            let num_faces = mesh.faces.len();
            mesh.faces.retain(|face| !is_degenerate(face));
            if mesh.faces.len() != num_faces {
                log::debug!(
                    "Removed {} degenerate face(s) from {}.",
                    num_faces - mesh.faces.len(),
                    mesh.name
                );
            }
        }

        if post_process.contains(PostProcess::FLIP_UVS) {
            for tex_coord in &mut mesh.vertex_tex_coords {
                *tex_coord = Vec2::new(tex_coord.x, 1.0 - tex_coord.y);
            }
        }

        if post_process.contains(PostProcess::GEN_SMOOTH_NORMALS) && !mesh.has_normals() {
            mesh.generate_normals();
        }
    }

    let unsupported = post_process
        & (PostProcess::CALC_TANGENT_SPACE
            | PostProcess::SORT_BY_PRIMITIVE_TYPE
            | PostProcess::IMPROVE_CACHE_LOCALITY);
    if !unsupported.is_empty() {
        log::debug!("Built-in ingest skips post-process steps {:?}.", unsupported);
    }
}

fn is_degenerate(face: &[u32]) -> bool {
    face.len() == 3 && (face[0] == face[1] || face[1] == face[2] || face[0] == face[2])
}

/// Bakes node world transforms into one mesh copy per instance and resets every node to identity.
fn pre_transform_vertices(scene: &mut Scene) {
    appearance_profiling::profile_function!();

    let mut baked_meshes = Vec::new();
    let mut stack: Vec<(u32, Mat4)> = scene
        .root_nodes
        .iter()
        .rev()
        .map(|root| (*root, Mat4::IDENTITY))
        .collect();

    while let Some((node_idx, parent_transform)) = stack.pop() {
        let Some(node) = scene.nodes.get_mut(node_idx as usize) else {
            continue;
        };

        let world_transform = parent_transform * node.transform;
        node.transform = Mat4::IDENTITY;

        let normal_matrix = Mat3::from_mat4(world_transform).inverse().transpose();
        let mut instance_indices = Vec::with_capacity(node.meshes.len());
        for mesh_idx in &node.meshes {
            let Some(mesh) = scene.meshes.get(*mesh_idx as usize) else {
                // Left for the mesh converter to report.
                instance_indices.push(u32::MAX);
                continue;
            };

            let mut mesh = mesh.clone();
            if world_transform != Mat4::IDENTITY {
                for position in &mut mesh.vertex_positions {
                    *position = world_transform.transform_point3(*position);
                }
                for normal in &mut mesh.vertex_normals {
                    *normal = (normal_matrix * *normal).normalize_or_zero();
                }
            }

            instance_indices.push(baked_meshes.len() as u32);
            baked_meshes.push(mesh);
        }
        node.meshes = instance_indices;

        for child in node.children.iter().rev() {
            stack.push((*child, world_transform));
        }
    }

    scene.meshes = baked_meshes;
}

/// Decodes `%XX` escapes found in glTF uris.
pub(crate) fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let value = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(value) = value {
                decoded.push(value);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}
