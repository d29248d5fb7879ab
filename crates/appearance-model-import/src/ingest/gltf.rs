use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use appearance_model::{
    material::{AlphaMode, MaterialTexturePaths, SceneMaterial},
    mesh::SceneMesh,
    EmbeddedTexture, Scene, SceneNode,
};
use glam::{Mat4, Vec2, Vec3, Vec4};
use gltf::mesh::Mode;

use super::percent_decode;

pub(super) fn ingest(path: &Path) -> Result<Scene> {
    appearance_profiling::profile_function!();

    let gltf::Gltf { document, blob } =
        gltf::Gltf::open(path).with_context(|| format!("Failed to parse {}", path.display()))?;
    let buffers = gltf::import_buffers(&document, path.parent(), blob)
        .with_context(|| format!("Failed to load buffers of {}", path.display()))?;

    let mut scene = Scene::default();
    let image_refs = process_images(&document, &buffers, &mut scene);

    scene.materials = document
        .materials()
        .map(|material| process_material(&material, &image_refs))
        .collect();
    let default_material_idx = scene.materials.len() as u32;
    let mut needs_default_material = false;

    let mut primitive_meshes = HashMap::new();
    let gltf_scene = document.default_scene().or_else(|| document.scenes().next());
    if let Some(gltf_scene) = gltf_scene {
        for root_node in gltf_scene.nodes() {
            scene.root_nodes.push(scene.nodes.len() as u32);
            process_nodes_recursive(
                &root_node,
                &buffers,
                default_material_idx,
                &mut needs_default_material,
                &mut primitive_meshes,
                &mut scene,
            )?;
        }
    }

    if needs_default_material {
        scene.materials.push(SceneMaterial {
            name: "DefaultMaterial".to_owned(),
            ..Default::default()
        });
    }

    Ok(scene)
}

/// Maps every image to a texture reference. Buffer view images become embedded `*N` textures.
fn process_images(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    scene: &mut Scene,
) -> Vec<Option<String>> {
    document
        .images()
        .map(|image| match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let data = buffers.get(view.buffer().index()).and_then(|buffer| {
                    buffer
                        .0
                        .get(view.offset()..view.offset() + view.length())
                        .map(<[u8]>::to_vec)
                });
                let Some(data) = data else {
                    log::warn!("Image {} points outside of its buffer.", image.index());
                    return None;
                };

                let reference = format!("*{}", scene.embedded_textures.len());
                scene.embedded_textures.push(EmbeddedTexture {
                    data,
                    mime_type: Some(mime_type.to_owned()),
                });
                Some(reference)
            }
            gltf::image::Source::Uri { uri, .. } => {
                if uri.starts_with("data:") {
                    log::warn!("Data uri images are not supported, image {} skipped.", image.index());
                    None
                } else {
                    Some(percent_decode(uri))
                }
            }
        })
        .collect()
}

fn process_material(material: &gltf::Material, image_refs: &[Option<String>]) -> SceneMaterial {
    let pbr = material.pbr_metallic_roughness();
    let color = Vec4::from(pbr.base_color_factor());

    let texture_ref = |texture: gltf::Texture| -> Option<String> {
        image_refs.get(texture.source().index()).cloned().flatten()
    };

    let textures = MaterialTexturePaths {
        albedo: pbr
            .base_color_texture()
            .and_then(|info| texture_ref(info.texture())),
        normal: material
            .normal_texture()
            .and_then(|tex| texture_ref(tex.texture())),
        metallic_roughness: pbr
            .metallic_roughness_texture()
            .and_then(|info| texture_ref(info.texture())),
        occlusion: material
            .occlusion_texture()
            .and_then(|tex| texture_ref(tex.texture())),
        emissive: material
            .emissive_texture()
            .and_then(|info| texture_ref(info.texture())),
        ..Default::default()
    };

    SceneMaterial {
        name: material.name().unwrap_or_default().to_owned(),
        color,
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        opacity: color.w,
        alpha_mode: match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        },
        emission: Vec3::from(material.emissive_factor())
            * material.emissive_strength().unwrap_or(1.0),
        textures,
    }
}

fn process_nodes_recursive(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    default_material_idx: u32,
    needs_default_material: &mut bool,
    primitive_meshes: &mut HashMap<(usize, usize), u32>,
    scene: &mut Scene,
) -> Result<()> {
    let mut scene_node = SceneNode::new(node.name().unwrap_or("Unnamed"));
    scene_node.transform = Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let num_primitives = mesh.primitives().len();
        for primitive in mesh.primitives() {
            let key = (mesh.index(), primitive.index());
            let mesh_idx = match primitive_meshes.get(&key) {
                Some(mesh_idx) => *mesh_idx,
                None => {
                    let name = match (mesh.name(), num_primitives) {
                        (Some(name), 1) => name.to_owned(),
                        (Some(name), _) => format!("{}_{}", name, primitive.index()),
                        (None, _) => String::new(),
                    };
                    let material_index = match primitive.material().index() {
                        Some(material_idx) => material_idx as u32,
                        None => {
                            *needs_default_material = true;
                            default_material_idx
                        }
                    };

                    let scene_mesh = process_primitive(&primitive, buffers, name, material_index)?;
                    let mesh_idx = scene.meshes.len() as u32;
                    scene.meshes.push(scene_mesh);
                    primitive_meshes.insert(key, mesh_idx);
                    mesh_idx
                }
            };
            scene_node.meshes.push(mesh_idx);
        }
    }

    scene.nodes.push(scene_node);
    let node_idx = scene.nodes.len() - 1;

    for child in node.children() {
        let child_idx = scene.nodes.len() as u32;
        scene.nodes[node_idx].children.push(child_idx);
        process_nodes_recursive(
            &child,
            buffers,
            default_material_idx,
            needs_default_material,
            primitive_meshes,
            scene,
        )?;
    }

    Ok(())
}

fn process_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    name: String,
    material_index: u32,
) -> Result<SceneMesh> {
    appearance_profiling::profile_function!();

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

    let vertex_positions: Vec<Vec3> = reader
        .read_positions()
        .context("Primitive has no positions")?
        .map(Vec3::from)
        .collect();
    let vertex_normals = reader
        .read_normals()
        .map(|normals| normals.map(Vec3::from).collect())
        .unwrap_or_default();
    let vertex_tex_coords = reader
        .read_tex_coords(0)
        .map(|tex_coords| tex_coords.into_f32().map(Vec2::from).collect())
        .unwrap_or_default();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertex_positions.len() as u32).collect(),
    };

    Ok(SceneMesh {
        name,
        vertex_positions,
        vertex_normals,
        vertex_tex_coords,
        faces: assemble_faces(primitive.mode(), &indices),
        material_index,
    })
}

/// Turns an index stream into faces. Strips and fans are unrolled to triangle lists.
fn assemble_faces(mode: Mode, indices: &[u32]) -> Vec<Vec<u32>> {
    match mode {
        Mode::Points => indices.iter().map(|i| vec![*i]).collect(),
        Mode::Lines => indices.chunks_exact(2).map(<[u32]>::to_vec).collect(),
        Mode::LineStrip => indices.windows(2).map(<[u32]>::to_vec).collect(),
        Mode::LineLoop => {
            let mut faces: Vec<Vec<u32>> = indices.windows(2).map(<[u32]>::to_vec).collect();
            if let (Some(first), Some(last)) = (indices.first(), indices.last()) {
                if indices.len() > 2 {
                    faces.push(vec![*last, *first]);
                }
            }
            faces
        }
        Mode::Triangles => indices.chunks_exact(3).map(<[u32]>::to_vec).collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    vec![w[0], w[1], w[2]]
                } else {
                    vec![w[1], w[0], w[2]]
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((center, rest)) => rest
                .windows(2)
                .map(|w| vec![*center, w[0], w[1]])
                .collect(),
            None => vec![],
        },
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    // One triangle, positions only, no indices, stored in a base64 buffer.
    const TRIANGLE_BUFFER: &str =
        "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA";

    fn write_triangle_gltf(dir: &Path, materials: &str, primitive_material: &str) -> std::path::PathBuf {
        let json = format!(
            r#"{{
                "asset": {{ "version": "2.0" }},
                "extensionsUsed": ["KHR_materials_emissive_strength"],
                "scene": 0,
                "scenes": [{{ "nodes": [0] }}],
                "nodes": [{{ "name": "Root", "mesh": 0, "translation": [0.0, 0.0, 2.0] }}],
                "meshes": [{{ "name": "Tri", "primitives": [{{ "attributes": {{ "POSITION": 0 }} {primitive_material} }}] }}],
                "accessors": [{{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                                 "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }}],
                "bufferViews": [{{ "buffer": 0, "byteLength": 36 }}],
                "buffers": [{{ "byteLength": 36, "uri": "{TRIANGLE_BUFFER}" }}],
                "materials": [{materials}]
            }}"#
        );
        let path = dir.join("triangle.gltf");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn reads_nodes_meshes_and_materials() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_triangle_gltf(
            dir.path(),
            r#"{ "name": "Glass", "alphaMode": "BLEND",
                 "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.5, 0.5, 0.25], "roughnessFactor": 0.1 },
                 "emissiveFactor": [1.0, 0.5, 0.0],
                 "extensions": { "KHR_materials_emissive_strength": { "emissiveStrength": 3.0 } } }"#,
            r#", "material": 0"#,
        );

        let scene = ingest(&path).unwrap();
        assert_eq!(scene.root_nodes, vec![0]);
        assert_eq!(scene.nodes[0].name, "Root");
        assert_eq!(scene.nodes[0].transform.w_axis.z, 2.0);
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.meshes[0].name, "Tri");
        assert_eq!(scene.meshes[0].faces, vec![vec![0, 1, 2]]);
        assert_eq!(scene.meshes[0].vertex_positions[1], Vec3::X);

        let material = &scene.materials[0];
        assert_eq!(material.name, "Glass");
        assert_eq!(material.alpha_mode, AlphaMode::Blend);
        assert_eq!(material.opacity, 0.25);
        assert_eq!(material.roughness, 0.1);
        assert_eq!(material.emission, Vec3::new(3.0, 1.5, 0.0));
    }

    #[test]
    fn primitives_without_material_get_a_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_triangle_gltf(dir.path(), "", "");

        let scene = ingest(&path).unwrap();
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].name, "DefaultMaterial");
        assert_eq!(scene.meshes[0].material_index, 0);
    }

    #[test]
    fn strips_and_fans_unroll() {
        assert_eq!(
            assemble_faces(Mode::TriangleStrip, &[0, 1, 2, 3]),
            vec![vec![0, 1, 2], vec![2, 1, 3]]
        );
        assert_eq!(
            assemble_faces(Mode::TriangleFan, &[0, 1, 2, 3]),
            vec![vec![0, 1, 2], vec![0, 2, 3]]
        );
        assert_eq!(assemble_faces(Mode::Lines, &[0, 1, 2, 3]).len(), 2);
        assert_eq!(assemble_faces(Mode::LineLoop, &[0, 1, 2]).len(), 3);
        assert_eq!(assemble_faces(Mode::Points, &[4, 5]), vec![vec![4], vec![5]]);
    }
}
