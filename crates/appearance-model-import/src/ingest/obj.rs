use std::path::Path;

use anyhow::{Context, Result};
use appearance_model::{
    material::{AlphaMode, MaterialTexturePaths, SceneMaterial},
    mesh::SceneMesh,
    Scene, SceneNode,
};
use glam::{Vec2, Vec3, Vec4};

use crate::settings::PostProcess;

pub(super) fn ingest(path: &Path, post_process: PostProcess) -> Result<Scene> {
    appearance_profiling::profile_function!();

    let load_options = tobj::LoadOptions {
        single_index: true,
        triangulate: post_process.contains(PostProcess::TRIANGULATE),
        ignore_points: false,
        ignore_lines: false,
        ..Default::default()
    };
    let (models, materials) = tobj::load_obj(path, &load_options)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let materials = materials.unwrap_or_else(|err| {
        log::warn!("Failed to load materials of {}: {}", path.display(), err);
        vec![]
    });

    let mut scene = Scene {
        materials: materials.iter().map(process_material).collect(),
        ..Default::default()
    };
    let default_material_idx = scene.materials.len() as u32;

    let root_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    scene.root_nodes.push(0);
    scene.nodes.push(SceneNode::new(&root_name));

    for model in models {
        let material_index = match model.mesh.material_id {
            Some(material_id) if material_id < materials.len() => material_id as u32,
            _ => default_material_idx,
        };
        let mesh = process_mesh(model.name.clone(), &model.mesh, material_index);

        let mut node = SceneNode::new(&model.name);
        node.meshes.push(scene.meshes.len() as u32);
        scene.meshes.push(mesh);

        let child_idx = scene.nodes.len() as u32;
        scene.nodes[0].children.push(child_idx);
        scene.nodes.push(node);
    }

    if scene
        .meshes
        .iter()
        .any(|mesh| mesh.material_index == default_material_idx)
    {
        scene.materials.push(SceneMaterial {
            name: "DefaultMaterial".to_owned(),
            ..Default::default()
        });
    }

    Ok(scene)
}

fn process_mesh(name: String, mesh: &tobj::Mesh, material_index: u32) -> SceneMesh {
    let faces = if mesh.face_arities.is_empty() {
        mesh.indices.chunks_exact(3).map(<[u32]>::to_vec).collect()
    } else {
        let mut faces = Vec::with_capacity(mesh.face_arities.len());
        let mut start = 0;
        for arity in &mesh.face_arities {
            let end = (start + *arity as usize).min(mesh.indices.len());
            faces.push(mesh.indices[start..end].to_vec());
            start = end;
        }
        faces
    };

    SceneMesh {
        name,
        vertex_positions: mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect(),
        vertex_normals: mesh
            .normals
            .chunks_exact(3)
            .map(|n| Vec3::new(n[0], n[1], n[2]))
            .collect(),
        vertex_tex_coords: mesh
            .texcoords
            .chunks_exact(2)
            .map(|t| Vec2::new(t[0], t[1]))
            .collect(),
        faces,
        material_index,
    }
}

fn process_material(material: &tobj::Material) -> SceneMaterial {
    let param = |key: &str| material.unknown_param.get(key).map(String::as_str);
    let float_param = |key: &str| param(key).and_then(|value| value.trim().parse::<f32>().ok());

    let opacity = material
        .dissolve
        .or_else(|| float_param("Tr").map(|transparency| 1.0 - transparency))
        .unwrap_or(1.0);
    let diffuse = Vec3::from(material.diffuse.unwrap_or([1.0; 3]));

    let textures = MaterialTexturePaths {
        albedo: material.diffuse_texture.as_deref().and_then(texture_path),
        normal: material
            .normal_texture
            .as_deref()
            .or_else(|| param("norm"))
            .and_then(texture_path),
        roughness: param("map_Pr").and_then(texture_path),
        metallic: param("map_Pm").and_then(texture_path),
        emissive: param("map_Ke").and_then(texture_path),
        opacity: material.dissolve_texture.as_deref().and_then(texture_path),
        ..Default::default()
    };

    let emission = param("Ke")
        .and_then(|value| {
            let components: Vec<f32> = value
                .split_whitespace()
                .filter_map(|c| c.parse().ok())
                .collect();
            (components.len() == 3).then(|| Vec3::new(components[0], components[1], components[2]))
        })
        .unwrap_or(Vec3::ZERO);

    SceneMaterial {
        name: material.name.clone(),
        color: Vec4::from((diffuse, opacity)),
        metallic: float_param("Pm").unwrap_or(0.0),
        roughness: float_param("Pr").unwrap_or(0.5),
        opacity,
        alpha_mode: AlphaMode::Opaque,
        emission,
        textures,
    }
}

/// Texture statements may carry options before the file name, e.g. `-bm 0.5 bump.png`.
fn texture_path(statement: &str) -> Option<String> {
    statement.split_whitespace().last().map(str::to_owned)
}
