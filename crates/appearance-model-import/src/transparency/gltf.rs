use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{
    parse_float, starts_with, FormatRecord, TransparencyDescriptor, TransparencyReport,
    PARSER_ALPHA_THRESHOLD,
};
use crate::{ingest::percent_decode, settings::extension_of};

const GLB_MAGIC: &[u8] = b"glTF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GltfTextureIndices {
    pub base_color: Option<usize>,
    pub metallic_roughness: Option<usize>,
    pub normal: Option<usize>,
    pub occlusion: Option<usize>,
    pub emissive: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GltfRecord {
    pub alpha_mode: String,
    pub alpha_cutoff: f32,
    pub base_color_factor: [f32; 4],
    pub textures: GltfTextureIndices,
}

impl Default for GltfRecord {
    fn default() -> Self {
        Self {
            alpha_mode: "OPAQUE".to_owned(),
            alpha_cutoff: 0.5,
            base_color_factor: [1.0; 4],
            textures: GltfTextureIndices::default(),
        }
    }
}

impl GltfRecord {
    pub fn is_transparent(&self) -> bool {
        self.alpha_mode == "BLEND"
            || self.alpha_mode == "MASK"
            || self.base_color_factor[3] < PARSER_ALPHA_THRESHOLD
    }
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    materials: Vec<Material>,
    #[serde(default)]
    textures: Vec<Texture>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Material {
    name: Option<String>,
    alpha_mode: Option<String>,
    alpha_cutoff: Option<f32>,
    pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    normal_texture: Option<TextureInfo>,
    occlusion_texture: Option<TextureInfo>,
    emissive_texture: Option<TextureInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PbrMetallicRoughness {
    // Kept loose so a short or malformed array does not reject the whole file.
    base_color_factor: Option<Vec<serde_json::Value>>,
    base_color_texture: Option<TextureInfo>,
    metallic_roughness_texture: Option<TextureInfo>,
}

#[derive(Deserialize)]
struct TextureInfo {
    index: usize,
}

#[derive(Deserialize)]
struct Texture {
    source: Option<usize>,
}

#[derive(Deserialize)]
struct Image {
    uri: Option<String>,
}

/// Reads alpha mode, cutoff and base color per material from glTF JSON. Binary GLB yields nothing.
pub fn parse(path: &Path) -> TransparencyReport {
    appearance_profiling::profile_function!();

    if extension_of(path) == "glb" || starts_with(path, GLB_MAGIC) {
        log::debug!("{} is binary glTF, skipping transparency parse.", path.display());
        return TransparencyReport::default();
    }

    match parse_document(path) {
        Ok(report) => report,
        Err(err) => {
            log::warn!("glTF transparency parse failed: {:#}", err);
            TransparencyReport::default()
        }
    }
}

fn parse_document(path: &Path) -> Result<TransparencyReport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document: Document = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let mut report = TransparencyReport::default();

    for (texture_idx, texture) in document.textures.iter().enumerate() {
        let uri = texture
            .source
            .and_then(|image_idx| document.images.get(image_idx))
            .and_then(|image| image.uri.as_deref())
            .filter(|uri| !uri.starts_with("data:"));
        if let Some(uri) = uri {
            report
                .texture_paths
                .insert(texture_idx, percent_decode(uri));
        }
    }

    for (material_idx, material) in document.materials.iter().enumerate() {
        let Some(name) = material.name.as_deref().filter(|name| !name.is_empty()) else {
            log::debug!("glTF material {} has no name, no descriptor recorded.", material_idx);
            continue;
        };

        report.insert(TransparencyDescriptor::new(
            name,
            FormatRecord::Gltf(read_record(material)),
        ));
    }

    Ok(report)
}

fn read_record(material: &Material) -> GltfRecord {
    let defaults = GltfRecord::default();
    let pbr = material.pbr_metallic_roughness.as_ref();

    let mut base_color_factor = defaults.base_color_factor;
    if let Some(factor) = pbr.and_then(|pbr| pbr.base_color_factor.as_ref()) {
        for (component, value) in base_color_factor.iter_mut().zip(factor) {
            if let Some(value) = value.as_f64() {
                *component = value as f32;
            } else if let Some(value) = value.as_str().and_then(parse_float) {
                *component = value;
            }
        }
    }

    GltfRecord {
        alpha_mode: material
            .alpha_mode
            .clone()
            .unwrap_or(defaults.alpha_mode),
        alpha_cutoff: material.alpha_cutoff.unwrap_or(defaults.alpha_cutoff),
        base_color_factor,
        textures: GltfTextureIndices {
            base_color: pbr.and_then(|pbr| pbr.base_color_texture.as_ref().map(|t| t.index)),
            metallic_roughness: pbr
                .and_then(|pbr| pbr.metallic_roughness_texture.as_ref().map(|t| t.index)),
            normal: material.normal_texture.as_ref().map(|t| t.index),
            occlusion: material.occlusion_texture.as_ref().map(|t| t.index),
            emissive: material.emissive_texture.as_ref().map(|t| t.index),
        },
    }
}
