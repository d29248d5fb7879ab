use std::{collections::HashMap, path::Path};

use anyhow::Result;
use appearance_model::{MaterialInfo, Scene};
use uuid::Uuid;

mod file_resolver;
pub use file_resolver::FileTextureResolver;

/// Texture reference string (as written in the model) to texture asset GUID.
pub type TextureMap = HashMap<String, Uuid>;

pub struct TextureExtractionRequest<'a> {
    pub source_path: &'a Path,
    pub output_dir: &'a Path,
    pub model_name: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoAssignedTextures {
    pub albedo: Option<Uuid>,
    pub normal: Option<Uuid>,
}

impl AutoAssignedTextures {
    pub fn is_empty(&self) -> bool {
        self.albedo.is_none() && self.normal.is_none()
    }
}

/// Locates texture files referenced by a model and gives each one a GUID.
pub trait TextureResolver {
    fn extract(
        &mut self,
        request: &TextureExtractionRequest,
        scene: &Scene,
        materials: &[MaterialInfo],
    ) -> Result<TextureMap>;

    /// Looks up textures for `material_name` by naming convention, e.g. `Brick_Albedo.png`.
    fn auto_assign(&self, material_name: &str) -> AutoAssignedTextures;
}

/// Finds the GUID of `reference`, first by exact reference then by file name alone.
pub fn lookup_texture(textures: &TextureMap, reference: &str) -> Option<Uuid> {
    if let Some(guid) = textures.get(reference) {
        return Some(*guid);
    }

    let file_name = texture_file_name(reference)?;
    textures.iter().find_map(|(path, guid)| {
        texture_file_name(path)
            .filter(|name| name.eq_ignore_ascii_case(file_name))
            .map(|_| *guid)
    })
}

/// File name part of a texture reference, accepting both separator styles.
pub fn texture_file_name(reference: &str) -> Option<&str> {
    reference
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}
