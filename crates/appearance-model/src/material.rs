use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// Texture references of a source material, as written in the model file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialTexturePaths {
    pub albedo: Option<String>,
    pub normal: Option<String>,
    pub metallic_roughness: Option<String>,
    pub metallic: Option<String>,
    pub roughness: Option<String>,
    pub occlusion: Option<String>,
    pub emissive: Option<String>,
    pub opacity: Option<String>,
}

impl MaterialTexturePaths {
    pub fn get(&self, channel: TextureChannel) -> Option<&str> {
        self.slot(channel).as_deref()
    }

    /// Fills `channel` unless it already holds a path. Returns whether it was filled.
    pub fn fill(&mut self, channel: TextureChannel, path: &str) -> bool {
        let slot = self.slot_mut(channel);
        if slot.is_some() {
            return false;
        }
        *slot = Some(path.to_owned());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureChannel, &str)> + '_ {
        TextureChannel::ALL
            .into_iter()
            .filter_map(|channel| self.get(channel).map(|path| (channel, path)))
    }

    fn slot(&self, channel: TextureChannel) -> &Option<String> {
        match channel {
            TextureChannel::Albedo => &self.albedo,
            TextureChannel::Normal => &self.normal,
            TextureChannel::MetallicRoughness => &self.metallic_roughness,
            TextureChannel::Metallic => &self.metallic,
            TextureChannel::Roughness => &self.roughness,
            TextureChannel::Occlusion => &self.occlusion,
            TextureChannel::Emissive => &self.emissive,
        }
    }

    fn slot_mut(&mut self, channel: TextureChannel) -> &mut Option<String> {
        match channel {
            TextureChannel::Albedo => &mut self.albedo,
            TextureChannel::Normal => &mut self.normal,
            TextureChannel::MetallicRoughness => &mut self.metallic_roughness,
            TextureChannel::Metallic => &mut self.metallic,
            TextureChannel::Roughness => &mut self.roughness,
            TextureChannel::Occlusion => &mut self.occlusion,
            TextureChannel::Emissive => &mut self.emissive,
        }
    }
}

/// Material as produced by scene ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMaterial {
    pub name: String,

    pub color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub opacity: f32,
    pub alpha_mode: AlphaMode,
    pub emission: Vec3,

    pub textures: MaterialTexturePaths,
}

impl Default for SceneMaterial {
    fn default() -> Self {
        SceneMaterial {
            name: String::new(),
            color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            opacity: 1.0,
            alpha_mode: AlphaMode::Opaque,
            emission: Vec3::ZERO,
            textures: MaterialTexturePaths::default(),
        }
    }
}

/// Generic per-material record shared by texture extraction and material extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialInfo {
    pub source_index: usize,
    /// Name exactly as found in the source file.
    pub source_name: String,
    /// Name used for the persisted asset, sanitised or synthesised.
    pub name: String,

    pub albedo: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub opacity: f32,
    pub alpha_mode: AlphaMode,
    /// Brightest channel of the ingest emission color.
    pub emission: f32,

    pub textures: MaterialTexturePaths,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureChannel {
    Albedo,
    Normal,
    MetallicRoughness,
    Metallic,
    Roughness,
    Occlusion,
    Emissive,
}

impl TextureChannel {
    pub const ALL: [TextureChannel; 7] = [
        Self::Albedo,
        Self::Normal,
        Self::MetallicRoughness,
        Self::Metallic,
        Self::Roughness,
        Self::Occlusion,
        Self::Emissive,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransparencyMode {
    #[default]
    Opaque = 0,
    Blend = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialTextures {
    pub albedo: Option<Uuid>,
    pub normal: Option<Uuid>,
    pub metallic_roughness: Option<Uuid>,
    pub metallic: Option<Uuid>,
    pub roughness: Option<Uuid>,
    pub occlusion: Option<Uuid>,
    pub emissive: Option<Uuid>,
}

impl MaterialTextures {
    pub fn get(&self, channel: TextureChannel) -> Option<Uuid> {
        match channel {
            TextureChannel::Albedo => self.albedo,
            TextureChannel::Normal => self.normal,
            TextureChannel::MetallicRoughness => self.metallic_roughness,
            TextureChannel::Metallic => self.metallic,
            TextureChannel::Roughness => self.roughness,
            TextureChannel::Occlusion => self.occlusion,
            TextureChannel::Emissive => self.emissive,
        }
    }

    pub fn set(&mut self, channel: TextureChannel, texture: Uuid) {
        let slot = match channel {
            TextureChannel::Albedo => &mut self.albedo,
            TextureChannel::Normal => &mut self.normal,
            TextureChannel::MetallicRoughness => &mut self.metallic_roughness,
            TextureChannel::Metallic => &mut self.metallic,
            TextureChannel::Roughness => &mut self.roughness,
            TextureChannel::Occlusion => &mut self.occlusion,
            TextureChannel::Emissive => &mut self.emissive,
        };
        *slot = Some(texture);
    }

    pub fn num_assigned(&self) -> usize {
        TextureChannel::ALL
            .into_iter()
            .filter(|channel| self.get(*channel).is_some())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialAsset {
    pub uuid: Uuid,
    pub name: String,
    pub shader: String,

    pub albedo_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub opacity: f32,
    pub transparency_mode: TransparencyMode,

    pub textures: MaterialTextures,
    pub normal_strength: f32,
    pub emission: f32,
}

impl MaterialAsset {
    pub const DEFAULT_SHADER: &'static str = "appearance::pbr";

    pub fn new(name: &str) -> Self {
        Self {
            uuid: Uuid::nil(),
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.transparency_mode == TransparencyMode::Blend
    }
}

impl Default for MaterialAsset {
    fn default() -> Self {
        MaterialAsset {
            uuid: Uuid::nil(),
            name: String::new(),
            shader: Self::DEFAULT_SHADER.to_owned(),
            albedo_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            opacity: 1.0,
            transparency_mode: TransparencyMode::Opaque,
            textures: MaterialTextures::default(),
            normal_strength: 1.0,
            emission: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_never_overwrites() {
        let mut paths = MaterialTexturePaths {
            albedo: Some("wood.png".to_owned()),
            ..Default::default()
        };
        assert!(!paths.fill(TextureChannel::Albedo, "other.png"));
        assert!(paths.fill(TextureChannel::Normal, "wood_n.png"));
        assert_eq!(paths.get(TextureChannel::Albedo), Some("wood.png"));

        let channels: Vec<_> = paths.iter().map(|(channel, _)| channel).collect();
        assert_eq!(channels, vec![TextureChannel::Albedo, TextureChannel::Normal]);
    }

    #[test]
    fn texture_guids_count() {
        let mut textures = MaterialTextures::default();
        assert_eq!(textures.num_assigned(), 0);
        textures.set(TextureChannel::Emissive, Uuid::new_v4());
        textures.set(TextureChannel::Occlusion, Uuid::new_v4());
        assert_eq!(textures.num_assigned(), 2);
        assert!(textures.get(TextureChannel::Albedo).is_none());
    }
}
