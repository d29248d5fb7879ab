use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of asset recorded in a `.meta` sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    #[serde(rename = "FBX")]
    Fbx,
    #[serde(rename = "OBJ")]
    Obj,
    #[serde(rename = "GLTF")]
    Gltf,
    #[serde(rename = "GLB")]
    Glb,
    #[serde(rename = "DAE")]
    Dae,
    /// Source model in a format without a dedicated type.
    Model,
    MeshAsset,
    Material,
    Texture,
}

impl AssetType {
    /// Type of a copied source model, derived from its extension.
    pub fn from_model_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "fbx" => Self::Fbx,
            "obj" => Self::Obj,
            "gltf" => Self::Gltf,
            "glb" => Self::Glb,
            "dae" => Self::Dae,
            _ => Self::Model,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fbx => "FBX",
            Self::Obj => "OBJ",
            Self::Gltf => "GLTF",
            Self::Glb => "GLB",
            Self::Dae => "DAE",
            Self::Model => "Model",
            Self::MeshAsset => "MeshAsset",
            Self::Material => "Material",
            Self::Texture => "Texture",
        };
        f.write_str(name)
    }
}

/// Contents of a `.meta` sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub guid: Uuid,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
}

impl AssetMetadata {
    pub fn new(guid: Uuid, asset_type: AssetType) -> Self {
        Self { guid, asset_type }
    }
}
