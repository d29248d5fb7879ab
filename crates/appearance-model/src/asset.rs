use anyhow::{Context, Result};
use appearance_asset_database::Asset;
use uuid::Uuid;

use crate::{MaterialAsset, MeshAsset};

pub const MESH_ASSET_EXTENSION: &str = "meshasset";
pub const MATERIAL_ASSET_EXTENSION: &str = "material";

impl Asset for MeshAsset {
    fn load(file_path: &str, data: &[u8]) -> Result<Self> {
        appearance_profiling::profile_function!();

        let mesh: MeshAsset = serde_json::from_slice(data)
            .with_context(|| format!("Malformed mesh asset {}", file_path))?;
        if let Some(sub_mesh) = mesh.sub_meshes.iter().find(|sub_mesh| !sub_mesh.is_valid()) {
            anyhow::bail!(
                "Mesh asset {} contains invalid sub-mesh {}",
                file_path,
                sub_mesh.name
            );
        }
        Ok(mesh)
    }

    fn save(&self) -> Result<Vec<u8>> {
        appearance_profiling::profile_function!();

        Ok(serde_json::to_vec_pretty(self)?)
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl Asset for MaterialAsset {
    fn load(file_path: &str, data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).with_context(|| format!("Malformed material {}", file_path))
    }

    fn save(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }
}
