use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use parking_lot::RwLock;
use uuid::Uuid;

pub mod asset_paths;
pub mod metadata;

pub use metadata::{AssetMetadata, AssetType};

pub trait Asset
where
    Self: Sized,
{
    fn load(file_path: &str, data: &[u8]) -> Result<Self>;

    fn save(&self) -> Result<Vec<u8>>;

    fn uuid(&self) -> Uuid;
}

/// Loads persisted assets by path and keeps them alive for subsequent lookups.
pub struct AssetCache<A: Asset> {
    assets: HashMap<String, Arc<A>>,
}

impl<A: Asset> Default for AssetCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Asset> AssetCache<A> {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
        }
    }

    pub fn get(&mut self, path: &str) -> Result<Arc<A>> {
        appearance_profiling::profile_function!();

        if let Some(asset) = self.assets.get(path) {
            Ok(asset.clone())
        } else {
            let data = fs::read(path).with_context(|| format!("Failed to read asset {}", path))?;
            let asset = Arc::new(A::load(path, &data)?);

            self.assets.insert(path.to_owned(), asset.clone());
            Ok(asset)
        }
    }
}

/// Persistence of asset files and their `.meta` sidecars.
pub trait AssetDatabase: Send + Sync {
    fn assets_root(&self) -> &Path;

    fn write_metadata(&self, asset_path: &Path, metadata: AssetMetadata) -> Result<()>;

    fn read_metadata(&self, asset_path: &Path) -> Result<Option<AssetMetadata>>;

    fn path_for_guid(&self, guid: Uuid) -> Option<PathBuf>;

    /// Writes the asset bytes followed by its sidecar.
    fn write_asset(&self, asset_path: &Path, data: &[u8], metadata: AssetMetadata) -> Result<()> {
        fs::write(asset_path, data)
            .with_context(|| format!("Failed to write asset {}", asset_path.display()))?;
        self.write_metadata(asset_path, metadata)
    }

    /// Project-relative form of `path`, as stored inside assets.
    fn relative_path(&self, path: &Path) -> String {
        asset_paths::resolve_relative_path(path, self.assets_root())
    }
}

/// Stores metadata as JSON sidecars next to each asset.
pub struct FileAssetDatabase {
    assets_root: PathBuf,
    guids: RwLock<HashMap<Uuid, PathBuf>>,
}

impl FileAssetDatabase {
    pub fn new(assets_root: impl Into<PathBuf>) -> Self {
        Self {
            assets_root: assets_root.into(),
            guids: RwLock::new(HashMap::new()),
        }
    }
}

impl AssetDatabase for FileAssetDatabase {
    fn assets_root(&self) -> &Path {
        &self.assets_root
    }

    fn write_metadata(&self, asset_path: &Path, metadata: AssetMetadata) -> Result<()> {
        appearance_profiling::profile_function!();

        let meta_path = asset_paths::meta_path(asset_path);
        let json = serde_json::to_string_pretty(&metadata)?;
        fs::write(&meta_path, json)
            .with_context(|| format!("Failed to write metadata {}", meta_path.display()))?;

        log::debug!(
            "Registered {} {} at {}",
            metadata.asset_type,
            metadata.guid,
            asset_path.display()
        );
        self.guids
            .write()
            .insert(metadata.guid, asset_path.to_path_buf());
        Ok(())
    }

    fn read_metadata(&self, asset_path: &Path) -> Result<Option<AssetMetadata>> {
        let meta_path = asset_paths::meta_path(asset_path);
        if !meta_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&meta_path)
            .with_context(|| format!("Failed to read metadata {}", meta_path.display()))?;
        let metadata: AssetMetadata = serde_json::from_str(&json)
            .with_context(|| format!("Malformed metadata {}", meta_path.display()))?;

        self.guids
            .write()
            .entry(metadata.guid)
            .or_insert_with(|| asset_path.to_path_buf());
        Ok(Some(metadata))
    }

    fn path_for_guid(&self, guid: Uuid) -> Option<PathBuf> {
        self.guids.read().get(&guid).cloned()
    }
}
