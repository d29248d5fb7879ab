use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use appearance_asset_database::{AssetDatabase, AssetMetadata, AssetType};
use appearance_model::{MaterialInfo, Scene};
use uuid::Uuid;

use crate::{
    texture_file_name, AutoAssignedTextures, TextureExtractionRequest, TextureMap,
    TextureResolver,
};

const ALBEDO_SUFFIXES: &[&str] = &["_albedo", "_basecolor", "_base_color", "_diffuse", "_color"];
const NORMAL_SUFFIXES: &[&str] = &["_normal", "_normals", "_nrm"];

/// Copies referenced textures next to the imported model and tracks them through `.meta` sidecars.
pub struct FileTextureResolver {
    database: Arc<dyn AssetDatabase>,
    search_dirs: Vec<PathBuf>,
}

impl FileTextureResolver {
    pub fn new(database: Arc<dyn AssetDatabase>) -> Self {
        Self {
            database,
            search_dirs: vec![],
        }
    }

    fn texture_guid(&self, texture_path: &Path) -> Result<Uuid> {
        if let Some(metadata) = self.database.read_metadata(texture_path)? {
            return Ok(metadata.guid);
        }

        let guid = Uuid::new_v4();
        self.database
            .write_metadata(texture_path, AssetMetadata::new(guid, AssetType::Texture))?;
        Ok(guid)
    }

    fn extract_embedded(
        &self,
        request: &TextureExtractionRequest,
        scene: &Scene,
        reference: &str,
    ) -> Result<Option<PathBuf>> {
        let Some(texture) = scene.embedded_texture(reference) else {
            log::warn!("Embedded texture {} does not exist in the model.", reference);
            return Ok(None);
        };

        let extension = match texture.mime_type.as_deref() {
            Some("image/png") => "png",
            Some("image/jpeg") => "jpg",
            _ => image::guess_format(&texture.data)
                .ok()
                .and_then(|format| format.extensions_str().first().copied())
                .unwrap_or("bin"),
        };

        let file_name = format!(
            "{}_Tex{}.{}",
            request.model_name,
            reference.trim_start_matches('*'),
            extension
        );
        let output_path = request.output_dir.join(file_name);
        if !output_path.exists() {
            fs::write(&output_path, &texture.data)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
        }
        Ok(Some(output_path))
    }

    fn extract_external(
        &self,
        request: &TextureExtractionRequest,
        reference: &str,
    ) -> Result<Option<PathBuf>> {
        let source_dir = request.source_path.parent().unwrap_or(Path::new(""));
        let normalized = reference.replace('\\', "/");
        let Some(file_name) = texture_file_name(&normalized) else {
            return Ok(None);
        };

        let mut candidates = vec![
            source_dir.join(&normalized),
            source_dir.join(file_name),
            request.output_dir.join(file_name),
        ];
        if Path::new(&normalized).is_absolute() {
            candidates.insert(0, PathBuf::from(&normalized));
        }
        let Some(found) = candidates.iter().find(|candidate| candidate.is_file()) else {
            log::warn!(
                "Texture {} referenced by {} could not be found.",
                reference,
                request.source_path.display()
            );
            return Ok(None);
        };

        if image::ImageFormat::from_path(found).is_err() {
            log::debug!("{} is not a recognised image format.", found.display());
        }

        let output_path = request.output_dir.join(file_name);
        if !output_path.exists() {
            fs::copy(found, &output_path).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    found.display(),
                    output_path.display()
                )
            })?;
        }
        Ok(Some(output_path))
    }
}

impl TextureResolver for FileTextureResolver {
    fn extract(
        &mut self,
        request: &TextureExtractionRequest,
        scene: &Scene,
        materials: &[MaterialInfo],
    ) -> Result<TextureMap> {
        appearance_profiling::profile_function!();

        fs::create_dir_all(request.output_dir)
            .with_context(|| format!("Failed to create {}", request.output_dir.display()))?;
        if !self.search_dirs.iter().any(|dir| dir == request.output_dir) {
            self.search_dirs.push(request.output_dir.to_path_buf());
        }

        let references: BTreeSet<&str> = materials
            .iter()
            .flat_map(|material| {
                material
                    .textures
                    .iter()
                    .map(|(_, path)| path)
                    .chain(material.textures.opacity.as_deref())
            })
            .collect();

        let mut textures = TextureMap::new();
        for reference in references {
            let extracted = if reference.starts_with('*') {
                self.extract_embedded(request, scene, reference)
            } else {
                self.extract_external(request, reference)
            };

            let guid = extracted.and_then(|path| {
                path.map(|path| self.texture_guid(&path))
                    .transpose()
            });
            let guid = match guid {
                Ok(Some(guid)) => guid,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("Skipping texture {}: {:#}", reference, err);
                    continue;
                }
            };
            textures.insert(reference.to_owned(), guid);
        }

        log::info!(
            "Resolved {} texture(s) for {}.",
            textures.len(),
            request.model_name
        );
        Ok(textures)
    }

    fn auto_assign(&self, material_name: &str) -> AutoAssignedTextures {
        appearance_profiling::profile_function!();

        let prefix = material_name.to_lowercase();
        let mut assigned = AutoAssignedTextures::default();

        for dir in &self.search_dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };

            let mut paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.is_file() && image::ImageFormat::from_path(path).is_ok())
                .collect();
            paths.sort();

            for path in paths {
                let Some(stem) = path.file_stem().map(|stem| stem.to_string_lossy().to_lowercase())
                else {
                    continue;
                };
                let Some(suffix) = stem.strip_prefix(&prefix) else {
                    continue;
                };

                let slot = if ALBEDO_SUFFIXES.contains(&suffix) {
                    &mut assigned.albedo
                } else if NORMAL_SUFFIXES.contains(&suffix) {
                    &mut assigned.normal
                } else {
                    continue;
                };
                if slot.is_some() {
                    continue;
                }

                match self.texture_guid(&path) {
                    Ok(guid) => *slot = Some(guid),
                    Err(err) => log::warn!("Failed to register {}: {:#}", path.display(), err),
                }
            }
        }

        assigned
    }
}

#[cfg(test)]
mod tests {
    use appearance_asset_database::FileAssetDatabase;
    use appearance_model::{material::MaterialTexturePaths, EmbeddedTexture};
    use glam::Vec4;

    use super::*;

    fn material_info(name: &str, textures: MaterialTexturePaths) -> MaterialInfo {
        MaterialInfo {
            source_index: 0,
            source_name: name.to_owned(),
            name: name.to_owned(),
            albedo: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            opacity: 1.0,
            alpha_mode: Default::default(),
            emission: 0.0,
            textures,
        }
    }

    #[test]
    fn copies_textures_and_reuses_guids() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("source");
        let output_dir = dir.path().join("assets").join("crate");
        fs::create_dir_all(source_dir.join("maps")).unwrap();
        fs::write(source_dir.join("maps").join("wood.png"), b"png").unwrap();
        let source_path = source_dir.join("crate.obj");

        let database: Arc<dyn AssetDatabase> =
            Arc::new(FileAssetDatabase::new(dir.path().join("assets")));
        let mut resolver = FileTextureResolver::new(database.clone());

        let materials = [material_info(
            "Wood",
            MaterialTexturePaths {
                albedo: Some("maps\\wood.png".to_owned()),
                normal: Some("missing_normal.png".to_owned()),
                ..Default::default()
            },
        )];
        let request = TextureExtractionRequest {
            source_path: &source_path,
            output_dir: &output_dir,
            model_name: "crate",
        };

        let first = resolver
            .extract(&request, &Scene::default(), &materials)
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(output_dir.join("wood.png").exists());
        assert!(output_dir.join("wood.png.meta").exists());

        let second = resolver
            .extract(&request, &Scene::default(), &materials)
            .unwrap();
        assert_eq!(first["maps\\wood.png"], second["maps\\wood.png"]);
    }

    #[test]
    fn writes_embedded_textures() {
        let dir = tempfile::tempdir().unwrap();
        let database: Arc<dyn AssetDatabase> = Arc::new(FileAssetDatabase::new(dir.path()));
        let mut resolver = FileTextureResolver::new(database);

        let scene = Scene {
            embedded_textures: vec![EmbeddedTexture {
                data: vec![1, 2, 3],
                mime_type: Some("image/png".to_owned()),
            }],
            ..Default::default()
        };
        let materials = [material_info(
            "Duck",
            MaterialTexturePaths {
                albedo: Some("*0".to_owned()),
                ..Default::default()
            },
        )];
        let source_path = dir.path().join("duck.glb");
        let request = TextureExtractionRequest {
            source_path: &source_path,
            output_dir: dir.path(),
            model_name: "duck",
        };

        let textures = resolver.extract(&request, &scene, &materials).unwrap();
        assert!(textures.contains_key("*0"));
        assert!(dir.path().join("duck_Tex0.png").exists());
    }

    #[test]
    fn auto_assign_by_naming_convention() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Brick_Albedo.png", "Brick_Normal.png", "Brick_Roughness.png", "Stone_Albedo.png"] {
            fs::write(dir.path().join(name), b"png").unwrap();
        }

        let database: Arc<dyn AssetDatabase> = Arc::new(FileAssetDatabase::new(dir.path()));
        let mut resolver = FileTextureResolver::new(database);
        let source_path = dir.path().join("wall.fbx");
        let request = TextureExtractionRequest {
            source_path: &source_path,
            output_dir: dir.path(),
            model_name: "wall",
        };
        resolver.extract(&request, &Scene::default(), &[]).unwrap();

        let assigned = resolver.auto_assign("Brick");
        assert!(assigned.albedo.is_some());
        assert!(assigned.normal.is_some());
        assert_ne!(assigned.albedo, assigned.normal);

        assert!(resolver.auto_assign("Glass").is_empty());
    }
}
